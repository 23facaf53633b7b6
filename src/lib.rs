use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod analyze;
pub mod download;
pub mod fetch;
pub mod hierarchy;

/// Walks `path` through nested JSON objects, yielding the final mapping only
/// if every step (including the root) is a present, non-null, non-empty
/// object. Collapses the repeated null/type guards the loosely-shaped
/// OpenAlex records require into one accessor.
pub fn nested_object<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Map<String, Value>> {
    let mut current = root.as_object().filter(|m| !m.is_empty())?;
    for key in path {
        current = current.get(*key)?.as_object().filter(|m| !m.is_empty())?;
    }
    Some(current)
}

/// Extracts `id` and `display_name` from a classification sub-object.
/// Both must be present, non-empty strings.
pub fn id_and_name(map: &Map<String, Value>) -> Option<(String, String)> {
    let id = map.get("id").and_then(Value::as_str).filter(|s| !s.is_empty())?;
    let name = map
        .get("display_name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())?;
    Some((id.to_string(), name.to_string()))
}

/// Lowercases a taxonomy node name into an output-file slug.
pub fn slugify_node_name(name: &str) -> String {
    name.to_lowercase()
        .replace(' ', "_")
        .replace('&', "and")
        .replace([',', '(', ')'], "")
}

/// Replaces path separators, colons, and spaces so a professor or topic name
/// is safe as a filename component.
pub fn sanitize_filename(name: &str) -> String {
    name.replace(['/', '\\', ':', ' '], "_")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Domain,
    Field,
    Subfield,
    Topic,
    Professor,
}

/// One node of the extracted taxonomy subtree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyEntity {
    pub id: String,
    pub name: String,
    pub original_id: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// A directed parent→child edge in the reference taxonomy. Written by the
/// hierarchy extractor, read back by the aggregator. Edges are not
/// deduplicated: repeated qualifying rows emit repeated records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyRelationship {
    #[serde(default)]
    pub parent_id: String,
    #[serde(default)]
    pub parent_name: Option<String>,
    #[serde(default)]
    pub child_id: String,
    #[serde(default)]
    pub child_name: Option<String>,
    #[serde(default = "default_relationship_type")]
    pub relationship_type: String,
}

fn default_relationship_type() -> String {
    "hierarchical".to_string()
}

/// A node of the per-professor knowledge graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEntity {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub name: Option<String>,
    pub properties: Value,
}

/// A typed directed edge of the per-professor knowledge graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphRelation {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub relation_type: String,
    pub properties: Value,
}
