use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::warn;

use crate::{
    id_and_name, nested_object, EntityKind, GraphEntity, GraphRelation, HierarchyRelationship,
};

/// Summary of one paper as it appears in a topic bucket.
#[derive(Debug, Clone, Serialize)]
pub struct PaperSummary {
    pub id: Option<String>,
    pub title: Option<String>,
    pub publication_date: Option<String>,
    pub doi: Option<String>,
    pub cited_by_count: u64,
    pub primary_topic_score: f64,
}

/// The representative primary-topic sub-object for a topic bucket. The
/// subfield/field/domain values are carried through verbatim from the first
/// contributing paper.
#[derive(Debug, Serialize)]
pub struct TopicInfo {
    pub id: String,
    pub display_name: Option<String>,
    pub subfield: Value,
    pub field: Value,
    pub domain: Value,
}

#[derive(Debug, Serialize)]
pub struct TopicReport {
    pub topic_info: TopicInfo,
    pub paper_count: usize,
    pub papers: Vec<PaperSummary>,
    pub avg_citations: f64,
}

#[derive(Debug, Serialize)]
pub struct TopicAnalysis {
    pub total_topics: usize,
    pub total_papers_analyzed: usize,
    pub topics_with_papers: BTreeMap<String, TopicReport>,
}

#[derive(Debug, Serialize)]
pub struct Taxonomy {
    pub entities: Vec<GraphEntity>,
    pub relations: Vec<GraphRelation>,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResult {
    pub professor_info: Value,
    pub topic_analysis: TopicAnalysis,
    pub taxonomy: Taxonomy,
}

/// Everything one pass over the paper list accumulates. Level entities keep
/// first-encounter order; seen-sets dedup by id with the first name winning.
#[derive(Default)]
struct AggregationState {
    topic_order: Vec<String>,
    topic_names: HashMap<String, String>,
    topic_papers: HashMap<String, Vec<PaperSummary>>,
    domains: Vec<(String, String)>,
    fields: Vec<(String, String)>,
    subfields: Vec<(String, String)>,
    seen_domains: HashSet<String>,
    seen_fields: HashSet<String>,
    seen_subfields: HashSet<String>,
}

impl AggregationState {
    /// Accumulates one paper. Papers that are not mappings, or whose
    /// `primary_topic` is missing/null/non-mapping/empty, or whose topic id
    /// or name is absent, contribute nothing here (they still count toward
    /// `total_papers_analyzed`).
    fn observe(&mut self, paper: &Value) {
        let Some(topic) = nested_object(paper, &["primary_topic"]) else {
            return;
        };
        let Some((topic_id, topic_name)) = id_and_name(topic) else {
            return;
        };

        let summary = PaperSummary {
            id: paper.get("id").and_then(Value::as_str).map(String::from),
            title: paper.get("title").and_then(Value::as_str).map(String::from),
            publication_date: paper
                .get("publication_date")
                .and_then(Value::as_str)
                .map(String::from),
            doi: paper.get("doi").and_then(Value::as_str).map(String::from),
            cited_by_count: paper.get("cited_by_count").and_then(Value::as_u64).unwrap_or(0),
            primary_topic_score: topic.get("score").and_then(Value::as_f64).unwrap_or(0.0),
        };

        if !self.topic_papers.contains_key(&topic_id) {
            self.topic_order.push(topic_id.clone());
        }
        self.topic_names.entry(topic_id.clone()).or_insert(topic_name);
        self.topic_papers.entry(topic_id).or_default().push(summary);

        if let Some(subfield) = nested_object(paper, &["primary_topic", "subfield"]) {
            if let Some((id, name)) = id_and_name(subfield) {
                if self.seen_subfields.insert(id.clone()) {
                    self.subfields.push((id, name));
                }
            }
        }
        if let Some(field) = nested_object(paper, &["primary_topic", "field"]) {
            if let Some((id, name)) = id_and_name(field) {
                if self.seen_fields.insert(id.clone()) {
                    self.fields.push((id, name));
                }
            }
        }
        if let Some(domain) = nested_object(paper, &["primary_topic", "domain"]) {
            if let Some((id, name)) = id_and_name(domain) {
                if self.seen_domains.insert(id.clone()) {
                    self.domains.push((id, name));
                }
            }
        }
    }
}

/// Aggregates one professor's publication record set into the topic report
/// plus the entity/relationship graph. Missing `professor_info` or `papers`
/// keys degrade to empty values rather than failing.
pub fn aggregate(data: &Value, relationships: &[HierarchyRelationship]) -> AnalysisResult {
    let professor_info = data
        .get("professor_info")
        .filter(|v| v.is_object())
        .cloned()
        .unwrap_or_else(|| json!({}));
    let empty_papers = Vec::new();
    let papers = data
        .get("papers")
        .and_then(Value::as_array)
        .unwrap_or(&empty_papers);

    let mut state = AggregationState::default();
    for paper in papers {
        state.observe(paper);
    }

    let topics_with_papers = build_topic_reports(&state, papers);
    let taxonomy = build_taxonomy(&state, papers, &professor_info, relationships);

    AnalysisResult {
        professor_info,
        topic_analysis: TopicAnalysis {
            total_topics: state.topic_order.len(),
            total_papers_analyzed: papers.len(),
            topics_with_papers,
        },
        taxonomy,
    }
}

/// Counts papers whose classification sub-object at `path` carries `id`.
/// A second, independent pass over the original paper list.
fn rescan_count(papers: &[Value], path: &[&str], id: &str) -> usize {
    papers
        .iter()
        .filter(|paper| {
            nested_object(paper, path).and_then(|m| m.get("id").and_then(Value::as_str)) == Some(id)
        })
        .count()
}

fn build_topic_reports(state: &AggregationState, papers: &[Value]) -> BTreeMap<String, TopicReport> {
    let mut reports = BTreeMap::new();

    for topic_id in &state.topic_order {
        let bucket = &state.topic_papers[topic_id];

        // The first paper carrying this topic supplies the full sub-object,
        // including its subfield/field/domain detail.
        let Some(detail) = papers.iter().find_map(|paper| {
            let topic = nested_object(paper, &["primary_topic"])?;
            (topic.get("id").and_then(Value::as_str) == Some(topic_id.as_str())).then_some(topic)
        }) else {
            continue;
        };

        let avg_citations = if bucket.is_empty() {
            0.0
        } else {
            bucket.iter().map(|p| p.cited_by_count as f64).sum::<f64>() / bucket.len() as f64
        };

        reports.insert(
            topic_id.clone(),
            TopicReport {
                topic_info: TopicInfo {
                    id: topic_id.clone(),
                    display_name: detail
                        .get("display_name")
                        .and_then(Value::as_str)
                        .map(String::from),
                    subfield: detail.get("subfield").cloned().unwrap_or(Value::Null),
                    field: detail.get("field").cloned().unwrap_or(Value::Null),
                    domain: detail.get("domain").cloned().unwrap_or(Value::Null),
                },
                paper_count: bucket.len(),
                papers: bucket.clone(),
                avg_citations,
            },
        );
    }

    reports
}

fn build_taxonomy(
    state: &AggregationState,
    papers: &[Value],
    professor_info: &Value,
    relationships: &[HierarchyRelationship],
) -> Taxonomy {
    let mut entities = Vec::new();
    let mut relations = Vec::new();

    let author_id = professor_info
        .get("author_id")
        .and_then(Value::as_str)
        .unwrap_or("");
    let professor_id = format!("professor_{author_id}");

    entities.push(GraphEntity {
        id: professor_id.clone(),
        kind: EntityKind::Professor,
        name: professor_info
            .get("name")
            .and_then(Value::as_str)
            .map(String::from),
        properties: json!({
            "author_id": professor_info.get("author_id"),
            "department": professor_info.get("department"),
            "total_papers": professor_info.get("total_papers").cloned().unwrap_or_else(|| json!(0)),
            "total_topics": state.topic_order.len(),
        }),
    });

    for (id, name) in &state.domains {
        entities.push(GraphEntity {
            id: id.clone(),
            kind: EntityKind::Domain,
            name: Some(name.clone()),
            properties: json!({
                "paper_count": rescan_count(papers, &["primary_topic", "domain"], id),
            }),
        });
    }
    for (id, name) in &state.fields {
        entities.push(GraphEntity {
            id: id.clone(),
            kind: EntityKind::Field,
            name: Some(name.clone()),
            properties: json!({
                "paper_count": rescan_count(papers, &["primary_topic", "field"], id),
            }),
        });
    }
    for (id, name) in &state.subfields {
        entities.push(GraphEntity {
            id: id.clone(),
            kind: EntityKind::Subfield,
            name: Some(name.clone()),
            properties: json!({
                "paper_count": rescan_count(papers, &["primary_topic", "subfield"], id),
            }),
        });
    }

    for topic_id in &state.topic_order {
        let bucket = &state.topic_papers[topic_id];
        // The bucket count and an independent rescan of the paper list must
        // agree; a divergence is reported, not silently resolved.
        let rescan = rescan_count(papers, &["primary_topic"], topic_id);
        if rescan != bucket.len() {
            warn!(
                "Paper count mismatch for topic {}: bucket {}, rescan {}",
                topic_id,
                bucket.len(),
                rescan
            );
        }
        let paper_ids: Vec<&Option<String>> = bucket.iter().map(|p| &p.id).collect();
        entities.push(GraphEntity {
            id: topic_id.clone(),
            kind: EntityKind::Topic,
            name: state.topic_names.get(topic_id).cloned(),
            properties: json!({
                "paper_count": bucket.len(),
                "papers": paper_ids,
            }),
        });
    }

    for topic_id in &state.topic_order {
        let bucket = &state.topic_papers[topic_id];
        let paper_ids: Vec<&Option<String>> = bucket.iter().map(|p| &p.id).collect();
        relations.push(GraphRelation {
            source: professor_id.clone(),
            target: topic_id.clone(),
            relation_type: "works_on".to_string(),
            properties: json!({
                "paper_count": bucket.len(),
                "papers": paper_ids,
            }),
        });
    }

    // Hierarchy edges are pruned to the subgraph this professor touches:
    // both endpoints must already be present in the entity set.
    let entity_ids: HashSet<&str> = entities.iter().map(|e| e.id.as_str()).collect();
    for rel in relationships {
        if entity_ids.contains(rel.parent_id.as_str()) && entity_ids.contains(rel.child_id.as_str())
        {
            relations.push(GraphRelation {
                source: rel.parent_id.clone(),
                target: rel.child_id.clone(),
                relation_type: rel.relationship_type.clone(),
                properties: json!({
                    "parent_name": rel.parent_name,
                    "child_name": rel.child_name,
                }),
            });
        }
    }

    Taxonomy { entities, relations }
}
