use anyhow::{bail, Context, Result};
use clap::Args;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::info;

use crate::{slugify_node_name, EntityKind, HierarchyEntity, HierarchyRelationship};

mod parser;
pub use parser::{
    domain_openalex_id, field_openalex_id, parse_reference_row, read_reference_table,
    subfield_openalex_id, topic_openalex_id, ReferenceRow,
};

#[derive(Args)]
pub struct HierarchyArgs {
    /// Name of the domain, field, or subfield to extract
    pub target: String,

    /// Tab-separated reference table
    #[arg(short, long, default_value = "data/field.txt")]
    pub input: PathBuf,

    /// Directory for the entity and relationship output files
    #[arg(short, long, default_value = "data")]
    pub output: PathBuf,
}

/// Hierarchy level a target node was found at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Domain,
    Field,
    Subfield,
}

/// Single scan over the rows; the first row whose domain, field, or subfield
/// name exactly equals `target` (checked in that order) decides the level.
/// No normalization or case folding is applied.
pub fn locate_level(target: &str, rows: &[ReferenceRow]) -> Option<Level> {
    for row in rows {
        if row.domain_name == target {
            return Some(Level::Domain);
        }
        if row.field_name == target {
            return Some(Level::Field);
        }
        if row.subfield_name == target {
            return Some(Level::Subfield);
        }
    }
    None
}

fn row_matches(target: &str, level: Level, row: &ReferenceRow) -> bool {
    match level {
        Level::Domain => row.domain_name == target,
        Level::Field => row.field_name == target,
        Level::Subfield => row.subfield_name == target,
    }
}

/// Second scan: for every row matching the target at `level`, emits entities
/// for every hierarchy level at-or-below the target plus the edges connecting
/// consecutive emitted levels. Entities are deduplicated by synthesized id
/// (first row wins); topic entities and subfield→topic edges are emitted once
/// per qualifying row. Output order follows input row order.
pub fn extract_subtree(
    target: &str,
    level: Level,
    rows: &[ReferenceRow],
) -> (Vec<HierarchyEntity>, Vec<HierarchyRelationship>) {
    let mut entities = Vec::new();
    let mut relationships = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for row in rows {
        if !row_matches(target, level, row) {
            continue;
        }

        let domain_id = domain_openalex_id(&row.domain_id);
        let field_id = field_openalex_id(&row.field_id);
        let subfield_id = subfield_openalex_id(&row.subfield_id);
        let topic_id = topic_openalex_id(&row.topic_id);

        if level == Level::Domain && seen.insert(domain_id.clone()) {
            entities.push(HierarchyEntity {
                id: domain_id.clone(),
                name: row.domain_name.clone(),
                original_id: row.domain_id.clone(),
                kind: EntityKind::Domain,
                keywords: None,
                summary: None,
                link: None,
            });
        }

        if matches!(level, Level::Domain | Level::Field) && seen.insert(field_id.clone()) {
            entities.push(HierarchyEntity {
                id: field_id.clone(),
                name: row.field_name.clone(),
                original_id: row.field_id.clone(),
                kind: EntityKind::Field,
                keywords: None,
                summary: None,
                link: None,
            });

            if level == Level::Domain {
                relationships.push(HierarchyRelationship {
                    parent_id: domain_id.clone(),
                    parent_name: Some(row.domain_name.clone()),
                    child_id: field_id.clone(),
                    child_name: Some(row.field_name.clone()),
                    relationship_type: "domain_to_field".to_string(),
                });
            }
        }

        if seen.insert(subfield_id.clone()) {
            entities.push(HierarchyEntity {
                id: subfield_id.clone(),
                name: row.subfield_name.clone(),
                original_id: row.subfield_id.clone(),
                kind: EntityKind::Subfield,
                keywords: None,
                summary: None,
                link: None,
            });

            if matches!(level, Level::Domain | Level::Field) {
                relationships.push(HierarchyRelationship {
                    parent_id: field_id.clone(),
                    parent_name: Some(row.field_name.clone()),
                    child_id: subfield_id.clone(),
                    child_name: Some(row.subfield_name.clone()),
                    relationship_type: "field_to_subfield".to_string(),
                });
            }
        }

        entities.push(HierarchyEntity {
            id: topic_id.clone(),
            name: row.topic_name.clone(),
            original_id: row.topic_id.clone(),
            kind: EntityKind::Topic,
            keywords: Some(row.keywords.clone()),
            summary: Some(row.summary.clone()),
            link: Some(row.link.clone()),
        });

        relationships.push(HierarchyRelationship {
            parent_id: subfield_id,
            parent_name: Some(row.subfield_name.clone()),
            child_id: topic_id,
            child_name: Some(row.topic_name.clone()),
            relationship_type: "subfield_to_topic".to_string(),
        });
    }

    (entities, relationships)
}

fn log_summary(entities: &[HierarchyEntity], relationships: &[HierarchyRelationship]) {
    let mut entity_counts: HashMap<EntityKind, usize> = HashMap::new();
    for entity in entities {
        *entity_counts.entry(entity.kind).or_default() += 1;
    }
    let mut rel_counts: HashMap<&str, usize> = HashMap::new();
    for rel in relationships {
        *rel_counts.entry(rel.relationship_type.as_str()).or_default() += 1;
    }

    for kind in [
        EntityKind::Domain,
        EntityKind::Field,
        EntityKind::Subfield,
        EntityKind::Topic,
    ] {
        if let Some(count) = entity_counts.get(&kind) {
            info!("  {:?}: {}", kind, count);
        }
    }
    info!("  Total entities: {}", entities.len());
    for (rel_type, count) in &rel_counts {
        info!("  {}: {}", rel_type, count);
    }
    info!("  Total relationships: {}", relationships.len());
}

pub fn run(args: HierarchyArgs) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    info!(
        "Searching for node '{}' in {}",
        args.target,
        args.input.display()
    );
    let rows = read_reference_table(&args.input)?;

    let Some(level) = locate_level(&args.target, &rows) else {
        bail!("Node '{}' not found in the reference table", args.target);
    };
    info!("Found '{}' at level {:?}", args.target, level);

    let (entities, relationships) = extract_subtree(&args.target, level, &rows);
    info!(
        "Extracted {} entities and {} relationships",
        entities.len(),
        relationships.len()
    );

    fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;

    let slug = slugify_node_name(&args.target);
    let entities_path = args.output.join(format!("{slug}_entities.json"));
    let relationships_path = args.output.join(format!("{slug}_relationships.json"));

    let entities_file = File::create(&entities_path)
        .with_context(|| format!("Failed to create {}", entities_path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(entities_file), &entities)?;

    let relationships_file = File::create(&relationships_path)
        .with_context(|| format!("Failed to create {}", relationships_path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(relationships_file), &relationships)?;

    log_summary(&entities, &relationships);
    info!("Wrote {}", entities_path.display());
    info!("Wrote {}", relationships_path.display());

    Ok(())
}
