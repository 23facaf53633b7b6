use openalex_taxonomy::hierarchy::{
    extract_subtree, locate_level, parse_reference_row, read_reference_table, HierarchyArgs, Level,
};
use openalex_taxonomy::{EntityKind, HierarchyEntity, HierarchyRelationship};
use std::fs;
use tempfile::TempDir;

fn make_row(
    topic_id: &str,
    topic_name: &str,
    subfield_id: &str,
    subfield_name: &str,
    field_id: &str,
    field_name: &str,
    domain_id: &str,
    domain_name: &str,
) -> String {
    [
        topic_id,
        topic_name,
        subfield_id,
        subfield_name,
        field_id,
        field_name,
        domain_id,
        domain_name,
        "keyword1; keyword2",
        "A short summary",
        "https://example.org/topic",
    ]
    .join("\t")
}

fn parse_rows(lines: &[String]) -> Vec<openalex_taxonomy::hierarchy::ReferenceRow> {
    lines
        .iter()
        .filter_map(|l| parse_reference_row(l))
        .collect()
}

#[test]
fn test_parse_reference_row_rejects_short_rows() {
    assert!(parse_reference_row("only\tthree\tcolumns").is_none());
    assert!(parse_reference_row("").is_none());

    let full = make_row("10001", "Topic", "1701", "Sub", "17", "Field", "1", "Domain");
    let row = parse_reference_row(&full).unwrap();
    assert_eq!(row.topic_id, "10001");
    assert_eq!(row.domain_name, "Domain");
    assert_eq!(row.link, "https://example.org/topic");
}

#[test]
fn test_locate_level_checks_domain_then_field_then_subfield() {
    let rows = parse_rows(&[
        make_row("1", "T1", "s1", "Networks", "f1", "Computer Science", "d1", "Physical Sciences"),
    ]);

    assert_eq!(locate_level("Physical Sciences", &rows), Some(Level::Domain));
    assert_eq!(locate_level("Computer Science", &rows), Some(Level::Field));
    assert_eq!(locate_level("Networks", &rows), Some(Level::Subfield));
    assert_eq!(locate_level("Unknown Node", &rows), None);
}

#[test]
fn test_locate_level_is_exact_match_only() {
    let rows = parse_rows(&[
        make_row("1", "T1", "s1", "Networks", "f1", "Computer Science", "d1", "Physical Sciences"),
    ]);

    assert_eq!(locate_level("computer science", &rows), None);
    assert_eq!(locate_level("Computer", &rows), None);
}

#[test]
fn test_single_row_domain_extraction_yields_full_chain() {
    let rows = parse_rows(&[
        make_row("10001", "Evolutionary Genetics", "2801", "Genetics", "28", "Life Sciences", "2", "Biology"),
    ]);

    let (entities, relationships) = extract_subtree("Biology", Level::Domain, &rows);

    assert_eq!(entities.len(), 4);
    assert_eq!(entities[0].kind, EntityKind::Domain);
    assert_eq!(entities[0].id, "https://openalex.org/domains/2");
    assert_eq!(entities[1].kind, EntityKind::Field);
    assert_eq!(entities[1].id, "https://openalex.org/fields/28");
    assert_eq!(entities[2].kind, EntityKind::Subfield);
    assert_eq!(entities[2].id, "https://openalex.org/subfields/2801");
    assert_eq!(entities[3].kind, EntityKind::Topic);
    assert_eq!(entities[3].id, "https://openalex.org/T10001");
    assert_eq!(entities[3].keywords.as_deref(), Some("keyword1; keyword2"));

    assert_eq!(relationships.len(), 3);
    assert_eq!(relationships[0].relationship_type, "domain_to_field");
    assert_eq!(relationships[1].relationship_type, "field_to_subfield");
    assert_eq!(relationships[2].relationship_type, "subfield_to_topic");
    assert_eq!(relationships[2].parent_id, "https://openalex.org/subfields/2801");
    assert_eq!(relationships[2].child_id, "https://openalex.org/T10001");
}

#[test]
fn test_field_level_extraction_omits_domain() {
    let rows = parse_rows(&[
        make_row("10001", "T1", "1701", "S1", "17", "Computer Science", "1", "Physical Sciences"),
        make_row("10002", "T2", "1702", "S2", "17", "Computer Science", "1", "Physical Sciences"),
    ]);

    let (entities, relationships) = extract_subtree("Computer Science", Level::Field, &rows);

    // field + 2 subfields + 2 topics, no domain entity
    assert_eq!(entities.len(), 5);
    assert!(entities.iter().all(|e| e.kind != EntityKind::Domain));

    // 2 field->subfield + 2 subfield->topic, no domain edge
    assert_eq!(relationships.len(), 4);
    assert!(relationships
        .iter()
        .all(|r| r.relationship_type != "domain_to_field"));
}

#[test]
fn test_entities_deduplicated_but_edges_repeat_per_row() {
    // Two topics under the same subfield: shared entities emitted once,
    // subfield->topic edge emitted per row.
    let rows = parse_rows(&[
        make_row("10001", "T1", "1701", "S1", "17", "F1", "1", "Physical Sciences"),
        make_row("10002", "T2", "1701", "S1", "17", "F1", "1", "Physical Sciences"),
    ]);

    let (entities, relationships) = extract_subtree("Physical Sciences", Level::Domain, &rows);

    // domain, field, subfield once each + 2 topics
    assert_eq!(entities.len(), 5);
    let topic_count = entities.iter().filter(|e| e.kind == EntityKind::Topic).count();
    assert_eq!(topic_count, 2);

    let subfield_topic_edges = relationships
        .iter()
        .filter(|r| r.relationship_type == "subfield_to_topic")
        .count();
    assert_eq!(subfield_topic_edges, 2);
    // parent entities were only new on the first row
    assert_eq!(relationships.len(), 4);
}

#[test]
fn test_read_reference_table_skips_malformed_rows() {
    let temp_dir = TempDir::new().unwrap();
    let table = temp_dir.path().join("field.txt");
    let good = make_row("10001", "T1", "1701", "S1", "17", "F1", "1", "D1");
    fs::write(&table, format!("{good}\nshort\trow\n\n{good}\n")).unwrap();

    let rows = read_reference_table(&table).unwrap();
    assert_eq!(rows.len(), 2);
}

#[test]
fn test_run_writes_entity_and_relationship_files() {
    let temp_dir = TempDir::new().unwrap();
    let table = temp_dir.path().join("field.txt");
    let rows = [
        make_row("10001", "T1", "1701", "S1", "17", "Computer Science", "1", "Physical Sciences"),
        make_row("10002", "T2", "1702", "S2", "17", "Computer Science", "1", "Physical Sciences"),
    ];
    fs::write(&table, rows.join("\n")).unwrap();

    let output_dir = temp_dir.path().join("out");
    let args = HierarchyArgs {
        target: "Computer Science".to_string(),
        input: table,
        output: output_dir.clone(),
    };
    openalex_taxonomy::hierarchy::run(args).unwrap();

    let entities_path = output_dir.join("computer_science_entities.json");
    let relationships_path = output_dir.join("computer_science_relationships.json");
    assert!(entities_path.exists());
    assert!(relationships_path.exists());

    let entities: Vec<HierarchyEntity> =
        serde_json::from_reader(fs::File::open(&entities_path).unwrap()).unwrap();
    let relationships: Vec<HierarchyRelationship> =
        serde_json::from_reader(fs::File::open(&relationships_path).unwrap()).unwrap();
    assert_eq!(entities.len(), 5);
    assert_eq!(relationships.len(), 4);
}

#[test]
fn test_run_unknown_node_fails_without_output() {
    let temp_dir = TempDir::new().unwrap();
    let table = temp_dir.path().join("field.txt");
    fs::write(
        &table,
        make_row("10001", "T1", "1701", "S1", "17", "F1", "1", "D1"),
    )
    .unwrap();

    let output_dir = temp_dir.path().join("out");
    let args = HierarchyArgs {
        target: "Does Not Exist".to_string(),
        input: table,
        output: output_dir.clone(),
    };

    assert!(openalex_taxonomy::hierarchy::run(args).is_err());
    assert!(!output_dir.join("does_not_exist_entities.json").exists());
}
