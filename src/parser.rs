use crate::ir::{FamilySnapshot, Person, PositionMap, Relationship};
use anyhow::{Result, bail};
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Default)]
pub struct ParseOutput {
    pub snapshot: FamilySnapshot,
    pub collapsed: BTreeSet<String>,
    pub roots: Option<Vec<String>>,
    /// Previously persisted positions, `fixed` flags included.
    pub positions: Option<PositionMap>,
    /// Inline `config` object, same shape as a config file.
    pub config_overrides: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DocumentFile {
    #[serde(alias = "people")]
    persons: Vec<Person>,
    relationships: Vec<Relationship>,
    #[serde(alias = "collapsedIds")]
    collapsed: Vec<String>,
    #[serde(alias = "rootIds")]
    roots: Option<Vec<String>>,
    positions: Option<PositionMap>,
    config: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Document {
    PersonsOnly(Vec<Person>),
    Full(DocumentFile),
}

impl Document {
    fn into_file(self) -> DocumentFile {
        match self {
            Document::Full(file) => file,
            Document::PersonsOnly(persons) => DocumentFile {
                persons,
                ..Default::default()
            },
        }
    }
}

/// Parses a family document: either `{ persons, relationships, collapsed,
/// roots, positions, config }` or a bare array of persons. Strict JSON is
/// tried first, then JSON5.
pub fn parse_snapshot(input: &str) -> Result<ParseOutput> {
    if input.trim().is_empty() {
        bail!("empty family document");
    }
    let document = match serde_json::from_str::<Document>(input) {
        Ok(document) => document,
        Err(json_err) => json5::from_str::<Document>(input)
            .map_err(|_| anyhow::anyhow!("invalid family document: {json_err}"))?,
    };
    let file = document.into_file();

    for (idx, person) in file.persons.iter().enumerate() {
        if person.id.trim().is_empty() {
            bail!("person at index {idx} has an empty id");
        }
    }
    if let Some(config) = &file.config
        && !config.is_object()
    {
        bail!("inline config must be an object");
    }

    let collapsed: BTreeSet<String> = file
        .collapsed
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();
    debug!(
        persons = file.persons.len(),
        relationships = file.relationships.len(),
        collapsed = collapsed.len(),
        "family document parsed"
    );

    Ok(ParseOutput {
        snapshot: FamilySnapshot {
            persons: file.persons,
            relationships: file.relationships,
        },
        collapsed,
        roots: file.roots,
        positions: file.positions,
        config_overrides: file.config,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Gender, Position, RelationshipKind};

    #[test]
    fn parse_full_document() {
        let input = r#"{
            "persons": [
                {"id": "a", "name": "Ahmad", "gender": "male", "spouseIds": ["b"], "childIds": ["c"]},
                {"id": "b", "name": "Siti", "gender": "female", "spouseIds": ["a"]},
                {"id": "c", "gender": "L", "parentIds": ["a", "b"], "birthDate": "1980-04-02"}
            ],
            "relationships": [
                {"type": "spouse", "person1Id": "a", "person2Id": "b", "marriageOrder": 1}
            ],
            "collapsed": ["c"],
            "positions": {"a": {"x": 10, "y": 20, "fixed": true}},
            "config": {"rules": {"showOrphans": false}}
        }"#;
        let parsed = parse_snapshot(input).unwrap();
        assert_eq!(parsed.snapshot.persons.len(), 3);
        assert_eq!(parsed.snapshot.persons[2].gender, Gender::Male);
        assert_eq!(parsed.snapshot.relationships[0].kind, RelationshipKind::Spouse);
        assert_eq!(parsed.snapshot.relationships[0].marriage_order, Some(1));
        assert!(parsed.collapsed.contains("c"));
        assert_eq!(
            parsed.positions.unwrap()["a"],
            Position::fixed(10.0, 20.0)
        );
        assert!(parsed.config_overrides.unwrap().is_object());
        assert!(parsed.roots.is_none());
    }

    #[test]
    fn parse_bare_person_array() {
        let parsed = parse_snapshot(r#"[{"id": "x"}, {"id": "y", "parentIds": ["x"]}]"#).unwrap();
        assert_eq!(parsed.snapshot.persons.len(), 2);
        assert!(parsed.snapshot.relationships.is_empty());
    }

    #[test]
    fn parse_json5_with_comments() {
        let input = r#"{
            // exported by hand
            people: [{ id: 'root', name: 'Raden Mas Said' }],
            rootIds: ['root'],
        }"#;
        let parsed = parse_snapshot(input).unwrap();
        assert_eq!(parsed.snapshot.persons[0].label(), "Raden Mas Said");
        assert_eq!(parsed.roots, Some(vec!["root".to_string()]));
    }

    #[test]
    fn rejects_bad_documents() {
        assert!(parse_snapshot("").is_err());
        assert!(parse_snapshot("{ not json").is_err());
        assert!(parse_snapshot(r#"{"persons": [{"id": "  "}]}"#).is_err());
        assert!(parse_snapshot(r#"{"persons": [], "config": 3}"#).is_err());
    }
}
