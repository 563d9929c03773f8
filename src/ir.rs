use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Unknown,
}

impl<'de> Deserialize<'de> for Gender {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let token = Option::<String>::deserialize(deserializer)?;
        Ok(token.as_deref().map(Gender::from_token).unwrap_or_default())
    }
}

impl Gender {
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "m" | "male" | "l" | "laki-laki" => Self::Male,
            "f" | "female" | "p" | "perempuan" => Self::Female,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Person {
    pub id: String,
    pub name: Option<String>,
    pub gender: Gender,
    pub birth_date: Option<String>,
    pub birth_order: Option<i32>,
    pub title: Option<String>,
    pub spouse_ids: BTreeSet<String>,
    pub parent_ids: Vec<String>,
    pub child_ids: BTreeSet<String>,
}

impl Person {
    pub fn new(id: &str, gender: Gender) -> Self {
        Self {
            id: id.to_string(),
            gender,
            ..Default::default()
        }
    }

    /// Display label: the name when present, otherwise the id.
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(self.id.as_str())
    }

    pub fn birth_date_value(&self) -> Option<NaiveDate> {
        self.birth_date.as_deref().and_then(parse_birth_date)
    }
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM`, `YYYY` and date-times whose first ten
/// characters are a date. Partial dates resolve to the first day of the period.
pub fn parse_birth_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    if let Some(prefix) = trimmed.get(..10)
        && let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d")
    {
        return Some(date);
    }
    let mut parts = trimmed.splitn(3, '-');
    let year = parts.next()?.parse::<i32>().ok()?;
    let month = match parts.next() {
        Some(month) => month.parse::<u32>().ok()?,
        None => 1,
    };
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationshipKind {
    #[serde(rename = "spouse")]
    Spouse,
    #[serde(rename = "parent-child", alias = "parent_child", alias = "parentChild")]
    ParentChild,
}

/// A relationship record. For `ParentChild`, `person1` is the parent and
/// `person2` the child.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: RelationshipKind,
    #[serde(rename = "person1Id", alias = "person1")]
    pub person1: String,
    #[serde(rename = "person2Id", alias = "person2")]
    pub person2: String,
    #[serde(default)]
    pub marriage_order: Option<u32>,
}

impl Relationship {
    pub fn spouse(a: &str, b: &str, marriage_order: Option<u32>) -> Self {
        Self {
            id: None,
            kind: RelationshipKind::Spouse,
            person1: a.to_string(),
            person2: b.to_string(),
            marriage_order,
        }
    }

    pub fn parent_child(parent: &str, child: &str) -> Self {
        Self {
            id: None,
            kind: RelationshipKind::ParentChild,
            person1: parent.to_string(),
            person2: child.to_string(),
            marriage_order: None,
        }
    }

    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.person1 == a && self.person2 == b) || (self.person1 == b && self.person2 == a)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FamilySnapshot {
    pub persons: Vec<Person>,
    pub relationships: Vec<Relationship>,
}

impl FamilySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }

    pub fn person(&self, id: &str) -> Option<&Person> {
        self.persons.iter().find(|person| person.id == id)
    }

    /// Inserts or replaces a person, keeping input order for existing ids.
    pub fn upsert_person(&mut self, person: Person) {
        match self.persons.iter_mut().find(|existing| existing.id == person.id) {
            Some(existing) => *existing = person,
            None => self.persons.push(person),
        }
    }

    /// Records a marriage on both persons and as a relationship record.
    pub fn marry(&mut self, a: &str, b: &str, marriage_order: Option<u32>) {
        for (from, to) in [(a, b), (b, a)] {
            if let Some(person) = self.persons.iter_mut().find(|p| p.id == from) {
                person.spouse_ids.insert(to.to_string());
            }
        }
        self.relationships
            .push(Relationship::spouse(a, b, marriage_order));
    }

    /// Records a parent-child link on both persons.
    pub fn add_child(&mut self, parent: &str, child: &str) {
        if let Some(person) = self.persons.iter_mut().find(|p| p.id == parent) {
            person.child_ids.insert(child.to_string());
        }
        if let Some(person) = self.persons.iter_mut().find(|p| p.id == child)
            && !person.parent_ids.iter().any(|id| id == parent)
        {
            person.parent_ids.push(parent.to_string());
        }
    }
}

/// A node position in layout units. `x`/`y` are the top-left corner of the
/// node box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fixed: bool,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, fixed: false }
    }

    pub fn fixed(x: f32, y: f32) -> Self {
        Self { x, y, fixed: true }
    }
}

pub type PositionMap = BTreeMap<String, Position>;
