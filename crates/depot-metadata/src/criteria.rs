//! Composable query model over artifact entries
//!
//! A [`Predicate`] is an immutable boolean expression tree; a [`Selector`] pairs it
//! with a [`Paginator`]. Stores evaluate selectors with [`Predicate::matches`].

use crate::entry::ArtifactEntry;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Entry field an expression reads
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    StorageId,
    RepositoryId,
    ArtifactPath,
    /// A key of the entry's coordinate map
    Coordinate(String),
    /// Name of a tag in the entry's tag set
    TagName,
}

impl Field {
    pub fn coordinate(key: impl Into<String>) -> Self {
        Field::Coordinate(key.into())
    }

    fn values<'a>(&self, entry: &'a ArtifactEntry) -> Vec<&'a str> {
        match self {
            Field::StorageId => vec![entry.storage_id()],
            Field::RepositoryId => vec![entry.repository_id()],
            Field::ArtifactPath => vec![entry.artifact_path()],
            Field::Coordinate(key) => entry
                .coordinates
                .get(key)
                .map(|v| vec![v.as_str()])
                .unwrap_or_default(),
            Field::TagName => entry.tags.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    /// Exact equality
    Eq,
    /// SQL-style pattern: `%` matches any run of characters, `_` exactly one
    Like,
    /// Literal substring; no character in the value is special
    Substring,
    /// Membership of the value in a multi-valued field
    Contains,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Expression {
    pub field: Field,
    pub operator: Operator,
    pub value: String,
}

impl Expression {
    pub fn eq(field: Field, value: impl Into<String>) -> Self {
        Self {
            field,
            operator: Operator::Eq,
            value: value.into(),
        }
    }

    pub fn like(field: Field, pattern: impl Into<String>) -> Self {
        Self {
            field,
            operator: Operator::Like,
            value: pattern.into(),
        }
    }

    pub fn substring(field: Field, value: impl Into<String>) -> Self {
        Self {
            field,
            operator: Operator::Substring,
            value: value.into(),
        }
    }

    pub fn contains(field: Field, value: impl Into<String>) -> Self {
        Self {
            field,
            operator: Operator::Contains,
            value: value.into(),
        }
    }

    pub fn matches(&self, entry: &ArtifactEntry) -> bool {
        let values = self.field.values(entry);
        match self.operator {
            Operator::Eq | Operator::Contains => values.iter().any(|v| *v == self.value),
            Operator::Like => values.iter().any(|v| like_matches(&self.value, v)),
            Operator::Substring => values.iter().any(|v| v.contains(self.value.as_str())),
        }
    }
}

/// Boolean expression tree over entry fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Predicate {
    /// Matches everything
    #[default]
    Empty,
    Expression(Expression),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn empty() -> Self {
        Predicate::Empty
    }

    pub fn of(expression: Expression) -> Self {
        Predicate::Expression(expression)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Predicate::Empty)
    }

    /// Conjunction; `Empty` is the identity and nested `And`s are flattened.
    pub fn and(self, other: Predicate) -> Self {
        match (self, other) {
            (Predicate::Empty, p) | (p, Predicate::Empty) => p,
            (Predicate::And(mut left), Predicate::And(right)) => {
                left.extend(right);
                Predicate::And(left)
            }
            (Predicate::And(mut left), p) => {
                left.push(p);
                Predicate::And(left)
            }
            (p, Predicate::And(mut right)) => {
                right.insert(0, p);
                Predicate::And(right)
            }
            (left, right) => Predicate::And(vec![left, right]),
        }
    }

    /// Disjunction; `Empty` is the identity.
    pub fn or(self, other: Predicate) -> Self {
        match (self, other) {
            (Predicate::Empty, p) | (p, Predicate::Empty) => p,
            (Predicate::Or(mut left), p) => {
                left.push(p);
                Predicate::Or(left)
            }
            (left, right) => Predicate::Or(vec![left, right]),
        }
    }

    pub fn negate(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    pub fn matches(&self, entry: &ArtifactEntry) -> bool {
        match self {
            Predicate::Empty => true,
            Predicate::Expression(expression) => expression.matches(entry),
            Predicate::And(predicates) => predicates.iter().all(|p| p.matches(entry)),
            Predicate::Or(predicates) => predicates.iter().any(|p| p.matches(entry)),
            Predicate::Not(predicate) => !predicate.matches(entry),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Skip/limit pagination with a deterministic order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginator {
    pub skip: usize,
    /// `None` means unbounded
    pub limit: Option<usize>,
    /// Defaults to the artifact path
    pub order_by: Option<Field>,
    #[serde(default)]
    pub order: SortOrder,
}

impl Paginator {
    pub fn new(skip: usize, limit: Option<usize>) -> Self {
        Self {
            skip,
            limit,
            ..Self::default()
        }
    }

    pub fn order_by(mut self, field: Field, order: SortOrder) -> Self {
        self.order_by = Some(field);
        self.order = order;
        self
    }

    pub fn compare(&self, a: &ArtifactEntry, b: &ArtifactEntry) -> Ordering {
        let field = self.order_by.as_ref().unwrap_or(&Field::ArtifactPath);
        let ordering = field
            .values(a)
            .first()
            .cmp(&field.values(b).first())
            .then_with(|| a.key.cmp(&b.key));
        match self.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }

    /// Sort and cut a result set
    pub fn apply(&self, mut entries: Vec<ArtifactEntry>) -> Vec<ArtifactEntry> {
        entries.sort_by(|a, b| self.compare(a, b));
        let iter = entries.into_iter().skip(self.skip);
        match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}

/// A predicate plus pagination, ready to run against a store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    pub predicate: Predicate,
    pub paginator: Paginator,
}

impl Selector {
    pub fn new(predicate: Predicate) -> Self {
        Self {
            predicate,
            paginator: Paginator::default(),
        }
    }

    pub fn with_paginator(mut self, paginator: Paginator) -> Self {
        self.paginator = paginator;
        self
    }
}

fn like_matches(pattern: &str, value: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let value: Vec<char> = value.chars().collect();

    // matched[j]: pattern[..i] matches value[..j]
    let mut matched = vec![false; value.len() + 1];
    matched[0] = true;

    for p in &pattern {
        let mut next = vec![false; value.len() + 1];
        match p {
            '%' => {
                let mut seen = false;
                for j in 0..=value.len() {
                    seen |= matched[j];
                    next[j] = seen;
                }
            }
            '_' => {
                for j in 1..=value.len() {
                    next[j] = matched[j - 1];
                }
            }
            c => {
                for j in 1..=value.len() {
                    next[j] = matched[j - 1] && value[j - 1] == *c;
                }
            }
        }
        matched = next;
    }

    matched[value.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{ArtifactEntryKey, EntryKind};

    fn entry(repository_id: &str, path: &str, version: &str) -> ArtifactEntry {
        let mut entry = ArtifactEntry::new(
            ArtifactEntryKey::new("storage0", repository_id, path),
            EntryKind::Hosted,
        );
        entry.coordinates.insert("version".to_string(), version.to_string());
        entry
    }

    #[test]
    fn test_like_patterns() {
        assert!(like_matches("%5.0%", "5.0.6"));
        assert!(like_matches("%5.0%", "15.0.1"));
        assert!(!like_matches("%5.0%", "5.1.0"));
        assert!(like_matches("5._.6", "5.0.6"));
        assert!(like_matches("%", ""));
        assert!(!like_matches("_", ""));
    }

    #[test]
    fn test_and_flattens_and_skips_empty() {
        let a = Predicate::of(Expression::eq(Field::StorageId, "storage0"));
        let b = Predicate::of(Expression::eq(Field::RepositoryId, "releases"));
        let c = Predicate::of(Expression::eq(Field::coordinate("name"), "node"));

        let combined = Predicate::empty().and(a.clone()).and(b.clone()).and(c.clone());
        assert_eq!(combined, Predicate::And(vec![a, b, c]));
        assert!(Predicate::empty().and(Predicate::empty()).is_empty());
    }

    #[test]
    fn test_strict_and_substring_matching() {
        let e = entry("releases", "a/a/5.0.6/a-5.0.6.tgz", "5.0.6");

        assert!(Predicate::of(Expression::eq(Field::coordinate("version"), "5.0.6")).matches(&e));
        assert!(!Predicate::of(Expression::eq(Field::coordinate("version"), "5.0")).matches(&e));
        assert!(Predicate::of(Expression::like(Field::coordinate("version"), "%5.0%")).matches(&e));
        assert!(!Predicate::of(Expression::eq(Field::coordinate("scope"), "@types")).matches(&e));
    }

    #[test]
    fn test_substring_treats_wildcards_literally() {
        let mut e = entry("releases", "my-pkg/my-pkg/1.0.0/my-pkg-1.0.0.tgz", "1.0.0");
        e.coordinates.insert("name".to_string(), "my-pkg".to_string());
        let name = |value: &str| Predicate::of(Expression::substring(Field::coordinate("name"), value));

        assert!(name("y-p").matches(&e));
        assert!(name("").matches(&e));
        assert!(!name("my_pkg").matches(&e));
        assert!(!name("%").matches(&e));

        e.coordinates.insert("name".to_string(), "my_pkg".to_string());
        assert!(name("my_pkg").matches(&e));
    }

    #[test]
    fn test_tag_containment() {
        let mut e = entry("releases", "a/a/1.0.0/a-1.0.0.tgz", "1.0.0");
        e.tags.insert("release".to_string());

        assert!(Predicate::of(Expression::contains(Field::TagName, "release")).matches(&e));
        assert!(!Predicate::of(Expression::contains(Field::TagName, "snapshot")).matches(&e));
        assert!(
            Predicate::of(Expression::contains(Field::TagName, "snapshot"))
                .negate()
                .matches(&e)
        );
    }

    #[test]
    fn test_paginator_orders_and_cuts() {
        let entries = vec![
            entry("releases", "c", "3.0.0"),
            entry("releases", "a", "1.0.0"),
            entry("releases", "b", "2.0.0"),
        ];

        let page = Paginator::new(1, Some(1)).apply(entries.clone());
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].artifact_path(), "b");

        let desc = Paginator::default()
            .order_by(Field::coordinate("version"), SortOrder::Desc)
            .apply(entries);
        let paths: Vec<_> = desc.iter().map(|e| e.artifact_path()).collect();
        assert_eq!(paths, vec!["c", "b", "a"]);
    }
}
