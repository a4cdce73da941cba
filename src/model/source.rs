//! The relational plan IR (spec.md §3 `Source`, §4.4).
//!
//! A linear chain: every non-leaf variant wraps a `base: Source`. Grounded
//! on `original_source/src/model/source/*.py` for variant shape; the
//! builder-method idiom follows the teacher's fluent construction style
//! (the now-removed dbt-style `model/source.rs`, replaced wholesale since
//! its `SourceEntity`/dedup-config semantics have no counterpart in this
//! spec).

use serde::{Deserialize, Serialize};

use super::column_expression::ColumnExpression;
use super::namespace::Namespace;

const WIRE_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDir {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NullsOrder {
    Auto,
    First,
    Last,
}

/// Activity schema triple for `MatchSteps` (spec.md §GLOSSARY).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySchema {
    pub group: ColumnExpression,
    pub timestamp: ColumnExpression,
    pub event_key: ColumnExpression,
}

/// The relational-operation sum type (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "subType")]
pub enum Source {
    TableName {
        table: String,
        schema: Option<String>,
    },
    SqlText {
        sql: String,
    },
    Pick {
        base: Box<Source>,
        columns: Vec<ColumnExpression>,
    },
    Filter {
        base: Box<Source>,
        condition: ColumnExpression,
    },
    Sort {
        base: Box<Source>,
        sort: ColumnExpression,
        dir: SortDir,
        nulls: NullsOrder,
    },
    Limit {
        base: Box<Source>,
        limit: Option<u64>,
        offset: Option<u64>,
    },
    Aggregate {
        base: Box<Source>,
        groups: Vec<ColumnExpression>,
        measures: Vec<ColumnExpression>,
    },
    JoinOne {
        base: Box<Source>,
        relation: Box<Namespace>,
        condition: ColumnExpression,
        drop_unmatched: bool,
    },
    Union {
        base: Box<Source>,
        other: Box<Source>,
    },
    MatchSteps {
        base: Box<Source>,
        activity_schema: Box<ActivitySchema>,
        steps: Vec<ColumnExpression>,
        partition_start_events: Vec<ColumnExpression>,
        time_limit_seconds: Option<i64>,
    },
}

impl Source {
    pub fn table(table: impl Into<String>) -> Self {
        Source::TableName {
            table: table.into(),
            schema: None,
        }
    }

    pub fn table_in_schema(table: impl Into<String>, schema: impl Into<String>) -> Self {
        Source::TableName {
            table: table.into(),
            schema: Some(schema.into()),
        }
    }

    pub fn sql(text: impl Into<String>) -> Self {
        Source::SqlText { sql: text.into() }
    }

    pub fn pick(self, columns: Vec<ColumnExpression>) -> Self {
        Source::Pick {
            base: Box::new(self),
            columns,
        }
    }

    pub fn filter(self, condition: ColumnExpression) -> Self {
        Source::Filter {
            base: Box::new(self),
            condition,
        }
    }

    pub fn sort(self, sort: ColumnExpression, dir: SortDir) -> Self {
        Source::Sort {
            base: Box::new(self),
            sort,
            dir,
            nulls: NullsOrder::Auto,
        }
    }

    pub fn limit(self, limit: u64, offset: Option<u64>) -> Self {
        Source::Limit {
            base: Box::new(self),
            limit: Some(limit),
            offset,
        }
    }

    pub fn aggregate(self, groups: Vec<ColumnExpression>, measures: Vec<ColumnExpression>) -> Self {
        Source::Aggregate {
            base: Box::new(self),
            groups,
            measures,
        }
    }

    pub fn join_one(self, relation: Namespace, condition: ColumnExpression, drop_unmatched: bool) -> Self {
        Source::JoinOne {
            base: Box::new(self),
            relation: Box::new(relation),
            condition,
            drop_unmatched,
        }
    }

    pub fn union(self, other: Source) -> Self {
        Source::Union {
            base: Box::new(self),
            other: Box::new(other),
        }
    }

    pub fn match_steps(
        self,
        activity_schema: ActivitySchema,
        steps: Vec<ColumnExpression>,
        partition_start_events: Vec<ColumnExpression>,
        time_limit_seconds: Option<i64>,
    ) -> Self {
        Source::MatchSteps {
            base: Box::new(self),
            activity_schema: Box::new(activity_schema),
            steps,
            partition_start_events,
            time_limit_seconds,
        }
    }

    /// The base this variant wraps, if any (`TableName`/`SqlText` are
    /// leaves).
    pub fn base(&self) -> Option<&Source> {
        match self {
            Source::TableName { .. } | Source::SqlText { .. } => None,
            Source::Pick { base, .. }
            | Source::Filter { base, .. }
            | Source::Sort { base, .. }
            | Source::Limit { base, .. }
            | Source::Aggregate { base, .. }
            | Source::JoinOne { base, .. }
            | Source::Union { base, .. }
            | Source::MatchSteps { base, .. } => Some(base),
        }
    }

    /// Deterministic content hash of the wire form, used to key the
    /// alias-checkpoint cache (spec.md §4.2, §9 "avoid pointer-identity
    /// comparisons").
    pub fn stable_key(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn wire_version() -> u32 {
        WIRE_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_sources_have_no_base() {
        assert!(Source::table("sales").base().is_none());
        assert!(Source::sql("select 1").base().is_none());
    }

    #[test]
    fn non_leaf_sources_wrap_base() {
        let s = Source::table("sales").filter(ColumnExpression::column("x").eq(ColumnExpression::int(1)));
        assert!(matches!(s.base(), Some(Source::TableName { .. })));
    }

    #[test]
    fn stable_key_identical_for_structurally_equal_sources() {
        let a = Source::table("sales");
        let b = Source::table("sales");
        let c = Source::table("orders");
        assert_eq!(a.stable_key(), b.stable_key());
        assert_ne!(a.stable_key(), c.stable_key());
    }
}
