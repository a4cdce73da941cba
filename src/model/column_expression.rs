//! The expression IR (spec.md §3 `ColumnExpression`, §4.5).
//!
//! A closed sum type mapped onto a tagged Rust enum (spec.md §9: "avoid
//! class hierarchies"). Builder methods return new nodes; nothing here
//! mutates in place, matching the teacher's own fluent `Expr` builder-method
//! idiom (the now-removed `model/expr.rs`) generalized to the richer
//! 9-variant algebra `original_source/src/model/column_expression/*.py`
//! describes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::identifiable_map::Identifiable;
use super::literal::Literal;
use super::model::Model;

const WIRE_VERSION: u32 = 1;

/// Comparison/arithmetic/membership operators carried by `BinaryOp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Add,
    Sub,
    Mul,
    Div,
    In,
    Like,
    ILike,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::In => "IN",
            Operator::Like => "LIKE",
            Operator::ILike => "ILIKE",
        }
    }

    /// Negation used by the `not(comparison)` preprocessor rewrite
    /// (spec.md §4.5 preprocessing bullet 3).
    pub fn negated(&self) -> Option<Operator> {
        match self {
            Operator::Eq => Some(Operator::Ne),
            Operator::Ne => Some(Operator::Eq),
            Operator::Lt => Some(Operator::Gte),
            Operator::Lte => Some(Operator::Gt),
            Operator::Gt => Some(Operator::Lte),
            Operator::Gte => Some(Operator::Lt),
            _ => None,
        }
    }
}

/// Truncation grain for `Granularity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grain {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl Grain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grain::Second => "second",
            Grain::Minute => "minute",
            Grain::Hour => "hour",
            Grain::Day => "day",
            Grain::Week => "week",
            Grain::Month => "month",
            Grain::Quarter => "quarter",
            Grain::Year => "year",
        }
    }
}

/// Binary-op options (e.g. a case-insensitivity toggle used by `LIKE`
/// lowering, or the array-vs-substring mode hint consumed by `IN`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BinaryOpOptions {
    pub case_insensitive: bool,
}

/// The expression sum type (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "subType")]
pub enum ColumnExpression {
    ColumnName {
        name: String,
        namespace_identifier: Option<String>,
        manually_set_identifier: Option<String>,
    },
    SqlText {
        sql: String,
        namespace_identifier: Option<String>,
        nested_expressions: BTreeMap<String, ColumnExpression>,
        manually_set_identifier: Option<String>,
    },
    PyValue {
        value: Literal,
        manually_set_identifier: Option<String>,
    },
    BinaryOp {
        left: Box<ColumnExpression>,
        op: Operator,
        right: Box<ColumnExpression>,
        options: BinaryOpOptions,
        manually_set_identifier: Option<String>,
    },
    Cases {
        cases: Vec<(ColumnExpression, ColumnExpression)>,
        other: Option<Box<ColumnExpression>>,
        manually_set_identifier: Option<String>,
    },
    Granularity {
        base: Box<ColumnExpression>,
        grain: Grain,
        manually_set_identifier: Option<String>,
    },
    FormatTimestamp {
        base: Box<ColumnExpression>,
        format: String,
        manually_set_identifier: Option<String>,
    },
    SqlFunction {
        name: String,
        args: Vec<ColumnExpression>,
        inherit_identifier: bool,
        manually_set_identifier: Option<String>,
    },
    Subquery {
        model: Box<Model>,
        manually_set_identifier: Option<String>,
    },
}

impl ColumnExpression {
    pub fn column(name: impl Into<String>) -> Self {
        ColumnExpression::ColumnName {
            name: name.into(),
            namespace_identifier: None,
            manually_set_identifier: None,
        }
    }

    pub fn sql(text: impl Into<String>) -> Self {
        ColumnExpression::SqlText {
            sql: text.into(),
            namespace_identifier: None,
            nested_expressions: BTreeMap::new(),
            manually_set_identifier: None,
        }
    }

    pub fn star() -> Self {
        ColumnExpression::sql("*")
    }

    pub fn literal(value: Literal) -> Self {
        ColumnExpression::PyValue {
            value,
            manually_set_identifier: None,
        }
    }

    pub fn int(v: i64) -> Self {
        Self::literal(Literal::Int(v))
    }

    pub fn str_lit(v: impl Into<String>) -> Self {
        Self::literal(Literal::Str(v.into()))
    }

    pub fn func(name: impl Into<String>, args: Vec<ColumnExpression>) -> Self {
        ColumnExpression::SqlFunction {
            name: name.into(),
            args,
            inherit_identifier: false,
            manually_set_identifier: None,
        }
    }

    pub fn cases(cases: Vec<(ColumnExpression, ColumnExpression)>, other: Option<ColumnExpression>) -> Self {
        ColumnExpression::Cases {
            cases,
            other: other.map(Box::new),
            manually_set_identifier: None,
        }
    }

    fn binary(self, op: Operator, rhs: ColumnExpression) -> Self {
        ColumnExpression::BinaryOp {
            left: Box::new(self),
            op,
            right: Box::new(rhs),
            options: BinaryOpOptions::default(),
            manually_set_identifier: None,
        }
    }

    pub fn eq(self, rhs: ColumnExpression) -> Self {
        self.binary(Operator::Eq, rhs)
    }
    pub fn ne(self, rhs: ColumnExpression) -> Self {
        self.binary(Operator::Ne, rhs)
    }
    pub fn lt(self, rhs: ColumnExpression) -> Self {
        self.binary(Operator::Lt, rhs)
    }
    pub fn lte(self, rhs: ColumnExpression) -> Self {
        self.binary(Operator::Lte, rhs)
    }
    pub fn gt(self, rhs: ColumnExpression) -> Self {
        self.binary(Operator::Gt, rhs)
    }
    pub fn gte(self, rhs: ColumnExpression) -> Self {
        self.binary(Operator::Gte, rhs)
    }
    pub fn add(self, rhs: ColumnExpression) -> Self {
        self.binary(Operator::Add, rhs)
    }
    pub fn sub(self, rhs: ColumnExpression) -> Self {
        self.binary(Operator::Sub, rhs)
    }
    pub fn mul(self, rhs: ColumnExpression) -> Self {
        self.binary(Operator::Mul, rhs)
    }
    pub fn div(self, rhs: ColumnExpression) -> Self {
        self.binary(Operator::Div, rhs)
    }
    pub fn like(self, rhs: ColumnExpression) -> Self {
        self.binary(Operator::Like, rhs)
    }

    /// `x.in_([...])`: the RHS is a `PyValue(List)` or a `Subquery`.
    pub fn in_list(self, values: Vec<Literal>) -> Self {
        self.binary(Operator::In, ColumnExpression::literal(Literal::List(values)))
    }

    pub fn in_model(self, model: Model) -> Self {
        self.binary(
            Operator::In,
            ColumnExpression::Subquery {
                model: Box::new(model),
                manually_set_identifier: None,
            },
        )
    }

    pub fn by_grain(self, grain: Grain) -> Self {
        ColumnExpression::Granularity {
            base: Box::new(self),
            grain,
            manually_set_identifier: None,
        }
    }

    pub fn by_week(self) -> Self {
        self.by_grain(Grain::Week)
    }
    pub fn by_day(self) -> Self {
        self.by_grain(Grain::Day)
    }
    pub fn by_month(self) -> Self {
        self.by_grain(Grain::Month)
    }
    pub fn by_year(self) -> Self {
        self.by_grain(Grain::Year)
    }

    pub fn format(self, format: impl Into<String>) -> Self {
        ColumnExpression::FormatTimestamp {
            base: Box::new(self),
            format: format.into(),
            manually_set_identifier: None,
        }
    }

    pub fn named(self, identifier: impl Into<String>) -> Self {
        self.with_manually_set_identifier(Some(identifier.into()))
    }

    fn with_manually_set_identifier(mut self, id: Option<String>) -> Self {
        match &mut self {
            ColumnExpression::ColumnName {
                manually_set_identifier,
                ..
            }
            | ColumnExpression::SqlText {
                manually_set_identifier,
                ..
            }
            | ColumnExpression::PyValue {
                manually_set_identifier,
                ..
            }
            | ColumnExpression::BinaryOp {
                manually_set_identifier,
                ..
            }
            | ColumnExpression::Cases {
                manually_set_identifier,
                ..
            }
            | ColumnExpression::Granularity {
                manually_set_identifier,
                ..
            }
            | ColumnExpression::FormatTimestamp {
                manually_set_identifier,
                ..
            }
            | ColumnExpression::SqlFunction {
                manually_set_identifier,
                ..
            }
            | ColumnExpression::Subquery {
                manually_set_identifier,
                ..
            } => *manually_set_identifier = id,
        }
        self
    }

    pub fn manually_set_identifier(&self) -> Option<&str> {
        match self {
            ColumnExpression::ColumnName {
                manually_set_identifier,
                ..
            }
            | ColumnExpression::SqlText {
                manually_set_identifier,
                ..
            }
            | ColumnExpression::PyValue {
                manually_set_identifier,
                ..
            }
            | ColumnExpression::BinaryOp {
                manually_set_identifier,
                ..
            }
            | ColumnExpression::Cases {
                manually_set_identifier,
                ..
            }
            | ColumnExpression::Granularity {
                manually_set_identifier,
                ..
            }
            | ColumnExpression::FormatTimestamp {
                manually_set_identifier,
                ..
            }
            | ColumnExpression::SqlFunction {
                manually_set_identifier,
                ..
            }
            | ColumnExpression::Subquery {
                manually_set_identifier,
                ..
            } => manually_set_identifier.as_deref(),
        }
    }

    /// The identifier this expression would carry in a SELECT list if no
    /// `manually_set_identifier` is present. May be `None` (e.g. the
    /// literal `*` expression, or a `SqlText` with no obvious head token).
    ///
    /// Per spec.md §9's explicit instruction: the original's
    /// `SqlTextColumnExpression.default_identifier` has an off-by-one bug
    /// (`tokens[1]` when `len(tokens) == 1`); this port does **not**
    /// mirror it — a single-token SQL body's default identifier is that
    /// token, not a panic/out-of-range access.
    pub fn default_identifier(&self) -> Option<String> {
        match self {
            ColumnExpression::ColumnName { name, .. } => Some(name.clone()),
            ColumnExpression::SqlText { sql, .. } => {
                if sql.trim() == "*" {
                    return None;
                }
                let tokens: Vec<&str> = sql.split_whitespace().collect();
                tokens.last().map(|t| {
                    t.trim_matches(|c: char| !c.is_alphanumeric() && c != '_')
                        .to_string()
                })
            }
            ColumnExpression::PyValue { .. } => None,
            ColumnExpression::BinaryOp { .. } => None,
            ColumnExpression::Cases { .. } => None,
            ColumnExpression::Granularity { base, .. } => base.default_identifier(),
            ColumnExpression::FormatTimestamp { base, .. } => base.default_identifier(),
            ColumnExpression::SqlFunction {
                name,
                args,
                inherit_identifier,
                ..
            } => {
                if *inherit_identifier {
                    args.first().and_then(|a| a.default_identifier())
                } else {
                    Some(name.clone())
                }
            }
            ColumnExpression::Subquery { .. } => None,
        }
    }

    /// The identifier this expression carries when selected
    /// (`manually_set_identifier ?? default_identifier()`).
    pub fn effective_identifier(&self) -> Option<String> {
        self.manually_set_identifier()
            .map(str::to_string)
            .or_else(|| self.default_identifier())
    }

    /// Whether this is the bare `*` wildcard (has no identifier, cannot be
    /// `.named()`).
    pub fn is_star(&self) -> bool {
        matches!(self, ColumnExpression::SqlText { sql, .. } if sql.trim() == "*")
    }

    /// Bind a namespace qualifier onto this expression (§3 "disambiguated").
    pub fn disambiguated(&self, namespace: &str) -> ColumnExpression {
        let mut copy = self.clone();
        match &mut copy {
            ColumnExpression::ColumnName {
                namespace_identifier,
                ..
            }
            | ColumnExpression::SqlText {
                namespace_identifier,
                ..
            } => *namespace_identifier = Some(namespace.to_string()),
            ColumnExpression::BinaryOp { left, right, .. } => {
                *left = Box::new(left.disambiguated(namespace));
                *right = Box::new(right.disambiguated(namespace));
            }
            ColumnExpression::Cases { cases, other, .. } => {
                for (cond, val) in cases.iter_mut() {
                    *cond = cond.disambiguated(namespace);
                    *val = val.disambiguated(namespace);
                }
                if let Some(o) = other {
                    *o = Box::new(o.disambiguated(namespace));
                }
            }
            ColumnExpression::Granularity { base, .. } | ColumnExpression::FormatTimestamp { base, .. } => {
                *base = Box::new(base.disambiguated(namespace));
            }
            ColumnExpression::SqlFunction { args, .. } => {
                for a in args.iter_mut() {
                    *a = a.disambiguated(namespace);
                }
            }
            ColumnExpression::PyValue { .. } | ColumnExpression::Subquery { .. } => {}
        }
        copy
    }

    /// Stable content fingerprint of the wire form, used for alias
    /// checkpoint keying and preprocessing idempotency (spec.md §4.2, §9).
    pub fn stable_key(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Recursively visit every nested expression (post-order would be done
    /// by the caller; this provides pre-order children access for walks
    /// like reference inlining and preprocessing).
    pub fn children(&self) -> Vec<&ColumnExpression> {
        match self {
            ColumnExpression::ColumnName { .. } | ColumnExpression::PyValue { .. } | ColumnExpression::Subquery { .. } => {
                Vec::new()
            }
            ColumnExpression::SqlText {
                nested_expressions, ..
            } => nested_expressions.values().collect(),
            ColumnExpression::BinaryOp { left, right, .. } => vec![left, right],
            ColumnExpression::Cases { cases, other, .. } => {
                let mut out: Vec<&ColumnExpression> = cases.iter().flat_map(|(c, v)| vec![c, v]).collect();
                if let Some(o) = other {
                    out.push(o);
                }
                out
            }
            ColumnExpression::Granularity { base, .. } | ColumnExpression::FormatTimestamp { base, .. } => {
                vec![base]
            }
            ColumnExpression::SqlFunction { args, .. } => args.iter().collect(),
        }
    }

    pub fn wire_version() -> u32 {
        WIRE_VERSION
    }
}

impl Identifiable for ColumnExpression {
    fn identifier(&self) -> &str {
        // Only meaningful once an expression has a manually-set identifier
        // (the map key used by `Model::attributes`/`measures`); callers
        // must `.named(...)` an expression before inserting it into an
        // `IdentifiableMap`.
        self.manually_set_identifier().unwrap_or("")
    }
}
