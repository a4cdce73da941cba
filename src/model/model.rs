//! The immutable `Model` container (spec.md §3 `Model`).
//!
//! Grounded on `original_source/src/model/model.py` and the teacher's
//! copy-on-write builder idiom used throughout its own model layer:
//! every `with_*` method takes `self` by value and returns a new `Model`,
//! never mutating in place.

use serde::{Deserialize, Serialize};

use super::column_expression::ColumnExpression;
use super::identifiable_map::IdentifiableMap;
use super::literal::Secret;
use super::namespace::Namespace;
use super::source::{ActivitySchema, Source};

const WIRE_VERSION: u32 = 1;

/// Opaque connection handle. The core holds it only to thread through to
/// the Execution Driver (spec.md §1 "out of scope"); it never interprets
/// the contents beyond the redacted `Secret` wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionHandle {
    pub driver_name: String,
    pub credential: Option<Secret>,
}

impl ConnectionHandle {
    pub fn new(driver_name: impl Into<String>) -> Self {
        ConnectionHandle {
            driver_name: driver_name.into(),
            credential: None,
        }
    }

    pub fn with_credential(mut self, secret: Secret) -> Self {
        self.credential = Some(secret);
        self
    }
}

fn default_primary_key() -> ColumnExpression {
    ColumnExpression::column("id")
}

/// Identifier validation (spec.md §3): non-empty, and not matching the
/// internal-reserved shape `__.+__`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IdentifierError {
    #[error("identifier must not be empty")]
    Empty,
    #[error("identifier `{0}` is reserved for internal use (matches __.+__)")]
    Reserved(String),
}

pub fn validate_identifier(name: &str) -> Result<(), IdentifierError> {
    if name.is_empty() {
        return Err(IdentifierError::Empty);
    }
    if name.len() > 4 && name.starts_with("__") && name.ends_with("__") {
        return Err(IdentifierError::Reserved(name.to_string()));
    }
    Ok(())
}

/// The immutable description of a dataset and its transformation plan
/// (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub connection: ConnectionHandle,
    pub source: Source,
    pub attributes: IdentifiableMap<ColumnExpression>,
    pub measures: IdentifiableMap<ColumnExpression>,
    pub namespaces: IdentifiableMap<Namespace>,
    #[serde(default = "default_primary_key")]
    pub primary_key: ColumnExpression,
    pub activity_schema: Option<ActivitySchema>,
    #[serde(default)]
    pub custom_meta: std::collections::BTreeMap<String, serde_json::Value>,
}

impl Model {
    pub fn new(connection: ConnectionHandle, source: Source) -> Self {
        Model {
            connection,
            source,
            attributes: IdentifiableMap::new(),
            measures: IdentifiableMap::new(),
            namespaces: IdentifiableMap::new(),
            primary_key: default_primary_key(),
            activity_schema: None,
            custom_meta: Default::default(),
        }
    }

    /// Named attribute/measure accessor, as `attr("name")`/`measure("name")`
    /// resolve against the model once bound (the late-binding half of the
    /// `KeyPath` story, spec.md §9).
    pub fn attr(&self, name: &str) -> Option<&ColumnExpression> {
        self.attributes.get(name)
    }

    pub fn measure(&self, name: &str) -> Option<&ColumnExpression> {
        self.measures.get(name)
    }

    pub fn namespace(&self, name: &str) -> Option<&Namespace> {
        self.namespaces.get(name)
    }

    // -- Builder methods: all return copies (spec.md §3 "Lifecycle"). --

    pub fn with_attribute(mut self, expr: ColumnExpression) -> Result<Self, IdentifierError> {
        let id = expr
            .effective_identifier()
            .ok_or(IdentifierError::Empty)?;
        validate_identifier(&id)?;
        self.attributes.upsert(expr);
        Ok(self)
    }

    pub fn with_measure(mut self, expr: ColumnExpression) -> Result<Self, IdentifierError> {
        let id = expr
            .effective_identifier()
            .ok_or(IdentifierError::Empty)?;
        validate_identifier(&id)?;
        self.measures.upsert(expr);
        Ok(self)
    }

    pub fn with_namespace(mut self, ns: Namespace) -> Self {
        self.namespaces.upsert(ns);
        self
    }

    pub fn with_primary_key(mut self, expr: ColumnExpression) -> Self {
        self.primary_key = expr;
        self
    }

    pub fn with_activity_schema(mut self, schema: ActivitySchema) -> Self {
        self.activity_schema = Some(schema);
        self
    }

    pub fn with_filter(mut self, condition: ColumnExpression) -> Self {
        self.source = self.source.filter(condition);
        self
    }

    pub fn with_pick(mut self, columns: Vec<ColumnExpression>) -> Self {
        self.source = self.source.pick(columns);
        self
    }

    pub fn with_sort(mut self, sort: ColumnExpression, dir: super::source::SortDir) -> Self {
        self.source = self.source.sort(sort, dir);
        self
    }

    pub fn with_limit(mut self, limit: u64, offset: Option<u64>) -> Self {
        self.source = self.source.limit(limit, offset);
        self
    }

    /// Aggregating resets the attribute/measure/namespace maps: the
    /// resulting model's columns are exactly `groups ++ measures`
    /// (spec.md §4.4 "Aggregate" folding rule: "Reset attribute/measure/
    /// namespace maps in the resulting model").
    pub fn with_aggregate(
        mut self,
        groups: Vec<ColumnExpression>,
        measures: Vec<ColumnExpression>,
    ) -> Result<Self, IdentifierError> {
        self.source = self.source.aggregate(groups.clone(), measures.clone());
        self.attributes = IdentifiableMap::new();
        self.measures = IdentifiableMap::new();
        self.namespaces = IdentifiableMap::new();
        for g in groups {
            let id = g.effective_identifier().ok_or(IdentifierError::Empty)?;
            validate_identifier(&id)?;
            self.attributes.upsert(g);
        }
        for m in measures {
            let id = m.effective_identifier().ok_or(IdentifierError::Empty)?;
            validate_identifier(&id)?;
            self.measures.upsert(m);
        }
        Ok(self)
    }

    pub fn with_join_one(
        mut self,
        named: impl Into<String>,
        nested: Model,
        condition: ColumnExpression,
        drop_unmatched: bool,
    ) -> Self {
        let identifier = named.into();
        let ns = Namespace::new(identifier.clone(), nested);
        self.source = self.source.join_one(ns.clone(), condition, drop_unmatched);
        self.namespaces.upsert(ns);
        self
    }

    pub fn with_union(mut self, other: Model) -> Self {
        self.source = self.source.union(other.source);
        self
    }

    pub fn with_match_steps(
        mut self,
        activity_schema: ActivitySchema,
        steps: Vec<ColumnExpression>,
        partition_start_events: Vec<ColumnExpression>,
        time_limit_seconds: Option<i64>,
    ) -> Self {
        self.activity_schema = Some(activity_schema.clone());
        self.source = self
            .source
            .match_steps(activity_schema, steps, partition_start_events, time_limit_seconds);
        self
    }

    pub fn with_custom_meta(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.custom_meta.insert(key.into(), value);
        self
    }

    pub fn wire_version() -> u32 {
        WIRE_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_model() -> Model {
        Model::new(ConnectionHandle::new("duckdb"), Source::table("sales"))
    }

    #[test]
    fn builder_purity_with_filter_does_not_mutate_original() {
        let m = base_model();
        let before = m.clone();
        let _after = m.clone().with_filter(ColumnExpression::column("x").eq(ColumnExpression::int(1)));
        assert_eq!(m, before);
    }

    #[test]
    fn reserved_identifier_is_rejected() {
        let m = base_model();
        let result = m.with_attribute(ColumnExpression::column("x").named("__internal__"));
        assert!(matches!(result, Err(IdentifierError::Reserved(_))));
    }

    #[test]
    fn aggregate_resets_attribute_and_measure_maps() {
        let m = base_model()
            .with_attribute(ColumnExpression::column("region"))
            .unwrap()
            .with_measure(ColumnExpression::func("count", vec![]).named("count"))
            .unwrap();

        let aggregated = m
            .with_aggregate(
                vec![ColumnExpression::column("region")],
                vec![ColumnExpression::func("count", vec![]).named("count")],
            )
            .unwrap();

        assert_eq!(aggregated.attributes.len(), 1);
        assert_eq!(aggregated.measures.len(), 1);
        assert!(aggregated.attributes.contains("region"));
    }

    #[test]
    fn default_primary_key_is_id_column() {
        let m = base_model();
        assert_eq!(m.primary_key, ColumnExpression::column("id"));
    }
}
