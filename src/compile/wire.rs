//! The JSON wire-format envelope (spec.md §6): every IR node serializes as
//! `{type: <kind>, subType: <variant>, ...fields, _version: N}`, and
//! deserialization asserts `_version` matches the crate's current schema
//! version before decoding, raising `WireFormatVersionError` on mismatch.
//!
//! `ColumnExpression`/`Source`'s own `#[serde(tag = "subType")]` derives
//! already produce the `subType` discriminator; this module only adds the
//! outer `type`/`_version` envelope fields and the version check, so the
//! inner derives stay free of versioning concerns.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{CompileError, InternalCompilationError, WireFormatVersionError};
use crate::model::{ColumnExpression, Model, Source};

fn wrap(type_name: &str, version: u32, value: &impl Serialize) -> Result<Value, CompileError> {
    let mut json = serde_json::to_value(value)
        .map_err(|e| CompileError::from(InternalCompilationError::new(format!("failed to serialize {type_name}: {e}"))))?;
    match &mut json {
        Value::Object(map) => {
            map.insert("type".to_string(), Value::String(type_name.to_string()));
            map.insert("_version".to_string(), Value::from(version));
        }
        _ => {
            return Err(CompileError::from(InternalCompilationError::new(format!(
                "{type_name} did not serialize to a JSON object"
            ))))
        }
    }
    Ok(json)
}

fn unwrap<T: DeserializeOwned>(type_name: &str, mut json: Value, expected_version: u32) -> Result<T, CompileError> {
    let found_version = match json.get("_version").and_then(Value::as_u64) {
        Some(v) => v as u32,
        None => {
            return Err(CompileError::from(InternalCompilationError::new(format!(
                "{type_name} payload is missing its `_version` field"
            ))))
        }
    };
    if found_version != expected_version {
        return Err(CompileError::from(WireFormatVersionError::for_versions(expected_version, found_version)));
    }
    if let Value::Object(map) = &mut json {
        map.remove("_version");
        map.remove("type");
    }
    serde_json::from_value(json).map_err(|e| CompileError::from(InternalCompilationError::new(format!("failed to deserialize {type_name}: {e}"))))
}

/// Serialize a `ColumnExpression` to its versioned wire envelope.
pub fn column_expression_to_json(expr: &ColumnExpression) -> Result<Value, CompileError> {
    wrap("ColumnExpression", ColumnExpression::wire_version(), expr)
}

/// Deserialize a `ColumnExpression` from its versioned wire envelope.
pub fn column_expression_from_json(json: Value) -> Result<ColumnExpression, CompileError> {
    unwrap("ColumnExpression", json, ColumnExpression::wire_version())
}

/// Serialize a `Source` to its versioned wire envelope.
pub fn source_to_json(source: &Source) -> Result<Value, CompileError> {
    wrap("Source", Source::wire_version(), source)
}

/// Deserialize a `Source` from its versioned wire envelope.
pub fn source_from_json(json: Value) -> Result<Source, CompileError> {
    unwrap("Source", json, Source::wire_version())
}

/// Serialize a `Model` to its versioned wire envelope.
pub fn model_to_json(model: &Model) -> Result<Value, CompileError> {
    wrap("Model", Model::wire_version(), model)
}

/// Deserialize a `Model` from its versioned wire envelope.
pub fn model_from_json(json: Value) -> Result<Model, CompileError> {
    unwrap("Model", json, Model::wire_version())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConnectionHandle, Model};

    #[test]
    fn column_expression_round_trips_through_its_envelope() {
        let expr = ColumnExpression::column("revenue").named("total");
        let json = column_expression_to_json(&expr).unwrap();
        assert_eq!(json.get("type").and_then(Value::as_str), Some("ColumnExpression"));
        assert_eq!(json.get("subType").and_then(Value::as_str), Some("ColumnName"));
        assert_eq!(json.get("_version").and_then(Value::as_u64), Some(1));

        let back = column_expression_from_json(json).unwrap();
        assert_eq!(back, expr);
    }

    #[test]
    fn source_round_trips_through_its_envelope() {
        let source = Source::table("sales");
        let json = source_to_json(&source).unwrap();
        assert_eq!(json.get("type").and_then(Value::as_str), Some("Source"));
        assert_eq!(json.get("subType").and_then(Value::as_str), Some("TableName"));

        let back = source_from_json(json).unwrap();
        assert_eq!(back, source);
    }

    #[test]
    fn model_round_trips_through_its_envelope() {
        let model = Model::new(ConnectionHandle::new("duckdb"), Source::table("sales"));
        let json = model_to_json(&model).unwrap();
        assert_eq!(json.get("type").and_then(Value::as_str), Some("Model"));

        let back = model_from_json(json).unwrap();
        assert_eq!(back, model);
    }

    #[test]
    fn mismatched_version_raises_wire_format_error() {
        let mut json = column_expression_to_json(&ColumnExpression::column("x")).unwrap();
        json["_version"] = Value::from(99u64);
        let err = column_expression_from_json(json).unwrap_err();
        assert!(matches!(err, CompileError::WireFormat(WireFormatVersionError::PayloadNewerThanCrate { .. })));
    }

    #[test]
    fn missing_version_field_is_an_internal_error_not_a_silent_default() {
        let json = serde_json::json!({"subType": "ColumnName", "name": "x"});
        let err = column_expression_from_json(json).unwrap_err();
        assert!(matches!(err, CompileError::Internal(_)));
    }
}
