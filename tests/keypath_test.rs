//! Integration tests for the deferred-accessor `KeyPath` value (spec.md §4.1).

use std::collections::BTreeMap;

use mantis::model::keypath::{resolve, resolve_all_nested};
use mantis::model::{KeyOrIndex, KeyPath, KeyPathCtx, KeyPathError, KeyPathRoot, KeyPathRootLike, KeyPathValue};

#[derive(Debug, Clone, PartialEq)]
enum Json {
    Map(BTreeMap<String, Json>),
    List(Vec<Json>),
    Int(i64),
    Nested(Box<KeyPath>),
}

impl KeyPathRootLike for Json {
    fn get_property(&self, name: &str) -> Result<Self, KeyPathError> {
        match self {
            Json::Map(m) => m.get(name).cloned().ok_or_else(|| KeyPathError::NoSuchProperty(name.to_string())),
            _ => Err(KeyPathError::NoSuchProperty(name.to_string())),
        }
    }

    fn get_subscript(&self, key: &KeyOrIndex) -> Result<Self, KeyPathError> {
        match (self, key) {
            (Json::Map(m), KeyOrIndex::Key(k)) => m.get(k).cloned().ok_or_else(|| KeyPathError::NoSuchSubscript(key.clone())),
            (Json::List(items), KeyOrIndex::Index(i)) => items
                .get(*i as usize)
                .cloned()
                .ok_or_else(|| KeyPathError::NoSuchSubscript(key.clone())),
            _ => Err(KeyPathError::NoSuchSubscript(key.clone())),
        }
    }

    fn call(&self, args: Vec<Self>, _kwargs: Vec<(String, Self)>, ctx: Option<KeyPathCtx<Self>>) -> Result<Self, KeyPathError> {
        // `len(...)` style call: ignore args, count elements on the current root.
        if ctx.is_some() {
            // Callers that asked for ctx get the remaining-path length as
            // a cheap stand-in observation that the ctx actually arrived.
            let remaining = ctx.unwrap().remaining_keypath().len() as i64;
            return Ok(Json::Int(remaining));
        }
        match self {
            Json::List(items) => Ok(Json::Int((items.len() + args.len()) as i64)),
            _ => Err(KeyPathError::CallFailed("not callable".into())),
        }
    }

    fn as_nested_keypath(&self) -> Option<&KeyPath> {
        match self {
            Json::Nested(kp) => Some(kp),
            _ => None,
        }
    }
}

fn map(pairs: &[(&str, Json)]) -> Json {
    Json::Map(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
}

#[test]
fn root_keypath_resolves_to_the_root_itself() {
    let root = Json::Int(42);
    let kp = KeyPath::root();
    assert_eq!(resolve(&root, &kp).unwrap(), Json::Int(42));
}

#[test]
fn property_chain_resolves_nested_access() {
    let root = map(&[("a", map(&[("b", Json::Int(7))]))]);
    let kp = KeyPath::root().prop("a").prop("b");
    assert_eq!(resolve(&root, &kp).unwrap(), Json::Int(7));
}

#[test]
fn subscript_chain_resolves_list_and_map_indices() {
    let root = map(&[("items", Json::List(vec![Json::Int(1), Json::Int(2), Json::Int(3)]))]);
    let kp = KeyPath::root().prop("items").index(1_i64);
    assert_eq!(resolve(&root, &kp).unwrap(), Json::Int(2));
}

#[test]
fn unknown_property_resolves_to_an_error() {
    let root = map(&[("a", Json::Int(1))]);
    let kp = KeyPath::root().prop("missing");
    assert!(matches!(resolve(&root, &kp), Err(KeyPathError::NoSuchProperty(ref n)) if n == "missing"));
}

#[test]
fn call_component_resolves_nested_args_against_the_outer_root() {
    let root = map(&[("items", Json::List(vec![Json::Int(1), Json::Int(2)]))]);
    let kp = KeyPath::root().prop("items").call(vec![]);
    assert_eq!(resolve(&root, &kp).unwrap(), Json::Int(2));
}

#[test]
fn call_with_ctx_passes_a_keypath_ctx_to_the_callee() {
    let root = map(&[("items", Json::List(vec![Json::Int(1)]))]);
    let kp = KeyPath::root().prop("items").call_with_ctx(vec![], vec![]);
    // The test callee reports `ctx.remaining_keypath().len()` instead of
    // actually calling, to observe that a ctx was built and is accurate:
    // the `Call` is the last component, so nothing remains after it.
    assert_eq!(resolve(&root, &kp).unwrap(), Json::Int(0));
}

#[test]
fn bound_keypath_starts_from_its_captured_root_before_walking_components() {
    let root = map(&[("inner", map(&[("x", Json::Int(5))]))]);

    // `Captured(_.inner)` resolves against the same ambient root first,
    // landing on the inner map; `.prop("x")` then walks from there.
    let captured = KeyPath::root().prop("inner");
    let bound = KeyPath::bound(KeyPathRoot::Captured(captured)).prop("x");
    assert!(bound.is_bound());
    assert_eq!(resolve(&root, &bound).unwrap(), Json::Int(5));

    // `Ambient` is the plain case: walk components straight from `root`.
    let ambient_bound = KeyPath::bound(KeyPathRoot::Ambient).prop("inner").prop("x");
    assert_eq!(resolve(&root, &ambient_bound).unwrap(), Json::Int(5));
}

#[test]
fn nested_keypath_values_resolve_recursively() {
    // A value that is itself a `KeyPath` (step 4 of the resolution
    // algorithm) resolves again against the same root.
    let root = map(&[("alias", Json::Nested(Box::new(KeyPath::root().prop("real")))), ("real", Json::Int(3))]);
    let kp = KeyPath::root().prop("alias");
    assert_eq!(resolve(&root, &kp).unwrap(), Json::Int(3));
}

#[test]
fn resolve_all_nested_flattens_a_list_of_values_and_keypaths() {
    let root = map(&[("a", Json::Int(1)), ("b", Json::Int(2))]);
    let value: KeyPathValue<i64> = KeyPathValue::List(vec![
        KeyPathValue::Value(10),
        KeyPathValue::Deferred(KeyPath::root().prop("a")),
        KeyPathValue::Deferred(KeyPath::root().prop("b")),
    ]);
    let resolved = resolve_all_nested(&root, &value, &|r: &Json| match r {
        Json::Int(i) => Ok(*i),
        _ => Err(KeyPathError::CallFailed("not an int".into())),
    })
    .unwrap();
    assert_eq!(resolved, vec![10, 1, 2]);
}

#[test]
fn display_renders_a_readable_accessor_chain() {
    let kp = KeyPath::root().prop("a").index("b").call(vec![]);
    assert_eq!(kp.to_string(), "_.a[\"b\"](0 args, 0 kwargs)");
}
