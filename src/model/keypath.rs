//! Deferred accessor chains (§4.1).
//!
//! A `KeyPath` records a sequence of property/subscript/call components
//! against an as-yet-unknown root, to be resolved later once a concrete
//! root (typically a `Model`) exists. Grounded on
//! `original_source/src/utils/keypath/{keypath,resolve,unwrap,keypath_ctx}.py`,
//! reshaped per spec.md §9's explicit guidance: instead of Python's
//! `__getattr__`/dunder-override interception, this crate exposes explicit
//! builder methods (`.prop(name)`, `.index(key)`, `.call(args)`) and a
//! plain `resolve` function. `BoundKeyPath` and the plain root-relative
//! `KeyPath` collapse into one struct with an optional `bound_root` field;
//! `IterItemKeyPath` becomes `KeyPathComponent::Splice`.

use std::fmt;

/// A resolvable value: either a concrete value or a deferred `KeyPath`.
/// This is the Rust stand-in for "anything a builder method might accept
/// that could itself be a lazy reference" (spec.md §4.1, §9).
#[derive(Debug, Clone, PartialEq)]
pub enum KeyPathValue<T> {
    Value(T),
    Deferred(KeyPath),
    List(Vec<KeyPathValue<T>>),
}

impl<T> KeyPathValue<T> {
    pub fn value(v: T) -> Self {
        KeyPathValue::Value(v)
    }
}

/// A key or index used by `KeyPathComponent::Subscript`.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyOrIndex {
    Key(String),
    Index(i64),
}

impl From<&str> for KeyOrIndex {
    fn from(s: &str) -> Self {
        KeyOrIndex::Key(s.to_string())
    }
}

impl From<i64> for KeyOrIndex {
    fn from(i: i64) -> Self {
        KeyOrIndex::Index(i)
    }
}

/// One link in a `KeyPath`'s accessor chain.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyPathComponent {
    Property(String),
    Subscript(KeyOrIndex),
    /// `args`, `kwargs`, `include_ctx` (pass a `KeyPathCtx` to the callee).
    Call(Vec<KeyPathArg>, Vec<(String, KeyPathArg)>, bool),
    /// Placeholder left by forcing iteration on a `KeyPath`
    /// (`IterItemKeyPath` in the original); expands to a flat splice into
    /// the surrounding collection at resolution time.
    Splice,
}

/// An argument passed to a `Call` component: either a literal token or a
/// nested `KeyPath`, resolved against the *outer* root at call time.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyPathArg {
    Literal(String),
    Nested(KeyPath),
}

/// A deferred accessor chain against an as-yet-unknown root.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPath {
    components: Vec<KeyPathComponent>,
    /// Present for a "bound" key path: records which callable to invoke
    /// once arguments resolve, independent of the ambient `resolve(root, ..)`
    /// root (the original's `BoundKeyPath`).
    bound_root: Option<Box<KeyPathRoot>>,
}

/// What a bound key path resolves its root to before walking components.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyPathRoot {
    /// Resolve against the ambient root passed to `resolve`.
    Ambient,
    /// Resolve against a separately captured root key path.
    Captured(KeyPath),
}

impl KeyPath {
    /// The identity key path (`_`): the root itself, no components yet.
    pub fn root() -> Self {
        KeyPath {
            components: Vec::new(),
            bound_root: None,
        }
    }

    pub fn bound(root: KeyPathRoot) -> Self {
        KeyPath {
            components: Vec::new(),
            bound_root: Some(Box::new(root)),
        }
    }

    pub fn is_bound(&self) -> bool {
        self.bound_root.is_some()
    }

    fn chain(mut self, component: KeyPathComponent) -> Self {
        self.components.push(component);
        self
    }

    pub fn prop(self, name: impl Into<String>) -> Self {
        self.chain(KeyPathComponent::Property(name.into()))
    }

    pub fn index(self, key: impl Into<KeyOrIndex>) -> Self {
        self.chain(KeyPathComponent::Subscript(key.into()))
    }

    pub fn call(self, args: Vec<KeyPathArg>) -> Self {
        self.chain(KeyPathComponent::Call(args, Vec::new(), false))
    }

    pub fn call_with_ctx(self, args: Vec<KeyPathArg>, kwargs: Vec<(String, KeyPathArg)>) -> Self {
        self.chain(KeyPathComponent::Call(args, kwargs, true))
    }

    pub fn splice(self) -> Self {
        self.chain(KeyPathComponent::Splice)
    }

    pub fn components(&self) -> &[KeyPathComponent] {
        &self.components
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_")?;
        for c in &self.components {
            match c {
                KeyPathComponent::Property(name) => write!(f, ".{name}")?,
                KeyPathComponent::Subscript(KeyOrIndex::Key(k)) => write!(f, "[{k:?}]")?,
                KeyPathComponent::Subscript(KeyOrIndex::Index(i)) => write!(f, "[{i}]")?,
                KeyPathComponent::Call(args, kwargs, _) => {
                    write!(f, "(")?;
                    write!(f, "{} args, {} kwargs", args.len(), kwargs.len())?;
                    write!(f, ")")?
                }
                KeyPathComponent::Splice => write!(f, "[*]")?,
            }
        }
        Ok(())
    }
}

/// Context passed to a callee when a `Call` component sets
/// `include_keypath_ctx`.
#[derive(Debug, Clone)]
pub struct KeyPathCtx<'a, R> {
    pub root: &'a R,
    pub current_index: usize,
    pub full_keypath: &'a KeyPath,
}

impl<'a, R> KeyPathCtx<'a, R> {
    pub fn current_component(&self) -> Option<&KeyPathComponent> {
        self.full_keypath.components().get(self.current_index)
    }

    pub fn remaining_keypath(&self) -> &[KeyPathComponent] {
        &self.full_keypath.components()[self.current_index + 1..]
    }
}

/// Anything `resolve` can walk a `KeyPath` against: property/subscript/call
/// access on the crate's own value model. Implemented by whatever concrete
/// resolvable root type a caller defines (typically a thin wrapper around
/// `Model`/`ColumnExpression`); kept generic here since the core IR only
/// needs the *mechanism*, not a fixed root shape.
pub trait KeyPathRootLike: Sized + Clone {
    fn get_property(&self, name: &str) -> Result<Self, KeyPathError>;
    fn get_subscript(&self, key: &KeyOrIndex) -> Result<Self, KeyPathError>;
    fn call(
        &self,
        args: Vec<Self>,
        kwargs: Vec<(String, Self)>,
        ctx: Option<KeyPathCtx<Self>>,
    ) -> Result<Self, KeyPathError>;
    /// If this value is itself a nested `KeyPath` needing re-resolution
    /// (step 4 of spec.md §4.1), return it.
    fn as_nested_keypath(&self) -> Option<&KeyPath> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KeyPathError {
    #[error("no property `{0}` on the resolved root")]
    NoSuchProperty(String),
    #[error("no subscript for key `{0:?}` on the resolved root")]
    NoSuchSubscript(KeyOrIndex),
    #[error("call failed while resolving a key path: {0}")]
    CallFailed(String),
}

/// Resolve a `KeyPath` against a concrete root (spec.md §4.1 algorithm).
///
/// 1. Start `current` = the key path's bound root if present, else `root`.
/// 2. Walk each component, applying property/subscript/call.
/// 3. Nested `KeyPath` arguments to `Call` resolve against the *outer*
///    root, not `current`.
/// 4. If the final value is itself a `KeyPath`, resolve it recursively.
pub fn resolve<R: KeyPathRootLike>(root: &R, keypath: &KeyPath) -> Result<R, KeyPathError> {
    let mut current = match &keypath.bound_root {
        Some(bound) => match bound.as_ref() {
            KeyPathRoot::Ambient => root.clone(),
            KeyPathRoot::Captured(captured) => resolve(root, captured)?,
        },
        None => root.clone(),
    };

    for (idx, component) in keypath.components.iter().enumerate() {
        current = match component {
            KeyPathComponent::Property(name) => current.get_property(name)?,
            KeyPathComponent::Subscript(key) => current.get_subscript(key)?,
            KeyPathComponent::Call(args, kwargs, include_ctx) => {
                let resolved_args = args
                    .iter()
                    .map(|a| resolve_arg(root, a))
                    .collect::<Result<Vec<_>, _>>()?;
                let resolved_kwargs = kwargs
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), resolve_arg(root, v)?)))
                    .collect::<Result<Vec<_>, _>>()?;
                let ctx = if *include_ctx {
                    Some(KeyPathCtx {
                        root,
                        current_index: idx,
                        full_keypath: keypath,
                    })
                } else {
                    None
                };
                current.call(resolved_args, resolved_kwargs, ctx)?
            }
            KeyPathComponent::Splice => current,
        };
    }

    if let Some(nested) = current.as_nested_keypath() {
        let nested = nested.clone();
        return resolve(root, &nested);
    }

    Ok(current)
}

fn resolve_arg<R: KeyPathRootLike>(root: &R, arg: &KeyPathArg) -> Result<R, KeyPathError> {
    match arg {
        KeyPathArg::Nested(kp) => resolve(root, kp),
        KeyPathArg::Literal(_) => Err(KeyPathError::CallFailed(
            "resolve_arg called on a literal argument without a typed carrier".into(),
        )),
    }
}

/// Walk a `KeyPathValue<T>` tree and resolve every nested `KeyPath`,
/// flattening `Splice` components into the surrounding list
/// (`resolve_all_nested_keypaths` in the original).
pub fn resolve_all_nested<T: Clone, R: KeyPathRootLike>(
    root: &R,
    value: &KeyPathValue<T>,
    resolve_leaf: &dyn Fn(&R) -> Result<T, KeyPathError>,
) -> Result<Vec<T>, KeyPathError> {
    match value {
        KeyPathValue::Value(v) => Ok(vec![v.clone()]),
        KeyPathValue::Deferred(kp) => {
            let resolved = resolve(root, kp)?;
            Ok(vec![resolve_leaf(&resolved)?])
        }
        KeyPathValue::List(items) => {
            let mut out = Vec::new();
            for item in items {
                out.extend(resolve_all_nested(root, item, resolve_leaf)?);
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum TestRoot {
        Map(std::collections::BTreeMap<String, TestRoot>),
        Int(i64),
        Nested(Box<KeyPath>),
    }

    impl KeyPathRootLike for TestRoot {
        fn get_property(&self, name: &str) -> Result<Self, KeyPathError> {
            match self {
                TestRoot::Map(m) => m
                    .get(name)
                    .cloned()
                    .ok_or_else(|| KeyPathError::NoSuchProperty(name.to_string())),
                _ => Err(KeyPathError::NoSuchProperty(name.to_string())),
            }
        }
        fn get_subscript(&self, key: &KeyOrIndex) -> Result<Self, KeyPathError> {
            match (self, key) {
                (TestRoot::Map(m), KeyOrIndex::Key(k)) => m
                    .get(k)
                    .cloned()
                    .ok_or_else(|| KeyPathError::NoSuchSubscript(key.clone())),
                _ => Err(KeyPathError::NoSuchSubscript(key.clone())),
            }
        }
        fn call(
            &self,
            _args: Vec<Self>,
            _kwargs: Vec<(String, Self)>,
            _ctx: Option<KeyPathCtx<Self>>,
        ) -> Result<Self, KeyPathError> {
            Err(KeyPathError::CallFailed("not callable in test root".into()))
        }
        fn as_nested_keypath(&self) -> Option<&KeyPath> {
            match self {
                TestRoot::Nested(kp) => Some(kp),
                _ => None,
            }
        }
    }

    #[test]
    fn resolves_simple_property_chain() {
        let mut inner = std::collections::BTreeMap::new();
        inner.insert("b".to_string(), TestRoot::Int(7));
        let mut outer = std::collections::BTreeMap::new();
        outer.insert("a".to_string(), TestRoot::Map(inner));
        let root = TestRoot::Map(outer);

        let kp = KeyPath::root().prop("a").prop("b");
        assert_eq!(resolve(&root, &kp).unwrap(), TestRoot::Int(7));
    }

    #[test]
    fn resolves_recursively_when_result_is_itself_a_keypath() {
        let mut m = std::collections::BTreeMap::new();
        m.insert("x".to_string(), TestRoot::Int(99));
        m.insert(
            "alias".to_string(),
            TestRoot::Nested(Box::new(KeyPath::root().prop("x"))),
        );
        let root = TestRoot::Map(m);

        let kp = KeyPath::root().prop("alias");
        assert_eq!(resolve(&root, &kp).unwrap(), TestRoot::Int(99));
    }

    #[test]
    fn unknown_property_errors() {
        let root = TestRoot::Map(Default::default());
        let kp = KeyPath::root().prop("missing");
        assert!(resolve(&root, &kp).is_err());
    }

    #[test]
    fn display_renders_dotted_chain() {
        let kp = KeyPath::root().prop("a").prop("b").index("c");
        assert_eq!(kp.to_string(), "_.a.b[\"c\"]");
    }
}
