//! Joined-relation namespaces (spec.md §3, §GLOSSARY "Namespace").

use serde::{Deserialize, Serialize};

use super::identifiable_map::Identifiable;
use super::model::Model;

/// An aliased relation reachable through a join. Attribute access on a
/// namespace returns the attribute from `nested_model`, disambiguated to
/// this namespace's identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    pub identifier: String,
    pub nested_model: Box<Model>,
    /// The attribute on the *owning* model whose value is this
    /// namespace's join key, when the namespace was created via a
    /// foreign-key shorthand rather than an explicit condition.
    pub through_foreign_key_attr: Option<String>,
}

impl Namespace {
    pub fn new(identifier: impl Into<String>, nested_model: Model) -> Self {
        Namespace {
            identifier: identifier.into(),
            nested_model: Box::new(nested_model),
            through_foreign_key_attr: None,
        }
    }

    pub fn through_foreign_key(mut self, attr: impl Into<String>) -> Self {
        self.through_foreign_key_attr = Some(attr.into());
        self
    }
}

impl Identifiable for Namespace {
    fn identifier(&self) -> &str {
        &self.identifier
    }
}
