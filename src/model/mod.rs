//! The Model IR: expressions, sources, namespaces, and the `Model`
//! container itself, plus the supporting `KeyPath`/`IdentifiableMap`
//! utilities (spec.md §3, §4.1, §4.2).

pub mod column_expression;
pub mod identifiable_map;
pub mod keypath;
pub mod literal;
pub mod model;
pub mod namespace;
pub mod source;
pub mod types;

pub use column_expression::{BinaryOpOptions, ColumnExpression, Grain, Operator};
pub use identifiable_map::{Identifiable, IdentifiableMap};
pub use keypath::{KeyOrIndex, KeyPath, KeyPathArg, KeyPathComponent, KeyPathCtx, KeyPathError, KeyPathRoot, KeyPathRootLike, KeyPathValue};
pub use literal::{IntervalUnit, Literal, Secret};
pub use model::{ConnectionHandle, IdentifierError, Model};
pub use namespace::Namespace;
pub use source::{ActivitySchema, NullsOrder, Source, SortDir};
pub use types::DataType;
