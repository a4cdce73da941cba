//! The compiler's error taxonomy (spec.md §7).
//!
//! Grounded on `src/worker/error.rs`'s `thiserror` idiom (`#[error("...")]`,
//! `#[source]`, manual `From` impls) and the removed `compile.rs`'s
//! `CompileError` composition pattern: five leaf error types, composed by
//! `#[from]` into one top-level `CompileError` that `execute_model` catches
//! at its boundary.

use thiserror::Error;

/// A problem visible to the end user: unknown references, unsupported
/// format tokens for the target dialect, `{{ }}` reference cycles, too
/// many funnel steps, unparseable raw SQL, a feature unsupported on this
/// dialect.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UserCompilationError {
    #[error("unknown attribute or measure reference: `{0}`")]
    UnknownReference(String),

    #[error("unknown namespace: `{0}`")]
    UnknownNamespace(String),

    #[error("expression has no identifier and cannot be selected by name")]
    MissingIdentifier,

    #[error("`{0}` is reserved for internal use and cannot be used as a user-facing identifier")]
    ReservedIdentifier(String),

    #[error("format token `{token}` is not supported on dialect {dialect}")]
    UnsupportedFormatToken { token: String, dialect: String },

    #[error("cycle detected while inlining `{{{{ {0} }}}}` references")]
    ReferenceCycle(String),

    #[error("reference expansion exceeded the 10,000-expansion bound while inlining `{{{{ {0} }}}}`")]
    ReferenceExpansionLimit(String),

    #[error("too many unique step types to match against (limit is 62)")]
    TooManyMatchSteps,

    #[error("match_steps requires at least one step")]
    EmptyMatchSteps,

    #[error("could not parse raw SQL for re-qualification: {0}")]
    UnparseableSql(String),

    #[error("`{feature}` is not supported on dialect {dialect}")]
    UnsupportedOnDialect { feature: String, dialect: String },

    #[error("a `Cases` expression requires at least one case")]
    EmptyCases,

    #[error("{0}")]
    Other(String),
}

/// Anything else raised during compilation: a genuine internal bug.
/// Reported as an internal-bug message rather than a user-actionable one.
#[derive(Debug, Error, Clone)]
#[error("internal compiler error: {message}")]
pub struct InternalCompilationError {
    pub message: String,
}

impl InternalCompilationError {
    pub fn new(message: impl Into<String>) -> Self {
        InternalCompilationError {
            message: message.into(),
        }
    }
}

/// A failure raised by the Execution Driver. Passed through the
/// registered error handlers (newest-first); the first handler returning
/// `Some(message)` owns the surfaced message (spec.md §7, §4.6 Redshift
/// LISTAGG example).
#[derive(Debug, Error, Clone)]
#[error("execution error: {message}")]
pub struct ExecutionError {
    pub message: String,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        ExecutionError {
            message: message.into(),
        }
    }
}

/// A serialized payload's schema version does not match the crate's
/// current wire version.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireFormatVersionError {
    #[error(
        "payload was serialized with a newer schema version ({found}) than this crate supports \
         ({expected}); upgrade the client"
    )]
    PayloadNewerThanCrate { expected: u32, found: u32 },

    #[error(
        "payload was serialized with an older schema version ({found}) than this crate expects \
         ({expected}); downgrade the client or re-serialize the payload"
    )]
    PayloadOlderThanCrate { expected: u32, found: u32 },
}

impl WireFormatVersionError {
    pub fn for_versions(expected: u32, found: u32) -> Self {
        if found > expected {
            WireFormatVersionError::PayloadNewerThanCrate { expected, found }
        } else {
            WireFormatVersionError::PayloadOlderThanCrate { expected, found }
        }
    }
}

/// Raised by the resource-lookup collaborator (out of scope; interface
/// only) on an alias miss.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("resource not found: {0}")]
pub struct ResourceNotFoundError(pub String);

/// The top-level error composing all of the above, caught at the
/// `execute_model` boundary and converted into a failed `compile` result
/// rather than propagated further.
#[derive(Debug, Error, Clone)]
pub enum CompileError {
    #[error(transparent)]
    User(#[from] UserCompilationError),

    #[error(transparent)]
    Internal(#[from] InternalCompilationError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    WireFormat(#[from] WireFormatVersionError),

    #[error(transparent)]
    ResourceNotFound(#[from] ResourceNotFoundError),
}

impl CompileError {
    /// Whether this error belongs in the user-visible `errors` list
    /// as-is, vs. needing to be wrapped as an internal-bug message.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, CompileError::User(_) | CompileError::WireFormat(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_mismatch_distinguishes_upgrade_vs_downgrade() {
        let newer = WireFormatVersionError::for_versions(1, 2);
        assert!(matches!(newer, WireFormatVersionError::PayloadNewerThanCrate { .. }));
        assert!(newer.to_string().contains("upgrade"));

        let older = WireFormatVersionError::for_versions(2, 1);
        assert!(matches!(older, WireFormatVersionError::PayloadOlderThanCrate { .. }));
        assert!(older.to_string().contains("downgrade"));
    }

    #[test]
    fn compile_error_from_conversions() {
        let e: CompileError = UserCompilationError::TooManyMatchSteps.into();
        assert!(e.is_user_facing());
        let e: CompileError = InternalCompilationError::new("bug").into();
        assert!(!e.is_user_facing());
    }
}
