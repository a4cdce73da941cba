//! # Mantis
//!
//! A declarative analytical query builder and multi-dialect SQL compiler.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  Model (IR): Source chain                │
//! │       + ColumnExpression tree + Namespace graph          │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [compile]
//! ┌─────────────────────────────────────────────────────────┐
//! │     QueryContext + QueryLayer: fold-vs-chain machine      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [sql]
//! ┌─────────────────────────────────────────────────────────┐
//! │         Query/Expr physical AST -> dialect text           │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! `model` defines the immutable IR a caller builds up (spec.md §3).
//! `compile` walks that IR once per target dialect and emits a `sql::Query`
//! physical plan (spec.md §4). `sql` is the dialect-aware SELECT/expression
//! renderer the compiler targets. `execution_driver` is the interface to
//! the (out-of-scope) warehouse driver layer a caller supplies for column
//! reflection and execution. `error` is the crate's error taxonomy.

pub mod compile;
pub mod config;
pub mod error;
pub mod execution_driver;
pub mod model;
pub mod sql;

// Re-export SQL submodules at crate level; `sql::expr` itself refers back
// to `crate::query`, so this alias must exist for that module to resolve.
pub use sql::dialect;
pub use sql::expr;
pub use sql::query;
pub use sql::token;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::compile::{compile_model, CompileOutput, QueryContext};
    pub use crate::config::Settings;
    pub use crate::dialect::{Dialect, SqlDialect};
    pub use crate::error::CompileError;
    pub use crate::execution_driver::{ColumnTypeMap, ExecutionDriver, NullExecutionDriver};
    pub use crate::expr::{
        avg, coalesce, col, count, count_distinct, count_star, func, lit_bool, lit_float, lit_int,
        lit_null, lit_str, max, min, star, sum, table_col, table_star, BinaryOperator, Expr,
        ExprExt, Literal as SqlLiteral, UnaryOperator,
    };
    pub use crate::model::{
        ActivitySchema, ColumnExpression, ConnectionHandle, DataType, Grain, KeyPath, Literal,
        Model, Namespace, Operator, Source, SortDir,
    };
    pub use crate::query::{
        Cte, Join, JoinType, LimitOffset, OrderByExpr, Query, SelectExpr, TableRef,
    };
    pub use crate::token::{Token, TokenStream};
}

pub use dialect::Dialect;
pub use error::CompileError;
pub use expr::{col, count_star, lit_bool, lit_int, lit_str, sum, table_col, Expr, ExprExt};
pub use model::Model;
pub use query::{OrderByExpr, Query, SelectExpr, TableRef};
pub use token::{Token, TokenStream};
