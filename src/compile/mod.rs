//! The compiler: walks a `Model`'s `Source` chain once per target dialect
//! and emits SQL text, optionally executing it through a caller-supplied
//! `ExecutionDriver` (spec.md §4, §6).
//!
//! `compile_model` is the single public entry point; everything below it
//! (`QueryContext`, `QueryLayer`, the per-`Source`-variant compilers) is
//! implementation detail a caller never touches directly.

pub mod column_expression;
pub mod context;
pub mod query_layer;
pub mod source;
pub mod wire;

pub use context::QueryContext;
pub use source::source_compiler;

use crate::config::Settings;
use crate::error::CompileError;
use crate::execution_driver::{ExecutionDriver, ExecutionResult};
use crate::model::Model;
use crate::sql::Dialect;
use std::rc::Rc;

/// The `compile` half of spec.md §6's result envelope: did the `Model`'s
/// `Source` chain resolve to SQL text at all.
#[derive(Debug, Clone)]
pub struct CompileReport {
    pub ok: bool,
    pub query_text: Option<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// The `data` half: populated unless `Settings::sql_only` is set, in which
/// case `compile_model` never calls the driver at all.
#[derive(Debug, Clone)]
pub struct DataReport {
    pub ok: bool,
    pub result: Option<ExecutionResult>,
    pub duration_ms: u64,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// The full result envelope `compile_model` returns (spec.md §6).
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub sql: String,
    pub warnings: Vec<String>,
    pub compile: CompileReport,
    pub data: Option<DataReport>,
}

/// Compile `model` to SQL text targeting `dialect`, then - unless
/// `settings.sql_only` - execute it through `driver` and fold the result
/// into the `data` half of the envelope.
///
/// Every `CompileError` raised while walking the `Source` chain is caught
/// here rather than propagated; a failed compile still returns a
/// `CompileOutput` with `compile.ok == false` and no SQL (spec.md §7
/// "compilation failures are caught at the top-level boundary").
pub fn compile_model(
    model: &Model,
    dialect: Dialect,
    settings: Settings,
    driver: Option<Rc<dyn ExecutionDriver>>,
) -> CompileOutput {
    let ctx = QueryContext::new(dialect, settings.clone(), driver.clone());

    let compiled = (|| -> Result<String, CompileError> {
        let mut layer = source_compiler::compile(&ctx, &model.source)?;
        layer.finalized();
        Ok(layer.query.to_sql(dialect))
    })();

    match compiled {
        Ok(sql) => {
            let warnings = ctx.warnings();
            let data = if settings.sql_only {
                None
            } else {
                Some(run_data(&ctx, &sql, driver))
            };
            CompileOutput {
                sql: sql.clone(),
                warnings: warnings.clone(),
                compile: CompileReport {
                    ok: true,
                    query_text: Some(sql),
                    warnings,
                    errors: Vec::new(),
                },
                data,
            }
        }
        Err(err) => {
            let message = if err.is_user_facing() {
                err.to_string()
            } else {
                format!("internal compiler error: {err}")
            };
            let warnings = ctx.warnings();
            CompileOutput {
                sql: String::new(),
                warnings: warnings.clone(),
                compile: CompileReport {
                    ok: false,
                    query_text: None,
                    warnings,
                    errors: vec![message],
                },
                data: None,
            }
        }
    }
}

/// Compile `model` to SQL text only, skipping the execution half entirely
/// - the common path for tests and any caller that only wants the text.
pub fn compile_sql(model: &Model, dialect: Dialect) -> Result<String, CompileError> {
    let ctx = QueryContext::new(dialect, Settings::default(), None);
    let mut layer = source_compiler::compile(&ctx, &model.source)?;
    layer.finalized();
    Ok(layer.query.to_sql(dialect))
}

fn run_data(ctx: &QueryContext, sql: &str, driver: Option<Rc<dyn ExecutionDriver>>) -> DataReport {
    match driver {
        None => DataReport {
            ok: false,
            result: None,
            duration_ms: 0,
            warnings: Vec::new(),
            errors: vec!["no execution driver configured".to_string()],
        },
        Some(driver) => match driver.execute(sql) {
            Ok(result) => DataReport {
                ok: true,
                duration_ms: result.duration_ms,
                result: Some(result),
                warnings: Vec::new(),
                errors: Vec::new(),
            },
            Err(err) => DataReport {
                ok: false,
                result: None,
                duration_ms: 0,
                warnings: Vec::new(),
                errors: vec![ctx.translate_exec_error(&err.message)],
            },
        },
    }
}
