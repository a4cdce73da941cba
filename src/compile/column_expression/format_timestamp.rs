//! Per-dialect strftime-style format compiler (spec.md §4.5.3).

use crate::error::UserCompilationError;
use crate::sql::expr::{func, lit_str, ExprExt};
use crate::sql::{Dialect, Expr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escaping {
    DoubleQuote,
    SingleQuote,
    None,
}

fn escaping_for(dialect: Dialect) -> Escaping {
    match dialect {
        Dialect::Postgres | Dialect::Snowflake | Dialect::Redshift => Escaping::DoubleQuote,
        Dialect::Databricks | Dialect::ClickHouse => Escaping::SingleQuote,
        Dialect::MySql | Dialect::Athena => Escaping::None,
        Dialect::DuckDb | Dialect::BigQuery | Dialect::TSql => Escaping::None,
    }
}

fn escape_literal(text: &str, how: Escaping) -> String {
    match how {
        Escaping::DoubleQuote => format!("\"{}\"", text.replace('"', "\\\"")),
        Escaping::SingleQuote => format!("'{}'", text.replace('\'', "\\'")),
        Escaping::None => text.to_string(),
    }
}

/// Map one `%`-token to this dialect's equivalent token text, or `None` if
/// the target dialect has no equivalent (a user-visible error, spec.md
/// §4.5.3). `%Q` (quarter number) is a non-standard extension every
/// dialect can express via its own native token set.
fn map_token(dialect: Dialect, token: char) -> Option<&'static str> {
    use Dialect::*;
    Some(match (dialect, token) {
        (DuckDb | Postgres | Redshift | Snowflake | BigQuery, 'Y') => "%Y",
        (DuckDb | Postgres | Redshift | Snowflake | BigQuery, 'm') => "%m",
        (DuckDb | Postgres | Redshift | Snowflake | BigQuery, 'd') => "%d",
        (DuckDb | Postgres | Redshift | Snowflake | BigQuery, 'H') => "%H",
        (DuckDb | Postgres | Redshift | Snowflake | BigQuery, 'M') => "%M",
        (DuckDb | Postgres | Redshift | Snowflake | BigQuery, 'S') => "%S",
        (DuckDb | Postgres | Redshift | Snowflake | BigQuery, 'Q') => "%q",

        (MySql | Athena, 'Y') => "%Y",
        (MySql | Athena, 'm') => "%m",
        (MySql | Athena, 'd') => "%d",
        (MySql | Athena, 'H') => "%H",
        (MySql | Athena, 'M') => "%i",
        (MySql | Athena, 'S') => "%s",

        (Databricks | ClickHouse, 'Y') => "yyyy",
        (Databricks | ClickHouse, 'm') => "MM",
        (Databricks | ClickHouse, 'd') => "dd",
        (Databricks | ClickHouse, 'H') => "HH",
        (Databricks | ClickHouse, 'M') => "mm",
        (Databricks | ClickHouse, 'S') => "ss",

        (TSql, 'Y') => "yyyy",
        (TSql, 'm') => "MM",
        (TSql, 'd') => "dd",
        (TSql, 'H') => "HH",
        (TSql, 'M') => "mm",
        (TSql, 'S') => "ss",

        _ => return None,
    })
}

fn function_name(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::DuckDb => "STRFTIME",
        Dialect::BigQuery => "FORMAT_TIMESTAMP",
        Dialect::TSql => "FORMAT",
        Dialect::MySql => "DATE_FORMAT",
        Dialect::Databricks => "DATE_FORMAT",
        Dialect::ClickHouse => "formatDateTime",
        Dialect::Athena => "date_format",
        Dialect::Postgres | Dialect::Redshift | Dialect::Snowflake => "TO_CHAR",
    }
}

/// Tokenize `format` and emit the dialect's formatting call. Unsupported
/// tokens fail with a user-visible error naming the offending token.
pub fn compile(dialect: Dialect, expr: Expr, format: &str) -> Result<Expr, UserCompilationError> {
    let escaping = escaping_for(dialect);
    let mut rendered = String::new();
    let mut literal_run = String::new();
    let mut chars = format.chars().peekable();

    let flush_literal = |run: &mut String, out: &mut String| {
        if !run.is_empty() {
            out.push_str(&escape_literal(run, escaping));
            run.clear();
        }
    };

    while let Some(c) = chars.next() {
        if c == '%' {
            let token = chars.next().ok_or_else(|| {
                UserCompilationError::UnsupportedFormatToken {
                    token: "%".to_string(),
                    dialect: dialect.to_string(),
                }
            })?;
            let mapped = map_token(dialect, token).ok_or_else(|| UserCompilationError::UnsupportedFormatToken {
                token: format!("%{token}"),
                dialect: dialect.to_string(),
            })?;
            flush_literal(&mut literal_run, &mut rendered);
            rendered.push_str(mapped);
        } else {
            literal_run.push(c);
        }
    }
    flush_literal(&mut literal_run, &mut rendered);

    Ok(func(function_name(dialect), vec![expr, lit_str(&rendered)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::expr::col;

    #[test]
    fn unsupported_token_fails_with_dialect_name() {
        let err = compile(Dialect::MySql, col("ts"), "%Q").unwrap_err();
        assert!(matches!(err, UserCompilationError::UnsupportedFormatToken { .. }));
    }

    #[test]
    fn duckdb_year_month_day_maps_to_strftime_tokens() {
        let e = compile(Dialect::DuckDb, col("ts"), "%Y-%m-%d").unwrap();
        assert!(matches!(e, Expr::Function { ref name, .. } if name == "STRFTIME"));
    }
}
