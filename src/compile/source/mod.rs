//! One compiler function per `Source` variant (spec.md §4.4's folding table).

pub mod aggregate;
pub mod filter;
pub mod join_one;
pub mod limit;
pub mod match_steps;
pub mod pick;
pub mod sort;
pub mod source_compiler;
pub mod sql_text;
pub mod table_name;
pub mod union;
