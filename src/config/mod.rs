//! Compilation settings surface.
//!
//! Everything a caller can configure about one compilation: the warehouse's
//! week-start convention, whether to skip execution, and presentation flags
//! for the result wrapper. Credential/connection loading is explicitly out
//! of scope (spec.md §1) - `Settings` carries no connection strings.

mod settings;

pub use settings::{Freshness, Settings, Weekday};
