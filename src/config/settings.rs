//! Compilation settings.
//!
//! Grounded on the teacher's `Settings` builder-struct idiom (serde
//! `Deserialize`/`Serialize`, `#[serde(default)]`, a `Default` impl) from
//! the original worker/pool configuration surface, narrowed to the knobs
//! spec.md §6 actually describes.

use serde::{Deserialize, Serialize};

/// First day of the week, used by week-granularity truncation and the
/// `is_this_week`/`is_last_week` style helpers. `Monday = 0 .. Sunday = 6`
/// internally; the warehouse-facing default matches the original system's
/// default of `Sunday`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    /// Offset in days from Monday (`Monday` = 0 .. `Sunday` = 6). This is
    /// the `d` parameter threaded through every per-dialect week-truncation
    /// branch in the granularity table.
    pub fn offset_from_monday(&self) -> u32 {
        match self {
            Weekday::Monday => 0,
            Weekday::Tuesday => 1,
            Weekday::Wednesday => 2,
            Weekday::Thursday => 3,
            Weekday::Friday => 4,
            Weekday::Saturday => 5,
            Weekday::Sunday => 6,
        }
    }
}

impl Default for Weekday {
    fn default() -> Self {
        Weekday::Sunday
    }
}

/// Freshness requirement forwarded opaquely to the Execution Driver; the
/// core never interprets it beyond carrying it through the result envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Freshness {
    Latest,
    /// ISO-8601 timestamp, opaque to the compiler.
    At(String),
}

/// Per-compilation configuration surface (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Affects week truncation (`Granularity::Week`) and week-relative
    /// helpers.
    pub first_day_of_week: Weekday,

    /// Forwarded to the Execution Driver; not interpreted by the compiler.
    pub freshness: Option<Freshness>,

    /// Skip execution after compiling; only the `compile` half of the
    /// result envelope is populated.
    pub sql_only: bool,

    /// Presentation option: print accumulated warnings after `run()`.
    pub print_warnings: bool,

    /// Presentation option: print execution timing/row-count stats after
    /// `run()`.
    pub print_exec_stats: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            first_day_of_week: Weekday::default(),
            freshness: None,
            sql_only: false,
            print_warnings: false,
            print_exec_stats: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_first_day_of_week_is_sunday() {
        assert_eq!(Settings::default().first_day_of_week, Weekday::Sunday);
    }

    #[test]
    fn monday_offset_zero_sunday_offset_six() {
        assert_eq!(Weekday::Monday.offset_from_monday(), 0);
        assert_eq!(Weekday::Sunday.offset_from_monday(), 6);
    }
}
