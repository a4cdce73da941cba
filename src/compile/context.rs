//! Per-compilation state (spec.md §4.2).
//!
//! Grounded 1:1 on `original_source/src/run/compile/context.py`. `QueryContext`
//! is exclusively owned by one compilation and mutated freely; the shared
//! mutable state lives behind `Rc<RefCell<_>>` so that `fork_cte_names`
//! (used by `JoinOne`/`Subquery`/`MatchSteps` to compile a nested subtree
//! under its own CTE-name prefix) can forward every other operation to the
//! parent without per-method delegation boilerplate - Rust has no
//! `__getattr__` forwarding, so the shared inner cell stands in for it.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::config::Settings;
use crate::execution_driver::{ColumnTypeMap, ExecutionDriver};
use crate::sql::Dialect;

/// What a checkpointed source resolved to: the CTE/table name it can be
/// addressed as, plus the column metadata to seed a fresh layer with.
#[derive(Debug, Clone)]
pub struct AliasCheckpoint {
    pub alias: String,
    pub column_metadata: ColumnTypeMap,
}

/// An error-handler entry; the first one (scanned newest-first) that
/// returns `Some(message)` owns the surfaced execution error message
/// (spec.md §4.2, §7).
pub type ExecErrorHandler = Box<dyn Fn(&str) -> Option<String>>;

struct QueryContextInner {
    used_ref_names: HashSet<String>,
    reserved_substrings: Vec<(String, bool)>,
    alias_checkpoints: HashMap<String, AliasCheckpoint>,
    preprocessed: HashSet<String>,
    warnings: Vec<String>,
    exec_error_handlers: Vec<ExecErrorHandler>,
    name_counters: HashMap<String, u64>,
    cte_counter: u64,
}

impl QueryContextInner {
    fn new() -> Self {
        QueryContextInner {
            used_ref_names: HashSet::new(),
            reserved_substrings: Vec::new(),
            alias_checkpoints: HashMap::new(),
            preprocessed: HashSet::new(),
            warnings: Vec::new(),
            exec_error_handlers: Vec::new(),
            name_counters: HashMap::new(),
            cte_counter: 0,
        }
    }

    /// `get_free_name` in the original: append `_{index}` until the
    /// candidate collides with neither `used_ref_names` nor any reserved
    /// substring (checked via substring containment).
    fn get_free_name(&mut self, base: &str, always_include_index: bool) -> String {
        let mut index = self.name_counters.get(base).copied().unwrap_or(0);
        loop {
            let candidate = if index == 0 && !always_include_index {
                base.to_string()
            } else {
                format!("{base}_{index}")
            };
            let collides = self.used_ref_names.contains(&candidate)
                || self
                    .reserved_substrings
                    .iter()
                    .any(|(s, match_any_substring)| {
                        if *match_any_substring {
                            s.contains(&candidate)
                        } else {
                            s == &candidate
                        }
                    });
            index += 1;
            if !collides {
                self.name_counters.insert(base.to_string(), index);
                self.used_ref_names.insert(candidate.clone());
                return candidate;
            }
        }
    }
}

/// Per-compilation state shared by every `QueryLayer` (spec.md §4.2).
#[derive(Clone)]
pub struct QueryContext {
    pub dialect: Dialect,
    pub settings: Settings,
    pub driver: Option<Rc<dyn ExecutionDriver>>,
    inner: Rc<RefCell<QueryContextInner>>,
    /// Prefix this context (or a fork of it) allocates CTE names under.
    name: Option<String>,
}

impl QueryContext {
    pub fn new(dialect: Dialect, settings: Settings, driver: Option<Rc<dyn ExecutionDriver>>) -> Self {
        QueryContext {
            dialect,
            settings,
            driver,
            inner: Rc::new(RefCell::new(QueryContextInner::new())),
            name: None,
        }
    }

    pub fn next_alias_name(&self, base: &str) -> String {
        self.inner.borrow_mut().get_free_name(base, false)
    }

    pub fn next_cte_name(&self) -> String {
        let base = self.name.as_deref().unwrap_or("cte");
        let mut inner = self.inner.borrow_mut();
        inner.cte_counter += 1;
        inner.get_free_name(base, true)
    }

    pub fn add_reserved_name(&self, name: impl Into<String>, match_any_substring: bool) {
        self.inner
            .borrow_mut()
            .reserved_substrings
            .push((name.into(), match_any_substring));
    }

    /// A child context that prefixes generated CTE names with `tag`, so an
    /// independent sub-chain (a joined relation, a subquery, a funnel
    /// step) reads clearly in the emitted SQL; every other operation
    /// forwards to `self` via the shared inner cell.
    pub fn fork_cte_names(&self, tag: &str) -> QueryContext {
        let forked_name = self.inner.borrow_mut().get_free_name(tag, false);
        QueryContext {
            dialect: self.dialect,
            settings: self.settings.clone(),
            driver: self.driver.clone(),
            inner: Rc::clone(&self.inner),
            name: Some(forked_name),
        }
    }

    pub fn add_alias_checkpoint(&self, source_key: &str, checkpoint: AliasCheckpoint) {
        self.inner
            .borrow_mut()
            .alias_checkpoints
            .insert(source_key.to_string(), checkpoint);
    }

    pub fn get_alias_checkpoint(&self, source_key: &str) -> Option<AliasCheckpoint> {
        self.inner.borrow().alias_checkpoints.get(source_key).cloned()
    }

    pub fn add_warning(&self, message: impl Into<String>) {
        let prefix = self.name.as_deref().unwrap_or("root");
        self.inner
            .borrow_mut()
            .warnings
            .push(format!("[{prefix}] {}", message.into()));
    }

    pub fn warnings(&self) -> Vec<String> {
        self.inner.borrow().warnings.clone()
    }

    /// Newest-registered-first (spec.md §4.2: inserted at index 0).
    pub fn register_exec_error_handler(&self, handler: ExecErrorHandler) {
        self.inner.borrow_mut().exec_error_handlers.insert(0, handler);
    }

    /// Run the registered handler chain over a raw driver error message;
    /// the first handler to return `Some(_)` wins, otherwise the raw
    /// message passes through unchanged (spec.md §7).
    pub fn translate_exec_error(&self, raw_message: &str) -> String {
        for handler in self.inner.borrow().exec_error_handlers.iter() {
            if let Some(translated) = handler(raw_message) {
                return translated;
            }
        }
        raw_message.to_string()
    }

    /// Whether an expression (keyed by its stable content hash) has
    /// already been run through the preprocessor this compilation,
    /// preventing redundant re-preprocessing of an already-preprocessed
    /// subtree (spec.md §4.5, §9: a `HashSet` keyed by structural
    /// fingerprint stands in for the original's `Set[id(expr)]`).
    pub fn mark_preprocessed(&self, key: &str) -> bool {
        self.inner.borrow_mut().preprocessed.insert(key.to_string())
    }

    pub fn is_preprocessed(&self, key: &str) -> bool {
        self.inner.borrow().preprocessed.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    #[test]
    fn next_alias_name_appends_index_on_collision() {
        let ctx = QueryContext::new(Dialect::Postgres, Settings::default(), None);
        assert_eq!(ctx.next_alias_name("t"), "t");
        assert_eq!(ctx.next_alias_name("t"), "t_1");
        assert_eq!(ctx.next_alias_name("t"), "t_2");
    }

    #[test]
    fn reserved_substring_blocks_allocation() {
        let ctx = QueryContext::new(Dialect::Postgres, Settings::default(), None);
        ctx.add_reserved_name("select foo_1 from bar", true);
        let name = ctx.next_alias_name("foo");
        assert_ne!(name, "foo_1");
    }

    #[test]
    fn fork_cte_names_shares_warnings_with_parent() {
        let ctx = QueryContext::new(Dialect::Postgres, Settings::default(), None);
        let forked = ctx.fork_cte_names("joined");
        forked.add_warning("test warning");
        assert_eq!(ctx.warnings().len(), 1);
    }

    #[test]
    fn exec_error_handlers_run_newest_first() {
        let ctx = QueryContext::new(Dialect::Postgres, Settings::default(), None);
        ctx.register_exec_error_handler(Box::new(|_| Some("first".to_string())));
        ctx.register_exec_error_handler(Box::new(|_| Some("second".to_string())));
        assert_eq!(ctx.translate_exec_error("raw"), "second");
    }

    #[test]
    fn preprocessed_set_is_idempotent() {
        let ctx = QueryContext::new(Dialect::Postgres, Settings::default(), None);
        assert!(ctx.mark_preprocessed("abc"));
        assert!(!ctx.mark_preprocessed("abc"));
        assert!(ctx.is_preprocessed("abc"));
    }
}
