//! Traffic counter entries and their name grammar.
//!
//! Counter names are `<domain>>>><key>>>>counter` with `>>>` as the
//! separator. Domains: `user` (key = numeric user id), `inbound` and
//! `outbound` (key = inbound/outbound tag).

use serde::{Deserialize, Serialize};

const SEPARATOR: &str = ">>>";

/// One cumulative byte counter reported by an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatEntry {
    pub name: String,
    pub value: i64,
}

impl StatEntry {
    pub fn new(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Split the name into `(domain, key)`; `None` when the name does not
    /// follow the grammar.
    pub fn domain_key(&self) -> Option<(&str, &str)> {
        let mut parts = self.name.split(SEPARATOR);
        let domain = parts.next()?;
        let key = parts.next()?;
        if domain.is_empty() || key.is_empty() {
            return None;
        }
        Some((domain, key))
    }
}
