//! Breakpoint storage.
//!
//! Breakpoints are keyed by local filename, then by a key that is usually a
//! line number but may be any other discriminator. The store serialises to
//! the JSON layout `{"file": {"10": {"enabled": true, "expression": null}}}`.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One breakpoint within a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakpointEntry {
    /// Disabled entries are kept but never sent to the engine.
    pub enabled: bool,
    /// Condition that makes this a conditional breakpoint.
    #[serde(default)]
    pub expression: Option<String>,
}

impl BreakpointEntry {
    /// An enabled, unconditional breakpoint.
    pub fn new() -> Self {
        Self {
            enabled: true,
            expression: None,
        }
    }

    /// Attach a condition.
    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    /// Builder: set the enabled flag.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl Default for BreakpointEntry {
    fn default() -> Self {
        Self::new()
    }
}

/// Entries of one file, in insertion order.
pub type FileBreakpoints = IndexMap<String, BreakpointEntry>;

/// All breakpoints, grouped by filename.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BreakpointStore {
    files: BTreeMap<String, FileBreakpoints>,
}

impl BreakpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry at `key` in `filename`.
    pub fn set(&mut self, filename: impl Into<String>, key: impl ToString, entry: BreakpointEntry) {
        self.files
            .entry(filename.into())
            .or_default()
            .insert(key.to_string(), entry);
    }

    /// Remove the entry at `key`. Returns `true` if one was removed.
    ///
    /// A file left without entries is dropped from the store.
    pub fn remove(&mut self, filename: &str, key: &str) -> bool {
        let Some(entries) = self.files.get_mut(filename) else {
            return false;
        };
        let removed = entries.shift_remove(key).is_some();
        if entries.is_empty() {
            self.files.remove(filename);
        }
        removed
    }

    /// Flip the enabled flag of an entry, returning the new state.
    pub fn toggle(&mut self, filename: &str, key: &str) -> Option<bool> {
        let entry = self.files.get_mut(filename)?.get_mut(key)?;
        entry.enabled = !entry.enabled;
        Some(entry.enabled)
    }

    /// Entries for one file, if any.
    pub fn get_for_file(&self, filename: &str) -> Option<&FileBreakpoints> {
        self.files.get(filename)
    }

    /// Files in name order with their entries.
    pub fn files(&self) -> impl Iterator<Item = (&str, &FileBreakpoints)> {
        self.files.iter().map(|(name, entries)| (name.as_str(), entries))
    }

    /// Total number of entries across files.
    pub fn len(&self) -> usize {
        self.files.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Sort key for an entry key: numeric keys first in numeric order, then the
/// rest alphabetically.
pub(crate) fn key_order(key: &str) -> (u8, u64, &str) {
    match line_number(key) {
        Some(line) => (0, line, key),
        None => (1, 0, key),
    }
}

/// Line number named by an entry key. Only plain ASCII digits count, so
/// `"+5"` and `" 5"` are not lines.
pub(crate) fn line_number(key: &str) -> Option<u64> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let mut store = BreakpointStore::new();
        store.set("/a.php", 10, BreakpointEntry::new());
        store.set("/a.php", 12, BreakpointEntry::new().with_expression("$x > 1"));
        store.set("/b.php", 3, BreakpointEntry::new());

        let a = store.get_for_file("/a.php").unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(a["12"].expression.as_deref(), Some("$x > 1"));
        assert_eq!(store.len(), 3);
        assert!(store.get_for_file("/c.php").is_none());
    }

    #[test]
    fn set_replaces_existing_entry() {
        let mut store = BreakpointStore::new();
        store.set("/a.php", 10, BreakpointEntry::new());
        store.set("/a.php", 10, BreakpointEntry::new().enabled(false));
        assert_eq!(store.len(), 1);
        assert!(!store.get_for_file("/a.php").unwrap()["10"].enabled);
    }

    #[test]
    fn remove_last_entry_drops_file() {
        let mut store = BreakpointStore::new();
        store.set("/a.php", 10, BreakpointEntry::new());
        assert!(store.remove("/a.php", "10"));
        assert!(!store.remove("/a.php", "10"));
        assert!(store.get_for_file("/a.php").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn toggle_flips_enabled() {
        let mut store = BreakpointStore::new();
        store.set("/a.php", 5, BreakpointEntry::new());
        assert_eq!(store.toggle("/a.php", "5"), Some(false));
        assert_eq!(store.toggle("/a.php", "5"), Some(true));
        assert_eq!(store.toggle("/a.php", "6"), None);
    }

    #[test]
    fn files_are_name_ordered() {
        let mut store = BreakpointStore::new();
        store.set("/z.php", 1, BreakpointEntry::new());
        store.set("/a.php", 1, BreakpointEntry::new());
        let names: Vec<&str> = store.files().map(|(name, _)| name).collect();
        assert_eq!(names, ["/a.php", "/z.php"]);
    }

    #[test]
    fn json_layout() {
        let json = r#"{
            "/var/www/index.php": {
                "10": {"enabled": true, "expression": null},
                "14": {"enabled": false, "expression": "$i == 3"}
            },
            "/var/www/lib.php": {
                "2": {"enabled": true}
            }
        }"#;
        let store = BreakpointStore::from_json_str(json).unwrap();
        assert_eq!(store.len(), 3);
        let index = store.get_for_file("/var/www/index.php").unwrap();
        assert!(!index["14"].enabled);
        assert_eq!(index["14"].expression.as_deref(), Some("$i == 3"));
        assert_eq!(store.get_for_file("/var/www/lib.php").unwrap()["2"].expression, None);

        let again = BreakpointStore::from_json_str(&store.to_json().unwrap()).unwrap();
        assert_eq!(again, store);
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(BreakpointStore::from_json_str("[1, 2]").is_err());
        assert!(BreakpointStore::from_json_str("{").is_err());
    }

    #[test]
    fn key_order_puts_numbers_first() {
        let mut keys = vec!["abc", "10", "2", "exception"];
        keys.sort_by(|a, b| key_order(a).cmp(&key_order(b)));
        assert_eq!(keys, ["2", "10", "abc", "exception"]);
    }

    #[test]
    fn only_plain_digits_are_line_numbers() {
        assert_eq!(line_number("5"), Some(5));
        assert_eq!(line_number("0042"), Some(42));
        assert_eq!(line_number("+5"), None);
        assert_eq!(line_number(" 5"), None);
        assert_eq!(line_number("5 "), None);
        assert_eq!(line_number("-1"), None);
        assert_eq!(line_number(""), None);

        let mut keys = vec!["+5", "7", " 5"];
        keys.sort_by(|a, b| key_order(a).cmp(&key_order(b)));
        assert_eq!(keys, ["7", " 5", "+5"]);
    }
}
