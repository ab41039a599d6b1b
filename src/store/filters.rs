use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, error, info};

use super::JsonFile;

/// One pattern to replacement substitution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    pub pattern: String,
    pub replacement: String,
}

impl FilterRule {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }
}

/// User-maintained filters backed by a JSON file, plus the fixed built-in
/// rules from configuration.
#[derive(Debug)]
pub struct FilterStore {
    file: JsonFile,
    builtin: Vec<FilterRule>,
}

impl FilterStore {
    pub fn new(path: impl Into<PathBuf>, builtin: Vec<FilterRule>) -> Self {
        Self {
            file: JsonFile::new(path),
            builtin,
        }
    }

    /// Read the user rules. A missing file is created empty; a malformed one
    /// is treated as empty.
    fn load(&self) -> Vec<FilterRule> {
        match self.file.read::<Vec<FilterRule>>() {
            Ok(Some(rules)) => rules,
            Ok(None) => {
                if let Err(e) = self.file.write(&Vec::<FilterRule>::new()) {
                    error!("Error creating filters file: {:#}", e);
                }
                Vec::new()
            }
            Err(e) => {
                error!(
                    "Error loading filters from {}: {:#}",
                    self.file.path().display(),
                    e
                );
                Vec::new()
            }
        }
    }

    fn save(&self, rules: &[FilterRule]) -> Result<()> {
        self.file.write(&rules)
    }

    /// Insert or update. An existing pattern keeps its position.
    pub fn add(&self, pattern: &str, replacement: &str) -> bool {
        let _guard = self.file.lock();
        let mut rules = self.load();

        match rules.iter_mut().find(|rule| rule.pattern == pattern) {
            Some(existing) => existing.replacement = replacement.to_string(),
            None => rules.push(FilterRule::new(pattern, replacement)),
        }

        match self.save(&rules) {
            Ok(()) => {
                info!("Filter saved: '{}' -> '{}'", pattern, replacement);
                true
            }
            Err(e) => {
                error!("Error saving filters: {:#}", e);
                false
            }
        }
    }

    /// Remove every rule with exactly this pattern.
    pub fn remove(&self, pattern: &str) -> bool {
        let _guard = self.file.lock();
        let mut rules = self.load();
        let before = rules.len();
        rules.retain(|rule| rule.pattern != pattern);

        if rules.len() == before {
            return false;
        }

        match self.save(&rules) {
            Ok(()) => {
                info!("Filter removed: '{}'", pattern);
                true
            }
            Err(e) => {
                error!("Error saving filters: {:#}", e);
                false
            }
        }
    }

    pub fn list(&self) -> String {
        let _guard = self.file.lock();
        let rules = self.load();
        if rules.is_empty() {
            return "No custom filters defined.".to_string();
        }

        let mut result = String::from("Current text filters:\n\n");
        for (i, rule) in rules.iter().enumerate() {
            result.push_str(&format!(
                "{}. Pattern: `{}`\n   Replacement: `{}`\n\n",
                i + 1,
                rule.pattern,
                rule.replacement
            ));
        }
        result
    }

    /// Dry-run a pattern against sample text. Never touches the store.
    pub fn test(&self, sample: &str, pattern: &str) -> String {
        let re = match Regex::new(pattern) {
            Ok(re) => re,
            Err(e) => return format!("Error testing pattern: {}", e),
        };

        let matches: Vec<String> = re
            .find_iter(sample)
            .map(|m| format!("{:?}", m.as_str()))
            .collect();

        if matches.is_empty() {
            return "No matches found in the text.".to_string();
        }
        format!("Found {} matches: {}", matches.len(), matches.join(", "))
    }

    /// Built-in rules first, then the user's, in application order.
    pub fn get_all(&self) -> Vec<FilterRule> {
        let _guard = self.file.lock();
        let user = self.load();
        debug!(
            "Filters: {} built-in, {} user-defined",
            self.builtin.len(),
            user.len()
        );
        self.builtin.iter().cloned().chain(user).collect()
    }

    /// Number of user-defined rules.
    pub fn len(&self) -> usize {
        let _guard = self.file.lock();
        self.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> FilterStore {
        FilterStore::new(dir.path().join("user_filters.json"), Vec::new())
    }

    fn occurrences(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    #[test]
    fn test_first_access_creates_empty_file() {
        let dir = TempDir::new().unwrap();
        let filters = store(&dir);
        assert_eq!(filters.list(), "No custom filters defined.");
        let raw = std::fs::read_to_string(dir.path().join("user_filters.json")).unwrap();
        assert_eq!(raw, "[]");
    }

    #[test]
    fn test_add_then_list_shows_pair_once() {
        let dir = TempDir::new().unwrap();
        let filters = store(&dir);
        assert!(filters.add(r"\bfoo\b", "bar"));

        let listing = filters.list();
        assert!(listing.starts_with("Current text filters:\n\n"));
        assert_eq!(occurrences(&listing, "Pattern: `\\bfoo\\b`"), 1);
        assert_eq!(occurrences(&listing, "Replacement: `bar`"), 1);
    }

    #[test]
    fn test_re_add_updates_in_place() {
        let dir = TempDir::new().unwrap();
        let filters = store(&dir);
        filters.add("a", "1");
        filters.add("b", "2");
        filters.add("c", "3");
        filters.add("b", "two");

        let user: Vec<FilterRule> = filters.get_all();
        assert_eq!(
            user,
            vec![
                FilterRule::new("a", "1"),
                FilterRule::new("b", "two"),
                FilterRule::new("c", "3"),
            ]
        );
        assert_eq!(occurrences(&filters.list(), "Pattern: `b`"), 1);
    }

    #[test]
    fn test_remove_then_list_never_shows_pattern() {
        let dir = TempDir::new().unwrap();
        let filters = store(&dir);
        filters.add("keep", "k");
        filters.add("drop", "d");

        assert!(filters.remove("drop"));
        let listing = filters.list();
        assert!(!listing.contains("`drop`"));
        assert!(listing.contains("`keep`"));
    }

    #[test]
    fn test_remove_missing_pattern_fails_and_leaves_store() {
        let dir = TempDir::new().unwrap();
        let filters = store(&dir);
        filters.add("x", "y");
        let before = filters.list();

        assert!(!filters.remove("nope"));
        assert_eq!(filters.list(), before);
    }

    #[test]
    fn test_round_trip_through_a_fresh_store() {
        let dir = TempDir::new().unwrap();
        let rules = vec![
            FilterRule::new(r"(?i)\bhello\b", "Hi"),
            FilterRule::new("🚧", "🚀"),
            FilterRule::new(r"\$(\d+)", "USD $1"),
        ];
        {
            let filters = store(&dir);
            for rule in &rules {
                assert!(filters.add(&rule.pattern, &rule.replacement));
            }
        }

        let reloaded = store(&dir);
        assert_eq!(reloaded.get_all(), rules);
    }

    #[test]
    fn test_persisted_layout_is_array_of_objects() {
        let dir = TempDir::new().unwrap();
        let filters = store(&dir);
        filters.add("p", "r");

        let raw = std::fs::read_to_string(dir.path().join("user_filters.json")).unwrap();
        assert_eq!(
            raw,
            "[\n  {\n    \"pattern\": \"p\",\n    \"replacement\": \"r\"\n  }\n]"
        );
    }

    #[test]
    fn test_concurrent_readers_do_not_clobber_adds() {
        let dir = TempDir::new().unwrap();
        let filters = store(&dir);

        std::thread::scope(|scope| {
            for i in 0..8 {
                let filters = &filters;
                scope.spawn(move || {
                    filters.list();
                    assert!(filters.add(&format!("p{}", i), "r"));
                    filters.get_all();
                });
            }
        });

        assert_eq!(filters.len(), 8);
    }

    #[test]
    fn test_malformed_file_loads_as_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("user_filters.json"), "not json").unwrap();
        let filters = store(&dir);
        assert!(filters.is_empty());
        assert_eq!(filters.list(), "No custom filters defined.");
    }

    #[test]
    fn test_get_all_puts_builtin_first() {
        let dir = TempDir::new().unwrap();
        let filters = FilterStore::new(
            dir.path().join("user_filters.json"),
            vec![FilterRule::new("builtin", "B")],
        );
        filters.add("user", "U");

        assert_eq!(
            filters.get_all(),
            vec![FilterRule::new("builtin", "B"), FilterRule::new("user", "U")]
        );
        assert_eq!(filters.len(), 1);
    }

    #[test]
    fn test_test_reports_literal_match() {
        let dir = TempDir::new().unwrap();
        let filters = store(&dir);
        let report = filters.test("Hello there", r"(?i)\bhello\b");
        assert_eq!(report, "Found 1 matches: \"Hello\"");
        assert!(filters.is_empty());
    }

    #[test]
    fn test_test_reports_every_match() {
        let dir = TempDir::new().unwrap();
        let filters = store(&dir);
        let report = filters.test("a1 b22 c333", r"\d+");
        assert_eq!(report, "Found 3 matches: \"1\", \"22\", \"333\"");
    }

    #[test]
    fn test_test_no_match_and_invalid_pattern() {
        let dir = TempDir::new().unwrap();
        let filters = store(&dir);
        assert_eq!(
            filters.test("hello", "xyz"),
            "No matches found in the text."
        );
        assert!(filters
            .test("hello", "(unclosed")
            .starts_with("Error testing pattern:"));
    }
}
