//! The configuration section tree.
//!
//! A section maps keys to [`Value`]s in insertion order. Values can be nested
//! sections, which are addressed with paths such as `server.port` (the
//! separator is configurable through [`ConfigurationOptions`]).
//!
//! Every key may carry block comments (the lines above it) and inline
//! comments (after it on the same line). `None` stands for a blank line.
//! Comments belong to the key, not the value: replacing a value keeps them.
//!
//! A section can fall back to a defaults section. Lookups that miss locally
//! are retried against the defaults with the same path. Defaults are shared
//! behind an [`Arc`] and only written through copy-on-write, so a section
//! can never end up as its own default.

use std::borrow::Cow;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::options::ConfigurationOptions;
use crate::serialization::TypedObject;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SectionEntry {
    pub(crate) value: Value,
    pub(crate) comments: Vec<Option<String>>,
    pub(crate) inline_comments: Vec<Option<String>>,
}

impl SectionEntry {
    fn new(value: Value) -> Self {
        Self {
            value,
            comments: Vec::new(),
            inline_comments: Vec::new(),
        }
    }
}

/// A node of the configuration tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationSection {
    /// Full path from the root, empty for the root itself.
    path: String,
    options: ConfigurationOptions,
    map: IndexMap<String, SectionEntry>,
    defaults: Option<Arc<ConfigurationSection>>,
}

impl Default for ConfigurationSection {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigurationSection {
    /// An empty root section with default options.
    pub fn new() -> Self {
        Self::with_options(ConfigurationOptions::default())
    }

    /// An empty root section.
    pub fn with_options(options: ConfigurationOptions) -> Self {
        Self {
            path: String::new(),
            options,
            map: IndexMap::new(),
            defaults: None,
        }
    }

    /// Path separator and defaults policy of this section's tree.
    pub fn options(&self) -> ConfigurationOptions {
        self.options
    }

    /// Change the options of this section and everything below it.
    pub fn set_options(&mut self, options: ConfigurationOptions) {
        if self.options == options {
            return;
        }
        let separator = options.path_separator.to_string();
        let path = self
            .path
            .split(self.options.path_separator)
            .collect::<Vec<_>>()
            .join(&separator);
        self.rebase(path, options);
    }

    /// The last segment of this section's path; empty for the root.
    pub fn name(&self) -> &str {
        self.path
            .rsplit(self.options.path_separator)
            .next()
            .unwrap_or_default()
    }

    /// Full path from the root.
    pub fn current_path(&self) -> &str {
        &self.path
    }

    /// Whether no key is set directly in this section. Defaults are not
    /// consulted.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Number of keys set directly in this section.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Remove every key. Defaults and options are kept.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    fn child_path(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}{}{}", self.path, self.options.path_separator, key)
        }
    }

    fn split<'p>(&self, path: &'p str) -> Option<(&'p str, &'p str)> {
        path.split_once(self.options.path_separator)
    }

    /// Move this section under a new path, fixing the paths of all
    /// descendants.
    fn rebase(&mut self, path: String, options: ConfigurationOptions) {
        self.path = path;
        self.options = options;
        for (key, entry) in &mut self.map {
            if let Value::Section(child) = &mut entry.value {
                let child_path = if self.path.is_empty() {
                    key.clone()
                } else {
                    format!("{}{}{}", self.path, options.path_separator, key)
                };
                child.rebase(child_path, options);
            }
        }
    }

    // Lookup

    /// Get the value at `path`, falling back to the defaults.
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.get_local(path)
            .or_else(|| self.defaults.as_deref()?.get(path))
    }

    fn get_local(&self, path: &str) -> Option<&Value> {
        self.entry(path).map(|entry| &entry.value)
    }

    /// Mutable access to a value set in this section (defaults excluded).
    pub fn get_mut(&mut self, path: &str) -> Option<&mut Value> {
        self.entry_mut(path).map(|entry| &mut entry.value)
    }

    pub(crate) fn entry(&self, path: &str) -> Option<&SectionEntry> {
        match self.split(path) {
            None => self.map.get(path),
            Some((head, rest)) => self.map.get(head)?.value.as_section()?.entry(rest),
        }
    }

    fn entry_mut(&mut self, path: &str) -> Option<&mut SectionEntry> {
        match self.split(path) {
            None => self.map.get_mut(path),
            Some((head, rest)) => self
                .map
                .get_mut(head)?
                .value
                .as_section_mut()?
                .entry_mut(rest),
        }
    }

    /// Whether `path` has a value here or in the defaults.
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Whether `path` has a value in this section itself.
    pub fn contains_local(&self, path: &str) -> bool {
        self.get_local(path).is_some()
    }

    /// Whether `path` would be written on save: set locally, or set in the
    /// defaults when defaults are copied.
    pub fn is_set(&self, path: &str) -> bool {
        if self.options.copy_defaults {
            self.contains(path)
        } else {
            self.contains_local(path)
        }
    }

    // Mutation

    /// Set `path` to `value`, creating missing intermediate sections.
    ///
    /// A non-section value in the way of an intermediate segment is replaced.
    /// Setting [`Value::Null`] removes the key, and does nothing when the
    /// key is missing. A [`Value::Section`] is moved under this section.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) {
        let value = value.into();
        if value.is_null() {
            if self.remove(path).is_some() {
                debug!(path, "removed configuration key");
            }
            return;
        }
        match self.split(path) {
            Some((head, rest)) => self.child_section(head, false).set(rest, value),
            None => self.insert_local(path, value),
        }
    }

    fn insert_local(&mut self, key: &str, value: Value) {
        let value = match value {
            Value::Section(mut section) => {
                section.rebase(self.child_path(key), self.options);
                Value::Section(section)
            }
            other => other,
        };
        match self.map.get_mut(key) {
            Some(entry) => entry.value = value,
            None => {
                self.map.insert(key.to_string(), SectionEntry::new(value));
            }
        }
    }

    /// The section under `key`. An empty section is put there first when
    /// `replace` is set or the current value is not a section.
    fn child_section(&mut self, key: &str, replace: bool) -> &mut ConfigurationSection {
        let is_section = matches!(self.map.get(key), Some(SectionEntry { value: Value::Section(_), .. }));
        if replace || !is_section {
            let child = ConfigurationSection::with_options(self.options);
            self.insert_local(key, Value::Section(child));
        }
        match self.map.get_mut(key).map(|entry| &mut entry.value) {
            Some(Value::Section(section)) => section,
            _ => unreachable!(),
        }
    }

    /// Create an empty section at `path`, creating missing intermediate
    /// sections. Whatever was at `path` is replaced; its comments are kept.
    pub fn create_section(&mut self, path: &str) -> &mut ConfigurationSection {
        match self.split(path) {
            Some((head, rest)) => self.child_section(head, false).create_section(rest),
            None => self.child_section(path, true),
        }
    }

    /// Remove `path` and return its value.
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        match self.split(path) {
            None => self.map.shift_remove(path).map(|entry| entry.value),
            Some((head, rest)) => self.map.get_mut(head)?.value.as_section_mut()?.remove(rest),
        }
    }

    // Listing

    /// Keys of this section; with `deep`, the paths of every nested key.
    pub fn keys(&self, deep: bool) -> Vec<String> {
        self.values(deep).into_keys().collect()
    }

    /// Values of this section keyed by path; with `deep`, nested sections
    /// are listed along with their contents.
    pub fn values(&self, deep: bool) -> IndexMap<String, Value> {
        let mut out = IndexMap::new();
        self.effective().collect_values("", deep, &mut out);
        out
    }

    fn collect_values(&self, prefix: &str, deep: bool, out: &mut IndexMap<String, Value>) {
        for (key, entry) in &self.map {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}{}{}", prefix, self.options.path_separator, key)
            };
            out.insert(path.clone(), entry.value.clone());
            if deep && let Value::Section(child) = &entry.value {
                child.collect_values(&path, deep, out);
            }
        }
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&String, &SectionEntry)> {
        self.map.iter()
    }

    /// This section as it is saved: with `copy_defaults`, merged with the
    /// defaults it does not override.
    pub(crate) fn effective(&self) -> Cow<'_, ConfigurationSection> {
        match &self.defaults {
            Some(defaults) if self.options.copy_defaults => Cow::Owned(self.merged_with(defaults)),
            _ => Cow::Borrowed(self),
        }
    }

    fn merged_with(&self, defaults: &ConfigurationSection) -> ConfigurationSection {
        let mut merged = self.clone();
        for (key, default_entry) in &defaults.map {
            let child_path = merged.child_path(key);
            let options = merged.options;
            match (merged.map.get_mut(key), &default_entry.value) {
                (None, _) => {
                    let mut entry = default_entry.clone();
                    if let Value::Section(section) = &mut entry.value {
                        section.rebase(child_path, options);
                    }
                    merged.map.insert(key.clone(), entry);
                }
                (Some(SectionEntry { value: Value::Section(local), .. }), Value::Section(default_child)) => {
                    *local = local.merged_with(default_child);
                }
                _ => {}
            }
        }
        merged
    }

    // Comments

    /// Block comments above `path`; empty when the key does not exist.
    pub fn comments(&self, path: &str) -> &[Option<String>] {
        self.entry(path)
            .map(|entry| entry.comments.as_slice())
            .unwrap_or_default()
    }

    /// Replace the block comments of `path`. Does nothing for missing keys.
    pub fn set_comments(&mut self, path: &str, comments: Vec<Option<String>>) {
        if let Some(entry) = self.entry_mut(path) {
            entry.comments = comments;
        }
    }

    /// Inline comments of `path`; empty when the key does not exist.
    pub fn inline_comments(&self, path: &str) -> &[Option<String>] {
        self.entry(path)
            .map(|entry| entry.inline_comments.as_slice())
            .unwrap_or_default()
    }

    /// Replace the inline comments of `path`. Does nothing for missing keys.
    pub fn set_inline_comments(&mut self, path: &str, comments: Vec<Option<String>>) {
        if let Some(entry) = self.entry_mut(path) {
            entry.inline_comments = comments;
        }
    }

    // Defaults

    /// Use `defaults` for lookups that miss in this section.
    pub fn set_defaults(&mut self, defaults: impl Into<Arc<ConfigurationSection>>) {
        self.defaults = Some(defaults.into());
    }

    /// Stop falling back to a defaults section.
    pub fn clear_defaults(&mut self) {
        self.defaults = None;
    }

    /// The shared defaults section, to hand to another section.
    pub fn defaults(&self) -> Option<&Arc<ConfigurationSection>> {
        self.defaults.as_ref()
    }

    /// The defaults section consulted on lookup misses.
    pub fn default_section(&self) -> Option<&ConfigurationSection> {
        self.defaults.as_deref()
    }

    /// Set a default value, creating the defaults section if needed.
    ///
    /// Defaults shared with other sections are copied first.
    pub fn add_default(&mut self, path: &str, value: impl Into<Value>) {
        let options = self.options;
        let defaults = self
            .defaults
            .get_or_insert_with(|| Arc::new(ConfigurationSection::with_options(options)));
        Arc::make_mut(defaults).set(path, value);
    }

    // Typed getters

    /// The nested section at `path`, from the defaults if it is not set
    /// here. `None` when the value there is not a section.
    pub fn section(&self, path: &str) -> Option<&ConfigurationSection> {
        self.get(path)?.as_section()
    }

    /// A nested section set in this section itself.
    pub fn section_mut(&mut self, path: &str) -> Option<&mut ConfigurationSection> {
        self.get_mut(path)?.as_section_mut()
    }

    /// The string at `path`. Numbers and booleans are not converted; see
    /// [`Value::to_scalar_string`] for that.
    pub fn get_string(&self, path: &str) -> Option<&str> {
        self.get(path)?.as_str()
    }

    /// The integer at `path`.
    pub fn get_i64(&self, path: &str) -> Option<i64> {
        self.get(path)?.as_i64()
    }

    /// The number at `path`; integers are widened.
    pub fn get_f64(&self, path: &str) -> Option<f64> {
        self.get(path)?.as_f64()
    }

    /// The boolean at `path`.
    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path)?.as_bool()
    }

    /// The items of the sequence at `path`.
    pub fn get_sequence(&self, path: &str) -> Option<&[Value]> {
        self.get(path)?.as_sequence()
    }

    /// The typed object at `path`, resolved or not.
    pub fn get_object(&self, path: &str) -> Option<&TypedObject> {
        self.get(path)?.as_object()
    }

    /// Scalars of the sequence at `path` as strings. Other items are skipped.
    pub fn get_string_list(&self, path: &str) -> Vec<String> {
        self.get_sequence(path)
            .unwrap_or_default()
            .iter()
            .filter_map(Value::to_scalar_string)
            .collect()
    }

    /// The string at `path`, or `default` when it is missing or not a
    /// string.
    pub fn get_string_or<'a>(&'a self, path: &str, default: &'a str) -> &'a str {
        self.get_string(path).unwrap_or(default)
    }

    /// The integer at `path`, or `default`.
    pub fn get_i64_or(&self, path: &str, default: i64) -> i64 {
        self.get_i64(path).unwrap_or(default)
    }

    /// The number at `path`, or `default`.
    pub fn get_f64_or(&self, path: &str, default: f64) -> f64 {
        self.get_f64(path).unwrap_or(default)
    }

    /// The boolean at `path`, or `default`.
    pub fn get_bool_or(&self, path: &str, default: bool) -> bool {
        self.get_bool(path).unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_and(lines: &[&str]) -> Vec<Option<String>> {
        std::iter::once(None)
            .chain(lines.iter().map(|l| Some(l.to_string())))
            .collect()
    }

    #[test]
    fn test_set_and_get_paths() {
        let mut section = ConfigurationSection::new();
        section.set("server.host", "localhost");
        section.set("server.port", 8080);
        section.set("debug", true);

        assert_eq!(section.get_string("server.host"), Some("localhost"));
        assert_eq!(section.get_i64("server.port"), Some(8080));
        assert_eq!(section.get_bool("debug"), Some(true));
        assert_eq!(section.get("server.missing"), None);
        assert_eq!(section.get("debug.nested"), None);

        let server = section.section("server").unwrap();
        assert_eq!(server.name(), "server");
        assert_eq!(server.current_path(), "server");
        assert_eq!(section.keys(false), vec!["server", "debug"]);
        assert_eq!(section.keys(true), vec!["server", "server.host", "server.port", "debug"]);
    }

    #[test]
    fn test_set_replaces_values_in_the_way() {
        let mut section = ConfigurationSection::new();
        section.set("a", 1);
        section.set("a.b", 2);
        assert_eq!(section.get_i64("a.b"), Some(2));
        assert_eq!(section.section("a").map(ConfigurationSection::current_path), Some("a"));
    }

    #[test]
    fn test_set_null_removes() {
        let mut section = ConfigurationSection::new();
        section.set("a.b", 1);
        section.set("c", 2);
        section.set("a.b", Value::Null);
        section.set("missing.key", Value::Null);
        assert!(!section.contains("a.b"));
        assert!(section.contains("a"));
        assert!(!section.contains("missing"));
        section.set("c", Value::Null);
        assert_eq!(section.keys(false), vec!["a"]);
    }

    #[test]
    fn test_create_section_overwrites() {
        let mut section = ConfigurationSection::new();
        section.set("a", "text");
        section.set_comments("a", blank_and(&["about a"]));
        section.create_section("a.b").set("c", 1);
        assert_eq!(section.get_i64("a.b.c"), Some(1));
        assert_eq!(section.section("a.b").map(ConfigurationSection::current_path), Some("a.b"));
        assert_eq!(section.comments("a"), blank_and(&["about a"]).as_slice());

        section.create_section("a");
        assert!(section.section("a").is_some_and(ConfigurationSection::is_empty));
    }

    #[test]
    fn test_comments_follow_keys() {
        let mut section = ConfigurationSection::new();
        section.set("a", 1);
        section.set_comments("a", vec![Some("first".into())]);
        section.set_inline_comments("a", vec![Some("inline".into())]);
        section.set("a", 2);
        assert_eq!(section.comments("a"), [Some("first".to_string())]);
        assert_eq!(section.inline_comments("a"), [Some("inline".to_string())]);

        section.set_comments("missing", vec![Some("lost".into())]);
        assert!(section.comments("missing").is_empty());
        assert!(!section.contains("missing"));
    }

    #[test]
    fn test_reparenting_rewrites_paths() {
        let mut inner = ConfigurationSection::new();
        inner.set("x.y", 1);
        let mut root = ConfigurationSection::new();
        root.set("outer.inner", inner);

        let y_parent = root.section("outer.inner.x").unwrap();
        assert_eq!(y_parent.current_path(), "outer.inner.x");
        assert_eq!(y_parent.name(), "x");
    }

    #[test]
    fn test_defaults_fallback() {
        let mut defaults = ConfigurationSection::new();
        defaults.set("x", 5);
        defaults.set("nested.y", "d");
        let defaults = Arc::new(defaults);

        let mut section = ConfigurationSection::new();
        section.set_defaults(Arc::clone(&defaults));
        assert_eq!(section.get_i64("x"), Some(5));
        assert_eq!(section.get_string("nested.y"), Some("d"));
        assert!(section.contains("x"));
        assert!(!section.contains_local("x"));
        assert!(!section.is_set("x"));

        section.set("x", 7);
        assert_eq!(section.get_i64("x"), Some(7));
        assert_eq!(defaults.get_i64("x"), Some(5));

        section.set("nested.z", 1);
        assert_eq!(section.get_string("nested.y"), Some("d"));
    }

    #[test]
    fn test_add_default_copies_shared_defaults() {
        let shared = Arc::new(ConfigurationSection::new());
        let mut a = ConfigurationSection::new();
        a.set_defaults(Arc::clone(&shared));
        a.add_default("port", 80);

        assert_eq!(a.get_i64("port"), Some(80));
        assert!(shared.is_empty());
        assert!(!Arc::ptr_eq(a.defaults().unwrap(), &shared));

        let mut b = ConfigurationSection::new();
        b.add_default("host", "localhost");
        assert_eq!(b.default_section().and_then(|d| d.get_string("host")), Some("localhost"));
    }

    #[test]
    fn test_copy_defaults_in_listing() {
        let mut section = ConfigurationSection::with_options(ConfigurationOptions::new().copy_defaults(true));
        section.set("nested.a", 1);
        section.add_default("nested.b", 2);
        section.add_default("top", 3);
        assert!(section.is_set("top"));
        assert_eq!(section.keys(true), vec!["nested", "nested.a", "nested.b", "top"]);
        assert_eq!(section.len(), 1);
    }

    #[test]
    fn test_custom_separator() {
        let mut section = ConfigurationSection::with_options(ConfigurationOptions::new().path_separator('/'));
        section.set("a/b.c", 1);
        assert_eq!(section.get_i64("a/b.c"), Some(1));
        assert_eq!(section.keys(true), vec!["a", "a/b.c"]);

        section.set_options(ConfigurationOptions::new());
        assert_eq!(section.section("a").map(ConfigurationSection::current_path), Some("a"));
        assert_eq!(section.get_i64("a.b.c"), None);
    }

    #[test]
    fn test_typed_getters() {
        let mut section = ConfigurationSection::new();
        section.set("ratio", 2);
        section.set("names", vec![Value::from("a"), Value::Int(1), Value::Bool(false), Value::Null]);
        assert_eq!(section.get_f64("ratio"), Some(2.0));
        assert_eq!(section.get_string_list("names"), vec!["a", "1", "false"]);
        assert!(section.get_string_list("missing").is_empty());
        assert_eq!(section.get_string_or("missing", "fallback"), "fallback");
        assert_eq!(section.get_i64_or("ratio", 0), 2);
        assert!(section.get_bool_or("missing", true));
        assert_eq!(section.get_f64_or("names", 1.5), 1.5);
        assert_eq!(section.remove("ratio"), Some(Value::Int(2)));
        assert!(section.get_mut("names").is_some());
        assert!(section.section_mut("names").is_none());
    }
}
