use crate::error::{Result, TraceError};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Options handed to rule sets (string key → arbitrary value)
///
/// Resolved once per run by merging sources in order; later sources override
/// keys of earlier ones.
///
/// # Example
/// ```
/// use dostrace::substitution::RuleOptions;
///
/// let base = RuleOptions::from_json_str("base", r#"{"mul32-entry": "1000:0000"}"#).unwrap();
/// let site = RuleOptions::from_toml_str("site", r#"mul32-entry = "2A74:363C""#).unwrap();
/// let merged = RuleOptions::merged([base, site]);
/// assert_eq!(merged.get_str("mul32-entry"), Some("2A74:363C"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleOptions {
    values: Map<String, Value>,
}

impl RuleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_value(source_name: &str, value: Value) -> Result<Self> {
        match value {
            Value::Object(values) => Ok(Self { values }),
            other => Err(TraceError::Options {
                source_name: source_name.to_string(),
                message: format!("expected a table of options, found {}", other),
            }),
        }
    }

    /// Parse a JSON object of options
    pub fn from_json_str(source_name: &str, text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| TraceError::Options {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })?;
        Self::from_value(source_name, value)
    }

    /// Parse a TOML table of options
    pub fn from_toml_str(source_name: &str, text: &str) -> Result<Self> {
        let value: Value = toml::from_str(text).map_err(|e| TraceError::Options {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })?;
        Self::from_value(source_name, value)
    }

    /// Load options from a `.toml` or JSON file (by extension)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let name = path.display().to_string();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&name, &text),
            _ => Self::from_json_str(&name, &text),
        }
    }

    /// Merge `other` into `self`; keys of `other` win
    pub fn merge(&mut self, other: RuleOptions) {
        self.values.extend(other.values);
    }

    /// Merge sources in order
    pub fn merged<I>(sources: I) -> Self
    where
        I: IntoIterator<Item = RuleOptions>,
    {
        let mut options = Self::new();
        for source in sources {
            options.merge(source);
        }
        options
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// String value of `key`, `None` if absent or not a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_later_sources_override() {
        let first = RuleOptions::from_json_str("a", r#"{"x": 1, "y": "keep"}"#).unwrap();
        let second = RuleOptions::from_json_str("b", r#"{"x": 2}"#).unwrap();
        let merged = RuleOptions::merged([first, second]);

        assert_eq!(merged.get("x"), Some(&Value::from(2)));
        assert_eq!(merged.get_str("y"), Some("keep"));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_no_sources_is_empty() {
        let merged = RuleOptions::merged(Vec::new());
        assert!(merged.is_empty());
        assert!(!merged.contains("mul32-entry"));
    }

    #[test]
    fn test_non_table_rejected() {
        let err = RuleOptions::from_json_str("list.json", "[1, 2]").unwrap_err();
        assert!(matches!(err, TraceError::Options { .. }));
        assert!(err.to_string().contains("list.json"));
    }

    #[test]
    fn test_toml_source() {
        let opts = RuleOptions::from_toml_str("cfg.toml", "mul32-entry = \"2A74:363C\"\nlimit = 4")
            .unwrap();
        assert_eq!(opts.get_str("mul32-entry"), Some("2A74:363C"));
        assert_eq!(opts.get("limit").and_then(Value::as_i64), Some(4));
    }

    #[test]
    fn test_from_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("opts.json");
        let toml_path = dir.path().join("opts.toml");
        fs::write(&json, r#"{"mul32-entry": "1000:0000"}"#).unwrap();
        fs::write(&toml_path, "mul32-entry = \"2000:0000\"").unwrap();

        let merged = RuleOptions::merged([
            RuleOptions::from_file(&json).unwrap(),
            RuleOptions::from_file(&toml_path).unwrap(),
        ]);
        assert_eq!(merged.get_str("mul32-entry"), Some("2000:0000"));
    }

    #[test]
    fn test_get_str_ignores_non_strings() {
        let mut opts = RuleOptions::new();
        opts.set("mul32-entry", 42);
        assert!(opts.contains("mul32-entry"));
        assert_eq!(opts.get_str("mul32-entry"), None);
    }
}
