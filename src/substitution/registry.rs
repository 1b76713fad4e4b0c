use super::generic::GenericRules;
use super::RuleSet;
use crate::error::{Result, TraceError};
use std::collections::BTreeMap;

/// Constructor of a rule set
pub type RuleSetConstructor = fn() -> Box<dyn RuleSet>;

/// Registry of substitution rule sets, keyed by identifier
///
/// Populated by explicit registration; nothing is looked up dynamically.
///
/// # Example
/// ```
/// use dostrace::substitution::RuleRegistry;
///
/// let registry = RuleRegistry::with_builtin();
/// assert!(registry.contains("generic"));
/// assert!(registry.create("missing").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    constructors: BTreeMap<String, RuleSetConstructor>,
}

impl RuleRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in rule sets
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(GenericRules::NAME, || Box::new(GenericRules));
        registry
    }

    /// Register (or replace) a rule set constructor
    pub fn register(&mut self, name: &str, constructor: RuleSetConstructor) {
        if self
            .constructors
            .insert(name.to_string(), constructor)
            .is_some()
        {
            tracing::debug!(rule_set = name, "Replaced registered rule set");
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered identifiers, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Instantiate the rule set registered as `name`
    ///
    /// # Errors
    /// [`TraceError::UnknownRuleSet`] if nothing is registered under `name`.
    pub fn create(&self, name: &str) -> Result<Box<dyn RuleSet>> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| TraceError::UnknownRuleSet(name.to_string()))?;
        Ok(constructor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substitution::{Rule, RuleOptions};

    struct Empty;

    impl RuleSet for Empty {
        fn name(&self) -> &str {
            "empty"
        }

        fn rules(&self, _options: &RuleOptions) -> Result<Vec<Rule>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_builtin_registered() {
        let registry = RuleRegistry::with_builtin();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["generic"]);
        assert_eq!(registry.create("generic").unwrap().name(), "generic");
    }

    #[test]
    fn test_explicit_registration() {
        let mut registry = RuleRegistry::new();
        assert!(!registry.contains("empty"));
        registry.register("empty", || Box::new(Empty));
        assert!(registry.contains("empty"));

        let rule_set = registry.create("empty").unwrap();
        assert!(rule_set.rules(&RuleOptions::new()).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_rule_set() {
        let registry = RuleRegistry::new();
        let err = registry.create("generic").err().unwrap();
        assert!(matches!(err, TraceError::UnknownRuleSet(name) if name == "generic"));
    }
}
