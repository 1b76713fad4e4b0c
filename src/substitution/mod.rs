// Idiom folding: replace recognized instruction runs with pseudo-records
//
// Each rule pairs a chain of pattern steps with a function that renders the
// pseudo-instruction from the captured values. Applying a rule hides every
// consumed instruction and attaches the pseudo-record to the first one; nothing
// is deleted, so indices stay contiguous and `--show-hidden` can replay the
// originals.
//
// Rules may re-scan records hidden by earlier rules. A rule set that needs an
// option the merged configuration lacks leaves the corresponding rule out
// instead of failing.

mod generic;
mod options;
mod registry;

pub use generic::{GenericRules, MUL32_ENTRY};
pub use options::RuleOptions;
pub use registry::{RuleRegistry, RuleSetConstructor};

use crate::error::Result;
use crate::record::Pseudo;
use crate::sequence::{find_all, PatternStep, SequenceMatch};
use crate::store::TraceStore;
use std::fmt;

/// Rendered pseudo-instruction for one match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub text: String,
    pub description: String,
}

impl Substitution {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Hide every consistent match of `steps` and attach the pseudo-record
/// rendered by `produce` to its first instruction
///
/// `produce` may decline a match by returning `None`. Returns the number of
/// substitutions made.
pub fn apply_rule<F>(store: &mut TraceStore, steps: &[PatternStep], produce: F) -> usize
where
    F: Fn(&SequenceMatch) -> Option<Substitution>,
{
    let planned: Vec<_> = find_all(store, steps)
        .filter_map(|m| {
            let substitution = produce(&m)?;
            let pseudo = Pseudo {
                first_index: m.first_index(),
                last_index: m.last_index(),
                first_address: m.first_address(),
                last_address: m.last_address(),
                text: substitution.text,
                description: substitution.description,
            };
            Some((m.positions(), pseudo))
        })
        .collect();

    let count = planned.len();
    for (positions, pseudo) in planned {
        for position in positions.clone() {
            if let Some(insn) = store.get_mut(position) {
                insn.hidden = true;
            }
        }
        if let Some(anchor) = store.get_mut(positions.start) {
            if let Some(previous) = anchor.pseudo.replace(pseudo) {
                tracing::debug!(
                    index = anchor.index,
                    replaced = %previous.text,
                    "Pseudo-record replaced"
                );
            }
        }
    }
    count
}

type Produce = Box<dyn Fn(&SequenceMatch) -> Option<Substitution>>;

/// One named idiom: pattern steps plus the rendering function
pub struct Rule {
    name: String,
    steps: Vec<PatternStep>,
    produce: Produce,
}

impl Rule {
    pub fn new<F>(name: impl Into<String>, steps: Vec<PatternStep>, produce: F) -> Self
    where
        F: Fn(&SequenceMatch) -> Option<Substitution> + 'static,
    {
        Self {
            name: name.into(),
            steps,
            produce: Box::new(produce),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[PatternStep] {
        &self.steps
    }

    /// Apply to `store`; returns the number of substitutions
    pub fn apply(&self, store: &mut TraceStore) -> usize {
        apply_rule(store, &self.steps, &self.produce)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

/// Named family of rules built from the resolved options
pub trait RuleSet {
    fn name(&self) -> &str;

    /// Rules in application order; rules whose options are missing are left out
    fn rules(&self, options: &RuleOptions) -> Result<Vec<Rule>>;
}

/// Substitution count of one rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    pub rule_set: String,
    pub rule: String,
    pub substitutions: usize,
}

/// Result of a [`SubstitutionEngine::run`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionReport {
    pub outcomes: Vec<RuleOutcome>,
}

impl SubstitutionReport {
    pub fn total(&self) -> usize {
        self.outcomes.iter().map(|o| o.substitutions).sum()
    }

    /// Substitutions made by `rule` across all rule sets
    pub fn count(&self, rule: &str) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.rule == rule)
            .map(|o| o.substitutions)
            .sum()
    }
}

/// Applies registered rule sets with one resolved option map
#[derive(Debug, Clone)]
pub struct SubstitutionEngine {
    registry: RuleRegistry,
    options: RuleOptions,
}

impl SubstitutionEngine {
    pub fn new(registry: RuleRegistry, options: RuleOptions) -> Self {
        Self { registry, options }
    }

    pub fn options(&self) -> &RuleOptions {
        &self.options
    }

    /// Apply the named rule sets in order
    ///
    /// # Errors
    /// [`crate::TraceError::UnknownRuleSet`] for an unregistered name, raised
    /// before any rule touches the store.
    pub fn run<S: AsRef<str>>(
        &self,
        store: &mut TraceStore,
        rule_sets: &[S],
    ) -> Result<SubstitutionReport> {
        let sets = rule_sets
            .iter()
            .map(|name| self.registry.create(name.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let mut report = SubstitutionReport::default();
        for set in sets {
            for rule in set.rules(&self.options)? {
                let substitutions = rule.apply(store);
                tracing::debug!(
                    rule_set = set.name(),
                    rule = rule.name(),
                    substitutions,
                    "Applied substitution rule"
                );
                report.outcomes.push(RuleOutcome {
                    rule_set: set.name().to_string(),
                    rule: rule.name().to_string(),
                    substitutions,
                });
            }
        }
        Ok(report)
    }
}
