use crate::error::{Result, TraceError};
use crate::record::Instruction;
use regex::Regex;
use std::collections::BTreeMap;

/// Named captures of one matched record (group name → matched text)
pub type Captures = BTreeMap<String, String>;

/// Capture names starting with this marker are scratch values: they may
/// differ between records and are never checked for consistency
pub const SCRATCH_PREFIX: char = '_';

/// Record field a [`PatternStep`] is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchField {
    /// Disassembly text (e.g. `push ax`)
    #[default]
    Mnemonic,
    /// Operand description (e.g. `ds:[0042]=1234`)
    Description,
    /// Opcode hex string (e.g. `cd21`)
    Opcode,
}

impl MatchField {
    fn select<'a>(&self, insn: &'a Instruction) -> &'a str {
        match self {
            MatchField::Mnemonic => &insn.mnemonic,
            MatchField::Description => &insn.description,
            MatchField::Opcode => &insn.opcode,
        }
    }
}

/// Single-position matcher with a repetition range and optional negation
///
/// The pattern must match the whole field. Matching is greedy: a step
/// consumes as many records as it can (up to `max_count`) and never gives any
/// back to let a following step succeed.
///
/// # Example
/// ```
/// use dostrace::sequence::PatternStep;
///
/// let push = PatternStep::new(r"push (?P<param>.*)").unwrap();
/// let body = PatternStep::new(r"ret.*").unwrap().repeat(0, 30).unwrap().inverted();
/// assert_eq!(push.min_count(), 1);
/// assert!(body.is_inverted());
/// ```
#[derive(Debug, Clone)]
pub struct PatternStep {
    regex: Regex,
    pattern: String,
    min_count: usize,
    max_count: usize,
    invert: bool,
    field: MatchField,
}

impl PatternStep {
    /// Step matching exactly one record against `pattern`
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{})$", pattern))
            .map_err(|e| TraceError::Pattern(format!("{}: {}", pattern, e)))?;
        Ok(Self {
            regex,
            pattern: pattern.to_string(),
            min_count: 1,
            max_count: 1,
            invert: false,
            field: MatchField::Mnemonic,
        })
    }

    /// Step with all construction parameters given at once
    pub fn with_options(
        pattern: &str,
        min_count: usize,
        max_count: usize,
        invert: bool,
    ) -> Result<Self> {
        let step = Self::new(pattern)?.repeat(min_count, max_count)?;
        Ok(if invert { step.inverted() } else { step })
    }

    /// Accept between `min_count` and `max_count` consecutive records
    pub fn repeat(mut self, min_count: usize, max_count: usize) -> Result<Self> {
        if max_count < min_count {
            return Err(TraceError::Pattern(format!(
                "{}: max count {} is below min count {}",
                self.pattern, max_count, min_count
            )));
        }
        self.min_count = min_count;
        self.max_count = max_count;
        Ok(self)
    }

    /// Consume records that do NOT match the pattern
    pub fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }

    /// Match against another record field
    pub fn on_field(mut self, field: MatchField) -> Self {
        self.field = field;
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn min_count(&self) -> usize {
        self.min_count
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }

    pub fn is_inverted(&self) -> bool {
        self.invert
    }

    fn captures_of(&self, insn: &Instruction) -> Option<Captures> {
        let text = self.field.select(insn);
        let caps = self.regex.captures(text)?;
        let mut out = Captures::new();
        for name in self.regex.capture_names().flatten() {
            if let Some(m) = caps.name(name) {
                out.insert(name.to_string(), m.as_str().to_string());
            }
        }
        Some(out)
    }

    /// Match greedily from the start of `window`
    ///
    /// Returns one capture map per consumed record, or `None` if the number of
    /// consumed records falls outside `[min_count, max_count]`.
    pub fn match_at(&self, window: &[Instruction]) -> Option<Vec<Captures>> {
        let mut consumed = Vec::new();

        for insn in window.iter().take(self.max_count) {
            let captures = match (self.captures_of(insn), self.invert) {
                (Some(captures), false) => captures,
                (None, true) => Captures::new(),
                _ => break,
            };
            consumed.push(captures);
        }

        (consumed.len() >= self.min_count).then_some(consumed)
    }
}
