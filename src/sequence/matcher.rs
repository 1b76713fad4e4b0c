use super::step::{Captures, PatternStep, SCRATCH_PREFIX};
use crate::record::{Address, Instruction};
use crate::store::TraceStore;
use std::ops::Range;

/// A consistent run of records matched by a chain of [`PatternStep`]s
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceMatch {
    positions: Range<usize>,
    runs: Vec<Vec<Captures>>,
    variables: Captures,
    first_index: u64,
    last_index: u64,
    first_address: Address,
    last_address: Address,
}

impl SequenceMatch {
    /// Storage positions covered by the match
    pub fn positions(&self) -> Range<usize> {
        self.positions.clone()
    }

    /// Number of consumed records
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Merged, consistent value of a (non-scratch) capture
    pub fn get(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    /// All merged, consistent captures
    pub fn variables(&self) -> &Captures {
        &self.variables
    }

    /// Per-record capture maps, in record order (scratch captures included)
    pub fn groupdicts(&self) -> impl Iterator<Item = &Captures> {
        self.runs.iter().flatten()
    }

    /// Per-record capture maps of the records consumed by step `step`
    pub fn step(&self, step: usize) -> Option<&[Captures]> {
        self.runs.get(step).map(Vec::as_slice)
    }

    pub fn first_index(&self) -> u64 {
        self.first_index
    }

    pub fn last_index(&self) -> u64 {
        self.last_index
    }

    pub fn first_address(&self) -> Address {
        self.first_address
    }

    pub fn last_address(&self) -> Address {
        self.last_address
    }
}

impl std::fmt::Display for SequenceMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let vars: Vec<String> = self
            .variables
            .iter()
            .map(|(key, value)| format!("{} = {}", key, value))
            .collect();
        write!(f, "Variables<{}>", vars.join(", "))
    }
}

/// Merge per-record captures; `None` if a non-scratch name is bound to
/// different values
fn merge_consistent<'a, I>(captures: I) -> Option<Captures>
where
    I: IntoIterator<Item = &'a Captures>,
{
    let mut merged = Captures::new();
    for groupdict in captures {
        for (key, value) in groupdict {
            if key.starts_with(SCRATCH_PREFIX) {
                continue;
            }
            match merged.get(key) {
                Some(existing) if existing != value => return None,
                Some(_) => {}
                None => {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
    }
    Some(merged)
}

/// Try the whole chain of steps at storage position `start`
fn match_chain(
    records: &[Instruction],
    start: usize,
    steps: &[PatternStep],
) -> Option<SequenceMatch> {
    if steps.is_empty() || start >= records.len() {
        return None;
    }

    let mut pos = start;
    let mut runs = Vec::with_capacity(steps.len());
    for step in steps {
        let run = step.match_at(&records[pos..])?;
        pos += run.len();
        runs.push(run);
    }

    // A chain of optional steps that consumed nothing has no span
    if pos == start {
        return None;
    }

    let variables = merge_consistent(runs.iter().flatten())?;
    let first = &records[start];
    let last = &records[pos - 1];

    Some(SequenceMatch {
        positions: start..pos,
        runs,
        variables,
        first_index: first.index,
        last_index: last.index,
        first_address: first.address,
        last_address: last.address,
    })
}

/// Chains [`PatternStep`]s over a sliding window of a trace
///
/// # Example
/// ```
/// use dostrace::record::{Address, Instruction};
/// use dostrace::sequence::{PatternStep, SequenceMatcher};
/// use dostrace::store::TraceStore;
///
/// let mut store = TraceStore::new();
/// store.push(Instruction::new(Address::new(0x1000, 0), "add  ax,bx"));
/// store.push(Instruction::new(Address::new(0x1000, 2), "adc  dx,cx"));
///
/// let matcher = SequenceMatcher::new(vec![
///     PatternStep::new(r"add  (?P<lodst>[^,]+),(?P<losrc>.*)").unwrap(),
///     PatternStep::new(r"adc  (?P<hidst>[^,]+),(?P<hisrc>.*)").unwrap(),
/// ]);
/// let found: Vec<_> = matcher.find_all(&store).collect();
/// assert_eq!(found.len(), 1);
/// assert_eq!(found[0].get("hidst"), Some("dx"));
/// ```
#[derive(Debug, Clone)]
pub struct SequenceMatcher {
    steps: Vec<PatternStep>,
}

impl SequenceMatcher {
    pub fn new(steps: Vec<PatternStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[PatternStep] {
        &self.steps
    }

    /// Every consistent match, one per start offset, in storage order
    pub fn find_all<'a>(&'a self, store: &'a TraceStore) -> Matches<'a> {
        find_all(store, &self.steps)
    }

    /// The match starting exactly at storage position `start`, if any
    pub fn match_at(&self, store: &TraceStore, start: usize) -> Option<SequenceMatch> {
        match_chain(store.as_slice(), start, &self.steps)
    }
}

/// Lazy scan over every start offset of `store`
pub fn find_all<'a>(store: &'a TraceStore, steps: &'a [PatternStep]) -> Matches<'a> {
    Matches {
        records: store.as_slice(),
        steps,
        next_start: 0,
    }
}

/// Iterator returned by [`find_all`]
#[derive(Debug, Clone)]
pub struct Matches<'a> {
    records: &'a [Instruction],
    steps: &'a [PatternStep],
    next_start: usize,
}

impl Iterator for Matches<'_> {
    type Item = SequenceMatch;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next_start < self.records.len() {
            let start = self.next_start;
            self.next_start += 1;
            if let Some(found) = match_chain(self.records, start, self.steps) {
                return Some(found);
            }
        }
        None
    }
}
