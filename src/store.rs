//! Ordered, filterable container of trace instructions
//!
//! Gaps are folded into the instruction indices on [`TraceStore::load`] and
//! re-materialized only by [`TraceStore::to_records`] (and therefore by
//! serialization). Positional access (`store[i]`, [`TraceStore::len`]) is by
//! storage position, not by instruction index.

use crate::error::{Result, TraceError};
use crate::record::{Gap, Instruction, Pseudo, TraceItem, TraceRecord};
use std::ops::Index;

/// In-memory trace: instructions in capture order, gaps folded into indices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceStore {
    records: Vec<Instruction>,
}

impl TraceStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest pre-parsed records, deriving every instruction index from its
    /// position and the preceding gaps
    ///
    /// # Errors
    /// A standalone pseudo-record has no anchoring instruction and is
    /// rejected as [`TraceError::Format`], as are gaps that push the index
    /// past `u64::MAX`.
    pub fn load<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = TraceRecord>,
    {
        let mut store = Self::new();
        let mut counter: u64 = 0;

        for (position, record) in records.into_iter().enumerate() {
            match record {
                TraceRecord::Instruction(insn) => {
                    let mut insn = *insn;
                    counter = counter
                        .checked_add(1)
                        .ok_or_else(|| TraceError::format(position, "instruction index overflows"))?;
                    insn.index = counter;
                    store.records.push(insn);
                }
                TraceRecord::Gap(gap) => {
                    counter = counter
                        .checked_add(gap.length)
                        .ok_or_else(|| TraceError::format(position, "gap length overflows"))?;
                }
                TraceRecord::Pseudo(_) => {
                    return Err(TraceError::format(
                        position,
                        "pseudo-record without anchoring instruction",
                    ));
                }
            }
        }

        tracing::debug!(
            instructions = store.records.len(),
            last_index = counter,
            "Loaded trace"
        );
        Ok(store)
    }

    /// Append an instruction directly after the last one
    pub fn push(&mut self, mut insn: Instruction) {
        insn.index = self.records.last().map_or(1, |last| last.index + 1);
        self.records.push(insn);
    }

    /// Keep only the instructions satisfying `predicate` (in place, no
    /// renumbering)
    pub fn filter<P>(&mut self, mut predicate: P)
    where
        P: FnMut(&Instruction) -> bool,
    {
        let before = self.records.len();
        self.records.retain(|insn| predicate(insn));
        tracing::debug!(before, after = self.records.len(), "Filtered trace");
    }

    /// Keep the instructions with `first <= index <= last`; an omitted bound
    /// is unbounded
    ///
    /// # Errors
    /// [`TraceError::Range`] if both bounds are given and `first > last`; the
    /// store is left unchanged.
    pub fn filter_range(&mut self, first: Option<u64>, last: Option<u64>) -> Result<()> {
        match (first, last) {
            (None, None) => Ok(()),
            (Some(first), Some(last)) if first > last => Err(TraceError::Range { first, last }),
            _ => {
                let lower = first.unwrap_or(u64::MIN);
                let upper = last.unwrap_or(u64::MAX);
                self.filter(|insn| (lower..=upper).contains(&insn.index));
                Ok(())
            }
        }
    }

    /// Instructions interleaved with their attached pseudo-records
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.records.iter(),
            pending: None,
        }
    }

    /// Persistable records with every index discontinuity encoded as a gap
    pub fn to_records(&self) -> Vec<TraceRecord> {
        let mut out = Vec::with_capacity(self.records.len());
        let mut expected: u64 = 0;

        for insn in &self.records {
            expected += 1;
            if insn.index > expected {
                out.push(TraceRecord::Gap(Gap {
                    length: insn.index - expected,
                }));
            }
            expected = insn.index;
            out.push(insn.clone().into());
        }

        out
    }

    /// Instruction at storage position `position`
    pub fn get(&self, position: usize) -> Option<&Instruction> {
        self.records.get(position)
    }

    pub(crate) fn get_mut(&mut self, position: usize) -> Option<&mut Instruction> {
        self.records.get_mut(position)
    }

    /// All instructions in storage order
    pub fn as_slice(&self) -> &[Instruction] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Index<usize> for TraceStore {
    type Output = Instruction;

    fn index(&self, position: usize) -> &Self::Output {
        &self.records[position]
    }
}

impl<'a> IntoIterator for &'a TraceStore {
    type Item = TraceItem<'a>;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a [`TraceStore`]; a pseudo-record follows its anchor
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    inner: std::slice::Iter<'a, Instruction>,
    pending: Option<&'a Pseudo>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = TraceItem<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(pseudo) = self.pending.take() {
            return Some(TraceItem::Pseudo(pseudo));
        }
        let insn = self.inner.next()?;
        self.pending = insn.pseudo.as_ref();
        Some(TraceItem::Instruction(insn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Address;

    fn insn(mnemonic: &str) -> TraceRecord {
        Instruction::new(Address::new(0x1000, 0x100), mnemonic).into()
    }

    fn gap(length: u64) -> TraceRecord {
        TraceRecord::Gap(Gap { length })
    }

    fn indices(store: &TraceStore) -> Vec<u64> {
        store.as_slice().iter().map(|insn| insn.index).collect()
    }

    #[test]
    fn test_load_assigns_contiguous_indices() {
        let store = TraceStore::load(vec![insn("nop"), insn("nop"), insn("nop")]).unwrap();
        assert_eq!(indices(&store), vec![1, 2, 3]);
    }

    #[test]
    fn test_load_folds_gaps() {
        let store = TraceStore::load(vec![insn("a"), gap(5), insn("b"), insn("c")]).unwrap();
        assert_eq!(indices(&store), vec![1, 7, 8]);
    }

    #[test]
    fn test_load_leading_gap() {
        let store = TraceStore::load(vec![gap(9), insn("a")]).unwrap();
        assert_eq!(indices(&store), vec![10]);
    }

    #[test]
    fn test_load_rejects_standalone_pseudo() {
        let pseudo = Pseudo {
            first_index: 1,
            last_index: 2,
            first_address: Address::default(),
            last_address: Address::default(),
            text: "x".to_string(),
            description: String::new(),
        };
        let err = TraceStore::load(vec![insn("a"), TraceRecord::Pseudo(pseudo)]).unwrap_err();
        assert!(matches!(err, TraceError::Format { position: 1, .. }));
    }

    #[test]
    fn test_load_rejects_index_overflow() {
        let err = TraceStore::load(vec![gap(u64::MAX), insn("a")]).unwrap_err();
        assert!(matches!(err, TraceError::Format { position: 1, .. }));

        let err = TraceStore::load(vec![insn("a"), gap(u64::MAX)]).unwrap_err();
        assert!(matches!(err, TraceError::Format { position: 1, .. }));

        let store = TraceStore::load(vec![gap(u64::MAX - 1), insn("a")]).unwrap();
        assert_eq!(indices(&store), vec![u64::MAX]);
    }

    #[test]
    fn test_filter_range_inclusive() {
        let records: Vec<_> = (0..30).map(|_| insn("nop")).collect();
        let mut store = TraceStore::load(records).unwrap();
        store.filter_range(Some(10), Some(20)).unwrap();
        assert_eq!(indices(&store), (10..=20).collect::<Vec<_>>());
    }

    #[test]
    fn test_filter_range_open_bounds() {
        let records: Vec<_> = (0..10).map(|_| insn("nop")).collect();
        let mut store = TraceStore::load(records).unwrap();
        store.filter_range(Some(8), None).unwrap();
        assert_eq!(indices(&store), vec![8, 9, 10]);

        store.filter_range(None, Some(8)).unwrap();
        assert_eq!(indices(&store), vec![8]);
    }

    #[test]
    fn test_filter_range_rejects_inverted_bounds() {
        let records: Vec<_> = (0..30).map(|_| insn("nop")).collect();
        let mut store = TraceStore::load(records).unwrap();
        let err = store.filter_range(Some(20), Some(10)).unwrap_err();
        assert!(matches!(err, TraceError::Range { first: 20, last: 10 }));
        assert_eq!(store.len(), 30);
    }

    #[test]
    fn test_filter_does_not_renumber() {
        let mut store =
            TraceStore::load(vec![insn("push ax"), insn("nop"), insn("pop ax")]).unwrap();
        store.filter(|insn| insn.mnemonic != "nop");
        assert_eq!(indices(&store), vec![1, 3]);
    }

    #[test]
    fn test_to_records_materializes_gaps() {
        let mut store = TraceStore::load(vec![gap(2), insn("a"), insn("b"), insn("c")]).unwrap();
        store.filter(|insn| insn.mnemonic != "b");

        let records = store.to_records();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0], gap(2));
        assert!(matches!(&records[1], TraceRecord::Instruction(i) if i.mnemonic == "a"));
        assert_eq!(records[2], gap(1));
        assert!(matches!(&records[3], TraceRecord::Instruction(i) if i.mnemonic == "c"));
    }

    #[test]
    fn test_iter_yields_pseudo_after_anchor() {
        let mut store = TraceStore::load(vec![insn("a"), insn("b"), insn("c")]).unwrap();
        store.get_mut(1).unwrap().pseudo = Some(Pseudo {
            first_index: 2,
            last_index: 3,
            first_address: Address::default(),
            last_address: Address::default(),
            text: "folded".to_string(),
            description: String::new(),
        });

        let kinds: Vec<String> = store
            .iter()
            .map(|item| match item {
                TraceItem::Instruction(insn) => insn.mnemonic.clone(),
                TraceItem::Pseudo(pseudo) => format!("+{}", pseudo.text),
            })
            .collect();
        assert_eq!(kinds, vec!["a", "b", "+folded", "c"]);

        // Restartable
        assert_eq!(store.iter().count(), 4);
    }

    #[test]
    fn test_push_continues_numbering() {
        let mut store = TraceStore::load(vec![gap(4), insn("a")]).unwrap();
        store.push(Instruction::new(Address::default(), "b"));
        assert_eq!(indices(&store), vec![5, 6]);
        assert_eq!(store[1].mnemonic, "b");
    }
}
