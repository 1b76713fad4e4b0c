//! Trace filtering for `dostrace filter -i CLASS`
//!
//! Supports:
//! - `all`: keep every record (only the index range applies)
//! - `syscall`: keep service call triggers, `iret`s and the record following
//!   each `iret` (it carries the call's return values)

use crate::decoder::DOS_VECTOR;
use crate::record::Instruction;
use crate::store::TraceStore;
use clap::ValueEnum;

/// Portion of a trace to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum IncludeClass {
    All,
    Syscall,
}

/// Record filter built from a set of include classes
#[derive(Debug, Clone)]
pub struct TraceFilter {
    classes: Vec<IncludeClass>,
    vector: u8,
}

impl TraceFilter {
    /// Create a filter that keeps everything
    pub fn all() -> Self {
        Self::new([IncludeClass::All])
    }

    pub fn new<I: IntoIterator<Item = IncludeClass>>(classes: I) -> Self {
        let mut filter = Self {
            classes: Vec::new(),
            vector: DOS_VECTOR,
        };
        for class in classes {
            if !filter.classes.contains(&class) {
                filter.classes.push(class);
            }
        }
        filter
    }

    /// Interrupt vector treated as a service call (default `0x21`)
    pub fn with_vector(mut self, vector: u8) -> Self {
        self.vector = vector;
        self
    }

    pub fn includes(&self, class: IncludeClass) -> bool {
        self.classes.contains(&class)
    }

    /// Filter `store` in place; returns the number of records removed
    pub fn apply(&self, store: &mut TraceStore) -> usize {
        if self.includes(IncludeClass::All) {
            return 0;
        }

        let before = store.len();
        let mut syscall = self
            .includes(IncludeClass::Syscall)
            .then(|| SyscallPredicate::new(self.vector));
        store.filter(|insn| syscall.as_mut().is_some_and(|p| p.keep(insn)));

        let removed = before - store.len();
        tracing::debug!(
            classes = ?self.classes,
            kept = store.len(),
            removed,
            "Applied trace filter"
        );
        removed
    }
}

/// Stateful predicate: the record after an `iret` is kept by index
struct SyscallPredicate {
    vector: u8,
    followup: Option<u64>,
}

impl SyscallPredicate {
    fn new(vector: u8) -> Self {
        Self {
            vector,
            followup: None,
        }
    }

    fn keep(&mut self, insn: &Instruction) -> bool {
        if insn.is_interrupt(self.vector) {
            true
        } else if insn.is_iret() {
            self.followup = Some(insn.index + 1);
            true
        } else {
            self.followup == Some(insn.index)
        }
    }
}
