//! Service call statistics for `strace --summary`

use crate::decoder::SyscallEvent;
use crate::syscalls::DosFunction;
use std::collections::HashMap;
use std::io::{self, Write};

/// Statistics for a single DOS function
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FunctionStats {
    /// Number of decoded calls
    pub count: u64,
    /// Calls whose completion had CF set
    pub failures: u64,
}

/// Tracks statistics for all decoded calls
#[derive(Debug, Clone, Default)]
pub struct SyscallSummary {
    stats: HashMap<DosFunction, FunctionStats>,
}

impl SyscallSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a decoded call
    pub fn record(&mut self, event: &SyscallEvent) {
        let entry = self.stats.entry(event.function()).or_default();
        entry.count += 1;
        if event.is_failure() {
            entry.failures += 1;
        }
    }

    pub fn get(&self, function: DosFunction) -> Option<&FunctionStats> {
        self.stats.get(&function)
    }

    pub fn total_calls(&self) -> u64 {
        self.stats.values().map(|s| s.count).sum()
    }

    pub fn total_failures(&self) -> u64 {
        self.stats.values().map(|s| s.failures).sum()
    }

    /// Unrecognized function codes with their call counts, by code
    pub fn unknown_codes(&self) -> impl Iterator<Item = (u8, u64)> {
        let mut codes: Vec<_> = self
            .stats
            .iter()
            .filter_map(|(function, stats)| match function {
                DosFunction::Unknown(code) => Some((*code, stats.count)),
                _ => None,
            })
            .collect();
        codes.sort_unstable();
        codes.into_iter()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Functions sorted by call count (descending), then by code
    fn sorted(&self) -> Vec<(&DosFunction, &FunctionStats)> {
        let mut sorted: Vec<_> = self.stats.iter().collect();
        sorted.sort_by(|a, b| b.1.count.cmp(&a.1.count).then(a.0.code().cmp(&b.0.code())));
        sorted
    }

    /// Write the summary table
    pub fn write_summary<W: Write>(&self, out: &mut W) -> io::Result<()> {
        if self.stats.is_empty() {
            return writeln!(out, "No service calls decoded.");
        }

        writeln!(out, "    calls    errors   ah function")?;
        writeln!(out, "--------- --------- ---- ----------------")?;
        for (function, stats) in self.sorted() {
            writeln!(
                out,
                "{:>9} {:>9} 0x{:02x} {}",
                stats.count,
                if stats.failures > 0 {
                    stats.failures.to_string()
                } else {
                    String::new()
                },
                function.code(),
                function.name()
            )?;
        }
        writeln!(out, "--------- --------- ---- ----------------")?;

        let failures = self.total_failures();
        writeln!(
            out,
            "{:>9} {:>9}      total",
            self.total_calls(),
            if failures > 0 {
                failures.to_string()
            } else {
                String::new()
            }
        )
    }

    /// Print the summary to stderr (matching strace behavior)
    pub fn print_summary(&self) {
        let stderr = io::stderr();
        let mut handle = stderr.lock();
        if let Err(e) = self.write_summary(&mut handle) {
            tracing::warn!(error = %e, "Failed to write syscall summary");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{SyscallCall, SyscallResult};
    use crate::record::Address;
    use crate::syscalls::DosError;

    fn event(call: SyscallCall, result: Option<SyscallResult>) -> SyscallEvent {
        SyscallEvent {
            index: 1,
            address: Address::default(),
            call,
            result,
        }
    }

    fn render(summary: &SyscallSummary) -> String {
        let mut out = Vec::new();
        summary.write_summary(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_summary_records_calls_and_failures() {
        let mut summary = SyscallSummary::new();
        summary.record(&event(
            SyscallCall::Close { handle: 5 },
            Some(SyscallResult::Success),
        ));
        summary.record(&event(
            SyscallCall::Close { handle: 6 },
            Some(SyscallResult::Failed(DosError::InvalidHandle)),
        ));
        summary.record(&event(SyscallCall::Exit { code: 0 }, None));

        let close = summary.get(DosFunction::Close).unwrap();
        assert_eq!(close.count, 2);
        assert_eq!(close.failures, 1);
        assert_eq!(summary.total_calls(), 3);
        assert_eq!(summary.total_failures(), 1);
        assert!(summary.get(DosFunction::Open).is_none());
    }

    #[test]
    fn test_missing_completion_is_not_a_failure() {
        let mut summary = SyscallSummary::new();
        summary.record(&event(SyscallCall::Close { handle: 5 }, None));
        assert_eq!(summary.total_failures(), 0);
    }

    #[test]
    fn test_empty_summary() {
        let summary = SyscallSummary::new();
        assert!(summary.is_empty());
        assert_eq!(render(&summary), "No service calls decoded.\n");
    }

    #[test]
    fn test_summary_table_sorted_by_count() {
        let mut summary = SyscallSummary::new();
        summary.record(&event(SyscallCall::Unknown { function: 0x09 }, None));
        for _ in 0..3 {
            summary.record(&event(SyscallCall::Close { handle: 1 }, None));
        }

        let text = render(&summary);
        let rows: Vec<&str> = text.lines().collect();
        assert!(rows[2].ends_with("0x3e CLOSE"));
        assert!(rows[3].ends_with("0x09 UNKNOWN"));
        assert!(rows[5].contains("total"));
        assert!(rows[5].trim_start().starts_with('4'));
    }
}
