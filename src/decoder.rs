//! DOS service call decoder
//!
//! Walks a [`TraceStore`] in storage order and turns every `int <vector>`
//! instruction into a [`SyscallEvent`]. The call's result is read from the
//! completion record: the instruction right after the first `iret` found
//! within [`DecoderConfig::lookahead`] records of the trigger. Handle file
//! positions are tracked from OPEN onwards so READ/WRITE can report offsets.

use crate::record::{Address, Instruction, Registers};
use crate::stats::SyscallSummary;
use crate::store::TraceStore;
use crate::syscalls::{AccessMode, DosError, DosFunction, FileAttribute};
use std::collections::HashMap;
use std::fmt;

/// Default interrupt vector of DOS services
pub const DOS_VECTOR: u8 = 0x21;

/// Default completion search window, in records after the trigger
pub const DEFAULT_LOOKAHEAD: usize = 10;

/// Decoder knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Interrupt vector that triggers decoding
    pub vector: u8,
    /// Records scanned after the trigger when looking for `iret`
    pub lookahead: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            vector: DOS_VECTOR,
            lookahead: DEFAULT_LOOKAHEAD,
        }
    }
}

/// Parameters of one decoded call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallCall {
    Create {
        filename: Address,
        attribute: FileAttribute,
    },
    Open {
        filename: Address,
        mode: AccessMode,
    },
    Close {
        handle: u16,
    },
    Read {
        handle: u16,
        length: u16,
        buffer: Address,
        /// Handle position before the call, if tracked
        offset: Option<u64>,
    },
    Write {
        handle: u16,
        length: u16,
        buffer: Address,
        offset: Option<u64>,
    },
    Unlink {
        filename: Address,
    },
    Exit {
        code: u8,
    },
    Unknown {
        function: u8,
    },
}

impl SyscallCall {
    pub fn function(&self) -> DosFunction {
        match self {
            SyscallCall::Create { .. } => DosFunction::Create,
            SyscallCall::Open { .. } => DosFunction::Open,
            SyscallCall::Close { .. } => DosFunction::Close,
            SyscallCall::Read { .. } => DosFunction::Read,
            SyscallCall::Write { .. } => DosFunction::Write,
            SyscallCall::Unlink { .. } => DosFunction::Unlink,
            SyscallCall::Exit { .. } => DosFunction::Exit,
            SyscallCall::Unknown { function } => DosFunction::Unknown(*function),
        }
    }
}

/// Result extracted from the completion record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallResult {
    Handle(u16),
    Success,
    Transferred {
        length: u16,
        /// Handle position after the call, if tracked
        new_offset: Option<u64>,
    },
    Failed(DosError),
}

impl SyscallResult {
    pub fn is_failure(&self) -> bool {
        matches!(self, SyscallResult::Failed(_))
    }
}

/// One decoded service call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyscallEvent {
    /// Instruction index of the trigger
    pub index: u64,
    pub address: Address,
    pub call: SyscallCall,
    /// `None` when no completion was found or the call has no result
    pub result: Option<SyscallResult>,
}

impl SyscallEvent {
    pub fn function(&self) -> DosFunction {
        self.call.function()
    }

    pub fn is_failure(&self) -> bool {
        self.result.is_some_and(|r| r.is_failure())
    }
}

impl fmt::Display for SyscallCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyscallCall::Create {
                filename,
                attribute,
            } => write!(f, "CREATE filename in {}, {}", filename, attribute),
            SyscallCall::Open { filename, mode } => {
                write!(f, "OPEN filename in {}, mode {}", filename, mode)
            }
            SyscallCall::Close { handle } => write!(f, "CLOSE file {}", handle),
            SyscallCall::Read {
                handle,
                length,
                buffer,
                offset,
            } => {
                write!(f, "READ file {}, length {}, store in {}", handle, length, buffer)?;
                write_offset(f, *offset)
            }
            SyscallCall::Write {
                handle,
                length,
                buffer,
                offset,
            } => {
                write!(f, "WRITE file {}, length {}, load from {}", handle, length, buffer)?;
                write_offset(f, *offset)
            }
            SyscallCall::Unlink { filename } => write!(f, "UNLINK filename in {}", filename),
            SyscallCall::Exit { code } => write!(f, "EXIT code {}", code),
            SyscallCall::Unknown { function } => {
                write!(f, "Unknown syscall AH = 0x{:02x}", function)
            }
        }
    }
}

fn write_offset(f: &mut fmt::Formatter<'_>, offset: Option<u64>) -> fmt::Result {
    match offset {
        Some(offset) => write!(f, ", offset {}", offset),
        None => f.write_str(", offset unknown"),
    }
}

impl fmt::Display for SyscallResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyscallResult::Handle(handle) => write!(f, "handle {}", handle),
            SyscallResult::Success => f.write_str("ok"),
            SyscallResult::Transferred {
                length,
                new_offset: Some(offset),
            } => write!(f, "{} bytes, new offset {}", length, offset),
            SyscallResult::Transferred {
                length,
                new_offset: None,
            } => write!(f, "{} bytes", length),
            SyscallResult::Failed(err) => {
                write!(f, "failure: {} (0x{:02x})", err, err.code())
            }
        }
    }
}

impl fmt::Display for SyscallEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.index, self.call)?;
        if let Some(result) = &self.result {
            write!(f, " -> {}", result)?;
        }
        Ok(())
    }
}

/// `ds:dx` pointer of a call
fn ds_dx(regs: &Registers) -> Address {
    Address::new((regs.ds & 0xffff) as u16, regs.edx & 0xffff)
}

fn word(value: u32) -> u16 {
    (value & 0xffff) as u16
}

/// Decodes service calls and owns the handle position table
#[derive(Debug, Clone, Default)]
pub struct SyscallDecoder {
    config: DecoderConfig,
    positions: HashMap<u16, u64>,
    summary: SyscallSummary,
}

impl SyscallDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            config,
            positions: HashMap::new(),
            summary: SyscallSummary::new(),
        }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Tracked file position of `handle`
    pub fn position(&self, handle: u16) -> Option<u64> {
        self.positions.get(&handle).copied()
    }

    /// Number of handles with a tracked position
    pub fn tracked_handles(&self) -> usize {
        self.positions.len()
    }

    pub fn summary(&self) -> &SyscallSummary {
        &self.summary
    }

    /// Decode every trigger of `store` in storage order
    pub fn decode(&mut self, store: &TraceStore) -> Vec<SyscallEvent> {
        let records = store.as_slice();
        let events: Vec<_> = (0..records.len())
            .filter_map(|position| self.decode_at(records, position))
            .collect();
        tracing::debug!(
            records = records.len(),
            events = events.len(),
            tracked_handles = self.positions.len(),
            "Decoded service calls"
        );
        events
    }

    /// Decode the record at `position`; `None` if it is not a trigger
    pub fn decode_at(&mut self, records: &[Instruction], position: usize) -> Option<SyscallEvent> {
        let trigger = records.get(position)?;
        if !trigger.is_interrupt(self.config.vector) {
            return None;
        }

        let regs = &trigger.registers;
        let function = DosFunction::from_code(regs.ah());
        let done = if function.reports_result() {
            self.completion(records, position)
        } else {
            None
        };
        let (call, result) = match function {
            DosFunction::Create => {
                let call = SyscallCall::Create {
                    filename: ds_dx(regs),
                    attribute: FileAttribute::from_cx(word(regs.ecx)),
                };
                let result = done.map(|done| handle_result(done, |_| {}));
                (call, result)
            }
            DosFunction::Open => {
                let call = SyscallCall::Open {
                    filename: ds_dx(regs),
                    mode: AccessMode::from_al(regs.al()),
                };
                let result = done.map(|done| {
                    handle_result(done, |handle| {
                        self.positions.insert(handle, 0);
                    })
                });
                (call, result)
            }
            DosFunction::Close => {
                let handle = word(regs.ebx);
                let result = done.map(|done| match failure(done) {
                    Some(err) => SyscallResult::Failed(err),
                    None => SyscallResult::Success,
                });
                // The handle is unusable after CLOSE whatever the outcome
                self.positions.remove(&handle);
                (SyscallCall::Close { handle }, result)
            }
            DosFunction::Read | DosFunction::Write => {
                let handle = word(regs.ebx);
                let length = word(regs.ecx);
                let buffer = ds_dx(regs);
                let offset = self.position(handle);
                let call = if function == DosFunction::Read {
                    SyscallCall::Read {
                        handle,
                        length,
                        buffer,
                        offset,
                    }
                } else {
                    SyscallCall::Write {
                        handle,
                        length,
                        buffer,
                        offset,
                    }
                };
                let result = done.map(|done| self.transfer_result(handle, done));
                (call, result)
            }
            DosFunction::Unlink => (
                SyscallCall::Unlink {
                    filename: ds_dx(regs),
                },
                None,
            ),
            DosFunction::Exit => (SyscallCall::Exit { code: regs.al() }, None),
            DosFunction::Unknown(code) => {
                tracing::debug!(index = trigger.index, function = code, "Unknown service call");
                (SyscallCall::Unknown { function: code }, None)
            }
        };

        let event = SyscallEvent {
            index: trigger.index,
            address: trigger.address,
            call,
            result,
        };
        self.summary.record(&event);
        Some(event)
    }

    /// Record following the first `iret` within the lookahead window
    fn completion<'a>(&self, records: &'a [Instruction], trigger: usize) -> Option<&'a Instruction> {
        let window_end = records
            .len()
            .min(trigger.saturating_add(1).saturating_add(self.config.lookahead));
        let found = records
            .get(trigger + 1..window_end)?
            .iter()
            .position(Instruction::is_iret)
            .and_then(|offset| records.get(trigger + 1 + offset + 1));
        if found.is_none() {
            tracing::debug!(
                index = records[trigger].index,
                lookahead = self.config.lookahead,
                "No completion found for service call"
            );
        }
        found
    }

    fn transfer_result(&mut self, handle: u16, done: &Instruction) -> SyscallResult {
        if let Some(err) = failure(done) {
            return SyscallResult::Failed(err);
        }
        let length = done.registers.ax();
        let new_offset = self.positions.get_mut(&handle).map(|position| {
            *position += u64::from(length);
            *position
        });
        if new_offset.is_none() {
            tracing::trace!(handle, "Transfer on untracked handle");
        }
        SyscallResult::Transferred { length, new_offset }
    }
}

/// Decoded error if the completion has CF set
fn failure(done: &Instruction) -> Option<DosError> {
    done.flags
        .cf
        .then(|| DosError::from_code(done.registers.ax()))
}

/// Result of a handle-returning call; `on_handle` runs on success
fn handle_result<F: FnOnce(u16)>(done: &Instruction, on_handle: F) -> SyscallResult {
    match failure(done) {
        Some(err) => SyscallResult::Failed(err),
        None => {
            let handle = done.registers.ax();
            on_handle(handle);
            SyscallResult::Handle(handle)
        }
    }
}
