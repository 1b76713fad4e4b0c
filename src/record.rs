//! Trace record model
//!
//! One [`Instruction`] per retired instruction of the DOS guest. Gaps and
//! pseudo-records complete the [`TraceRecord`] variant set; gaps only exist at
//! the ingestion/serialization boundary, pseudo-records only attached to the
//! instruction that anchors them.

use std::collections::BTreeMap;
use std::fmt;

/// Real-mode address as a segment:offset pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address {
    pub segment: u16,
    pub offset: u32,
}

impl Address {
    pub fn new(segment: u16, offset: u32) -> Self {
        Self { segment, offset }
    }

    /// Linear (physical) address: `segment * 0x10 + offset`
    pub fn linear(&self) -> u32 {
        (u32::from(self.segment) << 4).wrapping_add(self.offset)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.segment, self.offset)
    }
}

/// Names of the general purpose and segment registers, in dump order
pub const REGISTER_NAMES: [&str; 13] = [
    "eax", "ebx", "ecx", "edx", "esi", "edi", "ebp", "esp", "ds", "es", "fs", "gs", "ss",
];

/// Names of the captured flags, in dump order
pub const FLAG_NAMES: [&str; 9] = ["cf", "zf", "sf", "of", "af", "pf", "if", "tf", "vm"];

/// Register snapshot of one instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Registers {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
    pub esi: u32,
    pub edi: u32,
    pub ebp: u32,
    pub esp: u32,
    pub ds: u32,
    pub es: u32,
    pub fs: u32,
    pub gs: u32,
    pub ss: u32,
}

impl Registers {
    /// Look up a register by its lowercase name
    pub fn get(&self, name: &str) -> Option<u32> {
        let value = match name {
            "eax" => self.eax,
            "ebx" => self.ebx,
            "ecx" => self.ecx,
            "edx" => self.edx,
            "esi" => self.esi,
            "edi" => self.edi,
            "ebp" => self.ebp,
            "esp" => self.esp,
            "ds" => self.ds,
            "es" => self.es,
            "fs" => self.fs,
            "gs" => self.gs,
            "ss" => self.ss,
            _ => return None,
        };
        Some(value)
    }

    /// Set a register by name; returns false for an unknown name
    pub fn set(&mut self, name: &str, value: u32) -> bool {
        let slot = match name {
            "eax" => &mut self.eax,
            "ebx" => &mut self.ebx,
            "ecx" => &mut self.ecx,
            "edx" => &mut self.edx,
            "esi" => &mut self.esi,
            "edi" => &mut self.edi,
            "ebp" => &mut self.ebp,
            "esp" => &mut self.esp,
            "ds" => &mut self.ds,
            "es" => &mut self.es,
            "fs" => &mut self.fs,
            "gs" => &mut self.gs,
            "ss" => &mut self.ss,
            _ => return false,
        };
        *slot = value;
        true
    }

    /// AH: high byte of the accumulator
    pub fn ah(&self) -> u8 {
        ((self.eax >> 8) & 0xff) as u8
    }

    /// AL: low byte of the accumulator
    pub fn al(&self) -> u8 {
        (self.eax & 0xff) as u8
    }

    /// AX: low word of the accumulator
    pub fn ax(&self) -> u16 {
        (self.eax & 0xffff) as u16
    }

    /// All registers as `(name, value)` pairs in dump order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u32)> + '_ {
        REGISTER_NAMES
            .iter()
            .filter_map(move |name| self.get(name).map(|value| (*name, value)))
    }
}

/// Flag snapshot of one instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    pub cf: bool,
    pub zf: bool,
    pub sf: bool,
    pub of: bool,
    pub af: bool,
    pub pf: bool,
    pub interrupt: bool,
    pub tf: bool,
    pub vm: bool,
}

impl Flags {
    /// Look up a flag by its lowercase name (`if` for the interrupt flag)
    pub fn get(&self, name: &str) -> Option<bool> {
        match name {
            "cf" => Some(self.cf),
            "zf" => Some(self.zf),
            "sf" => Some(self.sf),
            "of" => Some(self.of),
            "af" => Some(self.af),
            "pf" => Some(self.pf),
            "if" => Some(self.interrupt),
            "tf" => Some(self.tf),
            "vm" => Some(self.vm),
            _ => None,
        }
    }

    /// Set a flag by name; returns false for an unknown name
    pub fn set(&mut self, name: &str, value: bool) -> bool {
        let slot = match name {
            "cf" => &mut self.cf,
            "zf" => &mut self.zf,
            "sf" => &mut self.sf,
            "of" => &mut self.of,
            "af" => &mut self.af,
            "pf" => &mut self.pf,
            "if" => &mut self.interrupt,
            "tf" => &mut self.tf,
            "vm" => &mut self.vm,
            _ => return false,
        };
        *slot = value;
        true
    }

    /// All flags as `(name, value)` pairs in dump order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, bool)> + '_ {
        FLAG_NAMES
            .iter()
            .filter_map(move |name| self.get(name).map(|value| (*name, value)))
    }
}

/// Synthesized instruction standing in for a recognized idiom
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pseudo {
    pub first_index: u64,
    pub last_index: u64,
    pub first_address: Address,
    pub last_address: Address,
    pub text: String,
    pub description: String,
}

/// Run of instruction indices that were not captured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    pub length: u64,
}

/// One retired instruction
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// 1-based instruction number; derived on load, never persisted
    pub index: u64,
    pub address: Address,
    pub mnemonic: String,
    pub description: String,
    /// Lowercase hex opcode bytes without separators (e.g. `cd21`)
    pub opcode: String,
    pub registers: Registers,
    pub flags: Flags,
    /// Replaced by a pseudo-record; kept for `--show-hidden` replay
    pub hidden: bool,
    pub pseudo: Option<Pseudo>,
    /// Additional numeric fields of the dump (`flg`, `cr0`), kept verbatim
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Instruction {
    /// Instruction with zeroed registers and flags; `index` is assigned on load
    pub fn new(address: Address, mnemonic: impl Into<String>) -> Self {
        Self {
            index: 0,
            address,
            mnemonic: mnemonic.into(),
            description: String::new(),
            opcode: String::new(),
            registers: Registers::default(),
            flags: Flags::default(),
            hidden: false,
            pseudo: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_opcode(mut self, opcode: impl Into<String>) -> Self {
        self.opcode = opcode.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_registers(mut self, registers: Registers) -> Self {
        self.registers = registers;
        self
    }

    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    /// Decoded opcode bytes, `None` if the opcode is not valid hex
    pub fn opcode_bytes(&self) -> Option<Vec<u8>> {
        hex::decode(&self.opcode).ok()
    }

    /// True if the opcode is `cd <vector>` (software interrupt)
    pub fn is_interrupt(&self, vector: u8) -> bool {
        matches!(self.opcode_bytes().as_deref(), Some([0xcd, v]) if *v == vector)
    }

    /// True if the opcode is `cf` (return from interrupt)
    pub fn is_iret(&self) -> bool {
        matches!(self.opcode_bytes().as_deref(), Some([0xcf]))
    }
}

/// A record as produced by ingestion or persisted on disk
#[derive(Debug, Clone, PartialEq)]
pub enum TraceRecord {
    Instruction(Box<Instruction>),
    Gap(Gap),
    Pseudo(Pseudo),
}

impl From<Instruction> for TraceRecord {
    fn from(insn: Instruction) -> Self {
        Self::Instruction(Box::new(insn))
    }
}

impl From<Gap> for TraceRecord {
    fn from(gap: Gap) -> Self {
        Self::Gap(gap)
    }
}

/// Item yielded when iterating a store: instructions interleaved with the
/// pseudo-records attached to them
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TraceItem<'a> {
    Instruction(&'a Instruction),
    Pseudo(&'a Pseudo),
}

impl TraceItem<'_> {
    /// Instruction index of the item (first index for pseudo-records)
    pub fn index(&self) -> u64 {
        match self {
            TraceItem::Instruction(insn) => insn.index,
            TraceItem::Pseudo(pseudo) => pseudo.first_index,
        }
    }
}
