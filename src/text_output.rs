//! Human-readable trace listing for `dostrace print`
//!
//! One line per visible instruction: index, address, disassembly, operand
//! description and the general purpose registers. A register is only shown
//! when its value differs from the last printed one (unless `full_regs`).
//! Pseudo-records follow their anchor, marked with `+`. Index
//! discontinuities are printed as gap lines and reset the register delta.

use crate::error::{Result, TraceError};
use crate::record::{Address, Instruction, Pseudo, TraceItem};
use crate::store::TraceStore;
use clap::ValueEnum;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::LazyLock;

/// Registers shown in the listing
const LISTED_REGISTERS: [&str; 8] = ["eax", "ebx", "ecx", "edx", "esi", "edi", "ebp", "esp"];

/// Width of a suppressed register column
const REGISTER_COLUMN: usize = 9;

/// Memory operand description such as `ds:[0042]=1234`
static MEMORY_REFERENCE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(?P<segname>.s):\[(?P<addr>[a-fA-F0-9]+)\]=(?P<value>[a-fA-F0-9]+)$").ok()
});

/// How instruction addresses are displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum AddressMode {
    /// `ssss:oooo` as captured
    #[default]
    Actual,
    /// Linear address `0xllllll`
    Linear,
}

impl AddressMode {
    pub fn format(&self, address: Address) -> String {
        match self {
            AddressMode::Actual => address.to_string(),
            AddressMode::Linear => format!("0x{:06x}", address.linear()),
        }
    }
}

/// Printer configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct PrintOptions {
    pub address_mode: AddressMode,
    /// Also print instructions replaced by pseudo-records
    pub show_hidden: bool,
    /// Print every register on every line instead of the delta
    pub full_regs: bool,
}

#[derive(Debug, Default, Deserialize)]
struct LabelFile {
    #[serde(default)]
    tracepoints: BTreeMap<String, String>,
    #[serde(default)]
    addresses: BTreeMap<String, String>,
}

/// Names for trace indices and code addresses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels {
    tracepoints: BTreeMap<u64, String>,
    addresses: HashMap<u32, String>,
}

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a label file
    ///
    /// `tracepoints` maps instruction indices to names, `addresses` maps
    /// `ssss:oooo` or linear hex addresses to names.
    pub fn from_json_str(source_name: &str, text: &str) -> Result<Self> {
        let invalid = |message: String| TraceError::Labels {
            source_name: source_name.to_string(),
            message,
        };
        let file: LabelFile = serde_json::from_str(text).map_err(|e| invalid(e.to_string()))?;

        let mut labels = Self::new();
        for (key, name) in file.tracepoints {
            let index = key
                .trim()
                .parse()
                .map_err(|_| invalid(format!("tracepoint \"{}\" is not an index", key)))?;
            labels.tracepoints.insert(index, name);
        }
        for (key, name) in file.addresses {
            let linear = parse_address(&key)
                .ok_or_else(|| invalid(format!("\"{}\" is not an address", key)))?;
            labels.addresses.insert(linear, name);
        }
        Ok(labels)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&path.display().to_string(), &text)
    }

    pub fn insert_tracepoint(&mut self, index: u64, name: impl Into<String>) {
        self.tracepoints.insert(index, name.into());
    }

    pub fn insert_address(&mut self, address: Address, name: impl Into<String>) {
        self.addresses.insert(address.linear(), name.into());
    }

    /// Rewrite a memory operand description to `ds[42] = [name] = 1234`
    ///
    /// The segment comes from the register named in the description; the
    /// linear address is replaced by its label when one exists. Anything
    /// else is returned unchanged.
    pub fn resolve_description(&self, insn: &Instruction) -> String {
        let description = insn.description.to_lowercase();
        self.resolve_memory_reference(insn, &description)
            .unwrap_or(description)
    }

    fn resolve_memory_reference(&self, insn: &Instruction, description: &str) -> Option<String> {
        let captures = MEMORY_REFERENCE.as_ref()?.captures(description)?;
        let segname = &captures["segname"];
        let segment = match segname {
            "cs" => insn.address.segment,
            name => u16::try_from(insn.registers.get(name)?).ok()?,
        };
        let offset = u32::from_str_radix(&captures["addr"], 16).ok()?;
        let value = u32::from_str_radix(&captures["value"], 16).ok()?;

        let linear = Address::new(segment, offset).linear();
        let target = match self.addresses.get(&linear) {
            Some(name) => name.clone(),
            None => format!("0x{:x}", linear),
        };
        Some(format!("{}[{:x}] = [{}] = {:x}", segname, offset, target, value))
    }

    /// Heading printed before `insn`; tracepoints win over addresses
    fn heading(&self, insn: &Instruction) -> Option<String> {
        if let Some(name) = self.tracepoints.get(&insn.index) {
            Some(format!("[{}]:", name))
        } else {
            self.addresses
                .get(&insn.address.linear())
                .map(|name| format!("{}:", name))
        }
    }
}

/// `ssss:oooo` or a bare linear hex address
fn parse_address(text: &str) -> Option<u32> {
    let text = text.trim();
    match text.split_once(':') {
        Some((segment, offset)) => {
            let segment = u16::from_str_radix(segment, 16).ok()?;
            let offset = u32::from_str_radix(offset, 16).ok()?;
            Some(Address::new(segment, offset).linear())
        }
        None => u32::from_str_radix(text.trim_start_matches("0x"), 16).ok(),
    }
}

/// Writes a store as a text listing
#[derive(Debug)]
pub struct TracePrinter<W: Write> {
    out: W,
    options: PrintOptions,
    labels: Labels,
    last_regs: HashMap<&'static str, u32>,
}

impl<W: Write> TracePrinter<W> {
    pub fn new(out: W, options: PrintOptions) -> Self {
        Self {
            out,
            options,
            labels: Labels::new(),
            last_regs: HashMap::new(),
        }
    }

    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Print every record of `store`
    pub fn print_store(&mut self, store: &TraceStore) -> io::Result<()> {
        let mut expected: u64 = 0;
        for item in store {
            match item {
                TraceItem::Instruction(insn) => {
                    if insn.index > expected + 1 {
                        self.gap(insn.index - expected - 1)?;
                    }
                    expected = insn.index;
                    if let Some(heading) = self.labels.heading(insn) {
                        writeln!(self.out)?;
                        writeln!(self.out, "{}", heading)?;
                    }
                    if !insn.hidden || self.options.show_hidden {
                        self.instruction(insn)?;
                    }
                }
                TraceItem::Pseudo(pseudo) => self.pseudo(pseudo)?,
            }
        }
        self.out.flush()
    }

    fn gap(&mut self, length: u64) -> io::Result<()> {
        self.last_regs.clear();
        writeln!(self.out, "Gap of {} instructions", length)
    }

    fn instruction(&mut self, insn: &Instruction) -> io::Result<()> {
        let mut line = format!(
            "{:>6}   {}: {:<30} {:<30}",
            insn.index,
            self.options.address_mode.format(insn.address),
            insn.mnemonic.to_lowercase(),
            self.labels.resolve_description(insn)
        );
        for name in LISTED_REGISTERS {
            let value = insn.registers.get(name).unwrap_or_default();
            line.push(' ');
            if !self.options.full_regs && self.last_regs.get(name) == Some(&value) {
                line.push_str(&" ".repeat(REGISTER_COLUMN));
            } else {
                self.last_regs.insert(name, value);
                line.push_str(&format!("{:>6x} {}", value, &name[1..]));
            }
        }
        writeln!(self.out, "{}", line.trim_end())
    }

    fn pseudo(&mut self, pseudo: &Pseudo) -> io::Result<()> {
        let line = format!(
            "{:>6} + {}: {:<40} {:<30}",
            pseudo.first_index,
            self.options.address_mode.format(pseudo.first_address),
            pseudo.text,
            pseudo.description
        );
        writeln!(self.out, "{}", line.trim_end())
    }
}
