//! JSON trace file format
//!
//! A trace file is a compact JSON array. Each entry is either a gap
//! (`{"gap": N}`, older files also carry `"type": "gap"`) or an instruction
//! object with the address pair (`ips`/`ipo`), the disassembly text, the opcode
//! and the register/flag snapshot. The positional instruction number is never
//! written; it is re-derived from the entry order and the gaps on load.
//!
//! Substitution output is persisted as `"type": "hidden"` on replaced
//! instructions and as a `pseudo` sub-object on the anchoring instruction.

use crate::error::{Result, TraceError};
use crate::record::{Address, Flags, Gap, Instruction, Pseudo, Registers, TraceRecord};
use crate::store::TraceStore;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::time::Instant;

const TYPE_GAP: &str = "gap";
const TYPE_HIDDEN: &str = "hidden";
const TYPE_PSEUDO: &str = "pseudo";

#[derive(Debug, Serialize, Deserialize)]
struct GapEntry {
    #[serde(rename = "type", default, skip_serializing)]
    kind: Option<String>,
    gap: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PseudoEntry {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    i: u64,
    ips: u16,
    ipo: u32,
    iend: u64,
    ipsend: u16,
    ipoend: u32,
    pseudo: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct InstructionEntry {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    /// Accepted for compatibility, never written
    #[serde(default, skip_serializing)]
    i: Option<u64>,
    ips: u16,
    ipo: u32,
    mnemonic: String,
    description: String,
    opcode: String,
    eax: u32,
    ebx: u32,
    ecx: u32,
    edx: u32,
    esi: u32,
    edi: u32,
    ebp: u32,
    esp: u32,
    ds: u32,
    es: u32,
    fs: u32,
    gs: u32,
    ss: u32,
    #[serde(deserialize_with = "flag")]
    cf: bool,
    #[serde(deserialize_with = "flag")]
    zf: bool,
    #[serde(deserialize_with = "flag")]
    sf: bool,
    #[serde(deserialize_with = "flag")]
    of: bool,
    #[serde(deserialize_with = "flag")]
    af: bool,
    #[serde(deserialize_with = "flag")]
    pf: bool,
    #[serde(rename = "if", deserialize_with = "flag")]
    interrupt: bool,
    #[serde(deserialize_with = "flag")]
    tf: bool,
    #[serde(deserialize_with = "flag")]
    vm: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pseudo: Option<PseudoEntry>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Entry {
    Gap(GapEntry),
    Instruction(Box<InstructionEntry>),
}

/// Flags are dumped as `0`/`1` by the log converter and as booleans by us
fn flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlagValue {
        Bool(bool),
        Int(u64),
    }

    match FlagValue::deserialize(deserializer)? {
        FlagValue::Bool(value) => Ok(value),
        FlagValue::Int(0) => Ok(false),
        FlagValue::Int(1) => Ok(true),
        FlagValue::Int(other) => Err(D::Error::custom(format!(
            "flag value {} is neither 0 nor 1",
            other
        ))),
    }
}

impl From<&Pseudo> for PseudoEntry {
    fn from(pseudo: &Pseudo) -> Self {
        Self {
            kind: Some(TYPE_PSEUDO.to_string()),
            i: pseudo.first_index,
            ips: pseudo.first_address.segment,
            ipo: pseudo.first_address.offset,
            iend: pseudo.last_index,
            ipsend: pseudo.last_address.segment,
            ipoend: pseudo.last_address.offset,
            pseudo: pseudo.text.clone(),
            description: pseudo.description.clone(),
        }
    }
}

impl From<PseudoEntry> for Pseudo {
    fn from(entry: PseudoEntry) -> Self {
        Self {
            first_index: entry.i,
            last_index: entry.iend,
            first_address: Address::new(entry.ips, entry.ipo),
            last_address: Address::new(entry.ipsend, entry.ipoend),
            text: entry.pseudo,
            description: entry.description,
        }
    }
}

impl From<&Instruction> for InstructionEntry {
    fn from(insn: &Instruction) -> Self {
        let r = &insn.registers;
        let f = &insn.flags;
        Self {
            kind: insn.hidden.then(|| TYPE_HIDDEN.to_string()),
            i: None,
            ips: insn.address.segment,
            ipo: insn.address.offset,
            mnemonic: insn.mnemonic.clone(),
            description: insn.description.clone(),
            opcode: insn.opcode.clone(),
            eax: r.eax,
            ebx: r.ebx,
            ecx: r.ecx,
            edx: r.edx,
            esi: r.esi,
            edi: r.edi,
            ebp: r.ebp,
            esp: r.esp,
            ds: r.ds,
            es: r.es,
            fs: r.fs,
            gs: r.gs,
            ss: r.ss,
            cf: f.cf,
            zf: f.zf,
            sf: f.sf,
            of: f.of,
            af: f.af,
            pf: f.pf,
            interrupt: f.interrupt,
            tf: f.tf,
            vm: f.vm,
            pseudo: insn.pseudo.as_ref().map(PseudoEntry::from),
            extra: insn.extra.clone(),
        }
    }
}

impl InstructionEntry {
    fn into_instruction(self, position: usize) -> Result<Instruction> {
        let hidden = match self.kind.as_deref() {
            None => false,
            Some(TYPE_HIDDEN) => true,
            Some(TYPE_PSEUDO) => {
                return Err(TraceError::format(
                    position,
                    "pseudo-record without anchoring instruction",
                ))
            }
            Some(other) => {
                return Err(TraceError::format(
                    position,
                    format!("unknown record type \"{}\"", other),
                ))
            }
        };

        Ok(Instruction {
            index: 0,
            address: Address::new(self.ips, self.ipo),
            mnemonic: self.mnemonic,
            description: self.description,
            opcode: self.opcode,
            registers: Registers {
                eax: self.eax,
                ebx: self.ebx,
                ecx: self.ecx,
                edx: self.edx,
                esi: self.esi,
                edi: self.edi,
                ebp: self.ebp,
                esp: self.esp,
                ds: self.ds,
                es: self.es,
                fs: self.fs,
                gs: self.gs,
                ss: self.ss,
            },
            flags: Flags {
                cf: self.cf,
                zf: self.zf,
                sf: self.sf,
                of: self.of,
                af: self.af,
                pf: self.pf,
                interrupt: self.interrupt,
                tf: self.tf,
                vm: self.vm,
            },
            hidden,
            pseudo: self.pseudo.map(Pseudo::from),
            extra: self.extra,
        })
    }
}

fn is_gap_entry(value: &Value) -> bool {
    value.get("gap").is_some() || value.get("type").and_then(Value::as_str) == Some(TYPE_GAP)
}

fn parse_entry(position: usize, value: Value) -> Result<TraceRecord> {
    if !value.is_object() {
        return Err(TraceError::format(position, "expected a JSON object"));
    }

    if is_gap_entry(&value) {
        let entry: GapEntry = serde_json::from_value(value)
            .map_err(|e| TraceError::format(position, e.to_string()))?;
        return Ok(TraceRecord::Gap(Gap { length: entry.gap }));
    }

    let entry: InstructionEntry =
        serde_json::from_value(value).map_err(|e| TraceError::format(position, e.to_string()))?;
    Ok(entry.into_instruction(position)?.into())
}

/// Parse the records of a JSON trace document without folding gaps
pub fn parse_records(text: &str) -> Result<Vec<TraceRecord>> {
    let document: Value =
        serde_json::from_str(text).map_err(|e| TraceError::format(0, e.to_string()))?;
    let Value::Array(entries) = document else {
        return Err(TraceError::format(0, "expected a JSON array of trace entries"));
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(position, value)| parse_entry(position, value))
        .collect()
}

fn encode_records(records: &[TraceRecord]) -> Vec<Entry> {
    records
        .iter()
        .filter_map(|record| match record {
            TraceRecord::Gap(gap) => Some(Entry::Gap(GapEntry {
                kind: None,
                gap: gap.length,
            })),
            TraceRecord::Instruction(insn) => {
                Some(Entry::Instruction(Box::new(InstructionEntry::from(&**insn))))
            }
            // Pseudo-records travel inside their anchor
            TraceRecord::Pseudo(_) => None,
        })
        .collect()
}

impl TraceStore {
    /// Load a store from a JSON trace document
    pub fn from_json(text: &str) -> Result<Self> {
        Self::load(parse_records(text)?)
    }

    /// Load a store from a reader yielding a JSON trace document
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Self::from_json(&text)
    }

    /// Load a store from a JSON trace file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let t0 = Instant::now();
        let file = File::open(path.as_ref())?;
        let store = Self::from_reader(BufReader::new(file))?;
        tracing::debug!(
            path = %path.as_ref().display(),
            instructions = store.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Read trace file"
        );
        Ok(store)
    }

    /// Serialize to a compact JSON trace document
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&encode_records(&self.to_records()))?)
    }

    /// Serialize to a writer
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer(writer, &encode_records(&self.to_records()))?;
        Ok(())
    }

    /// Serialize to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
