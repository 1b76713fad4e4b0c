//! Built-in idioms of 16-bit real-mode compilers
//!
//! - `mul32`: 32-bit multiply helper called with four pushed words
//! - `op32`: a 32-bit constant loaded into `dx:ax` by two word moves
//! - `add32`: `add` of the low words followed by `adc` of the high words
//! - `clr`: `xor reg,reg`

use super::{Rule, RuleOptions, RuleSet, Substitution};
use crate::error::Result;
use crate::sequence::{PatternStep, SequenceMatch};
use std::collections::BTreeMap;

/// Option naming the entry address of the 32-bit multiply helper
///
/// The value is a literal `ssss:oooo` address matched after `call`; regex
/// syntax in it is not honoured.
pub const MUL32_ENTRY: &str = "mul32-entry";

/// Longest helper body between the call and its return
const MUL32_MAX_BODY: usize = 30;

const OP32_STEP: &str = r"(?P<op>mov|xor)  (?P<_reg>.x),(?P<_val>[a-fA-F0-9]{4})";

/// Rule set registered as `generic`
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericRules;

impl GenericRules {
    pub const NAME: &'static str = "generic";
}

impl RuleSet for GenericRules {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn rules(&self, options: &RuleOptions) -> Result<Vec<Rule>> {
        let mut rules = Vec::with_capacity(4);

        match options.get_str(MUL32_ENTRY) {
            Some(entry) => rules.push(mul32_rule(entry)?),
            None if options.contains(MUL32_ENTRY) => {
                tracing::warn!(option = MUL32_ENTRY, "Option is not a string, skipping mul32");
            }
            None => {
                tracing::debug!(option = MUL32_ENTRY, "Option not set, skipping mul32");
            }
        }

        rules.push(Rule::new(
            "op32",
            vec![PatternStep::new(OP32_STEP)?, PatternStep::new(OP32_STEP)?],
            produce_op32,
        ));
        rules.push(Rule::new(
            "add32",
            vec![
                PatternStep::new(r"add  (?P<lodst>[^,]+),(?P<losrc>.*)")?,
                PatternStep::new(r"adc  (?P<hidst>[^,]+),(?P<hisrc>.*)")?,
            ],
            produce_add32,
        ));
        rules.push(Rule::new(
            "clr",
            vec![PatternStep::new(r"xor  (?P<_dst>[^,]+),(?P<_src>.*)")?],
            produce_clr,
        ));

        Ok(rules)
    }
}

fn mul32_rule(entry: &str) -> Result<Rule> {
    Ok(Rule::new(
        "mul32",
        vec![
            PatternStep::new(r"push (?P<param1>.*)")?,
            PatternStep::new(r"push (?P<param2>.*)")?,
            PatternStep::new(r"push (?P<param3>.*)")?,
            PatternStep::new(r"push (?P<param4>.*)")?,
            PatternStep::new(&format!(r"call\s+{}", regex::escape(entry.trim())))?,
            PatternStep::with_options(r"ret.*", 0, MUL32_MAX_BODY, true)?,
            PatternStep::new(r"ret.*")?,
        ],
        produce_mul32,
    ))
}

fn produce_mul32(m: &SequenceMatch) -> Option<Substitution> {
    Some(Substitution::new(format!(
        "mul32 {}:{}, {}:{}",
        m.get("param1")?,
        m.get("param2")?,
        m.get("param3")?,
        m.get("param4")?
    )))
}

/// Two word loads form a 32-bit value only if they target exactly `ax` and
/// `dx`; `dx` holds the high word
fn produce_op32(m: &SequenceMatch) -> Option<Substitution> {
    let mut words: BTreeMap<&str, u32> = BTreeMap::new();
    for groupdict in m.groupdicts() {
        let reg = groupdict.get("_reg")?;
        let value = u32::from_str_radix(groupdict.get("_val")?, 16).ok()?;
        words.insert(reg.as_str(), value);
    }
    if words.len() != 2 {
        return None;
    }

    let low = *words.get("ax")?;
    let high = *words.get("dx")?;
    let value = (high << 16) | low;

    Some(
        Substitution::new(format!("{}32 dx:ax, {:x}", m.get("op")?, value))
            .with_description(value.to_string()),
    )
}

fn produce_add32(m: &SequenceMatch) -> Option<Substitution> {
    Some(Substitution::new(format!(
        "add32 {}:{}, {}:{}",
        m.get("hidst")?,
        m.get("lodst")?,
        m.get("hisrc")?,
        m.get("losrc")?
    )))
}

fn produce_clr(m: &SequenceMatch) -> Option<Substitution> {
    let groupdict = m.groupdicts().next()?;
    let dst = groupdict.get("_dst")?;
    let src = groupdict.get("_src")?;
    (dst == src).then(|| Substitution::new(format!("{} = 0", dst)))
}
