// Multi-step pattern matching over instruction traces
//
// A PatternStep matches one record field (normally the disassembly text)
// against a regex with named captures, optionally repeated or negated. A
// SequenceMatcher chains steps contiguously and only reports runs whose
// captures agree: a name bound in more than one record must carry the same
// text everywhere, unless the name starts with "_".
//
// Matching is greedy without backtracking across steps. If a step's maximal
// run leaves nothing for the next step, the attempt at that start offset
// fails; no shorter run is retried.

mod matcher;
mod step;

pub use matcher::{find_all, Matches, SequenceMatch, SequenceMatcher};
pub use step::{Captures, MatchField, PatternStep, SCRATCH_PREFIX};
