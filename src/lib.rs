//! dostrace - DOS virtual machine trace analysis
//!
//! This library loads instruction traces captured from a DOS guest, folds
//! recognized multi-instruction idioms into pseudo-instructions, and decodes
//! the guest's INT 21h service calls together with their results.
//!
//! ```
//! use dostrace::substitution::{RuleOptions, RuleRegistry, SubstitutionEngine};
//! use dostrace::TraceStore;
//!
//! let json = r#"[{"ips": 4096, "ipo": 0, "mnemonic": "xor  ax,ax", "description": "",
//!     "opcode": "31c0", "eax": 0, "ebx": 0, "ecx": 0, "edx": 0, "esi": 0, "edi": 0,
//!     "ebp": 0, "esp": 0, "ds": 0, "es": 0, "fs": 0, "gs": 0, "ss": 0,
//!     "cf": 0, "zf": 1, "sf": 0, "of": 0, "af": 0, "pf": 1, "if": 1, "tf": 0, "vm": 0}]"#;
//! let mut store = TraceStore::from_json(json).unwrap();
//!
//! let engine = SubstitutionEngine::new(RuleRegistry::with_builtin(), RuleOptions::new());
//! let report = engine.run(&mut store, &["generic"]).unwrap();
//! assert_eq!(report.count("clr"), 1);
//! assert_eq!(store[0].pseudo.as_ref().unwrap().text, "ax = 0");
//! ```

pub mod cli;
pub mod decoder;
pub mod error;
pub mod filter;
pub mod persist;
pub mod record;
pub mod sequence;
pub mod stats;
pub mod store;
pub mod substitution;
pub mod syscalls;
pub mod text_output;

pub use error::{Result, TraceError};
pub use record::{Address, Instruction, Pseudo, TraceItem, TraceRecord};
pub use store::TraceStore;
