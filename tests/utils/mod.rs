// Integration Test Utilities
//
// Helpers that write JSON trace files in the shape produced by the log
// converter (flags as 0/1, no instruction index).

#![allow(dead_code)]

use serde_json::{json, Value};
use std::path::PathBuf;
use tempfile::TempDir;

/// Data segment used by all service call fixtures
pub const DS: u32 = 0x1234;

/// One instruction entry; registers not listed are zero
pub fn insn(ipo: u32, mnemonic: &str, opcode: &str, regs: &[(&str, u32)], cf: bool) -> Value {
    let mut entry = json!({
        "ips": 0x1000,
        "ipo": ipo,
        "mnemonic": mnemonic,
        "description": "",
        "opcode": opcode,
        "eax": 0, "ebx": 0, "ecx": 0, "edx": 0,
        "esi": 0, "edi": 0, "ebp": 0, "esp": 0xfffe,
        "ds": DS, "es": 0, "fs": 0, "gs": 0, "ss": 0x2000,
        "cf": u8::from(cf), "zf": 0, "sf": 0, "of": 0, "af": 0, "pf": 0,
        "if": 1, "tf": 0, "vm": 0,
    });
    for (name, value) in regs {
        entry[*name] = json!(value);
    }
    entry
}

pub fn nop(ipo: u32) -> Value {
    insn(ipo, "nop", "90", &[], false)
}

pub fn gap(length: u64) -> Value {
    json!({ "gap": length })
}

/// OPEN handle 7, READ 80 of 100 bytes, CLOSE (indices 1..=9)
pub fn open_read_close() -> Vec<Value> {
    vec![
        insn(0x00, "int  21", "cd21", &[("eax", 0x3d00), ("edx", 0x0010)], false),
        insn(0x40, "iret", "cf", &[], false),
        insn(0x02, "jc   0020", "7203", &[("eax", 7)], false),
        insn(
            0x05,
            "int  21",
            "cd21",
            &[("eax", 0x3f00), ("ebx", 7), ("ecx", 100), ("edx", 0x0200)],
            false,
        ),
        insn(0x40, "iret", "cf", &[], false),
        insn(0x07, "jc   0020", "7203", &[("eax", 80)], false),
        insn(0x0a, "int  21", "cd21", &[("eax", 0x3e00), ("ebx", 7)], false),
        insn(0x40, "iret", "cf", &[], false),
        insn(0x0c, "jc   0020", "7203", &[], false),
    ]
}

/// Four pushes, a call to the multiply helper, its body and return
pub fn mul32_call() -> Vec<Value> {
    vec![
        insn(0x00, "push dx", "52", &[], false),
        insn(0x01, "push ax", "50", &[], false),
        insn(0x02, "push cx", "51", &[], false),
        insn(0x03, "push bx", "53", &[], false),
        insn(0x04, "call 2A74:363C", "9a3c36742a", &[], false),
        insn(0x09, "mov  ax,[bp+06]", "8b4606", &[], false),
        insn(0x0c, "mul  word [bp+0A]", "f7660a", &[], false),
        insn(0x0f, "retf 0008", "ca0800", &[], false),
        insn(0x12, "mov  [bp-04],ax", "8946fc", &[], false),
    ]
}

/// Write `entries` as a trace file in `dir`
pub fn write_trace(dir: &TempDir, name: &str, entries: &[Value]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, Value::Array(entries.to_vec()).to_string()).unwrap();
    path
}
