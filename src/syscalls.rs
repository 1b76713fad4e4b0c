//! DOS INT 21h function codes and their argument/result enums
//!
//! Function codes are the AH value at the time of the call. Only the file
//! services needed for I/O reconstruction are decoded; everything else maps
//! to [`DosFunction::Unknown`].

use std::fmt;

/// INT 21h function selected by AH
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DosFunction {
    Create,
    Open,
    Close,
    Read,
    Write,
    Unlink,
    Exit,
    Unknown(u8),
}

impl DosFunction {
    /// Resolve a function code (AH)
    pub fn from_code(ah: u8) -> Self {
        match ah {
            0x3c => DosFunction::Create,
            0x3d => DosFunction::Open,
            0x3e => DosFunction::Close,
            0x3f => DosFunction::Read,
            0x40 => DosFunction::Write,
            0x41 => DosFunction::Unlink,
            0x4c => DosFunction::Exit,
            other => DosFunction::Unknown(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            DosFunction::Create => 0x3c,
            DosFunction::Open => 0x3d,
            DosFunction::Close => 0x3e,
            DosFunction::Read => 0x3f,
            DosFunction::Write => 0x40,
            DosFunction::Unlink => 0x41,
            DosFunction::Exit => 0x4c,
            DosFunction::Unknown(code) => *code,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DosFunction::Create => "CREATE",
            DosFunction::Open => "OPEN",
            DosFunction::Close => "CLOSE",
            DosFunction::Read => "READ",
            DosFunction::Write => "WRITE",
            DosFunction::Unlink => "UNLINK",
            DosFunction::Exit => "EXIT",
            DosFunction::Unknown(_) => "UNKNOWN",
        }
    }

    /// Whether a result is decoded from the completion state.
    /// EXIT never returns, UNLINK is reported by its parameters only.
    pub fn reports_result(&self) -> bool {
        matches!(
            self,
            DosFunction::Create
                | DosFunction::Open
                | DosFunction::Close
                | DosFunction::Read
                | DosFunction::Write
        )
    }
}

impl fmt::Display for DosFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DosFunction::Unknown(code) => write!(f, "UNKNOWN 0x{:02x}", code),
            known => f.write_str(known.name()),
        }
    }
}

/// Access mode of OPEN (low bits of AL)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
    Other(u8),
}

impl AccessMode {
    pub fn from_al(al: u8) -> Self {
        match al & 0x07 {
            0 => AccessMode::Read,
            1 => AccessMode::Write,
            2 => AccessMode::ReadWrite,
            _ => AccessMode::Other(al),
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessMode::Read => f.write_str("read"),
            AccessMode::Write => f.write_str("write"),
            AccessMode::ReadWrite => f.write_str("read-write"),
            AccessMode::Other(al) => write!(f, "mode 0x{:02x}", al),
        }
    }
}

/// File attribute of CREATE (CX)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAttribute {
    Normal,
    ReadOnly,
    Hidden,
    System,
    Archive,
    Other(u16),
}

impl FileAttribute {
    pub fn from_cx(cx: u16) -> Self {
        match cx {
            0x00 => FileAttribute::Normal,
            0x01 => FileAttribute::ReadOnly,
            0x02 => FileAttribute::Hidden,
            0x04 => FileAttribute::System,
            0x20 => FileAttribute::Archive,
            other => FileAttribute::Other(other),
        }
    }
}

impl fmt::Display for FileAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileAttribute::Normal => f.write_str("normal"),
            FileAttribute::ReadOnly => f.write_str("read-only"),
            FileAttribute::Hidden => f.write_str("hidden"),
            FileAttribute::System => f.write_str("system"),
            FileAttribute::Archive => f.write_str("archive"),
            FileAttribute::Other(cx) => write!(f, "attributes 0x{:02x}", cx),
        }
    }
}

/// DOS error code returned in AX when CF is set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DosError {
    FileNotFound,
    PathNotFound,
    NoHandleAvailable,
    AccessDenied,
    InvalidHandle,
    InvalidAccessCode,
    Unknown(u16),
}

impl DosError {
    pub fn from_code(ax: u16) -> Self {
        match ax {
            0x02 => DosError::FileNotFound,
            0x03 => DosError::PathNotFound,
            0x04 => DosError::NoHandleAvailable,
            0x05 => DosError::AccessDenied,
            0x06 => DosError::InvalidHandle,
            0x0c => DosError::InvalidAccessCode,
            other => DosError::Unknown(other),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            DosError::FileNotFound => 0x02,
            DosError::PathNotFound => 0x03,
            DosError::NoHandleAvailable => 0x04,
            DosError::AccessDenied => 0x05,
            DosError::InvalidHandle => 0x06,
            DosError::InvalidAccessCode => 0x0c,
            DosError::Unknown(code) => *code,
        }
    }
}

impl fmt::Display for DosError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DosError::FileNotFound => f.write_str("file not found"),
            DosError::PathNotFound => f.write_str("path not found"),
            DosError::NoHandleAvailable => f.write_str("no handle available"),
            DosError::AccessDenied => f.write_str("access denied"),
            DosError::InvalidHandle => f.write_str("invalid handle"),
            DosError::InvalidAccessCode => f.write_str("access code invalid"),
            DosError::Unknown(code) => write!(f, "unknown error 0x{:02x}", code),
        }
    }
}
