use std::io;

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("Unknown instruction {byte:#04x} at {offset:#06x}")]
    Unknown { offset: u64, byte: u8 },
    #[error("Not implemented: instruction {byte:#04x} at {offset:#06x}")]
    Unimplemented { offset: u64, byte: u8 },
    #[error("Missing byte at {offset:#06x}")]
    MissingByte { offset: u64 },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DecodeError {
    /// Stream offset the error refers to, if any.
    pub fn offset(&self) -> Option<u64> {
        match self {
            DecodeError::Unknown { offset, .. }
            | DecodeError::Unimplemented { offset, .. }
            | DecodeError::MissingByte { offset } => Some(*offset),
            DecodeError::Io(_) => None,
        }
    }

    /// Process exit status for this kind of failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            DecodeError::Io(_) => 1,
            DecodeError::Unimplemented { .. } => 2,
            DecodeError::Unknown { .. } => 3,
            DecodeError::MissingByte { .. } => 4,
        }
    }
}

/// Classification failure, before an offset is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifyError {
    Unknown,
    Unimplemented,
}

impl ClassifyError {
    pub fn at(self, offset: u64, byte: u8) -> DecodeError {
        match self {
            ClassifyError::Unknown => DecodeError::Unknown { offset, byte },
            ClassifyError::Unimplemented => DecodeError::Unimplemented { offset, byte },
        }
    }
}
