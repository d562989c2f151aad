//! Result and errors.
use std::fmt::{self, Display, Formatter};

use crate::constants::{Address, MAX_PROGRAM_SIZE};

pub type Chip8Result<T> = std::result::Result<T, Chip8Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chip8Error {
    /// Attempt to load a bytecode program that can't fit in memory.
    ProgramTooLarge { size: usize },
    /// Instruction does not match any of the known opcode forms.
    ///
    /// The program counter has already moved past the instruction,
    /// so execution may be resumed.
    UnknownOpcode { opcode: u16, address: Address },
    /// `CALL` with every stack frame in use.
    StackOverflow { address: Address },
    /// `RET` with an empty call stack.
    StackUnderflow { address: Address },
    Fmt(fmt::Error),
}

impl Chip8Error {
    /// Whether the machine can keep stepping after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnknownOpcode { .. })
    }
}

impl Display for Chip8Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProgramTooLarge { size } => write!(
                f,
                "program too large for VM memory: {size} bytes, maximum is {MAX_PROGRAM_SIZE}"
            ),
            Self::UnknownOpcode { opcode, address } => {
                write!(f, "unknown opcode {opcode:04X} at 0x{address:03X}")
            }
            Self::StackOverflow { address } => {
                write!(f, "call stack overflow at 0x{address:03X}")
            }
            Self::StackUnderflow { address } => {
                write!(f, "call stack underflow at 0x{address:03X}")
            }
            Self::Fmt(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Chip8Error {}

impl From<fmt::Error> for Chip8Error {
    fn from(err: fmt::Error) -> Self {
        Chip8Error::Fmt(err)
    }
}
