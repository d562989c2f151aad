//! Decoded instructions.
//!
//! Every opcode is mapped to one variant of a closed set of operations
//! before execution, so the interpreter can match on them exhaustively.
use std::fmt::{self, Formatter};

use crate::{bytecode::*, constants::Address};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum Op {
    /// 00E0 (CLS)
    ///
    /// Clear the screen.
    ClearScreen,
    /// 00EE (RET)
    ///
    /// Return from the sub-routine.
    Return,
    /// 0nnn (SYS addr)
    ///
    /// Jump to a machine code routine. Ignored by modern interpreters.
    System { address: Address },
    /// 1nnn (JP addr)
    ///
    /// Jump to the address in `nnn`.
    Jump { address: Address },
    /// 2nnn (CALL addr)
    ///
    /// Call the sub-routine at address `nnn`.
    Call { address: Address },
    /// 3xkk (SE Vx, byte)
    ///
    /// Skip the next instruction if register `Vx` equals value `kk`
    Skip_Eq_Byte { vx: u8, kk: u8 },
    /// 4xkk (SNE Vx, byte)
    ///
    /// Skip the next instruction if register `Vx` does not equal value `kk`.
    Skip_NotEq_Byte { vx: u8, kk: u8 },
    /// 5xy0 (SE Vx, Vy)
    ///
    /// Skip the next instruction if register `Vx` equals register `Vy`.
    Skip_Eq { vx: u8, vy: u8 },
    /// 6xkk (LD Vx, byte)
    Load_Byte { vx: u8, kk: u8 },
    /// 7xkk (ADD Vx, byte)
    ///
    /// Add byte to the value in register `Vx`, store the result in `Vx`.
    /// The carry flag is not touched.
    Add_Byte { vx: u8, kk: u8 },

    // ------------------------------------------------------------------------
    // Math
    /// 8xy0 (LD Vx, Vy)
    Load_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy1 (OR Vx, Vy)
    Or_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy2 (AND Vx, Vy)
    And_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy3 (XOR Vx, Vy)
    Xor_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy4 (ADD Vx, Vy)
    ///
    /// If overflowed, set VF to 1, else 0.
    Add_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy5 (SUB Vx, Vy)
    ///
    /// VF is set to 0 when there is a borrow, set to 1 when there isn't.
    Sub_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy6 (SHR Vx)
    ///
    /// VY is unused.
    ShiftRight { vx: u8 },
    /// 8xy7 (SUBN Vx, Vy)
    ///
    /// Subtracts VX from VY, and stores the result in VX.
    SubReverse_Vx_Vy { vx: u8, vy: u8 },
    /// 8xyE (SHL Vx)
    ///
    /// VY is unused.
    ShiftLeft { vx: u8 },
    /// 9xy0 (SNE Vx, Vy)
    Skip_NotEq { vx: u8, vy: u8 },

    /// Annn (LD I, addr)
    Load_Address { address: Address },
    /// Bnnn (JP V0, addr)
    ///
    /// Jump to location nnn + V0.
    Jump_V0 { address: Address },
    /// Cxkk (RND Vx, byte)
    Random { vx: u8, kk: u8 },
    /// Dxyn (DRW Vx, Vy, nibble)
    Draw { vx: u8, vy: u8, n: u8 },

    // ------------------------------------------------------------------------
    // Keyboard
    /// Ex9E (SKP Vx)
    Skip_Pressed { vx: u8 },
    /// ExA1 (SKNP Vx)
    Skip_NotPressed { vx: u8 },

    // ------------------------------------------------------------------------
    // Timers and memory
    /// Fx07 (LD Vx, DT)
    Load_Vx_Delay { vx: u8 },
    /// Fx0A (LD Vx, K)
    Load_Vx_Key { vx: u8 },
    /// Fx15 (LD DT, Vx)
    Load_Delay_Vx { vx: u8 },
    /// Fx18 (LD ST, Vx)
    Load_Sound_Vx { vx: u8 },
    /// Fx1E (ADD I, Vx)
    Add_Address_Vx { vx: u8 },
    /// Fx29 (LD F, Vx)
    Load_Font_Vx { vx: u8 },
    /// Fx33 (LD B, Vx)
    Load_Bcd_Vx { vx: u8 },
    /// Fx55 (LD [I], Vx)
    Store_Registers { vx: u8 },
    /// Fx65 (LD Vx, [I])
    Load_Registers { vx: u8 },

    /// Bit pattern that matches none of the known forms.
    Unknown { opcode: u16 },
}

impl Op {
    pub fn decode(opcode: u16) -> Self {
        let (x, y, n) = op_xyn(opcode);
        let kk = op_kk(opcode);
        let address = op_nnn(opcode);

        match (op_code(opcode), n) {
            (0x0, _) => match address {
                0x0E0 => Op::ClearScreen,
                0x0EE => Op::Return,
                _ => Op::System { address },
            },
            (0x1, _) => Op::Jump { address },
            (0x2, _) => Op::Call { address },
            (0x3, _) => Op::Skip_Eq_Byte { vx: x, kk },
            (0x4, _) => Op::Skip_NotEq_Byte { vx: x, kk },
            (0x5, 0x0) => Op::Skip_Eq { vx: x, vy: y },
            (0x6, _) => Op::Load_Byte { vx: x, kk },
            (0x7, _) => Op::Add_Byte { vx: x, kk },
            (0x8, 0x0) => Op::Load_Vx_Vy { vx: x, vy: y },
            (0x8, 0x1) => Op::Or_Vx_Vy { vx: x, vy: y },
            (0x8, 0x2) => Op::And_Vx_Vy { vx: x, vy: y },
            (0x8, 0x3) => Op::Xor_Vx_Vy { vx: x, vy: y },
            (0x8, 0x4) => Op::Add_Vx_Vy { vx: x, vy: y },
            (0x8, 0x5) => Op::Sub_Vx_Vy { vx: x, vy: y },
            (0x8, 0x6) => Op::ShiftRight { vx: x },
            (0x8, 0x7) => Op::SubReverse_Vx_Vy { vx: x, vy: y },
            (0x8, 0xE) => Op::ShiftLeft { vx: x },
            (0x9, 0x0) => Op::Skip_NotEq { vx: x, vy: y },
            (0xA, _) => Op::Load_Address { address },
            (0xB, _) => Op::Jump_V0 { address },
            (0xC, _) => Op::Random { vx: x, kk },
            (0xD, _) => Op::Draw { vx: x, vy: y, n },
            (0xE, _) => match kk {
                0x9E => Op::Skip_Pressed { vx: x },
                0xA1 => Op::Skip_NotPressed { vx: x },
                _ => Op::Unknown { opcode },
            },
            (0xF, _) => match kk {
                0x07 => Op::Load_Vx_Delay { vx: x },
                0x0A => Op::Load_Vx_Key { vx: x },
                0x15 => Op::Load_Delay_Vx { vx: x },
                0x18 => Op::Load_Sound_Vx { vx: x },
                0x1E => Op::Add_Address_Vx { vx: x },
                0x29 => Op::Load_Font_Vx { vx: x },
                0x33 => Op::Load_Bcd_Vx { vx: x },
                0x55 => Op::Store_Registers { vx: x },
                0x65 => Op::Load_Registers { vx: x },
                _ => Op::Unknown { opcode },
            },
            _ => Op::Unknown { opcode },
        }
    }
}

impl From<u16> for Op {
    fn from(opcode: u16) -> Self {
        Op::decode(opcode)
    }
}

/// Assembly mnemonic, for tracing.
impl fmt::Display for Op {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            Op::ClearScreen                  => write!(f, "CLS"),
            Op::Return                       => write!(f, "RET"),
            Op::System { address }           => write!(f, "SYS {address:03X}"),
            Op::Jump { address }             => write!(f, "JP {address:03X}"),
            Op::Call { address }             => write!(f, "CALL {address:03X}"),
            Op::Skip_Eq_Byte { vx, kk }      => write!(f, "SE V{vx:X}, {kk:02X}"),
            Op::Skip_NotEq_Byte { vx, kk }   => write!(f, "SNE V{vx:X}, {kk:02X}"),
            Op::Skip_Eq { vx, vy }           => write!(f, "SE V{vx:X}, V{vy:X}"),
            Op::Load_Byte { vx, kk }         => write!(f, "LD V{vx:X}, {kk:02X}"),
            Op::Add_Byte { vx, kk }          => write!(f, "ADD V{vx:X}, {kk:02X}"),
            Op::Load_Vx_Vy { vx, vy }        => write!(f, "LD V{vx:X}, V{vy:X}"),
            Op::Or_Vx_Vy { vx, vy }          => write!(f, "OR V{vx:X}, V{vy:X}"),
            Op::And_Vx_Vy { vx, vy }         => write!(f, "AND V{vx:X}, V{vy:X}"),
            Op::Xor_Vx_Vy { vx, vy }         => write!(f, "XOR V{vx:X}, V{vy:X}"),
            Op::Add_Vx_Vy { vx, vy }         => write!(f, "ADD V{vx:X}, V{vy:X}"),
            Op::Sub_Vx_Vy { vx, vy }         => write!(f, "SUB V{vx:X}, V{vy:X}"),
            Op::ShiftRight { vx }            => write!(f, "SHR V{vx:X}"),
            Op::SubReverse_Vx_Vy { vx, vy }  => write!(f, "SUBN V{vx:X}, V{vy:X}"),
            Op::ShiftLeft { vx }             => write!(f, "SHL V{vx:X}"),
            Op::Skip_NotEq { vx, vy }        => write!(f, "SNE V{vx:X}, V{vy:X}"),
            Op::Load_Address { address }     => write!(f, "LD I, {address:03X}"),
            Op::Jump_V0 { address }          => write!(f, "JP V0, {address:03X}"),
            Op::Random { vx, kk }            => write!(f, "RND V{vx:X}, {kk:02X}"),
            Op::Draw { vx, vy, n }           => write!(f, "DRW V{vx:X}, V{vy:X}, {n:X}"),
            Op::Skip_Pressed { vx }          => write!(f, "SKP V{vx:X}"),
            Op::Skip_NotPressed { vx }       => write!(f, "SKNP V{vx:X}"),
            Op::Load_Vx_Delay { vx }         => write!(f, "LD V{vx:X}, DT"),
            Op::Load_Vx_Key { vx }           => write!(f, "LD V{vx:X}, K"),
            Op::Load_Delay_Vx { vx }         => write!(f, "LD DT, V{vx:X}"),
            Op::Load_Sound_Vx { vx }         => write!(f, "LD ST, V{vx:X}"),
            Op::Add_Address_Vx { vx }        => write!(f, "ADD I, V{vx:X}"),
            Op::Load_Font_Vx { vx }          => write!(f, "LD F, V{vx:X}"),
            Op::Load_Bcd_Vx { vx }           => write!(f, "LD B, V{vx:X}"),
            Op::Store_Registers { vx }       => write!(f, "LD [I], V{vx:X}"),
            Op::Load_Registers { vx }        => write!(f, "LD V{vx:X}, [I]"),
            Op::Unknown { opcode }           => write!(f, "??? {opcode:04X}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_decode_groups() {
        assert_eq!(Op::decode(0x00E0), Op::ClearScreen);
        assert_eq!(Op::decode(0x00EE), Op::Return);
        assert_eq!(Op::decode(0x0123), Op::System { address: 0x123 });
        assert_eq!(Op::decode(0x1ABC), Op::Jump { address: 0xABC });
        assert_eq!(Op::decode(0x2ABC), Op::Call { address: 0xABC });
        assert_eq!(Op::decode(0x3A42), Op::Skip_Eq_Byte { vx: 0xA, kk: 0x42 });
        assert_eq!(Op::decode(0x5120), Op::Skip_Eq { vx: 1, vy: 2 });
        assert_eq!(Op::decode(0x8126), Op::ShiftRight { vx: 1 });
        assert_eq!(Op::decode(0x812E), Op::ShiftLeft { vx: 1 });
        assert_eq!(Op::decode(0xB300), Op::Jump_V0 { address: 0x300 });
        assert_eq!(Op::decode(0xD125), Op::Draw { vx: 1, vy: 2, n: 5 });
        assert_eq!(Op::decode(0xE49E), Op::Skip_Pressed { vx: 4 });
        assert_eq!(Op::decode(0xE4A1), Op::Skip_NotPressed { vx: 4 });
        assert_eq!(Op::decode(0xF70A), Op::Load_Vx_Key { vx: 7 });
        assert_eq!(Op::decode(0xF733), Op::Load_Bcd_Vx { vx: 7 });
        assert_eq!(Op::decode(0xF765), Op::Load_Registers { vx: 7 });
    }

    #[test]
    fn test_decode_unknown() {
        for opcode in [0x5121, 0x8128, 0x812F, 0x9121, 0xE400, 0xF400, 0xF0FF] {
            assert_eq!(Op::decode(opcode), Op::Unknown { opcode });
        }
    }

    #[test]
    fn test_mnemonic() {
        assert_eq!(Op::decode(0xD125).to_string(), "DRW V1, V2, 5");
        assert_eq!(Op::decode(0xA2F0).to_string(), "LD I, 2F0");
        assert_eq!(Op::decode(0xF555).to_string(), "LD [I], V5");
    }
}
