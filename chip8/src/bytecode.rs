//! Helpers for extracting operand fields from opcodes.
//!
//! Instructions are two bytes, combined big-endian into a `u16`:
//!
//! ```text
//! u x y n
//!     k k
//!   n n n
//! ```

/// Extract the operation group `u` from the upper nibble.
#[inline(always)]
pub fn op_code(opcode: u16) -> u8 {
    ((opcode & 0xF000) >> 12) as u8
}

/// Extract register operand `x`.
#[inline(always)]
pub fn op_x(opcode: u16) -> u8 {
    ((opcode & 0x0F00) >> 8) as u8
}

/// Extract register operand `y`.
#[inline(always)]
pub fn op_y(opcode: u16) -> u8 {
    ((opcode & 0x00F0) >> 4) as u8
}

/// Extract operand `n` from the lowest nibble.
#[inline(always)]
pub fn op_n(opcode: u16) -> u8 {
    (opcode & 0x000F) as u8
}

/// Extract byte operand `kk`.
#[inline(always)]
pub fn op_kk(opcode: u16) -> u8 {
    (opcode & 0x00FF) as u8
}

/// Extract address operand `nnn`.
#[inline(always)]
pub fn op_nnn(opcode: u16) -> u16 {
    opcode & 0x0FFF
}

/// Extract operands `x` and `kk`.
#[inline(always)]
pub fn op_xkk(opcode: u16) -> (u8, u8) {
    (op_x(opcode), op_kk(opcode))
}

/// Extract operands `x`, `y` and `n`.
#[inline(always)]
pub fn op_xyn(opcode: u16) -> (u8, u8, u8) {
    (op_x(opcode), op_y(opcode), op_n(opcode))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_fields() {
        let opcode = 0xD5A3;
        assert_eq!(op_code(opcode), 0xD);
        assert_eq!(op_x(opcode), 0x5);
        assert_eq!(op_y(opcode), 0xA);
        assert_eq!(op_n(opcode), 0x3);
        assert_eq!(op_kk(opcode), 0xA3);
        assert_eq!(op_nnn(opcode), 0x5A3);
        assert_eq!(op_xkk(opcode), (0x5, 0xA3));
        assert_eq!(op_xyn(opcode), (0x5, 0xA, 0x3));
    }
}
