/// One decoded instruction word.
///
/// The word is two bytes: opcode in the high nibble of the first byte,
/// operand A in its low nibble, operands B and C in the high and low
/// nibbles of the second byte (together the byte operand BC).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// `ldr`: register A <- memory[BC].
    Load { register: u8, address: u8 },
    /// `ldrc`: register A <- the literal byte BC.
    LoadImmediate { register: u8, value: u8 },
    /// `str`: memory[BC] <- register A.
    Store { register: u8, address: u8 },
    /// `mov`: register C <- register B.
    Move { from: u8, to: u8 },
    /// `add`: register A <- register B + register C, wrapped to 8 bits.
    Add { dest: u8, lhs: u8, rhs: u8 },
    /// `fadd`: same register-level addition, narrated as float math.
    AddFloat { dest: u8, lhs: u8, rhs: u8 },
    /// `or`: register A <- register B | register C.
    Or { dest: u8, lhs: u8, rhs: u8 },
    /// `and`: register A <- register B & register C.
    And { dest: u8, lhs: u8, rhs: u8 },
    /// `xor`: register A <- register B ^ register C.
    Xor { dest: u8, lhs: u8, rhs: u8 },
    /// `ror`: rotate register A right by the value of register C.
    Rotate { register: u8, steps: u8 },
    /// `jmp`: jump to BC if register A equals register 0.
    JumpEq { register: u8, address: u8 },
    /// `hlt`.
    Halt,
}

impl Instruction {
    /// Decodes the two bytes at the program counter. `None` means the
    /// opcode nibble has no instruction assigned.
    pub fn decode(high: u8, low: u8) -> Option<Instruction> {
        let a = high & 0x0F;
        let b = low >> 4;
        let c = low & 0x0F;

        Some(match high >> 4 {
            1 => Instruction::Load { register: a, address: low },
            2 => Instruction::LoadImmediate { register: a, value: low },
            3 => Instruction::Store { register: a, address: low },
            4 => Instruction::Move { from: b, to: c },
            5 => Instruction::Add { dest: a, lhs: b, rhs: c },
            6 => Instruction::AddFloat { dest: a, lhs: b, rhs: c },
            7 => Instruction::Or { dest: a, lhs: b, rhs: c },
            8 => Instruction::And { dest: a, lhs: b, rhs: c },
            9 => Instruction::Xor { dest: a, lhs: b, rhs: c },
            10 => Instruction::Rotate { register: a, steps: c },
            11 => Instruction::JumpEq { register: a, address: low },
            12 => Instruction::Halt,
            _ => return None,
        })
    }

    /// Human-readable narration of the instruction about to run. Register
    /// nibbles print as one uppercase hex digit, byte operands as two.
    pub fn describe(&self) -> String {
        match *self {
            Instruction::Load { register, address } => format!(
                "Copy the content of memory cell {address:02X} to register {register:X}."
            ),
            Instruction::LoadImmediate { register, value } => format!(
                "Copy the bit-string {value:02X} to register {register:X}."
            ),
            Instruction::Store { register, address } => format!(
                "Copy the content of register {register:X} to memory cell {address:02X}."
            ),
            Instruction::Move { from, to } => format!(
                "Copy the content of register {from:X} to register {to:X}."
            ),
            Instruction::Add { dest, lhs, rhs } => format!(
                "Add the content of register {lhs:X} and register {rhs:X} as integers, \
                 and put the result in register {dest:X}."
            ),
            Instruction::AddFloat { dest, lhs, rhs } => format!(
                "Add the content of register {lhs:X} and register {rhs:X} as floats, \
                 and put the result in register {dest:X}."
            ),
            Instruction::Or { dest, lhs, rhs } => format!(
                "Bitwise OR the content of register {lhs:X} and {rhs:X}, \
                 and put the result in register {dest:X}."
            ),
            Instruction::And { dest, lhs, rhs } => format!(
                "Bitwise AND the content of register {lhs:X} and {rhs:X}, \
                 and put the result in register {dest:X}."
            ),
            Instruction::Xor { dest, lhs, rhs } => format!(
                "Bitwise XOR the content of register {lhs:X} and {rhs:X}, \
                 and put the result in register {dest:X}."
            ),
            Instruction::Rotate { register, steps } => format!(
                "Rotate the content of register {register:X} cyclically right {steps:X} steps."
            ),
            Instruction::JumpEq { register, address } => format!(
                "Jump to instruction in memory cell {address:02X} if the content of \
                 register {register:X} equals the content of register 0."
            ),
            Instruction::Halt => "Halt execution.".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_splits_the_nibbles() {
        assert_eq!(
            Instruction::decode(0x2D, 0x05),
            Some(Instruction::LoadImmediate { register: 0xD, value: 0x05 })
        );
        assert_eq!(
            Instruction::decode(0x56, 0x78),
            Some(Instruction::Add { dest: 6, lhs: 7, rhs: 8 })
        );
        assert_eq!(
            Instruction::decode(0x40, 0x45),
            Some(Instruction::Move { from: 4, to: 5 })
        );
        assert_eq!(Instruction::decode(0xC0, 0x00), Some(Instruction::Halt));
    }

    #[test]
    fn unassigned_opcodes_do_not_decode() {
        assert_eq!(Instruction::decode(0x00, 0x00), None);
        assert_eq!(Instruction::decode(0xD0, 0x00), None);
        assert_eq!(Instruction::decode(0xFF, 0xFF), None);
    }

    #[test]
    fn narration_formats_nibbles_as_uppercase_hex() {
        assert_eq!(
            Instruction::decode(0x1A, 0x1F).unwrap().describe(),
            "Copy the content of memory cell 1F to register A."
        );
        assert_eq!(
            Instruction::decode(0x2D, 0x05).unwrap().describe(),
            "Copy the bit-string 05 to register D."
        );
        assert_eq!(
            Instruction::decode(0xB1, 0x0C).unwrap().describe(),
            "Jump to instruction in memory cell 0C if the content of register 1 \
             equals the content of register 0."
        );
    }
}
