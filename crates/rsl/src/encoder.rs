//! Byte-code assembly: packs opcodes, dispatch tags, and argument words
//! into the little-endian instruction stream, with in-place patching for
//! forward jump distances.

use crate::{
    address::Address,
    instruction::{Opcode, dispatch_tag},
    value::{ValueStorage, ValueType},
};

/// Label returned when a jump distance is reserved for later patching;
/// holds the byte offset of the distance argument.
#[derive(Debug, Clone, Copy)]
pub struct PatchLabel(usize);

/// Assembles the instruction stream.
#[derive(Debug, Default)]
pub struct Encoder {
    code: Vec<u8>,
}

impl Encoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    #[must_use]
    pub fn take_code(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.code)
    }

    pub fn clear(&mut self) {
        self.code.clear();
    }

    /// The current byte offset, used as a jump anchor.
    #[must_use]
    pub fn address(&self) -> usize {
        self.code.len()
    }

    /// Emits an instruction with no operand tags.
    pub fn instruction(&mut self, opcode: Opcode) {
        self.word(u32::from(opcode as u8));
    }

    /// Emits an instruction with one operand tag.
    pub fn instruction1(&mut self, opcode: Opcode, op0: (ValueType, ValueStorage)) {
        self.byte(opcode as u8);
        self.byte(dispatch_tag(op0.0, op0.1));
        self.byte(0);
        self.byte(0);
    }

    /// Emits an instruction with two operand tags.
    pub fn instruction2(&mut self, opcode: Opcode, op0: (ValueType, ValueStorage), op1: (ValueType, ValueStorage)) {
        self.byte(opcode as u8);
        self.byte(dispatch_tag(op0.0, op0.1));
        self.byte(dispatch_tag(op1.0, op1.1));
        self.byte(0);
    }

    /// Emits an instruction with three operand tags.
    pub fn instruction3(
        &mut self,
        opcode: Opcode,
        op0: (ValueType, ValueStorage),
        op1: (ValueType, ValueStorage),
        op2: (ValueType, ValueStorage),
    ) {
        self.byte(opcode as u8);
        self.byte(dispatch_tag(op0.0, op0.1));
        self.byte(dispatch_tag(op1.0, op1.1));
        self.byte(dispatch_tag(op2.0, op2.1));
    }

    /// Emits an address argument word.
    pub fn argument(&mut self, address: Address) {
        self.word(address.word());
    }

    /// Emits a literal integer argument word.
    pub fn argument_int(&mut self, value: i32) {
        self.word(value.cast_unsigned());
    }

    /// Reserves a zeroed argument word for a jump distance and returns its
    /// label for patching.
    #[must_use]
    pub fn argument_for_patching(&mut self) -> PatchLabel {
        let label = PatchLabel(self.code.len());
        self.word(0);
        label
    }

    /// Overwrites a reserved argument with the resolved jump distance.
    ///
    /// # Panics
    ///
    /// Panics if the label was already patched; every reserved argument is
    /// patched exactly once.
    pub fn patch_argument(&mut self, label: PatchLabel, distance: i32) {
        let bytes = distance.to_le_bytes();
        let old = &self.code[label.0..label.0 + 4];
        assert_eq!(old, [0, 0, 0, 0], "jump distance patched twice");
        self.code[label.0..label.0 + 4].copy_from_slice(&bytes);
    }

    fn byte(&mut self, value: u8) {
        self.code.push(value);
    }

    fn word(&mut self, value: u32) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use crate::address::Segment;

    use super::*;

    #[test]
    fn instruction_word_layout() {
        let mut encoder = Encoder::new();
        encoder.instruction2(
            Opcode::Multiply,
            (ValueType::Point, ValueStorage::Varying),
            (ValueType::Float, ValueStorage::Uniform),
        );
        assert_eq!(
            encoder.code(),
            &[
                Opcode::Multiply as u8,
                dispatch_tag(ValueType::Point, ValueStorage::Varying),
                dispatch_tag(ValueType::Float, ValueStorage::Uniform),
                0,
            ]
        );
    }

    #[test]
    fn untagged_instruction_is_one_word() {
        let mut encoder = Encoder::new();
        encoder.instruction(Opcode::Halt);
        assert_eq!(encoder.code(), &[Opcode::Halt as u8, 0, 0, 0]);
    }

    #[test]
    fn arguments_are_little_endian_words() {
        let mut encoder = Encoder::new();
        encoder.argument(Address::new(Segment::Temporary, 8));
        let word = u32::from_le_bytes(encoder.code()[0..4].try_into().unwrap());
        let address = Address::from_word(word);
        assert_eq!(address.segment(), Segment::Temporary);
        assert_eq!(address.offset(), 8);
    }

    #[test]
    fn patching_fills_reserved_distance() {
        let mut encoder = Encoder::new();
        encoder.instruction(Opcode::JumpEmpty);
        let label = encoder.argument_for_patching();
        let anchor = encoder.address();
        encoder.instruction(Opcode::Halt);
        let distance = i32::try_from(encoder.address() - anchor).unwrap();
        encoder.patch_argument(label, distance);
        assert_eq!(&encoder.code()[4..8], &4i32.to_le_bytes());
    }
}
