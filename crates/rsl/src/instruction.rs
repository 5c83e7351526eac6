//! The byte-code instruction set and per-operand dispatch tags.
//!
//! A word is 32 bits, little-endian. Each instruction is one word: byte 0
//! holds the opcode, bytes 1..3 hold up to three per-operand dispatch tags
//! (unused tags are zero). Each argument that follows is a full word
//! carrying either a packed address or a literal integer.

use strum::{Display, FromRepr};

use crate::value::{ValueStorage, ValueType};

/// One byte-code operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum Opcode {
    Null = 0,
    Halt,
    Reset,
    Jump,
    JumpEmpty,
    JumpNotEmpty,
    JumpIlluminance,
    ClearMask,
    GenerateMask,
    InvertMask,
    TransformPoint,
    TransformVector,
    TransformNormal,
    TransformColor,
    TransformMatrix,
    Dot,
    Multiply,
    Divide,
    Add,
    Subtract,
    Negate,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Equal,
    NotEqual,
    And,
    Or,
    Convert,
    Promote,
    Assign,
    AddAssign,
    SubtractAssign,
    MultiplyAssign,
    DivideAssign,
    StringAssign,
    FloatTexture,
    Vec3Texture,
    FloatEnvironment,
    Vec3Environment,
    Shadow,
    Call,
    Ambient,
    Solar,
    SolarAxisAngle,
    Illuminate,
    IlluminateAxisAngle,
    IlluminanceAxisAngle,
}

/// Set in a dispatch tag when the operand is varying; clear for uniform and
/// constant operands, which both broadcast.
pub const DISPATCH_VARYING: u8 = 0x10;

/// Vector families encoded in the low bits of a dispatch tag.
pub const FAMILY_SCALAR: u8 = 0;
pub const FAMILY_STRING: u8 = 1;
pub const FAMILY_VEC3: u8 = 2;
pub const FAMILY_MATRIX: u8 = 15;

/// Encodes one operand's `(type, storage)` pair as a dispatch tag.
#[must_use]
pub fn dispatch_tag(ty: ValueType, storage: ValueStorage) -> u8 {
    let family = match ty {
        ValueType::Null | ValueType::Integer | ValueType::Float => FAMILY_SCALAR,
        ValueType::String => FAMILY_STRING,
        ValueType::Color | ValueType::Point | ValueType::Vector | ValueType::Normal => FAMILY_VEC3,
        ValueType::Matrix => FAMILY_MATRIX,
    };
    let by_storage = if storage.is_varying() { DISPATCH_VARYING } else { 0 };
    by_storage | family
}

/// The vector family bits of a dispatch tag.
#[must_use]
pub fn tag_family(tag: u8) -> u8 {
    tag & 0x0f
}

/// Whether a dispatch tag names a varying operand.
#[must_use]
pub fn tag_is_varying(tag: u8) -> bool {
    tag & DISPATCH_VARYING != 0
}

/// The number of floats in one element of a tag's family.
#[must_use]
pub fn tag_components(tag: u8) -> usize {
    match tag_family(tag) {
        FAMILY_VEC3 => 3,
        FAMILY_MATRIX => 16,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_round_trips_through_repr() {
        assert_eq!(Opcode::from_repr(Opcode::Halt as u8), Some(Opcode::Halt));
        assert_eq!(
            Opcode::from_repr(Opcode::IlluminanceAxisAngle as u8),
            Some(Opcode::IlluminanceAxisAngle)
        );
        assert_eq!(Opcode::from_repr(255), None);
    }

    #[test]
    fn tags_encode_family_and_storage() {
        let tag = dispatch_tag(ValueType::Color, ValueStorage::Varying);
        assert_eq!(tag_family(tag), FAMILY_VEC3);
        assert!(tag_is_varying(tag));
        assert_eq!(tag_components(tag), 3);

        let tag = dispatch_tag(ValueType::Float, ValueStorage::Uniform);
        assert_eq!(tag_family(tag), FAMILY_SCALAR);
        assert!(!tag_is_varying(tag));

        let tag = dispatch_tag(ValueType::Matrix, ValueStorage::Uniform);
        assert_eq!(tag_components(tag), 16);

        // Constant operands broadcast like uniform ones.
        let tag = dispatch_tag(ValueType::Float, ValueStorage::Constant);
        assert!(!tag_is_varying(tag));
    }
}
