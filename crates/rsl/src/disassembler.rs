//! Textual dumps of compiled shaders: the symbol layout and a
//! one-instruction-per-line disassembly with resolved jump targets.

use std::fmt::Write;

use crate::{address::Address, instruction::Opcode, shader::Shader};

/// The number of address arguments following each opcode; `CALL` and the
/// jumps decode their own argument shapes.
fn argument_count(opcode: Opcode) -> usize {
    match opcode {
        Opcode::Null
        | Opcode::Halt
        | Opcode::ClearMask
        | Opcode::InvertMask
        | Opcode::Solar
        | Opcode::Jump
        | Opcode::JumpEmpty
        | Opcode::JumpNotEmpty
        | Opcode::JumpIlluminance
        | Opcode::Call => 0,
        Opcode::Reset | Opcode::GenerateMask => 1,
        Opcode::Negate
        | Opcode::Convert
        | Opcode::Promote
        | Opcode::Assign
        | Opcode::AddAssign
        | Opcode::SubtractAssign
        | Opcode::MultiplyAssign
        | Opcode::DivideAssign
        | Opcode::StringAssign
        | Opcode::Ambient => 2,
        Opcode::TransformPoint
        | Opcode::TransformVector
        | Opcode::TransformNormal
        | Opcode::TransformColor
        | Opcode::TransformMatrix
        | Opcode::Dot
        | Opcode::Multiply
        | Opcode::Divide
        | Opcode::Add
        | Opcode::Subtract
        | Opcode::Greater
        | Opcode::GreaterEqual
        | Opcode::Less
        | Opcode::LessEqual
        | Opcode::Equal
        | Opcode::NotEqual
        | Opcode::And
        | Opcode::Or
        | Opcode::FloatEnvironment
        | Opcode::Vec3Environment => 3,
        Opcode::FloatTexture | Opcode::Vec3Texture | Opcode::Shadow | Opcode::SolarAxisAngle => 4,
        Opcode::Illuminate => 5,
        Opcode::IlluminateAxisAngle | Opcode::IlluminanceAxisAngle => 7,
    }
}

/// Renders the shader's entry points, symbol layout, and byte code.
#[must_use]
pub fn disassemble(shader: &Shader) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "initialize={}, shade={}, constant_memory_size={}, grid_memory_size={}, temporary_memory_size={}",
        shader.initialize_address(),
        shader.shade_address(),
        shader.constant_memory_size(),
        shader.grid_memory_size(),
        shader.temporary_memory_size(),
    );

    for (index, symbol) in shader.symbols().iter().enumerate() {
        let _ = writeln!(
            out,
            "{index}, {}, {}, {:+}",
            symbol.identifier(),
            symbol.segment(),
            symbol.offset()
        );
    }
    out.push('\n');

    let code = shader.code();
    let word_at = |at: usize| u32::from_le_bytes(code[at..at + 4].try_into().expect("four code bytes"));
    let mut at = 0;
    while at < code.len() {
        let word = word_at(at);
        let opcode = Opcode::from_repr((word & 0xff) as u8).expect("invalid opcode in disassembly");
        let _ = write!(out, "{at}: {opcode}");
        at += 4;

        match opcode {
            Opcode::Jump | Opcode::JumpEmpty | Opcode::JumpNotEmpty | Opcode::JumpIlluminance => {
                let distance = word_at(at).cast_signed();
                at += 4;
                let target = i64::try_from(at).expect("offset fits i64") + i64::from(distance);
                let _ = write!(out, ", {distance} ({target})");
            }
            Opcode::Call => {
                let index = word_at(at);
                at += 4;
                let argc = word_at(at) as usize;
                at += 4;
                let identifier = shader
                    .symbols()
                    .get(index as usize)
                    .map_or("?", crate::symbol::Symbol::identifier);
                let _ = write!(out, " {identifier}");
                for _ in 0..argc + 1 {
                    let address = Address::from_word(word_at(at));
                    at += 4;
                    let _ = write!(out, " {}:{}", address.segment(), address.offset());
                }
            }
            _ => {
                for _ in 0..argument_count(opcode) {
                    let address = Address::from_word(word_at(at));
                    at += 4;
                    let _ = write!(out, " {}:{}", address.segment(), address.offset());
                }
            }
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use crate::error::SilentErrorPolicy;

    use super::*;

    #[test]
    fn disassembly_lists_symbols_and_halts() {
        let mut errors = SilentErrorPolicy::default();
        let shader = Shader::load("surface s() { Ci = Cs; }", "s.sl", &mut errors).expect("shader compiles");
        let listing = disassemble(&shader);
        assert!(listing.contains("initialize=0"));
        assert!(listing.contains("Ci, grid"));
        assert!(listing.contains("assign"));
        assert!(listing.lines().filter(|l| l.ends_with("halt")).count() >= 2);
    }

    #[test]
    fn jumps_show_their_resolved_targets() {
        let mut errors = SilentErrorPolicy::default();
        let shader = Shader::load(
            "surface s() { float i = 0; while (i < 3) { i += 1; } Ci = Cs; }",
            "s.sl",
            &mut errors,
        )
        .expect("shader compiles");
        let listing = disassemble(&shader);
        assert!(listing.contains("jump_empty"));
        let jump_line = listing.lines().find(|l| l.contains("jump_empty")).expect("a jump line");
        assert!(jump_line.contains('('), "jump line shows a target: {jump_line}");
    }
}
