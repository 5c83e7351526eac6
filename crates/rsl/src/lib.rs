#![doc = include_str!("../../../README.md")]
#![expect(clippy::cast_possible_truncation, reason = "numeric narrowing is checked")]
#![expect(clippy::cast_sign_loss, reason = "sign-changing casts are intentional")]

mod address;
mod analyzer;
mod ast;
mod builtins;
mod codegen;
mod context;
mod disassembler;
mod encoder;
mod error;
mod grid;
mod instruction;
mod lexer;
mod math3d;
mod parser;
mod shader;
mod symbol;
mod symbol_table;
mod texture;
mod value;
mod vm;

pub use crate::{
    address::{Address, Segment},
    builtins::Builtin,
    context::ShadingContext,
    disassembler::disassemble,
    error::{CollectingErrorPolicy, CompileError, Diagnostic, ErrorCode, ErrorPolicy, SilentErrorPolicy},
    grid::{Grid, Light, LightGeometry},
    instruction::Opcode,
    math3d::{Mat4, Vec3},
    shader::Shader,
    symbol::{Symbol, SymbolId, SymbolParameter},
    symbol_table::{Scope, ScopeId, SymbolBuilder, SymbolTable},
    texture::{NoTextures, TextureService},
    value::{ValueStorage, ValueType},
    vm::{EntryPoint, execute},
};
