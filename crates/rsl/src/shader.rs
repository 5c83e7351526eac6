//! The compiled shader artifact and the compile boundary.

use std::fs;

use crate::{
    analyzer::SemanticAnalyzer,
    codegen::CodeGenerator,
    error::{CompileError, ErrorCode, ErrorPolicy},
    parser::ShaderParser,
    symbol::Symbol,
    symbol_table::SymbolTable,
};

/// A compiled light, surface, volume, displacement, or imager shader.
///
/// Immutable once compilation completes: the published symbols (grid and
/// string symbols followed by the called built-ins), the constant segment
/// bytes, and the byte code with its two entry points. `initialize` runs
/// the parameter initializers; `shade` runs the body. Both end with
/// `HALT`.
#[derive(Debug)]
pub struct Shader {
    symbols: Vec<Symbol>,
    constants: Vec<u8>,
    code: Vec<u8>,
    initialize_address: usize,
    shade_address: usize,
    lanes_max: usize,
    grid_memory_size: u32,
    temporary_memory_size: u32,
}

impl Shader {
    /// Compiles shader source against a fresh symbol table.
    pub fn load(source: &str, name: &str, errors: &mut dyn ErrorPolicy) -> Result<Self, CompileError> {
        let mut symbol_table = SymbolTable::new();
        Self::load_with_symbols(source, name, &mut symbol_table, errors)
    }

    /// Compiles shader source against a caller-provided symbol table,
    /// which may hold pre-registered symbols.
    pub fn load_with_symbols(
        source: &str,
        name: &str,
        symbol_table: &mut SymbolTable,
        errors: &mut dyn ErrorPolicy,
    ) -> Result<Self, CompileError> {
        let mut root = ShaderParser::new(errors).parse(source, name).ok_or(CompileError {
            code: ErrorCode::ParsingFailed,
        })?;

        if SemanticAnalyzer::new(symbol_table, errors).analyze(&mut root, name) > 0 {
            return Err(CompileError {
                code: ErrorCode::SemanticAnalysisFailed,
            });
        }

        let mut generator = CodeGenerator::new(symbol_table, errors);
        if generator.generate(&mut root, name) > 0 {
            return Err(CompileError {
                code: ErrorCode::CodeGenerationFailed,
            });
        }

        let symbols = generator.symbols().to_vec();
        let initialize_address = generator.initialize_address();
        let shade_address = generator.shade_address();
        let lanes_max = generator.lanes_max();
        let grid_memory_size = generator.grid_memory_size();
        let temporary_memory_size = generator.temporary_memory_size();
        let (constants, code) = generator.take_output();

        Ok(Self {
            symbols: symbols.iter().map(|&id| symbol_table.symbol(id).clone()).collect(),
            constants,
            code,
            initialize_address,
            shade_address,
            lanes_max,
            grid_memory_size,
            temporary_memory_size,
        })
    }

    /// Compiles a shader from a file.
    pub fn load_file(path: &str, errors: &mut dyn ErrorPolicy) -> Result<Self, CompileError> {
        let source = fs::read_to_string(path).map_err(|error| {
            errors.error(
                ErrorCode::OpeningFileFailed,
                &format!("Opening shader '{path}' failed: {error}"),
            );
            CompileError {
                code: ErrorCode::OpeningFileFailed,
            }
        })?;
        Self::load(&source, path, errors)
    }

    #[must_use]
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    #[must_use]
    pub fn symbol(&self, index: usize) -> &Symbol {
        &self.symbols[index]
    }

    #[must_use]
    pub fn find_symbol(&self, identifier: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.identifier() == identifier)
    }

    #[must_use]
    pub fn constants(&self) -> &[u8] {
        &self.constants
    }

    #[must_use]
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    #[must_use]
    pub fn initialize_address(&self) -> usize {
        self.initialize_address
    }

    #[must_use]
    pub fn shade_address(&self) -> usize {
        self.shade_address
    }

    #[must_use]
    pub fn end_address(&self) -> usize {
        self.code.len()
    }

    /// The lane capacity varying slots were laid out for.
    #[must_use]
    pub fn lanes_max(&self) -> usize {
        self.lanes_max
    }

    #[must_use]
    pub fn constant_memory_size(&self) -> usize {
        self.constants.len()
    }

    #[must_use]
    pub fn grid_memory_size(&self) -> u32 {
        self.grid_memory_size
    }

    #[must_use]
    pub fn temporary_memory_size(&self) -> u32 {
        self.temporary_memory_size
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        error::{CollectingErrorPolicy, SilentErrorPolicy},
        instruction::Opcode,
        value::{ValueStorage, ValueType},
    };

    use super::*;

    #[test]
    fn null_surface_shader_compiles() {
        let mut errors = CollectingErrorPolicy::default();
        let shader = Shader::load("surface null() { Ci = Cs; Oi = Os; }", "null.sl", &mut errors)
            .expect("shader compiles");
        assert_eq!(errors.total_errors(), 0, "{:?}", errors.diagnostics());
        assert!(shader.find_symbol("Ci").is_some());
        assert!(shader.shade_address() > shader.initialize_address());
        assert_eq!(shader.lanes_max(), 256);
    }

    #[test]
    fn both_entry_points_reach_halt() {
        let mut errors = SilentErrorPolicy::default();
        let shader = Shader::load(
            "surface s(float k = 0.5;) { Ci = Cs * k; }",
            "s.sl",
            &mut errors,
        )
        .expect("shader compiles");

        // The word before the shade entry point and the final word of the
        // program are both HALT.
        let word_at = |address: usize| shader.code()[address];
        assert_eq!(word_at(shader.shade_address() - 4), Opcode::Halt as u8);
        assert_eq!(word_at(shader.end_address() - 4), Opcode::Halt as u8);
    }

    #[test]
    fn parse_failure_surfaces_parsing_failed() {
        let mut errors = CollectingErrorPolicy::default();
        let result = Shader::load("surface { }", "broken.sl", &mut errors);
        assert_eq!(result.unwrap_err().code, ErrorCode::ParsingFailed);
        assert!(errors.contains(ErrorCode::SyntaxError));
    }

    #[test]
    fn semantic_failure_surfaces_analysis_failed() {
        let mut errors = CollectingErrorPolicy::default();
        let result = Shader::load("surface s() { Ci = nonsense; }", "broken.sl", &mut errors);
        assert_eq!(result.unwrap_err().code, ErrorCode::SemanticAnalysisFailed);
        assert!(errors.contains(ErrorCode::SemanticError));
    }

    #[test]
    fn break_outside_a_loop_fails_code_generation() {
        let mut errors = CollectingErrorPolicy::default();
        let result = Shader::load("surface s() { break; }", "broken.sl", &mut errors);
        assert_eq!(result.unwrap_err().code, ErrorCode::CodeGenerationFailed);
        assert!(errors.contains(ErrorCode::CodeGenerationError));
    }

    #[test]
    fn published_symbols_include_called_builtins() {
        let mut errors = SilentErrorPolicy::default();
        let shader = Shader::load("surface s() { Ci = Cs * random(); }", "s.sl", &mut errors)
            .expect("shader compiles");
        // The expected color context selects the vec3 generator.
        let random = shader.find_symbol("random").expect("random is published");
        assert!(random.is_function());
        assert_eq!(random.ty(), ValueType::Color);
        assert_eq!(random.storage(), ValueStorage::Varying);
    }

    #[test]
    fn grid_memory_covers_the_standard_surface_symbols() {
        let mut errors = SilentErrorPolicy::default();
        let shader = Shader::load("surface s() { Ci = Cs; }", "s.sl", &mut errors).expect("shader compiles");
        // P, N, I: 3 vec3; s, t: 2 floats; Ci, Oi, Cs, Os: 4 vec3, all
        // varying over 256 lanes.
        let expected: u32 = (3 * 12 + 2 * 4 + 4 * 12) * 256;
        assert_eq!(shader.grid_memory_size(), expected);
        assert!(shader.temporary_memory_size() >= shader.grid_memory_size());
    }
}
