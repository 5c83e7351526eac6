//! Code generation: lowers the analyzed syntax tree to byte code and lays
//! out the three memory segments.
//!
//! Three phases run over the tree. The constants phase writes every literal
//! and constant reference into the `CONSTANT` segment and records its
//! address on the node. The symbols phase enters the grid and parameter
//! scopes into the `GRID` segment (and string symbols into the `STRING`
//! table) and collects the shader's public symbol list. The code phase
//! walks statements emitting instructions; expression temporaries are
//! allocated from a stack whose base is saved and restored around every
//! statement, and each lexical scope is entered into the `TEMPORARY`
//! segment while its statements lower.

use crate::{
    address::{Address, Segment},
    ast::{NodeKind, SyntaxNode},
    encoder::{Encoder, PatchLabel},
    error::{ErrorCode, ErrorPolicy},
    instruction::Opcode,
    math3d::Vec3,
    symbol::SymbolId,
    symbol_table::SymbolTable,
    value::{ValueStorage, ValueType, size_by_type_and_storage},
};

/// The default lane capacity compiled into a shader.
pub const DEFAULT_LANES: usize = 256;

/// One recorded jump whose distance is patched when its loop closes.
struct Jump {
    /// The address the distance is relative to: just past the argument.
    address: usize,
    label: PatchLabel,
}

/// Fixup lists for one open loop, plus the static mask depths at its exit
/// points so `break` and `continue` can emit the unwinding `CLEAR_MASK`s.
struct Loop {
    begin: usize,
    continue_address: usize,
    end_mask_depth: usize,
    continue_mask_depth: usize,
    jumps_to_begin: Vec<Jump>,
    jumps_to_continue: Vec<Jump>,
    jumps_to_end: Vec<Jump>,
}

impl Loop {
    fn new(begin: usize, mask_depth: usize) -> Self {
        Self {
            begin,
            continue_address: begin,
            end_mask_depth: mask_depth,
            continue_mask_depth: mask_depth,
            jumps_to_begin: Vec::new(),
            jumps_to_continue: Vec::new(),
            jumps_to_end: Vec::new(),
        }
    }
}

/// Lowers one analyzed shader to byte code.
pub struct CodeGenerator<'a> {
    symbol_table: &'a mut SymbolTable,
    errors: &'a mut dyn ErrorPolicy,
    lanes_max: usize,
    initialize_address: usize,
    shade_address: usize,
    grid_memory_size: u32,
    temporary_memory_size: u32,
    error_count: usize,
    symbols: Vec<SymbolId>,
    loops: Vec<Loop>,
    encoder: Encoder,
    constant_data: Vec<u8>,
    temporary_addresses: Vec<u32>,
    offset: u32,
    mask_depth: usize,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(symbol_table: &'a mut SymbolTable, errors: &'a mut dyn ErrorPolicy) -> Self {
        Self {
            symbol_table,
            errors,
            lanes_max: DEFAULT_LANES,
            initialize_address: 0,
            shade_address: 0,
            grid_memory_size: 0,
            temporary_memory_size: 0,
            error_count: 0,
            symbols: Vec::new(),
            loops: Vec::new(),
            encoder: Encoder::new(),
            constant_data: Vec::new(),
            temporary_addresses: Vec::new(),
            offset: 0,
            mask_depth: 0,
        }
    }

    /// Generates code for the analyzed tree, reporting diagnostics against
    /// `name`. Returns the number of code generation errors.
    ///
    /// Entered in a failing state (or failing internally), the output is
    /// replaced by a minimal program of two `HALT`s so downstream consumers
    /// can still execute safely.
    pub fn generate(&mut self, root: &mut SyntaxNode, name: &str) -> usize {
        self.initialize_address = 0;
        self.shade_address = 0;
        self.grid_memory_size = 0;
        self.temporary_memory_size = 0;
        self.error_count = 0;
        self.symbols.clear();
        self.loops.clear();
        self.encoder.clear();
        self.constant_data.clear();
        self.temporary_addresses.clear();
        self.offset = 0;
        self.mask_depth = 0;

        if self.errors.total_errors() > 0 {
            self.generate_code_in_case_of_errors();
            return self.error_count;
        }

        self.generate_constants(root);
        self.generate_symbols(root);

        // Temporaries are addressed past the end of the grid segment.
        self.offset = self.grid_memory_size;
        self.temporary_memory_size = self.offset;

        self.initialize_address = self.encoder.address();
        self.generate_list(root.child(0).child(0));
        self.encoder.instruction(Opcode::Halt);

        self.shade_address = self.encoder.address();
        self.generate_list(root.child(0).child(1));
        self.encoder.instruction(Opcode::Halt);

        if self.error_count > 0 {
            self.generate_code_in_case_of_errors();
            self.errors.error(
                ErrorCode::CodeGenerationFailed,
                &format!("Generating code for shader '{name}' failed"),
            );
        }
        self.error_count
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
    pub fn lanes_max(&self) -> usize {
        self.lanes_max
    }

    #[must_use]
    pub fn grid_memory_size(&self) -> u32 {
        self.grid_memory_size
    }

    #[must_use]
    pub fn temporary_memory_size(&self) -> u32 {
        self.temporary_memory_size
    }

    #[must_use]
    pub fn symbols(&self) -> &[SymbolId] {
        &self.symbols
    }

    pub(crate) fn take_output(&mut self) -> (Vec<u8>, Vec<u8>) {
        (std::mem::take(&mut self.constant_data), self.encoder.take_code())
    }

    fn error(&mut self, condition: bool, line: usize, message: &str) {
        if condition {
            self.error_count += 1;
            self.errors
                .error(ErrorCode::CodeGenerationError, &format!("({line}): {message}"));
        }
    }

    fn generate_code_in_case_of_errors(&mut self) {
        self.symbols.clear();
        self.loops.clear();
        self.encoder.clear();
        self.initialize_address = self.encoder.address();
        self.encoder.instruction(Opcode::Halt);
        self.shade_address = self.encoder.address();
        self.encoder.instruction(Opcode::Halt);
    }

    // --- constants phase ---

    fn generate_constants(&mut self, node: &mut SyntaxNode) {
        match node.kind() {
            NodeKind::Integer | NodeKind::Real | NodeKind::String | NodeKind::Triple | NodeKind::Sixteentuple => {
                self.evaluate_constant_expression(node);
            }
            NodeKind::Identifier => {
                if let Some(symbol) = node.symbol() {
                    if self.symbol_table.symbol(symbol).storage() == ValueStorage::Constant {
                        let value = self.symbol_table.symbol(symbol).value();
                        let address = self.write_constant_float(value);
                        node.set_address(address);
                    }
                }
            }
            _ => {
                for child in node.children_mut() {
                    self.generate_constants(child);
                }
            }
        }
    }

    fn evaluate_constant_expression(&mut self, node: &mut SyntaxNode) {
        let address = match node.kind() {
            NodeKind::Integer | NodeKind::Real => self.write_constant_float(node.real()),
            NodeKind::String => self.write_constant_string(&node.lexeme().to_owned()),
            NodeKind::Triple => {
                let line = node.line();
                let mut values = [0.0f32; 3];
                for (value, child) in values.iter_mut().zip(node.children()) {
                    match Self::literal_float(child) {
                        Some(v) => *value = v,
                        None => self.error(true, line, "tuple elements must be literals"),
                    }
                }
                self.write_constant_vec3(Vec3::from_array(values))
            }
            NodeKind::Sixteentuple => {
                let line = node.line();
                let mut values = [0.0f32; 16];
                for (value, child) in values.iter_mut().zip(node.children()) {
                    match Self::literal_float(child) {
                        Some(v) => *value = v,
                        None => self.error(true, line, "tuple elements must be literals"),
                    }
                }
                self.write_constant_floats(&values)
            }
            _ => unreachable!("not a constant expression"),
        };
        node.set_address(address);
    }

    fn literal_float(node: &SyntaxNode) -> Option<f32> {
        match node.kind() {
            NodeKind::Integer | NodeKind::Real => Some(node.real()),
            NodeKind::Negate => Self::literal_float(node.child(0)).map(|v| -v),
            _ => None,
        }
    }

    fn write_constant_float(&mut self, value: f32) -> Address {
        self.write_constant(&value.to_le_bytes())
    }

    fn write_constant_vec3(&mut self, value: Vec3) -> Address {
        self.write_constant_floats(&value.to_array())
    }

    fn write_constant_floats(&mut self, values: &[f32]) -> Address {
        let offset = u32::try_from(self.constant_data.len()).expect("constant segment exceeds u32");
        for value in values {
            self.constant_data.extend_from_slice(&value.to_le_bytes());
        }
        Address::new(Segment::Constant, offset)
    }

    fn write_constant_string(&mut self, value: &str) -> Address {
        let mut bytes = value.as_bytes().to_vec();
        bytes.push(0);
        self.write_constant(&bytes)
    }

    fn write_constant(&mut self, bytes: &[u8]) -> Address {
        let offset = u32::try_from(self.constant_data.len()).expect("constant segment exceeds u32");
        self.constant_data.extend_from_slice(bytes);
        Address::new(Segment::Constant, offset)
    }

    // --- symbols phase ---

    fn generate_symbols(&mut self, root: &SyntaxNode) {
        let grid_scope = root.child(0).scope().expect("shader node has a scope");
        let parameters_scope = root.child(0).child(0).scope().expect("formals list has a scope");
        let global_scope = root.scope().expect("root has the global scope");

        let mut offset = self.symbol_table.enter(grid_scope, Segment::Grid, 0, self.lanes_max);
        let mut string_offset = self.symbol_table.enter_strings(grid_scope, 0);
        offset = self.symbol_table.enter(parameters_scope, Segment::Grid, offset, self.lanes_max);
        string_offset = self.symbol_table.enter_strings(parameters_scope, string_offset);
        offset = self.symbol_table.enter(global_scope, Segment::Grid, offset, self.lanes_max);
        let _ = self.symbol_table.enter_strings(global_scope, string_offset);

        for scope in [grid_scope, parameters_scope, global_scope] {
            for &id in self.symbol_table.scope(scope).symbols() {
                let segment = self.symbol_table.symbol(id).segment();
                if segment == Segment::Grid || segment == Segment::String {
                    self.symbols.push(id);
                }
            }
        }

        // Pre-registered symbols keep their addresses across compiles; the
        // grid segment must cover the furthest slot, not just this
        // shader's allocations.
        let mut end = offset;
        for &id in &self.symbols {
            let symbol = self.symbol_table.symbol(id);
            if symbol.segment() == Segment::Grid {
                let size = u32::try_from(symbol.size_by_type_and_storage(self.lanes_max)).expect("size exceeds u32");
                end = end.max(symbol.offset() + size);
            }
        }
        self.grid_memory_size = end;
    }

    /// Publishes a called function symbol, returning its index in the
    /// shader's symbol list.
    fn publish_function_symbol(&mut self, symbol: SymbolId) -> u32 {
        if let Some(index) = self.symbols.iter().position(|&s| s == symbol) {
            return u32::try_from(index).expect("symbol index exceeds u32");
        }
        self.symbols.push(symbol);
        u32::try_from(self.symbols.len() - 1).expect("symbol index exceeds u32")
    }

    // --- code phase ---

    fn generate_list(&mut self, node: &SyntaxNode) {
        let default_base = self.offset;
        if let Some(scope) = node.scope() {
            self.offset = self.symbol_table.enter(scope, Segment::Temporary, self.offset, self.lanes_max);
            self.temporary_memory_size = self.temporary_memory_size.max(self.offset);
        }

        for child in node.children() {
            self.push_address();
            self.generate_statement(child);
            self.pop_address();
        }

        if let Some(scope) = node.scope() {
            self.offset = self.symbol_table.leave(scope, default_base);
        }
    }

    fn generate_statement(&mut self, node: &SyntaxNode) {
        match node.kind() {
            NodeKind::List => self.generate_list(node),
            NodeKind::Variable => self.generate_variable(node),
            NodeKind::Call => {
                let _ = self.generate_call_expression(node);
            }
            NodeKind::Return => {}
            NodeKind::Break => self.generate_break_statement(node),
            NodeKind::Continue => self.generate_continue_statement(node),
            NodeKind::If => self.generate_if_statement(node),
            NodeKind::IfElse => self.generate_if_else_statement(node),
            NodeKind::While => self.generate_while_statement(node),
            NodeKind::For => self.generate_for_statement(node),
            NodeKind::Ambient => self.generate_ambient_statement(node),
            NodeKind::Solar => self.generate_solar_statement(node),
            NodeKind::Illuminate => self.generate_illuminate_statement(node),
            NodeKind::Illuminance => self.generate_illuminance_statement(node),
            NodeKind::Assign => {
                let _ = self.generate_assign(Opcode::Assign, node);
            }
            NodeKind::AddAssign => {
                let _ = self.generate_assign(Opcode::AddAssign, node);
            }
            NodeKind::SubtractAssign => {
                let _ = self.generate_assign(Opcode::SubtractAssign, node);
            }
            NodeKind::MultiplyAssign => {
                let _ = self.generate_assign(Opcode::MultiplyAssign, node);
            }
            NodeKind::DivideAssign => {
                let _ = self.generate_assign(Opcode::DivideAssign, node);
            }
            _ => self.error(true, node.line(), "unexpected statement in code generation"),
        }
    }

    /// A declaration lowers to an assignment when it has an initializer.
    fn generate_variable(&mut self, node: &SyntaxNode) {
        if node.child(0).kind() != NodeKind::Null {
            let _ = self.generate_assign(Opcode::Assign, node);
        }
    }

    fn generate_if_statement(&mut self, node: &SyntaxNode) {
        let default_base = self.offset;
        if let Some(scope) = node.scope() {
            self.offset = self.symbol_table.enter(scope, Segment::Temporary, self.offset, self.lanes_max);
            self.temporary_memory_size = self.temporary_memory_size.max(self.offset);
        }

        let expression = node.child(0);
        let mask = self.generate_expression(expression);
        self.push_address();
        self.emit_generate_mask(expression.storage(), mask);

        self.generate_statement(node.child(1));
        self.emit_clear_mask();
        self.pop_address();

        if let Some(scope) = node.scope() {
            self.offset = self.symbol_table.leave(scope, default_base);
        }
    }

    fn generate_if_else_statement(&mut self, node: &SyntaxNode) {
        let default_base = self.offset;
        if let Some(scope) = node.scope() {
            self.offset = self.symbol_table.enter(scope, Segment::Temporary, self.offset, self.lanes_max);
            self.temporary_memory_size = self.temporary_memory_size.max(self.offset);
        }

        let expression = node.child(0);
        let mask = self.generate_expression(expression);
        self.push_address();
        self.emit_generate_mask(expression.storage(), mask);

        self.generate_statement(node.child(1));
        self.encoder.instruction(Opcode::InvertMask);
        self.generate_statement(node.child(2));
        self.emit_clear_mask();
        self.pop_address();

        if let Some(scope) = node.scope() {
            self.offset = self.symbol_table.leave(scope, default_base);
        }
    }

    fn generate_while_statement(&mut self, node: &SyntaxNode) {
        let default_base = self.offset;
        if let Some(scope) = node.scope() {
            self.offset = self.symbol_table.enter(scope, Segment::Temporary, self.offset, self.lanes_max);
            self.temporary_memory_size = self.temporary_memory_size.max(self.offset);
        }

        self.push_loop();
        self.mark_loop_continue();

        self.push_address();
        let expression = node.child(0);
        let mask = self.generate_expression(expression);
        self.emit_generate_mask(expression.storage(), mask);
        self.pop_address();
        let exit = self.emit_jump(Opcode::JumpEmpty);

        self.push_address();
        self.generate_statement(node.child(1));
        self.pop_address();

        self.emit_clear_mask();
        self.jump_to_begin(Opcode::Jump, 1);

        // The exit path still holds the condition mask; clear it before
        // the loop-end label that break jumps target.
        self.patch_forward_jump(exit);
        self.encoder.instruction(Opcode::ClearMask);
        self.pop_loop();

        if let Some(scope) = node.scope() {
            self.offset = self.symbol_table.leave(scope, default_base);
        }
    }

    fn generate_for_statement(&mut self, node: &SyntaxNode) {
        let default_base = self.offset;
        if let Some(scope) = node.scope() {
            self.offset = self.symbol_table.enter(scope, Segment::Temporary, self.offset, self.lanes_max);
            self.temporary_memory_size = self.temporary_memory_size.max(self.offset);
        }

        self.push_address();
        self.generate_statement(node.child(0));
        self.pop_address();
        self.push_loop();

        self.push_address();
        let expression = node.child(1);
        let mask = self.generate_expression(expression);
        self.emit_generate_mask(expression.storage(), mask);
        self.pop_address();
        let exit = self.emit_jump(Opcode::JumpEmpty);

        self.push_address();
        self.generate_statement(node.child(3));
        self.pop_address();
        self.mark_loop_continue();

        self.push_address();
        self.generate_statement(node.child(2));
        self.pop_address();
        self.emit_clear_mask();
        self.jump_to_begin(Opcode::Jump, 1);

        self.patch_forward_jump(exit);
        self.encoder.instruction(Opcode::ClearMask);
        self.pop_loop();

        if let Some(scope) = node.scope() {
            self.offset = self.symbol_table.leave(scope, default_base);
        }
    }

    fn generate_ambient_statement(&mut self, node: &SyntaxNode) {
        let default_base = self.offset;
        if let Some(scope) = node.scope() {
            self.offset = self.symbol_table.enter(scope, Segment::Temporary, self.offset, self.lanes_max);
            self.temporary_memory_size = self.temporary_memory_size.max(self.offset);
        }

        let light_color = self.generate_expression(node.child(0));
        let light_opacity = self.generate_expression(node.child(1));
        self.encoder.instruction(Opcode::Ambient);
        self.encoder.argument(light_color);
        self.encoder.argument(light_opacity);

        if let Some(scope) = node.scope() {
            self.offset = self.symbol_table.leave(scope, default_base);
        }
    }

    fn generate_solar_statement(&mut self, node: &SyntaxNode) {
        let default_base = self.offset;
        if let Some(scope) = node.scope() {
            self.offset = self.symbol_table.enter(scope, Segment::Temporary, self.offset, self.lanes_max);
            self.temporary_memory_size = self.temporary_memory_size.max(self.offset);
        }

        let expressions = node.child(0);
        if expressions.children().is_empty() {
            self.encoder.instruction(Opcode::Solar);
        } else {
            let axis = self.generate_expression(expressions.child(0));
            let angle = self.generate_expression(expressions.child(1));
            let light_color = self.generate_expression(node.child(2));
            let light_opacity = self.generate_expression(node.child(3));
            self.encoder.instruction(Opcode::SolarAxisAngle);
            self.encoder.argument(axis);
            self.encoder.argument(angle);
            self.encoder.argument(light_color);
            self.encoder.argument(light_opacity);
        }

        self.generate_statement(node.child(1));

        if let Some(scope) = node.scope() {
            self.offset = self.symbol_table.leave(scope, default_base);
        }
    }

    fn generate_illuminate_statement(&mut self, node: &SyntaxNode) {
        let default_base = self.offset;
        if let Some(scope) = node.scope() {
            self.offset = self.symbol_table.enter(scope, Segment::Temporary, self.offset, self.lanes_max);
            self.temporary_memory_size = self.temporary_memory_size.max(self.offset);
        }

        let expressions = node.child(0);
        if expressions.children().len() == 1 {
            let position = self.generate_expression(expressions.child(0));
            let surface_position = self.generate_expression(node.child(2));
            let light_direction = self.generate_expression(node.child(3));
            let light_color = self.generate_expression(node.child(4));
            let light_opacity = self.generate_expression(node.child(5));
            self.encoder.instruction(Opcode::Illuminate);
            self.encoder.argument(position);
            self.encoder.argument(surface_position);
            self.encoder.argument(light_direction);
            self.encoder.argument(light_color);
            self.encoder.argument(light_opacity);
        } else {
            let position = self.generate_expression(expressions.child(0));
            let axis = self.generate_expression(expressions.child(1));
            let angle = self.generate_expression(expressions.child(2));
            let surface_position = self.generate_expression(node.child(2));
            let light_direction = self.generate_expression(node.child(3));
            let light_color = self.generate_expression(node.child(4));
            let light_opacity = self.generate_expression(node.child(5));
            self.encoder.instruction(Opcode::IlluminateAxisAngle);
            self.encoder.argument(position);
            self.encoder.argument(axis);
            self.encoder.argument(angle);
            self.encoder.argument(surface_position);
            self.encoder.argument(light_direction);
            self.encoder.argument(light_color);
            self.encoder.argument(light_opacity);
        }

        self.generate_statement(node.child(1));

        if let Some(scope) = node.scope() {
            self.offset = self.symbol_table.leave(scope, default_base);
        }
    }

    fn generate_illuminance_statement(&mut self, node: &SyntaxNode) {
        let default_base = self.offset;
        if let Some(scope) = node.scope() {
            self.offset = self.symbol_table.enter(scope, Segment::Temporary, self.offset, self.lanes_max);
            self.temporary_memory_size = self.temporary_memory_size.max(self.offset);
        }

        let expressions = node.child(0);
        self.push_loop();
        self.jump_to_end(Opcode::JumpIlluminance, 1);

        let position_node = expressions.child(0);
        let axis_node = expressions.child(1);
        let angle_node = expressions.child(2);

        let position = self.generate_expression(position_node);
        let axis = self.generate_expression(axis_node);
        let angle = self.generate_expression(angle_node);
        let light_direction = self.generate_expression(node.child(2));
        let light_color = self.generate_expression(node.child(3));
        let light_opacity = self.generate_expression(node.child(4));

        self.push_address();
        let mask = self.allocate_address(ValueType::Integer, ValueStorage::Varying);
        self.encoder.instruction3(
            Opcode::IlluminanceAxisAngle,
            (position_node.ty(), position_node.storage()),
            (axis_node.ty(), axis_node.storage()),
            (angle_node.ty(), angle_node.storage()),
        );
        self.encoder.argument(position);
        self.encoder.argument(axis);
        self.encoder.argument(angle);
        self.encoder.argument(light_direction);
        self.encoder.argument(light_color);
        self.encoder.argument(light_opacity);
        self.encoder.argument(mask);
        self.emit_generate_mask(ValueStorage::Varying, mask);
        self.pop_address();

        self.push_address();
        self.generate_statement(node.child(1));
        self.pop_address();

        self.emit_clear_mask();
        self.jump_to_begin(Opcode::Jump, 1);
        self.pop_loop();

        if let Some(scope) = node.scope() {
            self.offset = self.symbol_table.leave(scope, default_base);
        }
    }

    fn generate_break_statement(&mut self, node: &SyntaxNode) {
        let level = if node.children().is_empty() {
            1
        } else {
            node.child(0).integer()
        };
        let line = node.line();
        self.error(self.loops.is_empty(), line, "Break outside of a loop");
        self.error(level <= 0, line, "Break to a negative level");
        self.error(
            level > self.loops.len() as i32 && !self.loops.is_empty(),
            line,
            "Break to a level outside of a loop",
        );
        if level > 0 && level <= self.loops.len() as i32 {
            // Fires only when some active lane reaches it: skip over the
            // unwind and jump while the current mask is empty.
            let skip = self.emit_jump(Opcode::JumpEmpty);
            let target = self.loops[self.loops.len() - level as usize].end_mask_depth;
            self.emit_mask_unwind(target);
            self.jump_to_end(Opcode::Jump, level as usize);
            self.patch_forward_jump(skip);
        }
    }

    fn generate_continue_statement(&mut self, node: &SyntaxNode) {
        let level = if node.children().is_empty() {
            1
        } else {
            node.child(0).integer()
        };
        let line = node.line();
        self.error(self.loops.is_empty(), line, "Continue outside of a loop");
        self.error(level <= 0, line, "Continue to a negative level");
        self.error(
            level > self.loops.len() as i32 && !self.loops.is_empty(),
            line,
            "Continue to a level outside of a loop",
        );
        if level > 0 && level <= self.loops.len() as i32 {
            let skip = self.emit_jump(Opcode::JumpEmpty);
            let target = self.loops[self.loops.len() - level as usize].continue_mask_depth;
            self.emit_mask_unwind(target);
            self.jump_to_continue(Opcode::Jump, level as usize);
            self.patch_forward_jump(skip);
        }
    }

    fn generate_expression(&mut self, node: &SyntaxNode) -> Address {
        let address = match node.kind() {
            NodeKind::Call => self.generate_call_expression(node),
            NodeKind::Cross => {
                self.error(true, node.line(), "The '^' operator is not supported by code generation");
                Address::NULL
            }
            NodeKind::Dot
            | NodeKind::Multiply
            | NodeKind::Add
            | NodeKind::Subtract
            | NodeKind::Greater
            | NodeKind::GreaterEqual
            | NodeKind::Less
            | NodeKind::LessEqual
            | NodeKind::Equal
            | NodeKind::NotEqual
            | NodeKind::And
            | NodeKind::Or => self.generate_binary_expression(node),
            NodeKind::Divide => self.generate_divide_expression(node),
            NodeKind::Negate => self.generate_negate_expression(node),
            NodeKind::Ternary => self.generate_ternary_expression(node),
            NodeKind::Typecast => self.generate_typecast_expression(node),
            NodeKind::Assign => self.generate_assign(Opcode::Assign, node),
            NodeKind::AddAssign => self.generate_assign(Opcode::AddAssign, node),
            NodeKind::SubtractAssign => self.generate_assign(Opcode::SubtractAssign, node),
            NodeKind::MultiplyAssign => self.generate_assign(Opcode::MultiplyAssign, node),
            NodeKind::DivideAssign => self.generate_assign(Opcode::DivideAssign, node),
            NodeKind::Integer | NodeKind::Real | NodeKind::String | NodeKind::Triple | NodeKind::Sixteentuple => {
                node.address()
            }
            NodeKind::Texture => self.generate_vec3_texture_expression(node),
            NodeKind::Shadow => self.generate_shadow_expression(node),
            NodeKind::Environment => self.generate_vec3_environment_expression(node),
            NodeKind::Identifier => self.generate_identifier_expression(node),
            _ => {
                self.error(true, node.line(), "unexpected expression in code generation");
                Address::NULL
            }
        };
        let address = self.generate_convert(address, node);
        self.generate_promote(address, node)
    }

    fn generate_binary_expression(&mut self, node: &SyntaxNode) -> Address {
        let Some(instruction) = node.instruction() else {
            self.error(true, node.line(), "operator has no instruction");
            return Address::NULL;
        };
        let lhs = node.child(0);
        let rhs = node.child(1);
        let result = self.allocate_address(node.ty(), node.storage());
        let arg0 = self.generate_expression(lhs);
        let arg1 = self.generate_expression(rhs);
        self.encoder
            .instruction2(instruction, (lhs.ty(), lhs.storage()), (rhs.ty(), rhs.storage()));
        self.encoder.argument(result);
        self.encoder.argument(arg0);
        self.encoder.argument(arg1);
        result
    }

    fn generate_divide_expression(&mut self, node: &SyntaxNode) -> Address {
        let lhs = node.child(0);
        let rhs = node.child(1);
        let result = self.allocate_address(node.ty(), node.storage());
        let arg0 = self.generate_expression(lhs);
        let arg1 = self.generate_expression(rhs);
        self.encoder
            .instruction2(Opcode::Divide, (lhs.ty(), lhs.storage()), (rhs.ty(), rhs.storage()));
        self.encoder.argument(result);
        self.encoder.argument(arg0);
        self.encoder.argument(arg1);
        result
    }

    fn generate_negate_expression(&mut self, node: &SyntaxNode) -> Address {
        let result = self.allocate_address(node.ty(), node.storage());
        let arg0 = self.generate_expression(node.child(0));
        self.encoder.instruction1(Opcode::Negate, (node.ty(), node.storage()));
        self.encoder.argument(result);
        self.encoder.argument(arg0);
        result
    }

    /// No select instruction exists; a ternary lowers to an assignment of
    /// the else value followed by a masked assignment of the then value.
    fn generate_ternary_expression(&mut self, node: &SyntaxNode) -> Address {
        let condition = node.child(0);
        let then_node = node.child(1);
        let else_node = node.child(2);

        let result = self.allocate_address(node.ty(), node.storage());
        let else_address = self.generate_expression(else_node);
        self.encoder.instruction2(
            Opcode::Assign,
            (node.ty(), node.storage()),
            (else_node.ty(), else_node.storage()),
        );
        self.encoder.argument(result);
        self.encoder.argument(else_address);

        let mask = self.generate_expression(condition);
        self.emit_generate_mask(condition.storage(), mask);

        let then_address = self.generate_expression(then_node);
        self.encoder.instruction2(
            Opcode::Assign,
            (node.ty(), node.storage()),
            (then_node.ty(), then_node.storage()),
        );
        self.encoder.argument(result);
        self.encoder.argument(then_address);
        self.emit_clear_mask();
        result
    }

    fn generate_typecast_expression(&mut self, node: &SyntaxNode) -> Address {
        let value = node.child(1);
        match value.kind() {
            NodeKind::Texture => self.generate_texture_typecast_expression(node),
            NodeKind::Environment => self.generate_environment_typecast_expression(node),
            _ if value.ty().is_vec3() => self.generate_vec3_typecast_expression(node),
            _ if value.ty() == ValueType::Matrix => self.generate_mat4_typecast_expression(node),
            _ => self.generate_expression(value),
        }
    }

    /// A space-qualified vec3 typecast transforms the value from the named
    /// coordinate (or color) space; without a space it passes through.
    fn generate_vec3_typecast_expression(&mut self, node: &SyntaxNode) -> Address {
        let type_node = node.child(0);
        let value = node.child(1);
        if type_node.children().is_empty() {
            return self.generate_expression(value);
        }

        let arg0 = self.generate_expression(type_node.child(0));
        let arg1 = self.generate_expression(value);
        let instruction = match type_node.kind() {
            NodeKind::PointType => Opcode::TransformPoint,
            NodeKind::VectorType => Opcode::TransformVector,
            NodeKind::NormalType => Opcode::TransformNormal,
            NodeKind::ColorType => Opcode::TransformColor,
            _ => {
                self.error(true, node.line(), "invalid space-qualified typecast");
                return Address::NULL;
            }
        };
        let result = self.allocate_address(value.ty(), value.storage());
        self.encoder.instruction1(instruction, (value.ty(), value.storage()));
        self.encoder.argument(result);
        self.encoder.argument(arg0);
        self.encoder.argument(arg1);
        result
    }

    fn generate_mat4_typecast_expression(&mut self, node: &SyntaxNode) -> Address {
        let type_node = node.child(0);
        let value = node.child(1);
        if type_node.children().is_empty() {
            return self.generate_expression(value);
        }

        let arg0 = self.generate_expression(type_node.child(0));
        let arg1 = self.generate_expression(value);
        let result = self.allocate_address(value.ty(), value.storage());
        self.encoder
            .instruction1(Opcode::TransformMatrix, (value.ty(), value.storage()));
        self.encoder.argument(result);
        self.encoder.argument(arg0);
        self.encoder.argument(arg1);
        result
    }

    fn generate_texture_typecast_expression(&mut self, node: &SyntaxNode) -> Address {
        match node.child(0).kind() {
            NodeKind::FloatType => self.generate_float_texture_expression(node.child(1)),
            NodeKind::ColorType | NodeKind::PointType | NodeKind::VectorType | NodeKind::NormalType => {
                self.generate_vec3_texture_expression(node.child(1))
            }
            _ => {
                self.error(true, node.line(), "invalid texture typecast");
                Address::NULL
            }
        }
    }

    fn generate_environment_typecast_expression(&mut self, node: &SyntaxNode) -> Address {
        match node.child(0).kind() {
            NodeKind::FloatType => self.generate_float_environment_expression(node.child(1)),
            NodeKind::ColorType | NodeKind::PointType | NodeKind::VectorType | NodeKind::NormalType => {
                self.generate_vec3_environment_expression(node.child(1))
            }
            _ => {
                self.error(true, node.line(), "invalid environment typecast");
                Address::NULL
            }
        }
    }

    fn generate_texture_lookup(&mut self, node: &SyntaxNode, instruction: Opcode, result_type: ValueType) -> Address {
        let texture_name = node.child(0);
        let s = node.child(1);
        let t = node.child(2);
        let result = self.allocate_address(result_type, ValueStorage::Varying);
        let arg0 = self.generate_expression(texture_name);
        let arg1 = self.generate_expression(s);
        let arg2 = self.generate_expression(t);
        self.encoder.instruction3(
            instruction,
            (result_type, ValueStorage::Varying),
            (s.ty(), s.storage()),
            (t.ty(), t.storage()),
        );
        self.encoder.argument(result);
        self.encoder.argument(arg0);
        self.encoder.argument(arg1);
        self.encoder.argument(arg2);
        result
    }

    fn generate_float_texture_expression(&mut self, node: &SyntaxNode) -> Address {
        self.generate_texture_lookup(node, Opcode::FloatTexture, ValueType::Float)
    }

    fn generate_vec3_texture_expression(&mut self, node: &SyntaxNode) -> Address {
        self.generate_texture_lookup(node, Opcode::Vec3Texture, ValueType::Vector)
    }

    fn generate_environment_lookup(
        &mut self,
        node: &SyntaxNode,
        instruction: Opcode,
        result_type: ValueType,
    ) -> Address {
        let texture_name = node.child(0);
        let direction = node.child(1);
        let result = self.allocate_address(result_type, ValueStorage::Varying);
        let arg0 = self.generate_expression(texture_name);
        let arg1 = self.generate_expression(direction);
        self.encoder.instruction2(
            instruction,
            (result_type, ValueStorage::Varying),
            (direction.ty(), direction.storage()),
        );
        self.encoder.argument(result);
        self.encoder.argument(arg0);
        self.encoder.argument(arg1);
        result
    }

    fn generate_float_environment_expression(&mut self, node: &SyntaxNode) -> Address {
        self.generate_environment_lookup(node, Opcode::FloatEnvironment, ValueType::Float)
    }

    fn generate_vec3_environment_expression(&mut self, node: &SyntaxNode) -> Address {
        self.generate_environment_lookup(node, Opcode::Vec3Environment, ValueType::Vector)
    }

    fn generate_shadow_expression(&mut self, node: &SyntaxNode) -> Address {
        let texture_name = node.child(0);
        let position = node.child(1);
        let bias = node.child(2);
        let result = self.allocate_address(ValueType::Float, ValueStorage::Varying);
        let arg0 = self.generate_expression(texture_name);
        let arg1 = self.generate_expression(position);
        let arg2 = self.generate_expression(bias);
        self.encoder.instruction3(
            Opcode::Shadow,
            (ValueType::Float, ValueStorage::Varying),
            (position.ty(), position.storage()),
            (bias.ty(), bias.storage()),
        );
        self.encoder.argument(result);
        self.encoder.argument(arg0);
        self.encoder.argument(arg1);
        self.encoder.argument(arg2);
        result
    }

    fn generate_call_expression(&mut self, node: &SyntaxNode) -> Address {
        let Some(symbol) = node.symbol() else {
            self.error(true, node.line(), "call has no resolved symbol");
            return Address::NULL;
        };

        let result = self.allocate_address(node.ty(), node.storage());
        let arguments: Vec<Address> = node.children().iter().map(|child| self.generate_expression(child)).collect();

        let index = self.publish_function_symbol(symbol);
        let (ty, storage) = {
            let s = self.symbol_table.symbol(symbol);
            (s.ty(), s.storage())
        };
        self.encoder.instruction1(Opcode::Call, (ty, storage));
        self.encoder.argument_int(index.cast_signed());
        self.encoder
            .argument_int(i32::try_from(arguments.len()).expect("argument count exceeds i32"));
        self.encoder.argument(result);
        for argument in arguments {
            self.encoder.argument(argument);
        }
        result
    }

    fn generate_assign(&mut self, instruction: Opcode, node: &SyntaxNode) -> Address {
        let Some(symbol) = node.symbol() else {
            self.error(true, node.line(), "assignment has no resolved symbol");
            return Address::NULL;
        };
        let expression = node.child(0);
        let (symbol_type, symbol_storage, arg0) = {
            let s = self.symbol_table.symbol(symbol);
            (s.ty(), s.storage(), s.address())
        };
        let arg1 = self.generate_expression(expression);

        let instruction = if symbol_type == ValueType::String {
            Opcode::StringAssign
        } else {
            instruction
        };
        self.encoder.instruction2(
            instruction,
            (symbol_type, symbol_storage),
            (expression.ty(), expression.storage()),
        );
        self.encoder.argument(arg0);
        self.encoder.argument(arg1);
        arg1
    }

    /// Inserts a `CONVERT` when the analyzer marked this expression for
    /// type conversion. The original storage is used: promotion to varying
    /// happens after conversion, and converting with the promoted storage
    /// would wrongly treat the value as already varying.
    fn generate_convert(&mut self, address: Address, node: &SyntaxNode) -> Address {
        if node.original_type() == ValueType::Null || node.original_type() == node.ty() {
            return address;
        }
        let mut storage = node.original_storage();
        if storage == ValueStorage::Null {
            storage = node.storage();
        }
        let result = self.allocate_address(node.ty(), storage);
        self.encoder
            .instruction2(Opcode::Convert, (node.ty(), storage), (node.original_type(), storage));
        self.encoder.argument(result);
        self.encoder.argument(address);
        result
    }

    /// Inserts a `PROMOTE` when the analyzer marked this expression for
    /// storage promotion to varying.
    fn generate_promote(&mut self, address: Address, node: &SyntaxNode) -> Address {
        if node.original_storage() == ValueStorage::Null {
            return address;
        }
        let result = self.allocate_address(node.ty(), node.storage());
        self.encoder.instruction2(
            Opcode::Promote,
            (node.ty(), node.storage()),
            (node.ty(), node.original_storage()),
        );
        self.encoder.argument(result);
        self.encoder.argument(address);
        result
    }

    fn generate_identifier_expression(&mut self, node: &SyntaxNode) -> Address {
        let Some(symbol) = node.symbol() else {
            self.error(true, node.line(), "identifier has no resolved symbol");
            return Address::NULL;
        };
        if self.symbol_table.symbol(symbol).storage() == ValueStorage::Constant {
            return node.address();
        }
        self.symbol_table.symbol(symbol).address()
    }

    // --- masks, loops, and temporaries ---

    /// Emits `GENERATE_MASK` on `mask` and tracks the static mask depth.
    fn emit_generate_mask(&mut self, storage: ValueStorage, mask: Address) {
        self.encoder.instruction1(Opcode::GenerateMask, (ValueType::Integer, storage));
        self.encoder.argument(mask);
        self.mask_depth += 1;
    }

    /// Emits the `CLEAR_MASK` that closes the innermost mask.
    fn emit_clear_mask(&mut self) {
        self.encoder.instruction(Opcode::ClearMask);
        self.mask_depth -= 1;
    }

    /// Emits the `CLEAR_MASK`s that unwind from the current static mask
    /// depth down to `target_depth`. Used on `break` and `continue` paths,
    /// where the clears execute only when the jump is taken, so the
    /// tracked depth is left unchanged.
    fn emit_mask_unwind(&mut self, target_depth: usize) {
        for _ in target_depth..self.mask_depth {
            self.encoder.instruction(Opcode::ClearMask);
        }
    }

    fn push_loop(&mut self) {
        let begin = self.encoder.address();
        self.loops.push(Loop::new(begin, self.mask_depth));
    }

    fn pop_loop(&mut self) {
        let loop_ = self.loops.pop().expect("loop stack is not empty");
        let end = self.encoder.address();
        for jump in loop_.jumps_to_begin {
            self.patch_jump(jump, loop_.begin);
        }
        for jump in loop_.jumps_to_continue {
            self.patch_jump(jump, loop_.continue_address);
        }
        for jump in loop_.jumps_to_end {
            self.patch_jump(jump, end);
        }
    }

    fn patch_jump(&mut self, jump: Jump, target: usize) {
        let distance =
            i32::try_from(target.cast_signed() - jump.address.cast_signed()).expect("jump distance exceeds i32");
        self.encoder.patch_argument(jump.label, distance);
    }

    fn mark_loop_continue(&mut self) {
        let address = self.encoder.address();
        let mask_depth = self.mask_depth;
        let loop_ = self.loops.last_mut().expect("loop stack is not empty");
        loop_.continue_address = address;
        loop_.continue_mask_depth = mask_depth;
    }

    fn jump_to_begin(&mut self, instruction: Opcode, level: usize) {
        let jump = self.emit_jump(instruction);
        let index = self.loops.len() - level;
        self.loops[index].jumps_to_begin.push(jump);
    }

    fn jump_to_continue(&mut self, instruction: Opcode, level: usize) {
        let jump = self.emit_jump(instruction);
        let index = self.loops.len() - level;
        self.loops[index].jumps_to_continue.push(jump);
    }

    fn jump_to_end(&mut self, instruction: Opcode, level: usize) {
        let jump = self.emit_jump(instruction);
        let index = self.loops.len() - level;
        self.loops[index].jumps_to_end.push(jump);
    }

    fn emit_jump(&mut self, instruction: Opcode) -> Jump {
        self.encoder.instruction(instruction);
        let label = self.encoder.argument_for_patching();
        let address = self.encoder.address();
        Jump { address, label }
    }

    /// Patches a locally managed forward jump to the current address.
    fn patch_forward_jump(&mut self, jump: Jump) {
        let target = self.encoder.address();
        self.patch_jump(jump, target);
    }

    fn allocate_address(&mut self, ty: ValueType, storage: ValueStorage) -> Address {
        let offset = self.offset;
        let size = u32::try_from(size_by_type_and_storage(ty, storage, self.lanes_max)).expect("size exceeds u32");
        self.offset += size;
        self.temporary_memory_size = self.temporary_memory_size.max(self.offset);
        Address::new(Segment::Temporary, offset)
    }

    fn push_address(&mut self) {
        self.temporary_addresses.push(self.offset);
    }

    fn pop_address(&mut self) {
        self.offset = self.temporary_addresses.pop().expect("temporary address stack is not empty");
    }
}
