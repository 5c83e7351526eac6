//! Semantic analysis: identifier resolution, type inference, implicit
//! conversion and storage promotion, overload validation, and placement
//! checks for the lighting statements.
//!
//! The walk makes two passes over each node. The expectation pass flows
//! `(expected type, expected storage)` down from parents before children
//! are visited: assignments push the target symbol's type and storage,
//! typecasts push their declared type, and binary operators forward the
//! enclosing expectation. The resolution pass then computes each node's
//! actual `(type, storage)` bottom-up, attaching symbols and resolved
//! instructions and inserting conversion and promotion markers that the
//! code generator lowers to `CONVERT` and `PROMOTE`.

use crate::{
    ast::{NodeKind, SyntaxNode},
    error::{ErrorCode, ErrorPolicy},
    instruction::Opcode,
    symbol_table::SymbolTable,
    value::{ValueStorage, ValueType},
};

const INTEGER: u16 = 1 << ValueType::Integer as u16;
const FLOAT: u16 = 1 << ValueType::Float as u16;
const COLOR: u16 = 1 << ValueType::Color as u16;
const POINT: u16 = 1 << ValueType::Point as u16;
const VECTOR: u16 = 1 << ValueType::Vector as u16;
const NORMAL: u16 = 1 << ValueType::Normal as u16;
const MATRIX: u16 = 1 << ValueType::Matrix as u16;
const STRING: u16 = 1 << ValueType::String as u16;

/// One permitted `(lhs, rhs)` combination for an operator: bitmasks of
/// accepted types, the result type, and the instruction to generate.
struct OperationMetadata {
    lhs: u16,
    rhs: u16,
    result: ValueType,
    instruction: Option<Opcode>,
}

const fn row(lhs: u16, rhs: u16, result: ValueType, instruction: Option<Opcode>) -> OperationMetadata {
    OperationMetadata {
        lhs,
        rhs,
        result,
        instruction,
    }
}

fn find_metadata(table: &[OperationMetadata], lhs: ValueType, rhs: ValueType) -> Option<&OperationMetadata> {
    let lhs_bit = 1u16 << lhs as u16;
    let rhs_bit = 1u16 << rhs as u16;
    table
        .iter()
        .find(|metadata| metadata.lhs & lhs_bit != 0 && metadata.rhs & rhs_bit != 0)
}

/// Walks the syntax tree, resolving and annotating it in place.
pub struct SemanticAnalyzer<'a> {
    symbol_table: &'a mut SymbolTable,
    errors: &'a mut dyn ErrorPolicy,
    error_count: usize,
}

impl<'a> SemanticAnalyzer<'a> {
    pub fn new(symbol_table: &'a mut SymbolTable, errors: &'a mut dyn ErrorPolicy) -> Self {
        Self {
            symbol_table,
            errors,
            error_count: 0,
        }
    }

    /// Analyzes the tree rooted at the parser's list node, reporting
    /// diagnostics against `name`. Returns the number of semantic errors.
    pub fn analyze(&mut self, root: &mut SyntaxNode, name: &str) -> usize {
        self.error_count = 0;
        root.set_scope(self.symbol_table.global_scope());
        if !root.children().is_empty() {
            self.analyze_ambient_lighting(root.child(0));
            self.analyze_node(root.child_mut(0));
        }
        if self.error_count > 0 {
            self.errors.error(
                ErrorCode::SemanticAnalysisFailed,
                &format!("Analysis of shader '{name}' failed"),
            );
        }
        self.error_count
    }

    fn error(&mut self, condition: bool, line: usize, message: &str) {
        if condition {
            self.error_count += 1;
            self.errors
                .error(ErrorCode::SemanticError, &format!("({line}): {message}"));
        }
    }

    /// A light shader that assigns `Cl` or `Ol` at its top level is an
    /// ambient light and may not also contain `solar` or `illuminate`.
    fn analyze_ambient_lighting(&mut self, shader: &SyntaxNode) {
        if shader.kind() != NodeKind::LightShader {
            return;
        }
        let mut ambient_assignments = 0;
        let mut solar_statements = 0;
        let mut illuminate_statements = 0;
        for statement in shader.child(1).children() {
            if statement.kind().is_assignment() && (statement.lexeme() == "Cl" || statement.lexeme() == "Ol") {
                ambient_assignments += 1;
            }
            solar_statements += usize::from(statement.kind() == NodeKind::Solar);
            illuminate_statements += usize::from(statement.kind() == NodeKind::Illuminate);
        }
        if ambient_assignments > 0 {
            self.error(
                solar_statements > 0,
                shader.line(),
                "Illegal assignment to 'Cl' or 'Ol' with solar statements",
            );
            self.error(
                illuminate_statements > 0,
                shader.line(),
                "Illegal assignment to 'Cl' or 'Ol' with illuminate statements",
            );
        }
    }

    fn analyze_nodes(&mut self, node: &mut SyntaxNode) {
        for child in node.children_mut() {
            self.analyze_node(child);
        }
    }

    fn analyze_node(&mut self, node: &mut SyntaxNode) {
        // Expectation pass: flow expected type and storage to children.
        match node.kind() {
            NodeKind::Variable => self.analyze_variable_expectations(node),
            kind if kind.is_assignment() => self.analyze_assign_expectations(node),
            NodeKind::Typecast => Self::analyze_typecast_expectations(node),
            NodeKind::Dot
            | NodeKind::Cross
            | NodeKind::Multiply
            | NodeKind::Divide
            | NodeKind::Add
            | NodeKind::Subtract
            | NodeKind::Greater
            | NodeKind::GreaterEqual
            | NodeKind::Less
            | NodeKind::LessEqual
            | NodeKind::Equal
            | NodeKind::NotEqual
            | NodeKind::And
            | NodeKind::Or
            | NodeKind::Negate
            | NodeKind::Ternary => Self::analyze_expectations(node),
            _ => {}
        }

        // Resolution pass.
        match node.kind() {
            NodeKind::LightShader => self.analyze_light_shader(node),
            NodeKind::SurfaceShader => self.analyze_kind_shader(node, |b| b.surface_symbols()),
            NodeKind::VolumeShader => self.analyze_kind_shader(node, |b| b.volume_symbols()),
            NodeKind::DisplacementShader => self.analyze_kind_shader(node, |b| b.displacement_symbols()),
            NodeKind::ImagerShader => self.analyze_kind_shader(node, |b| b.imager_symbols()),
            NodeKind::Variable => self.analyze_variable(node),
            NodeKind::Call => self.analyze_call(node),
            NodeKind::If | NodeKind::IfElse => self.analyze_if_statement(node),
            NodeKind::While => self.analyze_while_statement(node),
            NodeKind::For => self.analyze_for_statement(node),
            NodeKind::Solar => self.analyze_solar_statement(node),
            NodeKind::Illuminate => self.analyze_illuminate_statement(node),
            NodeKind::Illuminance => self.analyze_illuminance_statement(node),
            kind if kind.is_assignment() => self.analyze_assign(node),
            NodeKind::Dot => self.analyze_dot(node),
            NodeKind::Cross => self.analyze_cross(node),
            NodeKind::Multiply => self.analyze_multiply(node),
            NodeKind::Divide => self.analyze_divide(node),
            NodeKind::Add => self.analyze_add(node),
            NodeKind::Subtract => self.analyze_subtract(node),
            NodeKind::Greater => self.analyze_compare(node, Opcode::Greater, ">"),
            NodeKind::GreaterEqual => self.analyze_compare(node, Opcode::GreaterEqual, ">="),
            NodeKind::Less => self.analyze_compare(node, Opcode::Less, "<"),
            NodeKind::LessEqual => self.analyze_compare(node, Opcode::LessEqual, "<="),
            NodeKind::Equal => self.analyze_equality(node, Opcode::Equal, "=="),
            NodeKind::NotEqual => self.analyze_equality(node, Opcode::NotEqual, "!="),
            NodeKind::And => self.analyze_logical(node, Opcode::And, "&&"),
            NodeKind::Or => self.analyze_logical(node, Opcode::Or, "||"),
            NodeKind::Negate => self.analyze_negate(node),
            NodeKind::Ternary => self.analyze_ternary(node),
            NodeKind::Typecast => self.analyze_typecast(node),
            NodeKind::Identifier => self.analyze_identifier(node),
            NodeKind::Integer | NodeKind::Real | NodeKind::String | NodeKind::Triple | NodeKind::Sixteentuple => {
                self.analyze_literal(node);
            }
            NodeKind::Texture => self.analyze_texture_lookup(node, ValueType::Color),
            NodeKind::Shadow => self.analyze_texture_lookup(node, ValueType::Float),
            NodeKind::Environment => self.analyze_texture_lookup(node, ValueType::Color),
            _ => {
                self.analyze_nodes(node);
                node.set_type(ValueType::Null);
                node.set_storage(ValueStorage::Null);
            }
        }
    }

    fn analyze_variable_expectations(&mut self, variable: &mut SyntaxNode) {
        let storage = Self::storage_from_node(variable.child(1));
        let ty = Self::type_from_node(variable.child(2));
        self.error(
            ty == ValueType::Null,
            variable.line(),
            &format!("variable '{}' has no type", variable.lexeme()),
        );

        let symbol = self.symbol_table.add_symbol(variable.lexeme());
        self.symbol_table.symbol_mut(symbol).set_storage(storage);
        self.symbol_table.symbol_mut(symbol).set_type(ty);

        variable.set_symbol(symbol);
        variable.set_type(ty);
        variable.set_storage(storage);

        self.analyze_assign_expectations(variable);
    }

    /// Assignments inherit the target symbol's type and storage as the
    /// expectation for their expression.
    fn analyze_assign_expectations(&mut self, assign: &mut SyntaxNode) {
        if assign.symbol().is_none() {
            match self.symbol_table.find_symbol(assign.lexeme()) {
                Some(symbol) => assign.set_symbol(symbol),
                None => {
                    let line = assign.line();
                    let message = format!("Unrecognized symbol '{}' in assignment", assign.lexeme());
                    self.error(true, line, &message);
                }
            }
        }
        if let Some(symbol) = assign.symbol() {
            let expected_type = self.symbol_table.symbol(symbol).ty();
            let expected_storage = self.symbol_table.symbol(symbol).storage();
            for child in assign.children_mut() {
                child.set_expected_type(expected_type);
                child.set_expected_storage(expected_storage);
            }
        }
    }

    fn analyze_typecast_expectations(node: &mut SyntaxNode) {
        let expected_type = Self::type_from_node(node.child(0));
        let expected_storage = node.expected_storage();
        for child in node.children_mut() {
            child.set_expected_type(expected_type);
            child.set_expected_storage(expected_storage);
        }
    }

    fn analyze_expectations(node: &mut SyntaxNode) {
        let expected_type = node.expected_type();
        let expected_storage = node.expected_storage();
        for child in node.children_mut() {
            child.set_expected_type(expected_type);
            child.set_expected_storage(expected_storage);
        }
    }

    fn analyze_light_shader(&mut self, shader: &mut SyntaxNode) {
        let scope = self.symbol_table.push_scope();
        shader.set_scope(scope);
        let _ = self.symbol_table.add_symbols().light_symbols();
        self.analyze_shader(shader);

        // A light shader with neither solar nor illuminate statements is an
        // ambient light: prepend an implicit ambient(Cl, Ol).
        let solar = shader.count_by_kind(NodeKind::Solar);
        let illuminate = shader.count_by_kind(NodeKind::Illuminate);
        if solar == 0 && illuminate == 0 {
            let line = shader.line();
            let mut ambient = SyntaxNode::new(NodeKind::Ambient, line);
            for identifier in ["Cl", "Ol"] {
                let mut node = SyntaxNode::with_lexeme(NodeKind::Identifier, line, identifier);
                if let Some(symbol) = self.symbol_table.find_symbol(identifier) {
                    node.set_symbol(symbol);
                }
                ambient.add_node(node);
            }
            shader.child_mut(1).add_node_at_front(ambient);
        }

        self.symbol_table.pop_scope();
    }

    fn analyze_kind_shader(
        &mut self,
        shader: &mut SyntaxNode,
        register: impl FnOnce(crate::symbol_table::SymbolBuilder<'_>) -> crate::symbol_table::SymbolBuilder<'_>,
    ) {
        let scope = self.symbol_table.push_scope();
        shader.set_scope(scope);
        let _ = register(self.symbol_table.add_symbols());
        self.analyze_shader(shader);
        self.symbol_table.pop_scope();
    }

    fn analyze_shader(&mut self, shader: &mut SyntaxNode) {
        let symbol = self.symbol_table.add_symbol(shader.lexeme());
        shader.set_symbol(symbol);

        let parameters_scope = self.symbol_table.push_scope();
        shader.child_mut(0).set_scope(parameters_scope);
        self.analyze_nodes(shader.child_mut(0));

        let statements_scope = self.symbol_table.push_scope();
        shader.child_mut(1).set_scope(statements_scope);
        self.analyze_nodes(shader.child_mut(1));

        self.symbol_table.pop_scope();
        self.symbol_table.pop_scope();
    }

    fn analyze_variable(&mut self, variable: &mut SyntaxNode) {
        self.analyze_assign(variable);
        let Some(symbol) = variable.symbol() else { return };
        let expression_storage = variable.child(0).storage();
        if self.symbol_table.symbol(symbol).storage() == ValueStorage::Null {
            self.symbol_table
                .symbol_mut(symbol)
                .set_storage(expression_storage.max(ValueStorage::Uniform));
        }
        let assigning_varying_to_uniform =
            self.symbol_table.symbol(symbol).storage() == ValueStorage::Uniform && variable.child(0).is_varying();
        let line = variable.line();
        let message = format!("Varying assignment to uniform '{}'", variable.lexeme());
        self.error(assigning_varying_to_uniform, line, &message);
    }

    fn analyze_assign(&mut self, node: &mut SyntaxNode) {
        const ASSIGNMENT_METADATA: &[OperationMetadata] = &[
            row(INTEGER, INTEGER, ValueType::Null, None),
            row(FLOAT, FLOAT, ValueType::Null, None),
            row(COLOR, FLOAT | COLOR, ValueType::Null, None),
            row(
                POINT | VECTOR | NORMAL,
                FLOAT | POINT | VECTOR | NORMAL,
                ValueType::Null,
                None,
            ),
            row(MATRIX, FLOAT | MATRIX, ValueType::Null, None),
            row(STRING, STRING, ValueType::Null, None),
        ];

        self.analyze_nodes(node);
        let Some(symbol) = node.symbol() else { return };

        let symbol_type = self.symbol_table.symbol(symbol).ty();
        let symbol_storage = self.symbol_table.symbol(symbol).storage();
        let metadata = find_metadata(ASSIGNMENT_METADATA, symbol_type, node.child(0).ty());
        let line = node.line();
        let invalid = metadata.is_none() && node.child(0).kind() != NodeKind::Null;
        let message = format!("Invalid types in assignment to '{}'", node.lexeme());
        self.error(invalid, line, &message);
        let constant = symbol_storage == ValueStorage::Constant;
        let message = format!(
            "Assignment to constant '{}'",
            self.symbol_table.symbol(symbol).identifier()
        );
        self.error(constant, line, &message);

        Self::analyze_type_conversion(node.child_mut(0), symbol_type);
        Self::analyze_storage_promotion(node.child_mut(0), symbol_storage);
        node.set_type(symbol_type);
        node.set_storage(symbol_storage);
    }

    fn analyze_dot(&mut self, node: &mut SyntaxNode) {
        const DOT_METADATA: &[OperationMetadata] = &[
            row(COLOR, COLOR, ValueType::Float, Some(Opcode::Dot)),
            row(
                POINT | VECTOR | NORMAL,
                POINT | VECTOR | NORMAL,
                ValueType::Float,
                Some(Opcode::Dot),
            ),
        ];
        self.analyze_nodes(node);
        self.analyze_binary_operator(DOT_METADATA, ".", node);
    }

    fn analyze_cross(&mut self, node: &mut SyntaxNode) {
        const CROSS_METADATA: &[OperationMetadata] = &[row(
            POINT | VECTOR | NORMAL,
            POINT | VECTOR | NORMAL,
            ValueType::Vector,
            None,
        )];
        self.analyze_nodes(node);
        self.analyze_binary_operator(CROSS_METADATA, "^", node);
    }

    fn analyze_multiply(&mut self, node: &mut SyntaxNode) {
        const MULTIPLY_METADATA: &[OperationMetadata] = &[
            row(FLOAT, FLOAT, ValueType::Float, Some(Opcode::Multiply)),
            row(COLOR, COLOR, ValueType::Color, Some(Opcode::Multiply)),
            row(POINT, POINT, ValueType::Point, Some(Opcode::Multiply)),
            row(
                POINT | NORMAL | VECTOR,
                POINT | NORMAL | VECTOR,
                ValueType::Vector,
                Some(Opcode::Multiply),
            ),
            row(MATRIX, MATRIX, ValueType::Matrix, Some(Opcode::Multiply)),
        ];
        self.analyze_nodes(node);
        self.analyze_binary_operator(MULTIPLY_METADATA, "*", node);
    }

    /// Division does not convert its operands to a common type; each side
    /// is only promoted to the other's storage.
    fn analyze_divide(&mut self, node: &mut SyntaxNode) {
        const DIVIDE_METADATA: &[OperationMetadata] = &[
            row(FLOAT, FLOAT, ValueType::Float, Some(Opcode::Divide)),
            row(COLOR, FLOAT, ValueType::Color, Some(Opcode::Divide)),
            row(POINT, FLOAT, ValueType::Point, Some(Opcode::Divide)),
            row(NORMAL, FLOAT, ValueType::Normal, Some(Opcode::Divide)),
            row(VECTOR, FLOAT, ValueType::Vector, Some(Opcode::Divide)),
            row(FLOAT, MATRIX, ValueType::Matrix, Some(Opcode::Divide)),
            row(MATRIX, MATRIX, ValueType::Matrix, Some(Opcode::Divide)),
        ];

        self.analyze_nodes(node);
        let rhs_storage = node.child(1).storage();
        Self::analyze_storage_promotion(node.child_mut(0), rhs_storage);
        let lhs_storage = node.child(0).storage();
        Self::analyze_storage_promotion(node.child_mut(1), lhs_storage);

        let metadata = find_metadata(DIVIDE_METADATA, node.child(0).ty(), node.child(1).ty());
        self.error(metadata.is_none(), node.line(), "Invalid arguments to '/' operator");
        if let Some(metadata) = metadata {
            node.set_type(metadata.result);
            node.set_storage(node.child(0).storage().max(node.child(1).storage()));
            node.set_instruction(Opcode::Divide);
        }
    }

    fn analyze_add(&mut self, node: &mut SyntaxNode) {
        const ADD_METADATA: &[OperationMetadata] = &[
            row(FLOAT, FLOAT, ValueType::Float, Some(Opcode::Add)),
            row(COLOR, COLOR, ValueType::Color, Some(Opcode::Add)),
            row(VECTOR | NORMAL, VECTOR | NORMAL, ValueType::Vector, Some(Opcode::Add)),
            row(
                POINT | VECTOR | NORMAL,
                POINT | VECTOR | NORMAL,
                ValueType::Point,
                Some(Opcode::Add),
            ),
            row(MATRIX, MATRIX, ValueType::Matrix, Some(Opcode::Add)),
        ];
        self.analyze_nodes(node);
        self.analyze_binary_operator(ADD_METADATA, "+", node);
    }

    fn analyze_subtract(&mut self, node: &mut SyntaxNode) {
        const SUBTRACT_METADATA: &[OperationMetadata] = &[
            row(FLOAT, FLOAT, ValueType::Float, Some(Opcode::Subtract)),
            row(COLOR, COLOR, ValueType::Color, Some(Opcode::Subtract)),
            row(
                POINT | NORMAL | VECTOR,
                POINT | NORMAL | VECTOR,
                ValueType::Vector,
                Some(Opcode::Subtract),
            ),
            row(MATRIX, MATRIX, ValueType::Matrix, Some(Opcode::Subtract)),
        ];
        self.analyze_nodes(node);
        self.analyze_binary_operator(SUBTRACT_METADATA, "-", node);
    }

    /// Ordering comparisons are float-only and produce an integer mask.
    fn analyze_compare(&mut self, node: &mut SyntaxNode, instruction: Opcode, name: &str) {
        let metadata = [row(FLOAT, FLOAT, ValueType::Integer, Some(instruction))];
        self.analyze_nodes(node);
        self.analyze_binary_operator(&metadata, name, node);
    }

    /// Equality accepts every value type and produces an integer mask.
    fn analyze_equality(&mut self, node: &mut SyntaxNode, instruction: Opcode, name: &str) {
        let metadata = [
            row(FLOAT, FLOAT, ValueType::Integer, Some(instruction)),
            row(COLOR, COLOR, ValueType::Integer, Some(instruction)),
            row(
                POINT | NORMAL | VECTOR,
                POINT | NORMAL | VECTOR,
                ValueType::Integer,
                Some(instruction),
            ),
            row(MATRIX, MATRIX, ValueType::Integer, Some(instruction)),
            row(STRING, STRING, ValueType::Integer, Some(instruction)),
        ];
        self.analyze_nodes(node);
        self.analyze_binary_operator(&metadata, name, node);
    }

    fn analyze_logical(&mut self, node: &mut SyntaxNode, instruction: Opcode, name: &str) {
        let metadata = [row(INTEGER, INTEGER, ValueType::Integer, Some(instruction))];
        self.analyze_nodes(node);
        self.analyze_binary_operator(&metadata, name, node);
    }

    fn analyze_negate(&mut self, node: &mut SyntaxNode) {
        self.analyze_nodes(node);
        node.set_type(node.child(0).ty());
        node.set_storage(node.child(0).storage());
    }

    fn analyze_ternary(&mut self, node: &mut SyntaxNode) {
        const TERNARY_METADATA: &[OperationMetadata] = &[
            row(FLOAT, FLOAT, ValueType::Float, None),
            row(COLOR, COLOR, ValueType::Color, None),
            row(VECTOR | NORMAL, VECTOR | NORMAL, ValueType::Vector, None),
            row(POINT | VECTOR | NORMAL, POINT | VECTOR | NORMAL, ValueType::Point, None),
            row(MATRIX, MATRIX, ValueType::Matrix, None),
        ];
        self.analyze_nodes(node);
        let metadata = find_metadata(TERNARY_METADATA, node.child(1).ty(), node.child(2).ty());
        self.error(metadata.is_none(), node.line(), "Invalid arguments to ternary operator");
        if let Some(metadata) = metadata {
            node.set_type(metadata.result);
            node.set_storage(node.child(1).storage().max(node.child(2).storage()));
        }
    }

    fn analyze_typecast(&mut self, node: &mut SyntaxNode) {
        self.analyze_nodes(node);
        node.set_type(Self::type_from_node(node.child(0)));
        node.set_storage(node.child(1).storage());
        let ty = node.ty();
        Self::analyze_type_conversion(node.child_mut(1), ty);
    }

    fn analyze_identifier(&mut self, node: &mut SyntaxNode) {
        self.analyze_nodes(node);
        match self.symbol_table.find_symbol(node.lexeme()) {
            Some(symbol) => {
                node.set_symbol(symbol);
                node.set_type(self.symbol_table.symbol(symbol).ty());
                node.set_storage(self.symbol_table.symbol(symbol).storage());
            }
            None => {
                let line = node.line();
                let message = format!("Unrecognized symbol '{}'", node.lexeme());
                self.error(true, line, &message);
            }
        }
    }

    fn analyze_literal(&mut self, node: &mut SyntaxNode) {
        self.analyze_nodes(node);
        let ty = match node.kind() {
            NodeKind::Integer | NodeKind::Real => ValueType::Float,
            NodeKind::String => ValueType::String,
            NodeKind::Triple => ValueType::Vector,
            NodeKind::Sixteentuple => ValueType::Matrix,
            _ => unreachable!("not a literal node"),
        };
        node.set_type(ty);
        node.set_storage(ValueStorage::Constant);
    }

    fn analyze_texture_lookup(&mut self, node: &mut SyntaxNode, ty: ValueType) {
        self.analyze_nodes(node);
        node.set_type(ty);
        node.set_storage(ValueStorage::Varying);
    }

    fn analyze_call(&mut self, node: &mut SyntaxNode) {
        self.analyze_nodes(node);

        let arguments: Vec<(ValueType, ValueStorage)> =
            node.children().iter().map(|c| (c.ty(), c.storage())).collect();
        let symbol = self.symbol_table.find_symbol_for_call(
            node.lexeme(),
            node.expected_type(),
            node.expected_storage(),
            &arguments,
        );
        let Some(symbol) = symbol else {
            let line = node.line();
            let message = format!("Unrecognized function '{}'", node.lexeme());
            self.error(true, line, &message);
            return;
        };

        node.set_symbol(symbol);
        node.set_type(self.symbol_table.symbol(symbol).ty());
        node.set_storage(self.symbol_table.symbol(symbol).storage());

        let parameters: Vec<_> = self
            .symbol_table
            .symbol(symbol)
            .parameters()
            .iter()
            .map(|p| (p.ty(), p.storage()))
            .collect();
        for (child, (ty, storage)) in node.children_mut().iter_mut().zip(parameters) {
            Self::analyze_type_conversion(child, ty);
            Self::analyze_storage_promotion(child, storage);
        }
    }

    fn analyze_if_statement(&mut self, node: &mut SyntaxNode) {
        let scope = self.symbol_table.push_scope();
        node.set_scope(scope);
        self.analyze_nodes(node);
        self.symbol_table.pop_scope();

        Self::analyze_storage_promotion(node.child_mut(0), ValueStorage::Varying);
    }

    fn analyze_while_statement(&mut self, node: &mut SyntaxNode) {
        let scope = self.symbol_table.push_scope();
        node.set_scope(scope);
        self.analyze_nodes(node);
        self.symbol_table.pop_scope();

        Self::analyze_storage_promotion(node.child_mut(0), ValueStorage::Varying);
    }

    fn analyze_for_statement(&mut self, node: &mut SyntaxNode) {
        let scope = self.symbol_table.push_scope();
        node.set_scope(scope);
        self.analyze_nodes(node);
        self.symbol_table.pop_scope();

        Self::analyze_storage_promotion(node.child_mut(1), ValueStorage::Varying);
    }

    fn analyze_solar_statement(&mut self, node: &mut SyntaxNode) {
        let scope = self.symbol_table.push_scope();
        node.set_scope(scope);
        let _ = self.symbol_table.add_symbols().lighting_symbols();
        self.analyze_nodes(node);
        self.symbol_table.pop_scope();

        let expressions = node.child(0);
        if !expressions.children().is_empty() {
            let line = node.line();
            if expressions.children().len() < 2 {
                self.error(true, line, "The 'solar' statement takes an axis and an angle");
                return;
            }
            self.error(
                expressions.child(0).storage() == ValueStorage::Varying,
                line,
                "The 'solar' statement axis must be constant or uniform",
            );
            self.error(
                expressions.child(1).storage() == ValueStorage::Varying,
                line,
                "The 'solar' statement angle must be constant or uniform",
            );
            self.error(
                expressions.child(1).ty() != ValueType::Float,
                line,
                "The 'solar' statement angle must be a float",
            );
        }
    }

    fn analyze_illuminate_statement(&mut self, node: &mut SyntaxNode) {
        let scope = self.symbol_table.push_scope();
        node.set_scope(scope);
        let _ = self.symbol_table.add_symbols().lighting_symbols();
        self.analyze_nodes(node);
        self.symbol_table.pop_scope();

        let expressions = node.child(0);
        let line = node.line();
        if expressions.children().is_empty() {
            self.error(true, line, "The 'illuminate' statement requires a position");
            return;
        }
        self.error(
            expressions.child(0).storage() == ValueStorage::Varying,
            line,
            "The 'illuminate' statement position must be constant or uniform",
        );
        if expressions.children().len() == 2 {
            self.error(true, line, "The 'illuminate' statement takes a position or a position, axis, and angle");
            return;
        }
        if expressions.children().len() > 1 {
            self.error(
                expressions.child(1).storage() == ValueStorage::Varying,
                line,
                "The 'illuminate' statement axis must be constant or uniform",
            );
            self.error(
                expressions.child(2).storage() == ValueStorage::Varying,
                line,
                "The 'illuminate' statement angle must be constant or uniform",
            );
            self.error(
                expressions.child(2).ty() != ValueType::Float,
                line,
                "The 'illuminate' statement angle must be a float",
            );
        }
    }

    fn analyze_illuminance_statement(&mut self, node: &mut SyntaxNode) {
        let scope = self.symbol_table.push_scope();
        node.set_scope(scope);
        let _ = self.symbol_table.add_symbols().illuminance_symbols();
        self.analyze_nodes(node);
        self.symbol_table.pop_scope();

        let line = node.line();
        let count = node.child(0).children().len();
        if count < 3 {
            // The original grammar admits this form but nothing can execute
            // it; reject it during analysis.
            if count > 0 {
                Self::analyze_storage_promotion(node.child_mut(0).child_mut(0), ValueStorage::Varying);
            }
            self.error(true, line, "The unconditional 'illuminance' statement is not supported");
            return;
        }
        Self::analyze_storage_promotion(node.child_mut(0).child_mut(0), ValueStorage::Varying);
        Self::analyze_storage_promotion(node.child_mut(0).child_mut(1), ValueStorage::Varying);
        self.error(
            node.child(0).child(2).storage() == ValueStorage::Varying,
            line,
            "The 'illuminance' statement angle must be constant or uniform",
        );
        self.error(
            node.child(0).child(2).ty() != ValueType::Float,
            line,
            "The 'illuminance' statement angle must be a float",
        );
    }

    fn analyze_binary_operator(&mut self, metadata: &[OperationMetadata], name: &str, node: &mut SyntaxNode) {
        let rhs_type = node.child(1).ty();
        let rhs_storage = node.child(1).storage();
        Self::analyze_type_conversion(node.child_mut(0), rhs_type);
        Self::analyze_storage_promotion(node.child_mut(0), rhs_storage);
        let lhs_type = node.child(0).ty();
        let lhs_storage = node.child(0).storage();
        Self::analyze_type_conversion(node.child_mut(1), lhs_type);
        Self::analyze_storage_promotion(node.child_mut(1), lhs_storage);

        let found = find_metadata(metadata, node.child(0).ty(), node.child(1).ty());
        let line = node.line();
        let message = format!("Invalid arguments to '{name}' operator");
        self.error(found.is_none(), line, &message);
        if let Some(found) = found {
            node.set_type(found.result);
            node.set_storage(node.child(0).storage().max(node.child(1).storage()));
            if let Some(instruction) = found.instruction {
                node.set_instruction(instruction);
            }
        }
    }

    /// Marks a node for promotion when a varying context requires it.
    fn analyze_storage_promotion(node: &mut SyntaxNode, to_storage: ValueStorage) {
        if node.storage() != ValueStorage::Varying && to_storage == ValueStorage::Varying {
            node.set_storage_for_promotion(to_storage);
        }
    }

    /// Marks a node for conversion when a float meets a wider type.
    fn analyze_type_conversion(node: &mut SyntaxNode, to_type: ValueType) {
        if node.ty() == ValueType::Float && to_type != ValueType::Float && to_type != ValueType::Null {
            node.set_type_for_conversion(to_type);
        }
    }

    fn storage_from_node(node: &SyntaxNode) -> ValueStorage {
        match node.kind() {
            NodeKind::Uniform => ValueStorage::Uniform,
            NodeKind::Varying => ValueStorage::Varying,
            _ => ValueStorage::Null,
        }
    }

    fn type_from_node(node: &SyntaxNode) -> ValueType {
        match node.kind() {
            NodeKind::FloatType => ValueType::Float,
            NodeKind::StringType => ValueType::String,
            NodeKind::ColorType => ValueType::Color,
            NodeKind::PointType => ValueType::Point,
            NodeKind::VectorType => ValueType::Vector,
            NodeKind::NormalType => ValueType::Normal,
            NodeKind::MatrixType => ValueType::Matrix,
            _ => ValueType::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{error::CollectingErrorPolicy, parser::ShaderParser};

    use super::*;

    fn analyze(source: &str) -> (SyntaxNode, SymbolTable, CollectingErrorPolicy) {
        let mut errors = CollectingErrorPolicy::default();
        let mut root = ShaderParser::new(&mut errors)
            .parse(source, "test.sl")
            .expect("parse succeeded");
        let mut table = SymbolTable::new();
        SemanticAnalyzer::new(&mut table, &mut errors).analyze(&mut root, "test.sl");
        (root, table, errors)
    }

    fn analyze_ok(source: &str) -> (SyntaxNode, SymbolTable) {
        let (root, table, errors) = analyze(source);
        assert_eq!(errors.total_errors(), 0, "{:?}", errors.diagnostics());
        (root, table)
    }

    #[test]
    fn identifiers_inherit_symbol_type_and_storage() {
        let (root, _table) = analyze_ok("surface s() { Ci = Cs; }");
        let assign = root.child(0).child(1).child(0);
        let cs = assign.child(0);
        assert_eq!(cs.ty(), ValueType::Color);
        assert_eq!(cs.storage(), ValueStorage::Varying);
        assert_eq!(assign.ty(), ValueType::Color);
    }

    #[test]
    fn uniform_float_times_varying_point_converts_and_promotes() {
        let (root, _table) = analyze_ok("surface s() { float k = 2; point p = k * P; }");
        let p_variable = &root.child(0).child(1).child(1).child(0);
        let multiply = p_variable.child(0);
        assert_eq!(multiply.kind(), NodeKind::Multiply);
        let k = multiply.child(0);
        assert_eq!(k.original_type(), ValueType::Float);
        assert_eq!(k.ty(), ValueType::Point);
        assert_eq!(k.original_storage(), ValueStorage::Uniform);
        assert_eq!(k.storage(), ValueStorage::Varying);
        assert_eq!(multiply.ty(), ValueType::Point);
        assert_eq!(multiply.storage(), ValueStorage::Varying);
        assert_eq!(multiply.instruction(), Some(Opcode::Multiply));
    }

    #[test]
    fn storage_is_monotonic_over_children() {
        fn check(node: &SyntaxNode) {
            if node.ty() != ValueType::Null {
                for child in node.children() {
                    if child.ty() != ValueType::Null {
                        assert!(
                            node.storage() >= child.storage(),
                            "storage not monotonic at {:?}",
                            node.kind()
                        );
                    }
                }
            }
            for child in node.children() {
                check(child);
            }
        }
        let (root, _table) = analyze_ok(
            "surface s() { float k = 2; if (s > 0.5) { Ci = k * Cs; } else { Ci = Cs + Cs * 0.5; } }",
        );
        check(&root);
    }

    #[test]
    fn conversion_markers_only_widen_floats() {
        fn check(node: &SyntaxNode) {
            if node.original_type() != ValueType::Null {
                assert_eq!(node.original_type(), ValueType::Float);
                assert!(node.ty().is_vec3() || node.ty() == ValueType::Matrix);
            }
            for child in node.children() {
                check(child);
            }
        }
        let (root, _table) = analyze_ok("surface s() { Ci = Cs * 0.5; P = P + 1; }");
        check(&root);
    }

    #[test]
    fn random_overloads_resolve_by_expected_type() {
        let (root, table) = analyze_ok("surface s() { color c = random(); float f = random(); }");
        let statements = root.child(0).child(1);
        let c_call = statements.child(0).child(0).child(0);
        assert_eq!(c_call.kind(), NodeKind::Call);
        assert_eq!(table.symbol(c_call.symbol().unwrap()).ty(), ValueType::Color);
        let f_call = statements.child(1).child(0).child(0);
        assert_eq!(table.symbol(f_call.symbol().unwrap()).ty(), ValueType::Float);
        assert_eq!(f_call.storage(), ValueStorage::Varying);
    }

    #[test]
    fn undefined_symbol_is_a_semantic_error() {
        let (_root, _table, errors) = analyze("surface s() { Ci = missing; }");
        assert!(errors.contains(ErrorCode::SemanticError));
        assert!(errors.contains(ErrorCode::SemanticAnalysisFailed));
    }

    #[test]
    fn assignment_to_constant_is_rejected() {
        let (_root, _table, errors) = analyze("surface s() { PI = 3; }");
        assert!(errors.contains(ErrorCode::SemanticError));
    }

    #[test]
    fn light_without_solar_or_illuminate_gets_implicit_ambient() {
        let (root, _table) = analyze_ok("light amb(float intensity = 1;) { Cl = intensity * color(1, 1, 1); }");
        let statements = root.child(0).child(1);
        assert_eq!(statements.child(0).kind(), NodeKind::Ambient);
        assert_eq!(statements.child(0).child(0).lexeme(), "Cl");
        assert_eq!(statements.child(0).child(1).lexeme(), "Ol");
    }

    #[test]
    fn ambient_assignment_with_solar_is_rejected() {
        let (_root, _table, errors) = analyze(
            "light bad() { Cl = color(1, 1, 1); solar((0, 0, 1), 0) { Cl = color(1, 1, 1); } }",
        );
        assert!(errors.contains(ErrorCode::SemanticError));
    }

    #[test]
    fn varying_solar_axis_is_rejected() {
        let (_root, _table, errors) = analyze("light bad() { solar(N, 0) { Cl = color(1, 1, 1); } }");
        assert!(errors.contains(ErrorCode::SemanticError));
    }

    #[test]
    fn unconditional_illuminance_is_rejected() {
        let (_root, _table, errors) = analyze("surface s() { illuminance(P) { Ci += Cl; } }");
        assert!(errors.contains(ErrorCode::SemanticError));
    }

    #[test]
    fn conditions_are_promoted_to_varying() {
        let (root, _table) = analyze_ok("surface s() { float k = 0; if (k > 0.5) Ci = Cs; }");
        let if_node = root.child(0).child(1).child(1);
        assert_eq!(if_node.kind(), NodeKind::If);
        let condition = if_node.child(0);
        assert_eq!(condition.storage(), ValueStorage::Varying);
        assert_eq!(condition.original_storage(), ValueStorage::Uniform);
    }

    #[test]
    fn call_arguments_are_converted_to_parameter_types() {
        let (root, _table) = analyze_ok("surface s() { Ci = mix(Cs, Os, 0.5); }");
        let call = root.child(0).child(1).child(0).child(0);
        assert_eq!(call.kind(), NodeKind::Call);
        assert_eq!(call.ty(), ValueType::Color);
        // The alpha literal is promoted to the varying parameter.
        let alpha = call.child(2);
        assert_eq!(alpha.storage(), ValueStorage::Varying);
    }

    #[test]
    fn variable_without_storage_inherits_at_least_uniform() {
        let (root, table) = analyze_ok("surface s() { float k = 2; }");
        let variable = root.child(0).child(1).child(0);
        let symbol = variable.symbol().unwrap();
        assert_eq!(table.symbol(symbol).storage(), ValueStorage::Uniform);
    }
}
