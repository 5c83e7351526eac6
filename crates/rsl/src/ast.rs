//! The syntax tree produced by the parser and annotated by the semantic
//! analyzer.

use crate::{
    address::Address,
    instruction::Opcode,
    symbol::SymbolId,
    symbol_table::ScopeId,
    value::{ValueStorage, ValueType},
};

/// The kind tag of a syntax tree node: one variant per statement and
/// expression family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Null,
    List,
    LightShader,
    SurfaceShader,
    VolumeShader,
    DisplacementShader,
    ImagerShader,
    FloatType,
    StringType,
    ColorType,
    PointType,
    VectorType,
    NormalType,
    MatrixType,
    VoidType,
    Varying,
    Uniform,
    Output,
    Extern,
    Variable,
    Call,
    Return,
    Break,
    Continue,
    If,
    IfElse,
    While,
    For,
    Ambient,
    Solar,
    Illuminate,
    Illuminance,
    Dot,
    Cross,
    Multiply,
    Divide,
    Add,
    Subtract,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Equal,
    NotEqual,
    And,
    Or,
    Negate,
    Ternary,
    Typecast,
    Assign,
    AddAssign,
    SubtractAssign,
    MultiplyAssign,
    DivideAssign,
    Integer,
    Real,
    String,
    Texture,
    Shadow,
    Environment,
    Triple,
    Sixteentuple,
    Identifier,
}

impl NodeKind {
    /// True for the five assignment statement kinds.
    #[must_use]
    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            Self::Assign | Self::AddAssign | Self::SubtractAssign | Self::MultiplyAssign | Self::DivideAssign
        )
    }
}

/// A node in the syntax tree.
///
/// Nodes own their children; scopes and symbols are referenced by arena id
/// into the compilation session's [`crate::SymbolTable`]. The analyzer
/// fills in the type and storage annotations: `expected_*` flow down from
/// parents, `original_*` record the pre-conversion type and pre-promotion
/// storage when a conversion marker was inserted, and `ty`/`storage` are
/// the post-conversion results.
#[derive(Debug)]
pub struct SyntaxNode {
    kind: NodeKind,
    line: usize,
    lexeme: String,
    children: Vec<SyntaxNode>,
    scope: Option<ScopeId>,
    symbol: Option<SymbolId>,
    address: Address,
    expected_type: ValueType,
    original_type: ValueType,
    ty: ValueType,
    expected_storage: ValueStorage,
    original_storage: ValueStorage,
    storage: ValueStorage,
    instruction: Option<Opcode>,
}

impl SyntaxNode {
    #[must_use]
    pub fn new(kind: NodeKind, line: usize) -> Self {
        Self {
            kind,
            line,
            lexeme: String::new(),
            children: Vec::new(),
            scope: None,
            symbol: None,
            address: Address::NULL,
            expected_type: ValueType::Null,
            original_type: ValueType::Null,
            ty: ValueType::Null,
            expected_storage: ValueStorage::Null,
            original_storage: ValueStorage::Null,
            storage: ValueStorage::Null,
            instruction: None,
        }
    }

    #[must_use]
    pub fn with_lexeme(kind: NodeKind, line: usize, lexeme: &str) -> Self {
        let mut node = Self::new(kind, line);
        node.lexeme = lexeme.to_owned();
        node
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: NodeKind) {
        self.kind = kind;
    }

    #[must_use]
    pub fn line(&self) -> usize {
        self.line
    }

    #[must_use]
    pub fn lexeme(&self) -> &str {
        &self.lexeme
    }

    /// The lexeme parsed as a float; literal nodes only.
    #[must_use]
    pub fn real(&self) -> f32 {
        self.lexeme.parse().unwrap_or(0.0)
    }

    /// The lexeme parsed as an integer; literal nodes only.
    #[must_use]
    pub fn integer(&self) -> i32 {
        self.lexeme.parse().unwrap_or(0)
    }

    #[must_use]
    pub fn children(&self) -> &[SyntaxNode] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [SyntaxNode] {
        &mut self.children
    }

    #[must_use]
    pub fn child(&self, index: usize) -> &SyntaxNode {
        &self.children[index]
    }

    pub fn child_mut(&mut self, index: usize) -> &mut SyntaxNode {
        &mut self.children[index]
    }

    pub fn add_node(&mut self, node: SyntaxNode) {
        self.children.push(node);
    }

    pub fn add_node_at_front(&mut self, node: SyntaxNode) {
        self.children.insert(0, node);
    }

    /// Counts nodes of `kind` in this subtree, including this node.
    #[must_use]
    pub fn count_by_kind(&self, kind: NodeKind) -> usize {
        usize::from(self.kind == kind) + self.children.iter().map(|c| c.count_by_kind(kind)).sum::<usize>()
    }

    #[must_use]
    pub fn scope(&self) -> Option<ScopeId> {
        self.scope
    }

    pub fn set_scope(&mut self, scope: ScopeId) {
        self.scope = Some(scope);
    }

    #[must_use]
    pub fn symbol(&self) -> Option<SymbolId> {
        self.symbol
    }

    pub fn set_symbol(&mut self, symbol: SymbolId) {
        self.symbol = Some(symbol);
    }

    /// The constant-segment address of a literal or constant reference.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn set_address(&mut self, address: Address) {
        self.address = address;
    }

    #[must_use]
    pub fn expected_type(&self) -> ValueType {
        self.expected_type
    }

    pub fn set_expected_type(&mut self, ty: ValueType) {
        self.expected_type = ty;
    }

    #[must_use]
    pub fn expected_storage(&self) -> ValueStorage {
        self.expected_storage
    }

    pub fn set_expected_storage(&mut self, storage: ValueStorage) {
        self.expected_storage = storage;
    }

    #[must_use]
    pub fn ty(&self) -> ValueType {
        self.ty
    }

    pub fn set_type(&mut self, ty: ValueType) {
        self.ty = ty;
    }

    #[must_use]
    pub fn original_type(&self) -> ValueType {
        self.original_type
    }

    /// Marks this expression for conversion: the current type becomes the
    /// original and `ty` the post-conversion type.
    pub fn set_type_for_conversion(&mut self, ty: ValueType) {
        self.original_type = self.ty;
        self.ty = ty;
    }

    #[must_use]
    pub fn storage(&self) -> ValueStorage {
        self.storage
    }

    pub fn set_storage(&mut self, storage: ValueStorage) {
        self.storage = storage;
    }

    #[must_use]
    pub fn original_storage(&self) -> ValueStorage {
        self.original_storage
    }

    /// Marks this expression for promotion: the current storage becomes the
    /// original and `storage` the post-promotion storage.
    pub fn set_storage_for_promotion(&mut self, storage: ValueStorage) {
        self.original_storage = self.storage;
        self.storage = storage;
    }

    #[must_use]
    pub fn is_uniform(&self) -> bool {
        self.storage == ValueStorage::Uniform
    }

    #[must_use]
    pub fn is_varying(&self) -> bool {
        self.storage == ValueStorage::Varying
    }

    /// The instruction resolved for a binary operator node.
    #[must_use]
    pub fn instruction(&self) -> Option<Opcode> {
        self.instruction
    }

    pub fn set_instruction(&mut self, instruction: Opcode) {
        self.instruction = Some(instruction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_marker_preserves_original_type() {
        let mut node = SyntaxNode::new(NodeKind::Identifier, 1);
        node.set_type(ValueType::Float);
        node.set_type_for_conversion(ValueType::Point);
        assert_eq!(node.original_type(), ValueType::Float);
        assert_eq!(node.ty(), ValueType::Point);
    }

    #[test]
    fn promotion_marker_preserves_original_storage() {
        let mut node = SyntaxNode::new(NodeKind::Identifier, 1);
        node.set_storage(ValueStorage::Uniform);
        node.set_storage_for_promotion(ValueStorage::Varying);
        assert_eq!(node.original_storage(), ValueStorage::Uniform);
        assert_eq!(node.storage(), ValueStorage::Varying);
    }

    #[test]
    fn count_by_kind_walks_the_subtree() {
        let mut list = SyntaxNode::new(NodeKind::List, 1);
        list.add_node(SyntaxNode::new(NodeKind::Solar, 2));
        let mut inner = SyntaxNode::new(NodeKind::List, 3);
        inner.add_node(SyntaxNode::new(NodeKind::Solar, 4));
        list.add_node(inner);
        assert_eq!(list.count_by_kind(NodeKind::Solar), 2);
        assert_eq!(list.count_by_kind(NodeKind::Illuminate), 0);
    }
}
