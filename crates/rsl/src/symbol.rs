//! Symbols recognized by the shader compiler.

use smallvec::SmallVec;

use crate::{
    address::{Address, Segment},
    builtins::Builtin,
    value::{ValueStorage, ValueType, size_by_type_and_storage},
};

/// Index of a symbol in the compilation session's symbol arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(pub(crate) u32);

/// The type and storage of one function parameter, used to implement
/// overloaded functions and to drive conversion and promotion of arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolParameter {
    ty: ValueType,
    storage: ValueStorage,
}

impl SymbolParameter {
    #[must_use]
    pub fn new(ty: ValueType, storage: ValueStorage) -> Self {
        Self { ty, storage }
    }

    #[must_use]
    pub fn ty(&self) -> ValueType {
        self.ty
    }

    #[must_use]
    pub fn storage(&self) -> ValueStorage {
        self.storage
    }

    /// Can a value of `ty` and `storage` be passed for this parameter?
    ///
    /// Allows type conversion and storage promotion: a float converts to any
    /// of the wider types up to matrix; `point`, `vector`, and `normal` are
    /// equivalent; lesser storages are promoted to greater ones. This lets
    /// one overload accept uniform arguments for a varying parameter while
    /// the matched symbol still reports the declared return storage.
    #[must_use]
    pub fn matches(&self, ty: ValueType, storage: ValueStorage) -> bool {
        let type_matches = ty == self.ty
            || (ty.is_geometric() && self.ty.is_geometric())
            || (ty == ValueType::Float && self.ty >= ValueType::Float && self.ty <= ValueType::Matrix);
        let storage_matches = storage <= self.storage && storage != ValueStorage::Null;
        type_matches && storage_matches
    }
}

/// A named value or function visible to the shader compiler.
///
/// A symbol is a function iff [`Symbol::function`] is set; `parameters` is
/// the ordered list of parameter types used for overload matching. Data
/// symbols receive an address when their owning scope is entered.
#[derive(Debug, Clone)]
pub struct Symbol {
    identifier: String,
    ty: ValueType,
    storage: ValueStorage,
    elements: u32,
    address: Address,
    value: f32,
    function: Option<Builtin>,
    parameters: SmallVec<[SymbolParameter; 4]>,
}

impl Symbol {
    #[must_use]
    pub fn new(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_owned(),
            ty: ValueType::Null,
            storage: ValueStorage::Null,
            elements: 1,
            address: Address::NULL,
            value: 0.0,
            function: None,
            parameters: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    #[must_use]
    pub fn ty(&self) -> ValueType {
        self.ty
    }

    #[must_use]
    pub fn storage(&self) -> ValueStorage {
        self.storage
    }

    #[must_use]
    pub fn elements(&self) -> u32 {
        self.elements
    }

    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    #[must_use]
    pub fn segment(&self) -> Segment {
        self.address.segment()
    }

    #[must_use]
    pub fn offset(&self) -> u32 {
        self.address.offset()
    }

    /// The compile-time value of a constant symbol.
    #[must_use]
    pub fn value(&self) -> f32 {
        self.value
    }

    #[must_use]
    pub fn function(&self) -> Option<Builtin> {
        self.function
    }

    #[must_use]
    pub fn is_function(&self) -> bool {
        self.function.is_some()
    }

    #[must_use]
    pub fn parameters(&self) -> &[SymbolParameter] {
        &self.parameters
    }

    /// Does the return type and storage of this symbol match the expected
    /// `ty` and `storage`?
    ///
    /// Used as an extra lookup key when resolving overloaded functions:
    /// `float random()` and `point random()` can only be distinguished by
    /// the return type expected by the surrounding expression. A null
    /// expected type matches every type; the expected storage only
    /// participates when a non-null type was expected, otherwise the storage
    /// is implied by the storage of the parameters.
    #[must_use]
    pub fn matches_return(&self, ty: ValueType, storage: ValueStorage) -> bool {
        let type_matches = ty == ValueType::Null || self.ty == ty;
        let storage_matches = storage == ValueStorage::Null || self.storage == storage || ty == ValueType::Null;
        type_matches && storage_matches
    }

    /// The size in bytes of this symbol's slot for a grid of `lanes` lanes.
    #[must_use]
    pub fn size_by_type_and_storage(&self, lanes: usize) -> usize {
        size_by_type_and_storage(self.ty, self.storage, lanes)
    }

    pub fn set_type(&mut self, ty: ValueType) {
        self.ty = ty;
    }

    pub fn set_storage(&mut self, storage: ValueStorage) {
        self.storage = storage;
    }

    pub fn set_elements(&mut self, elements: u32) {
        self.elements = elements;
    }

    pub fn set_address(&mut self, address: Address) {
        self.address = address;
    }

    pub fn set_segment(&mut self, segment: Segment) {
        self.address = Address::new(segment, self.address.offset());
    }

    pub fn set_value(&mut self, value: f32) {
        self.value = value;
    }

    pub fn set_function(&mut self, function: Builtin) {
        self.function = Some(function);
    }

    pub fn add_parameter(&mut self, ty: ValueType, storage: ValueStorage) {
        self.parameters.push(SymbolParameter::new(ty, storage));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_accepts_geometric_interchange() {
        let parameter = SymbolParameter::new(ValueType::Vector, ValueStorage::Varying);
        assert!(parameter.matches(ValueType::Point, ValueStorage::Varying));
        assert!(parameter.matches(ValueType::Normal, ValueStorage::Uniform));
        assert!(!parameter.matches(ValueType::Color, ValueStorage::Varying));
    }

    #[test]
    fn parameter_widens_float() {
        let parameter = SymbolParameter::new(ValueType::Color, ValueStorage::Varying);
        assert!(parameter.matches(ValueType::Float, ValueStorage::Uniform));
        let scalar = SymbolParameter::new(ValueType::Float, ValueStorage::Varying);
        assert!(!scalar.matches(ValueType::Color, ValueStorage::Varying));
    }

    #[test]
    fn parameter_rejects_storage_above_declaration() {
        let parameter = SymbolParameter::new(ValueType::Float, ValueStorage::Uniform);
        assert!(parameter.matches(ValueType::Float, ValueStorage::Constant));
        assert!(parameter.matches(ValueType::Float, ValueStorage::Uniform));
        assert!(!parameter.matches(ValueType::Float, ValueStorage::Varying));
        assert!(!parameter.matches(ValueType::Float, ValueStorage::Null));
    }

    #[test]
    fn return_matching_ignores_storage_without_type() {
        let mut symbol = Symbol::new("random");
        symbol.set_type(ValueType::Float);
        symbol.set_storage(ValueStorage::Varying);
        assert!(symbol.matches_return(ValueType::Null, ValueStorage::Uniform));
        assert!(symbol.matches_return(ValueType::Float, ValueStorage::Varying));
        assert!(!symbol.matches_return(ValueType::Point, ValueStorage::Null));
    }
}
