//! Hierarchical symbol table with function overloading.
//!
//! One [`SymbolTable`] exists per compilation session and owns every scope
//! and symbol in flat arenas; syntax tree nodes refer to them by
//! [`ScopeId`] and [`SymbolId`]. The table keeps a stack of open scopes for
//! the analyzer and pre-populates the root scope with the RSL standard
//! library.

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::{
    address::{Address, Segment},
    builtins::{self, Builtin},
    symbol::{Symbol, SymbolId},
    value::{ValueStorage, ValueType},
};

/// Index of a scope in the compilation session's scope arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub(crate) u32);

/// One lexical scope: an ordered list of symbols plus an identifier index
/// that admits multiple symbols per identifier (the overload set).
#[derive(Debug)]
pub struct Scope {
    parent: Option<ScopeId>,
    symbols: Vec<SymbolId>,
    by_identifier: AHashMap<String, SmallVec<[SymbolId; 2]>>,
    entered: bool,
}

impl Scope {
    fn new(parent: Option<ScopeId>) -> Self {
        Self {
            parent,
            symbols: Vec::new(),
            by_identifier: AHashMap::new(),
            entered: false,
        }
    }

    #[must_use]
    pub fn symbols(&self) -> &[SymbolId] {
        &self.symbols
    }

    #[must_use]
    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }
}

/// The symbol and scope arenas plus the stack of open scopes.
#[derive(Debug)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    scopes: Vec<Scope>,
    stack: Vec<ScopeId>,
}

impl SymbolTable {
    /// Creates a table whose root scope holds the RSL standard library.
    #[must_use]
    pub fn new() -> Self {
        let mut table = Self {
            symbols: Vec::new(),
            scopes: vec![Scope::new(None)],
            stack: vec![ScopeId(0)],
        };
        builtins::register_default_symbols(&mut table);
        table
    }

    #[must_use]
    pub fn global_scope(&self) -> ScopeId {
        ScopeId(0)
    }

    #[must_use]
    pub fn current_scope(&self) -> ScopeId {
        *self.stack.last().expect("scope stack is never empty")
    }

    #[must_use]
    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0 as usize]
    }

    #[must_use]
    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    /// Opens a child of the current scope and makes it current.
    pub fn push_scope(&mut self) -> ScopeId {
        let parent = self.current_scope();
        let id = ScopeId(u32::try_from(self.scopes.len()).expect("scope arena exceeds u32"));
        self.scopes.push(Scope::new(Some(parent)));
        self.stack.push(id);
        id
    }

    /// Closes the current scope. The scope itself stays alive in the arena;
    /// only the stack shrinks.
    pub fn pop_scope(&mut self) -> ScopeId {
        debug_assert!(self.stack.len() > 1, "cannot pop the global scope");
        self.stack.pop().expect("scope stack is never empty")
    }

    /// Adds a symbol with the given identifier to the current scope.
    pub fn add_symbol(&mut self, identifier: &str) -> SymbolId {
        let scope = self.current_scope();
        self.add_symbol_to(scope, identifier)
    }

    fn add_symbol_to(&mut self, scope: ScopeId, identifier: &str) -> SymbolId {
        debug_assert!(!identifier.is_empty());
        let id = SymbolId(u32::try_from(self.symbols.len()).expect("symbol arena exceeds u32"));
        self.symbols.push(Symbol::new(identifier));
        let scope = &mut self.scopes[scope.0 as usize];
        scope.symbols.push(id);
        scope.by_identifier.entry(identifier.to_owned()).or_default().push(id);
        id
    }

    /// Returns a builder for registering symbols into the current scope.
    pub fn add_symbols(&mut self) -> SymbolBuilder<'_> {
        SymbolBuilder { table: self }
    }

    /// Finds the first symbol with the given identifier, walking from the
    /// current scope to the root.
    #[must_use]
    pub fn find_symbol(&self, identifier: &str) -> Option<SymbolId> {
        let mut scope = Some(self.current_scope());
        while let Some(id) = scope {
            let s = self.scope(id);
            if let Some(candidates) = s.by_identifier.get(identifier) {
                if let Some(&first) = candidates.first() {
                    return Some(first);
                }
            }
            scope = s.parent;
        }
        None
    }

    /// Resolves a function call against the overload sets in the enclosing
    /// scope chain.
    ///
    /// A symbol matches when its return type and storage match the caller's
    /// expectation (null expectations match anything), its arity equals the
    /// argument count, and every argument's `(type, storage)` is acceptable
    /// to the corresponding parameter. The first match wins.
    #[must_use]
    pub fn find_symbol_for_call(
        &self,
        identifier: &str,
        expected_type: ValueType,
        expected_storage: ValueStorage,
        arguments: &[(ValueType, ValueStorage)],
    ) -> Option<SymbolId> {
        let mut scope = Some(self.current_scope());
        while let Some(id) = scope {
            let s = self.scope(id);
            if let Some(candidates) = s.by_identifier.get(identifier) {
                for &candidate in candidates {
                    let symbol = self.symbol(candidate);
                    if !symbol.matches_return(expected_type, expected_storage) {
                        continue;
                    }
                    let parameters = symbol.parameters();
                    if parameters.len() != arguments.len() {
                        continue;
                    }
                    if parameters
                        .iter()
                        .zip(arguments)
                        .all(|(parameter, &(ty, storage))| parameter.matches(ty, storage))
                    {
                        return Some(candidate);
                    }
                }
            }
            scope = s.parent;
        }
        None
    }

    /// Assigns addresses in `segment` to every data symbol in the scope,
    /// packing them sequentially from `start_offset`.
    ///
    /// Symbols whose storage is null or constant, string-typed symbols, and
    /// functions are skipped. Idempotent: a scope that is already entered
    /// returns `start_offset` unchanged, and a symbol that already holds an
    /// address keeps it, so addresses are stable for the life of the
    /// compile.
    pub fn enter(&mut self, scope: ScopeId, segment: Segment, start_offset: u32, lanes: usize) -> u32 {
        let mut offset = start_offset;
        if self.scopes[scope.0 as usize].entered {
            return offset;
        }
        self.scopes[scope.0 as usize].entered = true;
        let ids: Vec<SymbolId> = self.scopes[scope.0 as usize].symbols.clone();
        for id in ids {
            let symbol = &mut self.symbols[id.0 as usize];
            let skip = symbol.storage() == ValueStorage::Null
                || symbol.storage() == ValueStorage::Constant
                || symbol.ty() == ValueType::String
                || symbol.is_function();
            if skip || !symbol.address().is_null() {
                continue;
            }
            let size = u32::try_from(symbol.size_by_type_and_storage(lanes)).expect("symbol size exceeds u32");
            debug_assert!(size != 0);
            symbol.set_address(Address::new(segment, offset));
            offset += size;
        }
        offset
    }

    /// Assigns string-table indices to every string-typed data symbol in the
    /// scope, one index each, starting at `start_offset`.
    pub fn enter_strings(&mut self, scope: ScopeId, start_offset: u32) -> u32 {
        let mut offset = start_offset;
        let ids: Vec<SymbolId> = self.scopes[scope.0 as usize].symbols.clone();
        for id in ids {
            let symbol = &mut self.symbols[id.0 as usize];
            if symbol.ty() == ValueType::String && !symbol.is_function() && symbol.address().is_null() {
                symbol.set_address(Address::new(Segment::String, offset));
                offset += 1;
            }
        }
        offset
    }

    /// Restores the allocator high-water mark recorded before [`Self::enter`].
    pub fn leave(&mut self, scope: ScopeId, base_offset: u32) -> u32 {
        self.scopes[scope.0 as usize].entered = false;
        base_offset
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Fluent registration of symbols, in the shape of the RSL standard library
/// tables: a function entry followed by one `parameter` call per formal.
pub struct SymbolBuilder<'a> {
    pub(crate) table: &'a mut SymbolTable,
}

impl SymbolBuilder<'_> {
    /// Adds a data symbol. Its address is assigned when its scope is
    /// entered.
    #[must_use]
    pub fn variable(self, identifier: &str, ty: ValueType, storage: ValueStorage) -> Self {
        let id = self.table.add_symbol(identifier);
        let symbol = self.table.symbol_mut(id);
        symbol.set_type(ty);
        symbol.set_storage(storage);
        self
    }

    /// Adds a compile-time float constant.
    #[must_use]
    pub fn constant(self, identifier: &str, value: f32) -> Self {
        let id = self.table.add_symbol(identifier);
        let symbol = self.table.symbol_mut(id);
        symbol.set_type(ValueType::Float);
        symbol.set_storage(ValueStorage::Constant);
        symbol.set_value(value);
        self
    }

    /// Adds a function symbol; follow with [`Self::parameter`] calls for its
    /// formals.
    #[must_use]
    pub fn function(self, identifier: &str, builtin: Builtin, ty: ValueType, storage: ValueStorage) -> Self {
        let id = self.table.add_symbol(identifier);
        let symbol = self.table.symbol_mut(id);
        symbol.set_type(ty);
        symbol.set_storage(storage);
        symbol.set_function(builtin);
        self
    }

    /// Appends a parameter to the most recently added symbol.
    ///
    /// # Panics
    ///
    /// Panics if no symbol has been added yet.
    #[must_use]
    pub fn parameter(self, ty: ValueType, storage: ValueStorage) -> Self {
        let symbol = self.table.symbols.last_mut().expect("parameter before any symbol");
        symbol.add_parameter(ty, storage);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_to_the_root() {
        let mut table = SymbolTable::new();
        table.push_scope();
        let inner = table.add_symbol("k");
        table.symbol_mut(inner).set_type(ValueType::Float);
        assert_eq!(table.find_symbol("k"), Some(inner));
        // PI lives in the global scope.
        assert!(table.find_symbol("PI").is_some());
        table.pop_scope();
        assert_eq!(table.find_symbol("k"), None);
    }

    #[test]
    fn overload_resolution_by_return_type() {
        let table = SymbolTable::new();
        let float_random = table
            .find_symbol_for_call("random", ValueType::Float, ValueStorage::Null, &[])
            .expect("float random() is registered");
        let color_random = table
            .find_symbol_for_call("random", ValueType::Color, ValueStorage::Null, &[])
            .expect("color random() is registered");
        assert_ne!(float_random, color_random);
        assert_eq!(table.symbol(float_random).ty(), ValueType::Float);
        assert_eq!(table.symbol(color_random).ty(), ValueType::Color);
    }

    #[test]
    fn overload_resolution_matches_exact_parameters() {
        let table = SymbolTable::new();
        // Every registered built-in resolves against its own parameter list.
        for id in table.scope(table.global_scope()).symbols() {
            let symbol = table.symbol(*id);
            if !symbol.is_function() {
                continue;
            }
            let arguments: Vec<_> = symbol.parameters().iter().map(|p| (p.ty(), p.storage())).collect();
            let found = table
                .find_symbol_for_call(symbol.identifier(), symbol.ty(), symbol.storage(), &arguments)
                .unwrap_or_else(|| panic!("overload lookup failed for '{}'", symbol.identifier()));
            assert_eq!(
                table.symbol(found).identifier(),
                symbol.identifier(),
                "lookup returned a different identifier"
            );
        }
    }

    #[test]
    fn enter_assigns_sequential_addresses() {
        let mut table = SymbolTable::new();
        let scope = table.push_scope();
        let _ = table
            .add_symbols()
            .variable("a", ValueType::Float, ValueStorage::Varying)
            .variable("b", ValueType::Color, ValueStorage::Varying)
            .variable("c", ValueType::Float, ValueStorage::Uniform);
        let end = table.enter(scope, Segment::Grid, 0, 256);

        let ids = table.scope(scope).symbols().to_vec();
        assert_eq!(table.symbol(ids[0]).address(), Address::new(Segment::Grid, 0));
        assert_eq!(table.symbol(ids[1]).address(), Address::new(Segment::Grid, 4 * 256));
        assert_eq!(table.symbol(ids[2]).address(), Address::new(Segment::Grid, 4 * 256 + 12 * 256));
        assert_eq!(end, 4 * 256 + 12 * 256 + 4);
    }

    #[test]
    fn enter_is_idempotent_and_addresses_are_stable() {
        let mut table = SymbolTable::new();
        let scope = table.push_scope();
        let _ = table.add_symbols().variable("a", ValueType::Float, ValueStorage::Varying);
        let first = table.enter(scope, Segment::Grid, 0, 256);
        let id = table.scope(scope).symbols()[0];
        let address = table.symbol(id).address();

        // Second enter with the scope still open changes nothing.
        let second = table.enter(scope, Segment::Grid, 64, 256);
        assert_eq!(second, 64);
        assert_eq!(table.symbol(id).address(), address);

        // Even after leave, the assigned address is stable.
        let base = table.leave(scope, 0);
        assert_eq!(base, 0);
        let third = table.enter(scope, Segment::Temporary, 128, 256);
        assert_eq!(third, 128);
        assert_eq!(table.symbol(id).address(), address);
        assert_eq!(first, 4 * 256);
    }

    #[test]
    fn enter_strings_assigns_one_index_each() {
        let mut table = SymbolTable::new();
        let scope = table.push_scope();
        let _ = table
            .add_symbols()
            .variable("name", ValueType::String, ValueStorage::Uniform)
            .variable("other", ValueType::String, ValueStorage::Uniform);
        let end = table.enter_strings(scope, 0);
        assert_eq!(end, 2);
        let ids = table.scope(scope).symbols().to_vec();
        assert_eq!(table.symbol(ids[0]).address(), Address::new(Segment::String, 0));
        assert_eq!(table.symbol(ids[1]).address(), Address::new(Segment::String, 1));
    }
}
