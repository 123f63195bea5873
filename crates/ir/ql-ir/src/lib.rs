//! Typed intermediate representation
//!
//! The IR is what the lowering pass produces from a `ql_syntax::Module`:
//! every value carries its type and every name is resolved to a stable
//! id into one of the arenas owned by [`Module`]. Nothing in here points
//! at anything else by reference.

pub mod display;
mod statement;
mod ty;
mod value;

pub use statement::{Block, ForEachMetadata, If, IterableKind, ReturnMetadata, Statement};
pub use ty::{Primitive, Type};
pub use value::{
    BinaryOperator, Call, CallMetadata, LengthKind, LookupKind, LookupMetadata, OperationMetadata,
    PropertyMetadata, UnaryOperator, Value, VariableMetadata,
};

use indexmap::IndexMap;
use la_arena::{Arena, Idx};
use thiserror::Error;

/// Id of a module constant
pub type ConstantId = Idx<ConstantDef>;
/// Id of a free function or method
pub type FunctionId = Idx<FunctionDef>;
/// Id of a model
pub type ModelId = Idx<ModelDef>;
/// Id of a local binding
pub type LocalId = Idx<LocalDef>;

/// Argument of a specific function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArgumentRef {
    /// Owning function
    pub function: FunctionId,
    /// Position in the argument list
    pub index: usize,
}

/// Field of a specific model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// Owning model
    pub model: ModelId,
    /// Position in the field list
    pub index: usize,
}

/// Anything a variable reference can resolve to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Definition {
    /// Module constant
    Constant(ConstantId),
    /// Function or method argument
    Argument(ArgumentRef),
    /// Field of the enclosing model, read through the receiver
    Field(FieldRef),
    /// Local binding
    Local(LocalId),
}

/// Something a `return` can leave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallableRef {
    /// Free function or method
    Function(FunctionId),
    /// Equality override of a model
    EqualOverride(ModelId),
    /// Hash override of a model
    HashOverride(ModelId),
}

/// Who owns a function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    /// Free function
    Module,
    /// Method; the body sees the instance as `self`
    Model(ModelId),
}

/// A name was inserted twice into the same namespace
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("duplicate definition: {0}")]
pub struct DuplicateName(pub String);

/// Module-level constant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantDef {
    /// Constant name
    pub name: String,
    /// Constant value
    pub value: Value,
    /// Derived type of the value
    pub ty: Type,
}

/// Function or method argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentDef {
    /// Argument name
    pub name: String,
    /// Declared type
    pub ty: Type,
}

/// Free function or method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDef {
    /// Function name
    pub name: String,
    /// Arguments, in declaration order
    pub arguments: Vec<ArgumentDef>,
    /// Declared return type
    pub return_type: Type,
    /// Body; empty until the body has been lowered
    pub block: Block,
    /// Module or model owning this function
    pub owner: Owner,
}

/// Model field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Declared type
    pub ty: Type,
}

/// User-supplied equality
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EqualOverride {
    /// Local bound to the compared instance
    pub other: LocalId,
    /// Body returning `bool`
    pub block: Block,
}

/// User-supplied hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashOverride {
    /// Body returning `int`
    pub block: Block,
}

/// Model definition
///
/// Fields and methods share one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDef {
    /// Model name
    pub name: String,
    /// Fields, in declaration order
    pub fields: Vec<FieldDef>,
    /// Methods, in declaration order
    pub methods: Vec<FunctionId>,
    /// Optional equality override
    pub equal_override: Option<EqualOverride>,
    /// Optional hash override
    pub hash_override: Option<HashOverride>,
    field_map: IndexMap<String, usize>,
    method_map: IndexMap<String, FunctionId>,
}

impl ModelDef {
    /// Create a model with no members
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            methods: Vec::new(),
            equal_override: None,
            hash_override: None,
            field_map: IndexMap::new(),
            method_map: IndexMap::new(),
        }
    }

    fn member_exists(&self, name: &str) -> bool {
        self.field_map.contains_key(name) || self.method_map.contains_key(name)
    }

    /// Append a field, returning its index
    ///
    /// # Errors
    /// Returns `DuplicateName` if a field or method already has this name
    pub fn declare_field(&mut self, field: FieldDef) -> Result<usize, DuplicateName> {
        if self.member_exists(&field.name) {
            return Err(DuplicateName(field.name));
        }
        let index = self.fields.len();
        self.field_map.insert(field.name.clone(), index);
        self.fields.push(field);
        Ok(index)
    }

    /// Register a method already allocated in the module
    ///
    /// # Errors
    /// Returns `DuplicateName` if a field or method already has this name
    pub fn declare_method(
        &mut self,
        name: &str,
        function: FunctionId,
    ) -> Result<(), DuplicateName> {
        if self.member_exists(name) {
            return Err(DuplicateName(name.to_string()));
        }
        self.method_map.insert(name.to_string(), function);
        self.methods.push(function);
        Ok(())
    }

    /// Index of the field called `name`
    #[must_use]
    pub fn field(&self, name: &str) -> Option<usize> {
        self.field_map.get(name).copied()
    }

    /// Method called `name`
    #[must_use]
    pub fn method(&self, name: &str) -> Option<FunctionId> {
        self.method_map.get(name).copied()
    }
}

/// Where a local binding came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalKind {
    /// `name := value`
    Declared,
    /// Item of a for-each
    ForEachItem,
    /// The compared instance of an equality override
    OverrideOther,
}

/// Local binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDef {
    /// Local name
    pub name: String,
    /// Type of the binding
    pub ty: Type,
    /// Origin of the binding
    pub kind: LocalKind,
}

/// A lowered module
///
/// Constants and free functions share one namespace; models have their
/// own. Methods live in `functions` too but are only reachable through
/// their model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// Module name
    pub name: String,
    /// Constants, in source order
    pub constants: Arena<ConstantDef>,
    /// Free functions and methods
    pub functions: Arena<FunctionDef>,
    /// Models, in source order
    pub models: Arena<ModelDef>,
    /// Every local binding of every body
    pub locals: Arena<LocalDef>,
    constant_map: IndexMap<String, ConstantId>,
    function_map: IndexMap<String, FunctionId>,
    model_map: IndexMap<String, ModelId>,
}

impl Module {
    /// Create an empty module
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constants: Arena::new(),
            functions: Arena::new(),
            models: Arena::new(),
            locals: Arena::new(),
            constant_map: IndexMap::new(),
            function_map: IndexMap::new(),
            model_map: IndexMap::new(),
        }
    }

    fn value_name_exists(&self, name: &str) -> bool {
        self.constant_map.contains_key(name) || self.function_map.contains_key(name)
    }

    /// Add a constant
    ///
    /// # Errors
    /// Returns `DuplicateName` if a constant or free function has this name
    pub fn declare_constant(&mut self, constant: ConstantDef) -> Result<ConstantId, DuplicateName> {
        if self.value_name_exists(&constant.name) {
            return Err(DuplicateName(constant.name));
        }
        let name = constant.name.clone();
        let id = self.constants.alloc(constant);
        self.constant_map.insert(name, id);
        Ok(id)
    }

    /// Add a free function
    ///
    /// # Errors
    /// Returns `DuplicateName` if a constant or free function has this name
    pub fn declare_function(&mut self, function: FunctionDef) -> Result<FunctionId, DuplicateName> {
        if self.value_name_exists(&function.name) {
            return Err(DuplicateName(function.name));
        }
        let name = function.name.clone();
        let id = self.functions.alloc(function);
        self.function_map.insert(name, id);
        Ok(id)
    }

    /// Add a method to the function arena without naming it at module level
    pub fn alloc_method(&mut self, function: FunctionDef) -> FunctionId {
        self.functions.alloc(function)
    }

    /// Add a model with no members yet
    ///
    /// # Errors
    /// Returns `DuplicateName` if a model has this name
    pub fn declare_model(&mut self, name: &str) -> Result<ModelId, DuplicateName> {
        if self.model_map.contains_key(name) {
            return Err(DuplicateName(name.to_string()));
        }
        let id = self.models.alloc(ModelDef::new(name));
        self.model_map.insert(name.to_string(), id);
        Ok(id)
    }

    /// Add a local binding
    pub fn alloc_local(&mut self, local: LocalDef) -> LocalId {
        self.locals.alloc(local)
    }

    /// Constant called `name`
    #[must_use]
    pub fn constant(&self, name: &str) -> Option<ConstantId> {
        self.constant_map.get(name).copied()
    }

    /// Free function called `name`
    #[must_use]
    pub fn function(&self, name: &str) -> Option<FunctionId> {
        self.function_map.get(name).copied()
    }

    /// Model called `name`
    #[must_use]
    pub fn model(&self, name: &str) -> Option<ModelId> {
        self.model_map.get(name).copied()
    }

    /// Free functions in declaration order
    pub fn free_functions(&self) -> impl Iterator<Item = FunctionId> + '_ {
        self.function_map.values().copied()
    }

    /// Type of whatever `definition` names
    #[must_use]
    pub fn definition_type(&self, definition: Definition) -> &Type {
        match definition {
            Definition::Constant(id) => &self.constants[id].ty,
            Definition::Argument(ArgumentRef { function, index }) => {
                &self.functions[function].arguments[index].ty
            }
            Definition::Field(FieldRef { model, index }) => &self.models[model].fields[index].ty,
            Definition::Local(id) => &self.locals[id].ty,
        }
    }

    /// Name of whatever `definition` names
    #[must_use]
    pub fn definition_name(&self, definition: Definition) -> &str {
        match definition {
            Definition::Constant(id) => &self.constants[id].name,
            Definition::Argument(ArgumentRef { function, index }) => {
                &self.functions[function].arguments[index].name
            }
            Definition::Field(FieldRef { model, index }) => &self.models[model].fields[index].name,
            Definition::Local(id) => &self.locals[id].name,
        }
    }

    /// Declared result type of a callable
    #[must_use]
    pub fn callable_return_type(&self, callable: CallableRef) -> Type {
        match callable {
            CallableRef::Function(id) => self.functions[id].return_type.clone(),
            CallableRef::EqualOverride(_) => Type::BOOLEAN,
            CallableRef::HashOverride(_) => Type::INT,
        }
    }

    /// Name used for a callable in diagnostics
    #[must_use]
    pub fn callable_name(&self, callable: CallableRef) -> String {
        match callable {
            CallableRef::Function(id) => self.functions[id].name.clone(),
            CallableRef::EqualOverride(model) => format!("{}.equal", self.models[model].name),
            CallableRef::HashOverride(model) => format!("{}.hash", self.models[model].name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(name: &str) -> FunctionDef {
        FunctionDef {
            name: name.to_string(),
            arguments: vec![ArgumentDef {
                name: "count".to_string(),
                ty: Type::INT,
            }],
            return_type: Type::VOID,
            block: Block::default(),
            owner: Owner::Module,
        }
    }

    #[test]
    fn test_constants_and_functions_share_namespace() {
        let mut module = Module::new("Shared");
        module
            .declare_constant(ConstantDef {
                name: "limit".to_string(),
                value: Value::LiteralInt(3),
                ty: Type::INT,
            })
            .unwrap();

        let err = module.declare_function(function("limit")).unwrap_err();
        assert_eq!(err, DuplicateName("limit".to_string()));
        assert!(module.function("limit").is_none());
    }

    #[test]
    fn test_models_have_separate_namespace() {
        let mut module = Module::new("Separate");
        module.declare_function(function("point")).unwrap();
        module.declare_model("Point").unwrap();

        assert!(module.declare_model("Point").is_err());
        assert_eq!(module.models.len(), 1);
    }

    #[test]
    fn test_fields_and_methods_share_namespace() {
        let mut module = Module::new("Members");
        let model = module.declare_model("Point").unwrap();
        let method = module.alloc_method(function("x"));

        let point = &mut module.models[model];
        point
            .declare_field(FieldDef {
                name: "x".to_string(),
                ty: Type::INT,
            })
            .unwrap();

        assert!(point.declare_method("x", method).is_err());
        assert_eq!(point.field("x"), Some(0));
        assert!(point.method("x").is_none());
    }

    #[test]
    fn test_definition_type_follows_reference() {
        let mut module = Module::new("Types");
        let id = module.declare_function(function("run")).unwrap();

        let argument = Definition::Argument(ArgumentRef {
            function: id,
            index: 0,
        });
        assert_eq!(module.definition_type(argument), &Type::INT);
        assert_eq!(module.definition_name(argument), "count");
    }
}
