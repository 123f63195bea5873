//! Tree-walking interpreter over the typed IR

#![allow(
    clippy::min_ident_chars,
    reason = "Short identifiers like op, i, l, r, c are conventional in operator implementations"
)]

use crate::value::{Instance, Value};
use ql_ir::{
    BinaryOperator, Block, Call, ConstantId, Definition, FunctionId, LocalId, LookupKind, ModelId,
    Module, Primitive, Statement, Type, UnaryOperator,
};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, trace};

/// Interpreter error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterpreterError {
    /// No free function with the requested name
    #[error("no function named `{0}`")]
    UnknownEntry(String),
    /// Entry point called with the wrong number of arguments
    #[error("`{function}` expects {expected} argument(s), got {got}")]
    ArgumentMismatch {
        /// Called function
        function: String,
        /// Declared arity
        expected: usize,
        /// Supplied arity
        got: usize,
    },
    /// Type mismatch
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type
        expected: String,
        /// Got type
        got: String,
    },
    /// Division by zero
    #[error("division by zero")]
    DivisionByZero,
    /// List or string index outside its bounds
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds {
        /// Requested index
        index: i64,
        /// Length of the indexed value
        len: usize,
    },
    /// Map lookup of an absent key
    #[error("key {0} not found")]
    MissingKey(String),
    /// `pop` on an empty list
    #[error("pop from an empty list")]
    PopFromEmptyList,
    /// Field access or method call on `null`
    #[error("null dereference")]
    NullDereference,
    /// Invalid operation
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

type Result<T> = std::result::Result<T, InterpreterError>;

/// How control leaves a statement
enum Flow {
    Next,
    Break,
    Continue,
    Return(Value),
}

/// Activation record of a function, method or override
#[derive(Default)]
struct Frame {
    receiver: Option<Value>,
    arguments: Vec<Value>,
    locals: FxHashMap<LocalId, Value>,
}

/// Interpreter state
pub struct Interpreter<'m> {
    module: &'m Module,
    constants: FxHashMap<ConstantId, Value>,
    frames: Vec<Frame>,
}

impl<'m> Interpreter<'m> {
    /// Create an interpreter for a lowered module
    #[must_use]
    pub fn new(module: &'m Module) -> Self {
        Self {
            module,
            constants: FxHashMap::default(),
            frames: Vec::new(),
        }
    }

    /// Run the free function `entry` with `arguments`
    ///
    /// Constants are evaluated once, in declaration order, before the
    /// first call.
    ///
    /// # Errors
    /// `UnknownEntry`, `ArgumentMismatch` or `TypeMismatch` when the call
    /// itself is malformed; any runtime error raised while executing.
    pub fn run(&mut self, entry: &str, arguments: Vec<Value>) -> Result<Value> {
        let module = self.module;
        let function = module
            .function(entry)
            .ok_or_else(|| InterpreterError::UnknownEntry(entry.to_string()))?;
        let def = &module.functions[function];
        if def.arguments.len() != arguments.len() {
            return Err(InterpreterError::ArgumentMismatch {
                function: entry.to_string(),
                expected: def.arguments.len(),
                got: arguments.len(),
            });
        }
        for (argument, value) in def.arguments.iter().zip(&arguments) {
            if !self.conforms(value, &argument.ty) {
                return Err(InterpreterError::TypeMismatch {
                    expected: module.type_name(&argument.ty),
                    got: value.kind().to_string(),
                });
            }
        }

        self.initialize_constants()?;
        debug!(entry, "running");
        self.call_function(function, None, arguments)
    }

    fn initialize_constants(&mut self) -> Result<()> {
        if self.constants.len() == self.module.constants.len() {
            return Ok(());
        }
        let module = self.module;
        self.frames.push(Frame::default());
        for (id, constant) in module.constants.iter() {
            let result = self.eval(&constant.value);
            match result {
                Ok(value) => {
                    self.constants.insert(id, value);
                }
                Err(error) => {
                    self.frames.pop();
                    return Err(error);
                }
            }
        }
        self.frames.pop();
        Ok(())
    }

    /// Whether a runtime value fits a declared type
    fn conforms(&self, value: &Value, ty: &Type) -> bool {
        match (value, ty) {
            (Value::Bool(_), Type::Primitive(Primitive::Boolean))
            | (Value::Int(_), Type::Primitive(Primitive::Int))
            | (Value::Rune(_), Type::Primitive(Primitive::Rune))
            | (Value::String(_), Type::Primitive(Primitive::String))
            | (Value::Void, Type::Primitive(Primitive::Void))
            | (Value::Null, Type::Model(_)) => true,
            (Value::List(items), Type::List(item)) | (Value::Set(items), Type::Set(item)) => {
                items.borrow().iter().all(|value| self.conforms(value, item))
            }
            (Value::Map(entries), Type::Map(key, value)) => entries
                .borrow()
                .iter()
                .all(|(k, v)| self.conforms(k, key) && self.conforms(v, value)),
            (Value::Instance(instance), Type::Model(model)) => instance.model == *model,
            _ => false,
        }
    }

    fn frame(&mut self) -> Result<&mut Frame> {
        self.frames
            .last_mut()
            .ok_or_else(|| invalid("no active frame"))
    }

    fn receiver(&mut self) -> Result<Rc<Instance>> {
        match &self.frame()?.receiver {
            Some(Value::Instance(instance)) => Ok(Rc::clone(instance)),
            Some(_) => Err(InterpreterError::InvalidOperation(
                "receiver is not an instance".to_string(),
            )),
            None => Err(InterpreterError::InvalidOperation(
                "`self` outside of a model".to_string(),
            )),
        }
    }

    /// Run `block` in a fresh frame and collect its return value
    fn invoke(&mut self, name: &str, block: &Block, frame: Frame) -> Result<Value> {
        trace!(callable = name, "call");
        self.frames.push(frame);
        let result = self.execute_block(block);
        self.frames.pop();
        match result? {
            Flow::Return(value) => Ok(value),
            Flow::Next => Ok(Value::Void),
            Flow::Break | Flow::Continue => Err(InterpreterError::InvalidOperation(format!(
                "loop control escaped `{name}`"
            ))),
        }
    }

    fn call_function(
        &mut self,
        function: FunctionId,
        receiver: Option<Value>,
        arguments: Vec<Value>,
    ) -> Result<Value> {
        let module = self.module;
        let def = &module.functions[function];
        let frame = Frame {
            receiver,
            arguments,
            locals: FxHashMap::default(),
        };
        self.invoke(&def.name, &def.block, frame)
    }

    fn eval_call(&mut self, call: &Call) -> Result<Value> {
        let receiver = match &call.receiver {
            Some(receiver) => match self.eval(receiver)? {
                Value::Null => return Err(InterpreterError::NullDereference),
                value => Some(value),
            },
            None => None,
        };
        let arguments = self.eval_all(&call.arguments)?;
        self.call_function(call.meta.function, receiver, arguments)
    }

    fn eval_all(&mut self, values: &[ql_ir::Value]) -> Result<Vec<Value>> {
        values.iter().map(|value| self.eval(value)).collect()
    }

    fn eval_bool(&mut self, value: &ql_ir::Value) -> Result<bool> {
        let value = self.eval(value)?;
        value.as_bool().ok_or_else(|| InterpreterError::TypeMismatch {
            expected: "bool".to_string(),
            got: value.kind().to_string(),
        })
    }

    fn eval_int(&mut self, value: &ql_ir::Value) -> Result<i64> {
        let value = self.eval(value)?;
        value.as_int().ok_or_else(|| InterpreterError::TypeMismatch {
            expected: "int".to_string(),
            got: value.kind().to_string(),
        })
    }

    fn execute_block(&mut self, block: &Block) -> Result<Flow> {
        for statement in &block.statements {
            match self.execute(statement)? {
                Flow::Next => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Next)
    }

    fn execute(&mut self, statement: &Statement) -> Result<Flow> {
        match statement {
            Statement::Declare { local, value } => {
                let value = self.eval(value)?;
                self.frame()?.locals.insert(*local, value);
            }
            Statement::Assign { to, from } => {
                let value = self.eval(from)?;
                self.assign(to, value)?;
            }
            Statement::Conditional { ifs, else_block } => {
                for arm in ifs {
                    if self.eval_bool(&arm.condition)? {
                        return self.execute_block(&arm.block);
                    }
                }
                if let Some(block) = else_block {
                    return self.execute_block(block);
                }
            }
            Statement::For {
                initialization,
                condition,
                after_each,
                block,
            } => {
                if let Some(initialization) = initialization {
                    self.execute(initialization)?;
                }
                while self.eval_bool(condition)? {
                    match self.execute_block(block)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Next | Flow::Continue => {}
                    }
                    if let Some(after_each) = after_each {
                        self.execute(after_each)?;
                    }
                }
            }
            Statement::ForEach {
                item,
                iterable,
                block,
                ..
            } => {
                // Iterates over a snapshot; mutation inside the body is not observed
                let items = match self.eval(iterable)? {
                    Value::List(items) | Value::Set(items) => items.borrow().clone(),
                    other => {
                        return Err(InterpreterError::TypeMismatch {
                            expected: "list or set".to_string(),
                            got: other.kind().to_string(),
                        });
                    }
                };
                for value in items {
                    self.frame()?.locals.insert(*item, value);
                    match self.execute_block(block)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Next | Flow::Continue => {}
                    }
                }
            }
            Statement::Return { value, .. } => {
                let value = match value {
                    Some(value) => self.eval(value)?,
                    None => Value::Void,
                };
                return Ok(Flow::Return(value));
            }
            Statement::Break => return Ok(Flow::Break),
            Statement::Continue => return Ok(Flow::Continue),
            Statement::AddToSet { set, value } => {
                let set = self.eval(set)?;
                let value = self.eval(value)?;
                self.add_to_set(&set, value)?;
            }
            Statement::Push { list, value } => {
                let list = self.eval(list)?;
                let value = self.eval(value)?;
                match list {
                    Value::List(items) => items.borrow_mut().push(value),
                    other => return Err(not_a("list", &other)),
                }
            }
            Statement::Pop { list } => {
                let list = self.eval(list)?;
                pop(&list)?;
            }
            Statement::Call(call) => {
                self.eval_call(call)?;
            }
        }
        Ok(Flow::Next)
    }

    fn assign(&mut self, place: &ql_ir::Value, value: Value) -> Result<()> {
        match place {
            ql_ir::Value::Variable(meta) => match meta.definition {
                Definition::Local(local) => {
                    self.frame()?.locals.insert(local, value);
                }
                Definition::Argument(argument) => {
                    let slot = self
                        .frame()?
                        .arguments
                        .get_mut(argument.index)
                        .ok_or_else(|| invalid("argument out of range"))?;
                    *slot = value;
                }
                Definition::Field(field) => {
                    let receiver = self.receiver()?;
                    set_field(&receiver, field.index, value)?;
                }
                Definition::Constant(_) => {
                    return Err(InterpreterError::InvalidOperation(
                        "assignment to a constant".to_string(),
                    ));
                }
            },
            ql_ir::Value::Property { of, meta } => match self.eval(of)? {
                Value::Instance(instance) => set_field(&instance, meta.field.index, value)?,
                Value::Null => return Err(InterpreterError::NullDereference),
                other => return Err(not_a("instance", &other)),
            },
            ql_ir::Value::Lookup { from, key, .. } => {
                let container = self.eval(from)?;
                let key = self.eval(key)?;
                match container {
                    Value::List(items) => {
                        let index = key.as_int().ok_or_else(|| not_a("int", &key))?;
                        let len = items.borrow().len();
                        let slot = checked_index(index, len)?;
                        items.borrow_mut()[slot] = value;
                    }
                    Value::Map(entries) => {
                        let snapshot = entries.borrow().clone();
                        match self.find_key(&snapshot, &key)? {
                            Some(slot) => entries.borrow_mut()[slot].1 = value,
                            None => entries.borrow_mut().push((key, value)),
                        }
                    }
                    other => return Err(not_a("list or map", &other)),
                }
            }
            _ => {
                return Err(InterpreterError::InvalidOperation(
                    "assignment to a non-place value".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn read(&mut self, definition: Definition) -> Result<Value> {
        match definition {
            Definition::Constant(constant) => self.constants.get(&constant).cloned().ok_or_else(|| {
                InterpreterError::InvalidOperation(format!(
                    "constant `{}` read before it was initialized",
                    self.module.constants[constant].name
                ))
            }),
            Definition::Argument(argument) => self
                .frame()?
                .arguments
                .get(argument.index)
                .cloned()
                .ok_or_else(|| invalid("argument out of range")),
            Definition::Field(field) => {
                let receiver = self.receiver()?;
                let value = receiver.fields.borrow().get(field.index).cloned();
                value.ok_or_else(|| invalid("field out of range"))
            }
            Definition::Local(local) => {
                let value = self.frame()?.locals.get(&local).cloned();
                value.ok_or_else(|| {
                    InterpreterError::InvalidOperation(format!(
                        "local `{}` read before it was set",
                        self.module.locals[local].name
                    ))
                })
            }
        }
    }

    fn eval(&mut self, value: &ql_ir::Value) -> Result<Value> {
        use ql_ir::Value as Ir;

        match value {
            Ir::LiteralBool(b) => Ok(Value::Bool(*b)),
            Ir::LiteralInt(i) => Ok(Value::Int(*i)),
            Ir::LiteralRune(c) => Ok(Value::Rune(*c)),
            Ir::LiteralString(s) => Ok(Value::String(s.clone())),
            Ir::LiteralList { items, .. } => Ok(Value::list(self.eval_all(items)?)),
            Ir::LiteralSet { items, .. } => {
                let set = Value::set(Vec::with_capacity(items.len()));
                for item in items {
                    let item = self.eval(item)?;
                    self.add_to_set(&set, item)?;
                }
                Ok(set)
            }
            Ir::LiteralMap { entries, .. } => {
                let map = Value::map(Vec::with_capacity(entries.len()));
                for (key, value) in entries {
                    let key = self.eval(key)?;
                    let value = self.eval(value)?;
                    if let Value::Map(storage) = &map {
                        let snapshot = storage.borrow().clone();
                        match self.find_key(&snapshot, &key)? {
                            Some(slot) => storage.borrow_mut()[slot].1 = value,
                            None => storage.borrow_mut().push((key, value)),
                        }
                    }
                }
                Ok(map)
            }
            Ir::EmptyList { .. } => Ok(Value::list(Vec::new())),
            Ir::EmptySet { .. } => Ok(Value::set(Vec::new())),
            Ir::EmptyMap { .. } => Ok(Value::map(Vec::new())),
            Ir::Call(call) => self.eval_call(call),
            Ir::Lookup { from, key, meta } => {
                let container = self.eval(from)?;
                let key = self.eval(key)?;
                self.lookup(meta.kind, &container, &key)
            }
            Ir::Property { of, meta } => match self.eval(of)? {
                Value::Instance(instance) => {
                    let value = instance.fields.borrow().get(meta.field.index).cloned();
                    value.ok_or_else(|| invalid("field out of range"))
                }
                Value::Null => Err(InterpreterError::NullDereference),
                other => Err(not_a("instance", &other)),
            },
            Ir::SetContains { set, value } => {
                let items = match self.eval(set)? {
                    Value::Set(items) => items.borrow().clone(),
                    other => return Err(not_a("set", &other)),
                };
                let value = self.eval(value)?;
                Ok(Value::Bool(self.position(&items, &value)?.is_some()))
            }
            Ir::New { model } => Ok(self.instantiate(*model)),
            Ir::Length { of, .. } => {
                let len = match self.eval(of)? {
                    Value::String(s) => s.chars().count(),
                    Value::List(items) | Value::Set(items) => items.borrow().len(),
                    Value::Map(entries) => entries.borrow().len(),
                    other => return Err(not_a("string or container", &other)),
                };
                i64::try_from(len)
                    .map(Value::Int)
                    .map_err(|_| invalid("length overflows int"))
            }
            Ir::Unary { operator, value, .. } => {
                let value = self.eval(value)?;
                self.eval_unary(*operator, value)
            }
            Ir::Binary {
                operator,
                left,
                right,
                ..
            } => match operator {
                BinaryOperator::And => {
                    Ok(Value::Bool(self.eval_bool(left)? && self.eval_bool(right)?))
                }
                BinaryOperator::Or => {
                    Ok(Value::Bool(self.eval_bool(left)? || self.eval_bool(right)?))
                }
                _ => {
                    let left = self.eval(left)?;
                    let right = self.eval(right)?;
                    self.eval_binary(*operator, left, right)
                }
            },
            Ir::Variable(meta) => self.read(meta.definition),
            Ir::SelfRef { .. } => self.receiver().map(Value::Instance),
            Ir::Null { .. } => Ok(Value::Null),
            Ir::Pop { list, .. } => {
                let list = self.eval(list)?;
                pop(&list)
            }
        }
    }

    fn instantiate(&self, model: ModelId) -> Value {
        let def = &self.module.models[model];
        let fields = def.fields.iter().map(|field| zero_value(&field.ty)).collect();
        Value::Instance(Rc::new(Instance {
            model,
            name: def.name.clone(),
            fields: RefCell::new(fields),
        }))
    }

    fn lookup(&mut self, kind: LookupKind, container: &Value, key: &Value) -> Result<Value> {
        match (kind, container) {
            (LookupKind::List, Value::List(items)) => {
                let index = key.as_int().ok_or_else(|| not_a("int", key))?;
                let items = items.borrow();
                let slot = checked_index(index, items.len())?;
                Ok(items[slot].clone())
            }
            (LookupKind::String, Value::String(s)) => {
                let index = key.as_int().ok_or_else(|| not_a("int", key))?;
                let len = s.chars().count();
                let slot = checked_index(index, len)?;
                s.chars()
                    .nth(slot)
                    .map(Value::Rune)
                    .ok_or(InterpreterError::IndexOutOfBounds { index, len })
            }
            (LookupKind::Map, Value::Map(entries)) => {
                let entries = entries.borrow().clone();
                match self.find_key(&entries, key)? {
                    Some(slot) => Ok(entries[slot].1.clone()),
                    None => Err(InterpreterError::MissingKey(key.to_string())),
                }
            }
            (_, Value::Null) => Err(InterpreterError::NullDereference),
            (_, other) => Err(not_a("indexable value", other)),
        }
    }

    fn add_to_set(&mut self, set: &Value, value: Value) -> Result<()> {
        let Value::Set(items) = set else {
            return Err(not_a("set", set));
        };
        let snapshot = items.borrow().clone();
        if self.position(&snapshot, &value)?.is_none() {
            items.borrow_mut().push(value);
        }
        Ok(())
    }

    fn position(&mut self, items: &[Value], value: &Value) -> Result<Option<usize>> {
        for (slot, item) in items.iter().enumerate() {
            if self.values_equal(item, value)? {
                return Ok(Some(slot));
            }
        }
        Ok(None)
    }

    fn find_key(&mut self, entries: &[(Value, Value)], key: &Value) -> Result<Option<usize>> {
        for (slot, (candidate, _)) in entries.iter().enumerate() {
            if self.values_equal(candidate, key)? {
                return Ok(Some(slot));
            }
        }
        Ok(None)
    }

    /// Program-level equality
    ///
    /// Primitives and containers compare structurally. Instances use the
    /// model's equality override when it has one and identity otherwise.
    fn values_equal(&mut self, left: &Value, right: &Value) -> Result<bool> {
        match (left, right) {
            (Value::Null, Value::Null) | (Value::Void, Value::Void) => Ok(true),
            (Value::Bool(l), Value::Bool(r)) => Ok(l == r),
            (Value::Int(l), Value::Int(r)) => Ok(l == r),
            (Value::Rune(l), Value::Rune(r)) => Ok(l == r),
            (Value::String(l), Value::String(r)) => Ok(l == r),
            (Value::List(l), Value::List(r)) => {
                if Rc::ptr_eq(l, r) {
                    return Ok(true);
                }
                let (l, r) = (l.borrow().clone(), r.borrow().clone());
                if l.len() != r.len() {
                    return Ok(false);
                }
                for (a, b) in l.iter().zip(&r) {
                    if !self.values_equal(a, b)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (Value::Set(l), Value::Set(r)) => {
                if Rc::ptr_eq(l, r) {
                    return Ok(true);
                }
                let (l, r) = (l.borrow().clone(), r.borrow().clone());
                if l.len() != r.len() {
                    return Ok(false);
                }
                for item in &l {
                    if self.position(&r, item)?.is_none() {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (Value::Map(l), Value::Map(r)) => {
                if Rc::ptr_eq(l, r) {
                    return Ok(true);
                }
                let (l, r) = (l.borrow().clone(), r.borrow().clone());
                if l.len() != r.len() {
                    return Ok(false);
                }
                for (key, value) in &l {
                    match self.find_key(&r, key)? {
                        Some(slot) if self.values_equal(value, &r[slot].1)? => {}
                        _ => return Ok(false),
                    }
                }
                Ok(true)
            }
            (Value::Instance(l), Value::Instance(r)) => {
                let module = self.module;
                match &module.models[l.model].equal_override {
                    Some(equal) if l.model == r.model => {
                        let mut locals = FxHashMap::default();
                        locals.insert(equal.other, right.clone());
                        let frame = Frame {
                            receiver: Some(left.clone()),
                            arguments: Vec::new(),
                            locals,
                        };
                        let result = self.invoke("equal", &equal.block, frame)?;
                        result.as_bool().ok_or_else(|| not_a("bool", &result))
                    }
                    _ => Ok(Rc::ptr_eq(l, r)),
                }
            }
            _ => Ok(false),
        }
    }

    /// Program-level hash, consistent with [`Self::values_equal`]
    fn hash_value(&mut self, value: &Value) -> Result<i64> {
        match value {
            Value::Void | Value::Null => Ok(0),
            Value::Bool(b) => Ok(i64::from(*b)),
            Value::Int(i) => Ok(*i),
            Value::Rune(c) => Ok(i64::from(u32::from(*c))),
            Value::String(s) => Ok(s
                .chars()
                .fold(0_i64, |h, c| h.wrapping_mul(31).wrapping_add(i64::from(u32::from(c))))),
            Value::List(items) => {
                let items = items.borrow().clone();
                let mut hash = 0_i64;
                for item in &items {
                    hash = hash.wrapping_mul(31).wrapping_add(self.hash_value(item)?);
                }
                Ok(hash)
            }
            Value::Set(items) => {
                let items = items.borrow().clone();
                let mut hash = 0_i64;
                for item in &items {
                    hash = hash.wrapping_add(self.hash_value(item)?);
                }
                Ok(hash)
            }
            Value::Map(entries) => {
                // Order independent, like sets
                let entries = entries.borrow().clone();
                let mut hash = 0_i64;
                for (key, value) in &entries {
                    let entry = self
                        .hash_value(key)?
                        .wrapping_mul(31)
                        .wrapping_add(self.hash_value(value)?);
                    hash = hash.wrapping_add(entry);
                }
                Ok(hash)
            }
            Value::Instance(instance) => {
                let module = self.module;
                let def = &module.models[instance.model];
                match &def.hash_override {
                    Some(hash) => {
                        let frame = Frame {
                            receiver: Some(value.clone()),
                            ..Frame::default()
                        };
                        let result = self.invoke("hash", &hash.block, frame)?;
                        result.as_int().ok_or_else(|| not_a("int", &result))
                    }
                    // Identity equality: every instance of a model may share one hash
                    None => Ok(i64::from(u32::from(instance.model.into_raw()))),
                }
            }
        }
    }

    fn eval_unary(&mut self, operator: UnaryOperator, value: Value) -> Result<Value> {
        match (operator, value) {
            (UnaryOperator::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
            (UnaryOperator::Negate, Value::Int(i)) => Ok(Value::Int(i.wrapping_neg())),
            (UnaryOperator::CastToInt, Value::Rune(c)) => Ok(Value::Int(i64::from(u32::from(c)))),
            (UnaryOperator::CastToString, Value::Rune(c)) => Ok(Value::String(c.to_string())),
            (UnaryOperator::Hash, value) => self.hash_value(&value).map(Value::Int),
            (operator, value) => Err(InterpreterError::InvalidOperation(format!(
                "cannot apply `{operator}` to {}",
                value.kind()
            ))),
        }
    }

    #[allow(
        clippy::too_many_lines,
        reason = "Binary operator table is inherently large"
    )]
    fn eval_binary(
        &mut self,
        operator: BinaryOperator,
        left: Value,
        right: Value,
    ) -> Result<Value> {
        use BinaryOperator as Op;

        match operator {
            Op::Equals => return self.values_equal(&left, &right).map(Value::Bool),
            Op::NotEqual => {
                return self.values_equal(&left, &right).map(|equal| Value::Bool(!equal));
            }
            _ => {}
        }

        match (left, right) {
            (Value::Int(l), Value::Int(r)) => match operator {
                Op::Add => Ok(Value::Int(l.wrapping_add(r))),
                Op::Subtract => Ok(Value::Int(l.wrapping_sub(r))),
                Op::Multiply => Ok(Value::Int(l.wrapping_mul(r))),
                Op::Divide => divide(l, r).map(Value::Int),
                Op::Modulo => remainder(l, r).map(Value::Int),
                Op::LessThan => Ok(Value::Bool(l < r)),
                Op::LessThanOrEqual => Ok(Value::Bool(l <= r)),
                Op::GreaterThan => Ok(Value::Bool(l > r)),
                Op::GreaterThanOrEqual => Ok(Value::Bool(l >= r)),
                _ => Err(unsupported(operator, "int")),
            },
            (Value::Rune(l), Value::Rune(r)) => {
                let (l, r) = (i64::from(u32::from(l)), i64::from(u32::from(r)));
                match operator {
                    Op::Add => to_rune(l.wrapping_add(r)),
                    Op::Subtract => to_rune(l.wrapping_sub(r)),
                    Op::Multiply => to_rune(l.wrapping_mul(r)),
                    Op::Divide => to_rune(divide(l, r)?),
                    Op::Modulo => to_rune(remainder(l, r)?),
                    Op::LessThan => Ok(Value::Bool(l < r)),
                    Op::LessThanOrEqual => Ok(Value::Bool(l <= r)),
                    Op::GreaterThan => Ok(Value::Bool(l > r)),
                    Op::GreaterThanOrEqual => Ok(Value::Bool(l >= r)),
                    _ => Err(unsupported(operator, "rune")),
                }
            }
            (Value::String(l), Value::String(r)) => match operator {
                Op::Add => Ok(Value::String(l + &r)),
                _ => Err(unsupported(operator, "string")),
            },
            (Value::Bool(l), Value::Bool(r)) => match operator {
                Op::And => Ok(Value::Bool(l && r)),
                Op::Or => Ok(Value::Bool(l || r)),
                _ => Err(unsupported(operator, "bool")),
            },
            (left, right) => Err(InterpreterError::TypeMismatch {
                expected: left.kind().to_string(),
                got: right.kind().to_string(),
            }),
        }
    }
}

/// Initial field value for a fresh instance
fn zero_value(ty: &Type) -> Value {
    match ty {
        Type::Primitive(Primitive::Boolean) => Value::Bool(false),
        Type::Primitive(Primitive::Int) => Value::Int(0),
        Type::Primitive(Primitive::Rune) => Value::Rune('\0'),
        Type::Primitive(Primitive::String) => Value::String(String::new()),
        Type::Primitive(Primitive::Void) => Value::Void,
        Type::List(_) => Value::list(Vec::new()),
        Type::Set(_) => Value::set(Vec::new()),
        Type::Map(..) => Value::map(Vec::new()),
        Type::Model(_) => Value::Null,
    }
}

fn set_field(instance: &Instance, index: usize, value: Value) -> Result<()> {
    let mut fields = instance.fields.borrow_mut();
    let slot = fields
        .get_mut(index)
        .ok_or_else(|| invalid("field out of range"))?;
    *slot = value;
    Ok(())
}

fn pop(list: &Value) -> Result<Value> {
    match list {
        Value::List(items) => items.borrow_mut().pop().ok_or(InterpreterError::PopFromEmptyList),
        Value::Null => Err(InterpreterError::NullDereference),
        other => Err(not_a("list", other)),
    }
}

fn checked_index(index: i64, len: usize) -> Result<usize> {
    usize::try_from(index)
        .ok()
        .filter(|slot| *slot < len)
        .ok_or(InterpreterError::IndexOutOfBounds { index, len })
}

fn divide(l: i64, r: i64) -> Result<i64> {
    if r == 0 {
        return Err(InterpreterError::DivisionByZero);
    }
    Ok(l.wrapping_div(r))
}

fn remainder(l: i64, r: i64) -> Result<i64> {
    if r == 0 {
        return Err(InterpreterError::DivisionByZero);
    }
    Ok(l.wrapping_rem(r))
}

fn to_rune(code: i64) -> Result<Value> {
    u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .map(Value::Rune)
        .ok_or_else(|| InterpreterError::InvalidOperation(format!("{code} is not a valid rune")))
}

fn not_a(expected: &str, got: &Value) -> InterpreterError {
    InterpreterError::TypeMismatch {
        expected: expected.to_string(),
        got: got.kind().to_string(),
    }
}

fn invalid(message: &str) -> InterpreterError {
    InterpreterError::InvalidOperation(message.to_string())
}

fn unsupported(operator: BinaryOperator, operand: &str) -> InterpreterError {
    InterpreterError::InvalidOperation(format!("cannot apply `{operator}` to {operand}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ql_syntax::{
        self as syntax, BinaryOperator as Op, Block as SyntaxBlock, Statement as S, Type as T,
        Value as V,
    };

    fn lower(module: syntax::Module) -> Module {
        ql_lower::lower(&module).expect("module should lower")
    }

    fn single(name: &str, return_type: T, statements: Vec<S>) -> Module {
        lower(syntax::Module::new("Demo").with_function(syntax::FunctionDef::new(
            name,
            return_type,
            SyntaxBlock::new(statements),
        )))
    }

    #[test]
    fn test_arithmetic() {
        let module = single(
            "main",
            T::Int,
            vec![S::ret(V::binary(V::int(8), Op::Add, V::int(2)))],
        );
        let mut interpreter = Interpreter::new(&module);
        assert_eq!(interpreter.run("main", vec![]).unwrap(), Value::Int(10));
    }

    #[test]
    fn test_division_by_zero() {
        let module = single(
            "main",
            T::Int,
            vec![S::ret(V::binary(V::int(1), Op::Divide, V::int(0)))],
        );
        let mut interpreter = Interpreter::new(&module);
        assert_eq!(
            interpreter.run("main", vec![]).unwrap_err(),
            InterpreterError::DivisionByZero
        );
    }

    #[test]
    fn test_entry_checks() {
        let module = lower(syntax::Module::new("Demo").with_function(
            syntax::FunctionDef::new("twice", T::Int, SyntaxBlock::new(vec![S::ret(V::binary(
                V::var("n"),
                Op::Multiply,
                V::int(2),
            ))]))
            .with_argument("n", T::Int),
        ));
        let mut interpreter = Interpreter::new(&module);
        assert_eq!(interpreter.run("twice", vec![Value::Int(21)]).unwrap(), Value::Int(42));
        assert_eq!(
            interpreter.run("missing", vec![]).unwrap_err(),
            InterpreterError::UnknownEntry("missing".to_string())
        );
        assert!(matches!(
            interpreter.run("twice", vec![]),
            Err(InterpreterError::ArgumentMismatch { expected: 1, got: 0, .. })
        ));
        assert!(matches!(
            interpreter.run("twice", vec![Value::Bool(true)]),
            Err(InterpreterError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_loop_with_break_and_continue() {
        // sum of odd numbers below 10, stopping at 7
        let module = single(
            "main",
            T::Int,
            vec![
                S::declare("sum", V::int(0)),
                S::For {
                    initialization: Some(Box::new(S::declare("i", V::int(0)))),
                    condition: V::binary(V::var("i"), Op::LessThan, V::int(10)),
                    after_each: Some(Box::new(S::assign(
                        V::var("i"),
                        V::binary(V::var("i"), Op::Add, V::int(1)),
                    ))),
                    block: SyntaxBlock::new(vec![
                        S::if_then(
                            V::binary(
                                V::binary(V::var("i"), Op::Modulo, V::int(2)),
                                Op::Equals,
                                V::int(0),
                            ),
                            SyntaxBlock::new(vec![S::Continue]),
                        ),
                        S::if_then(
                            V::binary(V::var("i"), Op::Equals, V::int(7)),
                            SyntaxBlock::new(vec![S::Break]),
                        ),
                        S::assign(V::var("sum"), V::binary(V::var("sum"), Op::Add, V::var("i"))),
                    ]),
                },
                S::ret(V::var("sum")),
            ],
        );
        let mut interpreter = Interpreter::new(&module);
        assert_eq!(interpreter.run("main", vec![]).unwrap(), Value::Int(1 + 3 + 5));
    }

    #[test]
    fn test_containers() {
        let module = single(
            "main",
            T::Int,
            vec![
                S::declare("seen", V::set(vec![V::int(1), V::int(1), V::int(2)])),
                S::method_call(V::var("seen"), "add", vec![V::int(2)]),
                S::declare("xs", V::list(vec![V::int(4)])),
                S::method_call(V::var("xs"), "push", vec![V::int(5)]),
                S::declare("ages", V::map(vec![(V::string("a"), V::int(30))])),
                S::assign(V::lookup(V::var("ages"), V::string("b")), V::int(12)),
                S::ret(V::binary(
                    V::binary(
                        V::length(V::var("seen")),
                        Op::Add,
                        V::lookup(V::var("xs"), V::int(1)),
                    ),
                    Op::Add,
                    V::lookup(V::var("ages"), V::string("b")),
                )),
            ],
        );
        let mut interpreter = Interpreter::new(&module);
        assert_eq!(interpreter.run("main", vec![]).unwrap(), Value::Int(2 + 5 + 12));
    }

    #[test]
    fn test_runtime_faults() {
        let out_of_bounds = single(
            "main",
            T::Int,
            vec![S::ret(V::lookup(V::list(vec![V::int(1)]), V::int(3)))],
        );
        assert_eq!(
            Interpreter::new(&out_of_bounds).run("main", vec![]).unwrap_err(),
            InterpreterError::IndexOutOfBounds { index: 3, len: 1 }
        );

        let missing = single(
            "main",
            T::Int,
            vec![S::ret(V::lookup(
                V::map(vec![(V::string("a"), V::int(1))]),
                V::string("z"),
            ))],
        );
        assert_eq!(
            Interpreter::new(&missing).run("main", vec![]).unwrap_err(),
            InterpreterError::MissingKey("\"z\"".to_string())
        );
    }

    fn point_module(with_override: bool) -> Module {
        let mut point = syntax::ModelDef::new("Point")
            .with_field("x", T::Int)
            .with_method(syntax::FunctionDef::new(
                "getX",
                T::Int,
                SyntaxBlock::new(vec![S::ret(V::var("x"))]),
            ));
        if with_override {
            point = point.with_equal_override(
                "other",
                SyntaxBlock::new(vec![S::ret(V::binary(
                    V::var("x"),
                    Op::Equals,
                    V::property(V::var("other"), "x"),
                ))]),
            );
        }
        lower(
            syntax::Module::new("Geometry")
                .with_model(point)
                .with_function(syntax::FunctionDef::new(
                    "main",
                    T::Int,
                    SyntaxBlock::new(vec![
                        S::declare("a", V::new_instance("Point")),
                        S::declare("b", V::new_instance("Point")),
                        S::assign(V::property(V::var("a"), "x"), V::int(3)),
                        S::assign(V::property(V::var("b"), "x"), V::int(3)),
                        S::declare("points", V::EmptySet { item: T::model("Point") }),
                        S::method_call(V::var("points"), "add", vec![V::var("a")]),
                        S::method_call(V::var("points"), "add", vec![V::var("b")]),
                        S::ret(V::binary(
                            V::length(V::var("points")),
                            Op::Add,
                            V::method_call(V::var("b"), "getX", vec![]),
                        )),
                    ]),
                )),
        )
    }

    #[test]
    fn test_set_membership_uses_equal_override() {
        let identity = point_module(false);
        assert_eq!(Interpreter::new(&identity).run("main", vec![]).unwrap(), Value::Int(2 + 3));

        let overridden = point_module(true);
        assert_eq!(Interpreter::new(&overridden).run("main", vec![]).unwrap(), Value::Int(1 + 3));
    }

    #[test]
    fn test_sets_compare_without_order() {
        let pair = |a, b| V::set(vec![V::int(a), V::int(b)]);
        let module = single(
            "main",
            T::Bool,
            vec![
                S::declare("outer", V::set(vec![pair(1, 2)])),
                S::ret(V::method_call(V::var("outer"), "contains", vec![pair(2, 1)])),
            ],
        );
        assert_eq!(Interpreter::new(&module).run("main", vec![]).unwrap(), Value::Bool(true));

        let hashes = single(
            "main",
            T::Bool,
            vec![S::ret(V::binary(
                V::unary(syntax::UnaryOperator::Hash, pair(1, 2)),
                Op::Equals,
                V::unary(syntax::UnaryOperator::Hash, pair(2, 1)),
            ))],
        );
        assert_eq!(Interpreter::new(&hashes).run("main", vec![]).unwrap(), Value::Bool(true));

        let keys = single(
            "main",
            T::Int,
            vec![
                S::declare("sizes", V::map(vec![(pair(1, 2), V::int(7))])),
                S::ret(V::lookup(V::var("sizes"), pair(2, 1))),
            ],
        );
        assert_eq!(Interpreter::new(&keys).run("main", vec![]).unwrap(), Value::Int(7));
    }

    #[test]
    fn test_constants_are_initialized() {
        let module = lower(
            syntax::Module::new("Demo")
                .with_constant(syntax::ConstantDef::new("LIMIT", V::int(40)))
                .with_function(syntax::FunctionDef::new(
                    "main",
                    T::Int,
                    SyntaxBlock::new(vec![S::ret(V::binary(V::var("LIMIT"), Op::Add, V::int(2)))]),
                )),
        );
        assert_eq!(Interpreter::new(&module).run("main", vec![]).unwrap(), Value::Int(42));
    }

    #[test]
    fn test_null_dereference() {
        let module = lower(
            syntax::Module::new("Links")
                .with_model(
                    syntax::ModelDef::new("Node")
                        .with_field("value", T::Int)
                        .with_field("next", T::model("Node")),
                )
                .with_function(syntax::FunctionDef::new(
                    "main",
                    T::Int,
                    SyntaxBlock::new(vec![
                        S::declare("head", V::new_instance("Node")),
                        S::ret(V::property(V::property(V::var("head"), "next"), "value")),
                    ]),
                )),
        );
        assert_eq!(
            Interpreter::new(&module).run("main", vec![]).unwrap_err(),
            InterpreterError::NullDereference
        );
    }
}
