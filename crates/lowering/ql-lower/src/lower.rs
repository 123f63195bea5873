//! Syntax → IR lowering with name resolution and type checking
//!
//! The driver makes one depth-first sweep that builds every signature
//! and leaves bodies on a FIFO queue, then drains the queue. A body can
//! therefore refer to any function, model or method of the module no
//! matter where it is written.

use crate::deferred::{Continuation, DeferredQueue};
use crate::error::{LowerError, LowerResult};
use crate::options::LowerOptions;
use crate::scope::{BlockScope, Frame, ScopeStack};
use crate::types::{self, type_of};
use crate::validate;
use ql_ir::{
    self as ir, CallMetadata, CallableRef, Definition, FieldRef, ForEachMetadata, FunctionId,
    LocalDef, LocalKind, LookupKind, LookupMetadata, ModelId, OperationMetadata, Owner,
    Primitive, PropertyMetadata, ReturnMetadata, Type, VariableMetadata,
};
use ql_syntax as syntax;
use tracing::{debug, info_span};

/// Lower a module with default options
///
/// # Errors
/// Returns the first [`LowerError`] encountered
pub fn lower(module: &syntax::Module) -> LowerResult<ir::Module> {
    Lowerer::new(LowerOptions::default()).lower(module)
}

/// Configured lowering entry point
#[derive(Debug, Clone, Default)]
pub struct Lowerer {
    options: LowerOptions,
}

impl Lowerer {
    /// Create a lowerer
    #[must_use]
    pub fn new(options: LowerOptions) -> Self {
        Self { options }
    }

    /// Lower `module` into a fully typed IR module
    ///
    /// # Errors
    /// Returns the first [`LowerError`] encountered; no partial module is
    /// produced
    pub fn lower(&self, module: &syntax::Module) -> LowerResult<ir::Module> {
        let _span = info_span!("lower", module = %module.name).entered();
        let mut ctx = LoweringContext::new(&module.name, self.options);
        ctx.lower_module(module)?;
        debug!(
            functions = ctx.module.functions.len(),
            models = ctx.module.models.len(),
            continuations = ctx.queue.executed(),
            "lowering finished"
        );
        Ok(ctx.module)
    }
}

/// `arguments` as a fixed-size array, for built-in container methods
fn fixed_arguments<'a, const N: usize>(
    name: &str,
    arguments: &'a [syntax::Value],
) -> LowerResult<&'a [syntax::Value; N]> {
    <&[syntax::Value; N]>::try_from(arguments).map_err(|_| LowerError::ArgumentCountMismatch {
        function: name.to_string(),
        expected: N,
        found: arguments.len(),
    })
}

/// Whether a constant initializer only uses statically known parts
fn is_constant_form(value: &syntax::Value) -> bool {
    use syntax::Value as V;
    match value {
        V::LiteralBool { .. }
        | V::LiteralInt { .. }
        | V::LiteralRune { .. }
        | V::LiteralString { .. }
        | V::EmptyList { .. }
        | V::EmptySet { .. }
        | V::EmptyMap { .. }
        | V::Variable { .. } => true,
        V::LiteralList { items } | V::LiteralSet { items } => items.iter().all(is_constant_form),
        V::LiteralMap { entries } => entries
            .iter()
            .all(|entry| is_constant_form(&entry.key) && is_constant_form(&entry.value)),
        V::Unary { value, .. } => is_constant_form(value),
        V::Binary { left, right, .. } => is_constant_form(left) && is_constant_form(right),
        _ => false,
    }
}

struct LoweringContext<'syn> {
    module: ir::Module,
    scope: ScopeStack,
    queue: DeferredQueue<'syn>,
    options: LowerOptions,
}

impl<'syn> LoweringContext<'syn> {
    fn new(name: &str, options: LowerOptions) -> Self {
        Self {
            module: ir::Module::new(name),
            scope: ScopeStack::new(),
            queue: DeferredQueue::new(),
            options,
        }
    }

    /// Run `f` with `frame` pushed; the frame is popped on every path
    fn with_frame<T>(
        &mut self,
        frame: Frame,
        f: impl FnOnce(&mut Self) -> LowerResult<T>,
    ) -> LowerResult<T> {
        self.scope.push(frame);
        let result = f(self);
        self.scope.pop();
        result
    }

    fn defer(&mut self, work: Continuation<'syn>) {
        self.queue.enqueue(self.scope.clone(), work);
    }

    fn lower_module(&mut self, module: &'syn syntax::Module) -> LowerResult<()> {
        validate::type_name(&module.name)?;

        self.with_frame(Frame::Module, |this| {
            debug!(count = module.models.len(), "declaring models");
            let mut models = Vec::with_capacity(module.models.len());
            for model in &module.models {
                validate::type_name(&model.name)?;
                models.push(this.module.declare_model(&model.name)?);
            }

            debug!(count = module.constants.len(), "lowering constants");
            for constant in &module.constants {
                this.lower_constant(constant)?;
            }

            debug!(count = module.functions.len(), "lowering function signatures");
            for function in &module.functions {
                this.lower_function_signature(function)?;
            }

            debug!(count = models.len(), "lowering model skeletons");
            for (id, model) in models.into_iter().zip(&module.models) {
                this.lower_model_skeleton(id, model)?;
            }
            Ok(())
        })?;

        self.drain()
    }

    fn drain(&mut self) -> LowerResult<()> {
        debug!(pending = self.queue.len(), "draining deferred work");
        while let Some(deferred) = self.queue.dequeue() {
            if let Some(limit) = self.options.max_deferred {
                if self.queue.executed() > limit {
                    return Err(LowerError::StructuralError(format!(
                        "more than {limit} deferred continuations"
                    )));
                }
            }
            debug!(work = %deferred.work, depth = deferred.scope.depth(), "running continuation");

            let outer = std::mem::replace(&mut self.scope, deferred.scope);
            let result = self.run(deferred.work);
            self.scope = outer;
            result?;
        }
        Ok(())
    }

    fn run(&mut self, work: Continuation<'syn>) -> LowerResult<()> {
        match work {
            Continuation::FunctionBody { function, block }
            | Continuation::MethodBody { function, block } => {
                let lowered = self.lower_callable_body(CallableRef::Function(function), block)?;
                self.module.functions[function].block = lowered;
                Ok(())
            }
            Continuation::ModelBody { model, syntax: def } => self.dispatch_model_body(model, def),
            Continuation::EqualOverride { model, block } => {
                let lowered = self.lower_callable_body(CallableRef::EqualOverride(model), block)?;
                match self.module.models[model].equal_override.as_mut() {
                    Some(equal) => {
                        equal.block = lowered;
                        Ok(())
                    }
                    None => Err(LowerError::StructuralError(
                        "equality override body without a skeleton".to_string(),
                    )),
                }
            }
            Continuation::HashOverride { model, block } => {
                let lowered = self.lower_callable_body(CallableRef::HashOverride(model), block)?;
                match self.module.models[model].hash_override.as_mut() {
                    Some(hash) => {
                        hash.block = lowered;
                        Ok(())
                    }
                    None => Err(LowerError::StructuralError(
                        "hash override body without a skeleton".to_string(),
                    )),
                }
            }
        }
    }

    fn lower_callable_body(
        &mut self,
        callable: CallableRef,
        block: &syntax::Block,
    ) -> LowerResult<ir::Block> {
        let lowered = self.lower_block(block)?;
        validate::terminal_return(
            &self.module.callable_name(callable),
            &self.module.callable_return_type(callable),
            &lowered.statements,
        )?;
        Ok(lowered)
    }

    // Definitions

    fn lower_constant(&mut self, constant: &syntax::ConstantDef) -> LowerResult<()> {
        validate::constant_name(&constant.name)?;
        if !is_constant_form(&constant.value) {
            return Err(LowerError::InvalidConstant(constant.name.clone()));
        }
        let value = self.lower_value(&constant.value)?;
        let ty = type_of(&self.module, &value)?;
        self.module.declare_constant(ir::ConstantDef {
            name: constant.name.clone(),
            value,
            ty,
        })?;
        Ok(())
    }

    fn lower_signature(
        &mut self,
        function: &syntax::FunctionDef,
    ) -> LowerResult<(Vec<ir::ArgumentDef>, Type)> {
        let mut arguments: Vec<ir::ArgumentDef> = Vec::with_capacity(function.arguments.len());
        for argument in &function.arguments {
            validate::member_name(&argument.name)?;
            if arguments.iter().any(|existing| existing.name == argument.name) {
                return Err(LowerError::DuplicateDefinition(argument.name.clone()));
            }
            arguments.push(ir::ArgumentDef {
                name: argument.name.clone(),
                ty: self.lower_value_type(&argument.ty)?,
            });
        }
        let return_type = self.lower_type(&function.return_type)?;
        Ok((arguments, return_type))
    }

    fn lower_function_signature(&mut self, function: &'syn syntax::FunctionDef) -> LowerResult<()> {
        validate::member_name(&function.name)?;
        let (arguments, return_type) = self.lower_signature(function)?;
        let id = self.module.declare_function(ir::FunctionDef {
            name: function.name.clone(),
            arguments,
            return_type,
            block: ir::Block::default(),
            owner: Owner::Module,
        })?;

        self.with_frame(Frame::Function(id), |this| {
            this.defer(Continuation::FunctionBody {
                function: id,
                block: &function.block,
            });
            Ok(())
        })
    }

    fn lower_model_skeleton(
        &mut self,
        id: ModelId,
        model: &'syn syntax::ModelDef,
    ) -> LowerResult<()> {
        self.with_frame(Frame::Model(id), |this| {
            for field in &model.fields {
                validate::member_name(&field.name)?;
                let ty = this.lower_value_type(&field.ty)?;
                this.module.models[id].declare_field(ir::FieldDef {
                    name: field.name.clone(),
                    ty,
                })?;
            }

            for method in &model.methods {
                validate::member_name(&method.name)?;
                let (arguments, return_type) = this.lower_signature(method)?;
                let function = this.module.alloc_method(ir::FunctionDef {
                    name: method.name.clone(),
                    arguments,
                    return_type,
                    block: ir::Block::default(),
                    owner: Owner::Model(id),
                });
                this.module.models[id].declare_method(&method.name, function)?;
            }

            this.defer(Continuation::ModelBody {
                model: id,
                syntax: model,
            });
            Ok(())
        })
    }

    fn dispatch_model_body(
        &mut self,
        model: ModelId,
        def: &'syn syntax::ModelDef,
    ) -> LowerResult<()> {
        let methods = self.module.models[model].methods.clone();
        for (function, method) in methods.into_iter().zip(&def.methods) {
            self.with_frame(Frame::Function(function), |this| {
                this.defer(Continuation::MethodBody {
                    function,
                    block: &method.block,
                });
                Ok(())
            })?;
        }

        if let Some(equal) = &def.equal_override {
            validate::member_name(&equal.other_name)?;
            let other = self.module.alloc_local(LocalDef {
                name: equal.other_name.clone(),
                ty: Type::Model(model),
                kind: LocalKind::OverrideOther,
            });
            self.module.models[model].equal_override = Some(ir::EqualOverride {
                other,
                block: ir::Block::default(),
            });
            let frame = Frame::EqualOverride {
                model,
                other_name: equal.other_name.clone(),
                other,
            };
            self.with_frame(frame, |this| {
                this.defer(Continuation::EqualOverride {
                    model,
                    block: &equal.block,
                });
                Ok(())
            })?;
        }

        if let Some(hash) = &def.hash_override {
            self.module.models[model].hash_override = Some(ir::HashOverride {
                block: ir::Block::default(),
            });
            self.with_frame(Frame::HashOverride(model), |this| {
                this.defer(Continuation::HashOverride {
                    model,
                    block: &hash.block,
                });
                Ok(())
            })?;
        }
        Ok(())
    }

    // Types

    fn lower_type(&self, ty: &syntax::Type) -> LowerResult<Type> {
        Ok(match ty {
            syntax::Type::Bool => Type::BOOLEAN,
            syntax::Type::Int => Type::INT,
            syntax::Type::Rune => Type::RUNE,
            syntax::Type::String => Type::STRING,
            syntax::Type::Void => Type::VOID,
            syntax::Type::List { item } => Type::list(self.lower_value_type(item)?),
            syntax::Type::Set { item } => Type::set(self.lower_value_type(item)?),
            syntax::Type::Map { key, value } => {
                Type::map(self.lower_value_type(key)?, self.lower_value_type(value)?)
            }
            syntax::Type::Model { name } => Type::Model(
                self.module
                    .model(name)
                    .ok_or_else(|| LowerError::NameNotFound(name.clone()))?,
            ),
        })
    }

    /// A type that can hold a value, i.e. anything but `void`
    fn lower_value_type(&self, ty: &syntax::Type) -> LowerResult<Type> {
        let lowered = self.lower_type(ty)?;
        if lowered.is_void() {
            return Err(LowerError::mismatch("a value type", "void"));
        }
        Ok(lowered)
    }

    // Statements

    fn lower_block(&mut self, block: &syntax::Block) -> LowerResult<ir::Block> {
        self.with_frame(Frame::Block(BlockScope::default()), |this| {
            let mut statements = Vec::with_capacity(block.statements.len());
            for statement in &block.statements {
                statements.push(this.lower_statement(statement)?);
            }
            Ok(ir::Block { statements })
        })
    }

    fn lower_statement(&mut self, statement: &syntax::Statement) -> LowerResult<ir::Statement> {
        match statement {
            syntax::Statement::Declare { name, value } => self.lower_declare(name, value),
            syntax::Statement::Assign { to, from } => self.lower_assign(to, from),
            syntax::Statement::Conditional { ifs, else_block } => {
                if ifs.is_empty() {
                    return Err(LowerError::StructuralError(
                        "conditional without an if arm".to_string(),
                    ));
                }
                let mut arms = Vec::with_capacity(ifs.len());
                for arm in ifs {
                    let condition = self.lower_value(&arm.condition)?;
                    validate::condition(&self.module, &condition)?;
                    let block = self.lower_block(&arm.block)?;
                    arms.push(ir::If { condition, block });
                }
                let else_block = else_block
                    .as_ref()
                    .map(|block| self.lower_block(block))
                    .transpose()?;
                Ok(ir::Statement::Conditional {
                    ifs: arms,
                    else_block,
                })
            }
            syntax::Statement::For {
                initialization,
                condition,
                after_each,
                block,
            } => self.with_frame(Frame::For(None), |this| {
                let initialization = initialization
                    .as_deref()
                    .map(|init| this.lower_statement(init))
                    .transpose()?
                    .map(Box::new);
                let condition = this.lower_value(condition)?;
                validate::condition(&this.module, &condition)?;
                let after_each = after_each
                    .as_deref()
                    .map(|after| this.lower_statement(after))
                    .transpose()?
                    .map(Box::new);
                let block = this.lower_block(block)?;
                Ok(ir::Statement::For {
                    initialization,
                    condition,
                    after_each,
                    block,
                })
            }),
            syntax::Statement::ForEach {
                item_name,
                iterable,
                block,
            } => {
                validate::member_name(item_name)?;
                let iterable = self.lower_value(iterable)?;
                let (kind, item_type) =
                    types::iterable_kind(&self.module, &type_of(&self.module, &iterable)?)?;
                let item = self.module.alloc_local(LocalDef {
                    name: item_name.clone(),
                    ty: item_type.clone(),
                    kind: LocalKind::ForEachItem,
                });
                let frame = Frame::ForEach {
                    name: item_name.clone(),
                    item,
                };
                let block = self.with_frame(frame, |this| this.lower_block(block))?;
                Ok(ir::Statement::ForEach {
                    item,
                    iterable,
                    block,
                    meta: ForEachMetadata { kind, item_type },
                })
            }
            syntax::Statement::Return { value } => {
                let callable = self.scope.enclosing_callable().ok_or_else(|| {
                    LowerError::StructuralError("return outside of a callable".to_string())
                })?;
                let expected = self.module.callable_return_type(callable);
                let value = value
                    .as_ref()
                    .map(|value| self.lower_value_expecting(value, &expected))
                    .transpose()?;
                validate::return_value(&self.module, &expected, value.as_ref())?;
                Ok(ir::Statement::Return {
                    value,
                    meta: ReturnMetadata { callable },
                })
            }
            syntax::Statement::Break | syntax::Statement::Continue => {
                if !self.scope.in_loop() {
                    return Err(LowerError::LoopControlOutsideLoop);
                }
                Ok(if matches!(statement, syntax::Statement::Break) {
                    ir::Statement::Break
                } else {
                    ir::Statement::Continue
                })
            }
            syntax::Statement::AddToSet { set, value } => {
                let set = self.lower_value(set)?;
                self.add_to_set(set, value)
            }
            syntax::Statement::Push { list, value } => {
                let list = self.lower_value(list)?;
                self.push(list, value)
            }
            syntax::Statement::Pop { list } => {
                let list = self.lower_value(list)?;
                self.list_item(&list)?;
                Ok(ir::Statement::Pop { list })
            }
            syntax::Statement::Call(call) => self.lower_call_statement(call),
        }
    }

    fn lower_declare(&mut self, name: &str, value: &syntax::Value) -> LowerResult<ir::Statement> {
        validate::member_name(name)?;
        let value = self.lower_value(value)?;
        let ty = type_of(&self.module, &value)?;
        if ty.is_void() {
            return Err(LowerError::mismatch("a value", "void"));
        }
        let local = self.module.alloc_local(LocalDef {
            name: name.to_string(),
            ty,
            kind: LocalKind::Declared,
        });
        self.scope.bind_local(name, local)?;
        Ok(ir::Statement::Declare { local, value })
    }

    fn lower_assign(
        &mut self,
        to: &syntax::Value,
        from: &syntax::Value,
    ) -> LowerResult<ir::Statement> {
        let to = self.lower_place(to)?;
        let target = type_of(&self.module, &to)?;
        let from = self.lower_value_expecting(from, &target)?;
        types::ensure_type(&self.module, &target, &type_of(&self.module, &from)?)?;
        Ok(ir::Statement::Assign { to, from })
    }

    /// The left-hand side of an assignment
    fn lower_place(&mut self, to: &syntax::Value) -> LowerResult<ir::Value> {
        match to {
            syntax::Value::Variable { name } => {
                let place = self.lower_value(to)?;
                if let ir::Value::Variable(VariableMetadata {
                    definition: Definition::Constant(_),
                    ..
                }) = place
                {
                    return Err(LowerError::InvalidAssignment(format!("constant {name}")));
                }
                Ok(place)
            }
            syntax::Value::Property { .. } => self.lower_value(to),
            syntax::Value::Lookup { .. } => {
                let place = self.lower_value(to)?;
                if let ir::Value::Lookup {
                    meta:
                        LookupMetadata {
                            kind: LookupKind::String,
                            ..
                        },
                    ..
                } = place
                {
                    return Err(LowerError::InvalidAssignment("a string index".to_string()));
                }
                Ok(place)
            }
            _ => Err(LowerError::InvalidAssignment(
                "a value that is not a variable, field or element".to_string(),
            )),
        }
    }

    // Container built-ins

    fn list_item(&self, list: &ir::Value) -> LowerResult<Type> {
        match type_of(&self.module, list)? {
            Type::List(item) => Ok(*item),
            other => Err(LowerError::mismatch("list", self.module.type_name(&other))),
        }
    }

    fn set_item(&self, set: &ir::Value) -> LowerResult<Type> {
        match type_of(&self.module, set)? {
            Type::Set(item) => Ok(*item),
            other => Err(LowerError::mismatch("set", self.module.type_name(&other))),
        }
    }

    /// Lower `value` and require it to have type `expected`
    fn lower_element(&mut self, expected: &Type, value: &syntax::Value) -> LowerResult<ir::Value> {
        let value = self.lower_value(value)?;
        types::ensure_type(&self.module, expected, &type_of(&self.module, &value)?)?;
        Ok(value)
    }

    fn add_to_set(&mut self, set: ir::Value, value: &syntax::Value) -> LowerResult<ir::Statement> {
        let item = self.set_item(&set)?;
        let value = self.lower_element(&item, value)?;
        Ok(ir::Statement::AddToSet { set, value })
    }

    fn push(&mut self, list: ir::Value, value: &syntax::Value) -> LowerResult<ir::Statement> {
        let item = self.list_item(&list)?;
        let value = self.lower_element(&item, value)?;
        Ok(ir::Statement::Push { list, value })
    }

    fn contains(&mut self, set: ir::Value, value: &syntax::Value) -> LowerResult<ir::Value> {
        let item = self.set_item(&set)?;
        let value = self.lower_element(&item, value)?;
        Ok(ir::Value::SetContains {
            set: Box::new(set),
            value: Box::new(value),
        })
    }

    // Calls

    fn lower_arguments(
        &mut self,
        function: FunctionId,
        arguments: &[syntax::Value],
    ) -> LowerResult<Vec<ir::Value>> {
        let expected = self.module.functions[function].arguments.len();
        if expected != arguments.len() {
            return Err(LowerError::ArgumentCountMismatch {
                function: self.module.functions[function].name.clone(),
                expected,
                found: arguments.len(),
            });
        }

        let mut lowered = Vec::with_capacity(arguments.len());
        for (index, argument) in arguments.iter().enumerate() {
            let parameter = self.module.functions[function].arguments[index].ty.clone();
            lowered.push(self.lower_element(&parameter, argument)?);
        }
        Ok(lowered)
    }

    fn call(
        &mut self,
        function: FunctionId,
        receiver: Option<ir::Value>,
        arguments: &[syntax::Value],
    ) -> LowerResult<ir::Call> {
        let arguments = self.lower_arguments(function, arguments)?;
        Ok(ir::Call {
            receiver: receiver.map(Box::new),
            arguments,
            meta: CallMetadata {
                function,
                return_type: self.module.functions[function].return_type.clone(),
            },
        })
    }

    /// A plain `f(...)`: a method of the enclosing model shadows a free
    /// function of the same name and is called on `self`
    fn lower_function_call(
        &mut self,
        name: &str,
        arguments: &[syntax::Value],
    ) -> LowerResult<ir::Call> {
        if let Some(model) = self.scope.enclosing_model() {
            if let Some(method) = self.module.models[model].method(name) {
                return self.call(method, Some(ir::Value::SelfRef { model }), arguments);
            }
        }
        let function = self
            .module
            .function(name)
            .ok_or_else(|| LowerError::NameNotFound(name.to_string()))?;
        self.call(function, None, arguments)
    }

    fn lower_method_call(
        &mut self,
        receiver: ir::Value,
        receiver_type: &Type,
        name: &str,
        arguments: &[syntax::Value],
    ) -> LowerResult<ir::Call> {
        let function = types::resolve_method(&self.module, receiver_type, name)?;
        self.call(function, Some(receiver), arguments)
    }

    /// A call in statement position; `set.add`, `list.push` and
    /// `list.pop` become their dedicated statements
    fn lower_call_statement(&mut self, call: &syntax::Call) -> LowerResult<ir::Statement> {
        match &call.function {
            syntax::Callable::Function { name } => {
                Ok(ir::Statement::Call(self.lower_function_call(name, &call.arguments)?))
            }
            syntax::Callable::Property { of, name } => {
                let receiver = self.lower_value(of)?;
                let receiver_type = type_of(&self.module, &receiver)?;
                match (&receiver_type, name.as_str()) {
                    (Type::Set(_), "add") => {
                        let [value] = fixed_arguments::<1>(name, &call.arguments)?;
                        self.add_to_set(receiver, value)
                    }
                    (Type::List(_), "push") => {
                        let [value] = fixed_arguments::<1>(name, &call.arguments)?;
                        self.push(receiver, value)
                    }
                    (Type::List(_), "pop") => {
                        let [] = fixed_arguments::<0>(name, &call.arguments)?;
                        Ok(ir::Statement::Pop { list: receiver })
                    }
                    _ => Ok(ir::Statement::Call(self.lower_method_call(
                        receiver,
                        &receiver_type,
                        name,
                        &call.arguments,
                    )?)),
                }
            }
        }
    }

    /// A call in value position; `set.contains` and `list.pop` become
    /// their dedicated values
    fn lower_call_value(&mut self, call: &syntax::Call) -> LowerResult<ir::Value> {
        match &call.function {
            syntax::Callable::Function { name } => {
                Ok(ir::Value::Call(self.lower_function_call(name, &call.arguments)?))
            }
            syntax::Callable::Property { of, name } => {
                let receiver = self.lower_value(of)?;
                let receiver_type = type_of(&self.module, &receiver)?;
                match (&receiver_type, name.as_str()) {
                    (Type::Set(_), "contains") => {
                        let [value] = fixed_arguments::<1>(name, &call.arguments)?;
                        self.contains(receiver, value)
                    }
                    (Type::List(item), "pop") => {
                        let [] = fixed_arguments::<0>(name, &call.arguments)?;
                        let item = (**item).clone();
                        Ok(ir::Value::Pop {
                            list: Box::new(receiver),
                            item,
                        })
                    }
                    _ => Ok(ir::Value::Call(self.lower_method_call(
                        receiver,
                        &receiver_type,
                        name,
                        &call.arguments,
                    )?)),
                }
            }
        }
    }

    // Values

    /// Lower `value` where a `null` takes the type `expected`
    fn lower_value_expecting(
        &mut self,
        value: &syntax::Value,
        expected: &Type,
    ) -> LowerResult<ir::Value> {
        match value {
            syntax::Value::Null if expected.is_void() => Err(LowerError::InvalidNull),
            syntax::Value::Null => Ok(ir::Value::Null {
                ty: expected.clone(),
            }),
            _ => self.lower_value(value),
        }
    }

    fn lower_values(&mut self, values: &[syntax::Value]) -> LowerResult<Vec<ir::Value>> {
        values.iter().map(|value| self.lower_value(value)).collect()
    }

    fn lower_binary(
        &mut self,
        operator: ir::BinaryOperator,
        left: &syntax::Value,
        right: &syntax::Value,
    ) -> LowerResult<ir::Value> {
        let (left, right, output) = match (left, right) {
            (syntax::Value::Null, syntax::Value::Null) => return Err(LowerError::InvalidNull),
            (syntax::Value::Null, other) if operator.is_equality() => {
                let right = self.lower_value(other)?;
                let ty = type_of(&self.module, &right)?;
                let left = self.lower_value_expecting(left, &ty)?;
                (left, right, Primitive::Boolean)
            }
            (other, syntax::Value::Null) if operator.is_equality() => {
                let left = self.lower_value(other)?;
                let ty = type_of(&self.module, &left)?;
                let right = self.lower_value_expecting(right, &ty)?;
                (left, right, Primitive::Boolean)
            }
            _ => {
                let left = self.lower_value(left)?;
                let right = self.lower_value(right)?;
                let output = types::binary_output(
                    &self.module,
                    operator,
                    &type_of(&self.module, &left)?,
                    &type_of(&self.module, &right)?,
                )?;
                (left, right, output)
            }
        };

        Ok(ir::Value::Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
            meta: OperationMetadata { output },
        })
    }

    fn lower_value(&mut self, value: &syntax::Value) -> LowerResult<ir::Value> {
        use syntax::Value as V;
        match value {
            V::LiteralBool { value } => Ok(ir::Value::LiteralBool(*value)),
            V::LiteralInt { value } => Ok(ir::Value::LiteralInt(*value)),
            V::LiteralRune { value } => Ok(ir::Value::LiteralRune(*value)),
            V::LiteralString { value } => Ok(ir::Value::LiteralString(value.clone())),
            V::LiteralList { items } => {
                let items = self.lower_values(items)?;
                let item = types::shared_type(&self.module, "list", items.iter())?;
                Ok(ir::Value::LiteralList { items, item })
            }
            V::LiteralSet { items } => {
                let items = self.lower_values(items)?;
                let item = types::shared_type(&self.module, "set", items.iter())?;
                Ok(ir::Value::LiteralSet { items, item })
            }
            V::LiteralMap { entries } => {
                let mut lowered = Vec::with_capacity(entries.len());
                for entry in entries {
                    let key = self.lower_value(&entry.key)?;
                    let value = self.lower_value(&entry.value)?;
                    lowered.push((key, value));
                }
                let keys = lowered.iter().map(|(key, _)| key);
                let key = types::shared_type(&self.module, "map key", keys)?;
                let values = lowered.iter().map(|(_, value)| value);
                let value = types::shared_type(&self.module, "map value", values)?;
                Ok(ir::Value::LiteralMap {
                    entries: lowered,
                    key,
                    value,
                })
            }
            V::EmptyList { item } => Ok(ir::Value::EmptyList {
                item: self.lower_value_type(item)?,
            }),
            V::EmptySet { item } => Ok(ir::Value::EmptySet {
                item: self.lower_value_type(item)?,
            }),
            V::EmptyMap { key, value } => Ok(ir::Value::EmptyMap {
                key: self.lower_value_type(key)?,
                value: self.lower_value_type(value)?,
            }),
            V::Call(call) => self.lower_call_value(call),
            V::Lookup { from, key } => {
                let from = self.lower_value(from)?;
                let key = self.lower_value(key)?;
                let (kind, ty) = types::lookup_type(
                    &self.module,
                    &type_of(&self.module, &from)?,
                    &type_of(&self.module, &key)?,
                )?;
                Ok(ir::Value::Lookup {
                    from: Box::new(from),
                    key: Box::new(key),
                    meta: LookupMetadata { kind, ty },
                })
            }
            V::Property { of, name } => {
                let of = self.lower_value(of)?;
                let model = match type_of(&self.module, &of)? {
                    Type::Model(model) => model,
                    other => {
                        return Err(LowerError::mismatch("model", self.module.type_name(&other)));
                    }
                };
                let index = self.module.models[model]
                    .field(name)
                    .ok_or_else(|| LowerError::NameNotFound(name.clone()))?;
                let ty = self.module.models[model].fields[index].ty.clone();
                Ok(ir::Value::Property {
                    of: Box::new(of),
                    meta: PropertyMetadata {
                        field: FieldRef { model, index },
                        ty,
                    },
                })
            }
            V::SetContains { set, value } => {
                let set = self.lower_value(set)?;
                self.contains(set, value)
            }
            V::New { model } => Ok(ir::Value::New {
                model: self
                    .module
                    .model(model)
                    .ok_or_else(|| LowerError::NameNotFound(model.clone()))?,
            }),
            V::Length { of } => {
                let of = self.lower_value(of)?;
                let kind = types::length_kind(&self.module, &type_of(&self.module, &of)?)?;
                Ok(ir::Value::Length {
                    of: Box::new(of),
                    kind,
                })
            }
            V::Unary { operator, value } => {
                let value = self.lower_value(value)?;
                let output =
                    types::unary_output(&self.module, *operator, &type_of(&self.module, &value)?)?;
                Ok(ir::Value::Unary {
                    operator: *operator,
                    value: Box::new(value),
                    meta: OperationMetadata { output },
                })
            }
            V::Binary {
                operator,
                left,
                right,
            } => self.lower_binary(*operator, left, right),
            V::Variable { name } => {
                let definition = self.scope.resolve(&self.module, name)?;
                let ty = self.module.definition_type(definition).clone();
                Ok(ir::Value::Variable(VariableMetadata { definition, ty }))
            }
            V::SelfRef => {
                let model = self
                    .scope
                    .enclosing_model()
                    .ok_or(LowerError::SelfOutsideModel)?;
                Ok(ir::Value::SelfRef { model })
            }
            V::Null => Err(LowerError::InvalidNull),
            V::Pop { list } => {
                let list = self.lower_value(list)?;
                let item = self.list_item(&list)?;
                Ok(ir::Value::Pop {
                    list: Box::new(list),
                    item,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use syntax::{Block, FunctionDef, ModelDef, Statement, Value};

    fn int_function(name: &str, statements: Vec<Statement>) -> FunctionDef {
        FunctionDef::new(name, syntax::Type::Int, Block::new(statements))
    }

    #[test]
    fn test_frame_popped_on_error() {
        let mut ctx = LoweringContext::new("Frames", LowerOptions::default());
        let result: LowerResult<()> = ctx.with_frame(Frame::Module, |this| {
            this.with_frame(Frame::Block(BlockScope::default()), |_| {
                Err(LowerError::InvalidNull)
            })
        });

        assert_eq!(result, Err(LowerError::InvalidNull));
        assert_eq!(ctx.scope.depth(), 0);
    }

    #[test]
    fn test_forward_call_resolves() {
        let module = syntax::Module::new("Forward")
            .with_function(int_function(
                "first",
                vec![Statement::ret(Value::call("second", vec![]))],
            ))
            .with_function(int_function("second", vec![Statement::ret(Value::int(2))]));

        let lowered = lower(&module).unwrap();
        let first = lowered.function("first").unwrap();
        let second = lowered.function("second").unwrap();

        let Some(ir::Statement::Return {
            value: Some(ir::Value::Call(call)),
            ..
        }) = lowered.functions[first].block.statements.first()
        else {
            panic!("expected a returned call");
        };
        assert_eq!(call.meta.function, second);
    }

    #[test]
    fn test_free_function_can_call_method_of_later_model() {
        let module = syntax::Module::new("Shapes")
            .with_function(
                int_function(
                    "area",
                    vec![Statement::ret(Value::method_call(Value::var("square"), "size", vec![]))],
                )
                .with_argument("square", syntax::Type::model("Square")),
            )
            .with_model(
                ModelDef::new("Square")
                    .with_field("side", syntax::Type::Int)
                    .with_method(int_function(
                        "size",
                        vec![Statement::ret(Value::binary(
                            Value::var("side"),
                            ir::BinaryOperator::Multiply,
                            Value::var("side"),
                        ))],
                    )),
            );

        assert!(lower(&module).is_ok());
    }

    #[test]
    fn test_plain_call_prefers_sibling_method() {
        let module = syntax::Module::new("Counters")
            .with_model(
                ModelDef::new("Counter")
                    .with_method(int_function("one", vec![Statement::ret(Value::int(1))]))
                    .with_method(int_function(
                        "two",
                        vec![Statement::ret(Value::call("one", vec![]))],
                    )),
            )
            .with_function(int_function("one", vec![Statement::ret(Value::int(100))]));

        let lowered = lower(&module).unwrap();
        let counter = lowered.model("Counter").unwrap();
        let method = lowered.models[counter].method("one").unwrap();
        let two = lowered.models[counter].method("two").unwrap();

        let Some(ir::Statement::Return {
            value: Some(ir::Value::Call(call)),
            ..
        }) = lowered.functions[two].block.statements.first()
        else {
            panic!("expected a returned call");
        };
        assert_eq!(call.meta.function, method);
        assert_ne!(Some(call.meta.function), lowered.function("one"));
        assert!(matches!(
            call.receiver.as_deref(),
            Some(ir::Value::SelfRef { model }) if *model == counter
        ));
    }

    #[test]
    fn test_deferred_limit() {
        // two function bodies, one model body, one method body
        let module = syntax::Module::new("Limits")
            .with_function(int_function("one", vec![Statement::ret(Value::int(1))]))
            .with_function(int_function("two", vec![Statement::ret(Value::int(2))]))
            .with_model(
                ModelDef::new("Box")
                    .with_method(int_function("three", vec![Statement::ret(Value::int(3))])),
            );

        let err = Lowerer::new(LowerOptions::default().with_max_deferred(3))
            .lower(&module)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralError);
        assert!(Lowerer::new(LowerOptions::default().with_max_deferred(4)).lower(&module).is_ok());
    }

    #[test]
    fn test_constant_rules() {
        let later = syntax::Module::new("Constants")
            .with_constant(syntax::ConstantDef::new("first", Value::var("second")))
            .with_constant(syntax::ConstantDef::new("second", Value::int(1)));
        assert_eq!(
            lower(&later).unwrap_err(),
            LowerError::NameNotFound("second".to_string())
        );

        let call = syntax::Module::new("Constants")
            .with_constant(syntax::ConstantDef::new("value", Value::call("compute", vec![])));
        assert_eq!(
            lower(&call).unwrap_err(),
            LowerError::InvalidConstant("value".to_string())
        );

        let earlier = syntax::Module::new("Constants")
            .with_constant(syntax::ConstantDef::new("base", Value::int(4)))
            .with_constant(syntax::ConstantDef::new(
                "double",
                Value::binary(Value::var("base"), ir::BinaryOperator::Add, Value::var("base")),
            ));
        let lowered = lower(&earlier).unwrap();
        let double = lowered.constant("double").unwrap();
        assert_eq!(lowered.constants[double].ty, Type::INT);
    }

    #[test]
    fn test_constants_cannot_be_assigned() {
        let module = syntax::Module::new("Constants")
            .with_constant(syntax::ConstantDef::new("limit", Value::int(4)))
            .with_function(FunctionDef::new(
                "reset",
                syntax::Type::Void,
                Block::new(vec![Statement::assign(Value::var("limit"), Value::int(0))]),
            ));

        assert_eq!(lower(&module).unwrap_err().kind(), ErrorKind::InvalidAssignment);
    }

    #[test]
    fn test_self_and_loop_control_placement() {
        let self_outside = syntax::Module::new("Placement").with_function(int_function(
            "me",
            vec![Statement::ret(Value::SelfRef)],
        ));
        assert_eq!(lower(&self_outside).unwrap_err(), LowerError::SelfOutsideModel);

        let stray_break = syntax::Module::new("Placement").with_function(FunctionDef::new(
            "stop",
            syntax::Type::Void,
            Block::new(vec![Statement::Break]),
        ));
        assert_eq!(lower(&stray_break).unwrap_err(), LowerError::LoopControlOutsideLoop);
    }

    #[test]
    fn test_null_takes_contextual_type() {
        let module = syntax::Module::new("Nulls")
            .with_model(ModelDef::new("Node").with_field("next", syntax::Type::model("Node")))
            .with_function(
                FunctionDef::new(
                    "isLast",
                    syntax::Type::Bool,
                    Block::new(vec![Statement::ret(Value::binary(
                        Value::property(Value::var("node"), "next"),
                        ir::BinaryOperator::Equals,
                        Value::Null,
                    ))]),
                )
                .with_argument("node", syntax::Type::model("Node")),
            )
            .with_function(FunctionDef::new(
                "nothing",
                syntax::Type::model("Node"),
                Block::new(vec![Statement::ret(Value::Null)]),
            ));
        let lowered = lower(&module).unwrap();
        let node = lowered.model("Node").unwrap();
        let nothing = lowered.function("nothing").unwrap();
        assert!(matches!(
            lowered.functions[nothing].block.statements.first(),
            Some(ir::Statement::Return {
                value: Some(ir::Value::Null { ty: Type::Model(m) }),
                ..
            }) if *m == node
        ));

        let stray = syntax::Module::new("Nulls").with_function(FunctionDef::new(
            "stray",
            syntax::Type::Void,
            Block::new(vec![Statement::declare("nothing", Value::Null)]),
        ));
        assert_eq!(lower(&stray).unwrap_err(), LowerError::InvalidNull);
    }

    #[test]
    fn test_equal_override_sees_other_and_fields() {
        let module = syntax::Module::new("Equality").with_model(
            ModelDef::new("Point")
                .with_field("x", syntax::Type::Int)
                .with_equal_override(
                    "other",
                    Block::new(vec![Statement::ret(Value::binary(
                        Value::var("x"),
                        ir::BinaryOperator::Equals,
                        Value::property(Value::var("other"), "x"),
                    ))]),
                )
                .with_hash_override(Block::new(vec![Statement::ret(Value::var("x"))])),
        );

        let lowered = lower(&module).unwrap();
        let point = &lowered.models[lowered.model("Point").unwrap()];
        let equal = point.equal_override.as_ref().unwrap();
        assert_eq!(lowered.locals[equal.other].name, "other");
        assert_eq!(equal.block.statements.len(), 1);
        assert_eq!(point.hash_override.as_ref().unwrap().block.statements.len(), 1);
    }

    #[test]
    fn test_builtin_container_methods() {
        let module = syntax::Module::new("Containers").with_function(
            FunctionDef::new(
                "fill",
                syntax::Type::Bool,
                Block::new(vec![
                    Statement::method_call(Value::var("seen"), "add", vec![Value::int(1)]),
                    Statement::method_call(Value::var("queue"), "push", vec![Value::int(2)]),
                    Statement::method_call(Value::var("queue"), "pop", vec![]),
                    Statement::ret(Value::method_call(
                        Value::var("seen"),
                        "contains",
                        vec![Value::int(1)],
                    )),
                ]),
            )
            .with_argument("seen", syntax::Type::set(syntax::Type::Int))
            .with_argument("queue", syntax::Type::list(syntax::Type::Int)),
        );

        let lowered = lower(&module).unwrap();
        let fill = &lowered.functions[lowered.function("fill").unwrap()];
        let statements = &fill.block.statements;
        assert!(matches!(statements[0], ir::Statement::AddToSet { .. }));
        assert!(matches!(statements[1], ir::Statement::Push { .. }));
        assert!(matches!(statements[2], ir::Statement::Pop { .. }));
        assert!(matches!(
            statements[3],
            ir::Statement::Return { value: Some(ir::Value::SetContains { .. }), .. }
        ));
    }

    #[test]
    fn test_wrong_arity_and_argument_type() {
        let callee = FunctionDef::new("take", syntax::Type::Void, Block::default())
            .with_argument("count", syntax::Type::Int);

        let arity = syntax::Module::new("Calls").with_function(callee.clone()).with_function(
            FunctionDef::new(
                "caller",
                syntax::Type::Void,
                Block::new(vec![Statement::call("take", vec![])]),
            ),
        );
        assert_eq!(
            lower(&arity).unwrap_err(),
            LowerError::ArgumentCountMismatch {
                function: "take".to_string(),
                expected: 1,
                found: 0
            }
        );

        let typed = syntax::Module::new("Calls")
            .with_function(callee)
            .with_function(FunctionDef::new(
                "caller",
                syntax::Type::Void,
                Block::new(vec![Statement::call("take", vec![Value::string("one")])]),
            ));
        assert_eq!(lower(&typed).unwrap_err().kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_for_loop_init_visible_in_body() {
        let body = Block::new(vec![Statement::assign(
            Value::var("total"),
            Value::binary(Value::var("total"), ir::BinaryOperator::Add, Value::var("i")),
        )]);
        let module = syntax::Module::new("Loops").with_function(int_function(
            "sum",
            vec![
                Statement::declare("total", Value::int(0)),
                Statement::For {
                    initialization: Some(Box::new(Statement::declare("i", Value::int(0)))),
                    condition: Value::binary(
                        Value::var("i"),
                        ir::BinaryOperator::LessThan,
                        Value::int(3),
                    ),
                    after_each: Some(Box::new(Statement::assign(
                        Value::var("i"),
                        Value::binary(Value::var("i"), ir::BinaryOperator::Add, Value::int(1)),
                    ))),
                    block: body,
                },
                Statement::ret(Value::var("total")),
            ],
        ));

        assert!(lower(&module).is_ok());
    }
}
