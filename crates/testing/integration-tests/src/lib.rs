//! Integration test utilities for the Quill lowering pipeline
//!
//! Holds the sample programs shared by the test files and a checker that
//! every id in a lowered module points at an existing definition.

use anyhow::Result;
use la_arena::Idx;
use ql_interpreter::{Interpreter, Value as RuntimeValue};
use ql_ir::{
    Block, Call, CallableRef, Definition, Module as IrModule, Statement as IrStatement,
    Type as IrType, Value as IrValue,
};
use ql_syntax::{
    BinaryOperator as Op, Block as B, ConstantDef, FunctionDef, ModelDef, Module, Statement as S,
    Type as T, UnaryOperator, Value as V,
};

/// Lower `module` and run `entry` without arguments
///
/// # Errors
///
/// Returns the lowering or runtime error
pub fn run(module: &Module, entry: &str) -> Result<RuntimeValue> {
    let lowered = ql_lower::lower(module)?;
    let value = Interpreter::new(&lowered).run(entry, Vec::new())?;
    Ok(value)
}

/// Recursive and iterative Fibonacci; `main` calls `fib` before it is declared
#[must_use]
pub fn fibonacci() -> Module {
    let n = || V::var("n");
    Module::new("Fibonacci")
        .with_function(FunctionDef::new(
            "main",
            T::Int,
            B::new(vec![S::ret(V::call("fib", vec![V::int(10)]))]),
        ))
        .with_function(
            FunctionDef::new(
                "fib",
                T::Int,
                B::new(vec![
                    S::if_then(
                        V::binary(n(), Op::LessThan, V::int(2)),
                        B::new(vec![S::ret(n())]),
                    ),
                    S::ret(V::binary(
                        V::call("fib", vec![V::binary(n(), Op::Subtract, V::int(1))]),
                        Op::Add,
                        V::call("fib", vec![V::binary(n(), Op::Subtract, V::int(2))]),
                    )),
                ]),
            )
            .with_argument("n", T::Int),
        )
        .with_function(
            FunctionDef::new(
                "fibLoop",
                T::Int,
                B::new(vec![
                    S::declare("a", V::int(0)),
                    S::declare("b", V::int(1)),
                    S::For {
                        initialization: Some(Box::new(S::declare("i", V::int(0)))),
                        condition: V::binary(V::var("i"), Op::LessThan, n()),
                        after_each: Some(Box::new(S::assign(
                            V::var("i"),
                            V::binary(V::var("i"), Op::Add, V::int(1)),
                        ))),
                        block: B::new(vec![
                            S::declare("next", V::binary(V::var("a"), Op::Add, V::var("b"))),
                            S::assign(V::var("a"), V::var("b")),
                            S::assign(V::var("b"), V::var("next")),
                        ]),
                    },
                    S::ret(V::var("a")),
                ]),
            )
            .with_argument("n", T::Int),
        )
}

/// A `Point` model with methods, overrides and free functions that use it
///
/// Methods call the free function `abs`, which is declared after the model.
#[must_use]
pub fn geometry() -> Module {
    let point = ModelDef::new("Point")
        .with_field("x", T::Int)
        .with_field("y", T::Int)
        .with_method(
            FunctionDef::new(
                "shifted",
                T::model("Point"),
                B::new(vec![
                    S::declare("moved", V::new_instance("Point")),
                    S::assign(
                        V::property(V::var("moved"), "x"),
                        V::binary(V::var("x"), Op::Add, V::var("dx")),
                    ),
                    S::assign(V::property(V::var("moved"), "y"), V::var("y")),
                    S::ret(V::var("moved")),
                ]),
            )
            .with_argument("dx", T::Int),
        )
        .with_method(FunctionDef::new(
            "manhattan",
            T::Int,
            B::new(vec![S::ret(V::binary(
                V::call("abs", vec![V::var("x")]),
                Op::Add,
                V::call("abs", vec![V::var("y")]),
            ))]),
        ))
        .with_method(FunctionDef::new(
            "touch",
            T::model("Point"),
            B::new(vec![
                S::assign(V::var("x"), V::binary(V::var("x"), Op::Add, V::int(1))),
                S::ret(V::SelfRef),
            ]),
        ))
        .with_equal_override(
            "other",
            B::new(vec![S::ret(V::binary(
                V::binary(V::var("x"), Op::Equals, V::property(V::var("other"), "x")),
                Op::And,
                V::binary(V::var("y"), Op::Equals, V::property(V::var("other"), "y")),
            ))]),
        )
        .with_hash_override(B::new(vec![S::ret(V::binary(
            V::binary(V::var("x"), Op::Multiply, V::int(31)),
            Op::Add,
            V::var("y"),
        ))]));

    let at = |x: i64, y: i64| {
        vec![
            S::declare("p", V::call("origin", vec![])),
            S::assign(V::property(V::var("p"), "x"), V::int(x)),
            S::assign(V::property(V::var("p"), "y"), V::int(y)),
        ]
    };

    let mut distinct = at(3, -4);
    distinct.extend([
        S::declare("seen", V::EmptySet { item: T::model("Point") }),
        S::method_call(V::var("seen"), "add", vec![V::var("p")]),
        S::method_call(
            V::var("seen"),
            "add",
            vec![V::method_call(V::var("p"), "shifted", vec![V::int(0)])],
        ),
        S::method_call(
            V::var("seen"),
            "add",
            vec![V::method_call(V::var("p"), "shifted", vec![V::int(1)])],
        ),
        S::ret(V::binary(
            V::binary(V::length(V::var("seen")), Op::Multiply, V::int(100)),
            Op::Add,
            V::method_call(V::var("p"), "manhattan", vec![]),
        )),
    ]);

    let mut hashed = at(3, -4);
    hashed.push(S::ret(V::unary(UnaryOperator::Hash, V::var("p"))));

    let mut aliased = at(0, 0);
    aliased.extend([
        S::declare(
            "q",
            V::method_call(V::method_call(V::var("p"), "touch", vec![]), "touch", vec![]),
        ),
        S::ret(V::binary(
            V::property(V::var("p"), "x"),
            Op::Add,
            V::property(V::var("q"), "x"),
        )),
    ]);

    Module::new("Geometry")
        .with_model(point)
        .with_function(
            FunctionDef::new(
                "abs",
                T::Int,
                B::new(vec![
                    S::if_then(
                        V::binary(V::var("n"), Op::LessThan, V::int(0)),
                        B::new(vec![S::ret(V::unary(UnaryOperator::Negate, V::var("n")))]),
                    ),
                    S::ret(V::var("n")),
                ]),
            )
            .with_argument("n", T::Int),
        )
        .with_function(FunctionDef::new(
            "origin",
            T::model("Point"),
            B::new(vec![S::ret(V::new_instance("Point"))]),
        ))
        .with_function(FunctionDef::new("distinct", T::Int, B::new(distinct)))
        .with_function(FunctionDef::new("hashed", T::Int, B::new(hashed)))
        .with_function(FunctionDef::new("aliased", T::Int, B::new(aliased)))
}

/// Maps, sets, lists, strings and a constant
#[must_use]
pub fn inventory() -> Module {
    Module::new("Inventory")
        .with_constant(ConstantDef::new("LIMIT", V::int(3)))
        .with_function(FunctionDef::new(
            "main",
            T::Int,
            B::new(vec![
                S::declare(
                    "stock",
                    V::map(vec![
                        (V::string("apple"), V::int(2)),
                        (V::string("pear"), V::int(5)),
                    ]),
                ),
                S::assign(V::lookup(V::var("stock"), V::string("plum")), V::int(1)),
                S::declare(
                    "known",
                    V::set(vec![V::string("apple"), V::string("pear"), V::string("plum")]),
                ),
                S::declare("total", V::int(0)),
                S::for_each(
                    "name",
                    V::list(vec![
                        V::string("apple"),
                        V::string("pear"),
                        V::string("plum"),
                        V::string("fig"),
                    ]),
                    B::new(vec![S::if_then(
                        V::method_call(V::var("known"), "contains", vec![V::var("name")]),
                        B::new(vec![S::assign(
                            V::var("total"),
                            V::binary(
                                V::var("total"),
                                Op::Add,
                                V::lookup(V::var("stock"), V::var("name")),
                            ),
                        )]),
                    )]),
                ),
                S::ret(V::binary(
                    V::binary(V::var("total"), Op::Multiply, V::int(10)),
                    Op::Add,
                    V::var("LIMIT"),
                )),
            ]),
        ))
        .with_function(
            FunctionDef::new(
                "firstRune",
                T::Int,
                B::new(vec![S::ret(V::unary(
                    UnaryOperator::CastToInt,
                    V::lookup(V::var("word"), V::int(0)),
                ))]),
            )
            .with_argument("word", T::String),
        )
        .with_function(FunctionDef::new(
            "stack",
            T::Int,
            B::new(vec![
                S::declare("items", V::EmptyList { item: T::Int }),
                S::For {
                    initialization: Some(Box::new(S::declare("i", V::int(0)))),
                    condition: V::binary(V::var("i"), Op::LessThan, V::int(5)),
                    after_each: Some(Box::new(S::assign(
                        V::var("i"),
                        V::binary(V::var("i"), Op::Add, V::int(1)),
                    ))),
                    block: B::new(vec![S::method_call(
                        V::var("items"),
                        "push",
                        vec![V::binary(V::var("i"), Op::Multiply, V::var("i"))],
                    )]),
                },
                S::method_call(V::var("items"), "pop", vec![]),
                S::declare("top", V::method_call(V::var("items"), "pop", vec![])),
                S::ret(V::binary(V::var("top"), Op::Add, V::length(V::var("items")))),
            ]),
        ))
}

/// Every id reachable from `module` that does not index a definition
#[must_use]
pub fn dangling_references(module: &IrModule) -> Vec<String> {
    let mut walker = Walker {
        module,
        problems: Vec::new(),
    };
    for constant in module.constants.values() {
        walker.ty(&constant.ty);
        walker.value(&constant.value);
    }
    for function in module.functions.values() {
        for argument in &function.arguments {
            walker.ty(&argument.ty);
        }
        walker.ty(&function.return_type);
        walker.block(&function.block);
    }
    for model in module.models.values() {
        for field in &model.fields {
            walker.ty(&field.ty);
        }
        for method in &model.methods {
            walker.check(in_range(*method, module.functions.len()), "method");
        }
        if let Some(equal) = &model.equal_override {
            walker.check(in_range(equal.other, module.locals.len()), "override argument");
            walker.block(&equal.block);
        }
        if let Some(hash) = &model.hash_override {
            walker.block(&hash.block);
        }
    }
    for local in module.locals.values() {
        walker.ty(&local.ty);
    }
    walker.problems
}

fn in_range<T>(id: Idx<T>, len: usize) -> bool {
    usize::try_from(u32::from(id.into_raw())).is_ok_and(|index| index < len)
}

struct Walker<'m> {
    module: &'m IrModule,
    problems: Vec<String>,
}

impl Walker<'_> {
    fn check(&mut self, ok: bool, what: &str) {
        if !ok {
            self.problems.push(what.to_string());
        }
    }

    fn ty(&mut self, ty: &IrType) {
        match ty {
            IrType::Primitive(_) => {}
            IrType::List(item) | IrType::Set(item) => self.ty(item),
            IrType::Map(key, value) => {
                self.ty(key);
                self.ty(value);
            }
            IrType::Model(model) => {
                self.check(in_range(*model, self.module.models.len()), "model type");
            }
        }
    }

    fn definition(&mut self, definition: Definition) {
        let module = self.module;
        let ok = match definition {
            Definition::Constant(id) => in_range(id, module.constants.len()),
            Definition::Local(id) => in_range(id, module.locals.len()),
            Definition::Argument(argument) => {
                in_range(argument.function, module.functions.len())
                    && argument.index < module.functions[argument.function].arguments.len()
            }
            Definition::Field(field) => {
                in_range(field.model, module.models.len())
                    && field.index < module.models[field.model].fields.len()
            }
        };
        self.check(ok, "variable");
    }

    fn block(&mut self, block: &Block) {
        for statement in &block.statements {
            self.statement(statement);
        }
    }

    fn statement(&mut self, statement: &IrStatement) {
        match statement {
            IrStatement::Declare { local, value } => {
                self.check(in_range(*local, self.module.locals.len()), "local");
                self.value(value);
            }
            IrStatement::Assign { to, from } => {
                self.value(to);
                self.value(from);
            }
            IrStatement::Conditional { ifs, else_block } => {
                for arm in ifs {
                    self.value(&arm.condition);
                    self.block(&arm.block);
                }
                if let Some(block) = else_block {
                    self.block(block);
                }
            }
            IrStatement::For {
                initialization,
                condition,
                after_each,
                block,
            } => {
                if let Some(initialization) = initialization {
                    self.statement(initialization);
                }
                self.value(condition);
                if let Some(after_each) = after_each {
                    self.statement(after_each);
                }
                self.block(block);
            }
            IrStatement::ForEach {
                item,
                iterable,
                block,
                meta,
            } => {
                self.check(in_range(*item, self.module.locals.len()), "loop item");
                self.ty(&meta.item_type);
                self.value(iterable);
                self.block(block);
            }
            IrStatement::Return { value, meta } => {
                let module = self.module;
                let ok = match meta.callable {
                    CallableRef::Function(function) => in_range(function, module.functions.len()),
                    CallableRef::EqualOverride(model) | CallableRef::HashOverride(model) => {
                        in_range(model, module.models.len())
                    }
                };
                self.check(ok, "return target");
                if let Some(value) = value {
                    self.value(value);
                }
            }
            IrStatement::Break | IrStatement::Continue => {}
            IrStatement::AddToSet { set: target, value }
            | IrStatement::Push { list: target, value } => {
                self.value(target);
                self.value(value);
            }
            IrStatement::Pop { list } => self.value(list),
            IrStatement::Call(call) => self.call(call),
        }
    }

    fn call(&mut self, call: &Call) {
        self.check(in_range(call.meta.function, self.module.functions.len()), "call");
        if let Some(receiver) = &call.receiver {
            self.value(receiver);
        }
        for argument in &call.arguments {
            self.value(argument);
        }
    }

    fn value(&mut self, value: &IrValue) {
        match value {
            IrValue::LiteralBool(_)
            | IrValue::LiteralInt(_)
            | IrValue::LiteralRune(_)
            | IrValue::LiteralString(_) => {}
            IrValue::LiteralList { items, item } | IrValue::LiteralSet { items, item } => {
                self.ty(item);
                for item in items {
                    self.value(item);
                }
            }
            IrValue::LiteralMap {
                entries,
                key,
                value,
            } => {
                self.ty(key);
                self.ty(value);
                for (key, value) in entries {
                    self.value(key);
                    self.value(value);
                }
            }
            IrValue::EmptyList { item } | IrValue::EmptySet { item } => self.ty(item),
            IrValue::EmptyMap { key, value } => {
                self.ty(key);
                self.ty(value);
            }
            IrValue::Call(call) => self.call(call),
            IrValue::Lookup { from, key, meta } => {
                self.ty(&meta.ty);
                self.value(from);
                self.value(key);
            }
            IrValue::Property { of, meta } => {
                self.definition(Definition::Field(meta.field));
                self.value(of);
            }
            IrValue::SetContains { set, value } => {
                self.value(set);
                self.value(value);
            }
            IrValue::New { model } | IrValue::SelfRef { model } => {
                self.check(in_range(*model, self.module.models.len()), "model");
            }
            IrValue::Length { of, .. } => self.value(of),
            IrValue::Unary { value, .. } => self.value(value),
            IrValue::Binary { left, right, .. } => {
                self.value(left);
                self.value(right);
            }
            IrValue::Variable(meta) => {
                self.ty(&meta.ty);
                self.definition(meta.definition);
            }
            IrValue::Null { ty } => self.ty(ty),
            IrValue::Pop { list, item } => {
                self.ty(item);
                self.value(list);
            }
        }
    }
}
