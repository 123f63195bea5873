//! End-to-end lowering properties
//!
//! Each test builds a syntax tree, lowers it and inspects either the
//! typed module or the single error that stopped the pass.

use integration_tests::{dangling_references, fibonacci, geometry, inventory};
use ql_ir::{Primitive, Statement as IrStatement, Type as IrType, Value as IrValue};
use ql_lower::{ErrorKind, LowerError, LowerOptions, Lowerer, lower, type_of};
use ql_syntax::{
    BinaryOperator as Op, Block, ConstantDef, FunctionDef, ModelDef, Module, Statement, Type,
    Value,
};

fn single(return_type: Type, statements: Vec<Statement>) -> Module {
    Module::new("Sample").with_function(FunctionDef::new(
        "sample",
        return_type,
        Block::new(statements),
    ))
}

fn returned_value(module: &ql_ir::Module, function: &str) -> IrValue {
    let id = module.function(function).unwrap();
    match module.functions[id].block.statements.last() {
        Some(IrStatement::Return { value: Some(value), .. }) => value.clone(),
        other => panic!("{function} does not end in a value return: {other:?}"),
    }
}

#[test]
fn test_lowering_is_deterministic() {
    for module in [fibonacci(), geometry(), inventory()] {
        let first = lower(&module).unwrap();
        let second = lower(&module).unwrap();
        assert_eq!(first, second, "{} lowered differently twice", module.name);
    }
}

#[test]
fn test_no_dangling_references() {
    for module in [fibonacci(), geometry(), inventory()] {
        let lowered = lower(&module).unwrap();
        assert_eq!(dangling_references(&lowered), Vec::<String>::new(), "{}", module.name);
    }
}

#[test]
fn test_forward_reference_resolves_to_later_function() {
    let module = lower(&fibonacci()).unwrap();
    let fib = module.function("fib").unwrap();
    match returned_value(&module, "main") {
        IrValue::Call(call) => {
            assert_eq!(call.meta.function, fib);
            assert_eq!(call.meta.return_type, IrType::INT);
        }
        other => panic!("expected a call, got {other:?}"),
    }
}

#[test]
fn test_model_method_calls_later_free_function() {
    let module = lower(&geometry()).unwrap();
    let point = module.model("Point").unwrap();
    let manhattan = module.models[point].method("manhattan").unwrap();
    let abs = module.function("abs").unwrap();
    let IrStatement::Return { value: Some(IrValue::Binary { left, .. }), .. } =
        &module.functions[manhattan].block.statements[0]
    else {
        panic!("unexpected manhattan body");
    };
    assert!(matches!(&**left, IrValue::Call(call) if call.meta.function == abs));
}

#[test]
fn test_fail_fast_is_idempotent() {
    let module = single(Type::Int, vec![Statement::ret(Value::var("ghost"))]);
    let first = lower(&module).unwrap_err();
    assert_eq!(first, LowerError::NameNotFound("ghost".to_string()));
    for _ in 0..3 {
        assert_eq!(lower(&module).unwrap_err(), first);
    }
}

#[test]
fn test_operator_table_is_complete() {
    use Primitive::{Boolean, Int, Rune, String};

    let operators = [
        Op::Equals,
        Op::NotEqual,
        Op::LessThan,
        Op::LessThanOrEqual,
        Op::GreaterThan,
        Op::GreaterThanOrEqual,
        Op::Add,
        Op::Subtract,
        Op::Multiply,
        Op::Divide,
        Op::Modulo,
        Op::And,
        Op::Or,
    ];
    let literal = |primitive: Primitive| match primitive {
        Boolean => Value::bool(true),
        Int => Value::int(1),
        Rune => Value::rune('a'),
        String => Value::string("s"),
        Primitive::Void => unreachable!(),
    };
    let allowed = |left: Primitive, right: Primitive, operator: Op| match (left, right) {
        (Int, Int) | (Rune, Rune) => !matches!(operator, Op::And | Op::Or),
        (String, String) => matches!(operator, Op::Equals | Op::NotEqual | Op::Add),
        (Boolean, Boolean) => matches!(operator, Op::And | Op::Or),
        _ => false,
    };

    let mut accepted = 0;
    for left in [Boolean, Int, Rune, String] {
        for right in [Boolean, Int, Rune, String] {
            for operator in operators {
                let module = single(
                    Type::Void,
                    vec![Statement::declare(
                        "v",
                        Value::binary(literal(left), operator, literal(right)),
                    )],
                );
                match lower(&module) {
                    Ok(_) => {
                        assert!(
                            allowed(left, right, operator),
                            "{left:?} {operator} {right:?} accepted"
                        );
                        accepted += 1;
                    }
                    Err(error) => {
                        assert!(
                            !allowed(left, right, operator),
                            "{left:?} {operator} {right:?}: {error}"
                        );
                        assert!(
                            matches!(
                                error.kind(),
                                ErrorKind::TypeMismatch | ErrorKind::UnsupportedOperator
                            ),
                            "{error}"
                        );
                    }
                }
            }
        }
    }
    assert_eq!(accepted, 27);
}

#[test]
fn test_unknown_method_on_model() {
    let module = geometry().with_function(
        FunctionDef::new(
            "area",
            Type::Int,
            Block::new(vec![Statement::ret(Value::method_call(
                Value::var("p"),
                "area",
                vec![],
            ))]),
        )
        .with_argument("p", Type::model("Point")),
    );
    let error = lower(&module).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::UnknownMethod);
    assert_eq!(
        error,
        LowerError::UnknownMethod {
            model: "Point".to_string(),
            method: "area".to_string()
        }
    );

    // `contains` is only built in for sets
    let on_list = single(
        Type::Bool,
        vec![
            Statement::declare("xs", Value::list(vec![Value::int(1)])),
            Statement::ret(Value::method_call(Value::var("xs"), "contains", vec![Value::int(1)])),
        ],
    );
    assert_eq!(lower(&on_list).unwrap_err().kind(), ErrorKind::TypeMismatch);
}

#[test]
fn test_constant_names_may_use_underscores() {
    let module = Module::new("Limits")
        .with_constant(ConstantDef::new("MAX_SIZE", Value::int(8)))
        .with_function(FunctionDef::new(
            "size",
            Type::Int,
            Block::new(vec![Statement::ret(Value::var("MAX_SIZE"))]),
        ));
    let lowered = lower(&module).unwrap();
    assert!(lowered.constant("MAX_SIZE").is_some());
}

#[test]
fn test_duplicate_field() {
    let module = Module::new("Shapes").with_model(
        ModelDef::new("Point")
            .with_field("x", Type::Int)
            .with_field("x", Type::Int),
    );
    assert_eq!(
        lower(&module).unwrap_err(),
        LowerError::DuplicateDefinition("x".to_string())
    );
}

#[test]
fn test_addition_derives_int() {
    let module = lower(&single(
        Type::Int,
        vec![Statement::ret(Value::binary(Value::int(8), Op::Add, Value::int(2)))],
    ))
    .unwrap();
    let value = returned_value(&module, "sample");
    assert_eq!(type_of(&module, &value).unwrap(), IrType::INT);
}

#[test]
fn test_condition_must_be_boolean() {
    let body = |condition| {
        single(
            Type::Void,
            vec![Statement::if_then(condition, Block::new(vec![Statement::ret_void()]))],
        )
    };
    assert_eq!(
        lower(&body(Value::int(5))).unwrap_err(),
        LowerError::ConditionNotBoolean {
            found: "int".to_string()
        }
    );
    assert!(lower(&body(Value::bool(true))).is_ok());
}

#[test]
fn test_int_function_ending_in_assignment() {
    let module = single(
        Type::Int,
        vec![
            Statement::declare("a", Value::int(1)),
            Statement::assign(Value::var("a"), Value::int(2)),
        ],
    );
    assert_eq!(
        lower(&module).unwrap_err(),
        LowerError::MissingTerminalReturn("sample".to_string())
    );
}

#[test]
fn test_list_lookup_types() {
    let pick = |key: Value| {
        Module::new("Lists").with_function(
            FunctionDef::new(
                "pick",
                Type::String,
                Block::new(vec![Statement::ret(Value::lookup(Value::var("list"), key))]),
            )
            .with_argument("list", Type::list(Type::String))
            .with_argument("i", Type::Int),
        )
    };

    let module = lower(&pick(Value::var("i"))).unwrap();
    let value = returned_value(&module, "pick");
    assert_eq!(type_of(&module, &value).unwrap(), IrType::STRING);

    let error = lower(&pick(Value::string("x"))).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::TypeMismatch);
}

#[test]
fn test_deferred_limit_applies_end_to_end() {
    let module = geometry();
    let unlimited = Lowerer::new(LowerOptions::default()).lower(&module);
    assert!(unlimited.is_ok());

    let limited = Lowerer::new(LowerOptions::default().with_max_deferred(1)).lower(&module);
    assert_eq!(limited.unwrap_err().kind(), ErrorKind::StructuralError);
}

#[test]
fn test_json_tree_lowers_like_builder_tree() {
    let module = inventory();
    let json = serde_json::to_string(&module).unwrap();
    let decoded: Module = serde_json::from_str(&json).unwrap();
    assert_eq!(lower(&decoded).unwrap(), lower(&module).unwrap());
}
