//! Type derivation for lowered values
//!
//! Everything here is a pure function of the module and the value: no
//! scope, no queue. The lowerer calls into these while building nodes,
//! and [`type_of`] re-derives the type of any finished node.

use crate::error::{LowerError, LowerResult};
use ql_ir::{
    BinaryOperator, Definition, FunctionId, IterableKind, LengthKind, LookupKind, Module,
    Primitive, Type, UnaryOperator, Value,
};

/// Output of a unary operator applied to `operand`
///
/// # Errors
/// `UnsupportedOperator` when the operator is not defined on the operand
pub fn unary_output(
    module: &Module,
    operator: UnaryOperator,
    operand: &Type,
) -> LowerResult<Primitive> {
    let output = match (operator, operand) {
        (UnaryOperator::Hash, Type::List(_) | Type::Set(_) | Type::Model(_)) => {
            Some(Primitive::Int)
        }
        (UnaryOperator::Hash, Type::Primitive(primitive)) if *primitive != Primitive::Void => {
            Some(Primitive::Int)
        }
        (UnaryOperator::Not, Type::Primitive(Primitive::Boolean)) => Some(Primitive::Boolean),
        (UnaryOperator::Negate, Type::Primitive(Primitive::Int)) => Some(Primitive::Int),
        (UnaryOperator::CastToInt, Type::Primitive(Primitive::Rune)) => Some(Primitive::Int),
        (UnaryOperator::CastToString, Type::Primitive(Primitive::Rune)) => Some(Primitive::String),
        _ => None,
    };

    output.ok_or_else(|| LowerError::UnsupportedOperator {
        operator: operator.symbol().to_string(),
        operand: module.type_name(operand),
    })
}

/// Comparison and arithmetic shared by `int` and `rune`
fn numeric(operator: BinaryOperator, arithmetic: Primitive) -> Option<Primitive> {
    match operator {
        BinaryOperator::Equals
        | BinaryOperator::NotEqual
        | BinaryOperator::LessThan
        | BinaryOperator::LessThanOrEqual
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterThanOrEqual => Some(Primitive::Boolean),
        BinaryOperator::Add
        | BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Modulo => Some(arithmetic),
        BinaryOperator::And | BinaryOperator::Or => None,
    }
}

/// Output of a binary operator applied to `left` and `right`
///
/// # Errors
/// `TypeMismatch` when the operand pairing has no table at all, and
/// `UnsupportedOperator` when the pairing exists but lacks the operator
pub fn binary_output(
    module: &Module,
    operator: BinaryOperator,
    left: &Type,
    right: &Type,
) -> LowerResult<Primitive> {
    let (Some(lhs), Some(rhs)) = (left.as_primitive(), right.as_primitive()) else {
        return Err(LowerError::mismatch(module.type_name(left), module.type_name(right)));
    };

    let output = match (lhs, rhs) {
        (Primitive::Int, Primitive::Int) => numeric(operator, Primitive::Int),
        (Primitive::Rune, Primitive::Rune) => numeric(operator, Primitive::Rune),
        (Primitive::String, Primitive::String) => match operator {
            BinaryOperator::Equals | BinaryOperator::NotEqual => Some(Primitive::Boolean),
            BinaryOperator::Add => Some(Primitive::String),
            _ => None,
        },
        (Primitive::Boolean, Primitive::Boolean) => match operator {
            BinaryOperator::And | BinaryOperator::Or => Some(Primitive::Boolean),
            _ => None,
        },
        _ => return Err(LowerError::mismatch(lhs.name(), rhs.name())),
    };

    output.ok_or_else(|| LowerError::UnsupportedOperator {
        operator: operator.symbol().to_string(),
        operand: format!("{} and {}", lhs.name(), rhs.name()),
    })
}

/// Result kind and type of `from[key]`
///
/// # Errors
/// `TypeMismatch` for a key of the wrong type, `InvalidLookup` for a
/// receiver that cannot be indexed
pub fn lookup_type(module: &Module, from: &Type, key: &Type) -> LowerResult<(LookupKind, Type)> {
    match from {
        Type::List(item) => {
            ensure_type(module, &Type::INT, key)?;
            Ok((LookupKind::List, (**item).clone()))
        }
        Type::Map(key_type, value) => {
            ensure_type(module, key_type, key)?;
            Ok((LookupKind::Map, (**value).clone()))
        }
        Type::Primitive(Primitive::String) => {
            ensure_type(module, &Type::INT, key)?;
            Ok((LookupKind::String, Type::RUNE))
        }
        _ => Err(LowerError::InvalidLookup {
            ty: module.type_name(from),
        }),
    }
}

/// What `len(...)` measures for a value of type `of`
///
/// # Errors
/// `TypeMismatch` for anything without a length
pub fn length_kind(module: &Module, of: &Type) -> LowerResult<LengthKind> {
    match of {
        Type::Primitive(Primitive::String) => Ok(LengthKind::String),
        Type::List(_) => Ok(LengthKind::List),
        Type::Map(..) => Ok(LengthKind::Map),
        Type::Set(_) => Ok(LengthKind::Set),
        _ => Err(LowerError::mismatch("string, list, map or set", module.type_name(of))),
    }
}

/// Container kind and item type for a for-each over `iterable`
///
/// # Errors
/// `TypeMismatch` unless `iterable` is a list or set
pub fn iterable_kind(module: &Module, iterable: &Type) -> LowerResult<(IterableKind, Type)> {
    match iterable {
        Type::List(item) => Ok((IterableKind::List, (**item).clone())),
        Type::Set(item) => Ok((IterableKind::Set, (**item).clone())),
        _ => Err(LowerError::mismatch("list or set", module.type_name(iterable))),
    }
}

/// Method `name` on a receiver of type `receiver`
///
/// # Errors
/// `TypeMismatch` for a non-model receiver, `UnknownMethod` when the
/// model has no such method
pub fn resolve_method(module: &Module, receiver: &Type, name: &str) -> LowerResult<FunctionId> {
    let Type::Model(model) = receiver else {
        return Err(LowerError::mismatch("model", module.type_name(receiver)));
    };
    let model = &module.models[*model];
    model.method(name).ok_or_else(|| LowerError::UnknownMethod {
        model: model.name.clone(),
        method: name.to_string(),
    })
}

/// Require `found` to be exactly `expected`
///
/// # Errors
/// `TypeMismatch` otherwise
pub fn ensure_type(module: &Module, expected: &Type, found: &Type) -> LowerResult<()> {
    if expected == found {
        Ok(())
    } else {
        Err(LowerError::mismatch(module.type_name(expected), module.type_name(found)))
    }
}

/// The one type shared by every element of a literal container
///
/// # Errors
/// `HeterogeneousLiteral` when the literal is empty or its elements disagree
pub fn shared_type<'v>(
    module: &Module,
    what: &str,
    mut elements: impl Iterator<Item = &'v Value>,
) -> LowerResult<Type> {
    let Some(first) = elements.next() else {
        return Err(LowerError::HeterogeneousLiteral(format!("empty {what} literal")));
    };
    let expected = type_of(module, first)?;
    for element in elements {
        let found = type_of(module, element)?;
        if found != expected {
            return Err(LowerError::HeterogeneousLiteral(format!(
                "{what} mixes {} and {}",
                module.type_name(&expected),
                module.type_name(&found)
            )));
        }
    }
    Ok(expected)
}

/// Derive the type of a lowered value
///
/// # Errors
/// Whatever the operator, lookup and literal rules reject
pub fn type_of(module: &Module, value: &Value) -> LowerResult<Type> {
    match value {
        Value::LiteralBool(_) => Ok(Type::BOOLEAN),
        Value::LiteralInt(_) => Ok(Type::INT),
        Value::LiteralRune(_) => Ok(Type::RUNE),
        Value::LiteralString(_) => Ok(Type::STRING),
        Value::LiteralList { items, .. } => {
            Ok(Type::list(shared_type(module, "list", items.iter())?))
        }
        Value::LiteralSet { items, .. } => Ok(Type::set(shared_type(module, "set", items.iter())?)),
        Value::LiteralMap { entries, .. } => {
            let key = shared_type(module, "map key", entries.iter().map(|(key, _)| key))?;
            let value = shared_type(module, "map value", entries.iter().map(|(_, value)| value))?;
            Ok(Type::map(key, value))
        }
        Value::EmptyList { item } => Ok(Type::list(item.clone())),
        Value::EmptySet { item } => Ok(Type::set(item.clone())),
        Value::EmptyMap { key, value } => Ok(Type::map(key.clone(), value.clone())),
        Value::Call(call) => Ok(module.functions[call.meta.function].return_type.clone()),
        Value::Lookup { from, key, .. } => {
            let (_, ty) = lookup_type(module, &type_of(module, from)?, &type_of(module, key)?)?;
            Ok(ty)
        }
        Value::Property { meta, .. } => {
            Ok(module.definition_type(Definition::Field(meta.field)).clone())
        }
        Value::SetContains { .. } => Ok(Type::BOOLEAN),
        Value::New { model } | Value::SelfRef { model } => Ok(Type::Model(*model)),
        Value::Length { .. } => Ok(Type::INT),
        Value::Unary {
            operator, value, ..
        } => Ok(unary_output(module, *operator, &type_of(module, value)?)?.into()),
        Value::Binary {
            operator,
            left,
            right,
            ..
        } => {
            if operator.is_equality() && (left.is_null() || right.is_null()) {
                return Ok(Type::BOOLEAN);
            }
            let left = type_of(module, left)?;
            let right = type_of(module, right)?;
            Ok(binary_output(module, *operator, &left, &right)?.into())
        }
        Value::Variable(meta) => Ok(module.definition_type(meta.definition).clone()),
        Value::Null { ty } => Ok(ty.clone()),
        Value::Pop { item, .. } => Ok(item.clone()),
    }
}
