//! Checks applied while lowering

use crate::error::{LowerError, LowerResult};
use crate::types::type_of;
use ql_ir::{Module, Statement, Type, Value};

fn check_letters(name: &str) -> LowerResult<char> {
    let Some(first) = name.chars().next() else {
        return Err(LowerError::InvalidName {
            name: name.to_string(),
            reason: "name is empty",
        });
    };
    if !name.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(LowerError::InvalidName {
            name: name.to_string(),
            reason: "only ascii letters are allowed",
        });
    }
    Ok(first)
}

/// Module and model names: letters only, uppercase first
///
/// # Errors
/// `InvalidName`
pub fn type_name(name: &str) -> LowerResult<()> {
    if check_letters(name)?.is_ascii_uppercase() {
        Ok(())
    } else {
        Err(LowerError::InvalidName {
            name: name.to_string(),
            reason: "must start with an uppercase letter",
        })
    }
}

/// Function, method, argument, field and local names: letters only,
/// lowercase first
///
/// # Errors
/// `InvalidName`
pub fn member_name(name: &str) -> LowerResult<()> {
    if check_letters(name)?.is_ascii_lowercase() {
        Ok(())
    } else {
        Err(LowerError::InvalidName {
            name: name.to_string(),
            reason: "must start with a lowercase letter",
        })
    }
}

/// Constant names: any identifier, so `MAX_SIZE` and `limit2` are fine
///
/// # Errors
/// `InvalidName`
pub fn constant_name(name: &str) -> LowerResult<()> {
    let invalid = |reason: &'static str| -> LowerResult<()> {
        Err(LowerError::InvalidName {
            name: name.to_string(),
            reason,
        })
    };
    match name.chars().next() {
        None => invalid("name is empty"),
        Some(first) if first.is_ascii_digit() => invalid("must not start with a digit"),
        Some(_) if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') => {
            invalid("only ascii letters, digits and `_` are allowed")
        }
        Some(_) => Ok(()),
    }
}

/// `if` and `for` conditions must be boolean
///
/// # Errors
/// `ConditionNotBoolean`
pub fn condition(module: &Module, condition: &Value) -> LowerResult<()> {
    let found = type_of(module, condition)?;
    if found == Type::BOOLEAN {
        Ok(())
    } else {
        Err(LowerError::ConditionNotBoolean {
            found: module.type_name(&found),
        })
    }
}

/// A return must produce exactly the callable's declared type; a bare
/// return is only allowed in void callables
///
/// # Errors
/// `ReturnTypeMismatch`
pub fn return_value(module: &Module, expected: &Type, value: Option<&Value>) -> LowerResult<()> {
    let found = match value {
        Some(value) => type_of(module, value)?,
        None => Type::VOID,
    };
    if &found == expected {
        Ok(())
    } else {
        Err(LowerError::ReturnTypeMismatch {
            expected: module.type_name(expected),
            found: module.type_name(&found),
        })
    }
}

/// A non-void body must end in a return
///
/// Only the last statement is inspected: a body whose every branch
/// returns but does not end in a `return` is still rejected.
///
/// # Errors
/// `MissingTerminalReturn`
pub fn terminal_return(
    name: &str,
    return_type: &Type,
    statements: &[Statement],
) -> LowerResult<()> {
    if return_type.is_void() || matches!(statements.last(), Some(Statement::Return { .. })) {
        Ok(())
    } else {
        Err(LowerError::MissingTerminalReturn(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ql_ir::{CallableRef, ReturnMetadata};
    use la_arena::{Idx, RawIdx};

    #[test]
    fn test_naming_conventions() {
        assert!(type_name("Point").is_ok());
        assert!(type_name("point").is_err());
        assert!(member_name("distance").is_ok());
        assert!(member_name("Distance").is_err());
        assert!(member_name("snake_case").is_err());
        assert!(member_name("x2").is_err());
        assert!(constant_name("MAX").is_ok());
        assert!(constant_name("max").is_ok());
        assert!(constant_name("MAX_SIZE").is_ok());
        assert!(constant_name("limit2").is_ok());
        assert!(constant_name("2FAST").is_err());
        assert!(constant_name("MAX SIZE").is_err());
        assert!(matches!(
            constant_name(""),
            Err(LowerError::InvalidName { reason: "name is empty", .. })
        ));
    }

    #[test]
    fn test_condition_must_be_bool() {
        let module = Module::new("Checks");
        assert!(condition(&module, &Value::LiteralBool(true)).is_ok());
        assert_eq!(
            condition(&module, &Value::LiteralInt(5)).unwrap_err(),
            LowerError::ConditionNotBoolean {
                found: "int".to_string()
            }
        );
    }

    #[test]
    fn test_bare_return_only_in_void() {
        let module = Module::new("Checks");
        assert!(return_value(&module, &Type::VOID, None).is_ok());
        assert!(matches!(
            return_value(&module, &Type::INT, None),
            Err(LowerError::ReturnTypeMismatch { .. })
        ));
        assert!(matches!(
            return_value(&module, &Type::INT, Some(&Value::LiteralString("no".to_string()))),
            Err(LowerError::ReturnTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_terminal_return_checks_last_statement_only() {
        let function = CallableRef::Function(Idx::from_raw(RawIdx::from(0)));
        let ret = Statement::Return {
            value: Some(Value::LiteralInt(1)),
            meta: ReturnMetadata { callable: function },
        };

        assert!(terminal_return("one", &Type::INT, &[Statement::Break, ret.clone()]).is_ok());
        assert!(terminal_return("one", &Type::INT, &[ret, Statement::Break]).is_err());
        assert!(terminal_return("nothing", &Type::VOID, &[]).is_ok());
        assert_eq!(
            terminal_return("empty", &Type::INT, &[]).unwrap_err(),
            LowerError::MissingTerminalReturn("empty".to_string())
        );
    }
}
