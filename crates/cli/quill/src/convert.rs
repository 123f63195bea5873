//! JSON arguments to runtime values

use anyhow::{Context, Result, bail};
use ql_interpreter::{Instance, Value};
use ql_ir::{Module, Primitive, Type};
use serde_json::Value as Json;
use std::cell::RefCell;
use std::rc::Rc;

/// Convert `json` to a runtime value of type `ty`
///
/// Runes are one-character strings. Maps are JSON objects when the key
/// type is a primitive, and arrays of `[key, value]` pairs otherwise.
/// Models are objects naming every field, or `null`.
pub fn to_value(module: &Module, ty: &Type, json: &Json) -> Result<Value> {
    match (ty, json) {
        (Type::Primitive(Primitive::Boolean), Json::Bool(b)) => Ok(Value::Bool(*b)),
        (Type::Primitive(Primitive::Int), Json::Number(n)) => n
            .as_i64()
            .map(Value::Int)
            .with_context(|| format!("{n} is not a 64-bit integer")),
        (Type::Primitive(Primitive::Rune), Json::String(s)) => single_char(s).map(Value::Rune),
        (Type::Primitive(Primitive::String), Json::String(s)) => Ok(Value::String(s.clone())),
        (Type::List(item), Json::Array(items)) => items
            .iter()
            .map(|item_json| to_value(module, item, item_json))
            .collect::<Result<Vec<_>>>()
            .map(Value::list),
        (Type::Set(item), Json::Array(items)) => {
            let mut values = Vec::with_capacity(items.len());
            for item_json in items {
                let value = to_value(module, item, item_json)?;
                if !values.contains(&value) {
                    values.push(value);
                }
            }
            Ok(Value::set(values))
        }
        (Type::Map(key_ty, value_ty), Json::Object(object)) => {
            let mut entries = Vec::with_capacity(object.len());
            for (key_text, value_json) in object {
                let key = key_from_text(key_ty, key_text)?;
                entries.push((key, to_value(module, value_ty, value_json)?));
            }
            Ok(Value::map(entries))
        }
        (Type::Map(key_ty, value_ty), Json::Array(pairs)) => {
            let mut entries: Vec<(Value, Value)> = Vec::with_capacity(pairs.len());
            for pair in pairs {
                let (key_json, value_json) = match pair.as_array().map(Vec::as_slice) {
                    Some([key_json, value_json]) => (key_json, value_json),
                    _ => bail!("map entries must be [key, value] pairs, got {pair}"),
                };
                let key = to_value(module, key_ty, key_json)?;
                let value = to_value(module, value_ty, value_json)?;
                match entries.iter_mut().find(|(existing, _)| *existing == key) {
                    Some(entry) => entry.1 = value,
                    None => entries.push((key, value)),
                }
            }
            Ok(Value::map(entries))
        }
        (Type::Model(_), Json::Null) => Ok(Value::Null),
        (Type::Model(model), Json::Object(object)) => {
            let def = &module.models[*model];
            let mut fields = Vec::with_capacity(def.fields.len());
            for field in &def.fields {
                let field_json = object
                    .get(&field.name)
                    .with_context(|| format!("missing field `{}` for {}", field.name, def.name))?;
                fields.push(
                    to_value(module, &field.ty, field_json)
                        .with_context(|| format!("in field `{}` of {}", field.name, def.name))?,
                );
            }
            if let Some(unknown) = object.keys().find(|name| def.field(name).is_none()) {
                bail!("{} has no field `{unknown}`", def.name);
            }
            Ok(Value::Instance(Rc::new(Instance {
                model: *model,
                name: def.name.clone(),
                fields: RefCell::new(fields),
            })))
        }
        (ty, json) => bail!("expected {}, got {json}", module.type_name(ty)),
    }
}

fn single_char(text: &str) -> Result<char> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => bail!("expected a single character, got {text:?}"),
    }
}

/// Object keys are always strings; reinterpret them as the key type
fn key_from_text(ty: &Type, text: &str) -> Result<Value> {
    match ty {
        Type::Primitive(Primitive::String) => Ok(Value::String(text.to_string())),
        Type::Primitive(Primitive::Int) => text
            .parse()
            .map(Value::Int)
            .with_context(|| format!("map key {text:?} is not an integer")),
        Type::Primitive(Primitive::Rune) => single_char(text).map(Value::Rune),
        Type::Primitive(Primitive::Boolean) => text
            .parse()
            .map(Value::Bool)
            .with_context(|| format!("map key {text:?} is not a boolean")),
        _ => bail!("use [key, value] pairs for maps with non-primitive keys"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ql_ir::FieldDef;
    use serde_json::json;

    #[test]
    fn test_primitives() {
        let module = Module::new("Args");
        assert_eq!(to_value(&module, &Type::INT, &json!(5)).unwrap(), Value::Int(5));
        assert_eq!(to_value(&module, &Type::BOOLEAN, &json!(true)).unwrap(), Value::Bool(true));
        assert_eq!(to_value(&module, &Type::RUNE, &json!("x")).unwrap(), Value::Rune('x'));
        assert!(to_value(&module, &Type::RUNE, &json!("xy")).is_err());
        assert!(to_value(&module, &Type::INT, &json!(1.5)).is_err());
        assert!(to_value(&module, &Type::STRING, &json!(1)).is_err());
    }

    #[test]
    fn test_containers() {
        let module = Module::new("Args");
        assert_eq!(
            to_value(&module, &Type::set(Type::INT), &json!([1, 2, 1])).unwrap(),
            Value::set(vec![Value::Int(1), Value::Int(2)])
        );
        assert_eq!(
            to_value(&module, &Type::map(Type::INT, Type::STRING), &json!({"7": "seven"})).unwrap(),
            Value::map(vec![(Value::Int(7), Value::String("seven".to_string()))])
        );
        assert_eq!(
            to_value(
                &module,
                &Type::map(Type::list(Type::INT), Type::BOOLEAN),
                &json!([[[1], true]])
            )
            .unwrap(),
            Value::map(vec![(Value::list(vec![Value::Int(1)]), Value::Bool(true))])
        );
    }

    #[test]
    fn test_models() {
        let mut module = Module::new("Args");
        let point = module.declare_model("Point").unwrap();
        module.models[point]
            .declare_field(FieldDef {
                name: "x".to_string(),
                ty: Type::INT,
            })
            .unwrap();
        let ty = Type::Model(point);

        assert_eq!(to_value(&module, &ty, &json!(null)).unwrap(), Value::Null);
        let value = to_value(&module, &ty, &json!({"x": 3})).unwrap();
        assert_eq!(value.to_string(), "Point { 3 }");
        assert!(to_value(&module, &ty, &json!({})).is_err());
        assert!(to_value(&module, &ty, &json!({"x": 1, "y": 2})).is_err());
    }
}
