//! Text dump of a lowered module
//!
//! The dump is deterministic: definitions appear in declaration order and
//! every name is printed the way the source spelled it. It is meant for
//! humans and snapshot tests, not for parsing back.

use crate::{
    Block, Call, Definition, FunctionDef, FunctionId, Module, Owner, Statement, Type,
    UnaryOperator, Value,
};

const INDENT: &str = "  ";

impl Module {
    /// Source spelling of a type, with model names resolved
    #[must_use]
    pub fn type_name(&self, ty: &Type) -> String {
        match ty {
            Type::Primitive(primitive) => primitive.name().to_string(),
            Type::List(item) => format!("list<{}>", self.type_name(item)),
            Type::Map(key, value) => {
                format!("map<{}, {}>", self.type_name(key), self.type_name(value))
            }
            Type::Set(item) => format!("set<{}>", self.type_name(item)),
            Type::Model(model) => self.models[*model].name.clone(),
        }
    }

    /// Render the whole module
    #[must_use]
    pub fn dump(&self) -> String {
        let mut printer = Printer {
            module: self,
            out: String::new(),
        };
        printer.module();
        printer.out
    }

    /// Render a single value
    #[must_use]
    pub fn value_text(&self, value: &Value) -> String {
        Printer {
            module: self,
            out: String::new(),
        }
        .value(value)
    }
}

struct Printer<'m> {
    module: &'m Module,
    out: String,
}

impl Printer<'_> {
    fn line(&mut self, depth: usize, text: &str) {
        for _ in 0..depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn module(&mut self) {
        let module = self.module;
        self.line(0, &format!("module {}", module.name));

        for constant in module.constants.values() {
            let text = format!(
                "const {}: {} = {}",
                constant.name,
                module.type_name(&constant.ty),
                self.value(&constant.value)
            );
            self.line(0, &text);
        }

        for model in module.models.values() {
            self.line(0, &format!("model {}", model.name));
            for field in &model.fields {
                let text = format!("field {}: {}", field.name, module.type_name(&field.ty));
                self.line(1, &text);
            }
            for method in &model.methods {
                self.function(1, *method);
            }
            if let Some(equal) = &model.equal_override {
                let other = &module.locals[equal.other].name;
                self.line(1, &format!("equal({other})"));
                self.block(2, &equal.block);
            }
            if let Some(hash) = &model.hash_override {
                self.line(1, "hash");
                self.block(2, &hash.block);
            }
        }

        for id in module.free_functions() {
            self.function(0, id);
        }
    }

    fn function(&mut self, depth: usize, id: FunctionId) {
        let module = self.module;
        let function: &FunctionDef = &module.functions[id];
        let keyword = match function.owner {
            Owner::Module => "function",
            Owner::Model(_) => "method",
        };
        let arguments = function
            .arguments
            .iter()
            .map(|arg| format!("{}: {}", arg.name, module.type_name(&arg.ty)))
            .collect::<Vec<_>>()
            .join(", ");
        let header = format!(
            "{keyword} {}({arguments}) -> {}",
            function.name,
            module.type_name(&function.return_type)
        );
        self.line(depth, &header);
        self.block(depth + 1, &function.block);
    }

    fn block(&mut self, depth: usize, block: &Block) {
        for statement in &block.statements {
            self.statement(depth, statement);
        }
    }

    fn statement(&mut self, depth: usize, statement: &Statement) {
        match statement {
            Statement::Conditional { ifs, else_block } => {
                for (index, arm) in ifs.iter().enumerate() {
                    let keyword = if index == 0 { "if" } else { "else if" };
                    let text = format!("{keyword} {}", self.value(&arm.condition));
                    self.line(depth, &text);
                    self.block(depth + 1, &arm.block);
                }
                if let Some(block) = else_block {
                    self.line(depth, "else");
                    self.block(depth + 1, block);
                }
            }
            Statement::For {
                initialization,
                condition,
                after_each,
                block,
            } => {
                let init = initialization
                    .as_deref()
                    .map(|s| self.simple(s))
                    .unwrap_or_default();
                let after = after_each
                    .as_deref()
                    .map(|s| self.simple(s))
                    .unwrap_or_default();
                let text = format!("for {init}; {}; {after}", self.value(condition));
                self.line(depth, text.trim_end());
                self.block(depth + 1, block);
            }
            Statement::ForEach {
                item,
                iterable,
                block,
                ..
            } => {
                let text = format!(
                    "for {} in {}",
                    self.module.locals[*item].name,
                    self.value(iterable)
                );
                self.line(depth, &text);
                self.block(depth + 1, block);
            }
            _ => {
                let text = self.simple(statement);
                self.line(depth, &text);
            }
        }
    }

    /// One-line form of a statement without a nested block
    fn simple(&self, statement: &Statement) -> String {
        match statement {
            Statement::Declare { local, value } => {
                let local = &self.module.locals[*local];
                format!(
                    "let {}: {} = {}",
                    local.name,
                    self.module.type_name(&local.ty),
                    self.value(value)
                )
            }
            Statement::Assign { to, from } => {
                format!("{} = {}", self.value(to), self.value(from))
            }
            Statement::Return { value: Some(value), .. } => format!("return {}", self.value(value)),
            Statement::Return { value: None, .. } => "return".to_string(),
            Statement::Break => "break".to_string(),
            Statement::Continue => "continue".to_string(),
            Statement::AddToSet { set, value } => {
                format!("{}.add({})", self.value(set), self.value(value))
            }
            Statement::Push { list, value } => {
                format!("{}.push({})", self.value(list), self.value(value))
            }
            Statement::Pop { list } => format!("{}.pop()", self.value(list)),
            Statement::Call(call) => self.call(call),
            Statement::Conditional { .. } => "if ...".to_string(),
            Statement::For { .. } | Statement::ForEach { .. } => "for ...".to_string(),
        }
    }

    fn list(&self, values: &[Value]) -> String {
        values
            .iter()
            .map(|value| self.value(value))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn call(&self, call: &Call) -> String {
        let name = &self.module.functions[call.meta.function].name;
        let arguments = self.list(&call.arguments);
        match &call.receiver {
            Some(receiver) => format!("{}.{name}({arguments})", self.value(receiver)),
            None => format!("{name}({arguments})"),
        }
    }

    fn value(&self, value: &Value) -> String {
        let module = self.module;
        match value {
            Value::LiteralBool(value) => value.to_string(),
            Value::LiteralInt(value) => value.to_string(),
            Value::LiteralRune(value) => format!("{value:?}"),
            Value::LiteralString(value) => format!("{value:?}"),
            Value::LiteralList { items, .. } => format!("[{}]", self.list(items)),
            Value::LiteralSet { items, .. } => format!("set{{{}}}", self.list(items)),
            Value::LiteralMap { entries, .. } => {
                let mut text = String::from("{");
                for (index, (key, value)) in entries.iter().enumerate() {
                    if index > 0 {
                        text.push_str(", ");
                    }
                    text.push_str(&format!("{}: {}", self.value(key), self.value(value)));
                }
                text.push('}');
                text
            }
            Value::EmptyList { item } => format!("list<{}>{{}}", module.type_name(item)),
            Value::EmptySet { item } => format!("set<{}>{{}}", module.type_name(item)),
            Value::EmptyMap { key, value } => format!(
                "map<{}, {}>{{}}",
                module.type_name(key),
                module.type_name(value)
            ),
            Value::Call(call) => self.call(call),
            Value::Lookup { from, key, .. } => format!("{}[{}]", self.value(from), self.value(key)),
            Value::Property { of, meta } => format!(
                "{}.{}",
                self.value(of),
                module.definition_name(Definition::Field(meta.field))
            ),
            Value::SetContains { set, value } => {
                format!("{}.contains({})", self.value(set), self.value(value))
            }
            Value::New { model } => format!("new {}()", module.models[*model].name),
            Value::Length { of, .. } => format!("len({})", self.value(of)),
            Value::Unary {
                operator, value, ..
            } => match operator {
                UnaryOperator::Not | UnaryOperator::Negate => {
                    format!("{operator}{}", self.value(value))
                }
                UnaryOperator::CastToInt | UnaryOperator::CastToString | UnaryOperator::Hash => {
                    format!("{operator}({})", self.value(value))
                }
            },
            Value::Binary {
                operator,
                left,
                right,
                ..
            } => format!("({} {operator} {})", self.value(left), self.value(right)),
            Value::Variable(meta) => module.definition_name(meta.definition).to_string(),
            Value::SelfRef { .. } => "self".to_string(),
            Value::Null { .. } => "null".to_string(),
            Value::Pop { list, .. } => format!("{}.pop()", self.value(list)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConstantDef, FieldDef};
    use expect_test::expect;

    #[test]
    fn test_dump_declarations() {
        let mut module = Module::new("Shelf");
        module
            .declare_constant(ConstantDef {
                name: "GREETING".to_string(),
                value: Value::LiteralString("hi".to_string()),
                ty: Type::STRING,
            })
            .unwrap();
        let book = module.declare_model("Book").unwrap();
        for (name, ty) in [
            ("title", Type::STRING),
            ("tags", Type::set(Type::STRING)),
            ("pages", Type::map(Type::INT, Type::list(Type::RUNE))),
            ("sequel", Type::Model(book)),
        ] {
            module.models[book]
                .declare_field(FieldDef {
                    name: name.to_string(),
                    ty,
                })
                .unwrap();
        }

        expect![[r#"
            module Shelf
            const GREETING: string = "hi"
            model Book
              field title: string
              field tags: set<string>
              field pages: map<int, list<rune>>
              field sequel: Book
        "#]]
        .assert_eq(&module.dump());
    }
}
