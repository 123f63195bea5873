//! IR dump snapshots

use expect_test::expect;
use integration_tests::{fibonacci, inventory};
use ql_lower::lower;
use ql_syntax::{BinaryOperator as Op, Block, FunctionDef, ModelDef, Module, Statement, Type, Value};

#[test]
fn test_dump_functions_and_loops() {
    let module = lower(&fibonacci()).unwrap();
    expect![[r#"
        module Fibonacci
        function main() -> int
          return fib(10)
        function fib(n: int) -> int
          if (n < 2)
            return n
          return (fib((n - 1)) + fib((n - 2)))
        function fibLoop(n: int) -> int
          let a: int = 0
          let b: int = 1
          for let i: int = 0; (i < n); i = (i + 1)
            let next: int = (a + b)
            a = b
            b = next
          return a
    "#]]
    .assert_eq(&module.dump());
}

#[test]
fn test_dump_containers_and_constants() {
    let module = lower(&inventory()).unwrap();
    expect![[r#"
        module Inventory
        const LIMIT: int = 3
        function main() -> int
          let stock: map<string, int> = {"apple": 2, "pear": 5}
          stock["plum"] = 1
          let known: set<string> = set{"apple", "pear", "plum"}
          let total: int = 0
          for name in ["apple", "pear", "plum", "fig"]
            if known.contains(name)
              total = (total + stock[name])
          return ((total * 10) + LIMIT)
        function firstRune(word: string) -> int
          return int(word[0])
        function stack() -> int
          let items: list<int> = list<int>{}
          for let i: int = 0; (i < 5); i = (i + 1)
            items.push((i * i))
          items.pop()
          let top: int = items.pop()
          return (top + len(items))
    "#]]
    .assert_eq(&module.dump());
}

#[test]
fn test_dump_models() {
    let module = Module::new("Counters")
        .with_model(
            ModelDef::new("Counter")
                .with_field("count", Type::Int)
                .with_method(
                    FunctionDef::new(
                        "bump",
                        Type::Void,
                        Block::new(vec![Statement::assign(
                            Value::var("count"),
                            Value::binary(Value::var("count"), Op::Add, Value::var("by")),
                        )]),
                    )
                    .with_argument("by", Type::Int),
                )
                .with_equal_override(
                    "other",
                    Block::new(vec![Statement::ret(Value::binary(
                        Value::var("count"),
                        Op::Equals,
                        Value::property(Value::var("other"), "count"),
                    ))]),
                ),
        )
        .with_function(FunctionDef::new(
            "make",
            Type::model("Counter"),
            Block::new(vec![
                Statement::declare("c", Value::new_instance("Counter")),
                Statement::method_call(Value::var("c"), "bump", vec![Value::int(2)]),
                Statement::ret(Value::var("c")),
            ]),
        ));

    expect![[r#"
        module Counters
        model Counter
          field count: int
          method bump(by: int) -> void
            count = (count + by)
          equal(other)
            return (count == other.count)
        function make() -> Counter
          let c: Counter = new Counter()
          c.bump(2)
          return c
    "#]]
    .assert_eq(&lower(&module).unwrap().dump());
}
