//! Run command implementation

use crate::config::QuillConfig;
use anyhow::{Context, Result};
use colored::Colorize;
use ql_interpreter::{Interpreter, Value};
use std::path::Path;
use tracing::info;

pub fn run(
    input: &Path,
    config: &QuillConfig,
    entry: Option<&str>,
    raw_args: &[String],
) -> Result<()> {
    let entry = config.entry(entry);
    println!("{} {} in {}", "Running".green().bold(), entry, input.display());

    let module = crate::compiler::compile_file(input, config)?;
    let Some(function) = module.function(entry) else {
        anyhow::bail!("No function named `{}` in {}", entry, input.display());
    };
    let parameters = &module.functions[function].arguments;
    if parameters.len() != raw_args.len() {
        anyhow::bail!(
            "`{}` takes {} argument(s), {} given",
            entry,
            parameters.len(),
            raw_args.len()
        );
    }

    let mut arguments = Vec::with_capacity(raw_args.len());
    for (parameter, raw) in parameters.iter().zip(raw_args) {
        let json: serde_json::Value = serde_json::from_str(raw)
            .with_context(|| format!("Argument `{}` is not valid JSON: {raw}", parameter.name))?;
        let value = crate::convert::to_value(&module, &parameter.ty, &json)
            .with_context(|| format!("Invalid value for argument `{}`", parameter.name))?;
        arguments.push(value);
    }

    info!(entry, arguments = arguments.len(), "starting interpreter");
    let result = Interpreter::new(&module)
        .run(entry, arguments)
        .with_context(|| format!("`{entry}` failed"))?;

    if result != Value::Void {
        println!("{result}");
    }
    println!("{} {}", "Finished".green().bold(), entry);
    Ok(())
}
