//! Lowering pipeline integration

use crate::config::QuillConfig;
use anyhow::{Context, Result};
use ql_lower::Lowerer;
use std::path::Path;
use tracing::{debug, info};

/// Read a JSON-encoded syntax tree
pub fn load_syntax(path: &Path) -> Result<ql_syntax::Module> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file {}", path.display()))?;
    debug!(path = %path.display(), bytes = source.len(), "read syntax tree");
    serde_json::from_str(&source)
        .with_context(|| format!("{} is not a valid syntax tree", path.display()))
}

/// Read a syntax tree and lower it with the configured options
pub fn compile_file(path: &Path, config: &QuillConfig) -> Result<ql_ir::Module> {
    let syntax = load_syntax(path)?;
    let module = Lowerer::new(config.lower.options())
        .lower(&syntax)
        .with_context(|| format!("Failed to lower {}", path.display()))?;
    info!(
        module = %module.name,
        functions = module.functions.len(),
        models = module.models.len(),
        "lowered"
    );
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ql_syntax::{Block, FunctionDef, Module, Statement, Type, Value};

    fn write_tree(dir: &Path, module: &Module) -> std::path::PathBuf {
        let path = dir.join("tree.json");
        std::fs::write(&path, serde_json::to_string_pretty(module).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_compile_valid_tree() {
        let dir = tempfile::tempdir().unwrap();
        let tree = Module::new("Demo").with_function(FunctionDef::new(
            "main",
            Type::Int,
            Block::new(vec![Statement::ret(Value::int(1))]),
        ));
        let path = write_tree(dir.path(), &tree);

        let module = compile_file(&path, &QuillConfig::default()).unwrap();
        assert_eq!(module.name, "Demo");
        assert!(module.function("main").is_some());
    }

    #[test]
    fn test_lowering_error_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let tree = Module::new("Demo").with_function(FunctionDef::new(
            "main",
            Type::Int,
            Block::new(vec![Statement::ret(Value::string("no"))]),
        ));
        let path = write_tree(dir.path(), &tree);

        let error = compile_file(&path, &QuillConfig::default()).unwrap_err();
        assert!(error.to_string().starts_with("Failed to lower"));
        assert!(error.root_cause().to_string().contains("return type mismatch"));
    }

    #[test]
    fn test_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_syntax(&path).is_err());
        assert!(load_syntax(&dir.path().join("missing.json")).is_err());
    }
}
