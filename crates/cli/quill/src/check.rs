//! Check command implementation

use crate::config::QuillConfig;
use anyhow::Result;
use colored::Colorize;
use std::path::Path;

pub fn check(input: &Path, config: &QuillConfig, dump_ir: bool) -> Result<()> {
    println!("{} {}", "Checking".green().bold(), input.display());

    let module = match crate::compiler::compile_file(input, config) {
        Ok(module) => module,
        Err(e) => {
            eprintln!("  {} {:#}", "✗".red(), e);
            anyhow::bail!("Check failed for {}", input.display());
        }
    };

    println!(
        "  {} {} functions, {} models, {} constants",
        "✓".green(),
        module.functions.len(),
        module.models.len(),
        module.constants.len()
    );

    if dump_ir {
        println!();
        print!("{}", module.dump());
    }

    println!("{} No errors found", "Success:".green().bold());
    Ok(())
}
