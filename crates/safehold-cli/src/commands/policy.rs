//! Policy commands

use std::path::PathBuf;

use clap::{Args, Subcommand};

use safehold_core::policy::PolicyEngine;

#[derive(Debug, Args)]
pub struct PolicyArgs {
    #[command(subcommand)]
    pub command: PolicyCommand,
}

#[derive(Debug, Subcommand)]
pub enum PolicyCommand {
    /// Validate an action description against a policy document
    Check(CheckArgs),
    /// Show the rules parsed from a policy document
    Show(ShowArgs),
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Policy document (Markdown)
    #[arg(long)]
    pub doc: PathBuf,

    /// Action description to validate
    pub action: String,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Policy document (Markdown)
    #[arg(long)]
    pub doc: PathBuf,
}

pub fn execute(args: PolicyArgs) -> Result<(), Box<dyn std::error::Error>> {
    match args.command {
        PolicyCommand::Check(check_args) => execute_check(check_args),
        PolicyCommand::Show(show_args) => execute_show(show_args),
    }
}

fn execute_check(args: CheckArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = PolicyEngine::new();
    let count = engine.load_file(&args.doc)?;

    let decision = engine.validate(&args.action);
    if decision.allowed {
        println!("ALLOWED ({} rules checked)", count);
    } else {
        println!("DENIED:");
        for violation in &decision.violations {
            println!("  {}", violation);
        }
        std::process::exit(2);
    }
    Ok(())
}

fn execute_show(args: ShowArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = PolicyEngine::new();
    engine.load_file(&args.doc)?;

    println!("{} rule(s) loaded from {}", engine.rule_count(), args.doc.display());
    for rule in engine.rules() {
        println!("  [{}] {}", rule.id, rule.description);
        let terms: Vec<&str> = rule.trigger_terms.iter().map(String::as_str).collect();
        println!("      triggers: {}", terms.join(", "));
    }
    Ok(())
}
