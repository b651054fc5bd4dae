//! dnr-shield CLI
//!
//! Compiles filter lists into declarative net request rule artifacts and
//! inspects existing ones.

use std::fs;
use std::path::Path;
use std::time::Instant;

use clap::{Parser, Subcommand};

use dnr_compiler::compile;
use dnr_core::rule::{BlockRule, InitiatorScope, DEFAULT_MAX_DYNAMIC_RULES};

#[derive(Parser)]
#[command(name = "dnr-cli")]
#[command(about = "dnr-shield filter list compiler and tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile filter lists into a DNR rules JSON artifact
    Compile {
        /// Input filter list files
        #[arg(short, long, required = true)]
        input: Vec<String>,

        /// Output rules file
        #[arg(short, long, default_value = "rules.json")]
        output: String,

        /// Rule cap; defaults to the engine's dynamic-rule limit
        #[arg(long)]
        max_rules: Option<u32>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Dump rule artifact info
    Info {
        /// Rules file to inspect
        #[arg(short, long)]
        input: String,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile {
            input,
            output,
            max_rules,
            verbose,
        } => cmd_compile(&input, &output, max_rules, verbose),
        Commands::Info { input } => cmd_info(&input),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn cmd_compile(
    inputs: &[String],
    output: &str,
    max_rules: Option<u32>,
    verbose: bool,
) -> Result<(), String> {
    if inputs.is_empty() {
        return Err("No input files specified".to_string());
    }

    let start = Instant::now();
    let mut all_rules = Vec::new();
    let mut total_lines = 0usize;

    for path in inputs {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read '{}': {}", path, e))?;

        let line_count = content.lines().count();
        total_lines += line_count;

        let rules = compile(&content);

        if verbose {
            println!(
                "  {} - {} lines, {} rules",
                Path::new(path).file_name().unwrap_or_default().to_string_lossy(),
                line_count,
                rules.len()
            );
        }

        all_rules.extend(rules);
    }

    // Ids restarted at 1 per list; renumber so the combined set keeps one
    // strictly increasing sequence.
    for (index, rule) in all_rules.iter_mut().enumerate() {
        rule.id = index as u32 + 1;
    }

    let compiled = all_rules.len();
    let cap = max_rules.unwrap_or(DEFAULT_MAX_DYNAMIC_RULES) as usize;
    if all_rules.len() > cap {
        all_rules.truncate(cap);
    }

    let json = serde_json::to_string_pretty(&all_rules)
        .map_err(|e| format!("Failed to serialize rules: {}", e))?;
    fs::write(output, &json).map_err(|e| format!("Failed to write '{}': {}", output, e))?;

    let total_time = start.elapsed();

    println!("Compiled {} filter lists to '{}'", inputs.len(), output);
    println!("  Lines:    {}", total_lines);
    if compiled > all_rules.len() {
        println!(
            "  Rules:    {} -> {} (truncated to cap)",
            compiled,
            all_rules.len()
        );
    } else {
        println!("  Rules:    {}", all_rules.len());
    }
    println!("  Size:     {} bytes ({:.1} KB)", json.len(), json.len() as f64 / 1024.0);
    println!("  Time:     {:.1}ms", total_time.as_secs_f64() * 1000.0);

    Ok(())
}

fn cmd_info(input: &str) -> Result<(), String> {
    let content = fs::read(input).map_err(|e| format!("Failed to read '{}': {}", input, e))?;

    let rules: Vec<BlockRule> = serde_json::from_slice(&content)
        .map_err(|e| format!("Invalid rules file: {}", e))?;

    let scoped_include = rules
        .iter()
        .filter(|r| {
            matches!(
                r.condition.initiator_scope,
                Some(InitiatorScope::InitiatorDomains(_))
            )
        })
        .count();
    let scoped_exclude = rules
        .iter()
        .filter(|r| {
            matches!(
                r.condition.initiator_scope,
                Some(InitiatorScope::ExcludedInitiatorDomains(_))
            )
        })
        .count();

    println!("Rules: {}", input);
    println!("  Count:            {}", rules.len());
    println!("  Initiator-scoped: {} include, {} exclude", scoped_include, scoped_exclude);
    println!("  Total size:       {} bytes ({:.1} KB)", content.len(), content.len() as f64 / 1024.0);
    println!(
        "  Engine cap:       {} ({})",
        DEFAULT_MAX_DYNAMIC_RULES,
        if rules.len() as u32 <= DEFAULT_MAX_DYNAMIC_RULES {
            "fits"
        } else {
            "over, will be truncated"
        }
    );

    Ok(())
}
