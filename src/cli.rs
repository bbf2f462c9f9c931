//! Sous command line
//!
//! `run` executes a recipe, `validate` parses and expands one without running
//! anything, and `components` lists what the component directories provide.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::engine::expander;
use crate::engine::value::Value;
use crate::engine::Engine;
use crate::output::Output;
use crate::prompt::{PromptProvider, StaticPrompter, TerminalPrompter};
use crate::recipe::{load_recipe, ComponentRegistry};
use crate::telemetry::{init_tracing, init_tracing_with_filter, DEBUG_FILTER};

#[derive(Parser)]
#[command(name = "sous")]
#[command(about = "Run declarative YAML recipes of shell operations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Extra component directory (repeatable)
    #[arg(long = "components", value_name = "DIR", global = true)]
    components: Vec<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a recipe
    #[command(alias = "r")]
    Run {
        /// Path to the recipe YAML file
        recipe: PathBuf,

        /// Data handed to every command on stdin and exposed as `.input`
        input: Option<String>,

        /// Recipe variables (KEY=VALUE, repeatable)
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,

        /// Working directory for commands
        #[arg(short = 'C', long, value_name = "DIR")]
        workdir: Option<PathBuf>,

        /// Log every operation and echo rendered commands
        #[arg(long)]
        debug: bool,

        /// Never prompt: use prompt defaults and continue past failures
        #[arg(short = 'y', long)]
        yes: bool,

        /// Print the final outputs, results and tasks as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse a recipe and expand its components without running it
    Validate {
        /// Path to the recipe YAML file
        recipe: PathBuf,
    },

    /// List registered component ids
    Components,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let debug = matches!(cli.command, Commands::Run { debug: true, .. });
    if debug {
        init_tracing_with_filter(DEBUG_FILTER);
    } else {
        init_tracing();
    }

    if cli.no_color || std::env::var_os("NO_COLOR").is_some() {
        colored::control::set_override(false);
    }

    let mut config = Config::load(cli.config.as_deref())?;
    if cli.no_color {
        config.ui.color = false;
    }
    let registry = load_components(&config, &cli.components)?;

    match cli.command {
        Commands::Run {
            recipe,
            input,
            vars,
            workdir,
            debug,
            yes,
            json,
        } => {
            let doc = load_recipe(&recipe)?;
            let vars = parse_vars(&vars)?;

            let prompter: Arc<dyn PromptProvider> = if yes {
                Arc::new(StaticPrompter::new(true))
            } else {
                Arc::new(TerminalPrompter)
            };
            let output = Output {
                color: config.ui.color && crate::output::supports_color(),
                progress: config.ui.progress && !json,
                quiet: json,
                debug,
            };

            let mut engine = Engine::new(config, registry, prompter).with_output(output);
            if let Some(dir) = workdir {
                let dir = dir
                    .canonicalize()
                    .with_context(|| format!("Cannot use working directory {}", dir.display()))?;
                engine = engine.with_workdir(dir);
            }

            let outcome = engine
                .run(&doc, input.as_deref().unwrap_or_default(), vars, debug)
                .await
                .with_context(|| format!("Recipe '{}' failed", doc.name))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else if outcome.exited {
                eprintln!("{}", format!("Recipe '{}' exited early", doc.name).dimmed());
            }
        }

        Commands::Validate { recipe } => {
            let doc = load_recipe(&recipe)?;
            let mut op_map = HashMap::new();
            let ops = expander::expand(&doc.operations, &registry, &mut op_map)
                .with_context(|| format!("Cannot expand {}", recipe.display()))?;
            println!(
                "{} {}: {} top-level operations, {} addressable ids",
                "✓".green(),
                doc.name.bold(),
                ops.len(),
                op_map.len()
            );
        }

        Commands::Components => {
            if registry.is_empty() {
                println!("No components registered");
            }
            for id in registry.ids() {
                let description = registry
                    .get(id)
                    .map(|c| c.description.as_str())
                    .unwrap_or_default();
                if description.is_empty() {
                    println!("{}", id);
                } else {
                    println!("{}  {}", id.bold(), description.dimmed());
                }
            }
        }
    }

    Ok(())
}

/// Components from the configured directories, then from `--components`
fn load_components(config: &Config, extra: &[PathBuf]) -> Result<ComponentRegistry> {
    let mut registry = ComponentRegistry::new();
    for dir in config.paths.components.iter().chain(extra) {
        load_component_dir(&mut registry, dir)?;
    }
    Ok(registry)
}

fn load_component_dir(registry: &mut ComponentRegistry, dir: &Path) -> Result<()> {
    let count = registry
        .load_dir(dir)
        .with_context(|| format!("Cannot load components from {}", dir.display()))?;
    tracing::debug!(dir = %dir.display(), count, "loaded components");
    Ok(())
}

/// `KEY=VALUE` pairs; values are typed the same way command output is.
fn parse_vars(pairs: &[String]) -> Result<HashMap<String, Value>> {
    let mut vars = HashMap::new();
    for kv in pairs {
        match kv.split_once('=') {
            Some((k, v)) if !k.trim().is_empty() => {
                vars.insert(k.trim().to_string(), Value::from_output(v));
            }
            _ => anyhow::bail!("Invalid variable '{}', expected KEY=VALUE", kv),
        }
    }
    Ok(vars)
}
