use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use pipetree::lockfile::generate_lock;
use pipetree::observability::log_snapshot;
use pipetree::validation::validate_recipe;
use pipetree::{Context, Executor, MethodTable, Recipe, steps};
use serde_json::to_writer_pretty;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, prelude::*};

fn main() -> Result<()> {
    let cli = Cli::parse();
    configure_tracing()?;

    match cli.command {
        Commands::Run {
            recipe,
            context,
            print_metrics,
            metrics_json,
            metrics_prometheus,
        } => run_recipe(
            recipe,
            context,
            print_metrics,
            metrics_json,
            metrics_prometheus,
        ),
        Commands::Validate { recipe } => validate_recipe_cmd(recipe),
        Commands::Inspect { recipe } => inspect_recipe(recipe),
        Commands::Lock { recipe, output } => lock_recipe(recipe, output),
        Commands::ListSteps => {
            list_steps();
            Ok(())
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "pipetree", &mut io::stdout());
            Ok(())
        }
    }
}

fn configure_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init()
        .map_err(|err| anyhow!(err.to_string()))
}

fn run_recipe(
    recipe_path: PathBuf,
    context_path: Option<PathBuf>,
    print_metrics: bool,
    metrics_json: Option<PathBuf>,
    metrics_prometheus: Option<PathBuf>,
) -> Result<()> {
    let recipe = Recipe::load(&recipe_path)?;
    let table = build_table();
    let tree = recipe.build(&table)?;

    let mut context = recipe.initial_context();
    if let Some(path) = context_path {
        context.merge(load_context(&path)?);
    }

    info!(
        recipe = %recipe_path.display(),
        steps = tree.len(),
        "Running pipetree {tree}"
    );
    let executor = Executor::new();
    let outcome = executor.run(&tree, context)?;

    to_writer_pretty(io::stdout(), outcome.context()).context("Failed to write final context")?;
    println!();

    if print_metrics || metrics_json.is_some() || metrics_prometheus.is_some() {
        let snapshot = executor.metrics().snapshot();
        if print_metrics {
            log_snapshot(&snapshot);
        }
        if let Some(path) = metrics_json {
            ensure_parent(&path)?;
            let file = File::create(&path)
                .with_context(|| format!("Failed to create metrics file: {}", path.display()))?;
            to_writer_pretty(file, &snapshot)
                .with_context(|| format!("Failed to write metrics JSON: {}", path.display()))?;
            info!(metrics = %path.display(), "Metrics JSON written");
        }
        if let Some(path) = metrics_prometheus {
            ensure_parent(&path)?;
            std::fs::write(&path, snapshot.to_prometheus()).with_context(|| {
                format!("Failed to write Prometheus metrics: {}", path.display())
            })?;
            info!(metrics = %path.display(), "Prometheus metrics written");
        }
    }

    if outcome.succeeded() {
        info!(recipe = %recipe_path.display(), "Pipetree succeeded");
        Ok(())
    } else {
        Err(anyhow!("Pipetree halted: {}", recipe_path.display()))
    }
}

fn load_context(path: &Path) -> Result<Context> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read context file: {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse context JSON: {}", path.display()))?;
    Context::try_from(value).with_context(|| format!("Invalid context file: {}", path.display()))
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create metrics directory: {}", parent.display())
        })?;
    }
    Ok(())
}

fn validate_recipe_cmd(recipe_path: PathBuf) -> Result<()> {
    let recipe = Recipe::load(&recipe_path)?;
    let table = build_table();
    let report = validate_recipe(&recipe, &table);

    for warning in &report.warnings {
        warn!(file = %recipe_path.display(), "{warning}");
    }

    if report.is_ok() {
        info!(file = %recipe_path.display(), "Recipe validation passed");
        Ok(())
    } else {
        for error_msg in &report.errors {
            error!(file = %recipe_path.display(), "{error_msg}");
        }
        Err(anyhow!(
            "Recipe validation failed with {} error(s)",
            report.errors.len()
        ))
    }
}

fn inspect_recipe(recipe_path: PathBuf) -> Result<()> {
    let recipe = Recipe::load(&recipe_path)?;
    let tree = recipe.build(&build_table())?;
    println!("{tree}");
    for (idx, step) in tree.iter().enumerate() {
        println!("{:>3}. {:<24} {:?}", idx + 1, step.name(), step.source());
    }
    Ok(())
}

fn lock_recipe(recipe_path: PathBuf, output_path: PathBuf) -> Result<()> {
    let recipe = Recipe::load(&recipe_path)?;
    let table = build_table();
    let report = validate_recipe(&recipe, &table);

    for warning in &report.warnings {
        warn!(file = %recipe_path.display(), "{warning}");
    }

    if !report.is_ok() {
        for error_msg in &report.errors {
            error!(file = %recipe_path.display(), "{error_msg}");
        }
        return Err(anyhow!(
            "Cannot generate lockfile due to {} validation error(s)",
            report.errors.len()
        ));
    }

    generate_lock(&recipe, &table, &output_path)?;
    info!(lockfile = %output_path.display(), "Lockfile written");
    Ok(())
}

fn list_steps() {
    let table = build_table();
    println!("Available steps:");
    for name in table.known_methods() {
        println!("- {name}");
    }
}

fn build_table() -> MethodTable {
    let mut table = MethodTable::new();
    steps::register_defaults(&mut table);
    table
}

#[derive(Parser)]
#[command(
    name = "pipetree",
    version,
    about = "Run ordered step pipelines described by YAML recipes"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a recipe's pipetree and run it, printing the final context.
    Run {
        recipe: PathBuf,
        /// JSON object merged over the recipe's context.
        #[arg(long)]
        context: Option<PathBuf>,
        #[arg(long)]
        print_metrics: bool,
        #[arg(long = "metrics-json")]
        metrics_json: Option<PathBuf>,
        #[arg(long = "metrics-prometheus")]
        metrics_prometheus: Option<PathBuf>,
    },
    Validate {
        recipe: PathBuf,
    },
    /// Print the resolved step order.
    Inspect {
        recipe: PathBuf,
    },
    Lock {
        recipe: PathBuf,
        output: PathBuf,
    },
    ListSteps,
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}
