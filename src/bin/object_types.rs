//! Object Types CLI
//!
//! Loads type manifests into a registry and answers questions about them.

use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use object_types::{load_registry, DeclarationLinter, ObjectTypesConfig, TypeRegistry};
use petgraph::Direction;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "object-types")]
#[command(about = "Inspect object type declarations and their relationships")]
struct Cli {
    /// Config file (defaults to object-types.toml lookup)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Manifest directory, overriding the config
    #[arg(short, long)]
    manifests: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show declared and derived metadata of one type
    Show { object_type: String },

    /// Types whose objects reference the given type
    Dependents {
        object_type: String,
        /// Follow dependents transitively
        #[arg(long)]
        transitive: bool,
    },

    /// Columns of other types pointing at the given type
    References { object_type: String },

    /// All types, dependencies first
    Order,

    /// Groups of types referencing each other in a loop
    Cycles,

    /// Check declarations for mistakes
    Lint,

    /// Fuzzy search type names
    Search {
        query: String,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Deletion plan for objects of a type
    Plan { object_type: String },

    /// Export the dependency graph in DOT format
    Dot {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

/// Returns `false` when the command found problems
fn run(cli: Cli) -> anyhow::Result<bool> {
    let config_path = cli.config.as_deref().map(|p| p.to_string_lossy().into_owned());
    let mut config = ObjectTypesConfig::load_from(config_path.as_deref()).context("loading configuration")?;
    if let Some(dir) = cli.manifests {
        config.manifests.path = dir;
    }

    let (registry, checksum) = load_registry(&config)
        .with_context(|| format!("loading manifests from {}", config.manifest_path().display()))?;
    tracing::info!(types = registry.len(), bundle = %checksum.short(), "registry loaded");

    match cli.command {
        Commands::Show { object_type } => show(&registry, &object_type, cli.json),
        Commands::Dependents { object_type, transitive } => {
            let info = lookup(&registry, &object_type)?;
            let names: Vec<String> = if transitive {
                let graph = registry.graph().ok_or_else(|| anyhow!("registry not complete"))?;
                graph
                    .closure(info.object_type(), Direction::Incoming, None)
                    .into_iter()
                    .map(|n| format!("{}{}", "  ".repeat(n.depth - 1), n.object_type))
                    .collect()
            } else {
                info.dependent_object_types().to_vec()
            };
            print_list(&names, cli.json)
        }
        Commands::References { object_type } => {
            let info = lookup(&registry, &object_type)?;
            let refs: Vec<_> = info
                .dependency_references()
                .chain(info.dynamic_dependency_references())
                .collect();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&refs)?);
            } else {
                for r in &refs {
                    println!(
                        "{}.{} -> {} ({:?}{})",
                        r.source_type,
                        r.column,
                        r.target_type,
                        r.kind,
                        if r.required { ", required" } else { "" }
                    );
                }
            }
            Ok(true)
        }
        Commands::Order => {
            let graph = registry.graph().ok_or_else(|| anyhow!("registry not complete"))?;
            print_list(&graph.dependency_order(), cli.json)
        }
        Commands::Cycles => {
            let graph = registry.graph().ok_or_else(|| anyhow!("registry not complete"))?;
            let cycles = graph.cycles();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(cycles)?);
            } else if cycles.is_empty() {
                println!("No cycles");
            } else {
                for cycle in cycles {
                    println!("{}", cycle.join(" <-> "));
                }
            }
            Ok(true)
        }
        Commands::Lint => {
            let linter = DeclarationLinter::with_column_pattern(&config.lint.column_pattern)?;
            let results = linter.lint_registry(&registry);
            let clean = results.iter().all(|r| r.is_clean());
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                for result in &results {
                    println!("{}", result.object_type);
                    for e in &result.errors {
                        println!("  error   {} at {}: {}", e.code, e.path, e.message);
                    }
                    for w in &result.warnings {
                        println!("  warning {} at {}: {}", w.code, w.path, w.message);
                    }
                }
                println!("{} types checked, {} with findings", registry.len(), results.len());
            }
            Ok(clean)
        }
        Commands::Search { query, limit } => {
            let names: Vec<String> = registry
                .search(&query, limit)
                .into_iter()
                .map(|r| format!("{} ({})", r.object_type, r.class_name))
                .collect();
            print_list(&names, cli.json)
        }
        Commands::Plan { object_type } => {
            let plan = registry.delete_plan(&object_type)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                println!("delete {}", plan.object_type);
                for (depth, step) in plan.flatten() {
                    println!(
                        "{}{:?} {} via {}{}",
                        "  ".repeat(depth),
                        step.action,
                        step.object_type,
                        step.column,
                        if step.cycle { " (cycle)" } else { "" }
                    );
                }
            }
            Ok(true)
        }
        Commands::Dot { output } => {
            let graph = registry.graph().ok_or_else(|| anyhow!("registry not complete"))?;
            let dot = graph.to_dot();
            match output {
                Some(path) => {
                    std::fs::write(&path, dot).with_context(|| format!("writing {}", path.display()))?;
                    eprintln!("Exported DOT to {}", path.display());
                }
                None => print!("{}", dot),
            }
            Ok(true)
        }
    }
}

fn lookup<'r>(registry: &'r TypeRegistry, object_type: &str) -> anyhow::Result<object_types::TypeInfo<'r>> {
    registry
        .get(object_type)
        .ok_or_else(|| anyhow!("unknown object type: {}", object_type))
}

fn show(registry: &TypeRegistry, object_type: &str, json: bool) -> anyhow::Result<bool> {
    let info = lookup(registry, object_type)?;

    if json {
        let value = serde_json::json!({
            "object_type": info.object_type(),
            "class_name": info.class_name(),
            "original_object_type": info.original_object_type(),
            "parent_object_type": info.parent_object_type(),
            "scope": info.scope(),
            "flags": info.flags(),
            "default_order_by": info.default_order_by(),
            "object_dependencies": info.object_dependencies(),
            "child_object_types": info.child_object_types(),
            "binding_object_types": info.binding_object_types(),
            "other_binding_object_types": info.other_binding_object_types(),
            "dependent_object_types": info.dependent_object_types(),
            "reference_columns": info.reference_column_names(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(true);
    }

    println!("{} ({})", info.object_type(), info.class_name());
    if info.is_virtual() {
        println!("  original:     {}", info.original_object_type());
    }
    if let Some(parent) = info.parent_object_type() {
        println!("  parent:       {} via {}", parent, info.parent_id_column());
    }
    println!("  id column:    {}", info.id_column());
    println!("  scope:        {:?}", info.scope());
    println!("  order by:     {}", info.default_order_by());
    println!("  flags:        {:?}", info.flags());
    println!("  dependencies:");
    for dep in info.object_dependencies() {
        let target = dep.object_type().unwrap_or("<dynamic>");
        println!("    {} -> {} ({:?})", dep.column, target, dep.kind);
    }
    for (label, list) in [
        ("children", info.child_object_types()),
        ("bindings", info.binding_object_types()),
        ("other bindings", info.other_binding_object_types()),
        ("dependents", info.dependent_object_types()),
    ] {
        if !list.is_empty() {
            println!("  {}: {}", label, list.join(", "));
        }
    }
    Ok(true)
}

fn print_list(items: &[String], json: bool) -> anyhow::Result<bool> {
    if json {
        println!("{}", serde_json::to_string_pretty(items)?);
    } else {
        for item in items {
            println!("{}", item);
        }
    }
    Ok(true)
}
