// crates/relaycli/src/main.rs

mod demo;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use relaycore::{ContextData, ExecutionEvent, SharedContext};
use relayruntime::{FlowRuntime, RuntimeConfig, Step, StragglerPolicy};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "Relay flow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the demo flow against a context file
    Run {
        /// Path to context JSON file
        #[arg(short, long)]
        context: PathBuf,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,

        /// What happens to the probes that lose the race
        #[arg(short, long, value_enum, default_value_t = Stragglers::Abort)]
        stragglers: Stragglers,
    },

    /// Validate a context file
    Validate {
        /// Path to context JSON file
        #[arg(short, long)]
        context: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create a new example context
    Init {
        /// Output file path
        #[arg(short, long, default_value = "context.json")]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Stragglers {
    Abort,
    Detach,
}

impl From<Stragglers> for StragglerPolicy {
    fn from(value: Stragglers) -> Self {
        match value {
            Stragglers::Abort => StragglerPolicy::Abort,
            Stragglers::Detach => StragglerPolicy::Detach,
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_context(file: &Path) -> Result<ContextData> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let data: ContextData = serde_json::from_str(&json)
        .with_context(|| format!("parsing {}", file.display()))?;
    Ok(data)
}

fn runtime(stragglers: StragglerPolicy) -> FlowRuntime {
    let runtime = FlowRuntime::with_config(RuntimeConfig {
        straggler_policy: stragglers,
        ..RuntimeConfig::default()
    });
    relaynodes::register_all(runtime.registry());
    runtime
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            context,
            verbose,
            stragglers,
        } => {
            init_logging(verbose);
            run_demo(context, stragglers.into()).await?;
        }

        Commands::Validate { context } => {
            validate_context(context)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_context(output)?;
        }
    }

    Ok(())
}

async fn run_demo(file: PathBuf, stragglers: StragglerPolicy) -> Result<()> {
    println!("🚀 Loading context from: {}", file.display());

    let data = load_context(&file)?;
    let runtime = runtime(stragglers);
    let flow = demo::build(&runtime);

    println!("📋 Flow: {}", flow.name());
    println!("   Steps: {}", flow.step_count());
    println!("   Transitions: {}", flow.transition_count());
    println!("   Stragglers: {:?}", stragglers);
    println!();

    // Subscribe before running so no event is missed
    let mut events = runtime.subscribe_events();

    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ExecutionEvent::RunStarted { flow, .. } => {
                    println!("▶️  Run of '{}' started", flow);
                }
                ExecutionEvent::StepStarted { step, .. } => {
                    println!("  ⚡ Starting step: {}", step);
                }
                ExecutionEvent::StepCompleted {
                    step,
                    action,
                    duration_ms,
                    ..
                } => match action {
                    Some(action) => {
                        println!("  ✅ {} completed in {}ms -> {}", step, duration_ms, action)
                    }
                    None => println!("  ✅ {} completed in {}ms", step, duration_ms),
                },
                ExecutionEvent::StepFailed { step, error, .. } => {
                    println!("  ❌ {} failed: {}", step, error);
                }
                ExecutionEvent::RetryScheduled {
                    step,
                    attempt,
                    wait_ms,
                    error,
                    ..
                } => {
                    println!(
                        "     ⚠️  [{}] attempt {} failed ({}), retrying in {}ms",
                        step, attempt, error, wait_ms
                    );
                }
                ExecutionEvent::RaceDecided { step, winner, .. } => {
                    println!("     🏁 [{}] won by {}", step, winner);
                }
                ExecutionEvent::RunCompleted {
                    success,
                    duration_ms,
                    ..
                } => {
                    if success {
                        println!("✨ Run completed successfully in {}ms", duration_ms);
                    } else {
                        println!("💥 Run failed after {}ms", duration_ms);
                    }
                }
            }
        }
    });

    let ctx = SharedContext::from(data);
    let result = runtime.run(&flow, &ctx).await;

    // Wait for events to finish printing
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    event_task.abort();

    let outcome = result?;

    println!();
    println!("📊 Run Summary:");
    match outcome {
        Some(action) => println!("   Final action: {}", action),
        None => println!("   Final action: (none)"),
    }
    println!();
    println!("📤 Context:");
    println!("{}", serde_json::to_string_pretty(&ctx.snapshot().await)?);

    Ok(())
}

fn validate_context(file: PathBuf) -> Result<()> {
    println!("🔍 Validating context: {}", file.display());

    let data = load_context(&file)?;

    println!("✅ Context parsed:");
    println!("   Config keys: {}", data.config.len());
    let mut components: Vec<_> = data.components.iter().collect();
    components.sort_by(|a, b| a.0.cmp(b.0));
    for (id, component) in components {
        println!(
            "   Component {}: {} config keys, {} fields",
            id,
            component.config.len(),
            component.fields.len()
        );
    }

    let problems = demo::check(&runtime(StragglerPolicy::default()), &data);
    if problems.is_empty() {
        println!("✅ Demo flow parameters are satisfied");
        return Ok(());
    }

    println!("❌ Demo flow cannot run:");
    for problem in &problems {
        println!("   {}", problem);
    }
    anyhow::bail!("{} missing parameter(s)", problems.len())
}

fn list_nodes() {
    println!("📦 Available Node Types:");
    println!();

    let mut catalog = relaynodes::catalog();
    catalog.sort_by(|a, b| a.category.cmp(&b.category).then(a.name.cmp(&b.name)));

    let mut current_category = String::new();
    for info in catalog {
        if info.category != current_category {
            println!("{}:", info.category);
            current_category = info.category.clone();
        }
        println!("  • {} - {}", info.name, info.description);
    }
}

fn create_example_context(output: PathBuf) -> Result<()> {
    let json = serde_json::to_string_pretty(&demo::example_context())?;
    std::fs::write(&output, json)?;

    println!("✅ Created example context: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  relay run --context {}", output.display());

    Ok(())
}
