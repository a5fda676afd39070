//! stepwise CLI - natural-language browser tests
//!
//! Usage:
//!   stepwise init                 Write default config and demo scenarios
//!   stepwise run                  Run scenarios from .stepwise/scenarios.toml
//!   stepwise demo                 Run the built-in demo suite
//!   stepwise interpret <step>     Show the action a step maps to

mod scenarios;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use scenarios::{demo_suite, load_scenarios, write_demo_scenarios, SCENARIO_FILE};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stepwise_agent::{site_context, AgentClient, StepInterpreter};
use stepwise_browser::{BrowserConfig, BrowserLauncher};
use stepwise_core::{StepwiseConfig, TestCase};
use stepwise_runner::{ScenarioRunner, SuiteRunner};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "stepwise")]
#[command(author, version, about = "Run plain-English test steps in a browser")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Project root holding .stepwise/config.toml
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write default configuration and demo scenarios
    Init,

    /// Run scenarios from a file
    Run {
        /// Scenario file (defaults to .stepwise/scenarios.toml)
        #[arg(long, value_name = "FILE")]
        scenarios: Option<PathBuf>,

        /// Keep going when a smoke scenario fails
        #[arg(long)]
        no_smoke_gate: bool,

        /// Show the browser window
        #[arg(long)]
        headed: bool,
    },

    /// Run the built-in demo suite
    Demo {
        /// Show the browser window
        #[arg(long)]
        headed: bool,
    },

    /// Print the action a single step is interpreted as
    Interpret {
        /// The step, e.g. "Click on the 'Sign in' button"
        step: String,

        /// Site the step is meant for
        #[arg(long)]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Init => cmd_init(cli.root).await,
        Commands::Run {
            scenarios,
            no_smoke_gate,
            headed,
        } => cmd_run(cli.root, scenarios, !no_smoke_gate, headed).await,
        Commands::Demo { headed } => cmd_demo(cli.root, headed).await,
        Commands::Interpret { step, url } => cmd_interpret(cli.root, step, url).await,
    }
}

fn load_config(root: &Path) -> Result<StepwiseConfig> {
    StepwiseConfig::load_or_default(root).context("Failed to load stepwise configuration")
}

async fn cmd_init(root: PathBuf) -> Result<()> {
    info!("Initializing stepwise in {:?}", root);

    let config_path =
        StepwiseConfig::write_default(&root).context("Failed to write default configuration")?;
    let scenarios_path = write_demo_scenarios(&root)?;

    println!("Initialized stepwise in {:?}", root);
    println!("Created:");
    println!("  {}", config_path.display());
    println!("  {}", scenarios_path.display());
    println!("\nSet your API key before running:");
    println!("  export {}=...", StepwiseConfig::default().model.api_key_env);

    Ok(())
}

async fn cmd_run(
    root: PathBuf,
    scenarios: Option<PathBuf>,
    smoke_gate: bool,
    headed: bool,
) -> Result<()> {
    let config = load_config(&root)?;
    let path = scenarios.unwrap_or_else(|| root.join(SCENARIO_FILE));
    let cases = load_scenarios(&path)?;

    info!("Loaded {} scenarios from {}", cases.len(), path.display());
    run_suite(config, cases, smoke_gate, headed).await
}

async fn cmd_demo(root: PathBuf, headed: bool) -> Result<()> {
    let config = load_config(&root)?;
    run_suite(config, demo_suite(), true, headed).await
}

async fn cmd_interpret(root: PathBuf, step: String, url: Option<String>) -> Result<()> {
    let config = load_config(&root)?;
    let client = AgentClient::from_env(&config.model).context("Language model unavailable")?;
    let interpreter = StepInterpreter::new(Arc::new(client));

    let site = url.unwrap_or_else(|| config.sites.default_url.clone());
    let action = interpreter
        .interpret(&step, &site_context(&site))
        .await
        .with_context(|| format!("Could not interpret step: {}", step))?;

    println!("{}", serde_json::to_string_pretty(&action)?);
    Ok(())
}

async fn run_suite(
    mut config: StepwiseConfig,
    cases: Vec<TestCase>,
    smoke_gate: bool,
    headed: bool,
) -> Result<()> {
    if headed {
        config.browser.headless = false;
    }

    let client = AgentClient::from_env(&config.model).context("Language model unavailable")?;
    info!("Interpreting steps with {}", client.model());

    let interpreter = StepInterpreter::new(Arc::new(client));
    let launcher = Arc::new(BrowserLauncher::new(BrowserConfig::from(&config.browser)));
    let runner = ScenarioRunner::new(interpreter, launcher, &config);
    let suite = SuiteRunner::new(runner, config.sites.clone()).with_smoke_gate(smoke_gate);

    let report = suite.run(&cases).await;
    report.persist(&config.artifacts_dir).await;

    println!("\nResults ({} of {} passed):", report.passed_count(), cases.len());
    for line in report.summary_lines() {
        println!("  {}", line);
    }

    if !report.passed() {
        bail!(
            "{} of {} scenarios did not pass",
            cases.len() - report.passed_count(),
            cases.len()
        );
    }
    Ok(())
}
