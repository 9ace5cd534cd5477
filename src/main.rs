use clap::{Parser, Subcommand};
use ideaforge::agents::HttpFleet;
use ideaforge::api::{create_router, AppState};
use ideaforge::config::{AppConfig, LoggingConfig};
use ideaforge::error::{ForgeError, Result};
use ideaforge::pipeline::coordinator::PipelineCoordinator;
use ideaforge::supervisor::{
    shutdown_signal, AgentRegistry, EnvSnapshot, Launcher, ShutdownCoordinator,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "ideaforge",
    about = "Agent fleet supervisor and pipeline coordinator",
    version
)]
struct Cli {
    /// Configuration directory
    #[arg(long, default_value = "config")]
    config_dir: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the agent fleet and serve the pipeline API
    Serve,
    /// List the agents the configuration resolves to
    Agents,
    /// Validate the configuration and exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.as_ref().unwrap_or(&Commands::Serve) {
        Commands::Serve => {
            let config = load_config(&cli.config_dir)?;
            init_logging(&config.logging);
            run_serve(config).await?;
        }
        Commands::Agents => {
            init_logging_simple();
            run_agents(&cli.config_dir)?;
        }
        Commands::Check => {
            init_logging_simple();
            run_check(&cli.config_dir)?;
        }
    }

    Ok(())
}

fn load_config(config_dir: &str) -> Result<AppConfig> {
    let config = AppConfig::load_from(config_dir)?;
    config
        .validate()
        .map_err(|errors| ForgeError::ConfigInvalid(errors.join("; ")))?;
    Ok(config)
}

async fn run_serve(config: AppConfig) -> Result<()> {
    let registry = Arc::new(AgentRegistry::from_config(&config.agents)?);
    info!("Registry resolved {} agent(s)", registry.len());

    // Snapshot the environment right before the batch; launches share it.
    let env = EnvSnapshot::capture(&config.agents);
    let launcher = Launcher::new(config.launcher.clone(), config.agents.host.clone());
    let handles = launcher.launch_all(&registry, env).await;

    let fleet = Arc::new(HttpFleet::from_registry(&registry, &config.agents.host));
    let coordinator = Arc::new(PipelineCoordinator::new(
        fleet,
        config.pipeline.clone(),
        config.feasibility.clone(),
    ));

    let state = AppState::new(coordinator, Arc::clone(&registry), handles.clone());
    let router = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API stopped, shutting down agent fleet");
    let shutdown = ShutdownCoordinator::new(Duration::from_secs(config.launcher.shutdown_grace_secs));
    let reports = shutdown.shutdown_all(&handles).await;
    for report in &reports {
        if report.outcome != ideaforge::StopOutcome::Graceful {
            warn!("Agent {} stopped: {}", report.agent, report.outcome);
        }
    }

    Ok(())
}

fn run_agents(config_dir: &str) -> Result<()> {
    let config = load_config(config_dir)?;
    let registry = AgentRegistry::from_config(&config.agents)?;

    if registry.is_empty() {
        println!("No agents resolved from configuration");
        return Ok(());
    }

    println!("{:<24} {:<8} LAUNCH", "NAME", "PORT");
    for descriptor in registry.descriptors() {
        println!(
            "{:<24} {:<8} {} {}",
            descriptor.name,
            descriptor.port,
            descriptor.launch.program,
            descriptor.launch.args.join(" ")
        );
    }
    Ok(())
}

fn run_check(config_dir: &str) -> Result<()> {
    match AppConfig::load_from(config_dir) {
        Ok(config) => match config.validate() {
            Ok(()) => {
                println!("Configuration OK");
                Ok(())
            }
            Err(errors) => {
                for e in &errors {
                    eprintln!("error: {e}");
                }
                Err(ForgeError::ConfigInvalid(errors.join("; ")))
            }
        },
        Err(e) => {
            eprintln!("error: {e}");
            Err(e.into())
        }
    }
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{0},ideaforge={0}", logging.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn init_logging_simple() {
    // Minimal logging for CLI commands
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}
