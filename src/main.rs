//! mcpany-core CLI: run the supervision server, print a doctor report, or
//! manage skill bundles.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mcpany_core::health::alerts::AlertDispatcher;
use mcpany_core::health::history::HealthHistory;
use mcpany_core::health::registry::SupervisorRegistry;
use mcpany_core::metrics::{self, PrometheusMetrics};
use mcpany_core::server::{self, ServerState};
use mcpany_core::skills::SkillManager;

const DEFAULT_SKILLS_ROOT: &str = "skills";

#[derive(Parser)]
#[command(name = "mcpany-core")]
#[command(about = "Supervision and telemetry core for an MCP gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the supervision HTTP surface (/healthz, /readyz, /doctor, /metrics)
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run the doctor self-check once and print the report
    Doctor,
    /// Manage skill bundles on disk
    Skills {
        #[command(subcommand)]
        action: SkillsAction,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum SkillsAction {
    /// List every skill under the skills root
    List {
        #[arg(long, default_value = DEFAULT_SKILLS_ROOT)]
        root: String,
    },
    /// Show one skill's frontmatter, body, and assets
    Show {
        name: String,
        #[arg(long, default_value = DEFAULT_SKILLS_ROOT)]
        root: String,
    },
    /// Create a new skill from a description
    Create {
        name: String,
        #[arg(long)]
        description: String,
        #[arg(long, default_value = DEFAULT_SKILLS_ROOT)]
        root: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) | None => cmd_version(),
        Some(Commands::Serve { host, port }) => cmd_serve(host, port).await?,
        Some(Commands::Doctor) => cmd_doctor().await,
        Some(Commands::Skills { action }) => cmd_skills(action)?,
    }

    Ok(())
}

fn cmd_version() {
    println!("mcpany-core {}", env!("CARGO_PKG_VERSION"));
    println!("Supervision and telemetry core for an MCP gateway");
}

async fn cmd_serve(host: String, port: Option<u16>) -> Result<()> {
    let port = port.unwrap_or_else(server::health_port);

    let metrics = metrics::initialize();
    let history = Arc::new(HealthHistory::with_default_cap());
    let alerts = Arc::new(AlertDispatcher::disabled());
    let registry = Arc::new(SupervisorRegistry::new(
        Arc::clone(&metrics),
        Arc::clone(&history),
        alerts,
    ));

    let state = Arc::new(ServerState {
        registry: Arc::clone(&registry),
        metrics: Arc::clone(&metrics),
    });

    let handle = server::start_server(&host, port, state)
        .await
        .with_context(|| format!("failed to bind {host}:{port}"))?;

    handle.await.context("server task panicked")?;
    Ok(())
}

async fn cmd_doctor() {
    let report = mcpany_core::doctor::run().await;
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("failed to render doctor report: {e}"),
    }
}

fn cmd_skills(action: SkillsAction) -> Result<()> {
    match action {
        SkillsAction::List { root } => {
            let manager = SkillManager::new(root);
            for name in manager.list()? {
                println!("{name}");
            }
        }
        SkillsAction::Show { name, root } => {
            let manager = SkillManager::new(root);
            let skill = manager.get(&name)?;
            println!("name: {}", skill.name);
            println!("description: {}", skill.description());
            println!("assets: {:?}", skill.assets);
            println!();
            println!("{}", skill.body);
        }
        SkillsAction::Create { name, description, root } => {
            let manager = SkillManager::new(root);
            let mut frontmatter = serde_yaml::Mapping::new();
            frontmatter.insert("name".into(), name.clone().into());
            frontmatter.insert("description".into(), description.into());
            manager.create(
                &name,
                frontmatter,
                &format!("# {name}\n\nDescribe how to use this skill.\n"),
            )?;
            println!("created skill '{name}'");
        }
    }
    Ok(())
}
