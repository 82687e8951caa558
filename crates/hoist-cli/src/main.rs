//! Hoist - incremental PaaS deployment
//!
//! Usage:
//!   hoist push my-app ./dist     # Deploy a directory
//!   hoist status my-app          # Show run state
//!   hoist apps                   # List applications

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hoist_core::archive::LeafPolicy;
use hoist_core::cancel::CancellationToken;
use hoist_core::config::HoistConfig;
use hoist_core::context::AppContext;
use hoist_core::deploy::{DeployOutcome, DeployReport};
use hoist_core::remote::StartKind;
use hoist_core::resource::{FsTreeProvider, ResourceProvider};
use hoist_core::types::{AppName, DeployMode, DeployPayload, DeploymentDescriptor};

#[derive(Parser)]
#[command(name = "hoist")]
#[command(about = "Incremental PaaS deployment", long_about = None)]
struct Cli {
    /// Path to an explicit hoist.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a directory (or a ready-made archive) to the controller
    Push {
        /// Application name
        name: String,

        /// Directory to deploy
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Upload this archive file as-is instead of building one
        #[arg(long)]
        archive: Option<PathBuf>,

        /// Memory in MB (config default when omitted)
        #[arg(long)]
        memory: Option<u32>,

        /// Route to map (repeatable)
        #[arg(long = "route")]
        routes: Vec<String>,

        /// Service binding (repeatable)
        #[arg(long = "service")]
        services: Vec<String>,

        /// Custom start command
        #[arg(long)]
        start_command: Option<String>,

        /// Upload only; do not restart the app
        #[arg(long, conflicts_with = "debug")]
        no_start: bool,

        /// Start in debug mode
        #[arg(long)]
        debug: bool,

        /// Rehash every file instead of trusting the fingerprint cache
        #[arg(long)]
        rehash: bool,
    },

    /// Start an application
    Start {
        name: String,

        /// Start in debug mode
        #[arg(long)]
        debug: bool,
    },

    /// Stop an application
    Stop { name: String },

    /// Stop, start, and wait for the app to report running
    Restart {
        name: String,

        /// Start in debug mode
        #[arg(long)]
        debug: bool,
    },

    /// Show one application's run state
    Status { name: String },

    /// List applications on the controller
    Apps,

    /// Delete an application
    Delete { name: String },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hoist=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let cwd = std::env::current_dir().context("Failed to resolve working directory")?;
    let config = match &cli.config {
        Some(path) => HoistConfig::load_from(path)?,
        None => HoistConfig::load(&cwd)?.context(
            "No hoist.toml found; create one in the project root or pass --config",
        )?,
    };

    let password = std::env::var("HOIST_PASSWORD").unwrap_or_default();
    let ctx = AppContext::connect(&config, password)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            eprintln!("interrupt received; aborting at the next checkpoint");
            cancel.cancel();
        })
        .context("Failed to install interrupt handler")?;
    }

    match cli.command {
        Commands::Push {
            name,
            path,
            archive,
            memory,
            routes,
            services,
            start_command,
            no_start,
            debug,
            rehash,
        } => {
            let payload = match archive {
                Some(file) => DeployPayload::ArchiveFile(file),
                None => {
                    let provider = FsTreeProvider::new(path);
                    DeployPayload::Tree(provider.enumerate()?)
                }
            };
            let mode = if no_start {
                DeployMode::PushOnly
            } else if debug {
                DeployMode::Debug
            } else {
                DeployMode::Start
            };
            let descriptor = DeploymentDescriptor {
                app: AppName::new(name),
                memory_mb: memory.unwrap_or(config.defaults.memory_mb),
                routes,
                services,
                start_command,
                mode,
                payload,
            };
            let policy = if rehash {
                LeafPolicy::RecalculateAll
            } else {
                LeafPolicy::Reuse
            };

            let report = ctx.orchestrator().deploy(&descriptor, &policy, &cancel)?;
            print_report(&report);
        }

        Commands::Start { name, debug } => {
            let app = AppName::new(name);
            ctx.start_app(&app, start_kind(debug), &cancel)?;
            println!("{app}: start requested");
        }

        Commands::Stop { name } => {
            let app = AppName::new(name);
            ctx.stop_app(&app, &cancel)?;
            println!("{app}: stopped");
        }

        Commands::Restart { name, debug } => {
            let app = AppName::new(name);
            let outcome = ctx
                .orchestrator()
                .restart(&app, start_kind(debug), &cancel)?;
            match outcome {
                DeployOutcome::Started => println!("{app}: running"),
                DeployOutcome::StartUnconfirmed => {
                    println!("{app}: start requested, not yet confirmed running")
                }
                DeployOutcome::Pushed => {}
            }
        }

        Commands::Status { name } => {
            let app = AppName::new(name);
            let state = ctx.app_state(&app, &cancel)?;
            println!("{app}: {state:?}");
        }

        Commands::Apps => {
            let apps = ctx.list_apps(&cancel)?;
            if apps.is_empty() {
                println!("no applications");
            }
            for app in apps {
                println!("{}\t{:?}\t{} MB", app.name, app.state, app.memory_mb);
            }
        }

        Commands::Delete { name } => {
            let app = AppName::new(name);
            ctx.delete_app(&app, &cancel)?;
            println!("{app}: deleted");
        }
    }

    Ok(())
}

fn start_kind(debug: bool) -> StartKind {
    if debug {
        StartKind::Debug
    } else {
        StartKind::Normal
    }
}

fn print_report(report: &DeployReport) {
    if report.created {
        println!("{}: created", report.app);
    }
    println!(
        "{}: uploaded {} file(s), reused {} cached fingerprint(s)",
        report.app, report.uploaded_files, report.reused_files
    );
    for warning in &report.warnings {
        println!("warning: {warning}");
    }
    match report.outcome {
        DeployOutcome::Started => println!("{}: running", report.app),
        DeployOutcome::StartUnconfirmed => println!(
            "{}: pushed and start requested, not yet confirmed running",
            report.app
        ),
        DeployOutcome::Pushed => println!("{}: pushed (start skipped)", report.app),
    }
}
