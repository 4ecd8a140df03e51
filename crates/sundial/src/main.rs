//! Sundial: cron job runner with a status page
//!
//! Main binary with subcommands:
//! - `serve`: Run the demo jobs and serve the status page
//! - `check`: Validate schedule specs and preview their fire times

use std::sync::Arc;

use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use miette::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sundial_scheduler::interceptors::{logger, recover, request_id, worker_pool};
use sundial_scheduler::{Manager, MemoryStorage, SpecParser, StandardParser};

mod demo;

/// Parse boolean from environment variable, accepting common truthy values.
/// Accepts "1", "true", "yes", "on" (case-insensitive) as true.
/// Accepts "0", "false", "no", "off", "" (case-insensitive) as false.
fn parse_bool_env(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(format!(
            "invalid boolean value '{}', expected 1/true/yes/on or 0/false/no/off",
            s
        )),
    }
}

/// Parse an IANA timezone name such as `Asia/Jakarta`.
fn parse_timezone(s: &str) -> Result<Tz, String> {
    s.parse::<Tz>()
        .map_err(|e| format!("invalid timezone '{}': {}", s, e))
}

#[derive(Parser)]
#[command(name = "sundial")]
#[command(about = "Cron job runner with a status page", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register the demo jobs and serve the status page
    Serve {
        /// Address to listen on
        #[arg(long, env = "SUNDIAL_ADDRESS", default_value = "0.0.0.0:8080")]
        address: String,

        /// Timezone schedules are evaluated in
        #[arg(long, env = "SUNDIAL_TIMEZONE", value_parser = parse_timezone, default_value = "UTC")]
        timezone: Tz,

        /// List jobs with unparsable specs after the live ones.
        /// The env var accepts "1", "true", "yes", or "on".
        #[arg(long, env = "SUNDIAL_LOW_PRIORITY_DOWN_JOBS", value_parser = parse_bool_env, default_value = "false")]
        low_priority_down_jobs: bool,

        /// Maximum number of jobs running at once (0 uses the default pool)
        #[arg(long, env = "SUNDIAL_WORKER_POOL", default_value = "0")]
        worker_pool: usize,

        /// Identifier written to run history (defaults to the host name)
        #[arg(long, env = "SUNDIAL_MACHINE_ID")]
        machine_id: Option<String>,

        /// Number of run history records kept in memory
        #[arg(long, env = "SUNDIAL_HISTORY_CAPACITY", default_value = "10000")]
        history_capacity: usize,
    },

    /// Validate schedule specs and print their next fire times
    Check {
        /// Specs to check, e.g. "0 */5 * * * *" or "@every 90s"
        #[arg(value_name = "SPEC", required = true)]
        specs: Vec<String>,

        /// Timezone schedules are evaluated in
        #[arg(long, env = "SUNDIAL_TIMEZONE", value_parser = parse_timezone, default_value = "UTC")]
        timezone: Tz,

        /// Number of fire times to print per spec
        #[arg(long, default_value = "5")]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "sundial=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            address,
            timezone,
            low_priority_down_jobs,
            worker_pool,
            machine_id,
            history_capacity,
        } => {
            run_server(
                &address,
                timezone,
                low_priority_down_jobs,
                worker_pool,
                machine_id,
                history_capacity,
            )
            .await
        }

        Commands::Check {
            specs,
            timezone,
            count,
        } => check_specs(&specs, timezone, count),
    }
}

async fn run_server(
    address: &str,
    timezone: Tz,
    low_priority_down_jobs: bool,
    pool_size: usize,
    machine_id: Option<String>,
    history_capacity: usize,
) -> Result<()> {
    let mut builder = Manager::builder()
        .timezone(timezone)
        .storage(Arc::new(MemoryStorage::with_capacity(history_capacity)))
        .interceptors([request_id(), logger(), recover(), worker_pool(pool_size)]);
    if low_priority_down_jobs {
        builder = builder.low_priority_down_jobs();
    }
    if let Some(id) = machine_id {
        builder = builder.machine_id(id);
    }
    let manager = builder.build();

    demo::register(&manager).await;

    let router = sundial_web::create_router(manager.clone());

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|e| miette::miette!("{}", e))?;

    info!(timezone = %timezone, "status page listening on http://{}/jobs", address);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("received shutdown signal");
        })
        .await
        .map_err(|e| miette::miette!("{}", e))?;

    manager.stop();
    Ok(())
}

fn check_specs(specs: &[String], timezone: Tz, count: usize) -> Result<()> {
    let parser = StandardParser;
    let now = chrono::Utc::now().with_timezone(&timezone);
    let mut failed = 0;

    for spec in specs {
        let schedule = match parser.parse(spec) {
            Ok(s) => s,
            Err(e) => {
                println!("{:?}: {}", spec, e);
                failed += 1;
                continue;
            }
        };

        println!("{:?}:", spec);
        let mut at = now;
        for _ in 0..count {
            match schedule.next_after(&at) {
                Some(next) => {
                    println!("  {}", next.format("%Y-%m-%d %H:%M:%S %Z"));
                    at = next;
                }
                None => {
                    println!("  (no further fire times)");
                    break;
                }
            }
        }
    }

    if failed > 0 {
        return Err(miette::miette!("{} of {} specs failed to parse", failed, specs.len()));
    }
    Ok(())
}
