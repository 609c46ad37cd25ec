//! zim-agent — standalone binary running the Agent Transfer Protocol
//! in portable (one session, then exit) or service (looping daemon)
//! mode. Split out from `cli` because it runs unattended on both the
//! source and destination machine, with its own small argument surface.

use clap::{Parser, Subcommand, ValueEnum};
use engine::agent::destination::DestinationConfig;
use engine::agent::source::SourceConfig;
use engine::agent::{self, AgentMode};
use engine::collaborators::ProcessRunner;
use engine::progress::{ProgressCallback, StatusCallback};
use engine::throttle::CancellationToken;
use engine::EngineError;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::Command as StdCommand;

#[derive(Parser, Debug)]
#[command(name = "zim-agent")]
#[command(version)]
#[command(about = "Agent Transfer Protocol runner")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one session (portable) or loop forever (service).
    Run {
        #[arg(long, value_enum, default_value = "portable")]
        mode: ModeArg,
        #[arg(long, value_enum)]
        role: RoleArg,
        /// Shared key both sides must agree on.
        #[arg(long)]
        key: String,
        /// TCP port the source listens on / destination connects to.
        #[arg(long, default_value_t = 58222)]
        port: u16,
        /// UDP port used for peer discovery.
        #[arg(long, default_value_t = 58223)]
        discovery_port: u16,
        /// Source: directory to send. Destination: directory to write into.
        #[arg(long)]
        dir: PathBuf,
        /// Destination only: explicit `host:port` to skip discovery.
        #[arg(long)]
        peer: Option<SocketAddr>,
    },
    /// Install this binary as an OS service via the platform service manager.
    ServiceInstall {
        #[arg(long)]
        binary_path: String,
        #[arg(long, default_value = "zim-agent")]
        service_name: String,
    },
    /// Uninstall a service previously registered by `service-install`.
    ServiceUninstall {
        #[arg(long, default_value = "zim-agent")]
        service_name: String,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ModeArg {
    Portable,
    Service,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum RoleArg {
    Source,
    Destination,
}

struct SystemProcessRunner;

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, program: &str, args: &[String], cancellation: &CancellationToken) -> Result<engine::collaborators::ProcessOutput, EngineError> {
        if cancellation.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let output = StdCommand::new(program)
            .args(args)
            .output()
            .map_err(|e| EngineError::Unknown { message: format!("failed to run {}: {}", program, e) })?;
        Ok(engine::collaborators::ProcessOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Logs every event through `tracing` rather than stdout — the agent
/// runs unattended, often under a service manager capturing its log.
struct AgentStatus;

impl ProgressCallback for AgentStatus {
    fn on_progress(&self, bytes_so_far: u64, bytes_total: u64) {
        tracing::debug!(bytes_so_far, bytes_total, "transfer progress");
    }
}

impl StatusCallback for AgentStatus {
    fn on_job_started(&self, job: &engine::model::MigrationJob) {
        tracing::info!(job_id = %job.id, "job started");
    }

    fn on_item_started(&self, item: &engine::model::MigrationItem) {
        tracing::info!(item = %item.display_name, "item started");
    }

    fn on_item_completed(&self, item: &engine::model::MigrationItem) {
        tracing::info!(item = %item.display_name, status = ?item.status, message = ?item.status_message, "item completed");
    }

    fn on_job_completed(&self, job: &engine::model::MigrationJob) {
        tracing::info!(job_id = %job.id, status = ?job.status, "job completed");
    }
}

fn hostname() -> String {
    gethostname::gethostname().to_string_lossy().into_owned()
}

fn run(args: Args) -> Result<(), String> {
    match args.command {
        Command::Run { mode, role, key, port, discovery_port, dir, peer } => {
            let agent_mode = match role {
                RoleArg::Source => AgentMode::Source(SourceConfig {
                    tcp_port: port,
                    discovery_port,
                    shared_key: key,
                    hostname: hostname(),
                    root_dir: dir,
                }),
                RoleArg::Destination => AgentMode::Destination(DestinationConfig {
                    peer_addr: peer,
                    discovery_port,
                    shared_key: key,
                    hostname: hostname(),
                    out_dir: dir,
                }),
            };

            let token = CancellationToken::new();
            let status = AgentStatus;

            match mode {
                ModeArg::Portable => agent::run_portable(&agent_mode, &token, &status, &status).map_err(|e| e.to_string()),
                ModeArg::Service => {
                    agent::run_service(&agent_mode, &token, &status, &status);
                    Ok(())
                }
            }
        }
        Command::ServiceInstall { binary_path, service_name } => {
            let process_runner = SystemProcessRunner;
            let token = CancellationToken::new();
            agent::install_service(&process_runner, &binary_path, &service_name, &token).map_err(|e| e.to_string())
        }
        Command::ServiceUninstall { service_name } => {
            let process_runner = SystemProcessRunner;
            let token = CancellationToken::new();
            agent::uninstall_service(&process_runner, &service_name, &token).map_err(|e| e.to_string())
        }
    }
}

fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let exit_code = match run(args) {
        Ok(()) => 0,
        Err(msg) => {
            tracing::error!("{}", msg);
            2
        }
    };
    std::process::exit(exit_code);
}
