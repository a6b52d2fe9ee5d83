//! transit-cli — operability tooling (§6): a `probe` command that exercises
//! a running `transit-runtime` process directly over its Unix socket without
//! going through the broker, and a `config-check` command that validates the
//! environment a process would start with.

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tokio::net::UnixStream;
use transit_codec::{read_frame, write_frame};
use transit_core::{RuntimeConfig, SidecarConfig, TerminalConfig};

#[derive(Parser)]
#[command(name = "transit-cli", about = "Operability tooling for the pipeline runtime")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send one synthetic request straight to a runtime's Unix socket and
    /// print its response, bypassing the broker and sidecar entirely.
    Probe {
        /// Path to the runtime's listening socket.
        #[arg(long, env = "SOCKET_PATH", default_value = "/tmp/sockets/app.sock")]
        socket: String,
        /// Route step name to stamp on the synthetic request.
        #[arg(long, default_value = "probe")]
        step: String,
        /// JSON payload body to send (defaults to an empty object).
        #[arg(long, default_value = "{}")]
        payload: String,
        /// How long to wait for a response before giving up.
        #[arg(long, default_value_t = 5)]
        timeout_secs: u64,
        #[arg(long, default_value_t = 65536)]
        chunk_size: usize,
    },
    /// Load and validate the named process role's configuration from the
    /// environment, printing a redacted summary on success.
    ConfigCheck {
        #[arg(long, value_enum)]
        role: Role,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Role {
    Runtime,
    Sidecar,
    Terminal,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter("info").init();
    transit_core::config::load_dotenv();

    let cli = Cli::parse();
    match cli.command {
        Command::Probe { socket, step, payload, timeout_secs, chunk_size } => {
            probe(&socket, &step, &payload, Duration::from_secs(timeout_secs), chunk_size).await
        }
        Command::ConfigCheck { role } => config_check(role),
    }
}

async fn probe(
    socket: &str,
    step: &str,
    payload: &str,
    timeout: Duration,
    chunk_size: usize,
) -> ExitCode {
    let payload: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("transit-cli: --payload is not valid JSON: {e}");
            return ExitCode::FAILURE;
        }
    };

    let request = serde_json::json!({
        "payload": payload,
        "route": { "steps": [step], "current": 0 },
        "job_id": "probe",
    });
    let body = serde_json::to_vec(&request).expect("probe request always serializes");

    let result = tokio::time::timeout(timeout, async {
        let mut stream = UnixStream::connect(socket).await?;
        write_frame(&mut stream, &body).await?;
        read_frame(&mut stream, chunk_size).await
    })
    .await;

    match result {
        Ok(Ok(response_body)) => {
            match serde_json::from_slice::<Value>(&response_body) {
                Ok(v) => {
                    println!("{}", serde_json::to_string_pretty(&v).unwrap());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("transit-cli: response was not valid JSON: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Ok(Err(e)) => {
            eprintln!("transit-cli: probe failed: {e}");
            ExitCode::FAILURE
        }
        Err(_) => {
            eprintln!("transit-cli: probe timed out after {timeout:?}");
            ExitCode::FAILURE
        }
    }
}

fn config_check(role: Role) -> ExitCode {
    match role {
        Role::Runtime => match RuntimeConfig::from_env() {
            Ok(c) => print_ok(c.redacted_summary()),
            Err(e) => print_err(e),
        },
        Role::Sidecar => match SidecarConfig::from_env() {
            Ok(c) => print_ok(c.redacted_summary()),
            Err(e) => print_err(e),
        },
        Role::Terminal => print_ok(TerminalConfig::from_env().redacted_summary()),
    }
}

fn print_ok(summary: Value) -> ExitCode {
    println!("{}", serde_json::to_string_pretty(&summary).unwrap());
    ExitCode::SUCCESS
}

fn print_err(e: transit_core::ConfigError) -> ExitCode {
    eprintln!("transit-cli: invalid configuration: {e}");
    ExitCode::FAILURE
}
