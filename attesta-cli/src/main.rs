//! Attesta CLI - verify WebAuthn registration and authentication responses.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

#[derive(Parser)]
#[command(name = "attesta")]
#[command(author, version, about = "WebAuthn ceremony verification", long_about = None)]
#[command(after_help = "Exit codes:
  0   success
  1   general error
  65  verification failed
  66  unreadable or malformed input
  74  cannot write output file
  77  signature counter regression (possible cloned authenticator)
  78  invalid configuration")]
struct Cli {
    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Relying party settings shared by both ceremonies.
#[derive(Args, Debug, Clone)]
pub struct RelyingParty {
    /// Relying party identifier (e.g. example.com)
    #[arg(long, value_name = "RP_ID")]
    rp_id: String,

    /// Expected origin; repeat to accept several
    #[arg(long = "origin", value_name = "ORIGIN", required = true)]
    origins: Vec<String>,

    /// Challenge issued for this ceremony, base64url
    #[arg(long, value_name = "B64URL")]
    challenge: String,

    /// Require the UV flag
    #[arg(long)]
    require_uv: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a registration response and print the new credential
    VerifyRegistration {
        /// Path to the registration response JSON
        #[arg(value_name = "RESPONSE")]
        response: PathBuf,

        #[command(flatten)]
        rp: RelyingParty,

        /// PEM file or anchor directory (overrides ATTESTA_TRUST_ANCHORS)
        #[arg(long, value_name = "PATH")]
        trust_anchors: Option<PathBuf>,

        /// Skip attestation statement and trust checks
        #[arg(long)]
        non_strict: bool,

        /// Algorithms offered in pubKeyCredParams (e.g. ES256); repeatable
        #[arg(long = "alg", value_name = "ALG")]
        algorithms: Vec<String>,

        /// Write the verified credential record to this file
        #[arg(long, value_name = "FILE")]
        save_credential: Option<PathBuf>,
    },

    /// Verify an authentication response against a stored credential
    VerifyAuthentication {
        /// Path to the authentication response JSON
        #[arg(value_name = "RESPONSE")]
        response: PathBuf,

        /// Credential record written by verify-registration
        #[arg(long, value_name = "FILE")]
        credential: PathBuf,

        #[command(flatten)]
        rp: RelyingParty,

        /// Persist the new signature counter into the credential file
        #[arg(long)]
        update: bool,
    },

    /// Decode a registration or authentication response without verifying it
    Inspect {
        /// Path to the response JSON
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("attesta=debug,attesta_core=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("attesta=info,attesta_core=warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::VerifyRegistration {
            response,
            rp,
            trust_anchors,
            non_strict,
            algorithms,
            save_credential,
        } => {
            commands::register::execute(commands::register::Options {
                response,
                rp,
                trust_anchors,
                non_strict,
                algorithms,
                save_credential,
                json: cli.json,
            })
            .await
        }
        Commands::VerifyAuthentication {
            response,
            credential,
            rp,
            update,
        } => commands::authenticate::execute(response, credential, rp, update, cli.json).await,
        Commands::Inspect { file } => commands::inspect::execute(file, cli.json).await,
    };

    let exit = match result {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };
    if let Some(message) = exit.message {
        eprintln!("Error: {message}");
    }
    std::process::exit(exit.code);
}
