//! Ateliê CLI - free-shipping rule tools.
//!
//! # Usage
//!
//! ```bash
//! # Show the rules stored in a provider config (or a bare rule map)
//! atelie rules decode melhor-envio.json
//!
//! # Build the expression for a rule
//! atelie rules encode --state SP --min-amount 200
//!
//! # Check which rules grant free shipping
//! atelie rules evaluate melhor-envio.json --region SP --total 250
//!
//! # List carriers that can be allowed
//! atelie carriers
//! ```
//!
//! # Commands
//!
//! - `rules decode` - Decode stored rules into editable form
//! - `rules encode` - Encode one rule into an expression
//! - `rules evaluate` - Evaluate stored rules for a destination
//! - `carriers` - Print the carrier catalog

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

mod commands;

#[derive(Parser)]
#[command(name = "atelie")]
#[command(author, version, about = "Ateliê CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Work with free-shipping rules
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },
    /// List the carrier catalog
    Carriers,
}

#[derive(Subcommand)]
enum RulesAction {
    /// Decode the rules of a provider config or bare rule map
    Decode {
        /// JSON file
        file: PathBuf,

        /// Print decoded rules as JSON
        #[arg(long)]
        json: bool,
    },
    /// Encode a rule into its stored expression
    Encode {
        /// Region code, `ALL` for every region
        #[arg(short, long, default_value = "ALL")]
        state: String,

        /// Minimum subtotal, empty for none
        #[arg(short, long, default_value = "")]
        min_amount: String,
    },
    /// Evaluate stored rules for a destination and subtotal
    Evaluate {
        /// JSON file
        file: PathBuf,

        /// Destination region code
        #[arg(short, long)]
        region: Option<String>,

        /// Cart subtotal
        #[arg(short, long)]
        total: Decimal,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atelie_cli=warn".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli, &mut std::io::stdout().lock()) {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli, out: &mut impl Write) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Rules { action } => match action {
            RulesAction::Decode { file, json } => commands::rules::decode(&file, json, out)?,
            RulesAction::Encode { state, min_amount } => {
                commands::rules::encode(&state, &min_amount, out)?;
            }
            RulesAction::Evaluate {
                file,
                region,
                total,
            } => commands::rules::evaluate(&file, region.as_deref(), total, out)?,
        },
        Commands::Carriers => commands::carriers::list(out)?,
    }
    Ok(())
}
