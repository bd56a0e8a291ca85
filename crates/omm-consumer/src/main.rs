// crates/omm-consumer/src/main.rs

mod commands;
mod error;
mod network;
mod output;
mod types;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use omm_core::domain;

use crate::types::{ConsumerConfig, OutputFormat};

#[derive(Parser)]
#[clap(name = "omm-consumer")]
#[clap(about = "Command-line consumer for an OMM provider speaking framed RWF")]
struct Cli {
    /// Provider address (overrides the config file)
    #[clap(short, long)]
    server: Option<String>,

    /// TOML config file
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Output format for received messages
    #[clap(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Request one image and print it
    Snapshot {
        #[clap(short, long)]
        item: String,

        /// Service id (overrides the config file)
        #[clap(long)]
        service: Option<u16>,

        /// Domain type number
        #[clap(long, default_value_t = domain::MARKET_PRICE)]
        domain: u8,
    },

    /// Open streaming requests and print everything until Ctrl-C
    Stream {
        #[clap(short, long, required = true, num_args = 1..)]
        item: Vec<String>,

        #[clap(long)]
        service: Option<u16>,

        #[clap(long, default_value_t = domain::MARKET_PRICE)]
        domain: u8,

        /// Stop after this many messages
        #[clap(long)]
        count: Option<usize>,
    },

    /// Post FIELD=VALUE pairs to an item and print the ack
    Post {
        #[clap(short, long)]
        item: String,

        #[clap(long)]
        service: Option<u16>,

        /// Field assignments, by acronym or field id
        #[clap(required = true)]
        fields: Vec<String>,
    },

    /// Decode a file of length-prefixed RWF messages
    Decode { file: PathBuf },

    /// Compare two dictionaries (exit code 1 when they differ)
    DictCompare {
        a_field: PathBuf,
        a_enum: PathBuf,
        b_field: PathBuf,
        b_enum: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => ConsumerConfig::load(path)?,
        None => ConsumerConfig::default(),
    };
    if let Some(server) = cli.server {
        config.server_addr = server;
    }
    let format = cli.format;

    match cli.command {
        Command::Snapshot {
            item,
            service,
            domain,
        } => {
            if let Some(id) = service {
                config.service_id = id;
            }
            commands::snapshot(&config, &item, domain, format).await
        }
        Command::Stream {
            item,
            service,
            domain,
            count,
        } => {
            if let Some(id) = service {
                config.service_id = id;
            }
            commands::stream(&config, &item, domain, count, format).await
        }
        Command::Post {
            item,
            service,
            fields,
        } => {
            if let Some(id) = service {
                config.service_id = id;
            }
            commands::post(&config, &item, &fields, format).await
        }
        Command::Decode { file } => commands::decode_file(&config, &file, format),
        Command::DictCompare {
            a_field,
            a_enum,
            b_field,
            b_enum,
        } => commands::dict_compare(&a_field, &a_enum, &b_field, &b_enum, format),
    }
}
