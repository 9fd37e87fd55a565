//! CLI for roomrelay.

mod commands;
mod prompt;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use roomrelay_core::config::{self, RelayConfig};
use roomrelay_core::detector::Variant;
use std::path::PathBuf;

use commands::{run_config, run_detect, run_relay, run_resolve, RelayOptions};

/// Top-level CLI for roomrelay.
#[derive(Debug, Parser)]
#[command(name = "roomrelay")]
#[command(about = "roomrelay: find a live room's stream and relay it to an ingest server", long_about = None)]
pub struct Cli {
    /// Config file to use instead of ~/.config/roomrelay/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

/// Detector overrides shared by `relay` and `detect`.
#[derive(Debug, Clone, Default, Args)]
pub struct DetectArgs {
    /// Traffic to key off: "request" (user-info URLs) or "response" (liveness bodies).
    #[arg(long)]
    pub variant: Option<Variant>,

    /// Observation window after the page settles, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub observe_ms: Option<u64>,
}

impl DetectArgs {
    fn apply(&self, cfg: &mut RelayConfig) {
        if let Some(variant) = self.variant {
            cfg.variant = variant;
        }
        if let Some(ms) = self.observe_ms {
            cfg.detector.observe_ms = ms;
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Detect the room, resolve its playback URL and relay it to the ingest server.
    Relay {
        /// Live stream page URL (prompted for if omitted).
        url: Option<String>,

        /// Ingest stream key (prompted for if omitted).
        #[arg(long)]
        stream_key: Option<String>,

        /// Ingest base URL; overrides `relay_base_url` from config.
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,

        #[command(flatten)]
        detect: DetectArgs,

        /// Return once the transcoder has started instead of waiting for it.
        #[arg(long)]
        detach: bool,
    },

    /// Only detect the room id and aid for a live stream page.
    Detect {
        /// Live stream page URL (prompted for if omitted).
        url: Option<String>,

        #[command(flatten)]
        detect: DetectArgs,
    },

    /// Only resolve a playback URL from a known aid and room id.
    Resolve {
        #[arg(long)]
        aid: String,

        #[arg(long)]
        room_id: String,

        /// Drop the playback URL's query string (default follows the configured variant).
        #[arg(long)]
        strip_query: bool,
    },

    /// Show the config file location and the effective configuration.
    Config,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let mut cfg = match &cli.config {
            Some(path) => config::load_from_path(path)?,
            None => config::load_or_init()?,
        };
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Relay {
                url,
                stream_key,
                base_url,
                detect,
                detach,
            } => {
                detect.apply(&mut cfg);
                if let Some(base) = base_url {
                    cfg.relay_base_url = base;
                }
                let url = prompt::value_or_ask(url, "Input stream URL: ")?;
                let stream_key = prompt::value_or_ask(stream_key, "Input stream key: ")?;
                run_relay(
                    &cfg,
                    RelayOptions {
                        url,
                        stream_key,
                        detach,
                    },
                )
                .await?;
            }
            CliCommand::Detect { url, detect } => {
                detect.apply(&mut cfg);
                let url = prompt::value_or_ask(url, "Input stream URL: ")?;
                run_detect(&cfg, &url).await?;
            }
            CliCommand::Resolve {
                aid,
                room_id,
                strip_query,
            } => {
                if strip_query {
                    cfg.lookup.strip_query = Some(true);
                }
                run_resolve(&cfg, &aid, &room_id).await?;
            }
            CliCommand::Config => run_config(&cfg, cli.config.as_deref())?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
