//! `roomrelay relay [URL] --stream-key KEY` – detect, resolve and relay.

use anyhow::Result;
use roomrelay_core::config::RelayConfig;
use roomrelay_core::pipeline::{self, PipelineOutcome};
use roomrelay_core::relay::{RelayHandle, RelayTarget};

pub struct RelayOptions {
    pub url: String,
    pub stream_key: String,
    pub detach: bool,
}

pub async fn run_relay(cfg: &RelayConfig, opts: RelayOptions) -> Result<()> {
    let target = RelayTarget::new(cfg.relay_base_url.clone(), opts.stream_key);
    tracing::info!(variant = %cfg.variant, "relaying {} to {}", opts.url, target.destination());

    let outcome = pipeline::run_with_browser(cfg, &opts.url, &target, opts.detach).await?;
    match outcome {
        PipelineOutcome::Relaying { pair, relay } => {
            println!(
                "Room {} (aid {}) is being relayed to {}",
                pair.room_id,
                pair.app_id,
                relay.destination()
            );
            if opts.detach {
                println!("Transcoder detached; it keeps running after roomrelay exits.");
            } else {
                wait_for_relay(relay).await;
            }
        }
        PipelineOutcome::NoIdentifier { partial } => {
            println!("No room id detected after the timeout.");
            tracing::debug!(?partial, "partial identifiers at timeout");
        }
        PipelineOutcome::NavigationFailed(err) => {
            println!("Could not load the stream page: {err}");
        }
        PipelineOutcome::NotFound { pair } => {
            println!("No playback URL found for room {}.", pair.room_id);
        }
        PipelineOutcome::ResolveFailed { error, .. } => {
            println!("Error fetching room info: {error}");
        }
        PipelineOutcome::RelayFailed { error, .. } => {
            println!("Error during transcoder execution: {error}");
        }
    }

    println!("Finished detecting stream URLs.");
    Ok(())
}

/// Wait for the transcoder; the first Ctrl-C stops it.
async fn wait_for_relay(relay: RelayHandle) {
    let canceller = relay.canceller();
    let wait = relay.wait();
    tokio::pin!(wait);
    let mut listening = true;

    let result = loop {
        tokio::select! {
            result = &mut wait => break result,
            signal = tokio::signal::ctrl_c(), if listening => {
                listening = false;
                match signal {
                    Ok(()) => {
                        println!("Stopping transcoder...");
                        canceller.cancel();
                    }
                    Err(err) => tracing::warn!("cannot listen for Ctrl-C: {}", err),
                }
            }
        }
    };

    match result {
        Ok(exit) if exit.cancelled => println!("Transcoder stopped."),
        Ok(exit) if exit.success => println!("Stream has been forwarded."),
        Ok(exit) => match exit.code {
            Some(code) => println!("Transcoder exited with code {code}."),
            None => println!("Transcoder was killed by a signal."),
        },
        Err(err) => println!("Error during transcoder execution: {err}"),
    }
}
