//! `roomrelay detect [URL]` – find room id and aid, nothing else.

use anyhow::Result;
use roomrelay_core::config::RelayConfig;
use roomrelay_core::detector::{self, DetectionOutcome};

pub async fn run_detect(cfg: &RelayConfig, url: &str) -> Result<()> {
    let outcome = detector::detect_with_browser(&cfg.browser, &cfg.detector, cfg.variant, url).await?;
    match outcome {
        DetectionOutcome::Detected(pair) => {
            println!("room_id: {}", pair.room_id);
            println!("aid:     {}", pair.app_id);
        }
        DetectionOutcome::TimedOut { partial } => {
            println!("No room id detected after the timeout.");
            if !partial.app_id.is_empty() || !partial.room_id.is_empty() {
                println!(
                    "  (partial: room_id={:?} aid={:?})",
                    partial.room_id, partial.app_id
                );
            }
        }
        DetectionOutcome::NavigationFailed(err) => {
            println!("Could not load the stream page: {err}");
        }
    }
    Ok(())
}
