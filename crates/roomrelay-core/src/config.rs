use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::detector::Variant;

/// Observation and navigation timing for the detector (`[detector]` in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    /// How long to keep watching traffic after the page has settled.
    pub observe_ms: u64,
    /// Upper bound on navigation plus the network-settled wait.
    pub page_load_timeout_ms: u64,
    /// The network counts as settled after this long with few requests in flight.
    pub idle_quiet_ms: u64,
    /// Maximum in-flight requests still considered settled.
    pub idle_max_inflight: usize,
    /// Substring marking the user-info request (request inspection).
    pub user_info_marker: String,
    /// Substring marking the liveness check response (response inspection).
    pub check_alive_marker: String,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            observe_ms: 30_000,
            page_load_timeout_ms: 120_000,
            idle_quiet_ms: 500,
            idle_max_inflight: 2,
            user_info_marker: "webcast/user".to_string(),
            check_alive_marker: "webcast/room/check_alive".to_string(),
        }
    }
}

/// Headless browser launch options (`[browser]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Explicit Chromium executable; when absent the usual install paths are searched.
    pub executable: Option<PathBuf>,
    pub headless: bool,
    /// Pass `--no-sandbox --disable-setuid-sandbox` (needed when running as root on a VPS).
    pub no_sandbox: bool,
    pub extra_args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            no_sandbox: true,
            extra_args: Vec::new(),
        }
    }
}

/// Room info lookup (`[lookup]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupSettings {
    /// Room info endpoint; `aid` and `room_id` are appended as query parameters.
    pub endpoint: String,
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
    /// Drop the query string from the playback URL. None = the variant's default.
    pub strip_query: Option<bool>,
    pub user_agent: Option<String>,
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://webcast.tiktok.com/webcast/room/info/".to_string(),
            connect_timeout_secs: 15,
            timeout_secs: 30,
            strip_query: None,
            user_agent: None,
        }
    }
}

/// Transcoder invocation (`[transcoder]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscoderSettings {
    pub program: String,
    pub audio_sample_rate: u32,
    pub video_codec: String,
    pub frame_rate: u32,
    pub video_bitrate: String,
    /// Output container, e.g. "flv" for RTMP(S) destinations.
    pub format: String,
    /// Inserted before `-i`, e.g. `["-re"]` or `["-loglevel", "warning"]`.
    pub extra_input_args: Vec<String>,
    /// Only the last N bytes of stdout/stderr are kept for the exit log.
    pub capture_limit_bytes: usize,
}

impl Default for TranscoderSettings {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            audio_sample_rate: 44_100,
            video_codec: "libx264".to_string(),
            frame_rate: 25,
            video_bitrate: "500k".to_string(),
            format: "flv".to_string(),
            extra_input_args: Vec::new(),
            capture_limit_bytes: 64 * 1024,
        }
    }
}

/// Global configuration loaded from `~/.config/roomrelay/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Ingest base URL; the stream key is appended verbatim.
    pub relay_base_url: String,
    /// Which traffic the detector keys off: "request" or "response".
    #[serde(default)]
    pub variant: Variant,
    #[serde(default)]
    pub detector: DetectorSettings,
    #[serde(default)]
    pub browser: BrowserSettings,
    #[serde(default)]
    pub lookup: LookupSettings,
    #[serde(default)]
    pub transcoder: TranscoderSettings,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            relay_base_url: "rtmps://live.tevi.com:443/live/".to_string(),
            variant: Variant::default(),
            detector: DetectorSettings::default(),
            browser: BrowserSettings::default(),
            lookup: LookupSettings::default(),
            transcoder: TranscoderSettings::default(),
        }
    }
}

impl RelayConfig {
    /// Whether the resolver strips the playback URL's query string.
    pub fn strip_query(&self) -> bool {
        self.lookup
            .strip_query
            .unwrap_or_else(|| self.variant.strips_query_by_default())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("roomrelay")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<RelayConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = RelayConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    load_from_path(&path)
}

/// Load configuration from an explicit file; missing sections take their defaults.
pub fn load_from_path(path: &Path) -> Result<RelayConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: RelayConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_config_values() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.relay_base_url, "rtmps://live.tevi.com:443/live/");
        assert_eq!(cfg.variant, Variant::Request);
        assert_eq!(cfg.detector.observe_ms, 30_000);
        assert_eq!(cfg.detector.page_load_timeout_ms, 120_000);
        assert_eq!(cfg.transcoder.audio_sample_rate, 44_100);
        assert_eq!(cfg.transcoder.frame_rate, 25);
        assert_eq!(cfg.transcoder.video_bitrate, "500k");
        assert!(cfg.browser.headless);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = RelayConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: RelayConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.relay_base_url, cfg.relay_base_url);
        assert_eq!(parsed.lookup.endpoint, cfg.lookup.endpoint);
        assert_eq!(parsed.detector.user_info_marker, "webcast/user");
    }

    #[test]
    fn config_toml_partial_sections_fill_defaults() {
        let toml = r#"
            relay_base_url = "rtmp://localhost/live/"
            variant = "response"

            [detector]
            observe_ms = 5000

            [transcoder]
            program = "/usr/local/bin/ffmpeg"
        "#;
        let cfg: RelayConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.variant, Variant::Response);
        assert_eq!(cfg.detector.observe_ms, 5000);
        assert_eq!(cfg.detector.page_load_timeout_ms, 120_000);
        assert_eq!(cfg.transcoder.program, "/usr/local/bin/ffmpeg");
        assert_eq!(cfg.transcoder.format, "flv");
        assert!(cfg.lookup.strip_query.is_none());
    }

    #[test]
    fn strip_query_follows_variant_unless_set() {
        let mut cfg = RelayConfig::default();
        assert!(!cfg.strip_query());
        cfg.variant = Variant::Response;
        assert!(cfg.strip_query());
        cfg.lookup.strip_query = Some(false);
        assert!(!cfg.strip_query());
    }

    #[test]
    fn load_from_path_reads_file() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"relay_base_url = \"rtmps://ingest.example.com/app/\"\n")
            .unwrap();
        f.flush().unwrap();
        let cfg = load_from_path(f.path()).unwrap();
        assert_eq!(cfg.relay_base_url, "rtmps://ingest.example.com/app/");
        assert_eq!(cfg.lookup.timeout_secs, 30);
    }

    #[test]
    fn load_from_path_rejects_bad_toml() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"relay_base_url = [").unwrap();
        f.flush().unwrap();
        assert!(load_from_path(f.path()).is_err());
    }
}
