use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use crate::session::SessionConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
    /// Forms untouched for this long are closed
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    /// WAV file replayed as the capture device; no capture device when unset
    #[serde(default)]
    pub capture_source: Option<String>,
    /// Size of each capture chunk in bytes
    #[serde(default = "default_chunk_bytes")]
    pub chunk_bytes: usize,
    /// Elapsed-time tick period while recording
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// Directory uploaded recordings and images are written to
    pub recordings_path: String,
    /// URL prefix under which stored files are published
    pub public_base_url: String,
}

fn default_chunk_bytes() -> usize {
    16 * 1024
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_session_ttl_secs() -> u64 {
    30 * 60
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("VILLAGE_VOICE").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            tick_interval: Duration::from_millis(self.audio.tick_interval_ms.max(1)),
            ..SessionConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_applies_audio_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("village-voice.toml");
        std::fs::write(
            &path,
            r#"
[service]
name = "village-voice"

[service.http]
bind = "127.0.0.1"
port = 8080

[audio]

[storage]
recordings_path = "data/uploads"
public_base_url = "http://localhost:8080/files"
"#,
        )?;

        let cfg = Config::load(path.with_extension("").to_str().unwrap())?;

        assert_eq!(cfg.service.http.port, 8080);
        assert_eq!(cfg.service.http.session_ttl_secs, 1800);
        assert!(cfg.audio.capture_source.is_none());
        assert_eq!(cfg.audio.chunk_bytes, 16 * 1024);
        assert_eq!(cfg.session_config().tick_interval, Duration::from_secs(1));
        assert_eq!(cfg.storage.recordings_path, "data/uploads");
        Ok(())
    }
}
