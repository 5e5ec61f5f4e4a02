use config::{Config, ConfigError, File as ConfigFile};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub uploads_path: String,
    #[serde(default = "default_cache_path")]
    pub cache_path: String,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_use_ffmpeg")]
    pub use_ffmpeg: bool,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_video_extensions")]
    pub video_extensions: Vec<String>,
}

fn default_cache_path() -> String {
    "cache".to_string()
}

fn default_db_path() -> String {
    "coursevault.db".to_string()
}

fn default_use_ffmpeg() -> bool {
    true
}

fn default_probe_timeout_secs() -> u64 {
    30
}

fn default_video_extensions() -> Vec<String> {
    ["mp4", "mkv", "webm", "mov"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(config::Environment::with_prefix("COURSEVAULT"))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_keys() {
        let cfg: AppConfig = serde_json::from_str(r#"{"uploads_path": "/srv/uploads"}"#).unwrap();
        assert_eq!(cfg.uploads_path, "/srv/uploads");
        assert_eq!(cfg.db_path, "coursevault.db");
        assert!(cfg.use_ffmpeg);
        assert_eq!(cfg.probe_timeout_secs, 30);
        assert_eq!(cfg.video_extensions, vec!["mp4", "mkv", "webm", "mov"]);
    }
}
