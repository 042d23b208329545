use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Database {
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Fetch templates from `base_url`
    Http,
    /// Use the built-in template pages
    Static,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SampleSource {
    pub mode: SourceMode,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl SampleSource {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Seeding {
    pub max_attempts: i64,
    pub poll_interval_ms: u64,
    pub job_timeout_secs: u64,
    /// 0 disables the scheduler
    pub schedule_interval_secs: u64,
    pub scheduled_count: i64,
}

impl Seeding {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    pub fn schedule_interval(&self) -> Option<Duration> {
        (self.schedule_interval_secs > 0).then(|| Duration::from_secs(self.schedule_interval_secs))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub database: Database,
    pub sample_source: SampleSource,
    pub seeding: Seeding,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.path", "echo.db")?
            .set_default("sample_source.mode", "http")?
            .set_default("sample_source.base_url", "https://jsonplaceholder.typicode.com")?
            .set_default("sample_source.timeout_secs", 10)?
            .set_default("seeding.max_attempts", 3)?
            .set_default("seeding.poll_interval_ms", 2000)?
            .set_default("seeding.job_timeout_secs", 600)?
            .set_default("seeding.schedule_interval_secs", 0)?
            .set_default("seeding.scheduled_count", 500)?;

        // settings.toml is optional; the echo-server/ copy is for running from the workspace root
        let config_file_name = "settings.toml";
        for path in [
            PathBuf::from(config_file_name),
            PathBuf::from("echo-server").join(config_file_name),
        ] {
            if path.exists() {
                builder = builder.add_source(File::from(path).required(false));
            }
        }

        // Environment variables win over everything else
        for (var, key) in [
            ("DATABASE_PATH", "database.path"),
            ("PORT", "server.port"),
            ("HOST", "server.host"),
            ("SAMPLE_SOURCE_BASE_URL", "sample_source.base_url"),
            ("SAMPLE_SOURCE_MODE", "sample_source.mode"),
            ("SEED_SCHEDULE_SECS", "seeding.schedule_interval_secs"),
        ] {
            if let Ok(value) = std::env::var(var) {
                builder = builder.set_override(key, value)?;
            }
        }

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeding_durations() {
        let seeding = Seeding {
            max_attempts: 3,
            poll_interval_ms: 250,
            job_timeout_secs: 30,
            schedule_interval_secs: 0,
            scheduled_count: 500,
        };
        assert_eq!(seeding.poll_interval(), Duration::from_millis(250));
        assert_eq!(seeding.job_timeout(), Duration::from_secs(30));
        assert_eq!(seeding.schedule_interval(), None);

        let scheduled = Seeding {
            schedule_interval_secs: 5,
            ..seeding
        };
        assert_eq!(scheduled.schedule_interval(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_source_mode_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: SourceMode,
        }
        let parsed: Wrapper = serde_json::from_str(r#"{"mode":"static"}"#).expect("Bad mode");
        assert_eq!(parsed.mode, SourceMode::Static);
    }
}
