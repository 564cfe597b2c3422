use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sweeper: SweeperConfig,
    #[serde(default)]
    pub holds: HoldConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SweeperConfig {
    #[serde(default = "default_sweep_interval")]
    pub interval_seconds: u64,
    #[serde(default = "default_retention_hours")]
    pub retention_hours: i64,
}

impl SweeperConfig {
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_seconds)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::hours(self.retention_hours)
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_sweep_interval(),
            retention_hours: default_retention_hours(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HoldConfig {
    #[serde(default = "default_ttl_minutes")]
    pub default_ttl_minutes: i64,
}

impl HoldConfig {
    pub fn default_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.default_ttl_minutes)
    }
}

impl Default for HoldConfig {
    fn default() -> Self {
        Self {
            default_ttl_minutes: default_ttl_minutes(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_retention_hours() -> i64 {
    24
}

fn default_ttl_minutes() -> i64 {
    15
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file (optional)
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in (optional)
            .add_source(config::File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of TRIPLOCK)
            // E.g. `TRIPLOCK__DATABASE__URL=...` would set `database.url`
            .add_source(config::Environment::with_prefix("TRIPLOCK").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_files_fall_back_to_defaults() {
        let raw = r#"
            [database]
            url = "postgres://localhost/triplock"
        "#;
        let built = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap();
        let cfg: Config = built.try_deserialize().unwrap();

        assert_eq!(cfg.database.max_connections, 5);
        assert_eq!(cfg.sweeper.interval(), std::time::Duration::from_secs(60));
        assert_eq!(cfg.sweeper.retention(), chrono::Duration::hours(24));
        assert_eq!(cfg.holds.default_ttl(), chrono::Duration::minutes(15));
    }
}
