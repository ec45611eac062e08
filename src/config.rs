//! Server configuration module
//!
//! Parses and manages the game server configuration from YAML files.
//! Missing optional fields fall back to the serde defaults below.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// Smallest accepted `max_packet_size`.
pub const MIN_PACKET_SIZE: usize = 1024;

/// Where players without a saved character appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartPoint {
    pub map: Uuid,
    pub x: i32,
    pub y: i32,
}

impl StartPoint {
    pub fn new(map: Uuid, x: i32, y: i32) -> Self {
        Self { map, x, y }
    }
}

/// Logic worker pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicConfig {
    /// Milliseconds between logic cycles
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    #[serde(default = "default_threads_min")]
    pub threads_min: usize,

    #[serde(default = "default_threads_max")]
    pub threads_max: usize,
}

impl Default for LogicConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            threads_min: default_threads_min(),
            threads_max: default_threads_max(),
        }
    }
}

impl LogicConfig {
    /// Host parallelism clamped into `[threads_min, threads_max]`.
    pub fn pool_size(&self) -> usize {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(self.threads_min);
        available.clamp(self.threads_min, self.threads_max.max(self.threads_min))
    }
}

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    // ============================================
    // Network
    // ============================================
    /// Address the game listener binds to
    pub game_ip: String,

    #[serde(default = "default_game_port")]
    pub game_port: u16,

    /// zlib level for outbound packets (0-9)
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,

    /// Upper bound for compressed and decompressed packet bytes
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,

    // ============================================
    // Game Settings
    // ============================================
    /// Starting position for new characters
    pub start_point: StartPoint,

    #[serde(default)]
    pub logic: LogicConfig,

    /// Idle map instances without players are unloaded after this long
    #[serde(default = "default_map_unload_ttl_ms")]
    pub map_unload_ttl_ms: i64,

    /// Trap lifetime when the spell names none
    #[serde(default = "default_trap_duration_ms")]
    pub trap_duration_ms: i64,

    #[serde(default = "default_item_despawn_ms")]
    pub item_despawn_ms: i64,

    /// Window in which only the owner may pick up a dropped item
    #[serde(default = "default_item_owner_only_ms")]
    pub item_owner_only_ms: i64,

    /// Save interval in seconds
    #[serde(default = "default_save_interval_secs")]
    pub save_interval_secs: u64,

    // ============================================
    // Directory Paths
    // ============================================
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_save_dir")]
    pub save_dir: String,
}

// ============================================
// Default value functions
// These are called by serde when a field is missing
// ============================================

fn default_game_port() -> u16 {
    4500
}

fn default_compression_level() -> u32 {
    6
}

fn default_max_packet_size() -> usize {
    65536
}

fn default_tick_ms() -> u64 {
    crate::core::DEFAULT_TICK_MS
}

fn default_threads_min() -> usize {
    2
}

fn default_threads_max() -> usize {
    8
}

fn default_map_unload_ttl_ms() -> i64 {
    30_000
}

fn default_trap_duration_ms() -> i64 {
    30_000
}

fn default_item_despawn_ms() -> i64 {
    15_000
}

fn default_item_owner_only_ms() -> i64 {
    5_000
}

fn default_save_interval_secs() -> u64 {
    60
}

fn default_data_dir() -> String {
    "./data/".to_string()
}

fn default_save_dir() -> String {
    "./save/".to_string()
}

impl ServerConfig {
    /// Load configuration from a YAML file
    ///
    /// # Example
    /// ```no_run
    /// use realm::config::ServerConfig;
    ///
    /// let config = ServerConfig::from_file("conf/server.yaml")
    ///     .expect("Failed to load config");
    /// println!("listening on {}:{}", config.game_ip, config.game_port);
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ServerConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML in {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from a YAML string
    ///
    /// Useful for testing
    pub fn from_str(contents: &str) -> Result<Self> {
        let config: ServerConfig = serde_yaml::from_str(contents)
            .context("Failed to parse YAML")?;

        config.validate()?;

        Ok(config)
    }

    /// Config for tests and tools: local address, defaults everywhere else.
    pub fn local(start_map: Uuid) -> Self {
        Self {
            game_ip: "127.0.0.1".to_string(),
            game_port: default_game_port(),
            compression_level: default_compression_level(),
            max_packet_size: default_max_packet_size(),
            start_point: StartPoint::new(start_map, 0, 0),
            logic: LogicConfig::default(),
            map_unload_ttl_ms: default_map_unload_ttl_ms(),
            trap_duration_ms: default_trap_duration_ms(),
            item_despawn_ms: default_item_despawn_ms(),
            item_owner_only_ms: default_item_owner_only_ms(),
            save_interval_secs: default_save_interval_secs(),
            data_dir: default_data_dir(),
            save_dir: default_save_dir(),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.game_ip.is_empty(), "game_ip cannot be empty");

        anyhow::ensure!(self.logic.tick_ms > 0, "logic.tick_ms must be positive");
        anyhow::ensure!(self.logic.threads_min > 0, "logic.threads_min must be at least 1");
        anyhow::ensure!(
            self.logic.threads_min <= self.logic.threads_max,
            "logic.threads_min ({}) exceeds logic.threads_max ({})",
            self.logic.threads_min,
            self.logic.threads_max
        );

        anyhow::ensure!(
            self.compression_level <= 9,
            "compression_level out of range: {} (max 9)",
            self.compression_level
        );
        anyhow::ensure!(
            self.max_packet_size >= MIN_PACKET_SIZE,
            "max_packet_size too small: {} (min {})",
            self.max_packet_size,
            MIN_PACKET_SIZE
        );

        Ok(())
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(&self)
            .context("Failed to serialize config to YAML")?;

        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write config to {}", path.as_ref().display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper to create a minimal valid config
    fn minimal_config() -> &'static str {
        r#"
game_ip: "127.0.0.1"

start_point:
  map: "67e55044-10b1-426f-9247-bb680e5fe0c8"
  x: 1
  y: 1
"#
    }

    fn start_map() -> Uuid {
        Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap()
    }

    #[test]
    fn test_minimal_config() {
        let config = ServerConfig::from_str(minimal_config()).unwrap();

        assert_eq!(config.game_ip, "127.0.0.1");
        assert_eq!(config.start_point, StartPoint::new(start_map(), 1, 1));
    }

    #[test]
    fn test_default_values() {
        let config = ServerConfig::from_str(minimal_config()).unwrap();

        assert_eq!(config.game_port, 4500);
        assert_eq!(config.compression_level, 6);
        assert_eq!(config.max_packet_size, 65536);
        assert_eq!(config.logic, LogicConfig { tick_ms: 10, threads_min: 2, threads_max: 8 });
        assert_eq!(config.map_unload_ttl_ms, 30_000);
        assert_eq!(config.trap_duration_ms, 30_000);
        assert_eq!(config.item_despawn_ms, 15_000);
        assert_eq!(config.item_owner_only_ms, 5_000);
        assert_eq!(config.save_interval_secs, 60);
        assert_eq!(config.data_dir, "./data/");
        assert_eq!(config.save_dir, "./save/");
    }

    #[test]
    fn test_partial_logic_section() {
        let mut config_str = String::from(minimal_config());
        config_str.push_str("logic:\n  threads_max: 4\n");

        let config = ServerConfig::from_str(&config_str).unwrap();
        assert_eq!(config.logic.tick_ms, crate::core::DEFAULT_TICK_MS);
        assert_eq!(config.logic.threads_min, 2);
        assert_eq!(config.logic.threads_max, 4);
    }

    #[test]
    fn test_pool_size_is_clamped() {
        let logic = LogicConfig { tick_ms: 10, threads_min: 3, threads_max: 3 };
        assert_eq!(logic.pool_size(), 3);

        let logic = LogicConfig { tick_ms: 10, threads_min: 1, threads_max: 1024 };
        let size = logic.pool_size();
        assert!((1..=1024).contains(&size));
    }

    #[test]
    fn test_missing_required_field() {
        let config_str = r#"
game_ip: "127.0.0.1"
# Missing start_point!
"#;

        let result = ServerConfig::from_str(config_str);
        assert!(result.is_err());

        let err_msg = format!("{:?}", result.unwrap_err());
        assert!(err_msg.contains("start_point") || err_msg.contains("missing field"));
    }

    #[test]
    fn test_invalid_yaml() {
        let config_str = r#"
game_ip: [this is not valid yaml
"#;

        assert!(ServerConfig::from_str(config_str).is_err());
    }

    #[test]
    fn test_wrong_type() {
        let mut config_str = String::from(minimal_config());
        config_str.push_str("game_port: \"not_a_number\"\n");

        assert!(ServerConfig::from_str(&config_str).is_err());
    }

    #[test]
    fn test_validation_empty_game_ip() {
        let config_str = minimal_config().replace("\"127.0.0.1\"", "\"\"");

        let result = ServerConfig::from_str(&config_str);
        let err_msg = format!("{}", result.unwrap_err());
        assert!(err_msg.contains("game_ip"));
    }

    #[test]
    fn test_validation_thread_bounds() {
        let mut config_str = String::from(minimal_config());
        config_str.push_str("logic:\n  threads_min: 9\n  threads_max: 4\n");

        let err_msg = format!("{}", ServerConfig::from_str(&config_str).unwrap_err());
        assert!(err_msg.contains("threads_min"));

        let mut config_str = String::from(minimal_config());
        config_str.push_str("logic:\n  threads_min: 0\n");
        assert!(ServerConfig::from_str(&config_str).is_err());
    }

    #[test]
    fn test_validation_packet_limits() {
        let mut config_str = String::from(minimal_config());
        config_str.push_str("compression_level: 12\n");
        let err_msg = format!("{}", ServerConfig::from_str(&config_str).unwrap_err());
        assert!(err_msg.contains("compression_level"));

        let mut config_str = String::from(minimal_config());
        config_str.push_str("max_packet_size: 512\n");
        let err_msg = format!("{}", ServerConfig::from_str(&config_str).unwrap_err());
        assert!(err_msg.contains("max_packet_size"));
    }

    #[test]
    fn test_local_config_is_valid() {
        let config = ServerConfig::local(start_map());
        config.validate().unwrap();
        assert_eq!(config.start_point.map, start_map());
    }

    #[test]
    fn test_save_and_load() {
        let config = ServerConfig::from_str(minimal_config()).unwrap();

        let temp_file = std::env::temp_dir().join(format!("realm_config_{}.yaml", Uuid::new_v4()));

        config.save(&temp_file).unwrap();
        let loaded = ServerConfig::from_file(&temp_file).unwrap();

        assert_eq!(config.game_ip, loaded.game_ip);
        assert_eq!(config.logic, loaded.logic);
        assert_eq!(config.start_point, loaded.start_point);

        std::fs::remove_file(temp_file).ok();
    }
}
