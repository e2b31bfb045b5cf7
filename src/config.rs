//! Configuration management
//!
//! Compiled-in defaults with environment overrides (`PMLMS_LMS__HOST`,
//! `PMLMS_LMS__PLAYER_NAME`, ...). No config files: the bridge keeps no
//! state on disk.

use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub lms: LmsConfig,
}

#[derive(Debug, Deserialize)]
pub struct LmsConfig {
    #[serde(default = "default_lms_host")]
    pub host: String,

    #[serde(default = "default_lms_port")]
    pub port: u16,

    pub username: Option<String>,
    pub password: Option<String>,

    /// Player to control at startup; long-pressing the knob hands control to
    /// the next player in the server's listing.
    #[serde(default = "default_player_name")]
    pub player_name: String,
}

impl Default for LmsConfig {
    fn default() -> Self {
        Self {
            host: default_lms_host(),
            port: default_lms_port(),
            username: None,
            password: None,
            player_name: default_player_name(),
        }
    }
}

fn default_lms_host() -> String {
    "lms".to_string()
}

fn default_lms_port() -> u16 {
    9000
}

fn default_player_name() -> String {
    "woonkamer".to_string()
}

pub fn load_config() -> Result<Config> {
    let config = ::config::Config::builder()
        // Environment overrides (PMLMS_LMS__HOST, PMLMS_LMS__PORT, etc.)
        .add_source(
            ::config::Environment::with_prefix("PMLMS")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(config.try_deserialize()?)
}
