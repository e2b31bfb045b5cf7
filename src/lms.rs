//! LMS (Logitech Media Server) JSON-RPC client.
//!
//! Implements the JSON-RPC protocol over HTTP: POST to `/jsonrpc.js` with a
//! `slim.request` envelope. Documentation: http://HOST:9000/html/docs/cli-api.html

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::config::LmsConfig;
use crate::directory::{DirectoryError, Player, PlayerDirectory};

/// Request ID for LMS JSON-RPC calls (aids debugging in LMS logs)
const LMS_REQUEST_ID: i32 = 217;
/// Upper bound on players returned by a single `players` query.
const MAX_PLAYERS: u32 = 100;
/// HTTP timeout; a stalled request only delays the next gesture, it never
/// takes the dispatch loop down.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON-RPC client for one LMS instance.
pub struct LmsDirectory {
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    client: Client,
}

impl LmsDirectory {
    pub fn new(config: &LmsConfig) -> Self {
        #[allow(clippy::expect_used)] // HTTP client creation only fails if TLS setup fails
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            base_url: format!("http://{}:{}", config.host, config.port),
            username: config.username.clone(),
            password: config.password.clone(),
            client,
        }
    }

    async fn execute(&self, player_id: Option<&str>, params: Vec<Value>) -> anyhow::Result<Value> {
        let url = format!("{}/jsonrpc.js", self.base_url);

        let body = json!({
            "id": LMS_REQUEST_ID,
            "method": "slim.request",
            "params": [player_id.unwrap_or(""), params]
        });

        debug!(
            player_id = player_id.unwrap_or("<server>"),
            params = ?body["params"][1],
            "LMS request"
        );

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);

        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            request = request.basic_auth(username, Some(password));
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("LMS request failed: {}", response.status()));
        }

        let data: Value = response.json().await?;

        debug!(
            player_id = player_id.unwrap_or("<server>"),
            result = ?data.get("result"),
            "LMS response"
        );

        if let Some(error) = data.get("error") {
            if !error.is_null() {
                return Err(anyhow!("LMS error: {}", error));
            }
        }

        Ok(data.get("result").cloned().unwrap_or(Value::Null))
    }

    fn unresponsive(player: &Player, source: anyhow::Error) -> DirectoryError {
        DirectoryError::PlayerUnresponsive {
            player: player.name.clone(),
            source,
        }
    }
}

/// Parse the `players_loop` array of a `players` query into the ordered
/// player list. Entries without a playerid are skipped.
fn parse_players(result: &Value) -> Vec<Player> {
    result
        .get("players_loop")
        .and_then(|v| v.as_array())
        .map(|players| {
            players
                .iter()
                .filter_map(|p| {
                    let id = p.get("playerid").and_then(|v| v.as_str())?;
                    let name = p.get("name").and_then(|v| v.as_str()).unwrap_or(id);
                    Some(Player {
                        id: id.to_string(),
                        name: name.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Parse the `_volume` field of a `mixer volume ?` query. LMS reports the
/// value as a number or a string, and negates it while the player is muted.
fn parse_volume(result: &Value) -> anyhow::Result<i32> {
    let raw = result
        .get("_volume")
        .ok_or_else(|| anyhow!("no _volume in mixer response"))?;

    raw.as_i64()
        .map(|n| n as i32)
        .or_else(|| raw.as_str().and_then(|s| s.parse().ok()))
        .ok_or_else(|| anyhow!("unparseable _volume: {raw}"))
}

#[async_trait]
impl PlayerDirectory for LmsDirectory {
    async fn list_players(&self) -> Result<Vec<Player>, DirectoryError> {
        let result = self
            .execute(None, vec![json!("players"), json!(0), json!(MAX_PLAYERS)])
            .await
            .map_err(|source| DirectoryError::Unavailable { source })?;
        Ok(parse_players(&result))
    }

    async fn volume(&self, player: &Player) -> Result<i32, DirectoryError> {
        let result = self
            .execute(
                Some(&player.id),
                vec![json!("mixer"), json!("volume"), json!("?")],
            )
            .await
            .map_err(|e| Self::unresponsive(player, e))?;
        parse_volume(&result).map_err(|e| Self::unresponsive(player, e))
    }

    async fn set_volume(&self, player: &Player, volume: i32) -> Result<(), DirectoryError> {
        self.execute(
            Some(&player.id),
            vec![json!("mixer"), json!("volume"), json!(volume)],
        )
        .await
        .map(|_| ())
        .map_err(|e| Self::unresponsive(player, e))
    }

    async fn toggle_play_pause(&self, player: &Player) -> Result<(), DirectoryError> {
        // "pause" without arguments toggles the pause state
        self.execute(Some(&player.id), vec![json!("pause")])
            .await
            .map(|_| ())
            .map_err(|e| Self::unresponsive(player, e))
    }

    async fn next_track(&self, player: &Player) -> Result<(), DirectoryError> {
        self.execute(
            Some(&player.id),
            vec![json!("playlist"), json!("index"), json!("+1")],
        )
        .await
        .map(|_| ())
        .map_err(|e| Self::unresponsive(player, e))
    }

    async fn previous_track(&self, player: &Player) -> Result<(), DirectoryError> {
        self.execute(
            Some(&player.id),
            vec![json!("playlist"), json!("index"), json!("-1")],
        )
        .await
        .map(|_| ())
        .map_err(|e| Self::unresponsive(player, e))
    }
}
