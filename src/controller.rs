//! Selection and control core.
//!
//! Translates knob gestures into remote calls against the active player and
//! owns player switching. Remote failures are logged and swallowed at the
//! gesture boundary; a broken server never takes the dispatch loop down.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::directory::{DirectoryError, Player, PlayerDirectory};
use crate::feedback::LedLevel;
use crate::powermate::KnobDelegate;

/// Volume change per rotation tick.
const VOLUME_STEP: i32 = 3;
/// LED brightness change per rotation tick.
const FEEDBACK_STEP: i16 = 5;
const VOLUME_MIN: i32 = 0;
const VOLUME_MAX: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rotation {
    Clockwise,
    Counterclockwise,
}

impl Rotation {
    fn sign(self) -> i32 {
        match self {
            Rotation::Clockwise => 1,
            Rotation::Counterclockwise => -1,
        }
    }
}

/// The player currently receiving commands, with its 1-based position in the
/// listing that selected it.
#[derive(Debug, Clone)]
struct ActivePlayer {
    player: Player,
    ordinal: usize,
}

/// Gesture-to-command core. Owns the active selection and the LED feedback
/// level; mutated only from gesture handlers, which the session serializes.
pub struct KnobController<D> {
    directory: D,
    active: Option<ActivePlayer>,
    led: LedLevel,
}

impl<D: PlayerDirectory> KnobController<D> {
    /// Scan the directory for `target_name` and build a controller around it.
    ///
    /// Returns `Ok(None)` when the directory answered but no player carries
    /// that name; the caller decides whether that ends the process.
    pub async fn for_player(
        directory: D,
        target_name: &str,
    ) -> Result<Option<Self>, DirectoryError> {
        let players = directory.list_players().await?;
        info!("Detected {} players", players.len());
        for player in &players {
            info!("Player: {}", player.name);
        }

        let active = players.iter().enumerate().find_map(|(idx, player)| {
            (player.name == target_name).then(|| ActivePlayer {
                player: player.clone(),
                ordinal: idx + 1,
            })
        });

        Ok(active.map(|active| {
            info!(
                "Controlling {} ({}/{})",
                active.player.name,
                active.ordinal,
                players.len()
            );
            Self {
                directory,
                active: Some(active),
                led: LedLevel::new(),
            }
        }))
    }

    /// Name of the player currently receiving commands.
    pub fn active_player_name(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.player.name.as_str())
    }

    /// Current LED feedback level.
    pub fn led_level(&self) -> u8 {
        self.led.value()
    }

    /// Advance to the next player, wrapping after the last.
    ///
    /// The listing is re-fetched every time; a player that disappeared since
    /// the previous switch is only noticed here. An empty listing clears the
    /// selection until a later switch finds players again.
    async fn select_next_player(&mut self) {
        let players = match self.directory.list_players().await {
            Ok(players) => players,
            Err(e) => {
                warn!("Cannot refresh player list: {e}");
                return;
            }
        };

        if players.is_empty() {
            info!("No players detected; gestures are ignored until the next switch");
            self.active = None;
            return;
        }

        let current = self.active.as_ref().map(|a| a.ordinal).unwrap_or(0);
        let ordinal = (current % players.len()) + 1;
        let player = players[ordinal - 1].clone();
        info!("Now controlling {} ({}/{})", player.name, ordinal, players.len());
        self.active = Some(ActivePlayer { player, ordinal });
    }

    async fn adjust_volume(&mut self, rotation: Rotation) {
        // The LED tracks the gesture itself, not the outcome of the remote
        // write.
        self.led.nudge(rotation.sign() as i16 * FEEDBACK_STEP);

        let Some(active) = &self.active else {
            debug!("Rotation ignored: no active player");
            return;
        };

        let current = match self.directory.volume(&active.player).await {
            Ok(volume) => volume,
            Err(e) => {
                warn!("Cannot read volume: {e}");
                0
            }
        };

        let target = (current + rotation.sign() * VOLUME_STEP).clamp(VOLUME_MIN, VOLUME_MAX);
        info!("Volume: {target}");
        if let Err(e) = self.directory.set_volume(&active.player, target).await {
            warn!("Cannot set volume: {e}");
        }
    }

    async fn toggle_play_pause(&mut self) {
        let Some(active) = &self.active else {
            debug!("Press ignored: no active player");
            return;
        };

        info!("Play/pause");
        if let Err(e) = self.directory.toggle_play_pause(&active.player).await {
            warn!("Cannot toggle play/pause: {e}");
        }
    }
}

#[async_trait]
impl<D: PlayerDirectory> KnobDelegate for KnobController<D> {
    async fn on_connect(&mut self) {
        info!("PowerMate connected");
    }

    async fn on_disconnect(&mut self) {
        info!("PowerMate disconnected");
    }

    async fn on_battery_report(&mut self, percent: u8) {
        info!("Battery: {percent}%");
    }

    async fn on_press(&mut self) {
        self.toggle_play_pause().await;
    }

    async fn on_long_press(&mut self, held: Duration) {
        // The hold time is reported but never branches behavior.
        debug!("Long press: {}s", held.as_secs());
        self.select_next_player().await;
    }

    async fn on_clockwise(&mut self) {
        self.adjust_volume(Rotation::Clockwise).await;
    }

    async fn on_counterclockwise(&mut self) {
        self.adjust_volume(Rotation::Counterclockwise).await;
    }

    async fn on_press_clockwise(&mut self) {
        debug!("Press clockwise");
    }

    async fn on_press_counterclockwise(&mut self) {
        debug!("Press counterclockwise");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        List,
        Volume(String),
        SetVolume(String, i32),
        Toggle(String),
        Next(String),
        Previous(String),
    }

    #[derive(Clone, Default)]
    struct FakeDirectory {
        inner: Arc<FakeInner>,
    }

    #[derive(Default)]
    struct FakeInner {
        players: Mutex<Vec<Player>>,
        volume: Mutex<i32>,
        list_fails: AtomicBool,
        volume_read_fails: AtomicBool,
        set_volume_fails: AtomicBool,
        calls: Mutex<Vec<Call>>,
    }

    impl FakeDirectory {
        fn with_players(names: &[&str]) -> Self {
            let fake = Self::default();
            fake.set_players(names);
            fake
        }

        fn set_players(&self, names: &[&str]) {
            *self.inner.players.lock().unwrap() = names
                .iter()
                .enumerate()
                .map(|(idx, name)| Player {
                    id: format!("00:04:20:aa:bb:{idx:02x}"),
                    name: name.to_string(),
                })
                .collect();
        }

        fn set_volume(&self, volume: i32) {
            *self.inner.volume.lock().unwrap() = volume;
        }

        fn fail_list(&self, fail: bool) {
            self.inner.list_fails.store(fail, Ordering::SeqCst);
        }

        fn fail_volume_reads(&self) {
            self.inner.volume_read_fails.store(true, Ordering::SeqCst);
        }

        fn fail_volume_writes(&self) {
            self.inner.set_volume_fails.store(true, Ordering::SeqCst);
        }

        fn calls(&self) -> Vec<Call> {
            self.inner.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) {
            self.inner.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl PlayerDirectory for FakeDirectory {
        async fn list_players(&self) -> Result<Vec<Player>, DirectoryError> {
            self.record(Call::List);
            if self.inner.list_fails.load(Ordering::SeqCst) {
                return Err(DirectoryError::Unavailable {
                    source: anyhow!("connection refused"),
                });
            }
            Ok(self.inner.players.lock().unwrap().clone())
        }

        async fn volume(&self, player: &Player) -> Result<i32, DirectoryError> {
            self.record(Call::Volume(player.name.clone()));
            if self.inner.volume_read_fails.load(Ordering::SeqCst) {
                return Err(DirectoryError::PlayerUnresponsive {
                    player: player.name.clone(),
                    source: anyhow!("timed out"),
                });
            }
            Ok(*self.inner.volume.lock().unwrap())
        }

        async fn set_volume(&self, player: &Player, volume: i32) -> Result<(), DirectoryError> {
            self.record(Call::SetVolume(player.name.clone(), volume));
            if self.inner.set_volume_fails.load(Ordering::SeqCst) {
                return Err(DirectoryError::PlayerUnresponsive {
                    player: player.name.clone(),
                    source: anyhow!("timed out"),
                });
            }
            Ok(())
        }

        async fn toggle_play_pause(&self, player: &Player) -> Result<(), DirectoryError> {
            self.record(Call::Toggle(player.name.clone()));
            Ok(())
        }

        async fn next_track(&self, player: &Player) -> Result<(), DirectoryError> {
            self.record(Call::Next(player.name.clone()));
            Ok(())
        }

        async fn previous_track(&self, player: &Player) -> Result<(), DirectoryError> {
            self.record(Call::Previous(player.name.clone()));
            Ok(())
        }
    }

    async fn controller_for(
        fake: &FakeDirectory,
        target: &str,
    ) -> KnobController<FakeDirectory> {
        KnobController::for_player(fake.clone(), target)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn startup_finds_configured_player() {
        let fake = FakeDirectory::with_players(&["keuken", "woonkamer"]);
        let controller = controller_for(&fake, "woonkamer").await;
        assert_eq!(controller.active_player_name(), Some("woonkamer"));
    }

    #[tokio::test]
    async fn startup_without_target_player_is_none() {
        let fake = FakeDirectory::with_players(&["keuken"]);
        let controller = KnobController::for_player(fake, "woonkamer").await.unwrap();
        assert!(controller.is_none());
    }

    #[tokio::test]
    async fn startup_propagates_directory_failure() {
        let fake = FakeDirectory::default();
        fake.fail_list(true);
        let result = KnobController::for_player(fake, "woonkamer").await;
        assert!(matches!(result, Err(DirectoryError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn long_press_walks_players_and_wraps() {
        let fake = FakeDirectory::with_players(&["a", "b", "c"]);
        let mut controller = controller_for(&fake, "a").await;

        controller.on_long_press(Duration::from_secs(2)).await;
        assert_eq!(controller.active_player_name(), Some("b"));
        controller.on_long_press(Duration::from_secs(2)).await;
        assert_eq!(controller.active_player_name(), Some("c"));
        controller.on_long_press(Duration::from_secs(2)).await;
        assert_eq!(controller.active_player_name(), Some("a"));
    }

    #[tokio::test]
    async fn long_press_with_single_player_keeps_it() {
        let fake = FakeDirectory::with_players(&["a"]);
        let mut controller = controller_for(&fake, "a").await;

        controller.on_long_press(Duration::from_secs(3)).await;
        assert_eq!(controller.active_player_name(), Some("a"));
    }

    #[tokio::test]
    async fn long_press_duration_never_branches() {
        let fake = FakeDirectory::with_players(&["a", "b", "c"]);
        let mut controller = controller_for(&fake, "a").await;

        controller.on_long_press(Duration::from_secs(1)).await;
        assert_eq!(controller.active_player_name(), Some("b"));
        // A ten second hold is just another switch, not a power-off.
        controller.on_long_press(Duration::from_secs(10)).await;
        assert_eq!(controller.active_player_name(), Some("c"));
    }

    #[tokio::test]
    async fn empty_refresh_clears_selection_and_silences_gestures() {
        let fake = FakeDirectory::with_players(&["a"]);
        let mut controller = controller_for(&fake, "a").await;

        fake.set_players(&[]);
        controller.on_long_press(Duration::from_secs(2)).await;
        assert_eq!(controller.active_player_name(), None);

        let before = fake.calls();
        controller.on_press().await;
        controller.on_clockwise().await;
        assert_eq!(fake.calls(), before);
    }

    #[tokio::test]
    async fn refresh_failure_keeps_current_selection() {
        let fake = FakeDirectory::with_players(&["a", "b"]);
        let mut controller = controller_for(&fake, "a").await;

        fake.fail_list(true);
        controller.on_long_press(Duration::from_secs(2)).await;
        assert_eq!(controller.active_player_name(), Some("a"));
    }

    #[tokio::test]
    async fn shrunken_directory_wraps_stale_ordinal() {
        let fake = FakeDirectory::with_players(&["a", "b", "c"]);
        let mut controller = controller_for(&fake, "c").await;

        // Ordinal 3 against a two-player listing lands back inside it.
        fake.set_players(&["a", "b"]);
        controller.on_long_press(Duration::from_secs(2)).await;
        assert_eq!(controller.active_player_name(), Some("b"));
    }

    #[tokio::test]
    async fn consecutive_presses_send_independent_toggles() {
        let fake = FakeDirectory::with_players(&["a"]);
        let mut controller = controller_for(&fake, "a").await;

        controller.on_press().await;
        controller.on_press().await;

        let toggles = fake
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Toggle(_)))
            .count();
        assert_eq!(toggles, 2);
    }

    #[tokio::test]
    async fn led_tracks_rotation_direction() {
        let fake = FakeDirectory::with_players(&["a"]);
        fake.set_volume(50);
        let mut controller = controller_for(&fake, "a").await;

        let start = controller.led_level();
        controller.on_clockwise().await;
        assert_eq!(controller.led_level(), start + 5);
        controller.on_counterclockwise().await;
        assert_eq!(controller.led_level(), start);
    }

    #[tokio::test]
    async fn led_still_moves_when_volume_write_fails() {
        let fake = FakeDirectory::with_players(&["a"]);
        fake.fail_volume_writes();
        let mut controller = controller_for(&fake, "a").await;

        let start = controller.led_level();
        controller.on_clockwise().await;
        assert_eq!(controller.led_level(), start + 5);
    }

    #[tokio::test]
    async fn led_still_moves_without_active_player() {
        let fake = FakeDirectory::with_players(&["a"]);
        let mut controller = controller_for(&fake, "a").await;

        fake.set_players(&[]);
        controller.on_long_press(Duration::from_secs(2)).await;

        let start = controller.led_level();
        controller.on_counterclockwise().await;
        assert_eq!(controller.led_level(), start - 5);
    }

    #[tokio::test]
    async fn read_failure_steps_from_zero() {
        let fake = FakeDirectory::with_players(&["a"]);
        fake.fail_volume_reads();
        let mut controller = controller_for(&fake, "a").await;

        controller.on_clockwise().await;
        assert!(fake.calls().contains(&Call::SetVolume("a".to_string(), 3)));
    }

    #[tokio::test]
    async fn press_rotation_combos_send_nothing() {
        let fake = FakeDirectory::with_players(&["a"]);
        let mut controller = controller_for(&fake, "a").await;

        let before = fake.calls();
        controller.on_press_clockwise().await;
        controller.on_press_counterclockwise().await;
        assert_eq!(fake.calls(), before);
    }
}
