use std::collections::HashMap;

use rand::Rng;
use serde::Serialize;

use crate::components::GameConfig;
use crate::elevator::Elevator;
use crate::level::{load_level, Level, LevelSource};
use crate::player::Player;

const WIN_POINTS_PER_PIECE: u64 = 1000;
const WIN_POINTS_PER_SECOND: u64 = 10;
const LOSS_POINTS_PER_PIECE: u64 = 500;
const WIN_XP_BONUS: u64 = 1000;

/// Outcome of a finished session.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GameResult {
    pub won: bool,
    pub pieces_found: u32,
    pub seconds_left: u64,
    pub score: u64,
    pub xp: u64,
    pub playtime_ms: u64,
}

impl GameResult {
    pub fn compute(won: bool, pieces_found: u32, time_left_ms: i64, playtime_ms: u64) -> Self {
        let seconds_left = (time_left_ms.max(0) / 1000) as u64;
        let pieces = u64::from(pieces_found);
        let score = if won {
            pieces * WIN_POINTS_PER_PIECE + seconds_left * WIN_POINTS_PER_SECOND
        } else {
            pieces * LOSS_POINTS_PER_PIECE
        };
        let xp = score / 2 + if won { WIN_XP_BONUS } else { 0 };
        Self {
            won,
            pieces_found,
            seconds_left,
            score,
            xp,
            playtime_ms,
        }
    }
}

/// State of one run from "new game" to victory or game over.
pub struct GameSession {
    pub lives: u32,
    pub pieces_found: u32,
    pub time_left_ms: i64,
    pub current_room: Option<u32>,
    pub last_room: Option<u32>,
    pub elevator: Elevator,
    pub player: Player,
    pub frozen_until_ms: Option<u64>,
    pub playtime_ms: u64,
    levels: HashMap<u32, Level>,
    last_clock_ms: Option<u64>,
}

impl GameSession {
    pub fn new(config: &GameConfig, now_ms: u64) -> Self {
        Self {
            lives: config.starting_lives,
            pieces_found: 0,
            time_left_ms: config.session_ms(),
            current_room: None,
            last_room: None,
            elevator: Elevator::new(config),
            player: Player::new(0.0, 0.0, config),
            frozen_until_ms: None,
            playtime_ms: 0,
            levels: HashMap::new(),
            last_clock_ms: Some(now_ms),
        }
    }

    /// Returns the cached level for `room`, loading it on first visit. Rooms keep their
    /// state (searched furniture, robot positions) for the rest of the session.
    pub fn get_or_load_level(
        &mut self,
        room: u32,
        source: &dyn LevelSource,
        config: &GameConfig,
        rng: &mut impl Rng,
        now_ms: u64,
    ) -> Option<&mut Level> {
        if !self.levels.contains_key(&room) {
            let level = load_level(source, room, config, rng, now_ms)?;
            self.levels.insert(room, level);
        }
        self.levels.get_mut(&room)
    }

    pub fn level(&self, room: u32) -> Option<&Level> {
        self.levels.get(&room)
    }

    pub fn loaded_rooms(&self) -> usize {
        self.levels.len()
    }

    pub fn current_level(&self) -> Option<&Level> {
        self.current_room.and_then(|room| self.levels.get(&room))
    }

    pub fn current_level_mut(&mut self) -> Option<&mut Level> {
        let room = self.current_room?;
        self.levels.get_mut(&room)
    }

    /// The active room and the player, borrowed together for a simulation step.
    pub fn room_and_player_mut(&mut self) -> Option<(&mut Level, &mut Player)> {
        let room = self.current_room?;
        let level = self.levels.get_mut(&room)?;
        Some((level, &mut self.player))
    }

    /// Drains the session clock up to `now_ms`. Returns the milliseconds consumed.
    pub fn advance_clock(&mut self, now_ms: u64) -> u64 {
        let elapsed = match self.last_clock_ms {
            Some(last) => now_ms.saturating_sub(last),
            None => 0,
        };
        self.last_clock_ms = Some(now_ms);
        self.time_left_ms -= elapsed as i64;
        self.playtime_ms = self.playtime_ms.saturating_add(elapsed);
        elapsed
    }

    /// Stops the clock; the next `advance_clock` only re-establishes the baseline.
    pub fn pause_clock(&mut self) {
        self.last_clock_ms = None;
    }

    pub fn timed_out(&self) -> bool {
        self.time_left_ms <= 0
    }

    pub fn freeze_enemies(&mut self, now_ms: u64, duration_ms: u64) {
        self.frozen_until_ms = Some(now_ms.saturating_add(duration_ms));
    }

    pub fn enemies_frozen(&self, now_ms: u64) -> bool {
        self.frozen_until_ms.is_some_and(|until| now_ms < until)
    }

    /// Takes one life. Returns whether any remain.
    pub fn lose_life(&mut self) -> bool {
        self.lives = self.lives.saturating_sub(1);
        self.lives > 0
    }

    pub fn result(&self, won: bool) -> GameResult {
        GameResult::compute(won, self.pieces_found, self.time_left_ms, self.playtime_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn winning_score_counts_pieces_and_seconds() {
        let result = GameResult::compute(true, 8, 60_000, 0);
        assert_eq!((result.score, result.xp), (8600, 5300));
    }

    #[test]
    fn losing_score_counts_pieces_only() {
        let result = GameResult::compute(false, 3, 123_456, 0);
        assert_eq!((result.score, result.xp), (1500, 750));
    }

    #[test]
    fn partial_seconds_are_floored() {
        let result = GameResult::compute(true, 0, 1_999, 0);
        assert_eq!(result.seconds_left, 1);
        assert_eq!(result.score, 10);
        assert_eq!(GameResult::compute(true, 0, -500, 0).seconds_left, 0);
    }

    #[test]
    fn reloading_a_room_returns_the_cached_level() {
        let config = GameConfig::default();
        let mut source = HashMap::new();
        source.insert(1, "P O\n###".to_string());
        let mut rng = SmallRng::seed_from_u64(3);
        let mut session = GameSession::new(&config, 0);

        let first: *const Level = session
            .get_or_load_level(1, &source, &config, &mut rng, 0)
            .map(|level| level as *const Level)
            .expect("first load");
        // Change the source; a cached room must not be re-read.
        source.insert(1, "#".to_string());
        let second: *const Level = session
            .get_or_load_level(1, &source, &config, &mut rng, 10)
            .map(|level| level as *const Level)
            .expect("second load");
        assert!(std::ptr::eq(first, second));
        assert_eq!(session.loaded_rooms(), 1);
        assert_eq!(session.level(1).map(|l| l.tilemap.cols), Some(3));
    }

    #[test]
    fn missing_room_is_not_cached() {
        let config = GameConfig::default();
        let source: HashMap<u32, String> = HashMap::new();
        let mut rng = SmallRng::seed_from_u64(3);
        let mut session = GameSession::new(&config, 0);
        assert!(session
            .get_or_load_level(4, &source, &config, &mut rng, 0)
            .is_none());
        assert_eq!(session.loaded_rooms(), 0);
    }

    #[test]
    fn clock_drains_only_while_running() {
        let config = GameConfig::default();
        let mut session = GameSession::new(&config, 1000);
        assert_eq!(session.advance_clock(1500), 500);
        session.pause_clock();
        assert_eq!(session.advance_clock(9000), 0);
        assert_eq!(session.advance_clock(9100), 100);
        assert_eq!(session.time_left_ms, config.session_ms() - 600);
        assert_eq!(session.playtime_ms, 600);
    }

    #[test]
    fn freeze_expires() {
        let config = GameConfig::default();
        let mut session = GameSession::new(&config, 0);
        session.freeze_enemies(100, config.freeze_ms);
        assert!(session.enemies_frozen(100));
        assert!(session.enemies_frozen(10_099));
        assert!(!session.enemies_frozen(10_100));
    }

    #[test]
    fn lives_run_out() {
        let config = GameConfig::default();
        let mut session = GameSession::new(&config, 0);
        assert!(session.lose_life());
        assert!(session.lose_life());
        assert!(!session.lose_life());
        assert_eq!(session.lives, 0);
    }
}
