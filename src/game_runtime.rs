use bevy::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::Serialize;
use serde_json::json;

use crate::audio::{sounds, AudioCue};
use crate::components::{Direction, GameConfig};
use crate::elevator::Elevator;
use crate::events::GameEventBus;
use crate::input::{Action, VirtualInput};
use crate::level::{Level, LevelSource};
use crate::physics_core::{is_leaving_elevator, leaving_side, EDGE_TOLERANCE};
use crate::player::Player;
use crate::profile::{validate_nickname, ProfileStore, UserProfile};
use crate::room::{step_room, RoomContext, SearchOutcome};
use crate::session::{GameResult, GameSession};
use crate::ui::{Notifications, TerminalMenu, TerminalOption};


/// Pending cues beyond this are dropped oldest-first when nobody drains them.
const MAX_PENDING_CUES: usize = 256;
/// Gap between the cab wall and a player stepping back in from a room.
const CAB_DOOR_MARGIN: f32 = 8.0;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize)]
pub enum GameFlowState {
    ProfileSelection,
    Homescreen,
    InElevator,
    Playing,
    TerminalOpen,
    Paused,
    GameOver,
    VictoryScreen,
    StatsScreen,
    LeaderboardScreen,
}

impl GameFlowState {
    /// States in which the session clock runs.
    pub fn is_session_active(self) -> bool {
        matches!(
            self,
            GameFlowState::InElevator | GameFlowState::Playing | GameFlowState::TerminalOpen
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            GameFlowState::ProfileSelection => "profile_selection",
            GameFlowState::Homescreen => "homescreen",
            GameFlowState::InElevator => "in_elevator",
            GameFlowState::Playing => "playing",
            GameFlowState::TerminalOpen => "terminal_open",
            GameFlowState::Paused => "paused",
            GameFlowState::GameOver => "game_over",
            GameFlowState::VictoryScreen => "victory_screen",
            GameFlowState::StatsScreen => "stats_screen",
            GameFlowState::LeaderboardScreen => "leaderboard_screen",
        }
    }
}

/// Top-level game: profiles, the running session and the flow between screens.
///
/// Everything mutates inside [`GameRuntime::tick`], driven once per fixed step.
/// Observers read through the getters and the event bus revision.
#[derive(Resource)]
pub struct GameRuntime {
    config: GameConfig,
    state: GameFlowState,
    paused_from: Option<GameFlowState>,
    levels: Box<dyn LevelSource>,
    profiles: Box<dyn ProfileStore>,
    active_profile: Option<UserProfile>,
    session: Option<GameSession>,
    last_result: Option<GameResult>,
    terminal: TerminalMenu,
    notifications: Notifications,
    events: GameEventBus,
    audio_cues: Vec<AudioCue>,
    rng: SmallRng,
    frame: u64,
    now_ms: u64,
}

impl GameRuntime {
    pub fn new(
        config: GameConfig,
        levels: Box<dyn LevelSource>,
        profiles: Box<dyn ProfileStore>,
        seed: u64,
    ) -> Self {
        Self {
            config,
            state: GameFlowState::ProfileSelection,
            paused_from: None,
            levels,
            profiles,
            active_profile: None,
            session: None,
            last_result: None,
            terminal: TerminalMenu::default(),
            notifications: Notifications::default(),
            events: GameEventBus::default(),
            audio_cues: Vec::new(),
            rng: SmallRng::seed_from_u64(seed),
            frame: 0,
            now_ms: 0,
        }
    }

    pub fn state(&self) -> GameFlowState {
        self.state
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&GameSession> {
        self.session.as_ref()
    }

    pub fn active_profile(&self) -> Option<&UserProfile> {
        self.active_profile.as_ref()
    }

    pub fn last_result(&self) -> Option<&GameResult> {
        self.last_result.as_ref()
    }

    pub fn terminal(&self) -> &TerminalMenu {
        &self.terminal
    }

    pub fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    pub fn events(&self) -> &GameEventBus {
        &self.events
    }

    /// Changes whenever observable state may have changed.
    pub fn revision(&self) -> u64 {
        self.events.revision()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn current_level(&self) -> Option<&Level> {
        self.session.as_ref().and_then(GameSession::current_level)
    }

    pub fn drain_audio(&mut self) -> Vec<AudioCue> {
        std::mem::take(&mut self.audio_cues)
    }

    // --- profiles ---

    pub fn create_profile(&mut self, nickname: &str, avatar_id: u32) -> Result<(), String> {
        let nickname = validate_nickname(nickname)?;
        let taken = self.profiles.load(nickname).is_some()
            || self
                .profiles
                .load_all()
                .iter()
                .any(|p| p.nickname.eq_ignore_ascii_case(nickname));
        if taken {
            return Err(format!("Nickname '{nickname}' is already taken"));
        }
        let profile = UserProfile::new(nickname, avatar_id);
        self.profiles.save(&profile)?;
        info!("[Robotower] Created profile {}", profile.nickname);
        self.events
            .emit("profile_created", json!({ "nickname": profile.nickname }));
        self.activate_profile(profile)
    }

    pub fn select_profile(&mut self, nickname: &str) -> Result<(), String> {
        let profile = self
            .profiles
            .load(nickname)
            .ok_or_else(|| format!("No profile named '{nickname}'"))?;
        self.activate_profile(profile)
    }

    fn activate_profile(&mut self, profile: UserProfile) -> Result<(), String> {
        if self.session.is_some() {
            return Err("Cannot switch profiles during a game".to_string());
        }
        self.events
            .emit("profile_selected", json!({ "nickname": profile.nickname }));
        self.active_profile = Some(profile);
        self.set_state(GameFlowState::Homescreen);
        Ok(())
    }

    /// Removes a profile from the store. The active profile cannot be deleted mid-game.
    pub fn delete_profile(&mut self, nickname: &str) -> bool {
        let is_active = self
            .active_profile
            .as_ref()
            .is_some_and(|p| p.nickname.eq_ignore_ascii_case(nickname));
        if is_active && self.session.is_some() {
            return false;
        }
        if !self.profiles.delete(nickname) {
            return false;
        }
        if is_active {
            self.active_profile = None;
            self.set_state(GameFlowState::ProfileSelection);
        }
        self.events
            .emit("profile_deleted", json!({ "nickname": nickname }));
        true
    }

    /// All profiles, best total score first.
    pub fn leaderboard(&self) -> Vec<UserProfile> {
        let mut profiles = self.profiles.load_all();
        profiles.sort_by(|a, b| {
            b.total_score
                .cmp(&a.total_score)
                .then(b.level.cmp(&a.level))
                .then_with(|| a.nickname.cmp(&b.nickname))
        });
        profiles
    }

    // --- session flow ---

    pub fn new_game(&mut self, now_ms: u64) -> Result<(), String> {
        if self.session.is_some() {
            return Err("A game is already running".to_string());
        }
        let Some(profile) = self.active_profile.as_mut() else {
            return Err("Select a profile before starting a game".to_string());
        };
        profile.start_game();
        if let Err(e) = self.profiles.save(profile) {
            warn!("[Robotower] Failed to save profile: {e}");
        }

        let mut session = GameSession::new(&self.config, now_ms);
        place_in_cab(&mut session.player, &self.config, None);
        self.session = Some(session);
        self.last_result = None;
        self.paused_from = None;
        self.notifications.clear();
        self.events.emit("game_started", json!({ "at_ms": now_ms }));
        info!("[Robotower] New game started");
        self.set_state(GameFlowState::InElevator);
        Ok(())
    }

    /// Walks the player into `room`, loading it on the first visit.
    pub fn enter_room(&mut self, room: u32, now_ms: u64) -> Result<(), String> {
        let Some(session) = self.session.as_mut() else {
            return Err("No game in progress".to_string());
        };
        let level = session
            .get_or_load_level(room, self.levels.as_ref(), &self.config, &mut self.rng, now_ms)
            .ok_or_else(|| format!("Room {room} could not be loaded"))?;
        level.resume(&mut self.audio_cues);
        let (x, y) = level.spawn;
        session.player.respawn_at(x, y);
        session.elevator.arrive_at_floor(Elevator::floor_for_room(room));
        session.current_room = Some(room);
        session.last_room = Some(room);
        self.events.emit("room_entered", json!({ "room": room }));
        self.set_state(GameFlowState::Playing);
        Ok(())
    }

    /// Back to the cab, on the side the room is attached to.
    fn leave_room(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(room) = session.current_room else {
            return;
        };
        if let Some(level) = session.current_level_mut() {
            level.suspend(&mut self.audio_cues);
        }
        session.current_room = None;
        let side = if room % 2 == 1 {
            Direction::Left
        } else {
            Direction::Right
        };
        place_in_cab(&mut session.player, &self.config, Some(side));
        self.events.emit("room_left", json!({ "room": room }));
        self.set_state(GameFlowState::InElevator);
    }

    fn end_game(&mut self, won: bool) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        if let Some(level) = session.current_level_mut() {
            level.suspend(&mut self.audio_cues);
        }
        if session.elevator.moving {
            self.audio_cues
                .push(AudioCue::Stop(sounds::ELEVATOR_MOVE.to_string()));
        }

        let result = session.result(won);
        if let Some(profile) = self.active_profile.as_mut() {
            let gained = profile.end_game(&result);
            if gained > 0 {
                info!(
                    "[Robotower] {} reached level {}",
                    profile.nickname, profile.level
                );
            }
            if let Err(e) = self.profiles.save(profile) {
                warn!("[Robotower] Failed to save profile: {e}");
            }
        }

        let cue = if won { sounds::VICTORY } else { sounds::GAME_OVER };
        self.audio_cues.push(AudioCue::Play(cue.to_string()));
        self.events.emit(
            "game_over",
            serde_json::to_value(&result).unwrap_or(serde_json::Value::Null),
        );
        info!(
            "[Robotower] Game over (won: {}, score: {}, xp: {})",
            result.won, result.score, result.xp
        );
        self.last_result = Some(result);
        self.paused_from = None;
        self.set_state(if won {
            GameFlowState::VictoryScreen
        } else {
            GameFlowState::GameOver
        });
    }

    fn set_state(&mut self, next: GameFlowState) {
        if self.state == next {
            return;
        }
        debug!("[Robotower] {:?} -> {:?}", self.state, next);
        self.events.emit(
            "state_changed",
            json!({ "from": self.state.label(), "to": next.label() }),
        );
        self.state = next;
    }

    fn notify(&mut self, text: impl Into<String>, now_ms: u64) {
        self.notifications
            .show(text, now_ms, self.config.notification_ms);
    }

    // --- per tick ---

    /// One fixed simulation step. `now_ms` is the simulation clock and must not go
    /// backwards.
    pub fn tick(&mut self, input: &VirtualInput, now_ms: u64) {
        self.frame = self.frame.saturating_add(1);
        self.now_ms = now_ms;
        self.events.frame = self.frame;

        match self.state {
            GameFlowState::ProfileSelection => {}
            GameFlowState::Homescreen => self.tick_homescreen(input, now_ms),
            GameFlowState::StatsScreen | GameFlowState::LeaderboardScreen => {
                if input.just_pressed(Action::Back) || input.just_pressed(Action::Confirm) {
                    self.set_state(GameFlowState::Homescreen);
                }
            }
            GameFlowState::GameOver | GameFlowState::VictoryScreen => {
                if input.just_pressed(Action::Confirm) || input.just_pressed(Action::Back) {
                    self.set_state(GameFlowState::Homescreen);
                }
            }
            GameFlowState::Paused => {
                if input.just_pressed(Action::Pause) {
                    let resume_to = self.paused_from.take().unwrap_or(GameFlowState::Playing);
                    self.set_state(resume_to);
                }
            }
            GameFlowState::InElevator | GameFlowState::Playing | GameFlowState::TerminalOpen => {
                self.tick_session(input, now_ms)
            }
        }

        if self.notifications.expire(now_ms) || self.state.is_session_active() {
            self.events.mark_changed();
        }
        self.trim_cues();
    }

    fn tick_homescreen(&mut self, input: &VirtualInput, now_ms: u64) {
        if input.just_pressed(Action::Confirm) {
            if let Err(e) = self.new_game(now_ms) {
                warn!("[Robotower] {e}");
            }
        } else if input.just_pressed(Action::Stats) {
            self.set_state(GameFlowState::StatsScreen);
        } else if input.just_pressed(Action::Leaderboard) {
            self.set_state(GameFlowState::LeaderboardScreen);
        }
    }

    fn tick_session(&mut self, input: &VirtualInput, now_ms: u64) {
        let Some(session) = self.session.as_mut() else {
            self.set_state(GameFlowState::Homescreen);
            return;
        };
        session.advance_clock(now_ms);
        if session.timed_out() {
            info!("[Robotower] Time is up");
            self.end_game(false);
            return;
        }
        if input.just_pressed(Action::Pause) {
            session.pause_clock();
            self.paused_from = Some(self.state);
            self.set_state(GameFlowState::Paused);
            return;
        }
        match self.state {
            GameFlowState::InElevator => self.tick_elevator(input, now_ms),
            GameFlowState::Playing => self.tick_playing(input, now_ms),
            GameFlowState::TerminalOpen => self.tick_terminal(input, now_ms),
            _ => {}
        }
    }

    fn tick_elevator(&mut self, input: &VirtualInput, now_ms: u64) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.elevator.moving {
            if session.elevator.tick() {
                self.audio_cues
                    .push(AudioCue::Stop(sounds::ELEVATOR_MOVE.to_string()));
                self.events.emit(
                    "elevator_arrived",
                    json!({ "floor": session.elevator.current_floor }),
                );
            }
            session.player.refresh_state(false, false);
            return;
        }

        let body = session.player.hitbox();
        let centre = self.config.elevator_width / 2.0;
        if (body.center_x() - centre).abs() <= self.config.elevator_control_zone / 2.0 {
            let started = if input.just_pressed(Action::Up) {
                session.elevator.move_up()
            } else if input.just_pressed(Action::Down) {
                session.elevator.move_down()
            } else {
                false
            };
            if started {
                self.audio_cues
                    .push(AudioCue::Loop(sounds::ELEVATOR_MOVE.to_string()));
                self.events.emit(
                    "elevator_called",
                    json!({ "floor": session.elevator.current_floor }),
                );
                session.player.refresh_state(false, false);
                return;
            }
        }

        let direction = match (input.pressed(Action::Left), input.pressed(Action::Right)) {
            (true, false) => Some(Direction::Left),
            (false, true) => Some(Direction::Right),
            _ => None,
        };
        let moved = direction.is_some_and(|d| session.player.step_free(d));
        session.player.refresh_state(moved, false);

        let body = session.player.hitbox();
        if !is_leaving_elevator(&body, self.config.elevator_width) {
            return;
        }
        let Some(side) = leaving_side(&body, self.config.elevator_width) else {
            return;
        };
        let Some(room) = session.elevator.room_for_exit(side) else {
            return;
        };
        if let Err(e) = self.enter_room(room, now_ms) {
            warn!("[Robotower] {e}");
            self.notify(format!("Room {room} is locked"), now_ms);
            if let Some(session) = self.session.as_mut() {
                place_in_cab(&mut session.player, &self.config, Some(side));
            }
        }
    }

    fn tick_playing(&mut self, input: &VirtualInput, now_ms: u64) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let enemies_frozen = session.enemies_frozen(now_ms);
        let Some((level, player)) = session.room_and_player_mut() else {
            self.set_state(GameFlowState::InElevator);
            return;
        };
        let ctx = RoomContext {
            config: &self.config,
            input,
            now_ms,
            enemies_frozen,
        };
        let step = step_room(level, player, &ctx, &mut self.audio_cues);

        if step.hit || step.fell {
            self.lose_life(now_ms, if step.hit { "robot" } else { "fall" });
            return;
        }
        if step.opened_terminal {
            self.terminal = TerminalMenu::default();
            self.audio_cues
                .push(AudioCue::Play(sounds::TERMINAL.to_string()));
            self.set_state(GameFlowState::TerminalOpen);
            return;
        }
        match step.searched {
            Some(SearchOutcome::PieceFound) => {
                let Some(session) = self.session.as_mut() else {
                    return;
                };
                session.pieces_found += 1;
                let found = session.pieces_found;
                let target = self.config.pieces_to_win;
                self.events
                    .emit("piece_found", json!({ "pieces": found, "of": target }));
                self.notify(format!("Puzzle piece found! ({found}/{target})"), now_ms);
                if found >= target {
                    self.end_game(true);
                    return;
                }
            }
            Some(SearchOutcome::Nothing) => {
                self.events.emit("search_empty", json!({}));
                self.notify("Nothing here...", now_ms);
            }
            None => {}
        }
        if step.exit.is_some() {
            self.leave_room();
        }
    }

    fn lose_life(&mut self, now_ms: u64, cause: &str) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        self.audio_cues
            .push(AudioCue::Play(sounds::LIFE_LOST.to_string()));
        let alive = session.lose_life();
        let lives = session.lives;
        self.events
            .emit("life_lost", json!({ "lives": lives, "cause": cause }));
        if !alive {
            self.end_game(false);
            return;
        }
        if let Some((level, player)) = session.room_and_player_mut() {
            let (x, y) = level.spawn;
            player.respawn_at(x, y);
            level.reset(now_ms, &mut self.audio_cues);
        }
        self.notify(format!("Lives left: {lives}"), now_ms);
    }

    fn tick_terminal(&mut self, input: &VirtualInput, now_ms: u64) {
        if input.just_pressed(Action::Back) {
            self.set_state(GameFlowState::Playing);
            return;
        }
        if input.just_pressed(Action::Up) {
            self.terminal.select_previous();
        } else if input.just_pressed(Action::Down) {
            self.terminal.select_next();
        }
        if !input.just_pressed(Action::Confirm) {
            return;
        }
        let option = self.terminal.selected_option();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match option {
            TerminalOption::ResetLifts => {
                if let Some(level) = session.current_level_mut() {
                    level.reset_lifts();
                }
                self.events.emit("lifts_reset", json!({}));
                self.notify("Lifts reset", now_ms);
            }
            TerminalOption::FreezeEnemies => {
                session.freeze_enemies(now_ms, self.config.freeze_ms);
                self.events
                    .emit("robots_frozen", json!({ "for_ms": self.config.freeze_ms }));
                self.notify(
                    format!("Robots frozen for {} s", self.config.freeze_ms / 1000),
                    now_ms,
                );
            }
            TerminalOption::LogOff => self.set_state(GameFlowState::Playing),
        }
    }

    fn trim_cues(&mut self) {
        if self.audio_cues.len() > MAX_PENDING_CUES {
            let excess = self.audio_cues.len() - MAX_PENDING_CUES;
            self.audio_cues.drain(0..excess);
            debug!("[Robotower audio] Dropped {excess} undrained cues");
        }
    }

    #[cfg(test)]
    pub(crate) fn session_mut(&mut self) -> Option<&mut GameSession> {
        self.session.as_mut()
    }
}

/// Stands the player on the cab floor: centred, or just inside the door on `side`.
fn place_in_cab(player: &mut Player, config: &GameConfig, side: Option<Direction>) {
    let facing_right = side != Some(Direction::Right);
    player.place(0.0, 0.0, facing_right);
    let shape = player.hitbox();
    let margin = EDGE_TOLERANCE + CAB_DOOR_MARGIN;
    let x = match side {
        Some(Direction::Left) => margin - shape.min_x,
        Some(Direction::Right) => config.elevator_width - margin - shape.max_x,
        _ => config.elevator_width / 2.0 - shape.center_x(),
    };
    player.place(x, config.elevator_floor_height - shape.max_y, facing_right);
}

pub struct RuntimePlugin;

impl Plugin for RuntimePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            FixedUpdate,
            run_fixed_tick.run_if(resource_exists::<GameRuntime>),
        );
    }
}

fn run_fixed_tick(
    mut runtime: ResMut<GameRuntime>,
    mut input: ResMut<VirtualInput>,
    time: Res<Time<Fixed>>,
) {
    let now_ms = time.elapsed().as_millis() as u64;
    runtime.tick(&input, now_ms);
    input.clear_frame();
}
