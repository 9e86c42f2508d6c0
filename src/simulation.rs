use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::audio::AudioCue;
use crate::components::GameConfig;
use crate::events::GameEvent;
use crate::game_runtime::{GameFlowState, GameRuntime};
use crate::input::{Action, VirtualInput};
use crate::level::{LevelDirectory, LevelSource};
use crate::player::PlayerState;
use crate::profile::MemoryProfileStore;
use crate::session::GameResult;

/// A scripted, headless run of the game. Used by `--simulate` and by tests.
#[derive(Deserialize, Clone)]
pub struct SimulationRequest {
    /// Start inside this room; `None` starts in the elevator like a new game.
    #[serde(default)]
    pub room: Option<u32>,
    /// Level text for `room`. When absent rooms are read from the levels directory.
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub inputs: Vec<SimInput>,
    pub max_frames: u32,
    #[serde(default = "default_record_interval")]
    pub record_interval: u32,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub config: Option<GameConfig>,
}

fn default_record_interval() -> u32 { 1 }

#[derive(Deserialize, Clone)]
pub struct SimInput {
    pub frame: u32,
    pub action: String,
    #[serde(default)]
    pub duration: u32,
}

#[derive(Serialize, Clone)]
pub struct SimulationResult {
    pub outcome: String,
    pub frames_elapsed: u32,
    pub trace: Vec<TraceFrame>,
    pub events: Vec<GameEvent>,
    pub audio: Vec<SimAudio>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<GameResult>,
}

#[derive(Serialize, Clone)]
pub struct TraceFrame {
    pub frame: u32,
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<u32>,
    pub floor: u32,
    pub x: f32,
    pub y: f32,
    pub vy: f32,
    pub in_air: bool,
    pub player_state: PlayerState,
    pub lives: u32,
    pub pieces: u32,
    pub time_left_ms: i64,
}

#[derive(Serialize, Clone)]
pub struct SimAudio {
    pub frame: u32,
    #[serde(flatten)]
    pub cue: AudioCue,
}

pub fn run_simulation(
    base_config: &GameConfig,
    request: &SimulationRequest,
) -> Result<SimulationResult, String> {
    let config = request.config.clone().unwrap_or_else(|| base_config.clone());

    // Pre-process inputs into per-frame active actions
    let mut active_inputs: Vec<HashSet<Action>> =
        vec![HashSet::new(); request.max_frames as usize + 1];
    for input in &request.inputs {
        let action = Action::from_name(&input.action)
            .ok_or_else(|| format!("Unknown action '{}'", input.action))?;
        let duration = input.duration.max(1);
        for f in input.frame..input.frame.saturating_add(duration).min(request.max_frames) {
            active_inputs[f as usize].insert(action);
        }
    }

    let levels: Box<dyn LevelSource> = match (&request.level, request.room) {
        (Some(text), Some(room)) => Box::new(HashMap::from([(room, text.clone())])),
        (Some(_), None) => {
            return Err("A level text needs a room number".to_string());
        }
        (None, _) => Box::new(LevelDirectory::new(&config.levels_dir)),
    };
    let mut runtime = GameRuntime::new(
        config,
        levels,
        Box::new(MemoryProfileStore::default()),
        request.seed,
    );
    runtime.create_profile("simulator", 0)?;
    runtime.new_game(0)?;
    if let Some(room) = request.room {
        runtime.enter_room(room, 0)?;
    }

    let interval = request.record_interval.max(1);
    let mut trace = Vec::new();
    let mut audio = Vec::new();
    let mut outcome = "timeout".to_string();
    let mut frames_elapsed = 0;
    let mut previous: HashSet<Action> = HashSet::new();

    for frame in 0..request.max_frames {
        let active = active_inputs[frame as usize].clone();
        let input = VirtualInput {
            just_pressed: active.difference(&previous).copied().collect(),
            active: active.clone(),
            ..Default::default()
        };
        previous = active;

        let now_ms = runtime.config().ticks_to_ms(u64::from(frame) + 1);
        runtime.tick(&input, now_ms);
        frames_elapsed = frame + 1;
        audio.extend(
            runtime
                .drain_audio()
                .into_iter()
                .map(|cue| SimAudio { frame, cue }),
        );

        if frame % interval == 0 {
            if let Some(sample) = sample(&runtime, frame) {
                trace.push(sample);
            }
        }

        match runtime.state() {
            GameFlowState::GameOver => {
                outcome = "game_over".to_string();
                break;
            }
            GameFlowState::VictoryScreen => {
                outcome = "victory".to_string();
                break;
            }
            _ => {}
        }
    }

    Ok(SimulationResult {
        outcome,
        frames_elapsed,
        trace,
        events: runtime.events().since(0).cloned().collect(),
        audio,
        result: runtime.last_result().cloned(),
    })
}

fn sample(runtime: &GameRuntime, frame: u32) -> Option<TraceFrame> {
    let session = runtime.session()?;
    let player = &session.player;
    Some(TraceFrame {
        frame,
        state: runtime.state().label(),
        room: session.current_room,
        floor: session.elevator.current_floor,
        x: player.x,
        y: player.y,
        vy: player.vy,
        in_air: player.in_air,
        player_state: player.state,
        lives: session.lives,
        pieces: session.pieces_found,
        time_left_ms: session.time_left_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::sounds;

    fn request(level: &str, inputs: Vec<SimInput>, max_frames: u32) -> SimulationRequest {
        SimulationRequest {
            room: Some(1),
            level: Some(level.to_string()),
            inputs,
            max_frames,
            record_interval: 1,
            seed: 7,
            config: None,
        }
    }

    fn press(frame: u32, action: &str, duration: u32) -> SimInput {
        SimInput {
            frame,
            action: action.to_string(),
            duration,
        }
    }

    #[test]
    fn jump_rises_and_lands_on_the_same_floor() {
        let level = "      \n      \n      \n  P   \n      \n######";
        let req = request(level, vec![press(5, "jump", 1)], 120);
        let result = run_simulation(&GameConfig::default(), &req).expect("simulation");

        assert_eq!(result.outcome, "timeout");
        assert_eq!(result.frames_elapsed, 120);
        let highest = result
            .trace
            .iter()
            .map(|t| t.y)
            .fold(f32::INFINITY, f32::min);
        assert!(highest < 96.0 - 50.0, "apex at {highest}");
        let last = result.trace.last().expect("trace");
        assert_eq!(last.y, 96.0);
        assert!(!last.in_air);
        assert_eq!(
            result
                .audio
                .iter()
                .filter(|a| a.cue == AudioCue::Play(sounds::JUMP.to_string()))
                .count(),
            1
        );
    }

    #[test]
    fn walking_off_the_room_edge_returns_to_the_elevator() {
        let level = "P    \n     \n#####";
        let req = request(level, vec![press(0, "left", 4)], 40);
        let result = run_simulation(&GameConfig::default(), &req).expect("simulation");

        let last = result.trace.last().expect("trace");
        assert_eq!(last.state, "in_elevator");
        assert_eq!(last.room, None);
        assert!(result.events.iter().any(|e| e.name == "room_left"));
    }

    #[test]
    fn record_interval_thins_the_trace() {
        let req = SimulationRequest {
            record_interval: 10,
            ..request("P  \n   \n###", Vec::new(), 50)
        };
        let result = run_simulation(&GameConfig::default(), &req).expect("simulation");
        let frames: Vec<u32> = result.trace.iter().map(|t| t.frame).collect();
        assert_eq!(frames, vec![0, 10, 20, 30, 40]);
    }

    #[test]
    fn session_clock_follows_the_tick_rate() {
        let req = request("P  \n   \n###", Vec::new(), 120);
        let result = run_simulation(&GameConfig::default(), &req).expect("simulation");
        let last = result.trace.last().expect("trace");
        assert_eq!(last.time_left_ms, 20 * 60 * 1000 - 1000);
    }

    #[test]
    fn bad_requests_are_rejected() {
        let config = GameConfig::default();
        let unknown = request("P\n#", vec![press(0, "fly", 1)], 10);
        assert!(run_simulation(&config, &unknown).is_err());

        let broken = request("", Vec::new(), 10);
        assert!(run_simulation(&config, &broken).is_err());

        let orphan = SimulationRequest {
            room: None,
            ..request("P\n#", Vec::new(), 10)
        };
        assert!(run_simulation(&config, &orphan).is_err());
    }
}
