use std::collections::HashMap;

use bevy::audio::{AudioSource, Volume};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::game_runtime::GameRuntime;

const MAX_AUDIO_EVENTS: usize = 256;

/// Sound ids the simulation emits.
pub mod sounds {
    pub const ROBOT_MOVE: &str = "robot_move";
    pub const ROBOT_ZAP: &str = "robot_zap";
    pub const JUMP: &str = "jump";
    pub const PIECE_FOUND: &str = "piece_found";
    pub const SEARCH_EMPTY: &str = "search_empty";
    pub const LIFE_LOST: &str = "life_lost";
    pub const LIFT_MOVE: &str = "lift_move";
    pub const ELEVATOR_MOVE: &str = "elevator_move";
    pub const TERMINAL: &str = "terminal";
    pub const VICTORY: &str = "victory";
    pub const GAME_OVER: &str = "game_over";

    pub const ALL: [&str; 11] = [
        ROBOT_MOVE,
        ROBOT_ZAP,
        JUMP,
        PIECE_FOUND,
        SEARCH_EMPTY,
        LIFE_LOST,
        LIFT_MOVE,
        ELEVATOR_MOVE,
        TERMINAL,
        VICTORY,
        GAME_OVER,
    ];
}

/// Fire-and-forget request from the simulation. The simulation never waits on audio.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cue", content = "id", rename_all = "snake_case")]
pub enum AudioCue {
    Play(String),
    Loop(String),
    Stop(String),
}

fn default_volume() -> f32 {
    1.0
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SfxDefinition {
    pub path: String,
    #[serde(default = "default_volume")]
    pub volume: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AudioEventLog {
    pub frame: u64,
    pub name: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,
}

/// What the playback side has to do for a cue.
#[derive(Clone, Debug, PartialEq)]
pub enum CueEffect {
    OneShot { path: String, volume: f32 },
    StartLoop { path: String, volume: f32 },
    StopLoop,
    /// The loop is already running for another owner, or nothing is left to stop.
    Unchanged,
}

/// Sound table plus reference-counted loops: several robots patrolling share one
/// `robot_move` voice, which only stops once the last of them stops.
#[derive(Resource)]
pub struct AudioManager {
    pub sounds: HashMap<String, SfxDefinition>,
    pub master_volume: f32,
    pub active_loops: HashMap<String, u32>,
    pub recent_events: Vec<AudioEventLog>,
}

impl Default for AudioManager {
    fn default() -> Self {
        let sounds = sounds::ALL
            .iter()
            .map(|id| {
                (
                    id.to_string(),
                    SfxDefinition {
                        path: format!("audio/{id}.ogg"),
                        volume: 1.0,
                    },
                )
            })
            .collect();
        Self {
            sounds,
            master_volume: 1.0,
            active_loops: HashMap::new(),
            recent_events: Vec::new(),
        }
    }
}

impl AudioManager {
    pub fn is_looping(&self, name: &str) -> bool {
        self.active_loops.get(name).copied().unwrap_or(0) > 0
    }

    pub fn handle_cue(&mut self, cue: &AudioCue, frame: u64) -> Result<CueEffect, String> {
        let (name, action) = match cue {
            AudioCue::Play(name) => (name, "play"),
            AudioCue::Loop(name) => (name, "loop"),
            AudioCue::Stop(name) => (name, "stop"),
        };
        let Some(def) = self.sounds.get(name) else {
            return Err(format!("Unknown sound: {name}"));
        };
        let path = def.path.clone();
        let volume = def.volume * self.master_volume;

        let effect = match cue {
            AudioCue::Play(_) => CueEffect::OneShot { path, volume },
            AudioCue::Loop(_) => {
                let owners = self.active_loops.entry(name.clone()).or_insert(0);
                *owners += 1;
                if *owners == 1 {
                    CueEffect::StartLoop { path, volume }
                } else {
                    CueEffect::Unchanged
                }
            }
            AudioCue::Stop(_) => match self.active_loops.get(name).copied().unwrap_or(0) {
                0 => CueEffect::Unchanged,
                1 => {
                    self.active_loops.remove(name);
                    CueEffect::StopLoop
                }
                owners => {
                    self.active_loops.insert(name.clone(), owners - 1);
                    CueEffect::Unchanged
                }
            },
        };

        self.push_event(AudioEventLog {
            frame,
            name: name.clone(),
            action: action.to_string(),
            volume: match effect {
                CueEffect::OneShot { volume, .. } | CueEffect::StartLoop { volume, .. } => {
                    Some(volume)
                }
                _ => None,
            },
        });
        Ok(effect)
    }

    fn push_event(&mut self, event: AudioEventLog) {
        self.recent_events.push(event);
        if self.recent_events.len() > MAX_AUDIO_EVENTS {
            let excess = self.recent_events.len() - MAX_AUDIO_EVENTS;
            self.recent_events.drain(0..excess);
        }
    }
}

/// Marks the entity playing a looped sound.
#[derive(Component)]
pub struct LoopVoice(pub String);

pub struct AudioPlugin;

impl Plugin for AudioPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(AudioManager::default())
            .add_systems(Update, play_runtime_cues.run_if(resource_exists::<GameRuntime>));
    }
}

fn play_runtime_cues(
    mut commands: Commands,
    mut runtime: ResMut<GameRuntime>,
    mut audio: ResMut<AudioManager>,
    asset_server: Option<Res<AssetServer>>,
    voices: Query<(Entity, &LoopVoice)>,
) {
    let frame = runtime.frame();
    for cue in runtime.drain_audio() {
        let effect = match audio.handle_cue(&cue, frame) {
            Ok(effect) => effect,
            Err(e) => {
                warn!("[Robotower audio] {e}");
                continue;
            }
        };
        match effect {
            CueEffect::OneShot { path, volume } => {
                if let Some(assets) = asset_server.as_ref() {
                    commands.spawn((
                        AudioPlayer::<AudioSource>(assets.load(path)),
                        PlaybackSettings::DESPAWN.with_volume(Volume::new(volume)),
                    ));
                }
            }
            CueEffect::StartLoop { path, volume } => {
                if let Some(assets) = asset_server.as_ref() {
                    let name = match &cue {
                        AudioCue::Loop(name) => name.clone(),
                        _ => continue,
                    };
                    commands.spawn((
                        AudioPlayer::<AudioSource>(assets.load(path)),
                        PlaybackSettings::LOOP.with_volume(Volume::new(volume)),
                        LoopVoice(name),
                    ));
                }
            }
            CueEffect::StopLoop => {
                if let AudioCue::Stop(name) = &cue {
                    for (entity, voice) in voices.iter() {
                        if &voice.0 == name {
                            commands.entity(entity).despawn();
                        }
                    }
                }
            }
            CueEffect::Unchanged => {}
        }
    }
}
