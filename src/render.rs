use bevy::prelude::*;

use crate::game_runtime::{GameFlowState, GameRuntime};
use crate::physics_core::Aabb;
use crate::tilemap::Tile;
use crate::ui::TerminalOption;

const LEADERBOARD_ROWS: usize = 10;

pub struct RenderPlugin;

impl Plugin for RenderPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_view)
            .add_systems(Update, redraw_scene.run_if(resource_exists::<GameRuntime>));
    }
}

/// Flat-coloured stand-in for everything in the current room or cab.
#[derive(Component)]
struct SceneShape;

#[derive(Component)]
struct HudText;

fn spawn_view(mut commands: Commands) {
    commands.spawn(Camera2d);
    commands.spawn((
        Text::new(""),
        TextFont {
            font_size: 18.0,
            ..default()
        },
        Node {
            position_type: PositionType::Absolute,
            top: Val::Px(8.0),
            left: Val::Px(8.0),
            ..default()
        },
        HudText,
    ));
}

/// Game coordinates are screen space with +y down; the scene is centred on the camera.
struct SceneFrame {
    width: f32,
    height: f32,
}

impl SceneFrame {
    fn place(&self, rect: &Aabb, z: f32) -> Transform {
        Transform::from_xyz(
            rect.min_x + rect.width() / 2.0 - self.width / 2.0,
            self.height / 2.0 - (rect.min_y + rect.height() / 2.0),
            z,
        )
    }
}

fn shape(commands: &mut Commands, frame: &SceneFrame, rect: &Aabb, color: Color, z: f32) {
    if rect.width() <= 0.0 || rect.height() <= 0.0 {
        return;
    }
    commands.spawn((
        Sprite::from_color(color, Vec2::new(rect.width(), rect.height())),
        frame.place(rect, z),
        SceneShape,
    ));
}

fn tile_color(tile: &Tile) -> Option<Color> {
    match tile {
        Tile::Empty(_) => None,
        Tile::Wall(_) => Some(Color::srgb(0.35, 0.35, 0.42)),
        Tile::Platform(_) => Some(Color::srgb(0.55, 0.45, 0.3)),
        Tile::Lift(_) => Some(Color::srgb(0.3, 0.6, 0.85)),
        Tile::Pc(_) => Some(Color::srgb(0.2, 0.8, 0.4)),
        Tile::Furniture(f) if f.vanished => None,
        Tile::Furniture(f) => {
            let glow = (f.search_progress / 3.0).clamp(0.0, 1.0) * 0.4;
            Some(Color::srgb(0.6 + glow, 0.4 + glow, 0.2))
        }
    }
}

/// Rebuilds the scene whenever the runtime's revision moves.
fn redraw_scene(
    mut commands: Commands,
    runtime: Res<GameRuntime>,
    mut drawn: Local<Option<u64>>,
    shapes: Query<Entity, With<SceneShape>>,
    mut hud: Query<&mut Text, With<HudText>>,
) {
    let revision = runtime.revision();
    if *drawn == Some(revision) {
        return;
    }
    *drawn = Some(revision);

    for entity in shapes.iter() {
        commands.entity(entity).despawn();
    }
    if let Some(session) = runtime.session() {
        let player_color = Color::srgb(0.95, 0.85, 0.3);
        if let Some(level) = session.current_level() {
            let frame = SceneFrame {
                width: level.tilemap.width_px(),
                height: level.tilemap.height_px(),
            };
            for tile in level.tilemap.iter() {
                if let Some(color) = tile_color(tile) {
                    shape(&mut commands, &frame, &tile.hitbox(), color, 0.0);
                }
            }
            for enemy in &level.enemies {
                shape(&mut commands, &frame, &enemy.hitbox(), Color::srgb(0.85, 0.2, 0.2), 1.0);
                if enemy.is_attacking() {
                    shape(
                        &mut commands,
                        &frame,
                        &enemy.attack_box,
                        Color::srgba(1.0, 0.9, 0.2, 0.7),
                        1.5,
                    );
                }
            }
            shape(&mut commands, &frame, &session.player.hitbox(), player_color, 2.0);
        } else {
            let config = runtime.config();
            let frame = SceneFrame {
                width: config.elevator_width,
                height: config.elevator_floor_height + config.tile_size,
            };
            let floor = Aabb::new(
                0.0,
                config.elevator_floor_height,
                config.elevator_width,
                config.tile_size,
            );
            shape(&mut commands, &frame, &floor, Color::srgb(0.35, 0.35, 0.42), 0.0);
            let zone = Aabb::new(
                (config.elevator_width - config.elevator_control_zone) / 2.0,
                config.elevator_floor_height - 4.0,
                config.elevator_control_zone,
                4.0,
            );
            shape(&mut commands, &frame, &zone, Color::srgb(0.2, 0.8, 0.4), 0.5);
            shape(&mut commands, &frame, &session.player.hitbox(), player_color, 2.0);
        }
    }

    if let Ok(mut text) = hud.get_single_mut() {
        text.0 = hud_text(&runtime);
    }
}

fn hud_text(runtime: &GameRuntime) -> String {
    let nickname = runtime
        .active_profile()
        .map(|p| p.nickname.as_str())
        .unwrap_or("-");
    let mut lines = Vec::new();
    match runtime.state() {
        GameFlowState::ProfileSelection => {
            lines.push("No profile selected (start with --profile <nickname>)".to_string());
        }
        GameFlowState::Homescreen => {
            if let Some(profile) = runtime.active_profile() {
                lines.push(format!("Welcome, {} (level {})", profile.nickname, profile.level));
            }
            lines.push("Enter: new game   Tab: stats   L: leaderboard".to_string());
        }
        GameFlowState::StatsScreen => {
            if let Some(p) = runtime.active_profile() {
                lines.push(format!("{} - level {}", p.nickname, p.level));
                lines.push(format!(
                    "Played {}  Won {}  Lost {}",
                    p.games_played, p.games_won, p.games_lost
                ));
                lines.push(format!(
                    "Score {}  XP {} ({} to next level)",
                    p.total_score,
                    p.current_xp,
                    p.xp_to_next_level()
                ));
                lines.push(format!("Playtime {}", clock(p.total_playtime_ms as i64)));
            }
            lines.push("Backspace: back".to_string());
        }
        GameFlowState::LeaderboardScreen => {
            lines.push("Leaderboard".to_string());
            for (rank, p) in runtime
                .leaderboard()
                .iter()
                .take(LEADERBOARD_ROWS)
                .enumerate()
            {
                lines.push(format!(
                    "{:>2}. {:<16} {:>8}  lv {}",
                    rank + 1,
                    p.nickname,
                    p.total_score,
                    p.level
                ));
            }
            lines.push("Backspace: back".to_string());
        }
        GameFlowState::GameOver | GameFlowState::VictoryScreen => {
            let title = if runtime.state() == GameFlowState::VictoryScreen {
                "You escaped the tower!"
            } else {
                "Game over"
            };
            lines.push(format!("{title} ({nickname})"));
            if let Some(result) = runtime.last_result() {
                lines.push(format!(
                    "Pieces {}  Seconds left {}  Score {}  XP +{}",
                    result.pieces_found, result.seconds_left, result.score, result.xp
                ));
            }
            lines.push("Enter: continue".to_string());
        }
        GameFlowState::InElevator
        | GameFlowState::Playing
        | GameFlowState::TerminalOpen
        | GameFlowState::Paused => {
            if let Some(session) = runtime.session() {
                let location = match session.current_room {
                    Some(room) => format!("Room {room}"),
                    None => format!("Elevator, floor {}", session.elevator.current_floor),
                };
                lines.push(format!(
                    "{location}   Lives {}   Pieces {}/{}   Time {}",
                    session.lives,
                    session.pieces_found,
                    runtime.config().pieces_to_win,
                    clock(session.time_left_ms)
                ));
                if session.enemies_frozen(runtime.now_ms()) {
                    lines.push("Robots frozen".to_string());
                }
            }
            if runtime.state() == GameFlowState::TerminalOpen {
                lines.push("Security terminal".to_string());
                let selected = runtime.terminal().selected_option();
                for option in TerminalOption::ALL {
                    let cursor = if option == selected { ">" } else { " " };
                    lines.push(format!("{cursor} {}", option.label()));
                }
            }
            if runtime.state() == GameFlowState::Paused {
                lines.push("PAUSED (Esc to resume)".to_string());
            }
        }
    }
    if let Some(popup) = runtime.notifications().visible(runtime.now_ms()) {
        lines.push(popup.text.clone());
    }
    lines.join("\n")
}

fn clock(ms: i64) -> String {
    let seconds = ms.max(0) / 1000;
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
