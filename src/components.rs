use bevy::prelude::*;

/// Movement or probe direction on the tile grid. Screen space: +y points down.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Unit step in tile coordinates (column delta, row delta).
    pub fn step(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::Left | Direction::Right)
    }
}

/// Pixel size of an entity's sprite box plus the offset/size of a hitbox inside it.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct BoxShape {
    pub offset_x: f32,
    pub offset_y: f32,
    pub width: f32,
    pub height: f32,
}

/// Gameplay tuning. All speeds are pixels per tick, all timings milliseconds unless
/// the field name says otherwise.
#[derive(Resource, Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub tile_size: f32,
    pub tick_rate: f32,
    pub gravity: f32,
    pub max_fall_speed: f32,
    pub jump_velocity: f32,
    pub player_speed: f32,
    pub player_grounded_box: BoxShape,
    pub player_airborne_box: BoxShape,
    pub enemy_box: BoxShape,
    pub moving_robot_speed: f32,
    pub lift_speed: f32,
    pub elevator_speed: f32,
    pub elevator_floor_height: f32,
    pub elevator_width: f32,
    pub elevator_control_zone: f32,
    pub floors: u32,
    pub starting_lives: u32,
    pub session_minutes: u32,
    pub pieces_to_win: u32,
    pub search_seconds: f32,
    pub freeze_ms: u64,
    pub notification_ms: u64,
    pub levels_dir: String,
    pub profiles_dir: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tile_size: 32.0,
            tick_rate: 120.0,
            gravity: 0.25,
            max_fall_speed: 8.0,
            jump_velocity: 7.0,
            player_speed: 2.0,
            player_grounded_box: BoxShape {
                offset_x: 8.0,
                offset_y: 4.0,
                width: 16.0,
                height: 60.0,
            },
            player_airborne_box: BoxShape {
                offset_x: 8.0,
                offset_y: 20.0,
                width: 16.0,
                height: 44.0,
            },
            enemy_box: BoxShape {
                offset_x: 6.0,
                offset_y: 8.0,
                width: 20.0,
                height: 56.0,
            },
            moving_robot_speed: 1.0,
            lift_speed: 2.0,
            elevator_speed: 4.0,
            elevator_floor_height: 192.0,
            elevator_width: 640.0,
            elevator_control_zone: 64.0,
            floors: 4,
            starting_lives: 3,
            session_minutes: 20,
            pieces_to_win: 8,
            search_seconds: 3.0,
            freeze_ms: 10_000,
            notification_ms: 2_000,
            levels_dir: "assets/levels".to_string(),
            profiles_dir: "profiles".to_string(),
        }
    }
}

impl GameConfig {
    pub fn session_ms(&self) -> i64 {
        i64::from(self.session_minutes) * 60 * 1000
    }

    /// Search progress gained per held tick, in seconds.
    pub fn search_rate(&self) -> f32 {
        2.0 / self.tick_rate.max(1.0)
    }

    /// Clock time after `ticks` fixed ticks, rounded per tick so it never drifts.
    pub fn ticks_to_ms(&self, ticks: u64) -> u64 {
        (ticks as f64 * 1000.0 / f64::from(self.tick_rate.max(1.0))).round() as u64
    }
}
