use crate::components::{BoxShape, Direction, GameConfig};
use crate::physics_core::{can_move_here, Aabb};
use crate::tilemap::Tilemap;

#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
pub enum PlayerState {
    Idle,
    Running,
    Jumping,
    Falling,
    Searching,
}

/// The player's body. `(x, y)` is the top-left of the sprite box; only vertical
/// velocity is integrated, horizontal motion is applied directly each tick.
#[derive(Clone, Debug)]
pub struct Player {
    pub x: f32,
    pub y: f32,
    pub vy: f32,
    pub state: PlayerState,
    pub in_air: bool,
    pub facing_right: bool,
    pub spawn_x: f32,
    pub spawn_y: f32,
    grounded_box: BoxShape,
    airborne_box: BoxShape,
    speed: f32,
    jump_velocity: f32,
}

impl Player {
    pub fn new(spawn_x: f32, spawn_y: f32, config: &GameConfig) -> Self {
        Self {
            x: spawn_x,
            y: spawn_y,
            vy: 0.0,
            state: PlayerState::Idle,
            in_air: false,
            facing_right: true,
            spawn_x,
            spawn_y,
            grounded_box: config.player_grounded_box,
            airborne_box: config.player_airborne_box,
            speed: config.player_speed,
            jump_velocity: config.jump_velocity,
        }
    }

    fn shape(&self) -> BoxShape {
        if self.in_air {
            self.airborne_box
        } else {
            self.grounded_box
        }
    }

    pub fn hitbox(&self) -> Aabb {
        let shape = self.shape();
        Aabb::new(
            self.x + shape.offset_x,
            self.y + shape.offset_y,
            shape.width,
            shape.height,
        )
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Moves to a new spawn point and clears all motion.
    pub fn respawn_at(&mut self, x: f32, y: f32) {
        self.spawn_x = x;
        self.spawn_y = y;
        self.respawn();
    }

    pub fn respawn(&mut self) {
        self.x = self.spawn_x;
        self.y = self.spawn_y;
        self.vy = 0.0;
        self.in_air = false;
        self.state = PlayerState::Idle;
    }

    pub fn place(&mut self, x: f32, y: f32, facing_right: bool) {
        self.x = x;
        self.y = y;
        self.vy = 0.0;
        self.in_air = false;
        self.facing_right = facing_right;
        self.state = PlayerState::Idle;
    }

    /// Starts a jump when grounded. Returns whether the jump happened.
    pub fn jump(&mut self) -> bool {
        if self.in_air {
            return false;
        }
        self.vy = -self.jump_velocity;
        self.in_air = true;
        self.state = PlayerState::Jumping;
        true
    }

    /// Rests the grounded hitbox on `surface_y`.
    pub fn land_on_ground(&mut self, surface_y: f32) {
        self.in_air = false;
        self.vy = 0.0;
        self.y = surface_y - (self.grounded_box.offset_y + self.grounded_box.height);
    }

    /// Puts the current hitbox's top at `ceiling_y`.
    pub fn bump_head(&mut self, ceiling_y: f32) {
        self.vy = 0.0;
        self.y = ceiling_y - self.shape().offset_y;
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.x += dx;
        self.y += dy;
    }

    /// One horizontal step through the tile grid. Turning happens even when blocked.
    pub fn step_horizontal(&mut self, direction: Direction, tilemap: &Tilemap) -> bool {
        let dx = match direction {
            Direction::Left => -self.speed,
            Direction::Right => self.speed,
            Direction::Up | Direction::Down => return false,
        };
        self.facing_right = direction == Direction::Right;
        if !can_move_here(tilemap, &self.hitbox(), self.speed, direction) {
            return false;
        }
        self.x += dx;
        true
    }

    /// Horizontal step with only the screen bounds as walls (elevator cab).
    pub fn step_free(&mut self, direction: Direction) -> bool {
        match direction {
            Direction::Left => self.x -= self.speed,
            Direction::Right => self.x += self.speed,
            Direction::Up | Direction::Down => return false,
        }
        self.facing_right = direction == Direction::Right;
        true
    }

    pub fn refresh_state(&mut self, moved: bool, searching: bool) {
        self.state = if searching {
            PlayerState::Searching
        } else if self.in_air {
            if self.vy < 0.0 {
                PlayerState::Jumping
            } else {
                PlayerState::Falling
            }
        } else if moved {
            PlayerState::Running
        } else {
            PlayerState::Idle
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hitbox_switches_shape_in_air_with_aligned_feet() {
        let config = GameConfig::default();
        let mut player = Player::new(0.0, 0.0, &config);
        let grounded = player.hitbox();
        player.in_air = true;
        let airborne = player.hitbox();
        assert!(airborne.height() < grounded.height());
        assert_eq!(airborne.max_y, grounded.max_y);
    }

    #[test]
    fn jump_only_from_ground() {
        let config = GameConfig::default();
        let mut player = Player::new(0.0, 0.0, &config);
        assert!(player.jump());
        assert_eq!(player.vy, -config.jump_velocity);
        assert_eq!(player.state, PlayerState::Jumping);
        assert!(!player.jump());
    }

    #[test]
    fn walking_is_blocked_by_walls() {
        let config = GameConfig::default();
        let map = Tilemap::from_rows(&["  # ", "  # ", "####"], 32.0);
        // Hitbox right edge flush against the wall column.
        let mut player = Player::new(40.0, 0.0, &config);
        assert_eq!(player.hitbox().max_x, 64.0);
        assert!(!player.step_horizontal(Direction::Right, &map));
        assert_eq!(player.x, 40.0);
        assert!(player.step_horizontal(Direction::Left, &map));
        assert_eq!(player.x, 38.0);
        assert!(!player.facing_right);
    }

    #[test]
    fn state_follows_motion() {
        let config = GameConfig::default();
        let mut player = Player::new(0.0, 0.0, &config);
        player.refresh_state(true, false);
        assert_eq!(player.state, PlayerState::Running);
        player.in_air = true;
        player.vy = 1.0;
        player.refresh_state(true, false);
        assert_eq!(player.state, PlayerState::Falling);
        player.refresh_state(false, true);
        assert_eq!(player.state, PlayerState::Searching);
    }

    #[test]
    fn respawn_clears_motion() {
        let config = GameConfig::default();
        let mut player = Player::new(10.0, 20.0, &config);
        player.translate(50.0, 5.0);
        player.vy = 3.0;
        player.in_air = true;
        player.respawn();
        assert_eq!((player.x, player.y, player.vy), (10.0, 20.0, 0.0));
        assert!(!player.in_air);
    }
}
