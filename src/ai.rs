use crate::audio::{sounds, AudioCue};
use crate::components::{BoxShape, GameConfig};
use crate::physics_core::{tile_coord, Aabb};
use crate::state_machine::{BehaviorContext, EnemyKind, EnemyState};
use crate::tilemap::{TileKind, Tilemap};

/// Vertical offset of the attack box below the top of the hitbox.
const ATTACK_BOX_DROP: f32 = 20.0;

/// A robot. `(x, y)` is the top-left of its sprite box.
#[derive(Clone, Debug)]
pub struct Enemy {
    pub kind: EnemyKind,
    pub x: f32,
    pub y: f32,
    pub facing_right: bool,
    pub state: EnemyState,
    pub behavior: BehaviorContext,
    pub attack_box: Aabb,
    spawn_x: f32,
    spawn_y: f32,
    shape: BoxShape,
    speed: f32,
}

impl Enemy {
    pub fn spawn(kind: EnemyKind, x: f32, y: f32, config: &GameConfig, now_ms: u64) -> Self {
        let speed = match kind {
            EnemyKind::Standing => 0.0,
            EnemyKind::Moving => config.moving_robot_speed,
        };
        let mut enemy = Self {
            kind,
            x,
            y,
            facing_right: true,
            state: kind.initial_state(),
            behavior: BehaviorContext::new(now_ms),
            attack_box: Aabb::new(0.0, 0.0, 0.0, 0.0),
            spawn_x: x,
            spawn_y: y,
            shape: config.enemy_box,
            speed,
        };
        enemy.recompute_attack_box();
        enemy
    }

    pub fn hitbox(&self) -> Aabb {
        Aabb::new(
            self.x + self.shape.offset_x,
            self.y + self.shape.offset_y,
            self.shape.width,
            self.shape.height,
        )
    }

    /// Places the attack box flush against the leading edge of the hitbox.
    fn recompute_attack_box(&mut self) {
        let hitbox = self.hitbox();
        let (width, height) = self.kind.attack_box_size();
        let x = if self.facing_right {
            hitbox.max_x
        } else {
            hitbox.min_x - width
        };
        self.attack_box = Aabb::new(x, hitbox.min_y + ATTACK_BOX_DROP, width, height);
    }

    pub fn is_attacking(&self) -> bool {
        self.state == EnemyState::Attacking
    }

    /// Body contact, or the attack box while an attack is live. A frozen robot's
    /// attack box is inert even when it was frozen mid-attack.
    pub fn touches(&self, player_hitbox: &Aabb, frozen: bool) -> bool {
        self.hitbox().intersects(player_hitbox)
            || (!frozen && self.is_attacking() && self.attack_box.intersects(player_hitbox))
    }

    fn enter(&mut self, state: EnemyState, cues: &mut Vec<AudioCue>) {
        match state {
            EnemyState::Moving => cues.push(AudioCue::Loop(sounds::ROBOT_MOVE.to_string())),
            EnemyState::Attacking => cues.push(AudioCue::Play(sounds::ROBOT_ZAP.to_string())),
            EnemyState::Turning => {
                self.facing_right = !self.facing_right;
                self.recompute_attack_box();
            }
            EnemyState::Idle => {}
        }
    }

    fn exit(&mut self, state: EnemyState, cues: &mut Vec<AudioCue>) {
        if state == EnemyState::Moving {
            cues.push(AudioCue::Stop(sounds::ROBOT_MOVE.to_string()));
        }
    }

    /// The only way `state` changes: exit old, swap, enter new, restart the timer.
    pub fn change_state(
        &mut self,
        next: EnemyState,
        step: u8,
        now_ms: u64,
        cues: &mut Vec<AudioCue>,
    ) {
        let previous = self.state;
        self.exit(previous, cues);
        self.state = next;
        self.behavior.step = step;
        self.enter(next, cues);
        self.behavior.state_start_ms = now_ms;
    }

    pub fn update(
        &mut self,
        now_ms: u64,
        tilemap: &Tilemap,
        player_hitbox: &Aabb,
        cues: &mut Vec<AudioCue>,
    ) {
        if self.state == EnemyState::Moving {
            self.update_moving(now_ms, tilemap, player_hitbox, cues);
            return;
        }
        let Some(duration) = self.kind.durations().for_state(self.state) else {
            return;
        };
        if self.behavior.elapsed(now_ms) >= duration {
            let (next, step) = self.kind.next_state_after(self.state, self.behavior.step);
            self.change_state(next, step, now_ms, cues);
        }
    }

    fn update_moving(
        &mut self,
        now_ms: u64,
        tilemap: &Tilemap,
        player_hitbox: &Aabb,
        cues: &mut Vec<AudioCue>,
    ) {
        if self.attack_box.intersects(player_hitbox) {
            if let Some((next, step)) = self.kind.on_player_spotted() {
                self.change_state(next, step, now_ms, cues);
                return;
            }
        }
        if self.is_at_edge(tilemap) || self.is_facing_wall(tilemap) {
            if let Some((next, step)) = self.kind.on_obstacle() {
                self.change_state(next, step, now_ms, cues);
            }
            return;
        }
        self.x += if self.facing_right {
            self.speed
        } else {
            -self.speed
        };
        self.recompute_attack_box();
    }

    /// Column the leading edge would enter on the next step.
    fn lead_column(&self, tilemap: &Tilemap) -> i32 {
        let hitbox = self.hitbox();
        let reach = self.speed.max(1.0);
        let lead_x = if self.facing_right {
            hitbox.max_x + reach
        } else {
            hitbox.min_x - reach
        };
        tile_coord(lead_x, tilemap.tile_size)
    }

    /// Ground ahead at foot level is missing, a lift, or off the grid.
    pub fn is_at_edge(&self, tilemap: &Tilemap) -> bool {
        let col = self.lead_column(tilemap);
        let foot_row = tile_coord(self.hitbox().max_y, tilemap.tile_size);
        match tilemap.get(col, foot_row) {
            None => true,
            Some(tile) => !tile.is_solid() || tile.kind() == TileKind::Lift,
        }
    }

    pub fn is_facing_wall(&self, tilemap: &Tilemap) -> bool {
        let col = self.lead_column(tilemap);
        let body_row = tile_coord(self.hitbox().max_y - 1.0, tilemap.tile_size);
        tilemap.kind_at(col, body_row) == Some(TileKind::Wall)
    }

    /// Back to the spawn point and initial state, as after a player death.
    pub fn reset(&mut self, now_ms: u64, cues: &mut Vec<AudioCue>) {
        self.exit(self.state, cues);
        self.x = self.spawn_x;
        self.y = self.spawn_y;
        self.facing_right = true;
        self.state = self.kind.initial_state();
        self.behavior = BehaviorContext::new(now_ms);
        self.recompute_attack_box();
        self.resume(cues);
    }

    /// Silences state side effects while the room is off screen.
    pub fn suspend(&mut self, cues: &mut Vec<AudioCue>) {
        self.exit(self.state, cues);
    }

    /// Re-arms the current state's looping effects when the room comes back on screen.
    pub fn resume(&mut self, cues: &mut Vec<AudioCue>) {
        if self.state == EnemyState::Moving {
            cues.push(AudioCue::Loop(sounds::ROBOT_MOVE.to_string()));
        }
    }
}
