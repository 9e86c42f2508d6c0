use crate::audio::{sounds, AudioCue};
use crate::components::{Direction, GameConfig};
use crate::input::{Action, VirtualInput};
use crate::level::Level;
use crate::lift::{get_lift_stops, is_on_lift, move_lift_to_next_stop, step_lift};
use crate::physics_core::{
    apply_gravity, handle_vertical_collisions, is_leaving_level, is_on_ground, leaving_side,
};
use crate::player::Player;

/// Per-tick inputs to a room step that do not belong to the room itself.
pub struct RoomContext<'a> {
    pub config: &'a GameConfig,
    pub input: &'a VirtualInput,
    pub now_ms: u64,
    pub enemies_frozen: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchOutcome {
    PieceFound,
    Nothing,
}

/// What happened in a room step that the session has to react to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RoomStep {
    /// A robot's body or live attack box touched the player.
    pub hit: bool,
    pub fell: bool,
    pub opened_terminal: bool,
    pub searched: Option<SearchOutcome>,
    pub exit: Option<Direction>,
}

/// One fixed tick of the Playing state.
///
/// Order: robot contact and falling out of the map, terminal, furniture search,
/// gravity and vertical collision, lifts, robots, walking and jumping, leaving.
pub fn step_room(
    level: &mut Level,
    player: &mut Player,
    ctx: &RoomContext,
    cues: &mut Vec<AudioCue>,
) -> RoomStep {
    let mut step = RoomStep::default();
    let input = ctx.input;

    let body = player.hitbox();
    if level.enemies.iter().any(|enemy| enemy.touches(&body, ctx.enemies_frozen)) {
        step.hit = true;
        return step;
    }
    if body.min_y > level.tilemap.height_px() {
        step.fell = true;
        return step;
    }

    if input.just_pressed(Action::Interact) {
        let at_terminal = level.pcs.iter().any(|&index| {
            level
                .tilemap
                .tile(index)
                .is_some_and(|tile| tile.hitbox().intersects(&body))
        });
        if at_terminal {
            step.opened_terminal = true;
            return step;
        }
    }

    let searching = input.pressed(Action::Interact) && !player.in_air;
    step.searched = search_furniture(level, player, ctx, searching, cues);
    let searching = searching && touching_furniture(level, player).is_some();

    if player.in_air || !is_on_ground(&level.tilemap, &player.hitbox()) {
        apply_gravity(&mut player.vy, ctx.config.gravity, ctx.config.max_fall_speed);
    }
    handle_vertical_collisions(&level.tilemap, player);

    step_lifts(level, player, ctx, cues);

    if !ctx.enemies_frozen {
        let body = player.hitbox();
        for enemy in &mut level.enemies {
            enemy.update(ctx.now_ms, &level.tilemap, &body, cues);
        }
    }

    let mut moved = false;
    if !searching {
        let direction = match (input.pressed(Action::Left), input.pressed(Action::Right)) {
            (true, false) => Some(Direction::Left),
            (false, true) => Some(Direction::Right),
            _ => None,
        };
        if let Some(direction) = direction {
            moved = player.step_horizontal(direction, &level.tilemap);
        }
        if input.just_pressed(Action::Jump) && player.jump() {
            cues.push(AudioCue::Play(sounds::JUMP.to_string()));
        }
    }
    player.refresh_state(moved, searching);

    let body = player.hitbox();
    if is_leaving_level(&body, &level.tilemap) {
        step.exit = leaving_side(&body, level.tilemap.width_px());
    }
    step
}

/// First un-vanished furniture, in grid order, that overlaps the player.
fn touching_furniture(level: &Level, player: &Player) -> Option<usize> {
    let body = player.hitbox();
    level.furniture.iter().copied().find(|&index| {
        level
            .tilemap
            .furniture(index)
            .is_some_and(|f| !f.vanished && f.cell.bounds().intersects(&body))
    })
}

/// Holding Interact fills the touched furniture's progress; letting go resets it.
fn search_furniture(
    level: &mut Level,
    player: &Player,
    ctx: &RoomContext,
    searching: bool,
    cues: &mut Vec<AudioCue>,
) -> Option<SearchOutcome> {
    let target = if searching {
        touching_furniture(level, player)
    } else {
        None
    };

    for &index in &level.furniture {
        if Some(index) == target {
            continue;
        }
        if let Some(furniture) = level.tilemap.furniture_mut(index) {
            furniture.search_progress = 0.0;
        }
    }

    let furniture = level.tilemap.furniture_mut(target?)?;
    furniture.search_progress += ctx.config.search_rate();
    if furniture.search_progress < ctx.config.search_seconds {
        return None;
    }
    furniture.vanished = true;
    furniture.search_progress = 0.0;
    if furniture.has_piece {
        furniture.has_piece = false;
        cues.push(AudioCue::Play(sounds::PIECE_FOUND.to_string()));
        Some(SearchOutcome::PieceFound)
    } else {
        cues.push(AudioCue::Play(sounds::SEARCH_EMPTY.to_string()));
        Some(SearchOutcome::Nothing)
    }
}

/// Calls lifts on Up/Down while riding them, then moves every travelling lift and
/// carries its rider along.
fn step_lifts(level: &mut Level, player: &mut Player, ctx: &RoomContext, cues: &mut Vec<AudioCue>) {
    let request = if ctx.input.just_pressed(Action::Up) {
        Some(Direction::Up)
    } else if ctx.input.just_pressed(Action::Down) {
        Some(Direction::Down)
    } else {
        None
    };

    for &index in &level.lifts {
        let riding = !player.in_air
            && level
                .tilemap
                .lift(index)
                .is_some_and(|lift| is_on_lift(&player.hitbox(), lift));

        if let (true, Some(direction)) = (riding, request) {
            let stops = get_lift_stops(&level.tilemap, index);
            if let Some(lift) = level.tilemap.lift_mut(index) {
                if move_lift_to_next_stop(lift, direction, &stops) {
                    cues.push(AudioCue::Play(sounds::LIFT_MOVE.to_string()));
                }
            }
        }

        let Some(lift) = level.tilemap.lift_mut(index) else {
            continue;
        };
        let delta = step_lift(lift, ctx.config.lift_speed);
        if riding && delta != 0.0 {
            player.translate(0.0, delta);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::PlayerState;
    use crate::state_machine::EnemyState;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn level(text: &str) -> Level {
        let mut rng = SmallRng::seed_from_u64(11);
        Level::parse(1, text, &GameConfig::default(), &mut rng, 0).expect("level")
    }

    fn player_at(level: &Level, config: &GameConfig) -> Player {
        Player::new(level.spawn.0, level.spawn.1, config)
    }

    fn step(
        level: &mut Level,
        player: &mut Player,
        config: &GameConfig,
        input: &VirtualInput,
        now_ms: u64,
    ) -> (RoomStep, Vec<AudioCue>) {
        let mut cues = Vec::new();
        let ctx = RoomContext {
            config,
            input,
            now_ms,
            enemies_frozen: false,
        };
        let result = step_room(level, player, &ctx, &mut cues);
        (result, cues)
    }

    #[test]
    fn player_walks_on_floor_and_stops_at_wall() {
        let config = GameConfig::default();
        let mut room = level("#     #\n# P   #\n#     #\n#######");
        let mut player = player_at(&room, &config);
        let right = VirtualInput::holding(&[Action::Right]);
        step(&mut room, &mut player, &config, &right, 0);
        assert_eq!(player.state, PlayerState::Running);
        for tick in 1..200 {
            step(&mut room, &mut player, &config, &right, tick);
        }
        assert!(!player.in_air);
        assert_eq!(player.hitbox().max_x, 192.0);
        // Pushing against the wall is not running.
        assert_eq!(player.state, PlayerState::Idle);
    }

    #[test]
    fn jump_rises_and_lands_back() {
        let config = GameConfig::default();
        let mut room = level("#    #\n#    #\n# P  #\n#    #\n######");
        let mut player = player_at(&room, &config);
        let start_y = player.y;
        let (_, cues) = step(
            &mut room,
            &mut player,
            &config,
            &VirtualInput::tapping(&[Action::Jump]),
            0,
        );
        assert!(cues.contains(&AudioCue::Play(sounds::JUMP.to_string())));
        assert!(player.in_air);
        let idle = VirtualInput::default();
        let mut apex = player.y;
        for tick in 1..200 {
            step(&mut room, &mut player, &config, &idle, tick);
            apex = apex.min(player.y);
        }
        assert!(apex < start_y - 32.0);
        assert!(!player.in_air);
        assert_eq!(player.y, start_y);
    }

    #[test]
    fn robot_contact_is_reported_before_anything_moves() {
        let config = GameConfig::default();
        let mut room = level("     \nPR   \n     \n#####");
        let mut player = player_at(&room, &config);
        player.x = room.enemies[0].x;
        let before = (player.x, player.y);
        let (result, _) = step(
            &mut room,
            &mut player,
            &config,
            &VirtualInput::holding(&[Action::Right]),
            0,
        );
        assert!(result.hit);
        assert_eq!((player.x, player.y), before);
    }

    #[test]
    fn falling_below_the_map_is_reported() {
        let config = GameConfig::default();
        let mut room = level(" P \n   ");
        let mut player = player_at(&room, &config);
        player.y = room.tilemap.height_px() + 1.0;
        let (result, _) = step(&mut room, &mut player, &config, &VirtualInput::default(), 0);
        assert!(result.fell);
    }

    #[test]
    fn interact_at_terminal_opens_it() {
        let config = GameConfig::default();
        let mut room = level("     \n PT  \n     \n#####");
        let mut player = player_at(&room, &config);
        player.x = 48.0;
        let (result, _) = step(
            &mut room,
            &mut player,
            &config,
            &VirtualInput::tapping(&[Action::Interact]),
            0,
        );
        assert!(result.opened_terminal);
    }

    #[test]
    fn holding_interact_searches_for_three_seconds() {
        let config = GameConfig::default();
        let mut room = level("     \n PO  \n     \n#####");
        let mut player = player_at(&room, &config);
        player.x = 48.0;
        let index = room.furniture[0];
        assert_eq!(room.piece_index(), Some(index));
        let hold = VirtualInput::holding(&[Action::Interact]);

        // 3 s at 2 / tick_rate per tick takes 180 ticks at 120 Hz.
        let mut found = None;
        let mut ticks = 0;
        while found.is_none() {
            let (result, _) = step(&mut room, &mut player, &config, &hold, ticks);
            if ticks == 0 {
                assert_eq!(player.state, PlayerState::Searching);
            }
            found = result.searched;
            ticks += 1;
            assert!(ticks < 400);
        }
        assert_eq!(found, Some(SearchOutcome::PieceFound));
        assert!((178..=182).contains(&ticks));
        let furniture = room.tilemap.furniture(index).expect("furniture");
        assert!(furniture.vanished);
        assert!(!furniture.has_piece);

        let (result, _) = step(&mut room, &mut player, &config, &hold, ticks);
        assert_eq!(result.searched, None);
        assert_ne!(player.state, PlayerState::Searching);
    }

    #[test]
    fn releasing_interact_resets_progress() {
        let config = GameConfig::default();
        let mut room = level("     \n PO  \n     \n#####");
        let mut player = player_at(&room, &config);
        player.x = 48.0;
        let index = room.furniture[0];
        let hold = VirtualInput::holding(&[Action::Interact]);
        for tick in 0..50 {
            step(&mut room, &mut player, &config, &hold, tick);
        }
        assert!(room.tilemap.furniture(index).is_some_and(|f| f.search_progress > 0.0));
        step(&mut room, &mut player, &config, &VirtualInput::default(), 50);
        assert_eq!(
            room.tilemap.furniture(index).map(|f| f.search_progress),
            Some(0.0)
        );
    }

    #[test]
    fn overlapping_furniture_searches_only_the_first() {
        let config = GameConfig::default();
        let mut room = level("     \n OO  \n     \n#####");
        let mut player = Player::new(48.0, 32.0, &config);
        let hold = VirtualInput::holding(&[Action::Interact]);
        step(&mut room, &mut player, &config, &hold, 0);
        let progress: Vec<f32> = room
            .furniture
            .iter()
            .filter_map(|&i| room.tilemap.furniture(i).map(|f| f.search_progress))
            .collect();
        assert!(progress[0] > 0.0);
        assert_eq!(progress[1], 0.0);
    }

    #[test]
    fn riding_lift_carries_player_to_next_stop() {
        let config = GameConfig::default();
        // Lift in column 2 rests on row 3; the landing on row 1 is flanked by platforms.
        let mut room = level(
            "#    #\n#= =P#\n#    #\n# L  #\n#    #\n######",
        );
        let lift_index = room.lifts[0];
        let mut player = Player::new(56.0, 32.0, &config);
        // Settle onto the lift.
        for tick in 0..30 {
            step(&mut room, &mut player, &config, &VirtualInput::default(), tick);
        }
        assert!(!player.in_air);
        assert_eq!(player.hitbox().max_y, 96.0);

        step(&mut room, &mut player, &config, &VirtualInput::tapping(&[Action::Up]), 30);
        let lift = room.tilemap.lift(lift_index).expect("lift");
        assert_eq!(lift.target_y, Some(32.0));
        for tick in 31..100 {
            step(&mut room, &mut player, &config, &VirtualInput::default(), tick);
        }
        let lift = room.tilemap.lift(lift_index).expect("lift");
        assert!(!lift.is_moving());
        assert_eq!(lift.y, 32.0);
        assert_eq!(player.hitbox().max_y, 32.0);
    }

    #[test]
    fn frozen_robots_do_not_update() {
        let config = GameConfig::default();
        let mut room = level("P      \n    R  \n       \n#######");
        let mut player = player_at(&room, &config);
        let mut cues = Vec::new();
        let idle = VirtualInput::default();
        let ctx = RoomContext {
            config: &config,
            input: &idle,
            now_ms: 5000,
            enemies_frozen: true,
        };
        step_room(&mut room, &mut player, &ctx, &mut cues);
        assert_eq!(room.enemies[0].state, EnemyState::Idle);
        let ctx = RoomContext {
            enemies_frozen: false,
            ..ctx
        };
        step_room(&mut room, &mut player, &ctx, &mut cues);
        assert_eq!(room.enemies[0].state, EnemyState::Attacking);
    }

    #[test]
    fn robot_frozen_mid_attack_cannot_hit() {
        let config = GameConfig::default();
        let mut room = level("          \nR       P \n          \n##########");
        let mut player = player_at(&room, &config);
        let idle = VirtualInput::default();
        let mut tick = 0;
        while room.enemies[0].state != EnemyState::Attacking {
            step(&mut room, &mut player, &config, &idle, tick);
            tick += 100;
            assert!(tick < 10_000);
        }

        // Stand in the live attack box without touching the robot's body.
        let attack = room.enemies[0].attack_box;
        player.x += attack.max_x - 1.0 - player.hitbox().min_x;
        let body = player.hitbox();
        assert!(attack.intersects(&body));
        assert!(!room.enemies[0].hitbox().intersects(&body));

        let mut cues = Vec::new();
        let frozen = RoomContext {
            config: &config,
            input: &idle,
            now_ms: tick,
            enemies_frozen: true,
        };
        let result = step_room(&mut room, &mut player, &frozen, &mut cues);
        assert!(!result.hit);
        assert_eq!(room.enemies[0].state, EnemyState::Attacking);

        let thawed = RoomContext {
            enemies_frozen: false,
            ..frozen
        };
        let result = step_room(&mut room, &mut player, &thawed, &mut cues);
        assert!(result.hit);
    }

    #[test]
    fn reaching_the_side_reports_an_exit() {
        let config = GameConfig::default();
        let mut room = level("    \nP   \n    \n####");
        let mut player = player_at(&room, &config);
        player.x = -7.5;
        let (result, _) = step(&mut room, &mut player, &config, &VirtualInput::default(), 0);
        assert_eq!(result.exit, Some(Direction::Left));
    }
}
