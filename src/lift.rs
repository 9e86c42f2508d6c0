use crate::components::Direction;
use crate::physics_core::{tile_coord, Aabb};
use crate::tilemap::{LiftTile, TileKind, Tilemap};

/// Lift and stop positions are whole-pixel multiples; this only absorbs float noise.
const Y_EPSILON: f32 = 0.001;

fn same_y(a: f32, b: f32) -> bool {
    (a - b).abs() < Y_EPSILON
}

/// Pixel Y values where the lift in grid slot `lift_index` may rest, ascending.
///
/// A row is a stop when its tile in the lift column is Empty and either a Platform
/// sits directly left or right of it or it is the bottom row. Stops therefore depend
/// on level authoring: shafts must be Empty with platforms flanking each landing.
pub fn get_lift_stops(tilemap: &Tilemap, lift_index: usize) -> Vec<f32> {
    let Some(lift) = tilemap.lift(lift_index) else {
        return Vec::new();
    };
    let col = lift.cell.col as i32;
    let ts = tilemap.tile_size;
    let last_row = tilemap.rows.saturating_sub(1) as i32;

    let mut stops: Vec<f32> = Vec::new();
    for row in 0..tilemap.rows as i32 {
        if tilemap.kind_at(col, row) != Some(TileKind::Empty) {
            continue;
        }
        let beside_platform = [col - 1, col + 1]
            .iter()
            .any(|&c| tilemap.kind_at(c, row) == Some(TileKind::Platform));
        if beside_platform || row == last_row {
            stops.push(row as f32 * ts);
        }
    }

    let current_row = tile_coord(lift.y, ts);
    if tilemap.kind_at(col, current_row) == Some(TileKind::Lift) {
        push_unique(&mut stops, current_row as f32 * ts);
    }

    let original_row = tile_coord(lift.original_y, ts);
    let original_blocked = tilemap
        .kind_at(col, original_row)
        .map(|kind| kind.is_solid() && kind != TileKind::Lift)
        .unwrap_or(true);
    if !original_blocked {
        push_unique(&mut stops, lift.original_y);
    }

    stops.sort_by(|a, b| a.total_cmp(b));
    stops
}

fn push_unique(stops: &mut Vec<f32>, y: f32) {
    if !stops.iter().any(|&s| same_y(s, y)) {
        stops.push(y);
    }
}

/// Targets the neighbouring stop in `direction`. Returns whether travel started.
///
/// A lift resting off every stop is sent home to `original_y`, as is a lift asked to
/// go past the first or last stop.
pub fn move_lift_to_next_stop(lift: &mut LiftTile, direction: Direction, stops: &[f32]) -> bool {
    if lift.is_moving() {
        return false;
    }
    let target = match stops.iter().position(|&s| same_y(s, lift.y)) {
        None => lift.original_y,
        Some(i) => match direction {
            Direction::Up if i > 0 => stops[i - 1],
            Direction::Down if i + 1 < stops.len() => stops[i + 1],
            Direction::Up | Direction::Down => lift.original_y,
            Direction::Left | Direction::Right => return false,
        },
    };
    if same_y(target, lift.y) {
        return false;
    }
    lift.direction = Some(if target < lift.y {
        Direction::Up
    } else {
        Direction::Down
    });
    lift.target_y = Some(target);
    true
}

/// Advances a moving lift by at most `speed` pixels. Returns the applied delta.
pub fn step_lift(lift: &mut LiftTile, speed: f32) -> f32 {
    let Some(target) = lift.target_y else {
        return 0.0;
    };
    let remaining = target - lift.y;
    let delta = if remaining.abs() <= speed {
        remaining
    } else {
        speed * remaining.signum()
    };
    lift.y += delta;
    if same_y(lift.y, target) {
        lift.y = target;
        lift.target_y = None;
        lift.direction = None;
    }
    delta
}

/// Snaps the lift home and cancels any travel.
pub fn reset_lift(lift: &mut LiftTile) {
    lift.y = lift.original_y;
    lift.target_y = None;
    lift.direction = None;
}

/// The rider stands on the lift and fits inside it horizontally.
pub fn is_on_lift(hitbox: &Aabb, lift: &LiftTile) -> bool {
    let lift_box = lift.hitbox();
    hitbox.probe_below(1.0).intersects(&lift_box)
        && hitbox.min_x >= lift_box.min_x
        && hitbox.max_x <= lift_box.max_x
}
