use crate::components::Direction;
use crate::player::Player;
use crate::tilemap::{Tile, Tilemap};

/// Pixels of tolerance when deciding an entity touches a screen edge.
pub const EDGE_TOLERANCE: f32 = 1.0;

/// Inset that keeps a sample on a box's right/bottom edge inside the box's own tile.
const SAMPLE_INSET: f32 = 0.01;

/// Axis-aligned box in screen space (+y down).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Aabb {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x + width,
            max_y: y + height,
        }
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    pub fn center_x(&self) -> f32 {
        (self.min_x + self.max_x) * 0.5
    }

    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self {
            min_x: self.min_x + dx,
            min_y: self.min_y + dy,
            max_x: self.max_x + dx,
            max_y: self.max_y + dy,
        }
    }

    /// Strict overlap: boxes that only share an edge do not intersect.
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    /// Strip of `px` pixels directly under the box.
    pub fn probe_below(&self, px: f32) -> Self {
        Self {
            min_x: self.min_x,
            min_y: self.max_y,
            max_x: self.max_x,
            max_y: self.max_y + px,
        }
    }
}

pub fn tile_coord(px: f32, tile_size: f32) -> i32 {
    (px / tile_size.max(0.0001)).floor() as i32
}

/// Outcome of projecting a body one velocity step along Y.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VerticalContact {
    Landed { surface_y: f32 },
    Bumped { ceiling_y: f32 },
    Clear,
}

enum Probe<'a> {
    Tile(&'a Tile),
    /// Left/right of the grid: rooms are open toward the elevator.
    OpenEdge,
    /// Above/below the grid.
    Blocked,
}

fn probe(tilemap: &Tilemap, col: i32, row: i32) -> Probe<'_> {
    if row < 0 || row >= tilemap.rows as i32 {
        return Probe::Blocked;
    }
    match tilemap.get(col, row) {
        Some(tile) => Probe::Tile(tile),
        None => Probe::OpenEdge,
    }
}

fn sample_points(hitbox: &Aabb, direction: Direction) -> [(f32, f32); 6] {
    let left = hitbox.min_x;
    let top = hitbox.min_y;
    let right = hitbox.max_x - SAMPLE_INSET;
    let bottom = hitbox.max_y - SAMPLE_INSET;
    let mid_x = (left + right) * 0.5;
    let mid_y = (top + bottom) * 0.5;
    let (first_mid, second_mid) = if direction.is_horizontal() {
        ((left, mid_y), (right, mid_y))
    } else {
        ((mid_x, top), (mid_x, bottom))
    };
    [
        (left, top),
        (right, top),
        (left, bottom),
        (right, bottom),
        first_mid,
        second_mid,
    ]
}

/// Whether a box may move `speed` pixels in `direction`.
///
/// Each sample point of the box is mapped to its tile; the tile one step further in
/// `direction` blocks the move when it is solid and overlaps the translated box.
pub fn can_move_here(tilemap: &Tilemap, hitbox: &Aabb, speed: f32, direction: Direction) -> bool {
    let (dx, dy) = direction.step();
    let moved = hitbox.translated(dx as f32 * speed, dy as f32 * speed);
    let ts = tilemap.tile_size;
    for (px, py) in sample_points(hitbox, direction) {
        let col = tile_coord(px, ts) + dx;
        let row = tile_coord(py, ts) + dy;
        match probe(tilemap, col, row) {
            Probe::Blocked => return false,
            Probe::OpenEdge => {}
            Probe::Tile(tile) => {
                if tile.is_solid() && moved.intersects(&tile.hitbox()) {
                    return false;
                }
            }
        }
    }
    true
}

/// Row-major scan for the first solid tile hit by the box moved `vy` pixels.
pub fn resolve_vertical(tilemap: &Tilemap, hitbox: &Aabb, vy: f32) -> VerticalContact {
    if vy == 0.0 {
        return VerticalContact::Clear;
    }
    let projected = hitbox.translated(0.0, vy);
    let hit = tilemap
        .iter()
        .filter(|tile| tile.is_solid())
        .map(Tile::hitbox)
        .find(|tile_box| projected.intersects(tile_box));
    match hit {
        Some(tile_box) if vy > 0.0 => VerticalContact::Landed {
            surface_y: tile_box.min_y,
        },
        Some(tile_box) => VerticalContact::Bumped {
            ceiling_y: tile_box.max_y,
        },
        None => VerticalContact::Clear,
    }
}

/// Applies one vertical step to the player, landing or bumping on solid tiles.
pub fn handle_vertical_collisions(tilemap: &Tilemap, player: &mut Player) -> VerticalContact {
    let contact = resolve_vertical(tilemap, &player.hitbox(), player.vy);
    match contact {
        VerticalContact::Landed { surface_y } => player.land_on_ground(surface_y),
        VerticalContact::Bumped { ceiling_y } => player.bump_head(ceiling_y),
        VerticalContact::Clear => {
            if player.vy != 0.0 {
                player.in_air = true;
                player.y += player.vy;
            }
        }
    }
    contact
}

pub fn is_on_ground(tilemap: &Tilemap, hitbox: &Aabb) -> bool {
    let probe = hitbox.probe_below(1.0);
    tilemap
        .iter()
        .any(|tile| tile.is_solid() && probe.intersects(&tile.hitbox()))
}

pub fn apply_gravity(vy: &mut f32, gravity: f32, max_fall_speed: f32) {
    *vy = (*vy + gravity).min(max_fall_speed);
}

/// Side of the logical screen the box is crossing, if any.
pub fn leaving_side(hitbox: &Aabb, screen_width: f32) -> Option<Direction> {
    if hitbox.min_x <= EDGE_TOLERANCE {
        Some(Direction::Left)
    } else if hitbox.max_x >= screen_width - EDGE_TOLERANCE {
        Some(Direction::Right)
    } else {
        None
    }
}

pub fn is_leaving_level(hitbox: &Aabb, tilemap: &Tilemap) -> bool {
    leaving_side(hitbox, tilemap.width_px()).is_some()
}

pub fn is_leaving_elevator(hitbox: &Aabb, elevator_width: f32) -> bool {
    leaving_side(hitbox, elevator_width).is_some()
}
