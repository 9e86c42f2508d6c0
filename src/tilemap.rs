use crate::components::Direction;
use crate::physics_core::Aabb;

#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
pub enum TileKind {
    Empty,
    Wall,
    Platform,
    Lift,
    Pc,
    Furniture,
}

impl TileKind {
    /// Tile characters of the level format. Entity markers are not tiles.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '#' => Some(TileKind::Wall),
            '=' => Some(TileKind::Platform),
            'L' => Some(TileKind::Lift),
            'T' => Some(TileKind::Pc),
            'O' => Some(TileKind::Furniture),
            ' ' | 'E' => Some(TileKind::Empty),
            _ => None,
        }
    }

    pub fn is_solid(self) -> bool {
        matches!(self, TileKind::Wall | TileKind::Platform | TileKind::Lift)
    }
}

/// Grid slot of a tile. The pixel origin is derived from the slot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cell {
    pub col: usize,
    pub row: usize,
    pub size: f32,
}

impl Cell {
    pub fn x(&self) -> f32 {
        self.col as f32 * self.size
    }

    pub fn y(&self) -> f32 {
        self.row as f32 * self.size
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.x(), self.y(), self.size, self.size)
    }
}

/// Vertically movable platform. It keeps its grid slot while its pixel Y travels.
#[derive(Clone, Debug)]
pub struct LiftTile {
    pub cell: Cell,
    pub y: f32,
    pub original_y: f32,
    pub target_y: Option<f32>,
    pub direction: Option<Direction>,
}

impl LiftTile {
    pub fn new(cell: Cell) -> Self {
        Self {
            cell,
            y: cell.y(),
            original_y: cell.y(),
            target_y: None,
            direction: None,
        }
    }

    pub fn is_moving(&self) -> bool {
        self.target_y.is_some()
    }

    pub fn hitbox(&self) -> Aabb {
        Aabb::new(self.cell.x(), self.y, self.cell.size, self.cell.size / 2.0)
    }
}

#[derive(Clone, Debug)]
pub struct FurnitureTile {
    pub cell: Cell,
    pub has_piece: bool,
    pub search_progress: f32,
    pub vanished: bool,
}

impl FurnitureTile {
    pub fn new(cell: Cell) -> Self {
        Self {
            cell,
            has_piece: false,
            search_progress: 0.0,
            vanished: false,
        }
    }
}

#[derive(Clone, Debug)]
pub enum Tile {
    Empty(Cell),
    Wall(Cell),
    Platform(Cell),
    Lift(LiftTile),
    Pc(Cell),
    Furniture(FurnitureTile),
}

impl Tile {
    pub fn new(kind: TileKind, cell: Cell) -> Self {
        match kind {
            TileKind::Empty => Tile::Empty(cell),
            TileKind::Wall => Tile::Wall(cell),
            TileKind::Platform => Tile::Platform(cell),
            TileKind::Lift => Tile::Lift(LiftTile::new(cell)),
            TileKind::Pc => Tile::Pc(cell),
            TileKind::Furniture => Tile::Furniture(FurnitureTile::new(cell)),
        }
    }

    pub fn kind(&self) -> TileKind {
        match self {
            Tile::Empty(_) => TileKind::Empty,
            Tile::Wall(_) => TileKind::Wall,
            Tile::Platform(_) => TileKind::Platform,
            Tile::Lift(_) => TileKind::Lift,
            Tile::Pc(_) => TileKind::Pc,
            Tile::Furniture(_) => TileKind::Furniture,
        }
    }

    pub fn cell(&self) -> Cell {
        match self {
            Tile::Empty(cell) | Tile::Wall(cell) | Tile::Platform(cell) | Tile::Pc(cell) => *cell,
            Tile::Lift(lift) => lift.cell,
            Tile::Furniture(furniture) => furniture.cell,
        }
    }

    pub fn is_solid(&self) -> bool {
        self.kind().is_solid()
    }

    /// Collision/overlap box. Platforms and lifts are half-height ledges at the top of
    /// their cell; a lift's box follows its current Y.
    pub fn hitbox(&self) -> Aabb {
        match self {
            Tile::Platform(cell) => Aabb::new(cell.x(), cell.y(), cell.size, cell.size / 2.0),
            Tile::Lift(lift) => lift.hitbox(),
            Tile::Empty(cell) | Tile::Wall(cell) | Tile::Pc(cell) => cell.bounds(),
            Tile::Furniture(furniture) => furniture.cell.bounds(),
        }
    }
}

/// Row-major tile grid owned by a level.
#[derive(Clone, Debug)]
pub struct Tilemap {
    pub cols: usize,
    pub rows: usize,
    pub tile_size: f32,
    tiles: Vec<Tile>,
}

impl Tilemap {
    /// Builds a grid from row-major kinds; `kinds.len()` must equal `cols * rows`.
    pub fn from_kinds(cols: usize, rows: usize, tile_size: f32, kinds: &[TileKind]) -> Self {
        let mut tiles = Vec::with_capacity(cols * rows);
        for row in 0..rows {
            for col in 0..cols {
                let kind = kinds.get(row * cols + col).copied().unwrap_or(TileKind::Empty);
                tiles.push(Tile::new(kind, Cell { col, row, size: tile_size }));
            }
        }
        Self {
            cols,
            rows,
            tile_size,
            tiles,
        }
    }

    /// Parses bare tile rows (no entity markers).
    #[cfg(test)]
    pub fn from_rows(rows: &[&str], tile_size: f32) -> Self {
        let cols = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);
        let mut kinds = vec![TileKind::Empty; cols * rows.len()];
        for (row, line) in rows.iter().enumerate() {
            for (col, c) in line.chars().enumerate() {
                kinds[row * cols + col] = TileKind::from_char(c).unwrap_or(TileKind::Empty);
            }
        }
        Self::from_kinds(cols, rows.len(), tile_size, &kinds)
    }

    pub fn width_px(&self) -> f32 {
        self.cols as f32 * self.tile_size
    }

    pub fn height_px(&self) -> f32 {
        self.rows as f32 * self.tile_size
    }

    pub fn index(&self, col: i32, row: i32) -> Option<usize> {
        if col < 0 || row < 0 || col >= self.cols as i32 || row >= self.rows as i32 {
            return None;
        }
        Some(row as usize * self.cols + col as usize)
    }

    pub fn get(&self, col: i32, row: i32) -> Option<&Tile> {
        self.index(col, row).and_then(|i| self.tiles.get(i))
    }

    pub fn kind_at(&self, col: i32, row: i32) -> Option<TileKind> {
        self.get(col, row).map(Tile::kind)
    }

    pub fn tile(&self, index: usize) -> Option<&Tile> {
        self.tiles.get(index)
    }

    /// Tiles in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    pub fn indices_of(&self, kind: TileKind) -> Vec<usize> {
        self.tiles
            .iter()
            .enumerate()
            .filter(|(_, t)| t.kind() == kind)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn lift(&self, index: usize) -> Option<&LiftTile> {
        match self.tiles.get(index) {
            Some(Tile::Lift(lift)) => Some(lift),
            _ => None,
        }
    }

    pub fn lift_mut(&mut self, index: usize) -> Option<&mut LiftTile> {
        match self.tiles.get_mut(index) {
            Some(Tile::Lift(lift)) => Some(lift),
            _ => None,
        }
    }

    pub fn furniture(&self, index: usize) -> Option<&FurnitureTile> {
        match self.tiles.get(index) {
            Some(Tile::Furniture(furniture)) => Some(furniture),
            _ => None,
        }
    }

    pub fn furniture_mut(&mut self, index: usize) -> Option<&mut FurnitureTile> {
        match self.tiles.get_mut(index) {
            Some(Tile::Furniture(furniture)) => Some(furniture),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ragged_rows_are_padded_with_empty() {
        let map = Tilemap::from_rows(&["#", "#=L", "TO"], 32.0);
        assert_eq!(map.cols, 3);
        assert_eq!(map.rows, 3);
        assert_eq!(map.kind_at(1, 0), Some(TileKind::Empty));
        assert_eq!(map.kind_at(1, 1), Some(TileKind::Platform));
        assert_eq!(map.kind_at(2, 1), Some(TileKind::Lift));
        assert_eq!(map.kind_at(0, 2), Some(TileKind::Pc));
        assert_eq!(map.kind_at(1, 2), Some(TileKind::Furniture));
        assert_eq!(map.kind_at(2, 2), Some(TileKind::Empty));
    }

    #[test]
    fn out_of_range_lookups_return_none() {
        let map = Tilemap::from_rows(&["##", "##"], 32.0);
        assert!(map.get(-1, 0).is_none());
        assert!(map.get(0, 2).is_none());
        assert!(map.get(2, 1).is_none());
    }

    #[test]
    fn hitboxes_follow_tile_type() {
        let map = Tilemap::from_rows(&["#=L"], 32.0);
        let wall = map.get(0, 0).map(Tile::hitbox).expect("wall");
        assert_eq!((wall.min_y, wall.max_y), (0.0, 32.0));
        let platform = map.get(1, 0).map(Tile::hitbox).expect("platform");
        assert_eq!((platform.min_x, platform.max_y), (32.0, 16.0));
        let lift_index = map.index(2, 0).expect("lift slot");
        let lift = map.lift(lift_index).expect("lift");
        assert!(!lift.is_moving());
        assert_eq!(lift.hitbox().min_x, 64.0);
    }

    #[test]
    fn solidity_is_per_kind() {
        assert!(TileKind::Wall.is_solid());
        assert!(TileKind::Platform.is_solid());
        assert!(TileKind::Lift.is_solid());
        assert!(!TileKind::Pc.is_solid());
        assert!(!TileKind::Furniture.is_solid());
        assert!(!TileKind::Empty.is_solid());
    }
}
