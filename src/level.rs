use std::collections::HashMap;
use std::path::PathBuf;

use bevy::prelude::*;
use rand::Rng;

use crate::ai::Enemy;
use crate::audio::AudioCue;
use crate::components::GameConfig;
use crate::lift::reset_lift;
use crate::state_machine::EnemyKind;
use crate::tilemap::{TileKind, Tilemap};

/// One room: tile grid, entities and the interactable index lists, which are computed
/// once when the level is built.
#[derive(Clone, Debug)]
pub struct Level {
    pub room: u32,
    pub tilemap: Tilemap,
    pub spawn: (f32, f32),
    pub enemies: Vec<Enemy>,
    pub lifts: Vec<usize>,
    pub pcs: Vec<usize>,
    pub furniture: Vec<usize>,
    piece_index: Option<usize>,
}

impl Level {
    /// Builds a level from its text form.
    ///
    /// `P` marks the player spawn and `R`/`M` mark robots; marker cells become Empty.
    /// A marker's cell is the top-left of the entity's sprite box.
    pub fn parse(
        room: u32,
        text: &str,
        config: &GameConfig,
        rng: &mut impl Rng,
        now_ms: u64,
    ) -> Result<Self, String> {
        let lines: Vec<&str> = text.lines().map(|l| l.trim_end_matches('\r')).collect();
        let rows = lines.len();
        let cols = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        if rows == 0 || cols == 0 {
            return Err(format!("Room {room} is empty"));
        }
        let ts = config.tile_size;

        let mut kinds = vec![TileKind::Empty; rows * cols];
        let mut spawn = None;
        let mut enemies = Vec::new();
        for (row, line) in lines.iter().enumerate() {
            for (col, c) in line.chars().enumerate() {
                let (x, y) = (col as f32 * ts, row as f32 * ts);
                if c == 'P' {
                    if spawn.is_some() {
                        warn!("[Robotower level] Room {room}: extra spawn marker at {col},{row}");
                    }
                    spawn = Some((x, y));
                    continue;
                }
                if let Some(kind) = EnemyKind::from_marker(c) {
                    enemies.push(Enemy::spawn(kind, x, y, config, now_ms));
                    continue;
                }
                kinds[row * cols + col] = match TileKind::from_char(c) {
                    Some(kind) => kind,
                    None => {
                        warn!("[Robotower level] Room {room}: unknown tile '{c}' at {col},{row}");
                        TileKind::Empty
                    }
                };
            }
        }

        let spawn = spawn.unwrap_or_else(|| {
            warn!("[Robotower level] Room {room}: no spawn marker, using origin");
            (0.0, 0.0)
        });

        let tilemap = Tilemap::from_kinds(cols, rows, ts, &kinds);
        let lifts = tilemap.indices_of(TileKind::Lift);
        let pcs = tilemap.indices_of(TileKind::Pc);
        let furniture = tilemap.indices_of(TileKind::Furniture);

        let mut level = Self {
            room,
            tilemap,
            spawn,
            enemies,
            lifts,
            pcs,
            furniture,
            piece_index: None,
        };
        level.hide_piece(rng);
        Ok(level)
    }

    fn hide_piece(&mut self, rng: &mut impl Rng) {
        if self.furniture.is_empty() {
            return;
        }
        let index = self.furniture[rng.gen_range(0..self.furniture.len())];
        if let Some(furniture) = self.tilemap.furniture_mut(index) {
            furniture.has_piece = true;
            self.piece_index = Some(index);
        }
    }

    /// Grid slot of the furniture holding this room's puzzle piece.
    pub fn piece_index(&self) -> Option<usize> {
        self.piece_index
    }

    pub fn reset_lifts(&mut self) {
        for &index in &self.lifts {
            if let Some(lift) = self.tilemap.lift_mut(index) {
                reset_lift(lift);
            }
        }
    }

    /// After a player death: lifts home, robots back to their spawn points.
    pub fn reset(&mut self, now_ms: u64, cues: &mut Vec<AudioCue>) {
        self.reset_lifts();
        for enemy in &mut self.enemies {
            enemy.reset(now_ms, cues);
        }
    }

    /// The room leaves the screen; robots stop their looping effects.
    pub fn suspend(&mut self, cues: &mut Vec<AudioCue>) {
        for enemy in &mut self.enemies {
            enemy.suspend(cues);
        }
    }

    pub fn resume(&mut self, cues: &mut Vec<AudioCue>) {
        for enemy in &mut self.enemies {
            enemy.resume(cues);
        }
    }
}

/// Where level text comes from.
pub trait LevelSource: Send + Sync {
    fn read_level(&self, room: u32) -> Result<String, String>;
}

/// Reads `room<N>.txt` files from a directory.
pub struct LevelDirectory {
    pub dir: PathBuf,
}

impl LevelDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl LevelSource for LevelDirectory {
    fn read_level(&self, room: u32) -> Result<String, String> {
        let path = self.dir.join(format!("room{room}.txt"));
        std::fs::read_to_string(&path).map_err(|e| format!("{}: {e}", path.display()))
    }
}

impl LevelSource for HashMap<u32, String> {
    fn read_level(&self, room: u32) -> Result<String, String> {
        self.get(&room)
            .cloned()
            .ok_or_else(|| format!("No level text for room {room}"))
    }
}

/// Reads and parses a room, logging instead of failing.
pub fn load_level(
    source: &dyn LevelSource,
    room: u32,
    config: &GameConfig,
    rng: &mut impl Rng,
    now_ms: u64,
) -> Option<Level> {
    let text = match source.read_level(room) {
        Ok(text) => text,
        Err(e) => {
            warn!("[Robotower level] Failed to read room {room}: {e}");
            return None;
        }
    };
    match Level::parse(room, &text, config, rng, now_ms) {
        Ok(level) => {
            info!(
                "[Robotower level] Loaded room {room}: {}x{}, {} robots, {} lifts",
                level.tilemap.cols,
                level.tilemap.rows,
                level.enemies.len(),
                level.lifts.len()
            );
            Some(level)
        }
        Err(e) => {
            warn!("[Robotower level] Failed to load room {room}: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn parse(text: &str) -> Result<Level, String> {
        let mut rng = SmallRng::seed_from_u64(7);
        Level::parse(1, text, &GameConfig::default(), &mut rng, 0)
    }

    #[test]
    fn small_room_parses_with_spawn_offset() {
        let level = parse("#P#\n# #\n###").expect("level");
        assert_eq!((level.tilemap.cols, level.tilemap.rows), (3, 3));
        assert_eq!(level.spawn, (32.0, 0.0));
        assert_eq!(level.tilemap.kind_at(0, 0), Some(TileKind::Wall));
        assert_eq!(level.tilemap.kind_at(2, 0), Some(TileKind::Wall));
        assert_eq!(level.tilemap.kind_at(1, 0), Some(TileKind::Empty));
        assert_eq!(level.tilemap.kind_at(1, 1), Some(TileKind::Empty));
    }

    #[test]
    fn markers_become_entities_and_unknown_chars_are_empty() {
        let level = parse("R ?M\n####").expect("level");
        assert_eq!(level.enemies.len(), 2);
        assert_eq!(level.enemies[0].kind, EnemyKind::Standing);
        assert_eq!(level.enemies[1].kind, EnemyKind::Moving);
        assert_eq!((level.enemies[1].x, level.enemies[1].y), (96.0, 0.0));
        assert_eq!(level.tilemap.kind_at(0, 0), Some(TileKind::Empty));
        assert_eq!(level.tilemap.kind_at(2, 0), Some(TileKind::Empty));
        assert_eq!(level.spawn, (0.0, 0.0));
    }

    #[test]
    fn exactly_one_furniture_holds_the_piece() {
        for seed in 0..16 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let level = Level::parse(2, "O O O\n=====", &GameConfig::default(), &mut rng, 0)
                .expect("level");
            let holders: Vec<usize> = level
                .furniture
                .iter()
                .copied()
                .filter(|&i| level.tilemap.furniture(i).is_some_and(|f| f.has_piece))
                .collect();
            assert_eq!(holders.len(), 1);
            assert_eq!(level.piece_index(), Some(holders[0]));
        }
    }

    #[test]
    fn room_without_furniture_has_no_piece() {
        let level = parse("P\n#").expect("level");
        assert!(level.piece_index().is_none());
    }

    #[test]
    fn empty_text_fails_to_load() {
        assert!(parse("").is_err());
        let source: HashMap<u32, String> = HashMap::new();
        let mut rng = SmallRng::seed_from_u64(1);
        assert!(load_level(&source, 3, &GameConfig::default(), &mut rng, 0).is_none());
    }

    #[test]
    fn index_lists_are_derived_once() {
        let level = parse("LTO\n#=#").expect("level");
        assert_eq!(level.lifts, vec![0]);
        assert_eq!(level.pcs, vec![1]);
        assert_eq!(level.furniture, vec![2]);
    }

    #[test]
    fn bundled_rooms_load() {
        let config = GameConfig::default();
        let source = LevelDirectory::new(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/levels"));
        let mut rng = SmallRng::seed_from_u64(1);
        for room in 1..=config.floors * 2 {
            let level = load_level(&source, room, &config, &mut rng, 0).expect("bundled room");
            assert!(level.piece_index().is_some(), "room {room} hides no piece");
            assert_eq!(level.tilemap.width_px(), 640.0);
            let (x, y) = level.spawn;
            assert!(x > 0.0 && y > 0.0, "room {room} spawn at {x},{y}");
            for &lift in &level.lifts {
                assert!(
                    crate::lift::get_lift_stops(&level.tilemap, lift).len() >= 2,
                    "room {room} lift goes nowhere"
                );
            }
        }
    }
}
