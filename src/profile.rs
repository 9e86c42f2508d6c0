use std::collections::HashMap;
use std::path::PathBuf;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::session::GameResult;

pub const XP_BASE: f64 = 2000.0;
pub const XP_MULTIPLIER: f64 = 1.5;
pub const MAX_NICKNAME_LEN: usize = 16;

/// XP needed to go from `level` to `level + 1`.
pub fn xp_threshold(level: u32) -> u64 {
    (XP_BASE * XP_MULTIPLIER.powi(level.saturating_sub(1) as i32)).round() as u64
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub nickname: String,
    pub avatar_id: u32,
    pub games_played: u32,
    pub games_won: u32,
    pub games_lost: u32,
    pub total_score: u64,
    pub total_playtime_ms: u64,
    pub level: u32,
    pub current_xp: u64,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            nickname: String::new(),
            avatar_id: 0,
            games_played: 0,
            games_won: 0,
            games_lost: 0,
            total_score: 0,
            total_playtime_ms: 0,
            level: 1,
            current_xp: 0,
        }
    }
}

impl UserProfile {
    pub fn new(nickname: impl Into<String>, avatar_id: u32) -> Self {
        Self {
            nickname: nickname.into(),
            avatar_id,
            ..Default::default()
        }
    }

    pub fn start_game(&mut self) {
        self.games_played = self.games_played.saturating_add(1);
    }

    /// Books a finished session. Returns the number of levels gained.
    pub fn end_game(&mut self, result: &GameResult) -> u32 {
        if result.won {
            self.games_won = self.games_won.saturating_add(1);
        } else {
            self.games_lost = self.games_lost.saturating_add(1);
        }
        self.total_score = self.total_score.saturating_add(result.score);
        self.total_playtime_ms = self.total_playtime_ms.saturating_add(result.playtime_ms);
        self.add_xp(result.xp)
    }

    pub fn add_xp(&mut self, xp: u64) -> u32 {
        self.level = self.level.max(1);
        self.current_xp = self.current_xp.saturating_add(xp);
        let mut gained = 0;
        loop {
            let threshold = xp_threshold(self.level);
            if self.current_xp < threshold {
                break;
            }
            self.current_xp -= threshold;
            self.level += 1;
            gained += 1;
        }
        gained
    }

    pub fn xp_to_next_level(&self) -> u64 {
        xp_threshold(self.level).saturating_sub(self.current_xp)
    }
}

/// Nicknames double as file names, so they are restricted to a safe alphabet.
pub fn validate_nickname(nickname: &str) -> Result<&str, String> {
    let trimmed = nickname.trim();
    if trimmed.is_empty() {
        return Err("Nickname cannot be empty".to_string());
    }
    if trimmed.chars().count() > MAX_NICKNAME_LEN {
        return Err(format!(
            "Nickname '{trimmed}' is longer than {MAX_NICKNAME_LEN} characters"
        ));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(format!(
            "Nickname '{trimmed}' may only contain letters, digits, '_' and '-'"
        ));
    }
    Ok(trimmed)
}

/// Profile persistence. Keys are nicknames compared case-insensitively; enforcing
/// uniqueness on creation is the caller's job.
pub trait ProfileStore: Send + Sync {
    fn load(&self, nickname: &str) -> Option<UserProfile>;
    fn load_all(&self) -> Vec<UserProfile>;
    fn save(&mut self, profile: &UserProfile) -> Result<(), String>;
    fn delete(&mut self, nickname: &str) -> bool;
}

/// One pretty-printed JSON file per profile.
pub struct JsonProfileStore {
    pub dir: PathBuf,
}

impl JsonProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File for a nickname; names outside the nickname alphabet never reach the disk.
    fn path_for(&self, nickname: &str) -> Result<PathBuf, String> {
        let nickname = validate_nickname(nickname)?;
        Ok(self
            .dir
            .join(format!("{}.json", nickname.to_ascii_lowercase())))
    }

    fn read_file(path: &std::path::Path) -> Result<UserProfile, String> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
        serde_json::from_str(&contents).map_err(|e| format!("{}: {e}", path.display()))
    }
}

impl ProfileStore for JsonProfileStore {
    fn load(&self, nickname: &str) -> Option<UserProfile> {
        let path = match self.path_for(nickname) {
            Ok(path) => path,
            Err(e) => {
                warn!("[Robotower profiles] Refusing to load: {e}");
                return None;
            }
        };
        if !path.exists() {
            return None;
        }
        match Self::read_file(&path) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!("[Robotower profiles] Skipping corrupt profile {e}");
                None
            }
        }
    }

    fn load_all(&self) -> Vec<UserProfile> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(
                        "[Robotower profiles] Cannot list {}: {e}",
                        self.dir.display()
                    );
                }
                return Vec::new();
            }
        };
        let mut profiles = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match Self::read_file(&path) {
                Ok(profile) => profiles.push(profile),
                Err(e) => warn!("[Robotower profiles] Skipping corrupt profile {e}"),
            }
        }
        profiles.sort_by(|a, b| a.nickname.cmp(&b.nickname));
        profiles
    }

    fn save(&mut self, profile: &UserProfile) -> Result<(), String> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| format!("Failed to create {}: {e}", self.dir.display()))?;
        let json = serde_json::to_string_pretty(profile)
            .map_err(|e| format!("Failed to serialize profile: {e}"))?;
        let path = self.path_for(&profile.nickname)?;
        std::fs::write(&path, json).map_err(|e| format!("Failed to write {}: {e}", path.display()))
    }

    fn delete(&mut self, nickname: &str) -> bool {
        match self.path_for(nickname) {
            Ok(path) => std::fs::remove_file(path).is_ok(),
            Err(e) => {
                warn!("[Robotower profiles] Refusing to delete: {e}");
                false
            }
        }
    }
}

#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: HashMap<String, UserProfile>,
}

impl ProfileStore for MemoryProfileStore {
    fn load(&self, nickname: &str) -> Option<UserProfile> {
        self.profiles.get(&nickname.to_ascii_lowercase()).cloned()
    }

    fn load_all(&self) -> Vec<UserProfile> {
        let mut profiles: Vec<UserProfile> = self.profiles.values().cloned().collect();
        profiles.sort_by(|a, b| a.nickname.cmp(&b.nickname));
        profiles
    }

    fn save(&mut self, profile: &UserProfile) -> Result<(), String> {
        self.profiles
            .insert(profile.nickname.to_ascii_lowercase(), profile.clone());
        Ok(())
    }

    fn delete(&mut self, nickname: &str) -> bool {
        self.profiles.remove(&nickname.to_ascii_lowercase()).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(won: bool, score: u64, xp: u64) -> GameResult {
        GameResult {
            won,
            pieces_found: 0,
            seconds_left: 0,
            score,
            xp,
            playtime_ms: 1000,
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "robotower-profiles-{}-{name}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn exact_threshold_levels_up_once() {
        let mut profile = UserProfile::new("ada", 0);
        profile.end_game(&result(false, 0, 2000));
        assert_eq!((profile.level, profile.current_xp), (2, 0));
    }

    #[test]
    fn large_grant_levels_up_repeatedly() {
        let mut profile = UserProfile::new("ada", 0);
        assert_eq!(profile.add_xp(5000), 2);
        assert_eq!((profile.level, profile.current_xp), (3, 0));
        assert_eq!(profile.xp_to_next_level(), 4500);
    }

    #[test]
    fn end_game_books_counters() {
        let mut profile = UserProfile::new("ada", 3);
        profile.start_game();
        profile.end_game(&result(true, 8600, 5300));
        profile.start_game();
        profile.end_game(&result(false, 1500, 750));
        assert_eq!(profile.games_played, 2);
        assert_eq!((profile.games_won, profile.games_lost), (1, 1));
        assert_eq!(profile.total_score, 10_100);
        assert_eq!(profile.total_playtime_ms, 2000);
    }

    #[test]
    fn nickname_rules() {
        assert_eq!(validate_nickname("  Ada_1 "), Ok("Ada_1"));
        assert!(validate_nickname("").is_err());
        assert!(validate_nickname("../etc").is_err());
        assert!(validate_nickname("abcdefghijklmnopq").is_err());
    }

    #[test]
    fn memory_store_is_case_insensitive() {
        let mut store = MemoryProfileStore::default();
        store.save(&UserProfile::new("Ada", 1)).expect("save");
        assert_eq!(store.load("ADA").map(|p| p.avatar_id), Some(1));
        assert!(store.delete("ada"));
        assert!(!store.delete("ada"));
        assert!(store.load_all().is_empty());
    }

    #[test]
    fn json_store_round_trips_and_skips_corrupt_files() {
        let dir = scratch_dir("roundtrip");
        let mut store = JsonProfileStore::new(&dir);
        assert!(store.load_all().is_empty());

        let mut profile = UserProfile::new("Grace", 2);
        profile.add_xp(2500);
        store.save(&profile).expect("save");
        std::fs::write(dir.join("broken.json"), "{ not json").expect("write corrupt file");

        assert_eq!(store.load("grace"), Some(profile.clone()));
        assert_eq!(store.load_all(), vec![profile]);
        assert!(store.delete("GRACE"));
        assert!(store.load("grace").is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn json_store_stays_inside_its_directory() {
        let root = scratch_dir("escape");
        let dir = root.join("profiles");
        std::fs::create_dir_all(&dir).expect("create profiles dir");
        let outside = root.join("victim.json");
        let victim = serde_json::to_string(&UserProfile::new("victim", 0)).expect("serialize");
        std::fs::write(&outside, victim).expect("write outside file");

        let mut store = JsonProfileStore::new(&dir);
        assert!(store.load("../victim").is_none());
        assert!(!store.delete("../victim"));
        assert!(outside.exists());

        let mut sneaky = UserProfile::new("ok", 0);
        sneaky.nickname = "../sneaky".to_string();
        assert!(store.save(&sneaky).is_err());
        assert!(!root.join("sneaky.json").exists());
        let _ = std::fs::remove_dir_all(&root);
    }
}
