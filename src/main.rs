mod ai;
mod audio;
mod components;
mod elevator;
mod events;
mod game_runtime;
mod input;
mod level;
mod lift;
mod physics_core;
mod player;
mod profile;
mod render;
mod room;
mod session;
mod simulation;
mod state_machine;
mod tilemap;
mod ui;

use bevy::prelude::*;
use components::GameConfig;
use game_runtime::GameRuntime;
use level::LevelDirectory;
use profile::JsonProfileStore;

#[derive(serde::Deserialize, Default)]
struct StartupConfig {
    window_title: Option<String>,
    window_width: Option<f32>,
    window_height: Option<f32>,
    background_color: Option<[f32; 3]>,
    assets_dir: Option<String>,
    #[serde(default)]
    game: GameConfig,
}

fn load_startup_config() -> StartupConfig {
    let path = std::env::var("ROBOTOWER_CONFIG")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "robotower.json".to_string());
    let mut cfg = match std::fs::read_to_string(&path) {
        Ok(contents) => match serde_json::from_str::<StartupConfig>(&contents) {
            Ok(cfg) => {
                println!("[Robotower] Loaded startup config from {}", path);
                cfg
            }
            Err(e) => {
                eprintln!("[Robotower] Failed to parse {}: {}", path, e);
                StartupConfig::default()
            }
        },
        Err(_) => StartupConfig::default(),
    };
    // Env vars override robotower.json values
    if let Some(dir) = std::env::var("ROBOTOWER_LEVELS_DIR").ok().filter(|s| !s.is_empty()) {
        cfg.game.levels_dir = dir;
    }
    if let Some(dir) = std::env::var("ROBOTOWER_PROFILES_DIR").ok().filter(|s| !s.is_empty()) {
        cfg.game.profiles_dir = dir;
    }
    cfg
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn run_simulation_file(config: &GameConfig, path: &str) -> Result<String, String> {
    let contents = std::fs::read_to_string(path).map_err(|e| format!("{path}: {e}"))?;
    let request: simulation::SimulationRequest =
        serde_json::from_str(&contents).map_err(|e| format!("{path}: {e}"))?;
    let result = simulation::run_simulation(config, &request)?;
    serde_json::to_string_pretty(&result).map_err(|e| format!("Failed to serialize result: {e}"))
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let startup_config = load_startup_config();
    let config = startup_config.game.clone();

    if let Some(path) = flag_value(&args, "--simulate") {
        match run_simulation_file(&config, &path) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("[Robotower] Simulation failed: {e}");
                std::process::exit(2);
            }
        }
        return;
    }

    let mut runtime = GameRuntime::new(
        config.clone(),
        Box::new(LevelDirectory::new(&config.levels_dir)),
        Box::new(JsonProfileStore::new(&config.profiles_dir)),
        rand::random(),
    );
    if let Some(nickname) = flag_value(&args, "--delete-profile") {
        if runtime.delete_profile(&nickname) {
            println!("[Robotower] Deleted profile {nickname}");
        } else {
            eprintln!("[Robotower] No profile named {nickname}");
            std::process::exit(1);
        }
        return;
    }
    if args.iter().any(|a| a == "--leaderboard") {
        for (rank, p) in runtime.leaderboard().iter().enumerate() {
            println!("{:>3}. {:<16} {:>8}  lv {}", rank + 1, p.nickname, p.total_score, p.level);
        }
        return;
    }

    let nickname = flag_value(&args, "--profile").unwrap_or_else(|| "player".to_string());
    let selected = runtime
        .select_profile(&nickname)
        .or_else(|_| runtime.create_profile(&nickname, 0));
    match selected {
        Ok(()) => println!("[Robotower] Playing as {nickname}"),
        Err(e) => eprintln!("[Robotower] Could not open profile {nickname}: {e}"),
    }

    let window_title = startup_config
        .window_title
        .unwrap_or_else(|| "Robotower".to_string());
    let window_width = startup_config.window_width.unwrap_or(960.0);
    let window_height = startup_config.window_height.unwrap_or(540.0);
    let assets_dir = std::env::var("ROBOTOWER_ASSETS_DIR")
        .ok()
        .filter(|s| !s.is_empty())
        .or(startup_config.assets_dir)
        .unwrap_or_else(|| "assets".to_string());

    let mut app = App::new();
    app.add_plugins(
        DefaultPlugins
            .set(WindowPlugin {
                primary_window: Some(Window {
                    title: window_title,
                    resolution: (window_width, window_height).into(),
                    present_mode: bevy::window::PresentMode::AutoVsync,
                    ..default()
                }),
                ..default()
            })
            .set(bevy::asset::AssetPlugin {
                file_path: assets_dir,
                ..default()
            }),
    );
    let bg = startup_config.background_color.unwrap_or([0.08, 0.08, 0.12]);
    app.insert_resource(ClearColor(Color::srgb(bg[0], bg[1], bg[2])))
        .insert_resource(Time::<Fixed>::from_hz(f64::from(config.tick_rate)))
        .insert_resource(config)
        .insert_resource(runtime)
        .add_plugins(input::InputPlugin)
        .add_plugins(game_runtime::RuntimePlugin)
        .add_plugins(audio::AudioPlugin)
        .add_plugins(render::RenderPlugin);
    println!("[Robotower] Starting");

    app.run();
}
