#![windows_subsystem = "windows"]
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use transhette_core::model::settings::Settings;
use transhette_core::protocol;

const SETTINGS_ENV: &str = "TRANSHETTE_SETTINGS";

fn load_settings() -> Settings {
    let Some(path) = std::env::var_os(SETTINGS_ENV).map(PathBuf::from) else {
        return Settings::default();
    };
    match Settings::load(&path) {
        Ok(s) => {
            log::info!("settings loaded from {}", path.display());
            s
        }
        Err(e) => {
            log::warn!("{e}; using defaults");
            Settings::default()
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let settings = load_settings();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                log::warn!("stdin read failed: {e}");
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let result = std::panic::catch_unwind(|| protocol::handle(&line, &settings));

        let response = match result {
            Ok(resp) => resp,
            Err(_) => {
                log::error!("request panicked: {line}");
                serde_json::json!({
                    "status": "error",
                    "message": "internal core error"
                })
                .to_string()
            }
        };

        if writeln!(stdout, "{response}").is_err() {
            break;
        }

        let _ = stdout.flush();
    }
}
