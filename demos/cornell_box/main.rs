//! # Cornell Box Demo
//!
//! The reference scene for one-bounce indirect light: a white box with a red and a green
//! wall, lit by a single spot light. Light bouncing off the colored walls tints the floor
//! and the boxes.
//!
//! ## Usage:
//! ```bash
//! cargo run --example cornell_box
//! cargo run --example cornell_box -- demos/cornell_box/config.toml
//! ```
//!
//! ## Controls:
//! - `W` `A` `S` `D` move, hold the right mouse button or `Space` to look around
//! - `G` shows or hides the tunables panel
//! - `Esc` quits

use anyhow::Context;
use bounce::AppConfig;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load_from_file(&path)
            .with_context(|| format!("Failed to load config '{}'", path))?,
        None => {
            log::info!("No config given, using defaults");
            AppConfig::default()
        }
    };

    bounce::run(config)
}
