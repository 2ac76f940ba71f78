//! Configuration
//!
//! Loads configuration from a TOML file at `~/.config/rift/config.toml`,
//! auto-generating the default file on first run, then applies command
//! line overrides on top.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::layout::LayoutParams;
use crate::protocol::types::Modifiers;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub programs: ProgramsConfig,
    pub layout: LayoutConfig,
    pub appearance: AppearanceConfig,
    pub input: InputConfig,
}

/// Programs spawned by binding actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramsConfig {
    pub terminal: String,
    pub launcher: String,
}

impl Default for ProgramsConfig {
    fn default() -> Self {
        Self { terminal: "foot".to_string(), launcher: "fuzzel".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Gap between the layout area and the output edge, in pixels.
    pub outer_gap: u32,
    /// Gap between adjacent windows, in pixels.
    pub inner_gap: u32,
    pub master_ratio: f64,
    pub master_count: u32,
    /// Tab bar height for the tabbed layout.
    pub tab_height: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self { outer_gap: 4, inner_gap: 4, master_ratio: 0.5, master_count: 1, tab_height: 24 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppearanceConfig {
    pub border_width: u32,
    /// Colors as 0xRRGGBB.
    pub border_color: u32,
    pub focused_border_color: u32,
    pub urgent_border_color: u32,
    /// Tab bar colors.
    pub bar_background: u32,
    pub bar_focused: u32,
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            border_width: 2,
            border_color: 0x4c4c4c,
            focused_border_color: 0x5294e2,
            urgent_border_color: 0xbf616a,
            bar_background: 0x2e3440,
            bar_focused: 0x5294e2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Default binding modifier: "shift", "ctrl", "alt" or "super".
    pub modifier: String,
    pub focus_follows_mouse: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { modifier: "super".to_string(), focus_follows_mouse: true }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults when the
    /// file does not exist yet.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            info!("config file not found at {:?}, using defaults", config_path);
            if let Err(e) = Self::save_default(&config_path) {
                warn!("failed to create default config file: {e}");
            }
            return Ok(Self::default());
        }

        let content =
            fs::read_to_string(&config_path).context("failed to read config file")?;
        let config: Config = toml::from_str(&content).context("failed to parse config file")?;
        info!("configuration loaded from {:?}", config_path);
        Ok(config)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("failed to resolve config directory")?
            .join("rift");
        Ok(config_dir.join("config.toml"))
    }

    fn save_default(path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("failed to create config directory")?;
        }
        let toml_string = toml::to_string_pretty(&Self::default())
            .context("failed to serialize default config")?;
        fs::write(path, toml_string).context("failed to write default config file")?;
        info!("created default config file at {:?}", path);
        Ok(())
    }

    /// Apply command line overrides. Accepts the option set documented in
    /// the README; unknown options are an error.
    pub fn apply_args<I: IntoIterator<Item = String>>(&mut self, args: I) -> Result<()> {
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let mut value_for = |name: &str| {
                args.next().with_context(|| format!("{name} requires a value"))
            };
            match arg.as_str() {
                "--terminal" | "-t" => self.programs.terminal = value_for(&arg)?,
                "--launcher" | "-l" => self.programs.launcher = value_for(&arg)?,
                "--outer-gap" => self.layout.outer_gap = parse_px(&arg, &value_for(&arg)?)?,
                "--inner-gap" | "-g" => {
                    self.layout.inner_gap = parse_px(&arg, &value_for(&arg)?)?
                }
                "--border-width" | "-b" => {
                    self.appearance.border_width = parse_px(&arg, &value_for(&arg)?)?
                }
                "--modifier" | "-m" => self.input.modifier = value_for(&arg)?,
                other => bail!("unknown option: {other}"),
            }
        }
        // Validate eagerly so a typo fails at startup, not at bind time.
        self.modifier()?;
        Ok(())
    }

    /// The configured default binding modifier.
    pub fn modifier(&self) -> Result<Modifiers> {
        match self.input.modifier.to_ascii_lowercase().as_str() {
            "shift" => Ok(Modifiers::SHIFT),
            "ctrl" | "control" => Ok(Modifiers::CTRL),
            "alt" | "mod1" => Ok(Modifiers::ALT),
            "super" | "mod4" | "logo" => Ok(Modifiers::SUPER),
            other => bail!("unknown modifier {other:?} (expected shift/ctrl/alt/super)"),
        }
    }

    pub fn layout_params(&self) -> LayoutParams {
        LayoutParams {
            master_count: self.layout.master_count.max(1) as usize,
            master_ratio: self.layout.master_ratio.clamp(0.1, 0.9),
            inner_gap: self.layout.inner_gap as i32,
            tab_height: self.layout.tab_height as i32,
        }
    }
}

fn parse_px(name: &str, value: &str) -> Result<u32> {
    value
        .parse::<u32>()
        .with_context(|| format!("{name} expects a non-negative pixel count, got {value:?}"))
}
