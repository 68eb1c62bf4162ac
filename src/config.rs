/*
 *  config.rs
 *
 *  LS020 - S65 panel driver
 *  (c) 2020-26 Stuart Hunter
 *
 *  Layered configuration: defaults, YAML file, command line
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use std::{fs, path::{Path, PathBuf}};
use thiserror::Error;

use crate::display::buffers::DEFAULT_PARTIAL_CEILING_PCT;
use crate::display::drivers::ls020::{DamageStrategy, EngineSettings};
use crate::display::orientation::Orientation;
use crate::pacer::DEFAULT_FPS;
use crate::patterns::Program;

pub const DEFAULT_SPI_BUS: &str = "/dev/spidev0.0";
pub const DEFAULT_SPI_SPEED_HZ: u32 = 30_000_000;
pub const DEFAULT_DC_PIN: u32 = 24;
pub const DEFAULT_RST_PIN: u32 = 25;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, Default)]
pub struct Config {
    /// General options
    pub log_level: Option<String>,     // e.g., "info" | "debug"
    /// run against the mock bus instead of spidev
    pub emulated: Option<bool>,
    /// diagnostic program to draw
    pub program: Option<Program>,
    /// panel-specific behavior
    pub display: Option<DisplayConfig>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, Default)]
pub struct DisplayConfig {
    pub rotate_deg: Option<u16>,
    pub fps: Option<u32>,                  // 1..=120, otherwise falls back to 40
    pub partial_update: Option<bool>,
    pub damage: Option<DamageStrategy>,    // shadow-diff | marks
    pub partial_ceiling_pct: Option<u8>,   // share of the frame before a full update
    pub bus: Option<BusConfig>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BusConfig {
    Spi {
        bus: String,        // e.g. "/dev/spidev0.0"
        speed_hz: Option<u32>,
        dc_pin: u32,        // sysfs GPIO number for command/data select
        rst_pin: u32,       // sysfs GPIO number for reset
    },
}

impl Default for BusConfig {
    fn default() -> Self {
        BusConfig::Spi {
            bus: DEFAULT_SPI_BUS.to_string(),
            speed_hz: Some(DEFAULT_SPI_SPEED_HZ),
            dc_pin: DEFAULT_DC_PIN,
            rst_pin: DEFAULT_RST_PIN,
        }
    }
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "ls020", version, about = "LS020 (Siemens S65) SPI panel driver", disable_help_flag = false)]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, short = 'c', value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    /// Enable debug log level
    #[arg(long, short = 'v', alias = "verbose", action = ArgAction::SetTrue)]
    pub debug: bool,
    /// Use the mock bus instead of real hardware
    #[arg(long, action = ArgAction::SetTrue)]
    pub emulated: bool,
    /// Diagnostic program to draw
    #[arg(long, short = 'p', value_enum)]
    pub program: Option<Program>,
    #[arg(long)]
    pub display_rotate_deg: Option<u16>,
    #[arg(long)]
    pub display_fps: Option<u32>,
    #[arg(long, action = ArgAction::Set)]
    pub display_partial_update: Option<bool>,
    #[arg(long)]
    pub display_partial_ceiling_pct: Option<u8>,
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub spi_bus: Option<String>,
    #[arg(long)]
    pub spi_speed_hz: Option<u32>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Public entry point: parse CLI, read YAML, merge, validate.
pub fn load() -> Result<Config, ConfigError> {
    let cli = Cli::parse();
    let cfg = resolve(&cli)?;

    if cli.dump_config {
        // Pretty YAML of effective config (nice for debugging)
        let s = serde_yaml::to_string(&cfg)?;
        println!("{s}");
        std::process::exit(0);
    }

    Ok(cfg)
}

/// Layer defaults, the YAML file and `cli`, then validate
pub fn resolve(cli: &Cli) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli);

    // 4) Validate
    validate(&cfg)?;

    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/ls020/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/ls020/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/ls020.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["ls020.yaml", "config.yaml", "config/ls020.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    parse_yaml(&s)
}

pub fn parse_yaml(s: &str) -> Result<Config, ConfigError> {
    let cfg: Config = serde_yaml::from_str(s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    // top-level
    if src.log_level.is_some()      { dst.log_level = src.log_level; }
    if src.emulated.is_some()       { dst.emulated = src.emulated; }
    if src.program.is_some()        { dst.program = src.program; }
    // display
    match (&mut dst.display, src.display) {
        (None, Some(c)) => dst.display = Some(c),
        (Some(d), Some(s)) => merge_display(d, s),
        _ => {}
    }
}

fn merge_display(dst: &mut DisplayConfig, src: DisplayConfig) {
    if src.rotate_deg.is_some()           { dst.rotate_deg = src.rotate_deg; }
    if src.fps.is_some()                  { dst.fps = src.fps; }
    if src.partial_update.is_some()       { dst.partial_update = src.partial_update; }
    if src.damage.is_some()               { dst.damage = src.damage; }
    if src.partial_ceiling_pct.is_some()  { dst.partial_ceiling_pct = src.partial_ceiling_pct; }
    if src.bus.is_some()                  { dst.bus = src.bus; }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some()       { cfg.log_level = cli.log_level.clone(); }
    if cli.debug                     { cfg.log_level = Some("debug".into()); }
    if cli.emulated                  { cfg.emulated = Some(true); }
    if cli.program.is_some()         { cfg.program = cli.program; }

    let any_case = cli.display_rotate_deg.is_some()
        || cli.display_fps.is_some()
        || cli.display_partial_update.is_some()
        || cli.display_partial_ceiling_pct.is_some()
        || cli.spi_bus.is_some()
        || cli.spi_speed_hz.is_some();

    if any_case && cfg.display.is_none() {
        cfg.display = Some(DisplayConfig::default());
    }
    if let Some(display) = cfg.display.as_mut() {
        if cli.display_rotate_deg.is_some()           { display.rotate_deg = cli.display_rotate_deg; }
        if cli.display_fps.is_some()                  { display.fps = cli.display_fps; }
        if cli.display_partial_update.is_some()       { display.partial_update = cli.display_partial_update; }
        if cli.display_partial_ceiling_pct.is_some()  { display.partial_ceiling_pct = cli.display_partial_ceiling_pct; }

        if cli.spi_bus.is_some() || cli.spi_speed_hz.is_some() {
            let BusConfig::Spi { bus, speed_hz, .. } = display.bus.get_or_insert_with(BusConfig::default);
            if let Some(path) = cli.spi_bus.as_ref() { *bus = path.clone(); }
            if cli.spi_speed_hz.is_some()            { *speed_hz = cli.spi_speed_hz; }
        }
    }
}

/// Put any invariants here (required fields, ranges, etc.)
///
/// fps and the partial ceiling are not checked: out-of-range values are
/// pulled back by the engine with a warning.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(display) = cfg.display.as_ref() {
        if let Some(rot) = display.rotate_deg {
            match rot {
                0 | 90 | 180 | 270 => {},
                _ => return Err(ConfigError::Validation("display rotate_deg must be 0|90|180|270".into()))
            }
        }
        if let Some(BusConfig::Spi { bus, speed_hz, dc_pin, rst_pin }) = display.bus.as_ref() {
            if bus.is_empty() {
                return Err(ConfigError::Validation("spi bus path must not be empty".into()));
            }
            if *speed_hz == Some(0) {
                return Err(ConfigError::Validation("spi speed_hz must be > 0".into()));
            }
            if dc_pin == rst_pin {
                return Err(ConfigError::Validation("spi dc_pin and rst_pin must differ".into()));
            }
        }
    }
    Ok(())
}

impl Config {
    pub fn display(&self) -> DisplayConfig {
        self.display.clone().unwrap_or_default()
    }

    pub fn is_emulated(&self) -> bool {
        self.emulated.unwrap_or(false)
    }

    pub fn program(&self) -> Program {
        self.program.unwrap_or_default()
    }

    pub fn log_filter(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }
}

impl DisplayConfig {
    /// Engine knobs with defaults filled in
    pub fn engine_settings(&self) -> Result<EngineSettings, ConfigError> {
        let orientation = Orientation::from_degrees(self.rotate_deg.unwrap_or(0))
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        Ok(EngineSettings {
            orientation,
            fps: self.fps.unwrap_or(DEFAULT_FPS),
            partial_update: self.partial_update.unwrap_or(true),
            damage: self.damage.unwrap_or_default(),
            partial_ceiling_pct: self.partial_ceiling_pct.unwrap_or(DEFAULT_PARTIAL_CEILING_PCT),
        })
    }

    pub fn bus(&self) -> BusConfig {
        self.bus.clone().unwrap_or_default()
    }
}
