/*
 *  config.rs
 *
 *  SchoolRing - the day at a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Layered configuration: defaults, YAML file, CLI overrides
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

use chrono::{NaiveTime, Weekday};
use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use embedded_graphics::pixelcolor::Rgb888;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}, time::Duration};
use thiserror::Error;

use crate::schedule::parse_hex_color;
use crate::token::TokenSettings;

pub const DEFAULT_API_BASE: &str = "https://api.mymicds.net";

/// Width ratio at which a label gets its left-hand name truncated.
pub const TRUNCATION_WIDTH_RATIO: f32 = 0.7;

/// Characters of the name kept when truncating.
pub const TRUNCATE_CHARS: usize = 9;

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

/// Colours used by the face outside of per-class colours.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Theme {
    pub background: Rgb888,
    pub text: Rgb888,
    pub school_ring: Rgb888,
    pub tap_indicator: Rgb888,
    pub ambient_ring: Rgb888,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Rgb888::new(0x1E, 0x1E, 0x1E),
            text: Rgb888::new(0xFF, 0xFF, 0xFF),
            school_ring: Rgb888::new(0x21, 0x96, 0xF3),
            tap_indicator: Rgb888::new(0x42, 0x42, 0x42),
            // platform LTGRAY
            ambient_ring: Rgb888::new(0xCC, 0xCC, 0xCC),
        }
    }
}

/// Everything the engine needs to know, resolved and validated.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceConfig {
    pub schedule_interval: Duration,
    pub lunch_interval: Duration,
    pub tick_interval: Duration,
    pub school_ring_scale: f32,
    pub class_ring_scale: f32,
    pub tap_indicator_scale: f32,
    pub truncation_width_ratio: f32,
    pub truncate_chars: usize,
    pub default_school_end: NaiveTime,
    pub default_school_start: NaiveTime,
    pub late_start_day: Weekday,
    pub late_school_start: NaiveTime,
    pub ring_stroke_width: u32,
    pub theme: Theme,
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            schedule_interval: Duration::from_secs(60 * 60),
            lunch_interval: Duration::from_secs(6 * 60 * 60),
            tick_interval: Duration::from_millis(1000),
            school_ring_scale: 0.975,
            class_ring_scale: 0.935,
            tap_indicator_scale: 0.5,
            truncation_width_ratio: TRUNCATION_WIDTH_RATIO,
            truncate_chars: TRUNCATE_CHARS,
            default_school_end: hm(15, 15),
            default_school_start: hm(8, 0),
            late_start_day: Weekday::Wed,
            late_school_start: hm(9, 0),
            ring_stroke_width: 8,
            theme: Theme::default(),
        }
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

/// Top-level app configuration as read from YAML.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// e.g. "info" | "debug"
    pub log_level: Option<String>,
    pub api: Option<ApiConfig>,
    pub face: Option<FaceSection>,
    pub theme: Option<ThemeSection>,
    pub token: Option<TokenConfig>,
    pub display: Option<DisplayConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiConfig {
    pub base_url: Option<String>,
    pub connect_timeout_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FaceSection {
    pub schedule_interval_secs: Option<u64>,
    pub lunch_interval_secs: Option<u64>,
    pub tick_interval_ms: Option<u64>,
    pub school_ring_scale: Option<f32>,
    pub class_ring_scale: Option<f32>,
    pub tap_indicator_scale: Option<f32>,
    /// "HH:MM"
    pub default_school_end: Option<String>,
    pub default_school_start: Option<String>,
    pub late_school_start: Option<String>,
    pub ring_stroke_width: Option<u32>,
}

/// Theme colours as `#RRGGBB` strings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ThemeSection {
    pub background: Option<String>,
    pub text: Option<String>,
    pub school_ring: Option<String>,
    pub tap_indicator: Option<String>,
    pub ambient_ring: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TokenConfig {
    pub capability: Option<String>,
    pub path: Option<String>,
    pub key: Option<String>,
    /// companion node id used by the in-process channel
    pub node: Option<String>,
    /// token value the companion starts out holding
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DisplayConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub round: Option<bool>,
    /// write every presented frame to this PPM file
    pub snapshot: Option<PathBuf>,
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "schoolring", about = "SchoolRing school day clock face", disable_help_flag = false)]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    /// Enable debug log level
    #[arg(long, short = 'v', alias = "verbose", action = ArgAction::SetTrue)]
    pub debug: bool,
    /// Schedule service base URL
    #[arg(long)]
    pub api_base: Option<String>,
    /// Bearer token held by the companion
    #[arg(long)]
    pub token: Option<String>,
    #[arg(long)]
    pub display_width: Option<u32>,
    #[arg(long)]
    pub display_height: Option<u32>,
    #[arg(long, action = ArgAction::Set)]
    pub display_round: Option<bool>,
    /// Write each frame to this PPM file
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub snapshot: Option<PathBuf>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Public entry point: parse CLI, read YAML, merge, validate.
pub fn load() -> Result<Config, ConfigError> {
    let cli = Cli::parse();
    let cfg = load_with(&cli)?;

    if cli.dump_config {
        // Pretty YAML of effective config (nice for debugging)
        let s = serde_yaml::to_string(&cfg)?;
        println!("{s}");
        std::process::exit(0);
    }

    Ok(cfg)
}

/// Same as [`load`] with an already parsed command line.
pub fn load_with(cli: &Cli) -> Result<Config, ConfigError> {
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
    if let Some(home) = home_dir() {
        let p = home.join(".config/schoolring/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/schoolring.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["schoolring.yaml", "config.yaml", "config/schoolring.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    if src.log_level.is_some() { dst.log_level = src.log_level; }
    match (&mut dst.api, src.api) {
        (None, Some(s)) => dst.api = Some(s),
        (Some(d), Some(s)) => {
            if s.base_url.is_some()           { d.base_url = s.base_url; }
            if s.connect_timeout_ms.is_some() { d.connect_timeout_ms = s.connect_timeout_ms; }
            if s.timeout_ms.is_some()         { d.timeout_ms = s.timeout_ms; }
        }
        _ => {}
    }
    match (&mut dst.face, src.face) {
        (None, Some(s)) => dst.face = Some(s),
        (Some(d), Some(s)) => merge_face(d, s),
        _ => {}
    }
    match (&mut dst.theme, src.theme) {
        (None, Some(s)) => dst.theme = Some(s),
        (Some(d), Some(s)) => {
            if s.background.is_some()    { d.background = s.background; }
            if s.text.is_some()          { d.text = s.text; }
            if s.school_ring.is_some()   { d.school_ring = s.school_ring; }
            if s.tap_indicator.is_some() { d.tap_indicator = s.tap_indicator; }
            if s.ambient_ring.is_some()  { d.ambient_ring = s.ambient_ring; }
        }
        _ => {}
    }
    match (&mut dst.token, src.token) {
        (None, Some(s)) => dst.token = Some(s),
        (Some(d), Some(s)) => {
            if s.capability.is_some() { d.capability = s.capability; }
            if s.path.is_some()       { d.path = s.path; }
            if s.key.is_some()        { d.key = s.key; }
            if s.node.is_some()       { d.node = s.node; }
            if s.value.is_some()      { d.value = s.value; }
        }
        _ => {}
    }
    match (&mut dst.display, src.display) {
        (None, Some(s)) => dst.display = Some(s),
        (Some(d), Some(s)) => {
            if s.width.is_some()  { d.width = s.width; }
            if s.height.is_some() { d.height = s.height; }
            if s.round.is_some()  { d.round = s.round; }
            if s.snapshot.is_some() { d.snapshot = s.snapshot; }
        }
        _ => {}
    }
}

fn merge_face(dst: &mut FaceSection, src: FaceSection) {
    if src.schedule_interval_secs.is_some() { dst.schedule_interval_secs = src.schedule_interval_secs; }
    if src.lunch_interval_secs.is_some()    { dst.lunch_interval_secs = src.lunch_interval_secs; }
    if src.tick_interval_ms.is_some()       { dst.tick_interval_ms = src.tick_interval_ms; }
    if src.school_ring_scale.is_some()      { dst.school_ring_scale = src.school_ring_scale; }
    if src.class_ring_scale.is_some()       { dst.class_ring_scale = src.class_ring_scale; }
    if src.tap_indicator_scale.is_some()    { dst.tap_indicator_scale = src.tap_indicator_scale; }
    if src.default_school_end.is_some()     { dst.default_school_end = src.default_school_end; }
    if src.default_school_start.is_some()   { dst.default_school_start = src.default_school_start; }
    if src.late_school_start.is_some()      { dst.late_school_start = src.late_school_start; }
    if src.ring_stroke_width.is_some()      { dst.ring_stroke_width = src.ring_stroke_width; }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some() { cfg.log_level = cli.log_level.clone(); }
    if cli.debug { cfg.log_level = Some("debug".to_string()); }

    if let Some(base) = cli.api_base.as_ref() {
        cfg.api.get_or_insert_with(ApiConfig::default).base_url = Some(base.clone());
    }
    if let Some(token) = cli.token.as_ref() {
        cfg.token.get_or_insert_with(TokenConfig::default).value = Some(token.clone());
    }

    let any_display = cli.display_width.is_some()
        || cli.display_height.is_some()
        || cli.display_round.is_some()
        || cli.snapshot.is_some();

    if any_display && cfg.display.is_none() {
        cfg.display = Some(DisplayConfig::default());
    }
    if let Some(display) = cfg.display.as_mut() {
        if cli.display_width.is_some()  { display.width = cli.display_width; }
        if cli.display_height.is_some() { display.height = cli.display_height; }
        if cli.display_round.is_some()  { display.round = cli.display_round; }
        if cli.snapshot.is_some()       { display.snapshot = cli.snapshot.clone(); }
    }
}

/// Put any invariants here (required fields, ranges, etc.)
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(display) = cfg.display.as_ref() {
        if display.width == Some(0) || display.height == Some(0) {
            return Err(ConfigError::Validation("display width/height must be > 0".into()));
        }
    }
    if let Some(url) = cfg.api.as_ref().and_then(|a| a.base_url.as_ref()) {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!("api base_url must be http(s): {url}")));
        }
    }
    // resolving checks the face and theme sections
    cfg.face_config()?;
    Ok(())
}

impl Config {
    /// Resolves the `face` and `theme` sections over the built-in defaults.
    pub fn face_config(&self) -> Result<FaceConfig, ConfigError> {
        let mut face = FaceConfig::default();

        if let Some(s) = self.face.as_ref() {
            if let Some(v) = s.schedule_interval_secs { face.schedule_interval = positive_secs("schedule_interval_secs", v)?; }
            if let Some(v) = s.lunch_interval_secs    { face.lunch_interval = positive_secs("lunch_interval_secs", v)?; }
            if let Some(v) = s.tick_interval_ms {
                if v == 0 {
                    return Err(ConfigError::Validation("face tick_interval_ms must be > 0".into()));
                }
                face.tick_interval = Duration::from_millis(v);
            }
            if let Some(v) = s.school_ring_scale   { face.school_ring_scale = unit_scale("school_ring_scale", v)?; }
            if let Some(v) = s.class_ring_scale    { face.class_ring_scale = unit_scale("class_ring_scale", v)?; }
            if let Some(v) = s.tap_indicator_scale { face.tap_indicator_scale = unit_scale("tap_indicator_scale", v)?; }
            if let Some(v) = s.default_school_end.as_deref()   { face.default_school_end = time_of_day("default_school_end", v)?; }
            if let Some(v) = s.default_school_start.as_deref() { face.default_school_start = time_of_day("default_school_start", v)?; }
            if let Some(v) = s.late_school_start.as_deref()    { face.late_school_start = time_of_day("late_school_start", v)?; }
            if let Some(v) = s.ring_stroke_width { face.ring_stroke_width = v.max(1); }
        }

        if let Some(t) = self.theme.as_ref() {
            let theme = &mut face.theme;
            if let Some(v) = t.background.as_deref()    { theme.background = color("background", v)?; }
            if let Some(v) = t.text.as_deref()          { theme.text = color("text", v)?; }
            if let Some(v) = t.school_ring.as_deref()   { theme.school_ring = color("school_ring", v)?; }
            if let Some(v) = t.tap_indicator.as_deref() { theme.tap_indicator = color("tap_indicator", v)?; }
            if let Some(v) = t.ambient_ring.as_deref()  { theme.ambient_ring = color("ambient_ring", v)?; }
        }

        if face.default_school_start >= face.default_school_end {
            return Err(ConfigError::Validation("default_school_start must precede default_school_end".into()));
        }
        Ok(face)
    }

    pub fn api_base_url(&self) -> String {
        self.api
            .as_ref()
            .and_then(|a| a.base_url.clone())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
    }

    pub fn api_timeouts(&self) -> (Duration, Duration) {
        let api = self.api.clone().unwrap_or_default();
        (
            Duration::from_millis(api.connect_timeout_ms.unwrap_or(2_000)),
            Duration::from_millis(api.timeout_ms.unwrap_or(10_000)),
        )
    }

    pub fn token_settings(&self) -> TokenSettings {
        let mut settings = TokenSettings::default();
        if let Some(t) = self.token.as_ref() {
            if let Some(v) = t.capability.clone() { settings.capability = v; }
            if let Some(v) = t.path.clone()       { settings.path = v; }
            if let Some(v) = t.key.clone()        { settings.key = v; }
        }
        settings
    }

    /// (node id, token) the in-process companion starts with, if any.
    pub fn companion_seed(&self) -> Option<(String, String)> {
        let t = self.token.as_ref()?;
        let value = t.value.clone().filter(|v| !v.is_empty())?;
        Some((t.node.clone().unwrap_or_else(|| "local".to_string()), value))
    }

    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.display.as_ref().and_then(|d| d.snapshot.clone())
    }

    /// (width, height, round) with a 454x454 round panel as the fallback.
    pub fn display_geometry(&self) -> (u32, u32, bool) {
        let d = self.display.clone().unwrap_or_default();
        (d.width.unwrap_or(454), d.height.unwrap_or(454), d.round.unwrap_or(true))
    }
}

fn positive_secs(field: &str, v: u64) -> Result<Duration, ConfigError> {
    if v == 0 {
        return Err(ConfigError::Validation(format!("face {field} must be > 0")));
    }
    Ok(Duration::from_secs(v))
}

fn unit_scale(field: &str, v: f32) -> Result<f32, ConfigError> {
    if !(v > 0.0 && v <= 1.0) {
        return Err(ConfigError::Validation(format!("face {field} must be in (0, 1]")));
    }
    Ok(v)
}

fn time_of_day(field: &str, v: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(v, "%H:%M")
        .map_err(|_| ConfigError::Validation(format!("face {field} must be HH:MM, got '{v}'")))
}

fn color(field: &str, v: &str) -> Result<Rgb888, ConfigError> {
    parse_hex_color(v).map_err(|e| ConfigError::Validation(format!("theme {field}: {e}")))
}
