use anyhow::Context;
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{artwork::DEFAULT_ARTWORK_SIZE, host::Target, source::SessionInfo};

/// Width in pixels of a standard button face, the numerator of the
/// font-size to visible-characters mapping.
pub const BUTTON_PIXEL_WIDTH: u32 = 72;
pub const DEFAULT_REFRESH_MS: u64 = 250;

const REFRESH_RANGE_MS: (u64, u64) = (16, 60_000);
const ARTWORK_RANGE: (u32, u32) = (16, 288);

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub animation: AnimationConfig,
    pub artwork: ArtworkConfig,
    pub display: DisplayConfig,
    pub log: LogConfig,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let mut candidates = Vec::new();

        if let Ok(current_dir) = env::current_dir() {
            push_candidates(&mut candidates, &current_dir);
        }

        if let Ok(exe) = env::current_exe() {
            if let Some(dir) = exe.parent() {
                push_candidates(&mut candidates, dir);
            }
        }

        for path in candidates {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Ok(Config::default())
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&data).with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    pub fn from_toml(data: &str) -> anyhow::Result<Self> {
        let doc: ConfigDocument = toml::from_str(data)?;
        Ok(doc.into())
    }
}

fn push_candidates(candidates: &mut Vec<PathBuf>, dir: &Path) {
    candidates.push(dir.join("config.toml"));
    candidates.push(dir.join("config").join("config.toml"));
    candidates.push(dir.join("config").join("nowplaying-deck.toml"));
}

#[derive(Debug, Clone)]
pub struct AnimationConfig {
    pub default_refresh_ms: u64,
    pub button_pixel_width: u32,
    pub default_font_size: Option<u32>,
    pub target: Target,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            default_refresh_ms: DEFAULT_REFRESH_MS,
            button_pixel_width: BUTTON_PIXEL_WIDTH,
            default_font_size: None,
            target: Target::Both,
        }
    }
}

impl AnimationConfig {
    pub fn default_period(&self) -> Duration {
        Duration::from_millis(
            self.default_refresh_ms
                .clamp(REFRESH_RANGE_MS.0, REFRESH_RANGE_MS.1),
        )
    }

    /// Visible characters for a title rendered at `font_size`.
    ///
    /// Empirical: the deck draws roughly one character per half font-size
    /// pixels across the button face. A font size of 0 means "not reported
    /// yet" and gives width 0; otherwise the divisor never drops below 1.
    pub fn text_width(&self, font_size: u32) -> usize {
        if font_size == 0 {
            return 0;
        }
        let per_char = (font_size / 2).max(1);
        (self.button_pixel_width.max(1) / per_char) as usize
    }

    /// Width new buttons start with before the host reports a font size.
    pub fn initial_text_width(&self) -> usize {
        self.default_font_size
            .map(|size| self.text_width(size))
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct ArtworkConfig {
    pub size: u32,
}

impl Default for ArtworkConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_ARTWORK_SIZE,
        }
    }
}

impl ArtworkConfig {
    pub fn size(&self) -> u32 {
        self.size.clamp(ARTWORK_RANGE.0, ARTWORK_RANGE.1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleFormat {
    #[default]
    Title,
    ArtistTitle,
}

impl TitleFormat {
    pub fn render(self, session: &SessionInfo) -> String {
        let (title, artist) = (&session.title, &session.artist);
        match self {
            TitleFormat::ArtistTitle if !artist.is_empty() && !title.is_empty() => {
                format!("{artist} - {title}")
            }
            _ => title.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DisplayConfig {
    pub title_format: TitleFormat,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    animation: AnimationSection,
    #[serde(default)]
    artwork: ArtworkSection,
    #[serde(default)]
    display: DisplaySection,
    #[serde(default)]
    log: LogSection,
}

impl From<ConfigDocument> for Config {
    fn from(value: ConfigDocument) -> Self {
        let animation = AnimationConfig {
            default_refresh_ms: value
                .animation
                .default_refresh_ms
                .filter(|ms| *ms > 0)
                .unwrap_or(DEFAULT_REFRESH_MS),
            button_pixel_width: value
                .animation
                .button_pixel_width
                .unwrap_or(BUTTON_PIXEL_WIDTH)
                .max(1),
            default_font_size: value.animation.default_font_size,
            target: value.animation.target.unwrap_or_default(),
        };

        Config {
            animation,
            artwork: ArtworkConfig {
                size: value.artwork.size.unwrap_or(DEFAULT_ARTWORK_SIZE),
            },
            display: DisplayConfig {
                title_format: value.display.title_format.unwrap_or_default(),
            },
            log: LogConfig {
                filter: value.log.filter.unwrap_or_else(|| "info".to_string()),
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct AnimationSection {
    default_refresh_ms: Option<u64>,
    button_pixel_width: Option<u32>,
    default_font_size: Option<u32>,
    target: Option<Target>,
}

#[derive(Debug, Default, Deserialize)]
struct ArtworkSection {
    size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct DisplaySection {
    title_format: Option<TitleFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct LogSection {
    filter: Option<String>,
}
