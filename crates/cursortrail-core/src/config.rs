//! Trail configuration: defaults, validation, and the two on-disk formats.
//!
//! The plain format is one `key=value` per line with `#` comments and
//! case-insensitive keys. Files ending in `.toml` are read and written with
//! serde instead. Either way, bad values never abort loading: they are
//! reported as [`ConfigWarning`]s and replaced by defaults.

use std::fmt::{self, Write as _};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ConfigError, ConfigWarning};

pub const DEFAULT_SPRITE_SIZE: f32 = 15.0;
pub const DEFAULT_TEXTURE_PATH: &str = "cursortrail.png";
pub const DEFAULT_FADE_TIME: f32 = 1.0;
pub const DEFAULT_FADE_RATE: f32 = 0.05;
/// Sprite size / 2.5.
pub const DEFAULT_SPAWN_FREQUENCY: f32 = 6.0;
pub const DEFAULT_MAX_PARTICLES: u32 = 2048;
pub const MAX_PARTICLES_LIMIT: u32 = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrailConfig {
    /// Edge length of each drawn particle, in pixels.
    pub sprite_size: f32,
    pub texture_path: PathBuf,
    /// Initial life of a particle.
    pub fade_time: f32,
    /// Life lost per frame.
    pub fade_rate: f32,
    /// Interpolation interval in pixels; lower means a denser trail.
    pub spawn_frequency: f32,
    /// Ring buffer capacity.
    pub max_particles: u32,
}

impl Default for TrailConfig {
    fn default() -> Self {
        Self {
            sprite_size: DEFAULT_SPRITE_SIZE,
            texture_path: PathBuf::from(DEFAULT_TEXTURE_PATH),
            fade_time: DEFAULT_FADE_TIME,
            fade_rate: DEFAULT_FADE_RATE,
            spawn_frequency: DEFAULT_SPAWN_FREQUENCY,
            max_particles: DEFAULT_MAX_PARTICLES,
        }
    }
}

/// Settings addressable from a config file, with their accepted spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Setting {
    SpriteSize,
    TexturePath,
    FadeTime,
    FadeRate,
    SpawnFrequency,
    MaxParticles,
}

impl Setting {
    fn from_key(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "spritesize" | "sprite_size" => Some(Self::SpriteSize),
            "texturepath" | "texture_path" | "texture" => Some(Self::TexturePath),
            "fadetime" | "fade_time" => Some(Self::FadeTime),
            "faderate" | "fade_rate" => Some(Self::FadeRate),
            "spawnfrequency" | "spawn_frequency" | "density" => Some(Self::SpawnFrequency),
            "maxparticles" | "max_particles" | "particles" => Some(Self::MaxParticles),
            _ => None,
        }
    }
}

impl TrailConfig {
    /// Parse the plain `key=value` format.
    pub fn parse(text: &str) -> (Self, Vec<ConfigWarning>) {
        let mut config = Self::default();
        let mut warnings = Vec::new();

        for (index, raw_line) in text.lines().enumerate() {
            let line_number = index + 1;
            let line = match raw_line.find('#') {
                Some(comment) => &raw_line[..comment],
                None => raw_line,
            }
            .trim();
            if line.is_empty() {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                warnings.push(ConfigWarning::MalformedLine {
                    line: line_number,
                    text: line.to_string(),
                });
                continue;
            };
            let (key, value) = (key.trim(), value.trim());

            let Some(setting) = Setting::from_key(key) else {
                warnings.push(ConfigWarning::UnknownKey {
                    key: key.to_ascii_lowercase(),
                    line: line_number,
                });
                continue;
            };

            if let Err(warning) = config.apply(setting, value, line_number) {
                warnings.push(warning);
            }
        }

        (config, warnings)
    }

    fn apply(&mut self, setting: Setting, value: &str, line: usize) -> Result<(), ConfigWarning> {
        match setting {
            Setting::SpriteSize => {
                self.sprite_size = parse_value(value, "spriteSize", line)?;
                self.check_sprite_size()
            }
            Setting::TexturePath => {
                let unquoted = value
                    .strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .unwrap_or(value);
                self.texture_path = PathBuf::from(unquoted);
                Ok(())
            }
            Setting::FadeTime => {
                self.fade_time = parse_value(value, "fadeTime", line)?;
                self.check_fade_time()
            }
            Setting::FadeRate => {
                self.fade_rate = parse_value(value, "fadeRate", line)?;
                self.check_fade_rate()
            }
            Setting::SpawnFrequency => {
                self.spawn_frequency = parse_value(value, "spawnFrequency", line)?;
                self.check_spawn_frequency()
            }
            Setting::MaxParticles => {
                let parsed: i64 = parse_value(value, "maxParticles", line)?;
                self.set_max_particles(parsed)
            }
        }
    }

    /// Reset every out-of-range field to its default, reporting each one.
    pub fn validate(&mut self) -> Vec<ConfigWarning> {
        [
            self.check_sprite_size(),
            self.check_fade_time(),
            self.check_fade_rate(),
            self.check_spawn_frequency(),
            self.check_max_particles(i64::from(self.max_particles)),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect()
    }

    fn check_sprite_size(&mut self) -> Result<(), ConfigWarning> {
        check(
            &mut self.sprite_size,
            |v| v.is_finite() && *v > 0.0,
            "spriteSize",
            "must be positive",
            DEFAULT_SPRITE_SIZE,
        )
    }

    fn check_fade_time(&mut self) -> Result<(), ConfigWarning> {
        check(
            &mut self.fade_time,
            |v| v.is_finite() && *v > 0.0,
            "fadeTime",
            "must be positive",
            DEFAULT_FADE_TIME,
        )
    }

    fn check_fade_rate(&mut self) -> Result<(), ConfigWarning> {
        check(
            &mut self.fade_rate,
            |v| *v > 0.0 && *v <= 1.0,
            "fadeRate",
            "must be between 0 and 1",
            DEFAULT_FADE_RATE,
        )
    }

    fn check_spawn_frequency(&mut self) -> Result<(), ConfigWarning> {
        check(
            &mut self.spawn_frequency,
            |v| v.is_finite() && *v > 0.0,
            "spawnFrequency",
            "must be positive",
            DEFAULT_SPAWN_FREQUENCY,
        )
    }

    /// Set the ring capacity from an unchecked count, falling back to the
    /// default when it is out of range.
    pub fn set_max_particles(&mut self, requested: i64) -> Result<(), ConfigWarning> {
        self.max_particles = u32::try_from(requested).unwrap_or(0);
        self.check_max_particles(requested)
    }

    /// `requested` carries the value as written, which may not fit in `u32`.
    fn check_max_particles(&mut self, requested: i64) -> Result<(), ConfigWarning> {
        if (1..=i64::from(MAX_PARTICLES_LIMIT)).contains(&requested) {
            return Ok(());
        }
        self.max_particles = DEFAULT_MAX_PARTICLES;
        Err(ConfigWarning::OutOfRange {
            key: "maxParticles",
            requirement: "must be between 1 and 10000",
            value: requested.to_string(),
            default: DEFAULT_MAX_PARTICLES.to_string(),
        })
    }

    /// Read a config file, choosing the format by extension.
    pub fn load(path: &Path) -> Result<(Self, Vec<ConfigWarning>), ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        if is_toml(path) {
            let mut config: Self = toml::from_str(&text).map_err(|source| ConfigError::TomlParse {
                path: path.to_path_buf(),
                source,
            })?;
            let warnings = config.validate();
            Ok((config, warnings))
        } else {
            Ok(Self::parse(&text))
        }
    }

    /// Load `path`, treating a missing file as "use defaults" and logging every
    /// warning.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok((config, warnings)) => {
                for warning in &warnings {
                    warn!("config {}: {warning}", path.display());
                }
                info!("Configuration loaded from: {}", path.display());
                config
            }
            Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                info!("Config file '{}' not found, using defaults", path.display());
                Self::default()
            }
            Err(err) => {
                warn!("{err}; using defaults");
                Self::default()
            }
        }
    }

    /// Write the config, as TOML for `.toml` paths and as commented
    /// `key=value` lines otherwise.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = if is_toml(path) {
            toml::to_string_pretty(self)?
        } else {
            self.to_key_values()
        };
        fs::write(path, text).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Configuration saved to: {}", path.display());
        Ok(())
    }

    pub fn to_key_values(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = write!(
            out,
            "# Cursor Trail Configuration\n\
             # Edit these values to customize your cursor trail\n\
             \n\
             # Trail appearance\n\
             spriteSize={}     # Size of trail particles (pixels)\n\
             texture={}     # Path to trail texture image\n\
             \n\
             # Trail behavior\n\
             fadeTime={}       # How long particles last (seconds)\n\
             fadeRate={}       # How fast particles fade per frame (0.0-1.0)\n\
             spawnFrequency={}   # Spawn interval - lower = denser trail (pixels)\n\
             maxParticles={}     # Maximum number of particles\n",
            self.sprite_size,
            self.texture_path.display(),
            self.fade_time,
            self.fade_rate,
            self.spawn_frequency,
            self.max_particles,
        );
        out
    }

    /// Multi-line listing for startup logs.
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TrailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sprite Size:      {} pixels", self.sprite_size)?;
        writeln!(f, "Texture Path:     {}", self.texture_path.display())?;
        writeln!(f, "Fade Time:        {} seconds", self.fade_time)?;
        writeln!(f, "Fade Rate:        {} per frame", self.fade_rate)?;
        writeln!(f, "Spawn Frequency:  {} pixels", self.spawn_frequency)?;
        write!(f, "Max Particles:    {}", self.max_particles)
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

fn parse_value<T: FromStr>(value: &str, key: &str, line: usize) -> Result<T, ConfigWarning> {
    value.parse().map_err(|_| ConfigWarning::Unparsable {
        key: key.to_string(),
        value: value.to_string(),
        line,
    })
}

fn check(
    field: &mut f32,
    valid: impl Fn(&f32) -> bool,
    key: &'static str,
    requirement: &'static str,
    default: f32,
) -> Result<(), ConfigWarning> {
    if valid(&*field) {
        return Ok(());
    }
    let rejected = *field;
    *field = default;
    Err(ConfigWarning::OutOfRange {
        key,
        requirement,
        value: rejected.to_string(),
        default: default.to_string(),
    })
}
