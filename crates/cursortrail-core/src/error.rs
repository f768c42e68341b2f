//! Error and warning types for the trail core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while constructing a [`crate::TrailBuffer`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrailError {
    #[error("trail buffer capacity must be at least 1")]
    ZeroCapacity,
    #[error("fade time must be a positive finite number, got {0}")]
    InvalidFadeTime(f32),
    #[error("interpolation interval must be a positive finite number, got {0}")]
    InvalidInterval(f32),
}

/// Errors raised while reading or writing a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse TOML config {path}: {source}")]
    TomlParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize config as TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Errors raised while loading a trail texture.
#[derive(Debug, Error)]
pub enum TextureError {
    #[error("failed to decode texture {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("texture {path} has zero size")]
    Empty { path: PathBuf },
    #[error("texture {0} not found in any search location")]
    NotFound(PathBuf),
}

/// Non-fatal problems found while reading configuration.
///
/// Every warning means the offending value was ignored and the field kept (or
/// was reset to) its default.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigWarning {
    #[error("invalid config line {line}: {text}")]
    MalformedLine { line: usize, text: String },
    #[error("unknown config key '{key}' on line {line}")]
    UnknownKey { key: String, line: usize },
    #[error("failed to parse value '{value}' for '{key}' on line {line}")]
    Unparsable {
        key: String,
        value: String,
        line: usize,
    },
    #[error("{key} {requirement}, got {value}; using default {default}")]
    OutOfRange {
        key: &'static str,
        requirement: &'static str,
        value: String,
        default: String,
    },
}
