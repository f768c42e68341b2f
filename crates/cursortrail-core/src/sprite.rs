//! Trail sprite texture: loaded from disk when possible, generated otherwise.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::TextureError;

/// Premultiplied RGBA texture.
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 4]>,
}

impl Sprite {
    /// Build from straight (non-premultiplied) RGBA pixels, row-major.
    pub fn from_rgba(width: u32, height: u32, rgba: &[[u8; 4]]) -> Option<Self> {
        if width == 0 || height == 0 || rgba.len() != (width * height) as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels: rgba.iter().copied().map(premultiply).collect(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, TextureError> {
        let image = image::open(path)
            .map_err(|source| TextureError::Decode {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgba8();
        let (width, height) = image.dimensions();
        let rgba: Vec<[u8; 4]> = image.pixels().map(|p| p.0).collect();
        Self::from_rgba(width, height, &rgba).ok_or_else(|| TextureError::Empty {
            path: path.to_path_buf(),
        })
    }

    /// White disc, opaque at the center and transparent at the rim.
    pub fn radial_fallback(sprite_size: f32) -> Self {
        let size = sprite_size.round().max(1.0) as u32;
        let radius = size as f32 / 2.0;
        let mut pixels = Vec::with_capacity((size * size) as usize);
        for y in 0..size {
            for x in 0..size {
                let dx = x as f32 + 0.5 - radius;
                let dy = y as f32 + 0.5 - radius;
                let falloff = 1.0 - (dx * dx + dy * dy).sqrt() / radius;
                let a = (falloff.clamp(0.0, 1.0) * 255.0).round() as u8;
                pixels.push([a, a, a, a]);
            }
        }
        Self {
            width: size,
            height: size,
            pixels,
        }
    }

    /// Locations tried for a texture path, in order.
    pub fn search_paths(path: &Path) -> Vec<PathBuf> {
        let mut candidates = vec![path.to_path_buf()];
        if path.is_relative() {
            if let Some(exe_dir) = std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf))
            {
                candidates.push(exe_dir.join(path));
            }
            candidates.push(Path::new("assets").join(path));
        }
        candidates
    }

    /// Load the first readable candidate for `path`.
    pub fn find(path: &Path) -> Result<Self, TextureError> {
        let mut last_error = None;
        for candidate in Self::search_paths(path) {
            if !candidate.is_file() {
                debug!("texture candidate {} does not exist", candidate.display());
                continue;
            }
            match Self::load(&candidate) {
                Ok(sprite) => {
                    info!(
                        "Loaded trail texture {} ({}x{})",
                        candidate.display(),
                        sprite.width,
                        sprite.height
                    );
                    return Ok(sprite);
                }
                Err(err) => {
                    warn!("{err}");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| TextureError::NotFound(path.to_path_buf())))
    }

    /// Like [`Sprite::find`], but never fails: falls back to
    /// [`Sprite::radial_fallback`].
    pub fn resolve(path: &Path, sprite_size: f32) -> Self {
        Self::find(path).unwrap_or_else(|err| {
            warn!("{err}; using generated fallback texture");
            Self::radial_fallback(sprite_size)
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Premultiplied texel; coordinates are clamped to the edge.
    pub fn texel(&self, x: u32, y: u32) -> [u8; 4] {
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        self.pixels[(y * self.width + x) as usize]
    }
}

fn premultiply([r, g, b, a]: [u8; 4]) -> [u8; 4] {
    let scale = |c: u8| ((u16::from(c) * u16::from(a) + 127) / 255) as u8;
    [scale(r), scale(g), scale(b), a]
}
