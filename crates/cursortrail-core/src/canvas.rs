//! Software compositor shared by the front ends.
//!
//! Pixels are premultiplied ARGB packed as `0xAARRGGBB`, which is the byte
//! order (`B, G, R, A` in memory) both a Win32 32-bit DIB section and a
//! `softbuffer` surface expect.

use glam::Vec2;

use crate::sprite::Sprite;

#[derive(Debug, Clone)]
pub struct Canvas {
    width: usize,
    height: usize,
    /// Screen position of the top-left pixel.
    origin: Vec2,
    pixels: Vec<u32>,
}

impl Canvas {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            origin: Vec2::ZERO,
            pixels: vec![0; width * height],
        }
    }

    pub fn with_origin(mut self, origin: Vec2) -> Self {
        self.origin = origin;
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Pixels as raw bytes, for handing to a DIB section.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        (x < self.width && y < self.height).then(|| self.pixels[y * self.width + x])
    }

    /// Fully transparent.
    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Draw `sprite` scaled to a `size` x `size` square centered on the screen
    /// position `center`, attenuated by `alpha`, source-over.
    pub fn draw_sprite(&mut self, sprite: &Sprite, center: Vec2, size: f32, alpha: f32) {
        let alpha = alpha.clamp(0.0, 1.0);
        if alpha == 0.0 || !(size > 0.0) || !center.is_finite() {
            return;
        }

        let top_left = center - self.origin - Vec2::splat(size / 2.0);
        let x_start = top_left.x.floor().max(0.0) as usize;
        let y_start = top_left.y.floor().max(0.0) as usize;
        let x_end = ((top_left.x + size).ceil().max(0.0) as usize).min(self.width);
        let y_end = ((top_left.y + size).ceil().max(0.0) as usize).min(self.height);

        let (sprite_w, sprite_h) = (sprite.width() as f32, sprite.height() as f32);
        for y in y_start..y_end {
            let v = (y as f32 + 0.5 - top_left.y) / size;
            if !(0.0..1.0).contains(&v) {
                continue;
            }
            let texel_y = (v * sprite_h) as u32;
            let row = y * self.width;
            for x in x_start..x_end {
                let u = (x as f32 + 0.5 - top_left.x) / size;
                if !(0.0..1.0).contains(&u) {
                    continue;
                }
                let texel = sprite.texel((u * sprite_w) as u32, texel_y);
                let dst = &mut self.pixels[row + x];
                *dst = blend_over(*dst, texel, alpha);
            }
        }
    }
}

fn blend_over(dst: u32, [r, g, b, a]: [u8; 4], alpha: f32) -> u32 {
    let src = [a, r, g, b].map(|c| f32::from(c) / 255.0 * alpha);
    let inverse = 1.0 - src[0];
    let mut out = 0u32;
    for (channel, src_value) in src.into_iter().enumerate() {
        let shift = 24 - 8 * channel as u32;
        let dst_value = ((dst >> shift) & 0xFF) as f32 / 255.0;
        let value = ((src_value + dst_value * inverse) * 255.0).round().clamp(0.0, 255.0) as u32;
        out |= value << shift;
    }
    out
}
