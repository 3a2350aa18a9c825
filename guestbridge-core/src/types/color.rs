//! RGBA color record.

use super::vector::SCRATCH_BYTES;
use serde::{Deserialize, Serialize};

/// Encoded size of a color: four `f32` components plus an `i32` profile tag.
pub const COLOR_RECORD_SIZE: usize = 4 * 4 + 4;

/// Color space the components are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum ColorProfile {
    /// Linear components.
    #[default]
    Linear = 0,
    /// sRGB color, linear alpha.
    Srgb = 1,
    /// sRGB color and alpha.
    SrgbAlpha = 2,
}

impl ColorProfile {
    /// Tag written after the components.
    #[must_use]
    pub const fn tag(self) -> i32 {
        self as i32
    }
}

/// An RGBA color with a profile.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Color {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
    /// Alpha.
    pub a: f32,
    /// Profile tag.
    pub profile: ColorProfile,
}

impl Color {
    /// Create a color.
    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32, a: f32, profile: ColorProfile) -> Self {
        Self {
            r,
            g,
            b,
            a,
            profile,
        }
    }

    /// Encode as `r g b a profile`, little endian.
    pub fn encode<'a>(&self, scratch: &'a mut [u8; SCRATCH_BYTES]) -> &'a [u8] {
        for (i, c) in [self.r, self.g, self.b, self.a].iter().enumerate() {
            scratch[i * 4..(i + 1) * 4].copy_from_slice(&c.to_le_bytes());
        }
        scratch[16..20].copy_from_slice(&self.profile.tag().to_le_bytes());
        &scratch[..COLOR_RECORD_SIZE]
    }
}
