//! Synthetic payload lines
//!
//! The tester drives a LED controller that expects lines of ten
//! zero-padded, three digit decimal fields:
//!
//! ```text
//! EEE-RRR,GGG,BBB,LLL-RRR,GGG,BBB,LLL-TTT
//! ```
//!
//! effect code, primary colour and brightness, secondary colour and
//! brightness, trailing field.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::str::FromStr;

/// Default brightness sent with both colours
pub const DEFAULT_BRIGHTNESS: u8 = 50;

/// Default value of the trailing field
pub const DEFAULT_TRAILER: u8 = 1;

/// Colour channels are drawn from `0..MAX_CHANNEL`
pub const MAX_CHANNEL: u8 = u8::MAX;

/// Lighting effect selector, the first field of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EffectCode {
    /// Effect one
    One = 1,
    /// Effect two
    Two = 2,
}

/// An RGB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
}

impl Rgb {
    /// Create a colour
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// One structured payload line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadLine {
    /// Effect code
    pub effect: u8,
    /// Primary colour
    pub primary: Rgb,
    /// Primary brightness
    pub primary_brightness: u8,
    /// Secondary colour
    pub secondary: Rgb,
    /// Secondary brightness
    pub secondary_brightness: u8,
    /// Trailing field
    pub trailer: u8,
}

impl PayloadLine {
    /// Format the line for the wire (no terminator)
    pub fn format(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PayloadLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:03}-{:03},{:03},{:03},{:03}-{:03},{:03},{:03},{:03}-{:03}",
            self.effect,
            self.primary.r,
            self.primary.g,
            self.primary.b,
            self.primary_brightness,
            self.secondary.r,
            self.secondary.g,
            self.secondary.b,
            self.secondary_brightness,
            self.trailer
        )
    }
}

/// Error returned when a line is not a well-formed payload
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Malformed payload line: {0}")]
pub struct ParsePayloadError(String);

impl FromStr for PayloadLine {
    type Err = ParsePayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let groups: Vec<&str> = s.split('-').collect();
        if groups.len() != 4 {
            return Err(ParsePayloadError(format!(
                "expected 4 dash separated groups, got {}",
                groups.len()
            )));
        }

        let mut fields = Vec::with_capacity(10);
        for (group, expected) in groups.iter().zip([1usize, 4, 4, 1]) {
            let parts: Vec<&str> = group.split(',').collect();
            if parts.len() != expected {
                return Err(ParsePayloadError(format!("bad group '{}'", group)));
            }
            for part in parts {
                if part.len() != 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(ParsePayloadError(format!("bad field '{}'", part)));
                }
                let value: u8 = part
                    .parse()
                    .map_err(|_| ParsePayloadError(format!("field out of range '{}'", part)))?;
                fields.push(value);
            }
        }

        Ok(Self {
            effect: fields[0],
            primary: Rgb::new(fields[1], fields[2], fields[3]),
            primary_brightness: fields[4],
            secondary: Rgb::new(fields[5], fields[6], fields[7]),
            secondary_brightness: fields[8],
            trailer: fields[9],
        })
    }
}

/// Random payload source
///
/// Each tick yields two lines, one per [`EffectCode`], each with fresh
/// primary and secondary colours.
pub struct PayloadGenerator {
    rng: StdRng,
    brightness: u8,
    trailer: u8,
}

impl PayloadGenerator {
    /// Create a generator seeded from the OS
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Create a deterministic generator
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng,
            brightness: DEFAULT_BRIGHTNESS,
            trailer: DEFAULT_TRAILER,
        }
    }

    /// Set the brightness sent with both colours
    pub fn brightness(mut self, brightness: u8) -> Self {
        self.brightness = brightness;
        self
    }

    /// Set the trailing field
    pub fn trailer(mut self, trailer: u8) -> Self {
        self.trailer = trailer;
        self
    }

    /// Draw a random colour; channels are in `0..255`
    pub fn random_color(&mut self) -> Rgb {
        Rgb::new(
            self.rng.gen_range(0..MAX_CHANNEL),
            self.rng.gen_range(0..MAX_CHANNEL),
            self.rng.gen_range(0..MAX_CHANNEL),
        )
    }

    /// Build a line for `effect` with fresh colours
    pub fn next_line(&mut self, effect: EffectCode) -> PayloadLine {
        let primary = self.random_color();
        let secondary = self.random_color();
        PayloadLine {
            effect: effect as u8,
            primary,
            primary_brightness: self.brightness,
            secondary,
            secondary_brightness: self.brightness,
            trailer: self.trailer,
        }
    }

    /// Produce the pair of lines sent on every tick
    pub fn next_pair(&mut self) -> [String; 2] {
        [
            self.next_line(EffectCode::One).format(),
            self.next_line(EffectCode::Two).format(),
        ]
    }
}

impl Default for PayloadGenerator {
    fn default() -> Self {
        Self::new()
    }
}
