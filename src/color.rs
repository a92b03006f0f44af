//! Colour helpers: hex parsing, `rgba()` strings, linear gradient assembly
//! and luminance-aware contrast adjustment.
//!
//! Everything here is a pure function over small value types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ColorError;

/// An opaque 24-bit colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// A colour with straight (non-premultiplied) alpha in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb { r: 255, g: 255, b: 255 };
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    pub fn with_alpha(self, a: f32) -> Rgba {
        Rgba {
            r: self.r,
            g: self.g,
            b: self.b,
            a: a.clamp(0.0, 1.0),
        }
    }

    /// Relative luminance in `[0, 1]`.
    pub fn luminance(self) -> f32 {
        (0.2126 * self.r as f32 + 0.7152 * self.g as f32 + 0.0722 * self.b as f32) / 255.0
    }

    pub fn to_hex(self) -> String {
        rgb_to_hex(self.r, self.g, self.b)
    }

    /// Components as `[0, 1]` floats, the form the PDF writer expects.
    pub fn to_unit(self) -> [f32; 3] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        ]
    }
}

impl Rgba {
    pub fn rgb(self) -> Rgb {
        Rgb {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }

    /// Same colour with its alpha multiplied by `factor`.
    pub fn fade(self, factor: f32) -> Rgba {
        Rgba {
            a: (self.a * factor).clamp(0.0, 1.0),
            ..self
        }
    }

    pub fn alpha_u8(self) -> u8 {
        (self.a.clamp(0.0, 1.0) * 255.0).round() as u8
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, round2(self.a))
    }
}

/// Parse `#rgb`, `#rrggbb` (leading `#` optional).
pub fn hex_to_rgb(hex: &str) -> Result<Rgb, ColorError> {
    let digits = hex.trim().trim_start_matches('#');
    let invalid = || ColorError::InvalidHex(hex.to_string());
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let expanded: String = match digits.len() {
        3 => digits.chars().flat_map(|c| [c, c]).collect(),
        6 => digits.to_string(),
        _ => return Err(invalid()),
    };
    let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).map_err(|_| invalid());
    Ok(Rgb {
        r: channel(0)?,
        g: channel(2)?,
        b: channel(4)?,
    })
}

pub fn rgb_to_hex(r: u8, g: u8, b: u8) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// `hex` + alpha → `rgba(r, g, b, a)` string.
pub fn hex_with_alpha(hex: &str, alpha: f32) -> Result<String, ColorError> {
    Ok(rgba(hex, alpha)?.to_string())
}

pub fn rgba(hex: &str, alpha: f32) -> Result<Rgba, ColorError> {
    Ok(hex_to_rgb(hex)?.with_alpha(alpha))
}

/// Accepts hex, `rgb(r, g, b)` and `rgba(r, g, b, a)` strings.
pub fn parse_color(input: &str) -> Result<Rgba, ColorError> {
    let s = input.trim();
    if s.starts_with('#') || s.chars().all(|c| c.is_ascii_hexdigit()) {
        return Ok(hex_to_rgb(s)?.with_alpha(1.0));
    }
    let invalid = || ColorError::InvalidColor(input.to_string());
    let (body, has_alpha) = if let Some(rest) = s.strip_prefix("rgba(") {
        (rest, true)
    } else if let Some(rest) = s.strip_prefix("rgb(") {
        (rest, false)
    } else {
        return Err(invalid());
    };
    let body = body.strip_suffix(')').ok_or_else(invalid)?;
    let parts: Vec<&str> = body.split(',').map(str::trim).collect();
    if parts.len() != if has_alpha { 4 } else { 3 } {
        return Err(invalid());
    }
    let channel = |p: &str| p.parse::<u8>().map_err(|_| invalid());
    let a = if has_alpha {
        parts[3].parse::<f32>().map_err(|_| invalid())?
    } else {
        1.0
    };
    Ok(Rgba {
        r: channel(parts[0])?,
        g: channel(parts[1])?,
        b: channel(parts[2])?,
        a: a.clamp(0.0, 1.0),
    })
}

/// Composite a translucent colour over an opaque backdrop.
pub fn blend_over(top: Rgba, bottom: Rgb) -> Rgb {
    let a = top.a.clamp(0.0, 1.0);
    let mix = |t: u8, b: u8| (t as f32 * a + b as f32 * (1.0 - a)).round().clamp(0.0, 255.0) as u8;
    Rgb {
        r: mix(top.r, bottom.r),
        g: mix(top.g, bottom.g),
        b: mix(top.b, bottom.b),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    /// Position along the gradient axis, `[0, 1]`.
    pub offset: f32,
    pub color: Rgba,
}

/// An ordered linear gradient, angle in CSS degrees (0 = bottom→top,
/// 90 = left→right, 180 = top→bottom).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearGradient {
    pub angle_deg: f32,
    pub stops: Vec<GradientStop>,
}

impl LinearGradient {
    /// CSS form, handy for logging and snapshots.
    pub fn css(&self) -> String {
        let stops: Vec<String> = self
            .stops
            .iter()
            .map(|s| format!("{} {}%", s.color, (s.offset * 100.0).round()))
            .collect();
        format!("linear-gradient({}deg, {})", self.angle_deg, stops.join(", "))
    }

    /// Unit direction vector of the gradient axis in y-down space.
    pub fn direction(&self) -> (f32, f32) {
        let rad = self.angle_deg.to_radians();
        (rad.sin(), -rad.cos())
    }
}

/// Build a gradient from `(hex, alpha, offset)` stops in order. Offsets are
/// clamped to `[0, 1]` and forced non-decreasing.
pub fn linear_gradient(angle_deg: f32, stops: &[(&str, f32, f32)]) -> Result<LinearGradient, ColorError> {
    if stops.len() < 2 {
        return Err(ColorError::TooFewStops(stops.len()));
    }
    let mut out = Vec::with_capacity(stops.len());
    let mut last = 0.0f32;
    for (hex, alpha, offset) in stops {
        let offset = offset.clamp(0.0, 1.0).max(last);
        last = offset;
        out.push(GradientStop {
            offset,
            color: rgba(hex, *alpha)?,
        });
    }
    Ok(LinearGradient {
        angle_deg,
        stops: out,
    })
}

pub const HERO_BLUE: &str = "#3b82f6";
pub const HERO_PURPLE: &str = "#8b5cf6";
pub const HERO_PINK: &str = "#ec4899";

/// Blue → purple → pink wash used behind the hero card.
pub fn hero_gradient() -> LinearGradient {
    let stop = |hex: &str, a: f32, offset: f32| GradientStop {
        offset,
        color: hex_to_rgb(hex).unwrap_or(Rgb::BLACK).with_alpha(a),
    };
    LinearGradient {
        angle_deg: 135.0,
        stops: vec![
            stop(HERO_BLUE, 0.35, 0.0),
            stop(HERO_PURPLE, 0.30, 0.5),
            stop(HERO_PINK, 0.25, 1.0),
        ],
    }
}

/// Two-stop blue fade for sidebar cards.
pub fn sidebar_card_gradient() -> LinearGradient {
    let blue = hex_to_rgb(HERO_BLUE).unwrap_or(Rgb::BLACK);
    LinearGradient {
        angle_deg: 180.0,
        stops: vec![
            GradientStop {
                offset: 0.0,
                color: blue.with_alpha(0.18),
            },
            GradientStop {
                offset: 1.0,
                color: blue.with_alpha(0.06),
            },
        ],
    }
}

/// Push a text colour away from mid-tones so it stays legible on elevated
/// glass: bright colours move toward white, dark ones toward black.
pub fn enhance_contrast(hex: &str, elevation: u8) -> Result<String, ColorError> {
    let rgb = hex_to_rgb(hex)?;
    let factor = (0.04 + elevation as f32 * 0.02).min(0.12);
    let toward_white = rgb.luminance() > 0.6;
    let adjust = |c: u8| {
        let c = c as f32;
        let v = if toward_white {
            c + (255.0 - c) * factor
        } else {
            c * (1.0 - factor)
        };
        v.round().clamp(0.0, 255.0) as u8
    };
    Ok(rgb_to_hex(adjust(rgb.r), adjust(rgb.g), adjust(rgb.b)))
}

pub(crate) fn round2(v: f32) -> f32 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_long_hex() {
        assert_eq!(hex_to_rgb("#fff").unwrap(), Rgb::WHITE);
        assert_eq!(hex_to_rgb("3b82f6").unwrap(), Rgb { r: 0x3b, g: 0x82, b: 0xf6 });
        assert!(hex_to_rgb("#12345").is_err());
        assert!(hex_to_rgb("#gggggg").is_err());
    }

    #[test]
    fn hex_output_is_lowercase_and_padded() {
        assert_eq!(rgb_to_hex(3, 130, 246), "#0382f6");
        assert_eq!(Rgb::WHITE.to_hex(), "#ffffff");
    }

    #[test]
    fn hex_round_trips_every_channel_value() {
        let check = |r: u8, g: u8, b: u8| {
            let c = hex_to_rgb(&rgb_to_hex(r, g, b)).unwrap();
            assert_eq!((c.r, c.g, c.b), (r, g, b));
        };
        for v in 0..=255u8 {
            check(v, 0, 0);
            check(0, v, 0);
            check(0, 0, v);
            check(v, 255 - v, v / 2);
        }
        // strided walk over the 24-bit space
        for packed in (0..=0xff_ffffu32).step_by(4099) {
            check((packed >> 16) as u8, (packed >> 8) as u8, packed as u8);
        }
    }

    #[test]
    fn rgba_string_format() {
        assert_eq!(hex_with_alpha("#3b82f6", 0.35).unwrap(), "rgba(59, 130, 246, 0.35)");
        let parsed = parse_color("rgba(59, 130, 246, 0.35)").unwrap();
        assert_eq!(parsed.rgb(), hex_to_rgb("#3b82f6").unwrap());
        assert!((parsed.a - 0.35).abs() < 1e-6);
    }

    #[test]
    fn hero_preset_alphas_are_fixed() {
        let g = hero_gradient();
        let alphas: Vec<f32> = g.stops.iter().map(|s| s.color.a).collect();
        assert_eq!(alphas, vec![0.35, 0.30, 0.25]);
        assert_eq!(sidebar_card_gradient().stops.len(), 2);
    }

    #[test]
    fn gradient_needs_two_stops() {
        assert_eq!(
            linear_gradient(90.0, &[("#000", 1.0, 0.0)]).unwrap_err(),
            ColorError::TooFewStops(1)
        );
        let g = linear_gradient(90.0, &[("#000", 1.0, 0.6), ("#fff", 1.0, 0.2)]).unwrap();
        assert_eq!(g.stops[1].offset, 0.6);
    }

    #[test]
    fn contrast_moves_light_up_and_dark_down() {
        // luminance(#f0f0f0) > 0.6 → toward white by 0.04 at level 0
        assert_eq!(enhance_contrast("#f0f0f0", 0).unwrap(), "#f1f1f1");
        // dark colours darken; factor caps at 0.12 from level 4 upward
        assert_eq!(enhance_contrast("#646464", 4).unwrap(), "#585858");
        assert_eq!(
            enhance_contrast("#646464", 4).unwrap(),
            enhance_contrast("#646464", 9).unwrap()
        );
    }

    #[test]
    fn blend_over_white() {
        let c = blend_over(Rgb::BLACK.with_alpha(0.5), Rgb::WHITE);
        assert_eq!(c, Rgb { r: 128, g: 128, b: 128 });
    }
}
