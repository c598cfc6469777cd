//! Symbol codes written into cells and their terminal/raster meaning.
//!
//! Codes below 0x100 follow code page 437. The 0x130..=0x135 range is the
//! extended six-step shade set used by the posterize shader.

/// Darkest-to-densest printable ramp used by the typewriter shader.
pub const TYPEWRITER_RAMP: &str =
    " .'`^\",:;Il!i><~+_-?][}{1)(|\\/tfjrxnuvczXYUJCLQ0OZmwqpdbkhao*#MW&8%B@$";

pub const DIAMOND: u32 = 0x04;
pub const LIGHT_SHADE: u32 = 0xB0;
pub const MEDIUM_SHADE: u32 = 0xB1;
pub const DARK_SHADE: u32 = 0xB2;
pub const FULL_BLOCK: u32 = 0xDB;

pub const EXTENDED_SHADE_FIRST: u32 = 0x130;
pub const EXTENDED_SHADE_LAST: u32 = 0x135;

const EXTENDED_SHADES: [char; 6] = [' ', '·', '░', '▒', '▓', '█'];

/// Unicode stand-in for a symbol code, used by the ANSI presenter.
pub fn glyph_char(code: u32) -> char {
    match code {
        0x00 => ' ',
        DIAMOND => '♦',
        LIGHT_SHADE => '░',
        MEDIUM_SHADE => '▒',
        DARK_SHADE => '▓',
        FULL_BLOCK => '█',
        EXTENDED_SHADE_FIRST..=EXTENDED_SHADE_LAST => {
            EXTENDED_SHADES[(code - EXTENDED_SHADE_FIRST) as usize]
        }
        0x20..=0x7E => char::from_u32(code).unwrap_or('?'),
        _ => '?',
    }
}

/// Fraction of a cell covered by foreground when rasterized.
pub fn glyph_coverage(code: u32) -> f32 {
    match code {
        0x00 | 0x20 => 0.0,
        DIAMOND => 0.4,
        LIGHT_SHADE => 0.25,
        MEDIUM_SHADE => 0.5,
        DARK_SHADE => 0.75,
        FULL_BLOCK => 1.0,
        EXTENDED_SHADE_FIRST..=EXTENDED_SHADE_LAST => {
            (code - EXTENDED_SHADE_FIRST) as f32 / (EXTENDED_SHADE_LAST - EXTENDED_SHADE_FIRST) as f32
        }
        0x21..=0x7E => ramp_coverage(code as u8),
        _ => 0.5,
    }
}

fn ramp_coverage(symbol: u8) -> f32 {
    let ramp = TYPEWRITER_RAMP.as_bytes();
    match ramp.iter().position(|value| *value == symbol) {
        Some(index) => index as f32 / (ramp.len() - 1) as f32,
        None => 0.5,
    }
}
