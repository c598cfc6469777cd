use super::CellShader;
use crate::calibration::LumaCalibration;
use crate::cell_grid::Cell;
use crate::color::Rgb;
use crate::glyphs::{DARK_SHADE, FULL_BLOCK, LIGHT_SHADE, MEDIUM_SHADE};

const PALETTE: [Rgb; 3] = [Rgb::BLACK, Rgb::GRAY, Rgb::WHITE];
const SHADES: [u32; 4] = [LIGHT_SHADE, MEDIUM_SHADE, DARK_SHADE, FULL_BLOCK];

/// Monochrome shading: two adjacent palette tones blended through a shade
/// glyph, giving `palette * shades` brightness steps.
#[derive(Debug, Clone, Default)]
pub struct DuotoneShader {
    calibration: LumaCalibration,
}

impl DuotoneShader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Step index in `0..=PALETTE.len() * SHADES.len()`.
    fn step(&self, luma: f32) -> usize {
        let steps = PALETTE.len() * SHADES.len();
        ((self.calibration.normalize(luma) * steps as f32) as usize).min(steps)
    }
}

impl CellShader for DuotoneShader {
    fn name(&self) -> &'static str {
        "Noire"
    }

    fn render_cell(&mut self, source: Rgb, cell: &mut Cell) {
        let luma = source.luma();
        let step = self.step(luma);
        let shade = step % SHADES.len();
        let upper = (step / SHADES.len()).min(PALETTE.len() - 1);
        let lower = upper.saturating_sub(1);

        cell.foreground = PALETTE[upper];
        cell.background = PALETTE[lower];
        cell.symbol = SHADES[shade];

        self.calibration.record(luma);
    }

    fn end_frame(&mut self) {
        self.calibration.end_frame();
    }

    fn calibration(&self) -> Option<&LumaCalibration> {
        Some(&self.calibration)
    }
}

#[cfg(test)]
mod tests {
    use super::DuotoneShader;
    use crate::cell_grid::Cell;
    use crate::color::Rgb;
    use crate::shaders::CellShader;

    fn render(shader: &mut DuotoneShader, source: Rgb) -> Cell {
        let mut cell = Cell::BLANK;
        shader.render_cell(source, &mut cell);
        cell
    }

    #[test]
    fn black_is_light_shade_on_black() {
        let mut shader = DuotoneShader::new();
        let cell = render(&mut shader, Rgb::BLACK);
        assert_eq!(cell.foreground, Rgb::BLACK);
        assert_eq!(cell.background, Rgb::BLACK);
        assert_eq!(cell.symbol, 0xB0);
    }

    #[test]
    fn white_saturates_to_top_of_palette() {
        let mut shader = DuotoneShader::new();
        // step 12 -> shade 0, palette index clamped to white over gray.
        let cell = render(&mut shader, Rgb::WHITE);
        assert_eq!(cell.foreground, Rgb::WHITE);
        assert_eq!(cell.background, Rgb::GRAY);
        assert_eq!(cell.symbol, 0xB0);
    }

    #[test]
    fn mid_gray_uses_gray_over_black() {
        let mut shader = DuotoneShader::new();
        // 100 / 255 * 12 = 4.7 -> step 4: gray foreground, black background.
        let cell = render(&mut shader, Rgb::gray(100));
        assert_eq!(cell.foreground, Rgb::GRAY);
        assert_eq!(cell.background, Rgb::BLACK);
        assert_eq!(cell.symbol, 0xB0);
    }

    #[test]
    fn background_never_brighter_than_foreground() {
        let mut shader = DuotoneShader::new();
        for level in (0..=255_u8).step_by(5) {
            let cell = render(&mut shader, Rgb::gray(level));
            assert!(cell.background.r <= cell.foreground.r);
        }
    }
}
