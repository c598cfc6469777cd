use super::CellShader;
use crate::calibration::LumaCalibration;
use crate::cell_grid::Cell;
use crate::color::Rgb;
use crate::glyphs::{EXTENDED_SHADE_FIRST, EXTENDED_SHADE_LAST};

const CHANNEL_STEPS: u32 = 3;

/// Coarse per-channel color with a six-step shade glyph, both scaled to the
/// calibrated brightness ceiling.
#[derive(Debug, Clone, Default)]
pub struct PosterizeShader {
    calibration: LumaCalibration,
}

impl PosterizeShader {
    pub fn new() -> Self {
        Self::default()
    }

    fn quantize(&self, channel: u8) -> u8 {
        let max = u32::from(self.calibration.max_luma());
        let value = u32::from(channel);
        for step in 0..CHANNEL_STEPS {
            if value <= max * (step + 1) / CHANNEL_STEPS {
                return (255 * step / CHANNEL_STEPS) as u8;
            }
        }
        255
    }
}

impl CellShader for PosterizeShader {
    fn name(&self) -> &'static str {
        "Camsole"
    }

    fn render_cell(&mut self, source: Rgb, cell: &mut Cell) {
        let luma = source.luma();
        let norm = self.calibration.normalize(luma);
        let span = EXTENDED_SHADE_LAST - EXTENDED_SHADE_FIRST;

        cell.foreground = Rgb::new(
            self.quantize(source.r),
            self.quantize(source.g),
            self.quantize(source.b),
        );
        cell.symbol = EXTENDED_SHADE_FIRST + ((norm * span as f32) as u32).min(span);

        self.calibration.record(luma);
    }

    fn end_frame(&mut self) {
        self.calibration.end_frame();
    }

    fn calibration(&self) -> Option<&LumaCalibration> {
        Some(&self.calibration)
    }
}
