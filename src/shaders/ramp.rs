use super::CellShader;
use crate::cell_grid::Cell;
use crate::color::Rgb;
use crate::glyphs::TYPEWRITER_RAMP;

/// Picks a printable glyph by brightness and tints it with the source color.
#[derive(Debug, Clone)]
pub struct RampShader {
    ramp: Vec<u32>,
}

impl RampShader {
    pub fn new() -> Self {
        Self {
            ramp: TYPEWRITER_RAMP.chars().map(u32::from).collect(),
        }
    }

    pub fn ramp_len(&self) -> usize {
        self.ramp.len()
    }

    pub fn ramp_index(&self, luma: f32) -> usize {
        let norm = (luma / 255.0).clamp(0.0, 1.0);
        let last = self.ramp.len() - 1;
        ((norm * last as f32) as usize).min(last)
    }
}

impl Default for RampShader {
    fn default() -> Self {
        Self::new()
    }
}

impl CellShader for RampShader {
    fn name(&self) -> &'static str {
        "Typewriter"
    }

    fn render_cell(&mut self, source: Rgb, cell: &mut Cell) {
        cell.foreground = source.brighter();
        cell.symbol = self.ramp[self.ramp_index(source.luma())];
    }
}
