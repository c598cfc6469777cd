use super::CellShader;
use crate::cell_grid::Cell;
use crate::color::Rgb;

/// Paints the sampled color straight into the cell background.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolidShader;

impl CellShader for SolidShader {
    fn name(&self) -> &'static str {
        "Retro"
    }

    fn render_cell(&mut self, source: Rgb, cell: &mut Cell) {
        cell.background = source;
    }
}
