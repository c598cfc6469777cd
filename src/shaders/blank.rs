use super::CellShader;
use crate::cell_grid::Cell;
use crate::color::Rgb;

/// Leaves every cell as it was.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlankShader;

impl CellShader for BlankShader {
    fn name(&self) -> &'static str {
        "Onio"
    }

    fn render_cell(&mut self, _source: Rgb, _cell: &mut Cell) {}
}
