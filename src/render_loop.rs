//! One render pass: sample every cell of the grid from a frame and hand the
//! color to the active shader.
//!
//! The only suspension point is the cancellation poll before each cell. A
//! cancelled pass keeps the cells it already wrote, leaves the rest as they
//! were, and never calls `end_frame`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::trace;

use crate::cell_grid::CellGrid;
use crate::error::RenderError;
use crate::pixel_buffer::PixelBuffer;
use crate::sampler::SamplingPlan;
use crate::shaders::CellShader;

/// Cooperative cancellation flag shared between a pass and whoever may
/// abort it. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

pub fn render_pass(
    frame: &PixelBuffer,
    grid: &mut CellGrid,
    shader: &mut dyn CellShader,
    flip: bool,
    cancel: &CancelToken,
) -> Result<(), RenderError> {
    render_pass_observed(frame, grid, shader, flip, cancel, |_| {})
}

/// Like [`render_pass`], calling `on_cell` with the running count of written
/// cells after each one.
pub fn render_pass_observed(
    frame: &PixelBuffer,
    grid: &mut CellGrid,
    shader: &mut dyn CellShader,
    flip: bool,
    cancel: &CancelToken,
    mut on_cell: impl FnMut(usize),
) -> Result<(), RenderError> {
    let width = grid.width();
    let height = grid.height();
    let plan = SamplingPlan::new(width, height, frame.width(), frame.height())?;

    shader.begin_frame();

    let mut written = 0;
    for y in 0..height {
        for x in 0..width {
            if cancel.is_cancelled() {
                trace!(
                    "{}: pass cancelled after {written}/{} cells",
                    shader.name(),
                    width * height
                );
                return Err(RenderError::Cancelled);
            }

            let (sx, sy) = plan.source_coord(x, y);
            let target_x = if flip { width - 1 - x } else { x };
            let (Some(source), Some(cell)) = (frame.get(sx, sy), grid.get_mut(target_x, y)) else {
                // The plan keeps both coordinates in range; nothing to write otherwise.
                continue;
            };
            shader.render_cell(source, cell);

            written += 1;
            on_cell(written);
        }
    }

    shader.end_frame();
    trace!("{}: pass complete ({written} cells)", shader.name());
    Ok(())
}
