//! Nearest-block downscaling from a source frame onto the cell grid.
//!
//! Both block edges derive from the shorter source side, so blocks stay
//! square and the longer axis is center-cropped.

use crate::error::RenderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingPlan {
    pub block_width: usize,
    pub block_height: usize,
    pub offset_x: usize,
    pub offset_y: usize,
}

impl SamplingPlan {
    /// Computes block sizes and crop offsets for a `grid_width x grid_height`
    /// grid over a `frame_width x frame_height` source.
    pub fn new(
        grid_width: usize,
        grid_height: usize,
        frame_width: usize,
        frame_height: usize,
    ) -> Result<Self, RenderError> {
        let degenerate = RenderError::DegenerateSampling {
            grid_width,
            grid_height,
            frame_width,
            frame_height,
        };
        if grid_width == 0 || grid_height == 0 {
            return Err(degenerate);
        }
        if frame_width < grid_width || frame_height < grid_height {
            return Err(degenerate);
        }

        let short_side = frame_width.min(frame_height);
        let block_height = short_side / grid_height;
        let block_width = short_side / grid_width;
        if block_width == 0 || block_height == 0 {
            return Err(degenerate);
        }

        Ok(Self {
            block_width,
            block_height,
            offset_x: (frame_width - block_width * grid_width) / 2,
            offset_y: (frame_height - block_height * grid_height) / 2,
        })
    }

    /// Source pixel that supplies cell `(x, y)`.
    #[inline]
    pub fn source_coord(&self, x: usize, y: usize) -> (usize, usize) {
        (
            x * self.block_width + self.offset_x,
            y * self.block_height + self.offset_y,
        )
    }
}
