use std::time::Instant;

use super::CellShader;
use crate::calibration::LumaCalibration;
use crate::cell_grid::Cell;
use crate::color::Rgb;
use crate::glyphs::DIAMOND;

/// Seconds of wall-clock time per full turn of the hue wheel.
const PHASE_PERIOD_SECS: f32 = 2.0;

/// Where the hue offset comes from.
#[derive(Debug, Clone, Copy)]
pub enum PhaseClock {
    Wall { epoch: Instant },
    Fixed(f32),
}

impl PhaseClock {
    fn phase(&self) -> f32 {
        match self {
            Self::Wall { epoch } => {
                (epoch.elapsed().as_secs_f32() / PHASE_PERIOD_SECS).rem_euclid(1.0)
            }
            Self::Fixed(phase) => phase.rem_euclid(1.0),
        }
    }
}

/// Rainbow diamonds whose hue and lightness follow brightness, drifting
/// around the color wheel over time.
#[derive(Debug, Clone)]
pub struct HueCycleShader {
    clock: PhaseClock,
    phase: f32,
    calibration: LumaCalibration,
}

impl HueCycleShader {
    pub fn new() -> Self {
        Self::with_clock(PhaseClock::Wall {
            epoch: Instant::now(),
        })
    }

    pub fn with_clock(clock: PhaseClock) -> Self {
        Self {
            clock,
            phase: clock.phase(),
            calibration: LumaCalibration::new(),
        }
    }
}

impl Default for HueCycleShader {
    fn default() -> Self {
        Self::new()
    }
}

impl CellShader for HueCycleShader {
    fn name(&self) -> &'static str {
        "Microwaavee"
    }

    fn begin_frame(&mut self) {
        // One phase per pass keeps a frame internally consistent.
        self.phase = self.clock.phase();
    }

    fn render_cell(&mut self, source: Rgb, cell: &mut Cell) {
        let luma = source.luma();
        let level = luma / 255.0;
        let hue = (level * 2.0 + self.phase).rem_euclid(1.0);

        cell.foreground = Rgb::from_hsl(hue, level, level);
        cell.symbol = DIAMOND;

        self.calibration.record(luma);
    }

    fn end_frame(&mut self) {
        self.calibration.end_frame();
    }

    fn calibration(&self) -> Option<&LumaCalibration> {
        Some(&self.calibration)
    }
}
