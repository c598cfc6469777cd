//! Cell shaders: strategies that turn one sampled source color into a cell.
//!
//! Every shader follows a three-phase contract per render pass:
//! `begin_frame`, then `render_cell` once per written cell, then `end_frame`
//! only if the pass completed. Shaders are created once and live for the
//! whole session, so calibration state carries from one pass to the next.

mod blank;
mod duotone;
mod hue_cycle;
mod posterize;
mod ramp;
mod solid;

pub use blank::BlankShader;
pub use duotone::DuotoneShader;
pub use hue_cycle::{HueCycleShader, PhaseClock};
pub use posterize::PosterizeShader;
pub use ramp::RampShader;
pub use solid::SolidShader;

use crate::calibration::LumaCalibration;
use crate::cell_grid::Cell;
use crate::color::Rgb;
use crate::error::SessionError;

pub trait CellShader: Send {
    /// Display name; unique within a bank and matched case-insensitively.
    fn name(&self) -> &'static str;

    fn begin_frame(&mut self) {}

    fn render_cell(&mut self, source: Rgb, cell: &mut Cell);

    fn end_frame(&mut self) {}

    /// Brightness feedback state, for shaders that calibrate.
    fn calibration(&self) -> Option<&LumaCalibration> {
        None
    }
}

/// The fixed set of shaders for a session plus which one is active.
pub struct ShaderBank {
    shaders: Vec<Box<dyn CellShader>>,
    active: usize,
}

impl ShaderBank {
    /// Bank with every built-in shader, `Retro` active.
    pub fn standard() -> Self {
        Self::from_shaders(vec![
            Box::new(SolidShader),
            Box::new(RampShader::new()),
            Box::new(PosterizeShader::new()),
            Box::new(HueCycleShader::new()),
            Box::new(DuotoneShader::new()),
            Box::new(BlankShader),
        ])
    }

    /// Builds a bank from explicit shaders; the first one starts active.
    pub fn from_shaders(shaders: Vec<Box<dyn CellShader>>) -> Self {
        Self { shaders, active: 0 }
    }

    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.shaders.iter().map(|shader| shader.name()).collect()
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        let wanted = name.trim();
        self.shaders
            .iter()
            .position(|shader| shader.name().eq_ignore_ascii_case(wanted))
    }

    pub fn active_name(&self) -> Option<&'static str> {
        self.shaders.get(self.active).map(|shader| shader.name())
    }

    pub fn active_mut(&mut self) -> Option<&mut (dyn CellShader + 'static)> {
        self.shaders.get_mut(self.active).map(|shader| shader.as_mut())
    }

    pub fn get(&self, name: &str) -> Option<&dyn CellShader> {
        self.find(name).map(|index| self.shaders[index].as_ref())
    }

    /// Activates the shader called `name`; an unknown name changes nothing.
    pub fn select(&mut self, name: &str) -> Result<&'static str, SessionError> {
        let index = self
            .find(name)
            .ok_or_else(|| SessionError::UnknownShaderName(name.trim().to_owned()))?;
        self.active = index;
        Ok(self.shaders[index].name())
    }

    /// Activates the next shader in bank order, wrapping around.
    pub fn cycle(&mut self) -> Option<&'static str> {
        if self.shaders.is_empty() {
            return None;
        }
        self.active = (self.active + 1) % self.shaders.len();
        self.active_name()
    }
}

impl Default for ShaderBank {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for ShaderBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderBank")
            .field("shaders", &self.names())
            .field("active", &self.active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::ShaderBank;
    use crate::error::SessionError;

    #[test]
    fn standard_bank_has_unique_names() {
        let bank = ShaderBank::standard();
        let mut names = bank
            .names()
            .into_iter()
            .map(str::to_ascii_lowercase)
            .collect::<Vec<_>>();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
        assert_eq!(total, 6);
    }

    #[test]
    fn select_is_case_insensitive() {
        let mut bank = ShaderBank::standard();
        assert_eq!(bank.select("noire"), Ok("Noire"));
        assert_eq!(bank.active_name(), Some("Noire"));
        assert_eq!(bank.select("TYPEWRITER"), Ok("Typewriter"));
    }

    #[test]
    fn unknown_name_leaves_active_shader() {
        let mut bank = ShaderBank::standard();
        bank.select("camsole").expect("camsole exists");
        let error = bank.select("sepia").expect_err("sepia is not a shader");
        assert_eq!(error, SessionError::UnknownShaderName("sepia".to_owned()));
        assert_eq!(bank.active_name(), Some("Camsole"));
    }

    #[test]
    fn partial_names_do_not_match() {
        let bank = ShaderBank::standard();
        assert!(bank.find("typ").is_none());
        assert!(bank.find("").is_none());
    }

    #[test]
    fn cycle_wraps_to_first() {
        let mut bank = ShaderBank::standard();
        let mut seen = vec![bank.active_name().expect("active shader")];
        for _ in 1..bank.len() {
            seen.push(bank.cycle().expect("non-empty bank"));
        }
        assert_eq!(seen, bank.names());
        assert_eq!(bank.cycle(), Some("Retro"));
    }

    #[test]
    fn calibrated_shaders_expose_state() {
        let bank = ShaderBank::standard();
        for name in ["camsole", "microwaavee", "noire"] {
            let shader = bank.get(name).expect("shader exists");
            assert_eq!(
                shader.calibration().map(|state| state.max_luma()),
                Some(255)
            );
        }
        for name in ["retro", "typewriter", "onio"] {
            assert!(bank.get(name).expect("shader exists").calibration().is_none());
        }
    }
}
