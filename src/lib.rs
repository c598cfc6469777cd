pub mod ansi;
pub mod calibration;
pub mod cell_grid;
pub mod color;
pub mod config;
pub mod console;
pub mod error;
pub mod export;
pub mod frame_source;
pub mod glyphs;
pub mod pixel_buffer;
pub mod render_loop;
pub mod render_worker;
pub mod sampler;
pub mod session;
pub mod shaders;
