//! Turning a rendered grid into a picture on disk.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use image::{ImageFormat, Rgb as ImageRgb, RgbImage};
use log::info;

use crate::cell_grid::CellGrid;
use crate::glyphs::glyph_coverage;
use crate::session::SessionHandle;

pub const EXPORT_FOLDER: &str = "Poorlaroid";
const FILE_PREFIX: &str = "poorlaroid";
const TIMESTAMP_FORMAT: &str = "%y%m%d_%H_%M_%S";

// Ordered-dither thresholds, in sixteenths.
const BAYER_4X4: [[u8; 4]; 4] = [[0, 8, 2, 10], [12, 4, 14, 6], [3, 11, 1, 9], [15, 7, 13, 5]];

/// `<Pictures>/Poorlaroid`, or `None` when the platform has no picture or
/// home directory.
pub fn default_export_dir() -> Option<PathBuf> {
    dirs::picture_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Pictures")))
        .map(|pictures| pictures.join(EXPORT_FOLDER))
}

/// Paints each cell as a `cell_width`x`cell_height` block: background color,
/// with the foreground dithered in at the glyph's coverage.
pub fn rasterize(grid: &CellGrid, cell_width: u32, cell_height: u32) -> Result<RgbImage> {
    if cell_width == 0 || cell_height == 0 {
        bail!("cell size must be > 0, got {cell_width}x{cell_height}");
    }
    let width = u32::try_from(grid.width())
        .ok()
        .and_then(|columns| columns.checked_mul(cell_width))
        .context("rasterized width overflows")?;
    let height = u32::try_from(grid.height())
        .ok()
        .and_then(|rows| rows.checked_mul(cell_height))
        .context("rasterized height overflows")?;

    let mut image = RgbImage::new(width, height);
    for (row, cells) in grid.rows().enumerate() {
        for (column, cell) in cells.iter().enumerate() {
            let coverage = glyph_coverage(cell.symbol);
            let foreground = ImageRgb(<[u8; 3]>::from(cell.foreground));
            let background = ImageRgb(<[u8; 3]>::from(cell.background));
            let origin_x = column as u32 * cell_width;
            let origin_y = row as u32 * cell_height;
            for dy in 0..cell_height {
                for dx in 0..cell_width {
                    let threshold =
                        (f32::from(BAYER_4X4[(dy % 4) as usize][(dx % 4) as usize]) + 0.5) / 16.0;
                    let color = if coverage > threshold {
                        foreground
                    } else {
                        background
                    };
                    image.put_pixel(origin_x + dx, origin_y + dy, color);
                }
            }
        }
    }
    Ok(image)
}

pub fn export_file_name(now: &DateTime<Local>) -> String {
    format!("{FILE_PREFIX}{}.bmp", now.format(TIMESTAMP_FORMAT))
}

/// Writes `image` as a 24-bit BMP under `dir`, creating the directory if
/// needed. Two captures in the same second get a numeric suffix.
pub fn save_bmp(image: &RgbImage, dir: &Path, now: &DateTime<Local>) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create export directory {}", dir.display()))?;

    let file_name = export_file_name(now);
    let mut path = dir.join(&file_name);
    let stem = file_name.trim_end_matches(".bmp");
    let mut suffix = 1;
    while path.exists() {
        path = dir.join(format!("{stem}_{suffix}.bmp"));
        suffix += 1;
    }

    image
        .save_with_format(&path, ImageFormat::Bmp)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("capture saved: {}", path.display());
    Ok(path)
}

/// Freezes the session, writes its canvas to `dir` and resumes live
/// rendering, even when writing fails.
pub fn capture_session(
    session: &SessionHandle,
    dir: &Path,
    cell_width: u32,
    cell_height: u32,
) -> Result<PathBuf> {
    let grid = session.begin_capture()?;
    let saved = rasterize(&grid, cell_width, cell_height)
        .and_then(|image| save_bmp(&image, dir, &Local::now()));
    session.end_capture();
    saved
}

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone};

    use super::{capture_session, export_file_name, rasterize, save_bmp};
    use crate::cell_grid::{Cell, CellGrid};
    use crate::color::Rgb;
    use crate::glyphs::{FULL_BLOCK, MEDIUM_SHADE};
    use crate::pixel_buffer::PixelBuffer;
    use crate::session::{Session, SessionHandle, SessionMode};
    use crate::shaders::ShaderBank;

    fn fixed_time() -> chrono::DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 3, 9, 7, 5, 2)
            .single()
            .expect("unambiguous local time")
    }

    #[test]
    fn file_name_uses_short_timestamp() {
        assert_eq!(export_file_name(&fixed_time()), "poorlaroid240309_07_05_02.bmp");
    }

    #[test]
    fn rasterize_fills_blocks_by_coverage() {
        let mut grid = CellGrid::new(2, 1);
        *grid.get_mut(0, 0).expect("cell") = Cell {
            foreground: Rgb::new(200, 0, 0),
            background: Rgb::BLACK,
            symbol: FULL_BLOCK,
        };
        *grid.get_mut(1, 0).expect("cell") = Cell {
            foreground: Rgb::WHITE,
            background: Rgb::BLACK,
            symbol: MEDIUM_SHADE,
        };

        let image = rasterize(&grid, 4, 4).expect("rasterize");
        assert_eq!(image.dimensions(), (8, 4));
        assert!((0..4).all(|x| (0..4).all(|y| image.get_pixel(x, y).0 == [200, 0, 0])));

        let lit = (4..8)
            .flat_map(|x| (0..4).map(move |y| (x, y)))
            .filter(|&(x, y)| image.get_pixel(x, y).0 == [255, 255, 255])
            .count();
        assert_eq!(lit, 8);
    }

    #[test]
    fn blank_cells_show_background_only() {
        let grid = CellGrid::new(3, 2);
        let image = rasterize(&grid, 2, 3).expect("rasterize");
        assert!(image.pixels().all(|pixel| pixel.0 == [0, 0, 0]));
    }

    #[test]
    fn zero_cell_size_is_rejected() {
        assert!(rasterize(&CellGrid::new(1, 1), 0, 4).is_err());
    }

    #[test]
    fn save_creates_directory_and_avoids_overwrites() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let dir = temp.path().join("nested").join("Poorlaroid");
        let image = rasterize(&CellGrid::new(2, 2), 3, 3).expect("rasterize");

        let first = save_bmp(&image, &dir, &fixed_time()).expect("first save");
        let second = save_bmp(&image, &dir, &fixed_time()).expect("second save");
        assert_ne!(first, second);
        assert!(second.ends_with("poorlaroid240309_07_05_02_1.bmp"));

        let bytes = std::fs::read(&first).expect("read bmp");
        assert_eq!(&bytes[..2], b"BM");
        let decoded = image::open(&first).expect("decode bmp").to_rgb8();
        assert_eq!(decoded.dimensions(), (6, 6));
    }

    #[test]
    fn capture_session_writes_canvas_and_resumes() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let session = SessionHandle::new(Session::new(4, 2, ShaderBank::standard()));
        session.deliver_frame(&PixelBuffer::filled(40, 20, Rgb::new(30, 60, 90)));

        let path = capture_session(&session, temp.path(), 2, 2).expect("capture");
        assert_eq!(session.mode(), SessionMode::Live);
        let decoded = image::open(&path).expect("decode capture").to_rgb8();
        assert_eq!(decoded.dimensions(), (8, 4));
        assert_eq!(decoded.get_pixel(0, 0).0, [30, 60, 90]);
    }

    #[test]
    fn failed_capture_still_resumes_live_rendering() {
        let session = SessionHandle::new(Session::new(2, 2, ShaderBank::standard()));
        let temp = tempfile::tempdir().expect("tempdir should be created");
        assert!(capture_session(&session, temp.path(), 0, 2).is_err());
        assert_eq!(session.mode(), SessionMode::Live);
    }
}
