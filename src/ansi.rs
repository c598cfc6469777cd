//! Terminal presentation of a grid with 24-bit SGR colors.

use std::fmt::Write as _;

use crate::cell_grid::CellGrid;
use crate::color::Rgb;
use crate::glyphs::glyph_char;

const RESET: &str = "\x1b[0m";

/// One line per row, each ending in a reset. Color escapes are only
/// emitted when the color changes from the previous cell on the row.
pub fn to_ansi(grid: &CellGrid) -> String {
    let mut out = String::with_capacity(grid.width() * grid.height() * 8);
    for row in grid.rows() {
        let mut current: Option<(Rgb, Rgb)> = None;
        for cell in row {
            let colors = (cell.foreground, cell.background);
            if current != Some(colors) {
                let (fg, bg) = colors;
                // Writing into a String cannot fail.
                let _ = write!(
                    out,
                    "\x1b[38;2;{};{};{};48;2;{};{};{}m",
                    fg.r, fg.g, fg.b, bg.r, bg.g, bg.b
                );
                current = Some(colors);
            }
            out.push(glyph_char(cell.symbol));
        }
        out.push_str(RESET);
        out.push('\n');
    }
    out
}

/// Glyphs only, no color; handy for logs and golden tests.
pub fn to_plain_text(grid: &CellGrid) -> String {
    let mut out = String::with_capacity((grid.width() + 1) * grid.height());
    for row in grid.rows() {
        out.extend(row.iter().map(|cell| glyph_char(cell.symbol)));
        out.push('\n');
    }
    out
}

/// Moves the cursor home so the next frame overwrites the previous one.
pub fn cursor_home() -> &'static str {
    "\x1b[H"
}
