//! Terminal oscilloscope surface
//!
//! Minimal stand-in for a GPU renderer: points are bucketed into character
//! columns by their x position, each column drawing a vertical stroke between
//! the bucket's minimum and maximum amplitude.

use std::io::Write;

use log::error;

use crate::display::{DisplayPoint, Surface};

const CLEAR: &str = "\x1b[2J";
const HOME: &str = "\x1b[H";

pub struct TermSurface {
    width: usize,
    height: usize,
    /// Seconds spanned by the full terminal width.
    viewport_seconds: f32,
}

impl TermSurface {
    pub fn new(width: usize, height: usize, viewport_seconds: f32) -> Self {
        Self {
            width: width.max(8),
            height: height.max(3),
            viewport_seconds,
        }
    }

    fn render(&self, points: &[DisplayPoint]) -> String {
        // Column-wise amplitude envelope. y arrives in [-0.5, 0.5].
        let mut min = vec![f32::INFINITY; self.width];
        let mut max = vec![f32::NEG_INFINITY; self.width];
        for point in points {
            let col = ((point.x / self.viewport_seconds) * self.width as f32) as usize;
            let col = col.min(self.width - 1);
            min[col] = min[col].min(point.y);
            max[col] = max[col].max(point.y);
        }

        let mut out = String::with_capacity((self.width + 1) * self.height + HOME.len());
        out.push_str(HOME);
        for row in 0..self.height {
            // Row centers, top row at +0.5.
            let y = 0.5 - (row as f32 + 0.5) / self.height as f32;
            let half_row = 0.5 / self.height as f32;
            for col in 0..self.width {
                let hit = min[col] <= y + half_row && max[col] >= y - half_row;
                out.push(if hit { '|' } else { ' ' });
            }
            out.push('\n');
        }
        out
    }
}

impl Surface for TermSurface {
    fn draw(&mut self, points: &[DisplayPoint]) {
        let frame = self.render(points);
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = stdout.write_all(frame.as_bytes()).and_then(|_| stdout.flush()) {
            error!("Failed to draw frame: {}", e);
        }
    }

    fn reset(&mut self) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = stdout.write_all(CLEAR.as_bytes()) {
            error!("Failed to clear surface: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_marks_columns() {
        let surface = TermSurface::new(8, 5, 1.0);
        let points = [
            DisplayPoint { x: 0.0, y: 0.0 },
            DisplayPoint { x: 0.99, y: 0.5 },
        ];
        let frame = surface.render(&points);
        let rows: Vec<&str> = frame.trim_start_matches(HOME).lines().collect();
        assert_eq!(rows.len(), 5);
        // Zero amplitude lands on the middle row, first column.
        assert_eq!(rows[2].as_bytes()[0], b'|');
        // Full positive amplitude lands on the top row, last column.
        assert_eq!(rows[0].as_bytes()[7], b'|');
        // An untouched column stays blank.
        assert!(rows.iter().all(|r| r.as_bytes()[4] == b' '));
    }

    #[test]
    fn test_render_empty_is_blank() {
        let surface = TermSurface::new(8, 3, 1.0);
        let frame = surface.render(&[]);
        assert!(frame.chars().all(|c| c != '|'));
    }
}
