//! Legend overlay for grids: column headers, row headers and titles

use crate::error::{Result, SweepError};
use image::{imageops, DynamicImage, Rgb, RgbImage};

const COLOR_ACTIVE: Rgb<u8> = Rgb([0, 0, 0]);
const COLOR_INACTIVE: Rgb<u8> = Rgb([153, 153, 153]);
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// One line of legend text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridAnnotation {
    pub text: String,
    pub is_active: bool,
}

impl GridAnnotation {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_active: true }
    }

    pub fn inactive(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_active: false }
    }

    /// Empty header block, used when a grid has no row labels.
    pub fn blank() -> Vec<GridAnnotation> {
        vec![Self::new("")]
    }
}

/// One header block per label, each holding a single annotation.
pub fn label_blocks(labels: &[String]) -> Vec<Vec<GridAnnotation>> {
    labels.iter().map(|l| vec![GridAnnotation::new(l.clone())]).collect()
}

/// Draws header blocks around a grid whose cells are `cell_width` by
/// `cell_height`, optionally spreading the cells `margin` pixels apart.
pub trait Annotator {
    fn annotate(
        &self,
        grid: &DynamicImage,
        cell_width: u32,
        cell_height: u32,
        hor_texts: &[Vec<GridAnnotation>],
        ver_texts: &[Vec<GridAnnotation>],
        margin: u32,
    ) -> Result<DynamicImage>;
}

/// Lays out legend bands on a white canvas.
///
/// No font is bundled, so each text line is drawn as a bar with the
/// line's estimated extent: black for active labels, grey for inactive.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegendAnnotator;

#[derive(Debug, Clone, Copy)]
struct Metrics {
    font_size: u32,
    line_spacing: u32,
}

impl Metrics {
    fn for_cell(width: u32, height: u32) -> Self {
        let font_size = ((width + height) / 25).max(1);
        Self { font_size, line_spacing: font_size / 2 }
    }

    fn text_width(&self, text: &str) -> u32 {
        text.chars().count() as u32 * self.font_size / 2
    }

    /// Greedy word wrap against the estimated text width.
    fn wrap(&self, text: &str, allowed: u32) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current = String::new();
        for word in text.split(' ') {
            let candidate = if current.is_empty() { word.to_string() } else { format!("{} {}", current, word) };
            if !current.is_empty() && self.text_width(&candidate) > allowed {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            } else {
                current = candidate;
            }
        }
        lines.push(current);
        lines
    }

    fn block_height(&self, lines: &[GridAnnotation]) -> u32 {
        let total: u32 = lines.iter().map(|_| self.font_size + self.line_spacing).sum();
        total.saturating_sub(self.line_spacing)
    }
}

fn wrap_blocks(metrics: &Metrics, blocks: &[Vec<GridAnnotation>], allowed: u32) -> Vec<Vec<GridAnnotation>> {
    blocks
        .iter()
        .map(|block| {
            block
                .iter()
                .flat_map(|line| {
                    metrics
                        .wrap(&line.text, allowed)
                        .into_iter()
                        .map(move |text| GridAnnotation { text, is_active: line.is_active })
                })
                .collect()
        })
        .collect()
}

fn fill_rect(canvas: &mut RgbImage, x: i64, y: i64, w: u32, h: u32, color: Rgb<u8>) {
    let (cw, ch) = (canvas.width() as i64, canvas.height() as i64);
    for py in y.max(0)..(y + h as i64).min(ch) {
        for px in x.max(0)..(x + w as i64).min(cw) {
            canvas.put_pixel(px as u32, py as u32, color);
        }
    }
}

/// Lines centered horizontally on `cx`, stacked down from `top`.
fn draw_block(canvas: &mut RgbImage, metrics: &Metrics, cx: i64, top: i64, lines: &[GridAnnotation]) {
    let mut y = top;
    let bar_height = (metrics.font_size * 3 / 5).max(1);
    for line in lines {
        let width = metrics.text_width(&line.text);
        if width > 0 {
            let color = if line.is_active { COLOR_ACTIVE } else { COLOR_INACTIVE };
            let inset = ((metrics.font_size - bar_height) / 2) as i64;
            fill_rect(canvas, cx - width as i64 / 2, y + inset, width, bar_height, color);
        }
        y += (metrics.font_size + metrics.line_spacing) as i64;
    }
}

impl Annotator for LegendAnnotator {
    fn annotate(
        &self,
        grid: &DynamicImage,
        cell_width: u32,
        cell_height: u32,
        hor_texts: &[Vec<GridAnnotation>],
        ver_texts: &[Vec<GridAnnotation>],
        margin: u32,
    ) -> Result<DynamicImage> {
        let (cell_width, cell_height) = (cell_width.max(1), cell_height.max(1));
        let cols = grid.width() / cell_width;
        let rows = grid.height() / cell_height;
        if cols as usize != hor_texts.len() {
            return Err(SweepError::LegendMismatch { axis: "column", labels: hor_texts.len(), cells: cols as usize });
        }
        if rows as usize != ver_texts.len() {
            return Err(SweepError::LegendMismatch { axis: "row", labels: ver_texts.len(), cells: rows as usize });
        }

        let metrics = Metrics::for_cell(cell_width, cell_height);
        let has_row_labels = ver_texts.iter().flatten().any(|line| !line.text.is_empty());
        let pad_left = if has_row_labels { cell_width * 3 / 4 } else { 0 };

        let hor = wrap_blocks(&metrics, hor_texts, cell_width);
        let ver = wrap_blocks(&metrics, ver_texts, pad_left);
        let has_col_labels = hor.iter().flatten().any(|line| !line.text.is_empty());
        let hor_heights: Vec<u32> = hor.iter().map(|b| metrics.block_height(b)).collect();
        let pad_top = if has_col_labels {
            hor_heights.iter().copied().max().unwrap_or(0) + metrics.line_spacing * 2
        } else {
            0
        };

        let mut canvas = RgbImage::from_pixel(
            grid.width() + pad_left + margin * cols.saturating_sub(1),
            grid.height() + pad_top + margin * rows.saturating_sub(1),
            BACKGROUND,
        );
        let source = grid.to_rgb8();
        for row in 0..rows {
            for col in 0..cols {
                let cell = imageops::crop_imm(&source, cell_width * col, cell_height * row, cell_width, cell_height)
                    .to_image();
                let x = pad_left + (cell_width + margin) * col;
                let y = pad_top + (cell_height + margin) * row;
                imageops::replace(&mut canvas, &cell, x as i64, y as i64);
            }
        }

        for (col, block) in hor.iter().enumerate() {
            let cx = (pad_left + (cell_width + margin) * col as u32 + cell_width / 2) as i64;
            let top = pad_top as i64 / 2 - hor_heights[col] as i64 / 2;
            draw_block(&mut canvas, &metrics, cx, top, block);
        }
        for (row, block) in ver.iter().enumerate() {
            let cx = pad_left as i64 / 2;
            let top = (pad_top + (cell_height + margin) * row as u32 + cell_height / 2) as i64
                - metrics.block_height(block) as i64 / 2;
            draw_block(&mut canvas, &metrics, cx, top, block);
        }

        Ok(DynamicImage::ImageRgb8(canvas))
    }
}
