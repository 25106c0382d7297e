//! Grid composition and assembly of sweep results into grid images

pub mod annotate;
pub mod assemble;
pub mod split;

pub use annotate::{Annotator, GridAnnotation, LegendAnnotator};
pub use assemble::{assemble, AssembleOptions, GridLabels};
pub use split::{split_rows, SplitRow};

use crate::error::{Result, SweepError};
use image::{imageops, DynamicImage, RgbImage};

/// Paste `images` into a black canvas of `rows` rows.
///
/// Every cell takes the size of the first image. The column count is
/// `cols` when given, otherwise just enough to fit all images.
pub fn compose_grid(images: &[DynamicImage], rows: usize, cols: Option<usize>) -> Result<DynamicImage> {
    let first = images.first().ok_or(SweepError::EmptyGrid)?;
    let rows = rows.max(1);
    let cols = match cols {
        Some(c) if c > 0 => c,
        _ => (images.len() + rows - 1) / rows,
    };
    let (w, h) = (first.width(), first.height());

    let mut grid = DynamicImage::ImageRgb8(RgbImage::new(cols as u32 * w, rows as u32 * h));
    for (i, img) in images.iter().enumerate() {
        let x = (i % cols) as i64 * w as i64;
        let y = (i / cols) as i64 * h as i64;
        imageops::overlay(&mut grid, img, x, y);
    }
    Ok(grid)
}

/// Zero-filled image with the size and color type of `image`.
pub fn blank_like(image: &DynamicImage) -> DynamicImage {
    let (w, h) = (image.width(), image.height());
    match image {
        DynamicImage::ImageLuma8(_) => DynamicImage::new_luma8(w, h),
        DynamicImage::ImageLumaA8(_) => DynamicImage::new_luma_a8(w, h),
        DynamicImage::ImageRgb8(_) => DynamicImage::new_rgb8(w, h),
        DynamicImage::ImageLuma16(_) => DynamicImage::new_luma16(w, h),
        DynamicImage::ImageLumaA16(_) => DynamicImage::new_luma_a16(w, h),
        DynamicImage::ImageRgb16(_) => DynamicImage::new_rgb16(w, h),
        DynamicImage::ImageRgba16(_) => DynamicImage::new_rgba16(w, h),
        DynamicImage::ImageRgb32F(_) => DynamicImage::new_rgb32f(w, h),
        DynamicImage::ImageRgba32F(_) => DynamicImage::new_rgba32f(w, h),
        _ => DynamicImage::new_rgba8(w, h),
    }
}

/// Largest width and height among `images`.
pub fn max_cell_size(images: &[DynamicImage]) -> (u32, u32) {
    images
        .iter()
        .fold((0, 0), |(w, h), img| (w.max(img.width()), h.max(img.height())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, Rgba, RgbaImage};

    fn solid(w: u32, h: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([value, value, value])))
    }

    #[test]
    fn test_compose_places_cells_row_major() {
        let images = vec![solid(2, 2, 10), solid(2, 2, 20), solid(2, 2, 30), solid(2, 2, 40)];
        let grid = compose_grid(&images, 2, None).unwrap();
        assert_eq!((grid.width(), grid.height()), (4, 4));
        assert_eq!(grid.get_pixel(0, 0)[0], 10);
        assert_eq!(grid.get_pixel(3, 0)[0], 20);
        assert_eq!(grid.get_pixel(0, 3)[0], 30);
        assert_eq!(grid.get_pixel(3, 3)[0], 40);
    }

    #[test]
    fn test_compose_with_fixed_columns_leaves_black_tail() {
        let images = vec![solid(2, 2, 50), solid(2, 2, 60), solid(2, 2, 70)];
        let grid = compose_grid(&images, 2, Some(2)).unwrap();
        assert_eq!((grid.width(), grid.height()), (4, 4));
        assert_eq!(grid.get_pixel(3, 3)[0], 0);
    }

    #[test]
    fn test_compose_rejects_empty_input() {
        assert!(matches!(compose_grid(&[], 1, None), Err(SweepError::EmptyGrid)));
    }

    #[test]
    fn test_blank_like_keeps_shape_and_type() {
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 5, Rgba([9, 9, 9, 255])));
        let blank = blank_like(&rgba);
        assert_eq!(blank.dimensions(), (3, 5));
        assert_eq!(blank.color(), rgba.color());
        assert_eq!(blank.get_pixel(1, 1), Rgba([0, 0, 0, 0]));

        let rgb = solid(4, 2, 200);
        assert_eq!(blank_like(&rgb).color(), rgb.color());
    }

    #[test]
    fn test_max_cell_size() {
        assert_eq!(max_cell_size(&[solid(2, 5, 0), solid(4, 1, 0)]), (4, 5));
    }
}
