//! Row-split assembly: one super grid of every image plus a strip grid
//! per row of `column_width` images.

use super::compose_grid;
use crate::error::Result;
use crate::save::{ImageSaver, SaveMeta};
use crate::sweep::ResultCollection;
use image::DynamicImage;
use log::{debug, info};
use std::path::Path;

pub const ROW_GRID_PREFIX: &str = "row_grid";

/// One horizontal strip with the metadata of its first image.
#[derive(Debug, Clone)]
pub struct SplitRow {
    pub image: DynamicImage,
    pub prompt: String,
    pub seed: i64,
    pub infotext: String,
}

/// Where and how strip grids are persisted.
pub struct RowSink<'a> {
    pub saver: &'a mut dyn ImageSaver,
    pub out_dir: &'a Path,
    pub extension: &'a str,
}

/// Build strips of `column_width` images each.
///
/// Metadata lists are indexed like `images`; each strip takes the entry at
/// its first image.
pub fn split_rows(
    images: &[DynamicImage],
    prompts: &[String],
    seeds: &[i64],
    infotexts: &[String],
    column_width: usize,
) -> Result<Vec<SplitRow>> {
    if column_width == 0 || images.is_empty() {
        return Ok(Vec::new());
    }
    let rows = (images.len() + column_width - 1) / column_width;

    let mut strips = Vec::with_capacity(rows);
    for i in 0..rows {
        let low = i * column_width;
        let high = (low + column_width).min(images.len());
        debug!("Row {} spans images {}..{}", i, low, high);
        strips.push(SplitRow {
            image: compose_grid(&images[low..high], 1, Some(column_width))?,
            prompt: prompts.get(low).cloned().unwrap_or_default(),
            seed: seeds.get(low).copied().unwrap_or_default(),
            infotext: infotexts.get(low).cloned().unwrap_or_default(),
        });
    }
    Ok(strips)
}

/// Insert the super grid at position 0 and, with `cool_split`, build and
/// save every row strip as it is produced.
///
/// Only `images` receives the super grid; the metadata lists keep their
/// per-image indexing.
pub fn row_split(
    result: &mut ResultCollection,
    column_width: usize,
    cool_split: bool,
    mut sink: Option<RowSink<'_>>,
) -> Result<()> {
    let column_width = column_width.max(1);
    let rows = (result.images.len() + column_width - 1) / column_width;
    info!("Row-split assembly: {} image(s) into {} row(s) of {}", result.images.len(), rows, column_width);

    let grid = compose_grid(&result.images, rows, Some(column_width))?;
    result.images.insert(0, grid);

    if !cool_split {
        return Ok(());
    }

    let strips = split_rows(
        &result.images[1..],
        &result.prompts,
        &result.seeds,
        &result.infotexts,
        column_width,
    )?;
    for strip in strips {
        if let Some(sink) = sink.as_mut() {
            let meta = SaveMeta {
                prefix: ROW_GRID_PREFIX.to_string(),
                info: strip.infotext.clone(),
                extension: sink.extension.to_string(),
                prompt: strip.prompt.clone(),
                seed: strip.seed,
                grid: true,
            };
            sink.saver.save(&strip.image, sink.out_dir, &meta)?;
        }
        result.split_rows.push(strip);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};
    use std::path::PathBuf;

    fn solid(value: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([value, value, value])))
    }

    fn collection(n: usize) -> ResultCollection {
        ResultCollection {
            images: (0..n).map(|i| solid(10 * (i as u8 + 1))).collect(),
            prompts: (0..n).map(|i| format!("p{}", i)).collect(),
            seeds: (0..n as i64).collect(),
            infotexts: (0..n).map(|i| format!("t{}", i)).collect(),
            ..Default::default()
        }
    }

    #[derive(Default)]
    struct Recorder {
        saved: Vec<SaveMeta>,
    }

    impl ImageSaver for Recorder {
        fn save(&mut self, _image: &DynamicImage, out_dir: &Path, meta: &SaveMeta) -> Result<PathBuf> {
            self.saved.push(meta.clone());
            Ok(out_dir.join(format!("{}.png", self.saved.len())))
        }
    }

    #[test]
    fn test_super_grid_inserted_without_metadata() {
        let mut result = collection(5);
        row_split(&mut result, 2, false, None).unwrap();
        assert_eq!(result.images.len(), 6);
        assert_eq!(result.prompts.len(), 5);
        assert_eq!(result.images[0].dimensions(), (4, 6));
        assert!(result.split_rows.is_empty());
    }

    #[test]
    fn test_cool_split_saves_each_row() {
        let mut result = collection(5);
        let mut recorder = Recorder::default();
        let sink = RowSink { saver: &mut recorder, out_dir: Path::new("grids"), extension: "png" };
        row_split(&mut result, 2, true, Some(sink)).unwrap();

        assert_eq!(result.split_rows.len(), 3);
        assert_eq!(result.split_rows[1].seed, 2);
        assert_eq!(result.split_rows[2].infotext, "t4");
        // The last strip keeps the full width with an empty tail.
        assert_eq!(result.split_rows[2].image.dimensions(), (4, 2));
        assert_eq!(result.split_rows[2].image.get_pixel(3, 0)[0], 0);

        let prompts: Vec<&str> = recorder.saved.iter().map(|m| m.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["p0", "p2", "p4"]);
        assert!(recorder.saved.iter().all(|m| m.prefix == ROW_GRID_PREFIX && m.grid));
    }

    #[test]
    fn test_split_rows_without_width_is_empty() {
        assert!(split_rows(&[solid(1)], &[], &[], &[], 0).unwrap().is_empty());
    }
}
