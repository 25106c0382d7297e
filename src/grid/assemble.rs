//! Turning the flat sweep output into grid images

use super::annotate::{label_blocks, Annotator, GridAnnotation};
use super::split::{row_split, RowSink};
use super::{compose_grid, max_cell_size};
use crate::error::Result;
use crate::save::{ImageSaver, SaveMeta};
use crate::sweep::ResultCollection;
use log::{debug, info};
use std::path::PathBuf;

pub const GRID_PREFIX: &str = "xyz_grid";

/// Formatted value labels of the three axes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridLabels {
    pub x: Vec<String>,
    pub y: Vec<String>,
    pub z: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AssembleOptions {
    pub draw_legend: bool,
    pub include_lone_images: bool,
    pub include_sub_grids: bool,
    pub margin_size: u32,
    pub column_width: usize,
    pub cool_split: bool,
    pub grid_save: bool,
    pub outpath_grids: PathBuf,
    pub grid_format: String,
}

/// Build grids in place, save them if asked, then drop what the caller
/// chose not to keep.
pub fn assemble(
    result: &mut ResultCollection,
    labels: &GridLabels,
    options: &AssembleOptions,
    annotator: &dyn Annotator,
    saver: &mut dyn ImageSaver,
) -> Result<()> {
    if options.column_width > 0 {
        return assemble_rows(result, options, saver);
    }

    let z_count = labels.z.len().max(1);
    build_slice_grids(result, labels, options, annotator)?;
    build_outer_grid(result, labels, options, annotator, z_count)?;

    for (i, text) in result.grid_infotexts.iter().enumerate().take(1 + z_count) {
        if let (Some(text), Some(slot)) = (text, result.infotexts.get_mut(i)) {
            *slot = text.clone();
        }
    }

    if !options.include_lone_images {
        result.images.truncate(z_count + 1);
    }

    if options.grid_save {
        let grid_count = if z_count > 1 { z_count + 1 } else { 1 };
        for g in 0..grid_count.min(result.images.len()) {
            // prompts and seeds have no entry for the outer grid
            let adj = g.saturating_sub(1);
            save_grid(result, saver, options, g, adj, None)?;
            if !options.include_sub_grids {
                break;
            }
        }
    }

    if !options.include_sub_grids {
        for _ in 0..z_count {
            result.remove_entry(1);
        }
    }
    Ok(())
}

fn build_slice_grids(
    result: &mut ResultCollection,
    labels: &GridLabels,
    options: &AssembleOptions,
    annotator: &dyn Annotator,
) -> Result<()> {
    let (nx, ny) = (labels.x.len().max(1), labels.y.len().max(1));
    let per_slice = nx * ny;
    let hor_texts = label_blocks(&labels.x);
    let ver_texts = label_blocks(&labels.y);

    for i in 0..labels.z.len().max(1) {
        // each earlier slice already had its grid inserted in front
        let start = i * per_slice + i;
        let end = (start + per_slice).min(result.images.len());
        let cells = &result.images[start.min(end)..end];
        debug!("Slice {} uses images {}..{}", i, start, end);

        let mut grid = compose_grid(cells, ny, None)?;
        if options.draw_legend {
            let (w, h) = max_cell_size(cells);
            grid = annotator.annotate(&grid, w, h, &hor_texts, &ver_texts, options.margin_size)?;
        }
        result.insert_with_meta_of(i, grid, start);
    }
    Ok(())
}

fn build_outer_grid(
    result: &mut ResultCollection,
    labels: &GridLabels,
    options: &AssembleOptions,
    annotator: &dyn Annotator,
    z_count: usize,
) -> Result<()> {
    let slices = &result.images[..z_count.min(result.images.len())];
    let mut grid = compose_grid(slices, 1, None)?;
    if options.draw_legend {
        let (w, h) = max_cell_size(slices);
        let title_texts = label_blocks(&labels.z);
        grid = annotator.annotate(&grid, w, h, &title_texts, &[GridAnnotation::blank()], 0)?;
    }

    result.images.insert(0, grid);
    let text = result.infotexts.first().cloned().unwrap_or_default();
    result.infotexts.insert(0, text);
    Ok(())
}

fn save_grid(
    result: &ResultCollection,
    saver: &mut dyn ImageSaver,
    options: &AssembleOptions,
    index: usize,
    meta_index: usize,
    info: Option<&str>,
) -> Result<()> {
    let info = match info {
        Some(text) => text.to_string(),
        None => result.infotexts.get(index).cloned().unwrap_or_default(),
    };
    let meta = SaveMeta {
        prefix: GRID_PREFIX.to_string(),
        info,
        extension: options.grid_format.clone(),
        prompt: result.prompts.get(meta_index).cloned().unwrap_or_default(),
        seed: result.seeds.get(meta_index).copied().unwrap_or_default(),
        grid: true,
    };
    saver.save(&result.images[index], &options.outpath_grids, &meta)?;
    Ok(())
}

fn assemble_rows(
    result: &mut ResultCollection,
    options: &AssembleOptions,
    saver: &mut dyn ImageSaver,
) -> Result<()> {
    info!("Column width {} set, assembling row grids", options.column_width);
    let sink = RowSink {
        saver: &mut *saver,
        out_dir: &options.outpath_grids,
        extension: &options.grid_format,
    };
    row_split(result, options.column_width, options.cool_split, Some(sink))?;

    if options.grid_save {
        // the super grid has no infotext entry of its own
        let main_text = result.grid_infotexts.first().cloned().flatten();
        save_grid(result, saver, options, 0, 0, main_text.as_deref())?;
    }
    if !options.include_lone_images {
        result.images.truncate(1);
    }
    Ok(())
}
