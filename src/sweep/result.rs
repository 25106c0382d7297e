//! Accumulated sweep output

use crate::grid::{blank_like, SplitRow};
use crate::pipeline::Processed;
use image::DynamicImage;
use log::warn;

/// Images of a sweep with index-aligned prompts, seeds and infotexts.
///
/// After the cell loop all four lists have equal length unless row-split
/// mode is active. Grid assembly then inserts grid images at the front;
/// the outermost grid only gets an infotext entry, so from that point on
/// `prompts` and `seeds` lag `images` by one.
#[derive(Debug, Clone, Default)]
pub struct ResultCollection {
    pub images: Vec<DynamicImage>,
    pub prompts: Vec<String>,
    pub seeds: Vec<i64>,
    pub infotexts: Vec<String>,
    /// Texts for the main grid (index 0) and each Z slice grid.
    pub grid_infotexts: Vec<Option<String>>,
    /// Row strips built in row-split mode.
    pub split_rows: Vec<SplitRow>,
}

impl ResultCollection {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_aligned(&self) -> bool {
        let n = self.images.len();
        self.prompts.len() == n && self.seeds.len() == n && self.infotexts.len() == n
    }

    /// Insert `image` at `at`, copying the metadata found at `from`.
    pub fn insert_with_meta_of(&mut self, at: usize, image: DynamicImage, from: usize) {
        let prompt = self.prompts.get(from).cloned().unwrap_or_default();
        let seed = self.seeds.get(from).copied().unwrap_or_default();
        let text = self.infotexts.get(from).cloned().unwrap_or_default();
        self.images.insert(at, image);
        self.prompts.insert(at.min(self.prompts.len()), prompt);
        self.seeds.insert(at.min(self.seeds.len()), seed);
        self.infotexts.insert(at.min(self.infotexts.len()), text);
    }

    /// Remove the entry at `at` from every list that has one.
    pub fn remove_entry(&mut self, at: usize) {
        if at < self.images.len() {
            self.images.remove(at);
        }
        if at < self.prompts.len() {
            self.prompts.remove(at);
        }
        if at < self.seeds.len() {
            self.seeds.remove(at);
        }
        if at < self.infotexts.len() {
            self.infotexts.remove(at);
        }
    }
}

#[derive(Debug)]
struct CellOutput {
    images: Vec<DynamicImage>,
    prompt: String,
    seed: i64,
    infotext: String,
}

/// Collects cell outputs by grid position while the loop runs in any order.
#[derive(Debug)]
pub(crate) struct CellSlots {
    slots: Vec<Option<CellOutput>>,
    /// Zeroed copy of the first real image, used for empty cells.
    placeholder: Option<DynamicImage>,
    keep_all_images: bool,
}

impl CellSlots {
    pub fn new(len: usize, keep_all_images: bool) -> Self {
        Self {
            slots: (0..len).map(|_| None).collect(),
            placeholder: None,
            keep_all_images,
        }
    }

    pub fn record(&mut self, slot: usize, mut processed: Processed) {
        if self.placeholder.is_none() {
            if let Some(first) = processed.images.first() {
                self.placeholder = Some(blank_like(first));
            }
        }
        if !self.keep_all_images {
            processed.images.truncate(1);
        }
        let infotext = processed.first_infotext();
        if let Some(entry) = self.slots.get_mut(slot) {
            *entry = Some(CellOutput {
                images: processed.images,
                prompt: processed.prompt,
                seed: processed.seed,
                infotext,
            });
        }
    }

    /// Flatten slots into a collection, filling empty cells with
    /// placeholders. `None` when no cell produced an image.
    pub fn finish(self) -> Option<ResultCollection> {
        let placeholder = match self.placeholder {
            Some(p) => p,
            None => {
                warn!("X/Y/Z plot failed to produce even a single image");
                return None;
            }
        };

        let mut result = ResultCollection::default();
        for cell in self.slots {
            let cell = cell.unwrap_or_else(|| CellOutput {
                images: Vec::new(),
                prompt: String::new(),
                seed: 0,
                infotext: String::new(),
            });
            let images = if cell.images.is_empty() { vec![placeholder.clone()] } else { cell.images };
            for image in images {
                result.images.push(image);
                result.prompts.push(cell.prompt.clone());
                result.seeds.push(cell.seed);
                result.infotexts.push(cell.infotext.clone());
            }
        }
        Some(result)
    }
}
