//! Infotexts for the main grid and the per-slice grids

use crate::axis::AxisInfo;
use crate::pipeline::GenerationConfig;

pub const SCRIPT_TITLE: &str = "X/Y/Z plot";

/// Builds the descriptive texts that replace the auto-copied infotexts of
/// grid images: slot 0 for the main grid, slot `1 + iz` per Z slice.
#[derive(Debug, Clone)]
pub struct GridInfotexts {
    texts: Vec<Option<String>>,
    fixed_seeds: bool,
}

impl GridInfotexts {
    pub fn new(z_count: usize, fixed_seeds: bool) -> Self {
        Self { texts: vec![None; 1 + z_count], fixed_seeds }
    }

    fn describe(&self, config: &mut GenerationConfig, name: &str, axis: &AxisInfo) {
        if axis.option.is_nothing() {
            return;
        }
        config.set_extra_param(&format!("{} Type", name), axis.option.label);
        config.set_extra_param(&format!("{} Values", name), axis.raw.clone());
        if axis.option.is_seed() && self.fixed_seeds {
            let fixed: Vec<String> = axis.values.iter().map(|v| v.to_string()).collect();
            config.set_extra_param(&format!("Fixed {} Values", name), fixed.join(", "));
        }
    }

    /// Record texts from the config of cell `(ix, iy, iz)`; only the first
    /// cell of each slice contributes.
    pub fn observe(
        &mut self,
        cell: &GenerationConfig,
        (ix, iy, iz): (usize, usize, usize),
        axes: [&AxisInfo; 3],
    ) {
        if ix != 0 || iy != 0 {
            return;
        }
        let [x, y, z] = axes;
        let mut config = cell.clone();

        let slice = 1 + iz;
        if matches!(self.texts.get(slice), Some(None)) {
            config.set_extra_param("Script", SCRIPT_TITLE);
            self.describe(&mut config, "X", x);
            self.describe(&mut config, "Y", y);
            self.texts[slice] = Some(config.create_infotext());
        }

        if iz == 0 && self.texts[0].is_none() {
            self.describe(&mut config, "Z", z);
            self.texts[0] = Some(config.create_infotext());
        }
    }

    pub fn into_texts(self) -> Vec<Option<String>> {
        self.texts
    }
}
