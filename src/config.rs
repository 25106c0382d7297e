//! YAML sweep files

use crate::axis::{AxisSpec, StaticCatalog};
use crate::pipeline::GenerationConfig;
use crate::sweep::SweepRequest;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top level of a sweep file: `job`, `config` and optional `meta`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepFile {
    pub job: String,
    pub config: SweepConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<MetaConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub name: Option<String>,
    pub generation: GenerationConfig,
    pub x: AxisSpec,
    pub y: AxisSpec,
    pub z: AxisSpec,
    pub options: SweepOptions,
    pub output: OutputOptions,
    pub catalog: StaticCatalog,
}

/// Switches that shape the sweep and the assembled grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepOptions {
    pub draw_legend: bool,
    pub include_lone_images: bool,
    pub include_sub_grids: bool,
    pub no_fixed_seeds: bool,
    pub vary_seeds_x: bool,
    pub vary_seeds_y: bool,
    pub vary_seeds_z: bool,
    /// Pixels between grid cells when a legend is drawn.
    pub margin_size: u32,
    /// Read axis values from the free-text field even for axes with choices.
    pub csv_mode: bool,
    /// Positive values switch to row-split assembly with this many columns.
    pub column_width: usize,
    pub cool_split: bool,
    pub multiple_run_count: usize,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            draw_legend: true,
            include_lone_images: false,
            include_sub_grids: false,
            no_fixed_seeds: false,
            vary_seeds_x: false,
            vary_seeds_y: false,
            vary_seeds_z: false,
            margin_size: 0,
            csv_mode: false,
            column_width: 0,
            cool_split: false,
            multiple_run_count: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputOptions {
    pub outpath_grids: String,
    pub grid_format: String,
    pub grid_save: bool,
    /// When false the sweep forces a batch size of 1.
    pub return_grid: bool,
    pub img_max_size_mp: u64,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            outpath_grids: "outputs/xyz-grids".to_string(),
            grid_format: "png".to_string(),
            grid_save: true,
            return_grid: true,
            img_max_size_mp: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub author: String,
    pub version: String,
    pub description: String,
}

impl SweepFile {
    pub fn request(&self) -> SweepRequest {
        SweepRequest {
            base: self.config.generation.clone(),
            x: self.config.x.clone(),
            y: self.config.y.clone(),
            z: self.config.z.clone(),
            options: self.config.options.clone(),
            output: self.config.output.clone(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<SweepFile> {
    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: SweepFile = serde_yaml::from_str(&config_str)
        .with_context(|| "Failed to parse YAML config")?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
job: xyz_plot
config:
  name: cfg vs steps
  generation:
    prompt: a red fox
    seed: 42
    width: 64
    height: 64
  x:
    type: CFG Scale
    values: "5-7"
  y:
    type: Steps
    values: "10, 20"
  z:
    type: Nothing
  options:
    include_lone_images: true
    vary_seeds_x: true
  output:
    grid_save: false
  catalog:
    checkpoints: ["sd15.safetensors"]
meta:
  author: someone
  version: "1"
  description: sample
"#;

    #[test]
    fn test_load_config_reads_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let sweep = load_config(file.path()).unwrap();
        assert_eq!(sweep.job, "xyz_plot");
        assert_eq!(sweep.config.generation.prompt, "a red fox");
        assert_eq!(sweep.config.generation.steps, 20);
        assert_eq!(sweep.config.x.axis_type, "CFG Scale");
        assert_eq!(sweep.config.z.values, "");
        assert!(sweep.config.options.include_lone_images);
        assert!(sweep.config.options.draw_legend);
        assert_eq!(sweep.config.options.multiple_run_count, 1);
        assert!(!sweep.config.output.grid_save);
        assert_eq!(sweep.config.output.grid_format, "png");
        assert_eq!(sweep.config.catalog.checkpoints, vec!["sd15.safetensors".to_string()]);

        let request = sweep.request();
        assert_eq!(request.base.seed, 42);
        assert_eq!(request.y.values, "10, 20");
    }

    #[test]
    fn test_load_config_reports_missing_file() {
        let err = load_config(Path::new("/nonexistent/sweep.yaml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
