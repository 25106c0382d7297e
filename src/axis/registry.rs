//! Catalog of sweepable axes and the model lookup tables they consult

use super::apply::Apply::Override;
use super::apply::{Apply, Choices, Confirm, Field, Format};
use super::ValueKind::{Float, Int, Permutation, Str};
use super::{AxisOption, ValueKind, NOTHING};
use crate::error::{Result, SweepError};
use crate::pipeline::GenerationMode;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name lookups owned by the host: samplers, checkpoints, VAEs and friends.
pub trait ModelCatalog {
    fn samplers(&self) -> Vec<String>;
    fn img2img_samplers(&self) -> Vec<String>;
    fn checkpoints(&self) -> Vec<String>;
    fn vaes(&self) -> Vec<String>;
    fn schedulers(&self) -> Vec<String>;
    fn upscalers(&self) -> Vec<String>;
    fn styles(&self) -> Vec<String>;

    fn hidden_samplers(&self) -> Vec<String> {
        Vec::new()
    }

    /// Drop samplers the user chose to hide from menus.
    fn visible(&self, samplers: Vec<String>) -> Vec<String> {
        let hidden = self.hidden_samplers();
        samplers.into_iter().filter(|s| !hidden.contains(s)).collect()
    }

    /// Best checkpoint for a user-typed name: exact title, then a
    /// case-insensitive match on the file name or stem, then the shortest
    /// title containing the name.
    fn closest_checkpoint(&self, name: &str) -> Option<String> {
        let checkpoints = self.checkpoints();
        if let Some(exact) = checkpoints.iter().find(|c| c.as_str() == name) {
            return Some(exact.clone());
        }

        let wanted = name.to_lowercase();
        let by_file = checkpoints.iter().find(|c| {
            let path = Path::new(c.as_str());
            let file = path.file_name().map(|f| f.to_string_lossy().to_lowercase());
            let stem = path.file_stem().map(|f| f.to_string_lossy().to_lowercase());
            c.to_lowercase() == wanted
                || file.as_deref() == Some(wanted.as_str())
                || stem.as_deref() == Some(wanted.as_str())
        });
        if let Some(found) = by_file {
            return Some(found.clone());
        }

        checkpoints
            .iter()
            .filter(|c| c.to_lowercase().contains(&wanted))
            .min_by_key(|c| c.len())
            .cloned()
    }
}

/// Lookup tables given up front, e.g. from a sweep file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticCatalog {
    pub samplers: Vec<String>,
    pub img2img_samplers: Vec<String>,
    pub hide_samplers: Vec<String>,
    pub checkpoints: Vec<String>,
    pub vaes: Vec<String>,
    pub schedulers: Vec<String>,
    pub latent_upscale_modes: Vec<String>,
    pub upscalers: Vec<String>,
    pub styles: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for StaticCatalog {
    fn default() -> Self {
        let samplers = strings(&[
            "DPM++ 2M",
            "DPM++ SDE",
            "DPM++ 2M SDE",
            "Euler a",
            "Euler",
            "LMS",
            "Heun",
            "DDIM",
            "UniPC",
        ]);
        Self {
            img2img_samplers: samplers.clone(),
            samplers,
            hide_samplers: Vec::new(),
            checkpoints: Vec::new(),
            vaes: Vec::new(),
            schedulers: strings(&["Automatic", "Uniform", "Karras", "Exponential", "SGM Uniform"]),
            latent_upscale_modes: strings(&["Latent", "Latent (nearest)", "Latent (bicubic)"]),
            upscalers: strings(&["None", "Lanczos", "Nearest"]),
            styles: Vec::new(),
        }
    }
}

impl ModelCatalog for StaticCatalog {
    fn samplers(&self) -> Vec<String> {
        self.samplers.clone()
    }

    fn img2img_samplers(&self) -> Vec<String> {
        self.img2img_samplers.clone()
    }

    fn checkpoints(&self) -> Vec<String> {
        self.checkpoints.clone()
    }

    fn vaes(&self) -> Vec<String> {
        self.vaes.clone()
    }

    fn schedulers(&self) -> Vec<String> {
        self.schedulers.clone()
    }

    fn upscalers(&self) -> Vec<String> {
        let mut list = self.latent_upscale_modes.clone();
        list.extend(self.upscalers.iter().cloned());
        list
    }

    fn styles(&self) -> Vec<String> {
        self.styles.clone()
    }

    fn hidden_samplers(&self) -> Vec<String> {
        self.hide_samplers.clone()
    }
}

const fn field(label: &'static str, kind: ValueKind, field: Field) -> AxisOption {
    AxisOption::new(label, kind, Apply::Field(field))
}

const fn setting(label: &'static str, kind: ValueKind, key: &'static str) -> AxisOption {
    AxisOption::new(label, kind, Override { key, boolean: false })
}

const fn switch(label: &'static str, key: &'static str) -> AxisOption {
    AxisOption::new(label, Str, Override { key, boolean: true })
        .choices(Choices::Boolean { reverse: true })
}

/// Every axis the sweep knows about, in menu order.
pub const AXIS_OPTIONS: &[AxisOption] = &[
    AxisOption::new(NOTHING, Str, Apply::Nothing).format(Format::Nothing),
    field("Seed", Int, Field::Seed),
    field("Var. seed", Int, Field::Subseed),
    field("Var. strength", Float, Field::SubseedStrength).confirm(Confirm::Range { min: 0.0, max: 1.0 }),
    field("Steps", Int, Field::Steps),
    field("Hires steps", Int, Field::HrSecondPassSteps).txt2img(),
    field("CFG Scale", Float, Field::CfgScale),
    field("Image CFG Scale", Float, Field::ImageCfgScale).img2img(),
    AxisOption::new("Prompt S/R", Str, Apply::PromptReplace)
        .format(Format::Plain)
        .confirm(Confirm::PromptPresent),
    AxisOption::new("Prompt order", Permutation, Apply::PromptOrder).format(Format::JoinList),
    field("Sampler", Str, Field::SamplerName)
        .format(Format::Plain)
        .confirm(Confirm::Samplers)
        .choices(Choices::Samplers)
        .txt2img(),
    field("Hires sampler", Str, Field::HrSamplerName)
        .confirm(Confirm::Samplers)
        .choices(Choices::Img2ImgSamplers)
        .txt2img(),
    field("Sampler", Str, Field::SamplerName)
        .format(Format::Plain)
        .confirm(Confirm::Samplers)
        .choices(Choices::Img2ImgSamplers)
        .img2img(),
    AxisOption::new("Checkpoint name", Str, Apply::Checkpoint)
        .format(Format::RemovePath)
        .confirm(Confirm::Checkpoints)
        .cost(1.0)
        .choices(Choices::Checkpoints),
    field("Negative Guidance minimum sigma", Float, Field::SMinUncond),
    field("Sigma Churn", Float, Field::SChurn),
    field("Sigma min", Float, Field::STmin),
    field("Sigma max", Float, Field::STmax),
    field("Sigma noise", Float, Field::SNoise),
    field("Schedule type", Str, Field::Scheduler).choices(Choices::Schedulers),
    setting("Schedule min sigma", Float, "sigma_min"),
    setting("Schedule max sigma", Float, "sigma_max"),
    setting("Schedule rho", Float, "rho"),
    setting("Beta schedule alpha", Float, "beta_dist_alpha"),
    setting("Beta schedule beta", Float, "beta_dist_beta"),
    field("Eta", Float, Field::Eta),
    setting("Clip skip", Int, "CLIP_stop_at_last_layers").confirm(Confirm::Range { min: 1.0, max: 12.0 }),
    field("Denoising", Float, Field::DenoisingStrength).confirm(Confirm::Range { min: 0.0, max: 1.0 }),
    field("Initial noise multiplier", Float, Field::InitialNoiseMultiplier),
    setting("Extra noise", Float, "img2img_extra_noise"),
    field("Hires upscaler", Str, Field::HrUpscaler).choices(Choices::Upscalers).txt2img(),
    field("Cond. Image Mask Weight", Float, Field::InpaintingMaskWeight).img2img(),
    AxisOption::new("VAE", Str, Apply::Vae).cost(0.7).choices(Choices::Vae),
    AxisOption::new("Styles", Str, Apply::Styles).choices(Choices::Styles),
    AxisOption::new("UniPC Order", Int, Apply::UniPcOrder).cost(0.5),
    AxisOption::new("Face restore", Str, Apply::FaceRestore).format(Format::Plain),
    setting("Token merging ratio", Float, "token_merging_ratio"),
    setting("Token merging ratio high-res", Float, "token_merging_ratio_hr"),
    switch("Always discard next-to-last sigma", "always_discard_next_to_last_sigma"),
    switch("SGM noise multiplier", "sgm_noise_multiplier"),
    field("Refiner checkpoint", Str, Field::RefinerCheckpoint)
        .format(Format::RemovePath)
        .confirm(Confirm::CheckpointsOrNone)
        .cost(1.0)
        .choices(Choices::CheckpointsOrNone),
    field("Refiner switch at", Float, Field::RefinerSwitchAt).confirm(Confirm::Range { min: 0.01, max: 1.0 }),
    setting("RNG source", Str, "randn_source").choices(Choices::Static(&["GPU", "CPU", "NV"])),
    setting("FP8 mode", Str, "fp8_storage")
        .cost(0.9)
        .choices(Choices::Static(&["Disable", "Enable for SDXL", "Enable"])),
    AxisOption::new("Size", Str, Apply::Size),
];

/// The axes offered for one generation mode, built once and passed around.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisRegistry {
    options: Vec<AxisOption>,
}

impl AxisRegistry {
    /// All options regardless of mode; duplicated labels resolve to the first.
    pub fn full() -> Self {
        Self { options: AXIS_OPTIONS.to_vec() }
    }

    pub fn for_mode(mode: GenerationMode) -> Self {
        let options = AXIS_OPTIONS
            .iter()
            .filter(|opt| opt.applicability.allows(mode))
            .copied()
            .collect();
        Self { options }
    }

    pub fn options(&self) -> &[AxisOption] {
        &self.options
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.options.iter().map(|opt| opt.label).collect()
    }

    pub fn get(&self, label: &str) -> Option<&AxisOption> {
        self.options.iter().find(|opt| opt.label == label)
    }

    /// Like `get`, but an empty label selects "Nothing".
    pub fn lookup(&self, label: &str) -> Result<&AxisOption> {
        let label = if label.trim().is_empty() { NOTHING } else { label.trim() };
        self.get(label).ok_or_else(|| SweepError::UnknownAxis(label.to_string()))
    }

    pub fn nothing(&self) -> &AxisOption {
        &self.options[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_unique_per_mode() {
        for mode in [GenerationMode::Txt2Img, GenerationMode::Img2Img] {
            let registry = AxisRegistry::for_mode(mode);
            let mut labels = registry.labels();
            let total = labels.len();
            labels.sort();
            labels.dedup();
            assert_eq!(labels.len(), total, "duplicate label in {:?}", mode);
            assert_eq!(registry.nothing().label, NOTHING);
        }
    }

    #[test]
    fn test_mode_filtering() {
        let txt = AxisRegistry::for_mode(GenerationMode::Txt2Img);
        let img = AxisRegistry::for_mode(GenerationMode::Img2Img);
        assert!(txt.get("Hires steps").is_some());
        assert!(img.get("Hires steps").is_none());
        assert!(img.get("Image CFG Scale").is_some());
        assert!(txt.get("Image CFG Scale").is_none());
        assert_eq!(txt.get("Sampler").unwrap().choices, Some(Choices::Samplers));
        assert_eq!(img.get("Sampler").unwrap().choices, Some(Choices::Img2ImgSamplers));
    }

    #[test]
    fn test_costs() {
        let registry = AxisRegistry::full();
        assert_eq!(registry.get("Checkpoint name").unwrap().cost, 1.0);
        assert_eq!(registry.get("VAE").unwrap().cost, 0.7);
        assert_eq!(registry.get("Steps").unwrap().cost, 0.0);
    }

    #[test]
    fn test_lookup_unknown_axis() {
        let registry = AxisRegistry::full();
        assert_eq!(registry.lookup("").unwrap().label, NOTHING);
        assert!(matches!(registry.lookup("Bogus"), Err(SweepError::UnknownAxis(_))));
    }

    #[test]
    fn test_closest_checkpoint() {
        let catalog = StaticCatalog {
            checkpoints: vec![
                "sd15/v1-5-pruned.safetensors".into(),
                "sd15/v1-5-pruned-emaonly.safetensors".into(),
                "xl/SDXL_base.safetensors".into(),
            ],
            ..Default::default()
        };
        assert_eq!(catalog.closest_checkpoint("sdxl_base").as_deref(), Some("xl/SDXL_base.safetensors"));
        assert_eq!(
            catalog.closest_checkpoint("v1-5-pruned.safetensors").as_deref(),
            Some("sd15/v1-5-pruned.safetensors")
        );
        assert_eq!(catalog.closest_checkpoint("pruned").as_deref(), Some("sd15/v1-5-pruned.safetensors"));
        assert_eq!(catalog.closest_checkpoint("flux"), None);
    }

    #[test]
    fn test_hidden_samplers_not_offered() {
        let catalog = StaticCatalog { hide_samplers: vec!["LMS".into()], ..Default::default() };
        let choices = Choices::Samplers.list(&catalog);
        assert!(!choices.contains(&"LMS".to_string()));
        assert!(choices.contains(&"Euler a".to_string()));
    }
}
