//! Per-axis behavior: setters, display formatting, validation and choices

use super::registry::ModelCatalog;
use super::AxisValue;
use crate::error::{Result, SweepError};
use crate::pipeline::{GenerationConfig, OverrideValue};
use log::warn;
use std::path::Path;

/// Plain request fields an axis can overwrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Seed,
    Subseed,
    SubseedStrength,
    Steps,
    HrSecondPassSteps,
    CfgScale,
    ImageCfgScale,
    SamplerName,
    HrSamplerName,
    SMinUncond,
    SChurn,
    STmin,
    STmax,
    SNoise,
    Scheduler,
    Eta,
    DenoisingStrength,
    InitialNoiseMultiplier,
    HrUpscaler,
    InpaintingMaskWeight,
    RefinerCheckpoint,
    RefinerSwitchAt,
}

/// How a value is written into a request snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Apply {
    Nothing,
    Field(Field),
    /// Stored in `override_settings`; `boolean` coerces "true"/"false" strings.
    Override { key: &'static str, boolean: bool },
    PromptReplace,
    PromptOrder,
    Checkpoint,
    Vae,
    Styles,
    UniPcOrder,
    FaceRestore,
    Size,
}

impl Apply {
    pub fn run(
        &self,
        config: &mut GenerationConfig,
        value: &AxisValue,
        all: &[AxisValue],
        catalog: &dyn ModelCatalog,
    ) -> Result<()> {
        match self {
            Apply::Nothing => Ok(()),
            Apply::Field(field) => set_field(config, *field, value),
            Apply::Override { key, boolean } => {
                let stored = match value {
                    AxisValue::Str(text) if *boolean => OverrideValue::Bool(text.to_lowercase() == "true"),
                    AxisValue::Int(v) => OverrideValue::Int(*v),
                    AxisValue::Float(v) => OverrideValue::Float(*v),
                    other => OverrideValue::Text(other.to_string()),
                };
                config.override_settings.insert(key.to_string(), stored);
                Ok(())
            }
            Apply::PromptReplace => {
                let target = all.first().map(|v| v.to_string()).unwrap_or_default();
                if !config.prompt.contains(&target) && !config.negative_prompt.contains(&target) {
                    return Err(SweepError::PromptNotFound(target));
                }
                let replacement = value.to_string();
                config.prompt = config.prompt.replace(&target, &replacement);
                config.negative_prompt = config.negative_prompt.replace(&target, &replacement);
                Ok(())
            }
            Apply::PromptOrder => {
                if let AxisValue::Tokens(tokens) = value {
                    config.prompt = reorder_prompt(&config.prompt, tokens);
                }
                Ok(())
            }
            Apply::Checkpoint => {
                let name = value.to_string();
                let found = catalog
                    .closest_checkpoint(&name)
                    .ok_or(SweepError::UnknownCheckpoint(name))?;
                config
                    .override_settings
                    .insert("sd_model_checkpoint".to_string(), OverrideValue::Text(found));
                Ok(())
            }
            Apply::Vae => {
                let vae = find_vae(&value.to_string(), catalog);
                config.override_settings.insert("sd_vae".to_string(), OverrideValue::Text(vae));
                Ok(())
            }
            Apply::Styles => {
                let text = value.to_string();
                config.styles.extend(text.split(',').map(str::to_string));
                Ok(())
            }
            Apply::UniPcOrder => {
                let order = require_int(value, "UniPC Order")?;
                let capped = order.min(config.steps as i64 - 1);
                config
                    .override_settings
                    .insert("uni_pc_order".to_string(), OverrideValue::Int(capped));
                Ok(())
            }
            Apply::FaceRestore => {
                let opt = value.to_string().to_lowercase();
                let active = match opt.as_str() {
                    "codeformer" => {
                        config.face_restoration_model = Some("CodeFormer".to_string());
                        true
                    }
                    "gfpgan" => {
                        config.face_restoration_model = Some("GFPGAN".to_string());
                        true
                    }
                    other => matches!(other, "true" | "yes" | "y" | "1"),
                };
                config.restore_faces = active;
                Ok(())
            }
            Apply::Size => {
                let text = value.to_string();
                match parse_size(&text) {
                    Some((width, height)) => {
                        config.width = width;
                        config.height = height;
                    }
                    None => warn!("Invalid size in XYZ plot: {}", text),
                }
                Ok(())
            }
        }
    }
}

fn set_field(config: &mut GenerationConfig, field: Field, value: &AxisValue) -> Result<()> {
    let label = format!("{:?}", field);
    match field {
        Field::Seed => config.seed = require_int(value, &label)?,
        Field::Subseed => config.subseed = require_int(value, &label)?,
        Field::SubseedStrength => config.subseed_strength = require_float(value, &label)?,
        Field::Steps => config.steps = require_u32(value, &label)?,
        Field::HrSecondPassSteps => config.hr_second_pass_steps = require_u32(value, &label)?,
        Field::CfgScale => config.cfg_scale = require_float(value, &label)?,
        Field::ImageCfgScale => config.image_cfg_scale = Some(require_float(value, &label)?),
        Field::SamplerName => config.sampler_name = value.to_string(),
        Field::HrSamplerName => config.hr_sampler_name = Some(value.to_string()),
        Field::SMinUncond => config.s_min_uncond = require_float(value, &label)?,
        Field::SChurn => config.s_churn = require_float(value, &label)?,
        Field::STmin => config.s_tmin = require_float(value, &label)?,
        Field::STmax => config.s_tmax = require_float(value, &label)?,
        Field::SNoise => config.s_noise = require_float(value, &label)?,
        Field::Scheduler => config.scheduler = value.to_string(),
        Field::Eta => config.eta = Some(require_float(value, &label)?),
        Field::DenoisingStrength => config.denoising_strength = Some(require_float(value, &label)?),
        Field::InitialNoiseMultiplier => {
            config.initial_noise_multiplier = Some(require_float(value, &label)?)
        }
        Field::HrUpscaler => config.hr_upscaler = Some(value.to_string()),
        Field::InpaintingMaskWeight => {
            config.inpainting_mask_weight = Some(require_float(value, &label)?)
        }
        Field::RefinerCheckpoint => {
            let name = value.to_string();
            config.refiner_checkpoint = if is_none_name(&name) { None } else { Some(name) };
        }
        Field::RefinerSwitchAt => config.refiner_switch_at = Some(require_float(value, &label)?),
    }
    Ok(())
}

fn require_int(value: &AxisValue, label: &str) -> Result<i64> {
    value.as_int().ok_or_else(|| SweepError::InvalidValue {
        label: label.to_string(),
        kind: "integer",
        value: value.to_string(),
    })
}

fn require_u32(value: &AxisValue, label: &str) -> Result<u32> {
    let v = require_int(value, label)?;
    u32::try_from(v).map_err(|_| SweepError::InvalidValue {
        label: label.to_string(),
        kind: "non-negative integer",
        value: v.to_string(),
    })
}

fn require_float(value: &AxisValue, label: &str) -> Result<f64> {
    value.as_float().ok_or_else(|| SweepError::InvalidValue {
        label: label.to_string(),
        kind: "float",
        value: value.to_string(),
    })
}

fn is_none_name(name: &str) -> bool {
    matches!(name, "" | "None" | "none")
}

/// Move the given tokens so they appear in the prompt in the listed order,
/// reusing the slots where they were originally found.
pub fn reorder_prompt(prompt: &str, tokens: &[String]) -> String {
    let mut order: Vec<(Option<usize>, &String)> =
        tokens.iter().map(|t| (prompt.find(t.as_str()), t)).collect();
    // Missing tokens sort first, like a find() result of -1.
    order.sort_by_key(|(pos, _)| pos.map(|p| p as i64).unwrap_or(-1));

    let mut rest = prompt.to_string();
    let mut parts = Vec::with_capacity(order.len());
    for (_, token) in &order {
        match rest.find(token.as_str()) {
            Some(n) => {
                parts.push(rest[..n].to_string());
                rest = rest[n + token.len()..].to_string();
            }
            None => parts.push(String::new()),
        }
    }

    let mut rebuilt = String::new();
    for (part, token) in parts.iter().zip(tokens) {
        rebuilt.push_str(part);
        rebuilt.push_str(token);
    }
    rebuilt + &rest
}

fn parse_size(text: &str) -> Option<(u32, u32)> {
    let (width, height) = text.split_once('x')?;
    Some((width.trim().parse().ok()?, height.trim().parse().ok()?))
}

/// Resolve a VAE name: "auto"/"automatic", "none", or a case-insensitive
/// catalog entry, falling back to Automatic.
pub fn find_vae(name: &str, catalog: &dyn ModelCatalog) -> String {
    let name = name.trim().to_lowercase();
    match name.as_str() {
        "auto" | "automatic" => "Automatic".to_string(),
        "none" => "None".to_string(),
        _ => catalog
            .vaes()
            .into_iter()
            .find(|vae| vae.to_lowercase() == name)
            .unwrap_or_else(|| {
                warn!("No VAE found for {}; using Automatic", name);
                "Automatic".to_string()
            }),
    }
}

/// Display rendering of an axis value for legends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `"<label>: <value>"`
    AddLabel,
    Plain,
    JoinList,
    Nothing,
    RemovePath,
}

impl Format {
    pub fn render(&self, label: &str, value: &AxisValue) -> String {
        match self {
            Format::AddLabel => format!("{}: {}", label, value),
            Format::Plain | Format::JoinList => value.to_string(),
            Format::Nothing => String::new(),
            Format::RemovePath => {
                let text = value.to_string();
                Path::new(&text)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or(text)
            }
        }
    }
}

/// Validation run on the full value list before generation starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Confirm {
    Samplers,
    Checkpoints,
    CheckpointsOrNone,
    Range { min: f64, max: f64 },
    /// The first value must occur in the prompt or the negative prompt.
    PromptPresent,
}

impl Confirm {
    pub fn check(
        &self,
        label: &str,
        config: &GenerationConfig,
        values: &[AxisValue],
        catalog: &dyn ModelCatalog,
    ) -> Result<()> {
        match self {
            Confirm::Samplers => {
                let known: Vec<String> = catalog
                    .samplers()
                    .into_iter()
                    .chain(catalog.img2img_samplers())
                    .map(|s| s.to_lowercase())
                    .collect();
                for value in values {
                    let name = value.to_string();
                    if !known.contains(&name.to_lowercase()) {
                        return Err(SweepError::UnknownSampler(name));
                    }
                }
                Ok(())
            }
            Confirm::Checkpoints | Confirm::CheckpointsOrNone => {
                for value in values {
                    let name = value.to_string();
                    if *self == Confirm::CheckpointsOrNone && is_none_name(&name) {
                        continue;
                    }
                    if catalog.closest_checkpoint(&name).is_none() {
                        return Err(SweepError::UnknownCheckpoint(name));
                    }
                }
                Ok(())
            }
            Confirm::Range { min, max } => {
                for value in values {
                    let v = require_float(value, label)?;
                    if !(*min..=*max).contains(&v) {
                        return Err(SweepError::OutOfRange {
                            label: label.to_string(),
                            value: value.to_string(),
                            min: *min,
                            max: *max,
                        });
                    }
                }
                Ok(())
            }
            Confirm::PromptPresent => {
                let Some(first) = values.first() else {
                    return Ok(());
                };
                let target = first.to_string();
                if config.prompt.contains(&target) || config.negative_prompt.contains(&target) {
                    Ok(())
                } else {
                    Err(SweepError::PromptNotFound(target))
                }
            }
        }
    }
}

/// Source of an axis's enumerated legal values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choices {
    Samplers,
    Img2ImgSamplers,
    Checkpoints,
    CheckpointsOrNone,
    Schedulers,
    Upscalers,
    Vae,
    Styles,
    Boolean { reverse: bool },
    Static(&'static [&'static str]),
}

impl Choices {
    pub fn list(&self, catalog: &dyn ModelCatalog) -> Vec<String> {
        match self {
            Choices::Samplers => catalog.visible(catalog.samplers()),
            Choices::Img2ImgSamplers => catalog.visible(catalog.img2img_samplers()),
            Choices::Checkpoints => sorted_casefold(catalog.checkpoints()),
            Choices::CheckpointsOrNone => {
                let mut list = vec!["None".to_string()];
                list.extend(sorted_casefold(catalog.checkpoints()));
                list
            }
            Choices::Schedulers => catalog.schedulers(),
            Choices::Upscalers => catalog.upscalers(),
            Choices::Vae => {
                let mut list = vec!["Automatic".to_string(), "None".to_string()];
                list.extend(catalog.vaes());
                list
            }
            Choices::Styles => catalog.styles(),
            Choices::Boolean { reverse } => {
                let list = if *reverse { ["False", "True"] } else { ["True", "False"] };
                list.iter().map(|s| s.to_string()).collect()
            }
            Choices::Static(items) => items.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn sorted_casefold(mut names: Vec<String>) -> Vec<String> {
    names.sort_by_key(|name| name.to_lowercase());
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::registry::StaticCatalog;

    fn catalog() -> StaticCatalog {
        StaticCatalog {
            checkpoints: vec!["models/sdxl_base.safetensors".into(), "anime/Anything-v3.ckpt".into()],
            vaes: vec!["sdxl_vae.safetensors".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_prompt_replace_swaps_both_prompts() {
        let mut config = GenerationConfig {
            prompt: "a red car".into(),
            negative_prompt: "red tint".into(),
            ..Default::default()
        };
        let all = vec![AxisValue::Str("red".into()), AxisValue::Str("blue".into())];
        Apply::PromptReplace.run(&mut config, &all[1], &all, &catalog()).unwrap();
        assert_eq!(config.prompt, "a blue car");
        assert_eq!(config.negative_prompt, "blue tint");
    }

    #[test]
    fn test_prompt_replace_missing_target_fails() {
        let mut config = GenerationConfig { prompt: "a car".into(), ..Default::default() };
        let all = vec![AxisValue::Str("red".into())];
        let err = Apply::PromptReplace.run(&mut config, &all[0], &all, &catalog()).unwrap_err();
        assert!(matches!(err, SweepError::PromptNotFound(t) if t == "red"));
    }

    #[test]
    fn test_reorder_prompt() {
        let tokens = vec!["dog".to_string(), "cat".to_string()];
        assert_eq!(reorder_prompt("a cat and a dog, outside", &tokens), "a dog and a cat, outside");
        let same = vec!["cat".to_string(), "dog".to_string()];
        assert_eq!(reorder_prompt("a cat and a dog", &same), "a cat and a dog");
    }

    #[test]
    fn test_override_boolean_coercion() {
        let mut config = GenerationConfig::default();
        let apply = Apply::Override { key: "sgm_noise_multiplier", boolean: true };
        apply.run(&mut config, &AxisValue::Str("True".into()), &[], &catalog()).unwrap();
        assert_eq!(config.override_settings["sgm_noise_multiplier"], OverrideValue::Bool(true));
        apply.run(&mut config, &AxisValue::Str("no".into()), &[], &catalog()).unwrap();
        assert_eq!(config.override_settings["sgm_noise_multiplier"], OverrideValue::Bool(false));
    }

    #[test]
    fn test_uni_pc_order_capped_by_steps() {
        let mut config = GenerationConfig { steps: 3, ..Default::default() };
        Apply::UniPcOrder.run(&mut config, &AxisValue::Int(5), &[], &catalog()).unwrap();
        assert_eq!(config.override_settings["uni_pc_order"], OverrideValue::Int(2));
    }

    #[test]
    fn test_checkpoint_uses_closest_match() {
        let mut config = GenerationConfig::default();
        Apply::Checkpoint
            .run(&mut config, &AxisValue::Str("sdxl_base".into()), &[], &catalog())
            .unwrap();
        assert_eq!(
            config.override_settings["sd_model_checkpoint"],
            OverrideValue::Text("models/sdxl_base.safetensors".into())
        );
        let err = Apply::Checkpoint
            .run(&mut config, &AxisValue::Str("missing".into()), &[], &catalog())
            .unwrap_err();
        assert!(matches!(err, SweepError::UnknownCheckpoint(_)));
    }

    #[test]
    fn test_find_vae() {
        let catalog = catalog();
        assert_eq!(find_vae(" AUTO ", &catalog), "Automatic");
        assert_eq!(find_vae("none", &catalog), "None");
        assert_eq!(find_vae("SDXL_VAE.safetensors", &catalog), "sdxl_vae.safetensors");
        assert_eq!(find_vae("unknown", &catalog), "Automatic");
    }

    #[test]
    fn test_size_and_face_restore() {
        let mut config = GenerationConfig::default();
        Apply::Size.run(&mut config, &AxisValue::Str("768 x 640".into()), &[], &catalog()).unwrap();
        assert_eq!((config.width, config.height), (768, 640));
        Apply::Size.run(&mut config, &AxisValue::Str("huge".into()), &[], &catalog()).unwrap();
        assert_eq!((config.width, config.height), (768, 640));

        Apply::FaceRestore.run(&mut config, &AxisValue::Str("GFPGAN".into()), &[], &catalog()).unwrap();
        assert!(config.restore_faces);
        assert_eq!(config.face_restoration_model.as_deref(), Some("GFPGAN"));
        Apply::FaceRestore.run(&mut config, &AxisValue::Str("off".into()), &[], &catalog()).unwrap();
        assert!(!config.restore_faces);
    }

    #[test]
    fn test_format_variants() {
        assert_eq!(Format::AddLabel.render("CFG Scale", &AxisValue::Float(7.0)), "CFG Scale: 7.0");
        assert_eq!(Format::RemovePath.render("Checkpoint name", &AxisValue::Str("a/b/c.ckpt".into())), "c.ckpt");
        assert_eq!(Format::Nothing.render("Nothing", &AxisValue::Nothing), "");
        let tokens = AxisValue::Tokens(vec!["x".into(), "y".into()]);
        assert_eq!(Format::JoinList.render("Prompt order", &tokens), "x, y");
    }

    #[test]
    fn test_confirm_range_and_samplers() {
        let catalog = catalog();
        let config = GenerationConfig::default();
        let range = Confirm::Range { min: 0.0, max: 1.0 };
        assert!(range.check("Denoising", &config, &[AxisValue::Float(0.5)], &catalog).is_ok());
        let err = range.check("Denoising", &config, &[AxisValue::Float(1.5)], &catalog).unwrap_err();
        assert_eq!(err.to_string(), "Denoising value \"1.5\" out of range [0, 1]");

        let ok = [AxisValue::Str("euler A".into())];
        assert!(Confirm::Samplers.check("Sampler", &config, &ok, &catalog).is_ok());
        let bad = [AxisValue::Str("Nope".into())];
        assert!(matches!(
            Confirm::Samplers.check("Sampler", &config, &bad, &catalog),
            Err(SweepError::UnknownSampler(name)) if name == "Nope"
        ));
    }

    #[test]
    fn test_checkpoint_or_none_skips_none() {
        let values = [AxisValue::Str("None".into()), AxisValue::Str("Anything-v3".into())];
        let config = GenerationConfig::default();
        assert!(Confirm::CheckpointsOrNone.check("Refiner checkpoint", &config, &values, &catalog()).is_ok());
        assert!(Confirm::Checkpoints.check("Checkpoint name", &config, &values, &catalog()).is_err());
    }

    #[test]
    fn test_boolean_choices_order() {
        let catalog = catalog();
        assert_eq!(Choices::Boolean { reverse: true }.list(&catalog), vec!["False", "True"]);
        assert_eq!(Choices::Boolean { reverse: false }.list(&catalog), vec!["True", "False"]);
        assert_eq!(Choices::CheckpointsOrNone.list(&catalog)[0], "None");
    }
}
