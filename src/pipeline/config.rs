//! Generation request snapshot shared by the sweep and the pipeline

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Seed value meaning "pick one at random".
pub const RANDOM_SEED: i64 = -1;

/// Which host tab the sweep runs in; some axes only apply to one of them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    #[default]
    Txt2Img,
    Img2Img,
}

/// Value stored in the per-request settings overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OverrideValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for OverrideValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverrideValue::Bool(v) => write!(f, "{}", if *v { "True" } else { "False" }),
            OverrideValue::Int(v) => write!(f, "{}", v),
            OverrideValue::Float(v) => write!(f, "{}", v),
            OverrideValue::Text(v) => write!(f, "{}", v),
        }
    }
}

/// One generation request. The sweep clones it per cell and mutates the copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub mode: GenerationMode,
    pub prompt: String,
    pub negative_prompt: String,
    pub styles: Vec<String>,
    pub seed: i64,
    pub subseed: i64,
    pub subseed_strength: f64,
    pub steps: u32,
    pub cfg_scale: f64,
    pub image_cfg_scale: Option<f64>,
    pub sampler_name: String,
    pub scheduler: String,
    pub width: u32,
    pub height: u32,
    pub batch_size: u32,
    pub n_iter: u32,
    pub enable_hr: bool,
    pub hr_second_pass_steps: u32,
    pub hr_sampler_name: Option<String>,
    pub hr_upscaler: Option<String>,
    pub denoising_strength: Option<f64>,
    pub s_min_uncond: f64,
    pub s_churn: f64,
    pub s_tmin: f64,
    pub s_tmax: f64,
    pub s_noise: f64,
    pub eta: Option<f64>,
    pub initial_noise_multiplier: Option<f64>,
    pub inpainting_mask_weight: Option<f64>,
    pub restore_faces: bool,
    pub face_restoration_model: Option<String>,
    pub refiner_checkpoint: Option<String>,
    pub refiner_switch_at: Option<f64>,
    pub override_settings: BTreeMap<String, OverrideValue>,
    /// Extra "key: value" pairs appended to the infotext, in insertion order.
    pub extra_generation_params: Vec<(String, String)>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            mode: GenerationMode::Txt2Img,
            prompt: String::new(),
            negative_prompt: String::new(),
            styles: Vec::new(),
            seed: RANDOM_SEED,
            subseed: RANDOM_SEED,
            subseed_strength: 0.0,
            steps: 20,
            cfg_scale: 7.0,
            image_cfg_scale: None,
            sampler_name: "Euler a".to_string(),
            scheduler: "Automatic".to_string(),
            width: 512,
            height: 512,
            batch_size: 1,
            n_iter: 1,
            enable_hr: false,
            hr_second_pass_steps: 0,
            hr_sampler_name: None,
            hr_upscaler: None,
            denoising_strength: None,
            s_min_uncond: 0.0,
            s_churn: 0.0,
            s_tmin: 0.0,
            s_tmax: 0.0,
            s_noise: 1.0,
            eta: None,
            initial_noise_multiplier: None,
            inpainting_mask_weight: None,
            restore_faces: false,
            face_restoration_model: None,
            refiner_checkpoint: None,
            refiner_switch_at: None,
            override_settings: BTreeMap::new(),
            extra_generation_params: Vec::new(),
        }
    }
}

impl GenerationConfig {
    /// Replace random seeds with concrete ones so every cell shares them.
    pub fn fix_seed<R: Rng>(&mut self, rng: &mut R) {
        if self.seed == RANDOM_SEED {
            self.seed = random_seed(rng);
        }
        if self.subseed == RANDOM_SEED {
            self.subseed = random_seed(rng);
        }
    }

    /// Insert or replace an extra infotext parameter, keeping first-insert order.
    pub fn set_extra_param(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.extra_generation_params.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.extra_generation_params.push((key.to_string(), value)),
        }
    }

    /// Descriptive text in the host's "parameters" format: prompt line,
    /// negative prompt line, then comma separated `Key: value` pairs.
    pub fn create_infotext(&self) -> String {
        let mut params: Vec<(String, String)> = vec![
            ("Steps".into(), self.steps.to_string()),
            ("Sampler".into(), self.sampler_name.clone()),
        ];
        if !self.scheduler.is_empty() && self.scheduler != "Automatic" {
            params.push(("Schedule type".into(), self.scheduler.clone()));
        }
        params.push(("CFG scale".into(), self.cfg_scale.to_string()));
        if let Some(scale) = self.image_cfg_scale {
            params.push(("Image CFG scale".into(), scale.to_string()));
        }
        params.push(("Seed".into(), self.seed.to_string()));
        if self.subseed_strength > 0.0 {
            params.push(("Variation seed".into(), self.subseed.to_string()));
            params.push(("Variation seed strength".into(), self.subseed_strength.to_string()));
        }
        if self.restore_faces {
            let model = self.face_restoration_model.as_deref().unwrap_or("CodeFormer");
            params.push(("Face restoration".into(), model.to_string()));
        }
        params.push(("Size".into(), format!("{}x{}", self.width, self.height)));
        for (key, value) in &self.override_settings {
            params.push((key.clone(), value.to_string()));
        }
        if let Some(strength) = self.denoising_strength {
            params.push(("Denoising strength".into(), strength.to_string()));
        }
        if let Some(refiner) = &self.refiner_checkpoint {
            params.push(("Refiner".into(), refiner.clone()));
        }
        if self.enable_hr {
            if let Some(upscaler) = &self.hr_upscaler {
                params.push(("Hires upscaler".into(), upscaler.clone()));
            }
            if self.hr_second_pass_steps > 0 {
                params.push(("Hires steps".into(), self.hr_second_pass_steps.to_string()));
            }
        }
        params.extend(self.extra_generation_params.iter().cloned());

        let generation_params = params
            .iter()
            .map(|(k, v)| format!("{}: {}", k, quote(v)))
            .collect::<Vec<_>>()
            .join(", ");

        let negative = if self.negative_prompt.is_empty() {
            String::new()
        } else {
            format!("\nNegative prompt: {}", self.negative_prompt)
        };

        format!("{}{}\n{}", self.prompt, negative, generation_params)
    }
}

/// Random seed in the range the host uses for 32-bit generators.
pub fn random_seed<R: Rng>(rng: &mut R) -> i64 {
    rng.gen_range(0..4_294_967_294i64)
}

fn quote(text: &str) -> String {
    if !text.contains([',', '\n', ':']) {
        return text.to_string();
    }
    serde_json::to_string(text).unwrap_or_else(|_| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_fix_seed_only_replaces_random() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut config = GenerationConfig { seed: 42, ..Default::default() };
        config.fix_seed(&mut rng);
        assert_eq!(config.seed, 42);
        assert_ne!(config.subseed, RANDOM_SEED);
        assert!(config.subseed >= 0);
    }

    #[test]
    fn test_infotext_quotes_values_with_commas() {
        let mut config = GenerationConfig {
            prompt: "a cat".into(),
            negative_prompt: "blurry".into(),
            seed: 5,
            ..Default::default()
        };
        config.set_extra_param("X Values", "1, 2, 3");
        config.set_extra_param("Script", "X/Y/Z plot");
        config.set_extra_param("X Values", "4, 5");

        let text = config.create_infotext();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("a cat"));
        assert_eq!(lines.next(), Some("Negative prompt: blurry"));
        let params = lines.next().unwrap();
        assert!(params.starts_with("Steps: 20, Sampler: Euler a, CFG scale: 7, Seed: 5"));
        assert!(params.ends_with("X Values: \"4, 5\", Script: X/Y/Z plot"));
    }
}
