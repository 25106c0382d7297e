//! Deterministic stand-in pipeline that paints gradient images
//!
//! Useful for dry runs of a sweep layout without a model loaded.

use super::{GenerationConfig, Pipeline, Processed};
use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Paints one gradient per requested image, colored by seed and shaded by
/// CFG scale, with stripe frequency following the step count.
#[derive(Debug, Default, Clone)]
pub struct GradientPipeline {
    calls: usize,
}

impl GradientPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl Pipeline for GradientPipeline {
    fn process(&mut self, config: &GenerationConfig) -> anyhow::Result<Processed> {
        self.calls += 1;
        let count = (config.batch_size.max(1) * config.n_iter.max(1)) as usize;
        debug!(
            "Painting {} gradient(s) {}x{} for seed {}",
            count, config.width, config.height, config.seed
        );

        let mut images = Vec::with_capacity(count);
        let mut infotexts = Vec::with_capacity(count);
        for idx in 0..count {
            let seed = config.seed.wrapping_add(idx as i64);
            images.push(DynamicImage::ImageRgb8(paint_gradient(config, seed)));
            infotexts.push(config.create_infotext());
        }

        Ok(Processed {
            images,
            prompt: config.prompt.clone(),
            seed: config.seed,
            infotexts,
        })
    }
}

fn paint_gradient(config: &GenerationConfig, seed: i64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed as u64);
    let color1: [u8; 3] = [rng.gen(), rng.gen(), rng.gen()];
    let color2: [u8; 3] = [rng.gen(), rng.gen(), rng.gen()];
    let shade = (config.cfg_scale / 30.0).clamp(0.0, 1.0) as f32;
    let stripe = config.steps.max(1);
    let (width, height) = (config.width.max(1), config.height.max(1));

    ImageBuffer::from_fn(width, height, |x, y| {
        let t = y as f32 / height as f32;
        let band = if (x * stripe / width) % 2 == 0 { 1.0 } else { 1.0 - 0.5 * shade };
        let mix = |a: u8, b: u8| ((a as f32 * (1.0 - t) + b as f32 * t) * band) as u8;
        Rgb([mix(color1[0], color2[0]), mix(color1[1], color2[1]), mix(color1[2], color2[2])])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_is_deterministic_per_seed() {
        let config = GenerationConfig { seed: 3, width: 16, height: 8, ..Default::default() };
        let mut pipeline = GradientPipeline::new();
        let a = pipeline.process(&config).unwrap();
        let b = pipeline.process(&config).unwrap();
        assert_eq!(pipeline.calls(), 2);
        assert_eq!(a.images.len(), 1);
        assert_eq!(a.images[0].to_rgb8().as_raw(), b.images[0].to_rgb8().as_raw());
        assert_eq!((a.images[0].width(), a.images[0].height()), (16, 8));
    }

    #[test]
    fn test_batch_produces_one_image_per_item() {
        let config = GenerationConfig { batch_size: 2, n_iter: 2, width: 4, height: 4, ..Default::default() };
        let processed = GradientPipeline::new().process(&config).unwrap();
        assert_eq!(processed.images.len(), 4);
        assert_eq!(processed.infotexts.len(), 4);
    }
}
