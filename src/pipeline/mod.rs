//! Collaborators the sweep drives: the image generation pipeline, the
//! progress/cancellation state and the error reporter.

pub mod config;
pub mod synthetic;

pub use config::{random_seed, GenerationConfig, GenerationMode, OverrideValue, RANDOM_SEED};

use image::DynamicImage;
use log::{error, info};
use std::sync::atomic::{AtomicBool, Ordering};

/// Output of one generation call.
#[derive(Debug, Clone)]
pub struct Processed {
    pub images: Vec<DynamicImage>,
    pub prompt: String,
    pub seed: i64,
    pub infotexts: Vec<String>,
}

impl Processed {
    /// Result standing in for a cell that produced nothing.
    pub fn empty(config: &GenerationConfig) -> Self {
        Self {
            images: Vec::new(),
            prompt: config.prompt.clone(),
            seed: config.seed,
            infotexts: vec![String::new()],
        }
    }

    pub fn first_infotext(&self) -> String {
        self.infotexts.first().cloned().unwrap_or_default()
    }
}

/// Opaque image generation pipeline.
///
/// Called once per cell with an independent snapshot; errors are
/// reported and turned into an empty result by the caller.
pub trait Pipeline {
    fn process(&mut self, config: &GenerationConfig) -> anyhow::Result<Processed>;
}

/// Progress reporting and cooperative cancellation.
pub trait SweepState {
    fn begin(&self, _job_count: usize) {}
    fn set_job(&self, label: &str);
    fn interrupted(&self) -> bool;
    fn stopping(&self) -> bool;
    fn finish(&self) {}
}

/// Sink for per-cell generation failures.
pub trait ErrorReporter {
    fn report(&self, err: &anyhow::Error, context: &str);
}

/// Reports errors through the `log` facade and swallows them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, err: &anyhow::Error, context: &str) {
        error!("Error {}: {:#}", context, err);
    }
}

/// Console progress with interrupt/stop flags that other threads may set.
#[derive(Default)]
pub struct ConsoleState {
    interrupted: AtomicBool,
    stopping: AtomicBool,
    #[cfg(feature = "progress-bar")]
    bar: once_cell::sync::OnceCell<indicatif::ProgressBar>,
}

impl ConsoleState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
    }
}

impl SweepState for ConsoleState {
    fn begin(&self, job_count: usize) {
        #[cfg(feature = "progress-bar")]
        {
            let bar = self.bar.get_or_init(|| {
                let bar = indicatif::ProgressBar::new(job_count as u64);
                if let Ok(style) = indicatif::ProgressStyle::with_template(
                    "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
                ) {
                    bar.set_style(style);
                }
                bar
            });
            bar.set_length(job_count as u64);
            bar.set_position(0);
        }
        #[cfg(not(feature = "progress-bar"))]
        info!("Starting {} jobs", job_count);
    }

    fn set_job(&self, label: &str) {
        #[cfg(feature = "progress-bar")]
        if let Some(bar) = self.bar.get() {
            bar.set_message(label.to_string());
            bar.inc(1);
            return;
        }
        info!("{}", label);
    }

    fn interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    fn stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    fn finish(&self) {
        #[cfg(feature = "progress-bar")]
        if let Some(bar) = self.bar.get() {
            bar.finish_with_message("done");
        }
    }
}
