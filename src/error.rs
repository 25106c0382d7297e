//! Error type for sweep setup and grid assembly

/// Errors raised while validating or assembling a sweep.
///
/// Everything except `Image`/`Io` is a configuration problem caught
/// before the first generation call.
#[derive(thiserror::Error, Debug)]
pub enum SweepError {
    #[error("Unknown axis type: {0}")]
    UnknownAxis(String),
    #[error("Unknown sampler: {0}")]
    UnknownSampler(String),
    #[error("Unknown checkpoint: {0}")]
    UnknownCheckpoint(String),
    #[error("{label} value \"{value}\" out of range [{min}, {max}]")]
    OutOfRange {
        label: String,
        value: String,
        min: f64,
        max: f64,
    },
    #[error("Prompt S/R did not find {0} in prompt or negative prompt.")]
    PromptNotFound(String),
    #[error("Invalid {kind} value for {label}: {value:?}")]
    InvalidValue {
        label: String,
        kind: &'static str,
        value: String,
    },
    #[error("Invalid range {0:?}: {1}")]
    InvalidRange(String, String),
    #[error("Resulting grid would be too large ({megapixels} MPixels) (max configured size is {max} MPixels)")]
    GridTooLarge { megapixels: u64, max: u64 },
    #[error("Cannot compose a grid from zero images")]
    EmptyGrid,
    #[error("Legend has {labels} {axis} labels for a grid with {cells}")]
    LegendMismatch {
        axis: &'static str,
        labels: usize,
        cells: usize,
    },
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, SweepError>;
