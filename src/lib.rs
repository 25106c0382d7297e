pub mod axis;
pub mod config;
pub mod error;
pub mod grid;
pub mod pipeline;
pub mod save;
pub mod sweep;

// Re-export common types
pub use axis::{AxisRegistry, AxisSpec, ModelCatalog, StaticCatalog};
pub use config::{load_config, SweepFile, SweepOptions, OutputOptions};
pub use error::{Result, SweepError};
pub use pipeline::{GenerationConfig, Pipeline, Processed};
pub use sweep::{ResultCollection, SweepRequest, SweepRunner};

pub mod logging {
    use log::LevelFilter;
    use env_logger::Builder;
    use std::io::Write;

    /// Timestamped console logging; `RUST_LOG` overrides the Info default.
    pub fn init_logger() {
        Builder::new()
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{} [{}] - {}",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                    record.level(),
                    record.args()
                )
            })
            .filter(None, LevelFilter::Info)
            .parse_env("RUST_LOG")
            .init();
    }
}
