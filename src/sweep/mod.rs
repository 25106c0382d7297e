//! The sweep driver: resolves the three axes, runs one generation per
//! cell and hands the collected images to grid assembly.

pub mod infotext;
pub mod result;

pub use infotext::{GridInfotexts, SCRIPT_TITLE};
pub use result::ResultCollection;

use crate::axis::{
    choose_order, resolve_axis, Axis, AxisInfo, AxisRegistry, AxisSpec, AxisValue, LoopOrder, ModelCatalog,
};
use crate::config::{OutputOptions, SweepOptions};
use crate::error::{Result, SweepError};
use crate::grid::{assemble, AssembleOptions, Annotator, GridLabels, LegendAnnotator};
use crate::pipeline::{
    random_seed, ErrorReporter, GenerationConfig, GenerationMode, LogReporter, Pipeline, Processed, SweepState,
    RANDOM_SEED,
};
use crate::save::ImageSaver;
use log::{debug, info};
use rand::Rng;
use result::CellSlots;
use std::path::PathBuf;

/// Everything a sweep needs besides its collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepRequest {
    pub base: GenerationConfig,
    pub x: AxisSpec,
    pub y: AxisSpec,
    pub z: AxisSpec,
    pub options: SweepOptions,
    pub output: OutputOptions,
}

impl SweepRequest {
    pub fn new(base: GenerationConfig) -> Self {
        Self {
            base,
            x: AxisSpec::nothing(),
            y: AxisSpec::nothing(),
            z: AxisSpec::nothing(),
            options: SweepOptions::default(),
            output: OutputOptions::default(),
        }
    }

    pub fn axis(&self, axis: Axis) -> &AxisSpec {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
        }
    }

    pub fn axis_mut(&mut self, axis: Axis) -> &mut AxisSpec {
        match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
            Axis::Z => &mut self.z,
        }
    }

    /// Exchange type, values and selection of two axes.
    pub fn swap_axes(&mut self, a: Axis, b: Axis) {
        if a == b {
            return;
        }
        let first = self.axis(a).clone();
        let second = std::mem::replace(self.axis_mut(b), first);
        *self.axis_mut(a) = second;
    }
}

/// Resolved axes and the base config after seed fixing.
#[derive(Debug, Clone)]
pub struct SweepPlan {
    pub base: GenerationConfig,
    pub x: AxisInfo,
    pub y: AxisInfo,
    pub z: AxisInfo,
    pub order: LoopOrder,
    pub total_steps: u64,
}

impl SweepPlan {
    pub fn cell_count(&self) -> usize {
        self.x.len() * self.y.len() * self.z.len()
    }

    pub fn labels(&self) -> GridLabels {
        GridLabels { x: self.x.labels(), y: self.y.labels(), z: self.z.labels() }
    }
}

pub struct SweepRunner<'a> {
    registry: &'a AxisRegistry,
    catalog: &'a dyn ModelCatalog,
    state: &'a dyn SweepState,
    saver: &'a mut dyn ImageSaver,
    reporter: &'a dyn ErrorReporter,
    annotator: &'a dyn Annotator,
}

impl<'a> SweepRunner<'a> {
    pub fn new(
        registry: &'a AxisRegistry,
        catalog: &'a dyn ModelCatalog,
        state: &'a dyn SweepState,
        saver: &'a mut dyn ImageSaver,
    ) -> Self {
        Self {
            registry,
            catalog,
            state,
            saver,
            reporter: &LogReporter,
            annotator: &LegendAnnotator,
        }
    }

    pub fn with_reporter(mut self, reporter: &'a dyn ErrorReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_annotator(mut self, annotator: &'a dyn Annotator) -> Self {
        self.annotator = annotator;
        self
    }

    fn resolve(&self, spec: &AxisSpec, request: &SweepRequest, base: &GenerationConfig) -> Result<AxisInfo> {
        let option = self.registry.lookup(&spec.axis_type)?;
        resolve_axis(option, spec, request.options.csv_mode, base, self.catalog)
    }

    /// Validate the request and work out everything the loop needs.
    /// Fails before any generation on bad values or an oversized grid.
    pub fn plan<R: Rng>(&self, request: &SweepRequest, rng: &mut R) -> Result<SweepPlan> {
        let options = &request.options;
        let mut base = request.base.clone();
        if !options.no_fixed_seeds {
            base.fix_seed(rng);
        }
        if !request.output.return_grid {
            base.batch_size = 1;
        }

        let mut x = self.resolve(&request.x, request, &base)?;
        let mut y = self.resolve(&request.y, request, &base)?;
        let mut z = self.resolve(&request.z, request, &base)?;

        let cells = (x.len() * y.len() * z.len()) as f64;
        let megapixels = (cells * base.width as f64 * base.height as f64 / 1_000_000.0).round() as u64;
        if megapixels >= request.output.img_max_size_mp {
            return Err(SweepError::GridTooLarge { megapixels, max: request.output.img_max_size_mp });
        }

        if !options.no_fixed_seeds {
            for axis in [&mut x, &mut y, &mut z] {
                fix_axis_seeds(axis, rng);
            }
        }

        let total_steps = total_steps(&base, &x, &y, &z);
        let order = choose_order(x.option.cost, y.option.cost, z.option.cost);
        debug!("Loop order: {} > {} > {}", order.outer, order.middle, order.inner);

        Ok(SweepPlan { base, x, y, z, order, total_steps })
    }

    pub fn run(&mut self, pipeline: &mut dyn Pipeline, request: &SweepRequest) -> Result<ResultCollection> {
        self.run_with_rng(pipeline, request, &mut rand::thread_rng())
    }

    /// Plan, sweep every cell and assemble the grids.
    ///
    /// Returns an empty collection when no cell produced an image.
    pub fn run_with_rng<R: Rng>(
        &mut self,
        pipeline: &mut dyn Pipeline,
        request: &SweepRequest,
        rng: &mut R,
    ) -> Result<ResultCollection> {
        let plan = self.plan(request, rng)?;
        let (nx, ny, nz) = (plan.x.len(), plan.y.len(), plan.z.len());
        let per_cell = plan.base.n_iter * plan.base.batch_size;
        info!(
            "X/Y/Z plot will create {} images on {} {}x{} grid{}{}. (Total steps to process: {})",
            plan.cell_count() * per_cell as usize,
            nz,
            nx,
            ny,
            if nz > 1 { "s" } else { "" },
            if per_cell > 1 { format!("; {} images per cell", per_cell) } else { String::new() },
            plan.total_steps
        );

        let collected = self.sweep(pipeline, &plan, &request.options)?;
        self.state.finish();
        let mut result = match collected {
            Some(result) => result,
            None => return Ok(ResultCollection::default()),
        };

        let options = &request.options;
        let assemble_options = AssembleOptions {
            draw_legend: options.draw_legend,
            include_lone_images: options.include_lone_images,
            include_sub_grids: options.include_sub_grids,
            margin_size: options.margin_size,
            column_width: options.column_width,
            cool_split: options.cool_split,
            grid_save: request.output.grid_save,
            outpath_grids: PathBuf::from(&request.output.outpath_grids),
            grid_format: request.output.grid_format.clone(),
        };
        assemble(&mut result, &plan.labels(), &assemble_options, self.annotator, &mut *self.saver)?;
        Ok(result)
    }

    fn sweep(
        &mut self,
        pipeline: &mut dyn Pipeline,
        plan: &SweepPlan,
        options: &SweepOptions,
    ) -> Result<Option<ResultCollection>> {
        let (nx, ny, nz) = (plan.x.len(), plan.y.len(), plan.z.len());
        let list_size = plan.cell_count();
        let repeats = options.multiple_run_count.max(1);
        let total = list_size * repeats;
        let cells = plan.order.cells(nx, ny, nz);

        self.state.begin(total);
        let mut slots = CellSlots::new(total, options.column_width > 0);
        let mut texts = GridInfotexts::new(nz, !options.no_fixed_seeds);

        for repeat in 0..repeats {
            let mut base = plan.base.clone();
            if repeats > 1 {
                info!("Multi run {} of {}", repeat + 1, repeats);
                if base.seed != RANDOM_SEED {
                    base.seed += repeat as i64;
                }
            }

            for (n, &(ix, iy, iz)) in cells.iter().enumerate() {
                self.state.set_job(&format!("{} out of {}", repeat * list_size + n + 1, total));
                let processed = self.cell(pipeline, plan, &base, (ix, iy, iz), options, &mut texts)?;
                let index = ix + iy * nx + iz * nx * ny;
                slots.record(repeat * list_size + index, processed);
            }
        }

        Ok(slots.finish().map(|mut result| {
            result.grid_infotexts = texts.into_texts();
            result
        }))
    }

    fn cell(
        &self,
        pipeline: &mut dyn Pipeline,
        plan: &SweepPlan,
        base: &GenerationConfig,
        (ix, iy, iz): (usize, usize, usize),
        options: &SweepOptions,
        texts: &mut GridInfotexts,
    ) -> Result<Processed> {
        if self.state.interrupted() || self.state.stopping() {
            return Ok(Processed::empty(base));
        }

        let mut config = base.clone();
        for (axis, i) in [(&plan.x, ix), (&plan.y, iy), (&plan.z, iz)] {
            axis.option.apply_value(&mut config, &axis.values[i], &axis.values, self.catalog)?;
        }

        let xdim = if options.vary_seeds_x { plan.x.len() } else { 1 };
        let ydim = if options.vary_seeds_y { plan.y.len() } else { 1 };
        let before = config.seed;
        if options.vary_seeds_x {
            config.seed += ix as i64;
        }
        if options.vary_seeds_y {
            config.seed += (iy * xdim) as i64;
        }
        if options.vary_seeds_z {
            config.seed += (iz * xdim * ydim) as i64;
        }
        if config.seed != before {
            debug!("Cell ({}, {}, {}) seed {} -> {}", ix, iy, iz, before, config.seed);
        }

        let processed = match pipeline.process(&config) {
            Ok(processed) => processed,
            Err(err) => {
                self.reporter.report(&err, "generating image for xyz plot");
                Processed::empty(base)
            }
        };

        texts.observe(&config, (ix, iy, iz), [&plan.x, &plan.y, &plan.z]);
        Ok(processed)
    }
}

fn fix_axis_seeds<R: Rng>(axis: &mut AxisInfo, rng: &mut R) {
    if !axis.option.is_seed() {
        return;
    }
    for value in axis.values.iter_mut() {
        if *value == AxisValue::Int(RANDOM_SEED) {
            *value = AxisValue::Int(random_seed(rng));
        }
    }
}

fn sum_of(axis: &AxisInfo) -> u64 {
    axis.values.iter().filter_map(AxisValue::as_int).map(|v| v.max(0) as u64).sum()
}

/// Sampling steps across the whole sweep, for the progress summary.
pub fn total_steps(base: &GenerationConfig, x: &AxisInfo, y: &AxisInfo, z: &AxisInfo) -> u64 {
    let (nx, ny, nz) = (x.len() as u64, y.len() as u64, z.len() as u64);
    let on_axis = |label: &str| -> Option<u64> {
        if x.option.label == label {
            Some(sum_of(x) * ny * nz)
        } else if y.option.label == label {
            Some(sum_of(y) * nx * nz)
        } else if z.option.label == label {
            Some(sum_of(z) * nx * ny)
        } else {
            None
        }
    };

    let mut total = on_axis("Steps").unwrap_or(base.steps as u64 * nx * ny * nz);
    if base.mode == GenerationMode::Txt2Img && base.enable_hr {
        if let Some(hires) = on_axis("Hires steps") {
            total += hires;
        } else if base.hr_second_pass_steps > 0 {
            total += base.hr_second_pass_steps as u64 * nx * ny * nz;
        } else {
            total *= 2;
        }
    }
    total * base.n_iter.max(1) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::StaticCatalog;
    use crate::pipeline::synthetic::GradientPipeline;
    use crate::pipeline::ConsoleState;
    use crate::save::SaveMeta;
    use image::DynamicImage;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::path::Path;

    #[derive(Default)]
    struct NoSave;

    impl ImageSaver for NoSave {
        fn save(&mut self, _image: &DynamicImage, out_dir: &Path, _meta: &SaveMeta) -> Result<PathBuf> {
            Ok(out_dir.to_path_buf())
        }
    }

    fn request(x: AxisSpec, y: AxisSpec) -> SweepRequest {
        let base = GenerationConfig { seed: 100, width: 8, height: 8, prompt: "fox".into(), ..Default::default() };
        let mut request = SweepRequest::new(base);
        request.x = x;
        request.y = y;
        request.output.grid_save = false;
        request
    }

    #[test]
    fn test_swap_axes() {
        let mut request = request(AxisSpec::new("Steps", "10, 20"), AxisSpec::new("CFG Scale", "5"));
        request.swap_axes(Axis::X, Axis::Y);
        assert_eq!(request.x.axis_type, "CFG Scale");
        assert_eq!(request.y.values, "10, 20");
        request.swap_axes(Axis::Y, Axis::Y);
        assert_eq!(request.y.axis_type, "Steps");
    }

    #[test]
    fn test_plan_fixes_random_seeds() {
        let registry = AxisRegistry::full();
        let catalog = StaticCatalog::default();
        let state = ConsoleState::new();
        let mut saver = NoSave;
        let runner = SweepRunner::new(&registry, &catalog, &state, &mut saver);

        let mut req = request(AxisSpec::new("Seed", "-1, 5"), AxisSpec::nothing());
        req.base.seed = -1;
        let plan = runner.plan(&req, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_ne!(plan.base.seed, -1);
        assert_ne!(plan.x.values[0], AxisValue::Int(-1));
        assert_eq!(plan.x.values[1], AxisValue::Int(5));

        req.options.no_fixed_seeds = true;
        let plan = runner.plan(&req, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(plan.base.seed, -1);
        assert_eq!(plan.x.values[0], AxisValue::Int(-1));
    }

    #[test]
    fn test_plan_rejects_oversized_grid() {
        let registry = AxisRegistry::full();
        let catalog = StaticCatalog::default();
        let state = ConsoleState::new();
        let mut saver = NoSave;
        let runner = SweepRunner::new(&registry, &catalog, &state, &mut saver);

        let mut req = request(AxisSpec::new("Steps", "1-10"), AxisSpec::new("CFG Scale", "1-10"));
        req.base.width = 1024;
        req.base.height = 1024;
        req.output.img_max_size_mp = 50;
        let err = runner.plan(&req, &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert!(matches!(err, SweepError::GridTooLarge { megapixels: 105, max: 50 }));
    }

    #[test]
    fn test_plan_orders_costly_axis_outside() {
        let registry = AxisRegistry::full();
        let catalog = StaticCatalog { checkpoints: vec!["a.safetensors".into()], ..Default::default() };
        let state = ConsoleState::new();
        let mut saver = NoSave;
        let runner = SweepRunner::new(&registry, &catalog, &state, &mut saver);

        let mut req = request(AxisSpec::new("Steps", "10"), AxisSpec::new("Checkpoint name", "a"));
        req.options.csv_mode = true;
        let plan = runner.plan(&req, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(plan.order.outer, Axis::Y);
    }

    #[test]
    fn test_batch_clamped_without_grid_return() {
        let registry = AxisRegistry::full();
        let catalog = StaticCatalog::default();
        let state = ConsoleState::new();
        let mut saver = NoSave;
        let runner = SweepRunner::new(&registry, &catalog, &state, &mut saver);

        let mut req = request(AxisSpec::nothing(), AxisSpec::nothing());
        req.base.batch_size = 4;
        req.output.return_grid = false;
        assert_eq!(runner.plan(&req, &mut StdRng::seed_from_u64(1)).unwrap().base.batch_size, 1);
    }

    #[test]
    fn test_total_steps() {
        let registry = AxisRegistry::full();
        let info = |label: &str, values: Vec<i64>| AxisInfo {
            option: *registry.get(label).unwrap(),
            values: values.into_iter().map(AxisValue::Int).collect(),
            raw: String::new(),
        };
        let nothing = AxisInfo { option: *registry.nothing(), values: vec![AxisValue::Nothing], raw: String::new() };
        let mut base = GenerationConfig { steps: 20, n_iter: 2, ..Default::default() };

        let steps = info("Steps", vec![10, 20]);
        let seeds = info("Seed", vec![1, 2, 3]);
        assert_eq!(total_steps(&base, &steps, &seeds, &nothing), 30 * 3 * 2);
        assert_eq!(total_steps(&base, &seeds, &nothing, &nothing), 20 * 3 * 2);

        base.enable_hr = true;
        assert_eq!(total_steps(&base, &seeds, &nothing, &nothing), 20 * 3 * 2 * 2);
        base.hr_second_pass_steps = 5;
        assert_eq!(total_steps(&base, &seeds, &nothing, &nothing), (60 + 15) * 2);
    }

    #[test]
    fn test_run_with_synthetic_pipeline() {
        let registry = AxisRegistry::full();
        let catalog = StaticCatalog::default();
        let state = ConsoleState::new();
        let mut saver = NoSave;
        let mut runner = SweepRunner::new(&registry, &catalog, &state, &mut saver);

        let mut req = request(AxisSpec::new("Steps", "4, 8"), AxisSpec::new("CFG Scale", "3, 9"));
        req.options.include_lone_images = true;
        req.options.draw_legend = false;
        let mut pipeline = GradientPipeline::new();
        let result = runner.run_with_rng(&mut pipeline, &req, &mut StdRng::seed_from_u64(1)).unwrap();

        assert_eq!(pipeline.calls(), 4);
        // outer grid + 4 cells; the slice grid is dropped
        assert_eq!(result.images.len(), 5);
        assert_eq!((result.images[0].width(), result.images[0].height()), (16, 16));
        assert!(result.infotexts[0].contains("X Type: Steps"));
        assert!(result.infotexts[0].contains("Y Type: CFG Scale"));
    }
}
