use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use flowgram_core::consts::DEFAULT_BLOCK_FRAMES;
use flowgram_core::flow::PhaseFlowEstimator;
use flowgram_core::frame::FrameIndex;
use flowgram_core::io::image_io::save_unit_tiff16;
use flowgram_core::pipeline::{PassOutcome, PipelineObserver};
use flowgram_core::session::{FlowSession, SessionOptions};
use flowgram_core::source::SerFrameSource;
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::Array2;
use tracing::Level;

use super::config::RunConfig;
use crate::summary::print_run_summary;

#[derive(Args)]
pub struct RunArgs {
    /// Input SER file
    pub file: PathBuf,

    /// Analysis config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Angular buckets per frame
    #[arg(long)]
    pub pools: Option<usize>,

    /// Clipping ceiling as a fraction of the frame area
    #[arg(long)]
    pub max_value: Option<f32>,

    /// Fold the pool axis in half to show left/right asymmetry
    #[arg(long)]
    pub mirror: bool,

    /// Flow block size in pixels
    #[arg(long)]
    pub block_size: Option<usize>,

    /// Report progress every N frames
    #[arg(long, default_value = "100")]
    pub interval: usize,

    /// Worker threads for flow estimation (default: all cores)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Also write the rendered (normalized, transposed) flowgram as 16-bit TIFF
    #[arg(long)]
    pub render: Option<PathBuf>,

    /// Also write the focus-band waveform as CSV
    #[arg(long)]
    pub wave: Option<PathBuf>,

    /// Output file path (PNG, or TIFF by extension)
    #[arg(short, long, default_value = "flowgram.png")]
    pub output: PathBuf,
}

/// Routes pipeline events onto the progress bar.
struct BarObserver {
    bar: ProgressBar,
}

impl PipelineObserver for BarObserver {
    fn pass_started(&self, start: FrameIndex) {
        if start > 0 {
            self.bar.set_message(format!("Resume @{start}"));
        } else {
            self.bar.set_message("Reading");
        }
    }

    fn pass_finished(&self, outcome: PassOutcome) {
        if outcome == PassOutcome::Complete {
            self.bar.set_message("Draining");
        }
    }

    fn message(&self, level: Level, text: &str) {
        if level <= Level::WARN {
            self.bar.println(text);
        }
    }
}

pub fn run(args: &RunArgs) -> Result<()> {
    let mut config = match args.config {
        Some(ref path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    apply_overrides(&mut config, args);
    config.flow.validate().context("Invalid analysis settings")?;

    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure worker threads")?;
    }

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg:20} [{bar:40}] {pos}%")?
            .progress_chars("=> "),
    );

    let source = SerFrameSource::open(&args.file)
        .with_context(|| format!("Failed to open {}", args.file.display()))?;
    let options = SessionOptions {
        coordinator: config.coordinator.clone(),
        observer: Arc::new(BarObserver { bar: pb.clone() }),
    };
    let session = FlowSession::create(
        source,
        PhaseFlowEstimator::new(config.block_size),
        config.flow.clone(),
        options,
    )
    .context("Failed to create flow session")?;

    print_run_summary(&config, session.info(), &args.output);

    session
        .run(
            |s, _frame| pb.set_position((s.progress() * 100.0) as u64),
            args.interval,
        )
        .context("Flow analysis failed")?;
    pb.set_position(100);
    pb.finish_with_message("Done");

    session
        .save(&args.output)
        .with_context(|| format!("Failed to save {}", args.output.display()))?;
    println!("\nOutput saved to {}", args.output.display());

    if let Some(ref path) = args.render {
        let total = session.length();
        let image = session.draw_range(0, total, |buffer, width, height| {
            Array2::from_shape_vec((height, width), buffer.to_vec())
        })??;
        save_unit_tiff16(&image, path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
        println!("Rendered flowgram saved to {}", path.display());
    }

    if let Some(ref path) = args.wave {
        let mut csv = String::from("frame,value\n");
        for block in session.block_ranges(DEFAULT_BLOCK_FRAMES) {
            session.calc_wave(block.from, block.to, |wave| {
                for (i, v) in wave.iter().enumerate() {
                    csv.push_str(&format!("{},{v:.6}\n", block.from + i));
                }
            })?;
        }
        std::fs::write(path, csv)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Waveform saved to {}", path.display());
    }

    Ok(())
}

fn apply_overrides(config: &mut RunConfig, args: &RunArgs) {
    if let Some(pools) = args.pools {
        config.flow.pool_count = pools;
    }
    if let Some(max_value) = args.max_value {
        config.flow.max_value = max_value;
    }
    if args.mirror {
        config.flow.mirror_half = true;
    }
    if let Some(block_size) = args.block_size {
        config.block_size = block_size;
    }
}
