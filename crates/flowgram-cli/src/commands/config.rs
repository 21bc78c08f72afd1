use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use flowgram_core::consts::DEFAULT_FLOW_BLOCK_SIZE;
use flowgram_core::pipeline::{CoordinatorOptions, FlowConfig};
use serde::{Deserialize, Serialize};

/// Everything `flowgram run` can read from a config file.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Flow block size in pixels for the phase-correlation estimator.
    pub block_size: usize,
    pub flow: FlowConfig,
    pub coordinator: CoordinatorOptions,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_FLOW_BLOCK_SIZE,
            flow: FlowConfig::default(),
            coordinator: CoordinatorOptions::default(),
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&contents).context("Invalid flowgram config")?;
        config.flow.validate()?;
        Ok(config)
    }
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Write config to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Print or save the default RunConfig as TOML.
pub fn run(args: &ConfigArgs) -> Result<()> {
    let toml_str = toml::to_string_pretty(&RunConfig::default())?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &toml_str)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        println!("Default config saved to {}", path.display());
    } else {
        print!("{}", toml_str);
    }

    Ok(())
}
