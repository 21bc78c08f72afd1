use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use flowgram_core::io::ser::SerReader;

#[derive(Args)]
pub struct InfoArgs {
    /// Input SER file
    pub file: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let reader = SerReader::open(&args.file)
        .with_context(|| format!("Failed to open {}", args.file.display()))?;
    let info = reader.source_info(&args.file);

    println!("File:        {}", info.path.display());
    println!("Frames:      {}", info.frame_count);
    println!("Dimensions:  {}x{}", info.width, info.height);
    println!("Bit depth:   {}", reader.header.pixel_depth);
    println!("Color id:    {}", reader.header.color_id);
    if info.duration_ms > 0 {
        println!("Duration:    {:.2} s", info.duration_ms as f64 / 1000.0);
    } else {
        println!("Duration:    unknown (no timestamps)");
    }

    let frame_bytes = reader.header.frame_byte_size();
    let total_mb = (frame_bytes * info.frame_count) as f64 / (1024.0 * 1024.0);
    println!("Data size:   {:.1} MB", total_mb);

    Ok(())
}
