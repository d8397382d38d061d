use std::path::Path;

use anyhow::bail;
use chunkflow_core::ChunkflowConfig;

pub const CONFIG_FILE: &str = "chunkflow.toml";

pub fn init(path: &str) -> anyhow::Result<()> {
    let dir = Path::new(path);
    let output = dir.join(CONFIG_FILE);
    if output.exists() {
        bail!("{} already exists", output.display());
    }

    let config = ChunkflowConfig::scaffold("./data");
    std::fs::write(&output, config.to_toml_string()?)?;
    println!("✓ Generated {}", output.display());
    Ok(())
}
