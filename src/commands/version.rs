use anyhow::Result;

pub fn execute() -> Result<()> {
    println!("gpu-guard version {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
