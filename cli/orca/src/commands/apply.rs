//! `orca apply -f` - create or update resources from a manifest.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use orca_api::parse_file;

use super::CommandContext;

#[derive(Debug, Args)]
pub struct ApplyCommand {
    /// Path to manifest file (required).
    #[arg(short = 'f', long = "filename", required = true)]
    filename: PathBuf,
}

impl ApplyCommand {
    pub async fn run(self, ctx: &CommandContext) -> Result<()> {
        let resources = parse_file(&self.filename)
            .with_context(|| format!("parsing manifest {}", self.filename.display()))?;

        if resources.is_empty() {
            println!("No resources found in manifest.");
            return Ok(());
        }

        for resource in &resources {
            ctx.client
                .apply(resource)
                .await
                .with_context(|| format!("applying {}/{}", resource.kind(), resource.name()))?;
            println!("{}/{} configured", resource.kind(), resource.name());
        }

        Ok(())
    }
}
