//! `orca scale` - adjust an agent pool's replica count.

use anyhow::{bail, Result};
use clap::Args;

use super::{normalize_resource_type, CommandContext};

#[derive(Debug, Args)]
pub struct ScaleCommand {
    /// Resource type (only agentpools can be scaled).
    resource_type: String,

    /// Pool name.
    name: String,

    /// Number of replicas.
    #[arg(long, default_value_t = 1)]
    replicas: u32,

    /// Project name.
    #[arg(short, long, default_value = "default")]
    project: String,
}

impl ScaleCommand {
    pub async fn run(self, ctx: &CommandContext) -> Result<()> {
        if normalize_resource_type(&self.resource_type) != "agentpools" {
            bail!(
                "scaling is only supported for agentpools, got {:?}",
                self.resource_type
            );
        }

        ctx.client
            .scale_pool(&self.name, &self.project, self.replicas)
            .await?;

        println!("agentpool/{} scaled to {} replicas", self.name, self.replicas);
        Ok(())
    }
}
