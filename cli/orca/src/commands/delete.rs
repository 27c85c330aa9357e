//! `orca delete` - delete a resource by type and name.

use anyhow::{bail, Result};
use clap::Args;

use super::{normalize_resource_type, CommandContext};

#[derive(Debug, Args)]
pub struct DeleteCommand {
    /// Resource type.
    resource_type: String,

    /// Resource name.
    name: String,

    /// Project name.
    #[arg(short, long, default_value = "default")]
    project: String,
}

impl DeleteCommand {
    pub async fn run(self, ctx: &CommandContext) -> Result<()> {
        match normalize_resource_type(&self.resource_type).as_str() {
            "agentpods" => {
                ctx.client.delete_pod(&self.name, &self.project).await?;
                println!("agentpod/{} deleted", self.name);
            }
            "agentpools" => {
                // Deliberately non-cascading: the pool's pods stay behind.
                ctx.client.delete_pool(&self.name, &self.project).await?;
                println!("agentpool/{} deleted", self.name);
            }
            "devtasks" => {
                ctx.client.delete_task(&self.name, &self.project).await?;
                println!("devtask/{} deleted", self.name);
            }
            "projects" => {
                ctx.client.delete_project(&self.name).await?;
                println!("project/{} deleted", self.name);
            }
            other => bail!(
                "unknown resource type {other:?}. Valid types: agentpods, agentpools, devtasks, projects"
            ),
        }
        Ok(())
    }
}
