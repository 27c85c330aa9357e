//! CLI commands.

mod apply;
mod delete;
mod describe;
mod exec;
mod get;
mod init;
mod logs;
mod run;
mod scale;
mod serve;
mod status;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::client::ApiClient;
use crate::output::OutputFormat;

/// orca - Kubernetes-inspired AI agent orchestration.
///
/// Manage agent pods, pools, and development tasks.
#[derive(Debug, Parser)]
#[command(name = "orca")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Control plane address.
    #[arg(long, global = true, default_value = "http://127.0.0.1:7117", env = "ORCA_SERVER")]
    server: String,

    /// Output format: table|json|yaml.
    #[arg(short = 'o', long, global = true, default_value = "table")]
    output: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start the orca control plane.
    Serve(serve::ServeCommand),

    /// Apply a YAML manifest file.
    Apply(apply::ApplyCommand),

    /// List or get resources.
    Get(get::GetCommand),

    /// Show detailed info about a resource.
    Describe(describe::DescribeCommand),

    /// Delete a resource.
    Delete(delete::DeleteCommand),

    /// Adjust the replica count of an agent pool.
    Scale(scale::ScaleCommand),

    /// Show logs for an agent pod.
    Logs(logs::LogsCommand),

    /// Run a one-shot task and wait for the result.
    Run(run::RunCommand),

    /// Send a prompt to a specific pod.
    Exec(exec::ExecCommand),

    /// Show a cluster overview.
    Status(status::StatusCommand),

    /// Generate a starter project manifest.
    Init(init::InitCommand),
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let ctx = CommandContext {
            client: ApiClient::new(&self.server),
            format: OutputFormat::parse(&self.output),
        };

        match self.command {
            Commands::Serve(cmd) => cmd.run().await,
            Commands::Apply(cmd) => cmd.run(&ctx).await,
            Commands::Get(cmd) => cmd.run(&ctx).await,
            Commands::Describe(cmd) => cmd.run(&ctx).await,
            Commands::Delete(cmd) => cmd.run(&ctx).await,
            Commands::Scale(cmd) => cmd.run(&ctx).await,
            Commands::Logs(cmd) => cmd.run(&ctx).await,
            Commands::Run(cmd) => cmd.run(&ctx).await,
            Commands::Exec(cmd) => cmd.run(&ctx).await,
            Commands::Status(cmd) => cmd.run(&ctx).await,
            Commands::Init(cmd) => cmd.run(),
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub client: ApiClient,
    pub format: OutputFormat,
}

/// Canonical resource type from the aliases users type.
pub fn normalize_resource_type(value: &str) -> String {
    match value.to_lowercase().as_str() {
        "agentpod" | "agentpods" | "pod" | "pods" => "agentpods".to_string(),
        "agentpool" | "agentpools" | "pool" | "pools" => "agentpools".to_string(),
        "devtask" | "devtasks" | "task" | "tasks" => "devtasks".to_string(),
        "project" | "projects" | "proj" => "projects".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_type_aliases() {
        for alias in ["pod", "pods", "agentpod", "AgentPods"] {
            assert_eq!(normalize_resource_type(alias), "agentpods");
        }
        for alias in ["pool", "pools", "agentpool"] {
            assert_eq!(normalize_resource_type(alias), "agentpools");
        }
        for alias in ["task", "tasks", "devtask"] {
            assert_eq!(normalize_resource_type(alias), "devtasks");
        }
        for alias in ["project", "projects", "proj"] {
            assert_eq!(normalize_resource_type(alias), "projects");
        }
        assert_eq!(normalize_resource_type("widget"), "widget");
    }
}
