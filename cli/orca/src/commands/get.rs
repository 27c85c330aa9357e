//! `orca get` - list or get resources in tables, JSON, or YAML.

use anyhow::{bail, Result};
use clap::Args;

use orca_api::{AgentPod, AgentPool, DevTask, Project};

use crate::output::{format_age, or_none, print_json, print_table, print_yaml, OutputFormat};

use super::{normalize_resource_type, CommandContext};

#[derive(Debug, Args)]
pub struct GetCommand {
    /// Resource type: agentpods (pod), agentpools (pool), devtasks (task),
    /// projects.
    resource_type: String,

    /// Resource name (omit to list).
    name: Option<String>,

    /// Project name.
    #[arg(short, long, default_value = "default")]
    project: String,
}

impl GetCommand {
    pub async fn run(self, ctx: &CommandContext) -> Result<()> {
        match normalize_resource_type(&self.resource_type).as_str() {
            "agentpods" => self.get_pods(ctx).await,
            "agentpools" => self.get_pools(ctx).await,
            "devtasks" => self.get_tasks(ctx).await,
            "projects" => self.get_projects(ctx).await,
            other => bail!(
                "unknown resource type {other:?}. Valid types: agentpods, agentpools, devtasks, projects"
            ),
        }
    }

    async fn get_pods(&self, ctx: &CommandContext) -> Result<()> {
        let pods = match &self.name {
            Some(name) => vec![ctx.client.get_pod(name, &self.project).await?],
            None => ctx.client.list_pods(Some(&self.project)).await?,
        };
        if pods.is_empty() {
            println!("No agent pods found.");
            return Ok(());
        }
        match ctx.format {
            OutputFormat::Json => print_json(&pods),
            OutputFormat::Yaml => print_yaml(&pods),
            OutputFormat::Table => {
                let rows: Vec<Vec<String>> = pods.iter().map(pod_row).collect();
                print_table(
                    &["NAME", "PROJECT", "MODEL", "PHASE", "ACTIVE-TASKS", "AGE"],
                    &rows,
                    &[3],
                );
                Ok(())
            }
        }
    }

    async fn get_pools(&self, ctx: &CommandContext) -> Result<()> {
        let pools = match &self.name {
            Some(name) => vec![ctx.client.get_pool(name, &self.project).await?],
            None => ctx.client.list_pools(Some(&self.project)).await?,
        };
        if pools.is_empty() {
            println!("No agent pools found.");
            return Ok(());
        }
        match ctx.format {
            OutputFormat::Json => print_json(&pools),
            OutputFormat::Yaml => print_yaml(&pools),
            OutputFormat::Table => {
                let rows: Vec<Vec<String>> = pools.iter().map(pool_row).collect();
                print_table(
                    &["NAME", "PROJECT", "REPLICAS", "READY", "BUSY", "AGE"],
                    &rows,
                    &[],
                );
                Ok(())
            }
        }
    }

    async fn get_tasks(&self, ctx: &CommandContext) -> Result<()> {
        let tasks = match &self.name {
            Some(name) => vec![ctx.client.get_task(name, &self.project).await?],
            None => ctx.client.list_tasks(Some(&self.project)).await?,
        };
        if tasks.is_empty() {
            println!("No dev tasks found.");
            return Ok(());
        }
        match ctx.format {
            OutputFormat::Json => print_json(&tasks),
            OutputFormat::Yaml => print_yaml(&tasks),
            OutputFormat::Table => {
                let rows: Vec<Vec<String>> = tasks.iter().map(task_row).collect();
                print_table(
                    &["NAME", "PROJECT", "PHASE", "ASSIGNED-POD", "RETRIES", "AGE"],
                    &rows,
                    &[2],
                );
                Ok(())
            }
        }
    }

    async fn get_projects(&self, ctx: &CommandContext) -> Result<()> {
        let projects = match &self.name {
            Some(name) => vec![ctx.client.get_project(name).await?],
            None => ctx.client.list_projects().await?,
        };
        if projects.is_empty() {
            println!("No projects found.");
            return Ok(());
        }
        match ctx.format {
            OutputFormat::Json => print_json(&projects),
            OutputFormat::Yaml => print_yaml(&projects),
            OutputFormat::Table => {
                let rows: Vec<Vec<String>> = projects.iter().map(project_row).collect();
                print_table(&["NAME", "STATUS", "AGE"], &rows, &[]);
                Ok(())
            }
        }
    }
}

fn pod_row(pod: &AgentPod) -> Vec<String> {
    vec![
        pod.metadata.name.clone(),
        pod.metadata.project.clone(),
        pod.spec.model.clone(),
        pod.status.phase.to_string(),
        pod.status.active_tasks.to_string(),
        format_age(pod.metadata.created_at),
    ]
}

fn pool_row(pool: &AgentPool) -> Vec<String> {
    vec![
        pool.metadata.name.clone(),
        pool.metadata.project.clone(),
        pool.spec.replicas.to_string(),
        pool.status.ready_replicas.to_string(),
        pool.status.busy_replicas.to_string(),
        format_age(pool.metadata.created_at),
    ]
}

fn task_row(task: &DevTask) -> Vec<String> {
    vec![
        task.metadata.name.clone(),
        task.metadata.project.clone(),
        task.status.phase.to_string(),
        or_none(task.status.assigned_pod.as_deref().unwrap_or("")),
        task.status.retries.to_string(),
        format_age(task.metadata.created_at),
    ]
}

fn project_row(project: &Project) -> Vec<String> {
    let status = if project.status.is_empty() {
        "Active".to_string()
    } else {
        project.status.clone()
    };
    vec![
        project.metadata.name.clone(),
        status,
        format_age(project.metadata.created_at),
    ]
}
