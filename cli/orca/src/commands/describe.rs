//! `orca describe` - kubectl-style detailed resource view.

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;

use orca_api::{AgentPodSpec, ObjectMeta};

use crate::output::{color_phase, join_or_none, or_none};

use super::{normalize_resource_type, CommandContext};

#[derive(Debug, Args)]
pub struct DescribeCommand {
    /// Resource type.
    resource_type: String,

    /// Resource name.
    name: String,

    /// Project name.
    #[arg(short, long, default_value = "default")]
    project: String,
}

impl DescribeCommand {
    pub async fn run(self, ctx: &CommandContext) -> Result<()> {
        match normalize_resource_type(&self.resource_type).as_str() {
            "agentpods" => self.describe_pod(ctx).await,
            "agentpools" => self.describe_pool(ctx).await,
            "devtasks" => self.describe_task(ctx).await,
            "projects" => self.describe_project(ctx).await,
            other => bail!("unknown resource type {other:?}"),
        }
    }

    async fn describe_pod(&self, ctx: &CommandContext) -> Result<()> {
        let pod = ctx.client.get_pod(&self.name, &self.project).await?;

        section("AgentPod:");
        print_metadata(&pod.metadata);

        println!();
        section("Spec:");
        print_pod_spec("  ", &pod.spec);
        if let Some(owner) = &pod.spec.owner_pool {
            field("  Owner Pool", owner);
        }

        println!();
        section("Status:");
        field("  Phase", &color_phase(&pod.status.phase.to_string()));
        field("  Active Tasks", &pod.status.active_tasks.to_string());
        field("  Completed Tasks", &pod.status.completed_tasks.to_string());
        field("  Failed Tasks", &pod.status.failed_tasks.to_string());
        if let Some(started_at) = pod.status.started_at {
            field("  Started At", &started_at.format("%Y-%m-%d %H:%M:%S").to_string());
        }
        if let Some(heartbeat) = pod.status.last_heartbeat {
            field(
                "  Last Heartbeat",
                &heartbeat.format("%Y-%m-%d %H:%M:%S").to_string(),
            );
        }
        if !pod.status.message.is_empty() {
            field("  Message", &pod.status.message);
        }

        Ok(())
    }

    async fn describe_pool(&self, ctx: &CommandContext) -> Result<()> {
        let pool = ctx.client.get_pool(&self.name, &self.project).await?;

        section("AgentPool:");
        print_metadata(&pool.metadata);

        println!();
        section("Spec:");
        field("  Replicas", &pool.spec.replicas.to_string());
        field("  Selector", &format_labels(&pool.spec.selector));

        println!();
        section("  Template:");
        print_pod_spec("    ", &pool.spec.template.spec);

        println!();
        section("Status:");
        field("  Replicas", &pool.status.replicas.to_string());
        field("  Ready Replicas", &pool.status.ready_replicas.to_string());
        field("  Busy Replicas", &pool.status.busy_replicas.to_string());

        Ok(())
    }

    async fn describe_task(&self, ctx: &CommandContext) -> Result<()> {
        let task = ctx.client.get_task(&self.name, &self.project).await?;

        section("DevTask:");
        print_metadata(&task.metadata);

        println!();
        section("Spec:");
        field("  Prompt", &task.spec.prompt);
        field(
            "  Required Capabilities",
            &join_or_none(&task.spec.required_capabilities),
        );
        if let Some(model) = &task.spec.preferred_model {
            field("  Preferred Model", model);
        }
        field("  Max Retries", &task.spec.max_retries.to_string());
        field("  Timeout Seconds", &task.spec.timeout_seconds.to_string());
        if !task.spec.depends_on.is_empty() {
            field("  Depends On", &join_or_none(&task.spec.depends_on));
        }

        println!();
        section("Status:");
        field("  Phase", &color_phase(&task.status.phase.to_string()));
        field(
            "  Assigned Pod",
            &or_none(task.status.assigned_pod.as_deref().unwrap_or("")),
        );
        field("  Retries", &task.status.retries.to_string());
        if let Some(started_at) = task.status.started_at {
            field("  Started At", &started_at.format("%Y-%m-%d %H:%M:%S").to_string());
        }
        if let Some(finished_at) = task.status.finished_at {
            field(
                "  Finished At",
                &finished_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            );
        }
        if !task.status.output.is_empty() {
            println!();
            section("Output:");
            println!("{}", task.status.output);
        }
        if !task.status.error.is_empty() {
            println!();
            section("Error:");
            println!("{}", task.status.error.red());
        }

        Ok(())
    }

    async fn describe_project(&self, ctx: &CommandContext) -> Result<()> {
        let project = ctx.client.get_project(&self.name).await?;

        section("Project:");
        field("  Name", &project.metadata.name);
        field("  UID", &project.metadata.uid);
        field("  Labels", &format_labels(&project.metadata.labels));
        if let Some(created_at) = project.metadata.created_at {
            field("  Created", &created_at.format("%Y-%m-%d %H:%M:%S").to_string());
        }

        println!();
        section("Spec:");
        if !project.spec.description.is_empty() {
            field("  Description", &project.spec.description);
        }
        if !project.spec.path.is_empty() {
            field("  Path", &project.spec.path);
        }

        println!();
        section("Status:");
        let status = if project.status.is_empty() {
            "Active"
        } else {
            &project.status
        };
        field("  Status", status);

        Ok(())
    }
}

fn section(title: &str) {
    println!("{}", title.bold());
}

fn field(label: &str, value: &str) {
    let value = if value.is_empty() { "<none>" } else { value };
    println!("{:<24}{}", format!("{label}:"), value);
}

fn print_metadata(meta: &ObjectMeta) {
    field("  Name", &meta.name);
    if !meta.project.is_empty() {
        field("  Project", &meta.project);
    }
    field("  UID", &meta.uid);
    field("  Labels", &format_labels(&meta.labels));
    if let Some(created_at) = meta.created_at {
        field("  Created", &created_at.format("%Y-%m-%d %H:%M:%S").to_string());
    }
    if let Some(updated_at) = meta.updated_at {
        field("  Updated", &updated_at.format("%Y-%m-%d %H:%M:%S").to_string());
    }
}

fn print_pod_spec(indent: &str, spec: &AgentPodSpec) {
    field(&format!("{indent}Model"), &spec.model);
    if let Some(system_prompt) = &spec.system_prompt {
        field(&format!("{indent}System Prompt"), &truncate(system_prompt, 80));
    }
    field(
        &format!("{indent}Capabilities"),
        &join_or_none(&spec.capabilities),
    );
    field(
        &format!("{indent}Max Concurrency"),
        &spec.max_concurrency.to_string(),
    );
    field(&format!("{indent}Max Tokens"), &spec.max_tokens.to_string());
    field(&format!("{indent}Tools"), &join_or_none(&spec.tools));
    field(&format!("{indent}Restart Policy"), &spec.restart_policy);
}

fn format_labels(labels: &std::collections::BTreeMap<String, String>) -> String {
    if labels.is_empty() {
        return "<none>".to_string();
    }
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn truncate(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        value.to_string()
    } else {
        format!("{}...", &value[..max_len - 3])
    }
}
