//! `orca run` - create a one-shot task and wait for completion.

use std::io::Write;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;

use orca_api::{DevTask, DevTaskPhase, DevTaskSpec, ObjectMeta, TypeMeta, KIND_DEV_TASK};

use super::CommandContext;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Args)]
pub struct RunCommand {
    /// Model to use.
    #[arg(long, default_value = "claude-sonnet")]
    model: String,

    /// Project name.
    #[arg(short, long, default_value = "default")]
    project: String,

    /// Timeout in seconds (0 for the default 5 minutes).
    #[arg(long, default_value_t = 300)]
    timeout: u64,

    /// Prompt text (everything after --).
    #[arg(trailing_var_arg = true, required = true)]
    prompt: Vec<String>,
}

impl RunCommand {
    pub async fn run(self, ctx: &CommandContext) -> Result<()> {
        let prompt = self.prompt.join(" ");
        let task_name = format!("run-{}", Utc::now().timestamp_millis());

        let task = DevTask {
            type_meta: TypeMeta::new(KIND_DEV_TASK),
            metadata: ObjectMeta {
                name: task_name.clone(),
                project: self.project.clone(),
                ..Default::default()
            },
            spec: DevTaskSpec {
                prompt,
                preferred_model: Some(self.model.clone()),
                max_retries: 0,
                timeout_seconds: self.timeout,
                ..Default::default()
            },
            ..Default::default()
        };

        let created = ctx.client.create_task(&task).await.context("creating task")?;
        println!(
            "Task {} created. Waiting for completion...",
            created.metadata.name
        );

        wait_for_task(ctx, &task_name, &self.project, self.timeout, |phase, task| {
            match phase {
                DevTaskPhase::Succeeded => {
                    println!();
                    println!("{}", "Task Succeeded".green().bold());
                    println!("{}", "-".repeat(60));
                    println!("{}", task.status.output);
                }
                DevTaskPhase::Failed => {
                    println!();
                    println!("{}", "Task Failed".red().bold());
                    println!("{}", "-".repeat(60));
                    if !task.status.error.is_empty() {
                        println!("{}", task.status.error);
                    }
                }
                _ => {}
            }
        })
        .await
    }
}

/// Poll a task until it reaches a terminal phase, printing progress dots.
/// Shared by `run` and `exec`.
pub async fn wait_for_task(
    ctx: &CommandContext,
    task_name: &str,
    project: &str,
    timeout_secs: u64,
    on_done: impl FnOnce(DevTaskPhase, &DevTask),
) -> Result<()> {
    let timeout = if timeout_secs == 0 {
        Duration::from_secs(300)
    } else {
        Duration::from_secs(timeout_secs)
    };
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        if tokio::time::Instant::now() >= deadline {
            bail!("task {task_name} did not complete within timeout ({timeout:?})");
        }

        let current = ctx
            .client
            .get_task(task_name, project)
            .await
            .context("polling task status")?;

        match current.status.phase {
            DevTaskPhase::Succeeded => {
                on_done(DevTaskPhase::Succeeded, &current);
                return Ok(());
            }
            DevTaskPhase::Failed => {
                on_done(DevTaskPhase::Failed, &current);
                bail!("task {task_name} failed");
            }
            DevTaskPhase::Scheduled | DevTaskPhase::Running => {
                print!(".");
                let _ = std::io::stdout().flush();
            }
            DevTaskPhase::Pending => {}
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
