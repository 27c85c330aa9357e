//! `orca exec` - run a prompt on a specific pod.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;

use orca_api::{DevTask, DevTaskPhase, DevTaskSpec, ObjectMeta, TypeMeta, KIND_DEV_TASK};

use super::run::wait_for_task;
use super::CommandContext;

#[derive(Debug, Args)]
pub struct ExecCommand {
    /// Pod name.
    pod: String,

    /// Project name.
    #[arg(short, long, default_value = "default")]
    project: String,

    /// Timeout in seconds.
    #[arg(long, default_value_t = 300)]
    timeout: u64,

    /// Prompt text (everything after --).
    #[arg(trailing_var_arg = true, required = true)]
    prompt: Vec<String>,
}

impl ExecCommand {
    pub async fn run(self, ctx: &CommandContext) -> Result<()> {
        let prompt = self.prompt.join(" ");

        // Verify the pod exists; target its model so the scheduler keeps
        // the task on compatible pods.
        let pod = ctx
            .client
            .get_pod(&self.pod, &self.project)
            .await
            .with_context(|| format!("getting pod {}", self.pod))?;

        let task_name = format!("exec-{}-{}", self.pod, Utc::now().timestamp_millis());
        let task = DevTask {
            type_meta: TypeMeta::new(KIND_DEV_TASK),
            metadata: ObjectMeta {
                name: task_name.clone(),
                project: self.project.clone(),
                ..Default::default()
            },
            spec: DevTaskSpec {
                prompt,
                preferred_model: Some(pod.spec.model.clone()),
                max_retries: 0,
                timeout_seconds: self.timeout,
                ..Default::default()
            },
            ..Default::default()
        };

        let created = ctx
            .client
            .create_task(&task)
            .await
            .context("creating exec task")?;
        println!(
            "Exec task {} created targeting pod {}. Waiting for completion...",
            created.metadata.name, self.pod
        );

        let pod_name = self.pod.clone();
        wait_for_task(ctx, &task_name, &self.project, self.timeout, move |phase, task| {
            match phase {
                DevTaskPhase::Succeeded => {
                    println!();
                    println!("{}", format!("Exec on {pod_name} Succeeded").green().bold());
                    println!("{}", "-".repeat(60));
                    println!("{}", task.status.output);
                }
                DevTaskPhase::Failed => {
                    println!();
                    println!("{}", format!("Exec on {pod_name} Failed").red().bold());
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
