//! `orca status` - cluster overview.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Args;
use colored::Colorize;

use orca_api::{AgentPodPhase, DevTaskPhase};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Filter by project (empty = all).
    #[arg(short, long, default_value = "")]
    project: String,

    /// Continuously refresh (every 5 seconds).
    #[arg(short, long)]
    watch: bool,
}

impl StatusCommand {
    pub async fn run(self, ctx: &CommandContext) -> Result<()> {
        if self.watch {
            println!("Watching status (Ctrl+C to stop)...");
            println!();
            loop {
                // ANSI clear screen + home.
                print!("\x1b[2J\x1b[H");
                if let Err(err) = self.print_status(ctx).await {
                    println!("\nError: {err}");
                }
                println!("\nLast updated: {}", Local::now().format("%H:%M:%S"));
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }

        self.print_status(ctx).await
    }

    async fn print_status(&self, ctx: &CommandContext) -> Result<()> {
        if let Err(err) = ctx.client.healthz().await {
            println!("{}", "Orca Control Plane: UNREACHABLE".red());
            return Err(err).context("cannot reach server");
        }

        println!("{}", "Orca Control Plane Status".cyan().bold());
        println!("========================");
        println!();

        let projects = ctx.client.list_projects().await.context("listing projects")?;
        println!("Projects: {}", projects.len());

        let scope = if self.project.is_empty() {
            None
        } else {
            Some(self.project.as_str())
        };

        // Pods by phase.
        let pods = ctx.client.list_pods(scope).await.unwrap_or_default();
        let mut ready = 0;
        let mut busy = 0;
        let mut failed = 0;
        let mut pending = 0;
        for pod in &pods {
            match pod.status.phase {
                AgentPodPhase::Ready => ready += 1,
                AgentPodPhase::Busy => busy += 1,
                AgentPodPhase::Failed => failed += 1,
                AgentPodPhase::Pending | AgentPodPhase::Starting => pending += 1,
                _ => {}
            }
        }
        print!("Agent Pods: {} total", pods.len());
        let mut parts: Vec<String> = Vec::new();
        if ready > 0 {
            parts.push(format!("{} ready", ready).green().to_string());
        }
        if busy > 0 {
            parts.push(format!("{} busy", busy).yellow().to_string());
        }
        if pending > 0 {
            parts.push(format!("{pending} pending"));
        }
        if failed > 0 {
            parts.push(format!("{} failed", failed).red().to_string());
        }
        if !parts.is_empty() {
            print!(" ({})", parts.join(", "));
        }
        println!();

        // Pools.
        let pools = ctx.client.list_pools(scope).await.unwrap_or_default();
        println!("Agent Pools: {}", pools.len());

        // Tasks by phase.
        let tasks = ctx.client.list_tasks(scope).await.unwrap_or_default();
        let mut waiting = 0;
        let mut running = 0;
        let mut succeeded = 0;
        let mut failed_tasks = 0;
        for task in &tasks {
            match task.status.phase {
                DevTaskPhase::Pending | DevTaskPhase::Scheduled => waiting += 1,
                DevTaskPhase::Running => running += 1,
                DevTaskPhase::Succeeded => succeeded += 1,
                DevTaskPhase::Failed => failed_tasks += 1,
            }
        }
        print!("Dev Tasks: {} total", tasks.len());
        let mut parts: Vec<String> = Vec::new();
        if waiting > 0 {
            parts.push(format!("{waiting} pending"));
        }
        if running > 0 {
            parts.push(format!("{} running", running).yellow().to_string());
        }
        if succeeded > 0 {
            parts.push(format!("{} succeeded", succeeded).green().to_string());
        }
        if failed_tasks > 0 {
            parts.push(format!("{} failed", failed_tasks).red().to_string());
        }
        if !parts.is_empty() {
            print!(" ({})", parts.join(", "));
        }
        println!();

        Ok(())
    }
}
