//! `orca logs` - show log entries for an agent pod.

use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;

use super::CommandContext;

#[derive(Debug, Args)]
pub struct LogsCommand {
    /// Pod name.
    pod: String,

    /// Project name.
    #[arg(short, long, default_value = "default")]
    project: String,

    /// Follow log output (polls every 2 seconds).
    #[arg(short, long)]
    follow: bool,
}

impl LogsCommand {
    pub async fn run(self, ctx: &CommandContext) -> Result<()> {
        if self.follow {
            return self.follow_logs(ctx).await;
        }

        let entries = ctx.client.get_logs(&self.pod, &self.project).await?;
        if entries.is_empty() {
            println!("No logs found for pod {}.", self.pod);
            return Ok(());
        }
        for entry in entries {
            print_log_entry(entry.timestamp, &entry.level, &entry.message);
        }
        Ok(())
    }

    async fn follow_logs(&self, ctx: &CommandContext) -> Result<()> {
        println!("Following logs for pod {} (Ctrl+C to stop)...", self.pod);

        let mut seen = 0;
        loop {
            let entries = ctx.client.get_logs(&self.pod, &self.project).await?;
            if entries.len() > seen {
                for entry in &entries[seen..] {
                    print_log_entry(entry.timestamp, &entry.level, &entry.message);
                }
                seen = entries.len();
            }
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
    }
}

fn print_log_entry(timestamp: DateTime<Utc>, level: &str, message: &str) {
    let level_field = format!("{level:<5}");
    let colored_level = match level.to_lowercase().as_str() {
        "error" => level_field.red().to_string(),
        "warn" => level_field.yellow().to_string(),
        "info" => level_field.green().to_string(),
        "debug" => level_field.bright_black().to_string(),
        _ => level_field,
    };
    println!(
        "[{}] [{}] {}",
        timestamp.format("%Y-%m-%d %H:%M:%S"),
        colored_level,
        message
    );
}
