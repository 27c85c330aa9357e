//! `orca init` - generate a starter project manifest.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

#[derive(Debug, Args)]
pub struct InitCommand {
    /// Project name.
    #[arg(default_value = "default")]
    name: String,

    /// Project description.
    #[arg(long)]
    description: Option<String>,

    /// Output manifest filename.
    #[arg(long, default_value = "project.yaml")]
    output_file: String,
}

impl InitCommand {
    pub fn run(self) -> Result<()> {
        let cwd = std::env::current_dir().context("getting current directory")?;
        let description = self
            .description
            .unwrap_or_else(|| format!("Orca project: {}", self.name));

        let content = manifest_template(&self.name, &description, &cwd.display().to_string());

        let output_path = cwd.join(&self.output_file);
        if output_path.exists() {
            bail!(
                "file {} already exists. Use a different name with --output-file",
                self.output_file
            );
        }
        std::fs::write(&output_path, content).context("writing manifest file")?;

        println!("{}", "Orca project initialized!".cyan().bold());
        println!();
        println!("  Manifest: {}", output_path.display());
        println!("  Project:  {}", self.name);
        println!();
        println!("{}", "Next steps:".bold());
        println!("  1. Review and customize the manifest:");
        println!("     vi {}", self.output_file);
        println!();
        println!("  2. Start the Orca control plane (if not running):");
        println!("     orca serve");
        println!();
        println!("  3. Apply the manifest:");
        println!("     orca apply -f {}", self.output_file);
        println!();
        println!("  4. Check status:");
        println!("     orca status");
        println!("     orca get pods");
        println!();
        println!("  5. Run a task:");
        println!("     orca run -- \"Write a hello world program\"");

        Ok(())
    }
}

fn manifest_template(name: &str, description: &str, path: &str) -> String {
    format!(
        r#"apiVersion: orca.dev/v1alpha1
kind: Project
metadata:
  name: {name}
spec:
  description: "{description}"
  path: "{path}"
---
apiVersion: orca.dev/v1alpha1
kind: AgentPool
metadata:
  name: {name}-pool
  project: {name}
spec:
  replicas: 1
  selector:
    app: {name}
  template:
    metadata:
      labels:
        app: {name}
    spec:
      model: claude-sonnet
      capabilities:
        - code-generation
        - code-review
      maxConcurrency: 1
      maxTokens: 8192
      restartPolicy: Always
"#
    )
}
