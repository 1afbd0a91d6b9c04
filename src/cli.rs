//! Command-line surface and interactive input collection

use anyhow::{bail, Result};
use clap::Parser;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use crate::config::Settings;
use crate::replicate::ReplicationTask;

pub const DEFAULT_PARENT: &str = "root";

/// Replicate a Google Drive folder tree into a new folder
#[derive(Clone, Debug, Default, Parser)]
#[command(author, version, about = "drivetree - copy a Google Drive folder tree into a new folder")]
pub struct Args {
    /// ID of the source folder to copy
    pub source: Option<String>,

    /// Name for the new (destination) folder
    pub name: Option<String>,

    /// ID of the parent folder for the new folder ('root' for My Drive)
    pub parent: Option<String>,

    /// Config file (default: ~/.config/drivetree/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the effective settings to the config file and exit
    #[arg(long)]
    pub init_config: bool,

    /// OAuth access token (overrides env and token file)
    #[arg(long)]
    pub access_token: Option<String>,

    /// File holding the OAuth access token
    #[arg(long)]
    pub token_file: Option<PathBuf>,

    /// Drive API base URL
    #[arg(long)]
    pub api_base: Option<String>,

    /// Listing page size (1-1000)
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Refuse to create folders deeper than this (root = 0)
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Print every created folder and copied file
    #[arg(short, long)]
    pub verbose: bool,

    /// Append a text event log to file
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// Append the per-node report as JSONL to file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Fail instead of prompting for missing inputs
    #[arg(long)]
    pub no_prompt: bool,
}

impl Args {
    /// Overlay command-line flags on top of file settings
    pub fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(base) = &self.api_base {
            settings.api_base = base.clone();
        }
        if let Some(n) = self.page_size {
            settings.page_size = n;
        }
        if let Some(p) = &self.token_file {
            settings.access_token_file = Some(p.clone());
        }
        if self.max_depth.is_some() {
            settings.max_depth = self.max_depth;
        }
        if let Some(p) = &self.log_file {
            settings.log_file = Some(p.clone());
        }
        settings
    }

    /// Build the top-level task, prompting on `input` for anything not given as an argument
    pub fn resolve_task<R: BufRead, W: Write>(
        &self,
        input: &mut R,
        output: &mut W,
    ) -> Result<ReplicationTask> {
        let source = match non_empty(self.source.as_deref()) {
            Some(s) => s,
            None if self.no_prompt => bail!("source folder id is required"),
            None => ask(input, output, "Enter the ID of the source folder to copy: ")?,
        };
        if source.is_empty() {
            bail!("source folder id is required");
        }

        let name = match non_empty(self.name.as_deref()) {
            Some(s) => s,
            None if self.no_prompt => bail!("new folder name is required"),
            None => ask(input, output, "Enter the name for the new (destination) folder: ")?,
        };
        if name.is_empty() {
            bail!("new folder name is required");
        }

        let parent = match non_empty(self.parent.as_deref()) {
            Some(s) => s,
            None if self.no_prompt => DEFAULT_PARENT.to_string(),
            None => ask(
                input,
                output,
                concat!(
                    "Enter the ID of the parent folder for the new folder ",
                    "(or 'root' for the main 'My Drive'): ",
                ),
            )?,
        };
        let parent = if parent.is_empty() { DEFAULT_PARENT.to_string() } else { parent };

        Ok(ReplicationTask::new(source, parent, name))
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> Result<String> {
    write!(output, "{}", prompt)?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}
