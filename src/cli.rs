use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::{AppConfig, MigrationConfig};
use crate::migrate::cleanup::{self, DEFAULT_PREFIX};
use crate::migrate::mapping::{self, UnmappedTagPolicy, WorkflowMapping};
use crate::migrate::{Migrator, NestingMode};
use crate::providers::asana::AsanaClient;
use crate::providers::clubhouse::ClubhouseClient;

#[derive(Parser, Debug)]
#[command(name = "asana2clubhouse")]
#[command(about = "Imports Asana tasks as Clubhouse stories", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to ~/.asana2clubhouse/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Set the log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log: String,
    /// Shorthand for --log debug
    #[arg(short, long, global = true)]
    pub verbose: bool,
    /// Changes things. Without it every command only previews.
    #[arg(long, global = true)]
    pub commit: bool,
    #[arg(long, env = "CLUBHOUSE_API_KEY", global = true, hide_env_values = true)]
    pub clubhouse_api_key: Option<String>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import the tasks of an Asana project as Clubhouse stories
    Import(ImportArgs),
    /// Delete comments starting with a prefix from a range of Clubhouse stories
    CleanupComments(CleanupArgs),
}

#[derive(Args, Debug, Default)]
pub struct ImportArgs {
    #[arg(long, env = "ASANA_API_KEY", hide_env_values = true)]
    pub asana_api_key: Option<String>,
    /// Source project
    #[arg(long)]
    pub asana_project_id: Option<String>,
    /// Tag to apply to moved tasks. Must be created in advance.
    #[arg(long)]
    pub asana_moved_tag_id: Option<String>,
    /// Do not comment on or tag the Asana task at the end
    #[arg(long)]
    pub asana_skip_moved_tag: bool,
    /// Destination project
    #[arg(long)]
    pub clubhouse_project_id: Option<i64>,
    /// Workflow state for completed tasks without a mapped tag
    #[arg(long)]
    pub clubhouse_complete_workflow_id: Option<i64>,
    /// Map an Asana tag (gid or name) to a workflow state (repeatable)
    #[arg(long = "map", value_name = "TAG=STATE_ID", value_parser = mapping::parse_pair)]
    pub mappings: Vec<(String, i64)>,
    /// What to do with tasks whose tags are not mapped
    #[arg(long, value_enum)]
    pub unmapped_tags: Option<UnmappedTagPolicy>,
    /// How tasks with subtasks are laid out
    #[arg(long, value_enum)]
    pub nesting: Option<NestingMode>,
    /// Ignore the domain of users' emails when matching accounts
    #[arg(long)]
    pub ignore_email_domain: bool,
}

#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// First story id to check
    #[arg(long)]
    pub start: i64,
    /// Story id to stop before
    #[arg(long)]
    pub end: i64,
    /// Comments starting with this text are deleted
    #[arg(long, default_value = DEFAULT_PREFIX)]
    pub prefix: String,
}

impl ImportArgs {
    /// Merge flags over the config file. Flags win; `--map` entries override
    /// file entries for the same tag.
    pub fn resolve(&self, commit: bool, file: &AppConfig) -> Result<MigrationConfig> {
        let asana = file.asana.as_ref();
        let clubhouse = file.clubhouse.as_ref();
        let import = file.import.as_ref();

        let asana_project_id = self
            .asana_project_id
            .clone()
            .or_else(|| asana.and_then(|a| a.project_id.clone()))
            .context("No Asana project. Pass --asana-project-id or set asana.project_id")?;
        let clubhouse_project_id = self
            .clubhouse_project_id
            .or_else(|| clubhouse.and_then(|c| c.project_id))
            .context(
                "No Clubhouse project. Pass --clubhouse-project-id or set clubhouse.project_id",
            )?;

        // Reject contradictory flags before they can shadow file entries.
        WorkflowMapping::new(self.mappings.iter().cloned(), None)?;
        let mut states: HashMap<String, i64> = import
            .map(|i| i.workflow_states.clone())
            .unwrap_or_default();
        states.extend(self.mappings.iter().cloned());
        let complete = self
            .clubhouse_complete_workflow_id
            .or_else(|| clubhouse.and_then(|c| c.complete_workflow_id));
        let mapping = WorkflowMapping::new(states, complete)?;

        Ok(MigrationConfig {
            asana_project_id,
            asana_moved_tag_id: self
                .asana_moved_tag_id
                .clone()
                .or_else(|| asana.and_then(|a| a.moved_tag_id.clone())),
            skip_moved_tag: self.asana_skip_moved_tag
                || import.and_then(|i| i.skip_moved_tag).unwrap_or(false),
            clubhouse_project_id,
            mapping,
            unmapped_tags: self
                .unmapped_tags
                .or_else(|| import.and_then(|i| i.unmapped_tags))
                .unwrap_or_default(),
            nesting: self
                .nesting
                .or_else(|| import.and_then(|i| i.nesting))
                .unwrap_or_default(),
            ignore_email_domain: self.ignore_email_domain
                || import.and_then(|i| i.ignore_email_domain).unwrap_or(false),
            commit,
        })
    }
}

fn require_key(flag: Option<&str>, file: Option<&str>, hint: &str) -> Result<String> {
    match flag.or(file) {
        Some(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => bail!("Missing API key. {hint}"),
    }
}

fn clubhouse_client(cli: &Cli, file: &AppConfig) -> Result<ClubhouseClient> {
    let section = file.clubhouse.as_ref();
    let key = require_key(
        cli.clubhouse_api_key.as_deref(),
        section.and_then(|c| c.api_key.as_deref()),
        "Pass --clubhouse-api-key, set CLUBHOUSE_API_KEY or clubhouse.api_key",
    )?;
    Ok(ClubhouseClient::new(
        key,
        section.and_then(|c| c.base_url.clone()),
    ))
}

pub async fn run_import(cli: &Cli, args: &ImportArgs, file: &AppConfig) -> Result<()> {
    let config = args.resolve(cli.commit, file)?;

    let section = file.asana.as_ref();
    let asana_key = require_key(
        args.asana_api_key.as_deref(),
        section.and_then(|a| a.api_key.as_deref()),
        "Pass --asana-api-key, set ASANA_API_KEY or asana.api_key",
    )?;
    let asana = AsanaClient::new(asana_key, section.and_then(|a| a.base_url.clone()));
    let clubhouse = clubhouse_client(cli, file)?;

    tracing::info!(
        asana_project = %config.asana_project_id,
        clubhouse_project = config.clubhouse_project_id,
        mapped_tags = config.mapping.len(),
        nesting = ?config.nesting,
        "Starting import"
    );

    let migrator = Migrator::new(Box::new(asana), Box::new(clubhouse), config).await?;
    let summary = migrator.run().await?;
    println!("{summary}");

    if summary.has_failures() {
        bail!("{} task(s) failed to migrate", summary.failed.len());
    }
    Ok(())
}

pub async fn run_cleanup(cli: &Cli, args: &CleanupArgs, file: &AppConfig) -> Result<()> {
    if args.start >= args.end {
        bail!(
            "Empty story range: --start {} must be below --end {}",
            args.start,
            args.end
        );
    }
    let clubhouse = clubhouse_client(cli, file)?;

    let report =
        cleanup::cleanup_comments(&clubhouse, args.start..args.end, &args.prefix, cli.commit)
            .await;
    let verb = if cli.commit { "deleted" } else { "would delete" };
    println!(
        "Checked {} stories ({} missing): {verb} {} comments, {} failures",
        report.checked, report.missing, report.matched, report.failed
    );

    if report.failed > 0 {
        bail!("{} cleanup operation(s) failed", report.failed);
    }
    Ok(())
}
