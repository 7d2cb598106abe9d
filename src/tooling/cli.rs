//! Command line interface
//!
//! Parses arguments, layers them over the loaded configuration and drives
//! one push, pull, backup or clean run against a device.

use crate::cleanup::{CleanupEngine, CleanupPass, Operator};
use crate::config::{ConfigLoader, ResyncConfig};
use crate::device::{Device, LocalDevice, SshDevice};
use crate::error::SyncError;
use crate::logging::level_for_verbosity;
use crate::policy::{ExistingPolicy, MissingPolicy};
use crate::render::Renderer;
use crate::sync::{
    check_pull_policy, download_tree, execute_push, load_index, plan_backup, plan_pull,
    plan_push, PullPlan, PushRequest, Staging,
};
use crate::tooling::format::{
    format_build_report, format_cleanup_summary, format_download_report, format_pull_tree,
    format_push_outcome, format_push_tree, terminal_width,
};
use crate::tooling::prompt::TerminalOperator;
use crate::tree::FsSource;
use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;
use tracing::info;

/// Transfer mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Push documents from this machine to the device.
    #[value(alias = "+")]
    Push,
    /// Pull documents from the device to this machine.
    #[value(alias = "-")]
    Pull,
    /// Pull every item from the device (excludes still apply).
    Backup,
    /// Purge trash, orphans, duplicates and empty folders, asking before each step.
    Clean,
}

/// Push and pull files to and from your reMarkable
#[derive(Parser, Debug)]
#[command(name = "resync", version)]
#[command(about = "Push and pull files to and from your reMarkable")]
pub struct Cli {
    #[arg(value_enum)]
    pub mode: Mode,

    /// Documents and folders to push, or device paths to pull
    pub documents: Vec<String>,

    /// Don't change anything, just show what would be done
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Push: folder on the device. Pull: local directory (default: current directory)
    #[arg(short = 'o', long = "output")]
    pub destination: Option<String>,

    /// Verbosity level, repeat for more
    #[arg(short = 'v', action = ArgAction::Count)]
    pub verbose: u8,

    /// Behaviour when the destination file exists
    #[arg(long, value_enum)]
    pub if_exists: Option<ExistingPolicy>,

    /// Behaviour for device items missing from a pushed directory; items
    /// in the `--output` collections themselves are never compared
    #[arg(long, value_enum)]
    pub if_does_not_exist: Option<MissingPolicy>,

    /// Exclude a path pattern (regex anchored at the start), repeatable
    #[arg(short = 'e', long = "exclude")]
    pub exclude: Vec<String>,

    /// Remote address of the device
    #[arg(short = 'r', long = "remote-address", value_name = "IP or hostname")]
    pub host: Option<String>,

    /// Directory to render files to-be-uploaded into
    #[arg(long, value_name = "DIR")]
    pub transfer_dir: Option<PathBuf>,

    /// Render documents and keep them, but don't copy to the device
    #[arg(long)]
    pub debug: bool,

    /// Do not ask before deleting
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Configuration file path (layered over the global config)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Operate on a document store directory instead of a device over ssh
    #[arg(long, value_name = "DIR")]
    pub local_store: Option<PathBuf>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Resolved settings for one run.
pub struct CliContext {
    config: ResyncConfig,
    dry_run: bool,
    debug: bool,
    local_store: Option<PathBuf>,
}

impl CliContext {
    /// Load the configuration and apply command line overrides.
    pub fn new(cli: &Cli) -> Result<Self, SyncError> {
        let mut config = match &cli.config {
            Some(path) => ConfigLoader::load_with_file(path)?,
            None => ConfigLoader::load()?,
        };
        apply_overrides(&mut config, cli);
        config.validate().map_err(SyncError::ConfigError)?;
        Ok(Self {
            config,
            dry_run: cli.dry_run,
            debug: cli.debug,
            local_store: cli.local_store.clone(),
        })
    }

    pub fn config(&self) -> &ResyncConfig {
        &self.config
    }

    /// Connect to the configured device.
    pub fn open_device(&self) -> Result<Box<dyn Device>, SyncError> {
        match &self.local_store {
            Some(root) => {
                if !root.is_dir() {
                    return Err(SyncError::ConfigError(format!(
                        "local store {} is not a directory",
                        root.display()
                    )));
                }
                Ok(Box::new(LocalDevice::new(root, self.dry_run)))
            }
            None => Ok(Box::new(SshDevice::connect(&self.config, self.dry_run)?)),
        }
    }

    /// Run the selected mode and return the end-of-run summary.
    pub fn execute(&self, cli: &Cli) -> Result<String, SyncError> {
        if cli.mode == Mode::Pull {
            check_pull_policy(self.config.if_exists)?;
        }
        let mut device = self.open_device()?;
        let mut operator = TerminalOperator;
        match cli.mode {
            Mode::Push => self.handle_push(device.as_mut(), &mut operator, cli),
            Mode::Pull => self.handle_pull(device.as_mut(), cli),
            Mode::Backup => self.handle_backup(device.as_mut(), cli),
            Mode::Clean => self.handle_clean(device.as_mut(), &mut operator),
        }
    }

    fn handle_push(
        &self,
        device: &mut dyn Device,
        operator: &mut dyn Operator,
        cli: &Cli,
    ) -> Result<String, SyncError> {
        if cli.documents.is_empty() {
            return Err(SyncError::ConfigError("no documents to push".to_string()));
        }
        let index = load_index(device)?;
        let request = PushRequest {
            sources: cli.documents.iter().map(PathBuf::from).collect(),
            destination: cli.destination.clone(),
            if_exists: self.config.if_exists,
            if_does_not_exist: self.config.if_does_not_exist,
        };
        let excludes = self.config.excludes()?;
        let mut plan = plan_push(&index, &FsSource, &request, &excludes)?;

        print!("{}", format_push_tree(&plan.tree, terminal_width()));
        print!("{}", format_build_report(&plan.build));
        for id in &plan.removals {
            let path = index.resolve_full_path(id)?;
            println!("{} | delete", path);
        }

        if self.dry_run {
            return Ok("dry run, nothing changed".to_string());
        }
        if plan.is_noop() {
            return Ok("nothing to push".to_string());
        }
        if !plan.removals.is_empty()
            && !self.config.assume_yes
            && !operator.confirm(&format!(
                "Remove {} items missing locally from the device?",
                plan.removals.len()
            ))?
        {
            plan.removals.clear();
        }

        info!("preparing the files to copy");
        let staging = Staging::prepare(self.config.transfer_dir.as_deref(), self.debug)?;
        if self.debug {
            Renderer::new(staging.path()).render(&mut plan.tree)?;
            return Ok(format!(
                "payload data can be found in {}",
                staging.path().display()
            ));
        }
        let outcome = execute_push(device, &mut plan, staging.path())?;
        Ok(format_push_outcome(&outcome))
    }

    fn handle_pull(&self, device: &mut dyn Device, cli: &Cli) -> Result<String, SyncError> {
        let index = load_index(device)?;
        let plan = plan_pull(&index, &cli.documents, &self.config.excludes()?)?;
        self.download(device, plan, cli)
    }

    fn handle_backup(&self, device: &mut dyn Device, cli: &Cli) -> Result<String, SyncError> {
        let index = load_index(device)?;
        let plan = plan_backup(&index, &self.config.excludes()?)?;
        self.download(device, plan, cli)
    }

    fn download(
        &self,
        device: &mut dyn Device,
        plan: PullPlan,
        cli: &Cli,
    ) -> Result<String, SyncError> {
        let target = match &cli.destination {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir()?,
        };
        if !target.is_dir() {
            return Err(SyncError::ConfigError(format!(
                "output directory {} does not exist",
                target.display()
            )));
        }

        print!("{}", format_pull_tree(&plan.tree));
        print!("{}", format_build_report(&plan.build));
        let report = download_tree(
            device,
            &plan.tree,
            &target,
            self.config.if_exists,
            self.dry_run,
        )?;
        Ok(format_download_report(&report))
    }

    fn handle_clean(
        &self,
        device: &mut dyn Device,
        operator: &mut dyn Operator,
    ) -> Result<String, SyncError> {
        let mut index = load_index(device)?;
        let report = CleanupEngine::new(&mut index, device, operator)
            .assume_yes(self.config.assume_yes)
            .run(&CleanupPass::ALL)?;
        if report.state_changed() && !self.dry_run {
            device.restart()?;
        }
        Ok(format_cleanup_summary(&report))
    }
}

fn apply_overrides(config: &mut ResyncConfig, cli: &Cli) {
    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(policy) = cli.if_exists {
        config.if_exists = policy;
    }
    if let Some(policy) = cli.if_does_not_exist {
        config.if_does_not_exist = policy;
    }
    config.exclude.extend(cli.exclude.iter().cloned());
    if let Some(dir) = &cli.transfer_dir {
        config.transfer_dir = Some(dir.clone());
    }
    if cli.yes {
        config.assume_yes = true;
    }
    if let Some(level) = level_for_verbosity(cli.verbose) {
        config.logging.level = level.to_string();
    }
    if let Some(format) = &cli.log_format {
        config.logging.format = format.clone();
    }
    if let Some(output) = &cli.log_output {
        config.logging.output = output.clone();
    }
    if let Some(file) = &cli.log_file {
        config.logging.file = Some(file.clone());
    }
}
