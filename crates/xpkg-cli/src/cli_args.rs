use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "xpkg",
    about = "Activate package revisions and provision their controller workloads",
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub settings: ControllerSettings,

    #[arg(
        long = "log-level",
        env = "XPKG_LOG_LEVEL",
        global = true,
        help = "Tracing filter directives, e.g. 'debug' or 'xpkg_revision=debug'. Overrides RUST_LOG."
    )]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, Args)]
pub struct ControllerSettings {
    #[arg(
        long,
        env = "XPKG_NAMESPACE",
        default_value = "xpkg-system",
        global = true,
        help = "Namespace that controller workloads are deployed into."
    )]
    pub namespace: String,

    #[arg(
        long = "field-manager",
        env = "XPKG_FIELD_MANAGER",
        default_value = "xpkg-package-manager",
        global = true,
        help = "Field manager name used for server-side apply."
    )]
    pub field_manager: String,
}

impl ControllerSettings {
    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            bail!("--namespace cannot be empty");
        }
        if self.field_manager.trim().is_empty() {
            bail!("--field-manager cannot be empty");
        }
        Ok(())
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Print the service account and deployment built for a provider revision.
    Render(RenderArgs),
    /// Run pre, establishment and post for a revision.
    Activate(ActivateArgs),
}

#[derive(Debug, Args)]
pub struct RenderArgs {
    #[arg(long, help = "Package revision JSON document.")]
    pub revision: PathBuf,

    #[arg(long, help = "Package meta JSON document.")]
    pub package: PathBuf,

    #[arg(long = "controller-config", help = "ControllerConfig JSON document to apply.")]
    pub controller_config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ActivateArgs {
    #[arg(long, help = "Package revision JSON document.")]
    pub revision: PathBuf,

    #[arg(long, help = "Package meta JSON document.")]
    pub package: PathBuf,

    #[arg(long, help = "JSON array of objects to bring under the revision.")]
    pub objects: Option<PathBuf>,

    #[arg(
        long = "dry-run",
        help = "Run against an in-memory store instead of the cluster."
    )]
    pub dry_run: bool,

    #[arg(
        long,
        requires = "dry_run",
        help = "JSON array of objects preloaded into the dry-run store."
    )]
    pub seed: Option<PathBuf>,
}
