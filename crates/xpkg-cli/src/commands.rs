use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use kube::core::DynamicObject;
use serde_json::json;
use tracing::info;
use xpkg_revision::{
    ApiEstablisher, DefaultWorkloadBuilder, HookRegistry, ProviderHooks, RevisionReconciler,
    WorkloadBuilder,
};
use xpkg_store::{InMemoryObjectStore, KubeObjectStore, ObjectStore};
use xpkg_types::{decode_package_meta, ControllerConfig, PackageMeta, PackageRevision};

use crate::bootstrap_helpers::read_json_file;
use crate::cli_args::{ActivateArgs, Cli, CliCommand, ControllerSettings, RenderArgs};

pub(crate) async fn run_cli(cli: Cli) -> Result<()> {
    match cli.command {
        CliCommand::Render(args) => execute_render(&cli.settings, &args),
        CliCommand::Activate(args) => execute_activate(&cli.settings, &args).await,
    }
}

fn read_package_meta(path: &Path) -> Result<PackageMeta> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    decode_package_meta(&raw)
        .with_context(|| format!("failed to decode package meta {}", path.display()))
}

fn read_objects(path: Option<&Path>) -> Result<Vec<DynamicObject>> {
    match path {
        Some(path) => read_json_file(path),
        None => Ok(Vec::new()),
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}

fn execute_render(settings: &ControllerSettings, args: &RenderArgs) -> Result<()> {
    let revision: PackageRevision = read_json_file(&args.revision)?;
    let meta = read_package_meta(&args.package)?;
    let provider = meta
        .as_provider()
        .ok_or_else(|| anyhow!("package '{}' is not a provider package", meta.name()))?;
    let config = args
        .controller_config
        .as_deref()
        .map(read_json_file::<ControllerConfig>)
        .transpose()?;

    let workload =
        DefaultWorkloadBuilder.build(provider, &revision, config.as_ref(), &settings.namespace);
    print_json(&json!({
        "serviceAccount": workload.service_account,
        "deployment": workload.deployment,
    }))
}

async fn connect_store(
    settings: &ControllerSettings,
    args: &ActivateArgs,
) -> Result<Arc<dyn ObjectStore>> {
    if args.dry_run {
        let seed = read_objects(args.seed.as_deref())?;
        let store = InMemoryObjectStore::seeded(seed)
            .await
            .context("failed to seed dry-run store")?;
        return Ok(Arc::new(store));
    }
    let client = kube::Client::try_default()
        .await
        .context("failed to create kubernetes client")?;
    let store = KubeObjectStore::new(client, settings.field_manager.clone());
    info!(
        field_manager = store.field_manager(),
        "connected to kubernetes api server"
    );
    Ok(Arc::new(store))
}

async fn execute_activate(settings: &ControllerSettings, args: &ActivateArgs) -> Result<()> {
    let mut revision: PackageRevision = read_json_file(&args.revision)?;
    let meta = read_package_meta(&args.package)?;
    let objects = read_objects(args.objects.as_deref())?;
    let store = connect_store(settings, args).await?;

    let reconciler = RevisionReconciler::new(
        HookRegistry::standard(ProviderHooks::new(store.clone(), settings.namespace.clone())),
        Arc::new(ApiEstablisher::new(store)),
    );
    info!(
        revision = revision.name(),
        package = meta.name(),
        package_api_version = meta.version().api_version(),
        objects = objects.len(),
        dry_run = args.dry_run,
        "activating revision"
    );
    let outcome = reconciler.reconcile(&meta, &mut revision, &objects).await;
    print_json(&revision)?;
    outcome.with_context(|| format!("failed to reconcile revision '{}'", revision.name()))
}
