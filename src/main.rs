use std::sync::Arc;

use clap::Parser;
use kube::CustomResourceExt;
use snafu::{ResultExt, Snafu};
use steward_run_manager::{
    cli::{Cli, Command, RunArguments},
    client::KubeClientFactory,
    config::{self, RunConfig},
    crd::{PipelineRun, PipelineRunTask},
    logging, run_manager::RunManager,
};

#[derive(Debug, Snafu)]
enum MainError {
    #[snafu(display("failed to load configuration: {source}"))]
    LoadConfig { source: steward_run_manager::config::ConfigError },

    #[snafu(display("failed to resolve kubeconfig: {source}"))]
    LoadKubeconfig { source: kube::config::KubeconfigError },

    #[snafu(display("failed to build Kubernetes client: {source}"))]
    BuildClient { source: kube::Error },

    #[snafu(display("failed to render CRD: {source}"))]
    RenderCrd { source: serde_yaml::Error },
}

#[tokio::main]
async fn main() -> Result<(), MainError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Crd => print_crds(),
        Command::Run(args) => run(args).await,
    }
}

fn print_crds() -> Result<(), MainError> {
    for crd in [PipelineRun::crd(), PipelineRunTask::crd()] {
        let rendered = serde_yaml::to_string(&crd).context(RenderCrdSnafu)?;
        println!("{rendered}---");
    }
    Ok(())
}

/// Wires up logging, configuration and the cluster client, then hands off to
/// the reconciliation loop. That loop (the `kube::runtime::Controller`
/// watch/reconcile wiring) is out of scope for this core; this function
/// returns once [`RunManager`] is ready rather than watching resources itself.
async fn run(args: RunArguments) -> Result<(), MainError> {
    let _log_guard = logging::init(args.log_directory.as_deref());

    let run_config = RunConfig::from_file(&args.config).context(LoadConfigSnafu)?;
    tracing::info!(?run_config, "loaded run configuration");

    // Held for the remainder of the process; the reconciliation loop this
    // core hands off to resolves `FeatureFlags` per pipeline-run from the
    // same thread-local, so the CLI's override must outlive it.
    let _feature_flag_guard =
        config::ScopedFeatureFlagOverride::create_aux_namespace_if_unused(args.create_aux_namespace);

    let kube_config = kube::Config::from_kubeconfig(&kube::config::KubeConfigOptions {
        context: args.context.clone(),
        ..Default::default()
    })
    .await
    .context(LoadKubeconfigSnafu)?;
    let client = kube::Client::try_from(kube_config).context(BuildClientSnafu)?;
    let client_factory = Arc::new(KubeClientFactory::new(client));
    let _run_manager = RunManager::new(client_factory);

    tracing::info!("run manager initialized; reconciliation loop is wired up outside this core");
    Ok(())
}
