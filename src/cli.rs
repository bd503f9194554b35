//! Command-line entry points: `run` starts the long-lived process (logging,
//! config, client construction), `crd` prints the generated custom resource
//! definitions for offline inspection or `kubectl apply -f -`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "run-manager", about = "Steward pipeline-run preparation core")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the process: initialize logging, load configuration, build the
    /// cluster client, and hand off to the (out-of-scope) reconciler entry point.
    Run(RunArguments),

    /// Print the generated CRD YAML for `PipelineRun` and `PipelineRunTask`.
    Crd,
}

#[derive(Debug, Parser)]
pub struct RunArguments {
    /// Path to the operator-supplied `RunConfig` YAML document.
    #[arg(long, env = "RUN_MANAGER_CONFIG")]
    pub config: PathBuf,

    /// Directory to additionally write rolling JSON log files to.
    #[arg(long, env = "RUN_MANAGER_LOG_DIRECTORY")]
    pub log_directory: Option<PathBuf>,

    /// Kubeconfig context to use; defaults to the ambient client configuration.
    #[arg(long, env = "RUN_MANAGER_CONTEXT")]
    pub context: Option<String>,

    /// Enables the auxiliary-namespace feature flag regardless of `RunConfig`.
    #[arg(long, env = "RUN_MANAGER_CREATE_AUX_NAMESPACE")]
    pub create_aux_namespace: bool,
}
