use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

use cephlab_core::{CephlabError, DeployMode, ImageSource, InstanceKind};

mod commands;

/// Exit status for a run stopped by Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "cephlab")]
#[command(about = "Single-node cephadm test clusters on LXD", long_about = None)]
struct Cli {
    /// Number of OSDs the cluster must reach
    #[arg(long = "osd-num", global = true, default_value_t = 3)]
    osd_num: u32,

    /// Use a system container instead of a virtual machine (no OSD volumes)
    #[arg(long, global = true, conflicts_with = "direct_host")]
    container: bool,

    /// Deploy directly on this machine without provisioning an instance
    #[arg(long, global = true)]
    direct_host: bool,

    /// Configuration file (defaults to <config dir>/cephlab/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Root of the ceph source tree holding the helper scripts
    #[arg(long, global = true, default_value = ".")]
    source: PathBuf,

    /// Continue a previous run from its model file
    #[arg(long, global = true)]
    resume: Option<PathBuf>,

    /// Replicate pools across OSDs instead of hosts once the cluster is up
    #[arg(long, global = true)]
    patch_replication: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy with a published container image
    Image {
        /// Image reference (e.g. "quay.io/ceph/ceph:v18")
        reference: String,
    },

    /// Build the container image from the source tree and deploy it
    Build {
        /// Build argument passed to the image build (KEY=VALUE)
        #[arg(long = "build-args")]
        build_args: Option<String>,
    },

    /// Load a pre-built image archive and deploy it
    Archive {
        /// Path to the image archive
        path: PathBuf,
    },

    /// Delete every resource recorded in a model file
    Delete {
        /// Model file written by a deployment run
        model_file: PathBuf,
    },
}

impl Cli {
    fn mode(&self) -> DeployMode {
        if self.direct_host {
            DeployMode::DirectHost
        } else if self.container {
            DeployMode::Instance(InstanceKind::Container)
        } else {
            DeployMode::Instance(InstanceKind::Vm)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = cephlab_core::init_observability() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if matches!(e.downcast_ref::<CephlabError>(), Some(CephlabError::Interrupted)) => {
            eprintln!(
                "{} deployment interrupted, resources created so far are recorded",
                "!".yellow().bold()
            );
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let image = match &cli.command {
        Commands::Delete { model_file } => return commands::delete(model_file).await,
        Commands::Image { reference } => ImageSource::Registry(reference.clone()),
        Commands::Build { build_args } => ImageSource::Build { build_arg: build_args.clone() },
        Commands::Archive { path } => ImageSource::Archive(path.clone()),
    };

    commands::deploy(commands::DeployArgs {
        mode: cli.mode(),
        image,
        expected_osds: cli.osd_num,
        patch_replication: cli.patch_replication,
        config: cli.config,
        source: cli.source,
        resume: cli.resume,
    })
    .await
}
