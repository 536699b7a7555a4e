use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use continuum_backend::{
    connection::{ConnectionManager, ZmqConnector},
    init_logging, print_backends,
    jobs::Orchestrator,
    ProcessState, RunArgs,
};
use continuum_data_store::{DataStoreClient, RedisBatchSource};
use continuum_training::BackendRegistry;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::runtime::Builder;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser, Debug)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the built-in training backends and their default identities.
    ShowBackends {
        #[clap(long)]
        json: bool,
    },
    /// Connect to the scheduler and serve retrain requests.
    Run {
        #[clap(flatten)]
        args: RunArgs,
    },
}

async fn async_main() -> Result<()> {
    let args = Args::parse();
    let registry = BackendRegistry::builtin();

    match args.command {
        Commands::ShowBackends { json } => print_backends(&registry, json),
        Commands::Run { args } => {
            init_logging(args.log_output, args.log_level, args.write_log.clone())?;

            info!(
                "============ Backend Startup at {} ============",
                OffsetDateTime::now_utc()
            );

            let entry = registry
                .get(&args.backend_module)
                .ok_or_else(|| anyhow!("unknown backend module {:?}", args.backend_module))?;
            let identity = args.identity(entry)?;
            info!(
                backend = entry.name,
                name = %identity.name,
                version = %identity.version,
                app = %identity.app_name,
                policy = %identity.policy,
                input_type = %identity.input_type,
                "Backend identity"
            );

            let connector = ZmqConnector::resolve(&args.continuum_host, args.continuum_port)
                .await
                .context("failed to resolve the scheduler address")?;
            info!("Scheduler endpoint {}", connector.endpoint());
            let source = RedisBatchSource::connect(
                &args.redis_host,
                args.redis_port,
                args.redis_db,
                args.redis_timeout(),
            )
            .await
            .context("failed to connect to the data store")?;

            let cancel = CancellationToken::new();
            let state = Arc::new(ProcessState::new());
            let backend = entry.create(&args.model_root);
            let (orchestrator, orchestrator_task) =
                Orchestrator::new(backend, state.clone(), args.cancel_grace()).spawn(cancel.clone());
            orchestrator.fetch()?;

            let manager = ConnectionManager::new(
                connector,
                identity.metadata()?,
                DataStoreClient::new(source),
                orchestrator,
                state,
                args.connection_config(),
            );
            let manager_task = tokio::spawn(manager.run(cancel.clone()));

            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for ctrl-c")?;
            info!("Received ctrl-c, shutting down");
            cancel.cancel();

            if let Err(err) = manager_task.await {
                error!("Connection manager task failed: {err}");
            }
            if let Err(err) = orchestrator_task.await {
                error!("Orchestrator task failed: {err}");
            }
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    let runtime = Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .build()?;
    runtime.block_on(async_main())
}
