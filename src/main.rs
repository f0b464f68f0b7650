use lidar_cluster::config::{ExecutorConfig, WorkerConfig};
use lidar_cluster::executor::executor::LidarExecutor;
use lidar_cluster::executor::registry::MapFunctionRegistry;
use lidar_cluster::executor::remote::RemoteExecutor;
use lidar_cluster::storage::locator::{DataLocator, ObjectUrl};
use lidar_cluster::storage::metadata::HttpObjectStore;
use lidar_cluster::worker::client::HttpRemoteExecutor;
use lidar_cluster::worker::functions::register_builtin;
use lidar_cluster::worker::handlers::router;
use lidar_cluster::worker::service::WorkerService;

use anyhow::Context;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

const ENV_WORKER_URL: &str = "LIDAR_WORKER_URL";
const ENV_STORAGE_URL: &str = "LIDAR_STORAGE_URL";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        // .with_max_level(tracing::Level::DEBUG)
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        usage(&args[0]);
        std::process::exit(1);
    }

    let flags = parse_flags(&args[2..])?;

    match args[1].as_str() {
        "worker" => serve_worker(&flags).await,
        "run" => {
            let worker_url = flag_or_env(&flags, "--worker", ENV_WORKER_URL)
                .context("--worker is required")?;
            tracing::info!("Dispatching to worker at {}", worker_url);
            let remote = Arc::new(HttpRemoteExecutor::new(&worker_url));
            run_job(remote, &flags).await
        }
        "local" => {
            tracing::info!("Running map functions in-process");
            run_job(local_worker()?, &flags).await
        }
        _ => {
            usage(&args[0]);
            std::process::exit(1);
        }
    }
}

fn usage(program: &str) {
    eprintln!("Usage: {} worker --bind <addr:port>", program);
    eprintln!(
        "       {} run --worker <url> --object <cos://bucket/key> (--size <bytes> | --storage <url>) --chunks <n> --function <name> [--params <json>]",
        program
    );
    eprintln!(
        "       {} local --object <cos://bucket/key> --size <bytes> --chunks <n> --function <name>",
        program
    );
    eprintln!("Example: {} worker --bind 127.0.0.1:6000", program);
    eprintln!(
        "Example: {} run --worker http://127.0.0.1:6000 --object cos://lidar/tile.laz --size 10485760 --chunks 8 --function byte_length",
        program
    );
}

fn parse_flags(args: &[String]) -> anyhow::Result<HashMap<String, String>> {
    let mut flags = HashMap::new();

    let mut i = 0;
    while i < args.len() {
        let name = &args[i];
        if !name.starts_with("--") {
            anyhow::bail!("Unexpected argument: {}", name);
        }
        let value = args
            .get(i + 1)
            .with_context(|| format!("{} requires a value", name))?;
        flags.insert(name.clone(), value.clone());
        i += 2;
    }

    Ok(flags)
}

fn flag_or_env(flags: &HashMap<String, String>, name: &str, env: &str) -> Option<String> {
    flags
        .get(name)
        .cloned()
        .or_else(|| std::env::var(env).ok())
}

fn required<'a>(flags: &'a HashMap<String, String>, name: &str) -> anyhow::Result<&'a str> {
    flags
        .get(name)
        .map(String::as_str)
        .with_context(|| format!("{} is required", name))
}

fn local_worker() -> anyhow::Result<Arc<WorkerService>> {
    let registry = MapFunctionRegistry::new();
    register_builtin(&registry);
    Ok(WorkerService::new(registry, WorkerConfig::from_env()?))
}

async fn serve_worker(flags: &HashMap<String, String>) -> anyhow::Result<()> {
    let bind_addr: SocketAddr = required(flags, "--bind")?.parse()?;

    let service = local_worker()?;
    tracing::info!(
        "Worker functions: {:?} (max {} in flight)",
        service.registry().list_functions(),
        service.max_in_flight()
    );

    let app = router(service.clone());

    // Finished invocations stay pollable for the retention period, then are dropped.
    let pruned = service.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));

        loop {
            interval.tick().await;
            let removed = pruned.prune_finished(pruned.result_retention());
            if removed > 0 {
                tracing::info!(
                    "Pruned {} finished invocations ({} in flight)",
                    removed,
                    pruned.in_flight()
                );
            }
        }
    });

    tracing::info!("HTTP server listening on {}", bind_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn run_job<R: RemoteExecutor>(
    remote: Arc<R>,
    flags: &HashMap<String, String>,
) -> anyhow::Result<()> {
    let executor = LidarExecutor::new(remote, ExecutorConfig::from_env()?)?;

    let function = required(flags, "--function")?;
    let object = required(flags, "--object")?;
    let chunk_count: u32 = required(flags, "--chunks")?
        .parse()
        .context("--chunks must be a positive integer")?;
    let params = match flags.get("--params") {
        Some(raw) => serde_json::from_str(raw).context("--params must be valid JSON")?,
        None => serde_json::Value::Null,
    };

    let mut run = match (
        flags.get("--size"),
        flag_or_env(flags, "--storage", ENV_STORAGE_URL),
    ) {
        (Some(size), _) => {
            let url = ObjectUrl::parse(object)?;
            let locator = DataLocator::new(url.bucket, url.key, size.parse()?);
            executor
                .map_with_params(function, &locator, chunk_count, params)
                .await?
        }
        (None, Some(endpoint)) => {
            let store = HttpObjectStore::new(&endpoint);
            executor
                .map_object(&store, function, object, chunk_count, params)
                .await?
        }
        (None, None) => anyhow::bail!("either --size or --storage is required"),
    };

    let outcome = tokio::select! {
        outcome = executor.get_result(&mut run, None) => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    };

    let Some(outcome) = outcome else {
        executor.cancel(&mut run).await;
        anyhow::bail!("Run {} cancelled", run.run_id());
    };
    let results = outcome?;

    let progress = run.progress();
    tracing::info!(
        "Run {} finished: {}/{} chunks succeeded",
        run.run_id(),
        progress.succeeded,
        progress.total()
    );
    println!("{}", serde_json::to_string_pretty(&results)?);

    Ok(())
}
