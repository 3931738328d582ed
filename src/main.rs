use batch_zip::{
    BatchOutcome, BatchZipService, Config, DownloadLog, DownloadRequest, Error, FetchStatus,
    Result, run_with_shutdown,
};
use clap::{ArgAction, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::Level;

#[derive(Debug, Parser)]
#[command(
    name = "batch-zip",
    version,
    about = "Fetch a batch of URLs and bundle them into a single ZIP archive"
)]
struct Cli {
    #[arg(
        short = 'v',
        long = "verbose",
        help = "Sets the level of verbosity",
        action = ArgAction::Count,
        global = true
    )]
    verbose: u8,

    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        help = "JSON configuration file",
        global = true
    )]
    config: Option<PathBuf>,

    #[arg(
        long = "temp-dir",
        value_name = "DIR",
        help = "Overrides the temporary archive directory",
        global = true
    )]
    temp_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Serve the REST API until interrupted
    Serve {
        #[arg(
            short = 'b',
            long = "bind",
            value_name = "ADDR",
            help = "Overrides the bind address (default 127.0.0.1:3000)"
        )]
        bind: Option<SocketAddr>,
    },

    /// Fetch the URLs listed in a file and write the archive locally
    Bundle {
        #[arg(
            short = 'i',
            long = "input",
            value_name = "FILE",
            help = "File with one URL per line (blank lines are ignored)"
        )]
        input: PathBuf,

        #[arg(
            short = 'o',
            long = "output",
            value_name = "FILE",
            help = "Where to write the ZIP archive"
        )]
        output: PathBuf,

        #[arg(
            short = 'u',
            long = "username",
            value_name = "USER",
            env = "BATCH_ZIP_USERNAME",
            help = "Basic-auth username for every URL"
        )]
        username: Option<String>,

        #[arg(
            short = 'p',
            long = "password",
            value_name = "PASSWORD",
            env = "BATCH_ZIP_PASSWORD",
            hide_env_values = true,
            help = "Basic-auth password for every URL"
        )]
        password: Option<String>,

        #[arg(
            long = "skip-failed",
            help = "When some URLs fail, retry the batch once with only the URLs that succeeded"
        )]
        skip_failed: bool,
    },
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = load_config(cli.config.as_deref()).await?;
    if let Some(temp_dir) = cli.temp_dir {
        config.storage.temp_dir = temp_dir;
    }

    match cli.command {
        CliCommand::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.api.bind_address = bind;
            }
            serve(config).await
        }
        CliCommand::Bundle {
            input,
            output,
            username,
            password,
            skip_failed,
        } => {
            let mut request = DownloadRequest::new(read_url_list(&input).await?);
            if let (Some(username), Some(password)) = (username, password) {
                request = request.with_credentials(username, password);
            }
            bundle(config, request, &output, skip_failed).await
        }
    }
}

fn init_tracing(verbose: u8) {
    let log_level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();
}

async fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };

    let raw = tokio::fs::read_to_string(path).await.map_err(|e| Error::Config {
        message: format!("failed to read {}: {e}", path.display()),
        key: None,
    })?;
    let config: Config = serde_json::from_str(&raw).map_err(|e| Error::Config {
        message: format!("failed to parse {}: {e}", path.display()),
        key: None,
    })?;

    tracing::debug!(path = %path.display(), "loaded configuration");
    Ok(config)
}

async fn read_url_list(path: &Path) -> Result<Vec<String>> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

async fn serve(config: Config) -> Result<()> {
    let service = BatchZipService::new(config).await?;

    let _sweeper = service.spawn_sweeper();
    let mut api_handle = service.spawn_api_server();

    tokio::select! {
        result = run_with_shutdown(service.clone()) => result?,
        // Server exited before any signal, e.g. the address was in use
        joined = &mut api_handle => return server_result(joined),
    }

    server_result(api_handle.await)
}

fn server_result(joined: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    joined.map_err(|e| Error::ApiServerError(e.to_string()))?
}

async fn bundle(
    config: Config,
    request: DownloadRequest,
    output: &Path,
    skip_failed: bool,
) -> Result<()> {
    let service = BatchZipService::new(config).await?;

    let mut outcome = service.submit(request.clone()).await?;
    print_log(outcome.log());

    let rerun = match &outcome {
        BatchOutcome::Failed { log } if skip_failed => Some(log),
        _ => None,
    };
    if let Some(log) = rerun {
        let succeeded = log.succeeded_urls();
        if succeeded.is_empty() {
            return Err(Error::BatchFailed {
                failed: log.failed_count(),
                total: log.len(),
            });
        }

        println!(
            "Skipping {} failed URL(s), retrying with {} URL(s)",
            log.failed_count(),
            succeeded.len()
        );
        outcome = service
            .submit(request.without_urls(&log.failed_urls()))
            .await?;
        print_log(outcome.log());
    }

    match outcome {
        BatchOutcome::Archived { artifact, .. } => {
            let archive = service.retrieve(artifact.id.as_str()).await?;
            tokio::fs::write(output, &archive.content).await?;
            println!(
                "Wrote {} ({} bytes) to {}",
                archive.id,
                archive.content.len(),
                output.display()
            );
            Ok(())
        }
        BatchOutcome::Failed { log } => Err(Error::BatchFailed {
            failed: log.failed_count(),
            total: log.len(),
        }),
    }
}

fn print_log(log: &DownloadLog) {
    for outcome in log.outcomes() {
        match outcome.status {
            FetchStatus::Success => {
                println!("ok      {} (retries: {})", outcome.url, outcome.retries)
            }
            FetchStatus::Failed => println!(
                "failed  {} (retries: {}): {}",
                outcome.url,
                outcome.retries,
                outcome.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}
