use clap::{Parser, Subcommand};
use filebench::{
    config::Settings,
    harness::ThroughputHarness,
    report::BenchmarkReport,
    server::TransferServer,
    testfile,
    transport::{HttpTransport, StreamingTransport},
    Result,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "filebench")]
#[command(about = "Dual-transport file transfer throughput benchmark")]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the transfer server
    Serve,

    /// Run the throughput benchmark against a server
    Bench {
        /// Server host name or address
        #[arg(long)]
        server: String,

        /// Stream channel port override
        #[arg(long)]
        stream_port: Option<u16>,

        /// HTTP port override
        #[arg(long)]
        http_port: Option<u16>,

        /// Test file size in MB
        #[arg(long, default_value_t = 200)]
        size: u64,

        /// Download a different stored filename than the uploaded one
        #[arg(long)]
        download_name: Option<String>,

        /// Use an https base URL for the HTTP transport
        #[arg(long)]
        https: bool,

        /// Use plain TCP on the stream channel
        #[arg(long)]
        plain: bool,

        /// Skip the HTTP transport
        #[arg(long)]
        skip_http: bool,

        /// Skip the streaming transport
        #[arg(long)]
        skip_stream: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("filebench={}", log_level))
        .init();

    let mut settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Command::Serve => serve(settings).await,
        Command::Bench {
            server,
            stream_port,
            http_port,
            size,
            download_name,
            https,
            plain,
            skip_http,
            skip_stream,
        } => {
            if let Some(port) = stream_port {
                settings.network.stream_port = port;
            }
            if let Some(port) = http_port {
                settings.network.http_port = port;
            }
            if plain {
                settings.network.tls = false;
            }

            bench(
                settings,
                &server,
                size,
                download_name,
                https,
                skip_http,
                skip_stream,
            )
            .await
        }
    }
}

async fn serve(settings: Settings) -> Result<()> {
    info!("Starting filebench server v{}", env!("CARGO_PKG_VERSION"));

    let server = TransferServer::new(settings);
    let shutdown_signal = setup_shutdown_handler();

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e);
            }
        }
        _ = shutdown_signal => {
            info!("Shutdown signal received, stopping server...");
        }
    }

    info!("Server stopped");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn bench(
    settings: Settings,
    server: &str,
    size: u64,
    download_name: Option<String>,
    https: bool,
    skip_http: bool,
    skip_stream: bool,
) -> Result<()> {
    let settings = Arc::new(settings);
    let test_file = testfile::create_test_file(Path::new("."), size)?;

    let mut harness = ThroughputHarness::new(test_file, PathBuf::from("."))?;
    if let Some(name) = download_name {
        harness = harness.with_download_filename(&name);
    }

    let mut outcomes = Vec::new();

    if !skip_http {
        let scheme = if https { "https" } else { "http" };
        let base_url = format!("{}://{}:{}", scheme, server, settings.network.http_port);
        info!("Testing HTTP at {}", base_url);

        let transport = HttpTransport::new(&base_url, settings.clone())?;
        outcomes.push(harness.run_transport(&transport).await);
    }

    if !skip_stream {
        let addr = format!("{}:{}", server, settings.network.stream_port);
        info!("Testing stream channel at {}", addr);

        let transport = StreamingTransport::new(addr, settings.clone());
        outcomes.push(harness.run_transport(&transport).await);
    }

    let report = BenchmarkReport::new(size, &outcomes);
    report.print_table();
    report.save(Path::new("benchmark_results.json"))?;
    println!("\nResults saved to benchmark_results.json");

    Ok(())
}

async fn setup_shutdown_handler() {
    use tokio::signal;

    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate()).unwrap();
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt()).unwrap();

        tokio::select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv() => {},
        }
    }

    #[cfg(windows)]
    {
        signal::ctrl_c().await.unwrap();
    }
}
