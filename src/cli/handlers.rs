use crate::{
    cli::commands::LoggingArgs,
    config::GatewaySettings,
    gateway::{Gateway, SubscribeStatus},
    poller::{ChannelSink, Termination},
    server,
};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_log::LogTracer;
use tracing_subscriber::{fmt, fmt::writer::BoxMakeWriter, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "h2=warn,hyper=warn,tower=warn";

/// Install the global subscriber.
///
/// Logs go to stderr unless a log directory is given. The returned guard
/// flushes the file writer and must live until the process exits.
pub fn init_logging(args: &LoggingArgs) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::builder()
        .with_default_directive(args.get_effective_level().into())
        .parse_lossy(args.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER));

    let (writer, guard) = match &args.log_dir {
        Some(dir) => {
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, "orcastream.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(args.log_dir.is_none())
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;
    LogTracer::init().context("Failed to initialize log tracer")?;

    Ok(guard)
}

pub async fn handle_serve(settings: GatewaySettings) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", settings.http.host, settings.http.port)
        .parse()
        .context("Invalid listen address")?;

    let gateway = Gateway::connect(settings)
        .await
        .context("Failed to connect to Flight server")?;

    server::serve(Arc::new(gateway), addr, shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

pub async fn handle_streams(settings: GatewaySettings) -> Result<()> {
    let gateway = Gateway::connect(settings)
        .await
        .context("Failed to connect to Flight server")?;

    let streams = gateway.list_streams().await.context("Failed to list streams")?;
    if streams.is_empty() {
        println!("No streams available");
    }
    for stream in streams {
        println!("{}", stream);
    }
    Ok(())
}

pub async fn handle_tail(settings: GatewaySettings, stream: &str, json: bool) -> Result<()> {
    let gateway = Arc::new(
        Gateway::connect(settings)
            .await
            .context("Failed to connect to Flight server")?,
    );

    if gateway.subscribe(stream).await == SubscribeStatus::NotFound {
        anyhow::bail!("Stream not found: {}", stream);
    }

    let (sink, mut rx) = ChannelSink::channel(server::LIVE_BUFFER);
    let subscription = gateway.spawn(stream, sink);

    let interrupted = shutdown_signal();
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            _ = &mut interrupted => {
                subscription.cancel();
                break;
            }
            frame = rx.recv() => match frame {
                Some(frame) if json => println!("{}", frame.to_json()?),
                Some(frame) => print!("{}", frame.to_table()?),
                None => break,
            },
        }
    }

    drop(rx);
    match subscription.join().await.context("Subscription task failed")? {
        Ok(Termination::Cancelled) | Ok(Termination::Shutdown) => Ok(()),
        Err(e) => Err(e).context(format!("Stream {} terminated", stream)),
    }
}

pub fn handle_config(settings: &GatewaySettings) -> Result<()> {
    let rendered = serde_json::to_string_pretty(settings).context("Failed to render settings")?;
    println!("{}", rendered);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Interrupt received, shutting down");
}
