mod cli;

use mediarelay::{
    config,
    delivery::{self, DeliveryOrchestrator, MediaJob},
    server,
    session::{BridgeClient, LifecycleSettings, MessagingSession, SessionManager},
};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting Mediarelay server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    server::start_server(config).await
}

async fn deliver_file(
    file: &Path,
    to: String,
    caption: String,
    wait: u64,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    let engine = config.tools.locate_engine()?;
    let bridge = BridgeClient::from_config(&config.session);
    let settings = LifecycleSettings::from(&config.session);
    let poll_interval = settings.poll_interval;
    let (session, _supervisor) = SessionManager::new(Arc::new(bridge), settings);

    session
        .initialize()
        .await
        .context("Failed to start messaging session")?;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(wait);
    loop {
        session.poll().await;
        if session.is_ready() {
            break;
        }
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!(
                "Messaging session not ready after {}s (state: {:?})",
                wait,
                session.state()
            );
        }
        tokio::time::sleep(poll_interval).await;
    }

    let orchestrator = DeliveryOrchestrator::new(
        session,
        Arc::new(engine),
        config.policy.clone(),
        &config.session,
    );
    let outcome = orchestrator
        .deliver(&MediaJob::new(file, to, caption))
        .await;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    if !outcome.success {
        std::process::exit(1);
    }
    Ok(())
}

async fn probe_file(file: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = config::load_config_or_default(config_path)?;
    let engine = config.tools.locate_engine()?;

    let format = delivery::probe_format(&engine, file).await;
    let (class, size_mb) = delivery::classify(file, &config.policy).await?;

    if json {
        let value = serde_json::json!({
            "file": file,
            "size_mb": size_mb,
            "size_class": format!("{:?}", class),
            "format": format,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("File: {}", file.display());
        println!("Size: {:.2} MB ({:?})", size_mb, class);
        println!(
            "Video codec: {}",
            format.video_codec.as_deref().unwrap_or("-")
        );
        println!(
            "Audio codec: {}",
            format.audio_codec.as_deref().unwrap_or("none")
        );
        println!(
            "Compatible: {}",
            if format.is_compatible { "yes" } else { "no, will convert" }
        );
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    println!("Transcoding tools (needed to convert and compress media):\n");

    let statuses = config.tools.inspect();
    for status in &statuses {
        let mark = if status.is_usable() { "✓" } else { "✗" };
        let location = status
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "not found".to_string());
        match status.version {
            Some(ref version) => println!("{} {} {} - {}", mark, status.tool, version, location),
            None => println!("{} {} - {}", mark, status.tool, location),
        }
    }

    println!();
    if statuses.iter().all(|s| s.is_usable()) {
        println!("Incompatible and oversized media can be converted.");
    } else {
        println!("The server will not start without both tools.");
        println!("Install ffmpeg or set ffmpeg_path/ffprobe_path under [tools].");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Sidecar: {}", config.session.bridge_url);
    println!(
        "  Limits: passthrough ≤{}MB, reject >{}MB",
        config.policy.no_compression_limit_mb, config.policy.max_input_size_mb
    );
    println!(
        "  Upload attempts: {} ({}ms apart)",
        config.policy.upload_attempts, config.policy.upload_retry_delay_ms
    );

    Ok(())
}

fn print_version() {
    println!("mediarelay {}", env!("CARGO_PKG_VERSION"));
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mediarelay=trace,mediarelay_av=trace,tower_http=debug".to_string()
        } else {
            "mediarelay=debug,mediarelay_av=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Deliver {
            file,
            to,
            caption,
            wait,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(deliver_file(&file, to, caption, wait, cli.config.as_deref()))
        }
        Commands::Probe { file, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, json, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate { config } => {
            validate_config(config.as_deref().or(cli.config.as_deref()))
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}
