use anyhow::{Context, Result};
use clap::Parser;
use commonlog::config::load_settings;
use commonlog::{AlertLevel, Attachment, Notifier, cache, logging};
use std::path::{Path, PathBuf};

/// Send one alert through the configured provider.
///
/// Provider credentials and defaults come from the environment (and `.env`).
#[derive(Parser, Debug)]
#[command(name = "commonlog")]
#[command(version)]
struct Cli {
    /// Alert level: info, warn or error
    #[arg(long, short, default_value = "error")]
    level: AlertLevel,

    /// Channel override; defaults to the configured resolver or channel
    #[arg(long, short)]
    channel: Option<String>,

    /// Provider override (slack or lark)
    #[arg(long)]
    provider: Option<String>,

    /// File whose contents are appended as a trace log
    #[arg(long)]
    trace_file: Option<PathBuf>,

    /// Public URL of an attached file
    #[arg(long)]
    attachment_url: Option<String>,

    /// Local text file attached inline
    #[arg(long)]
    attachment_file: Option<PathBuf>,

    /// Alert message
    message: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize rustls crypto provider
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = Cli::parse();
    let config = load_settings().context("failed to load configuration")?;
    logging::init(config.debug, config.log_json);

    tracing::debug!(
        provider = %config.provider,
        send_method = %config.send_method,
        level = %cli.level,
        "Configuration loaded"
    );

    let attachment = build_attachment(cli.attachment_url, cli.attachment_file.as_deref()).await?;
    let trace = match &cli.trace_file {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read trace file {}", path.display()))?,
        ),
        None => None,
    };

    let notifier = Notifier::new(config);
    let channel = cli.channel.as_deref();
    let result = match cli.provider.as_deref() {
        Some(provider) => {
            notifier
                .send_with_provider(provider, cli.level, &cli.message, attachment, trace.as_deref(), channel)
                .await
        }
        None => {
            notifier
                .send_to_channel(cli.level, &cli.message, attachment, trace.as_deref(), channel)
                .await
        }
    };

    if notifier.config().debug {
        notifier.log_stats().await;
    }
    cache::shutdown().await;

    result.context("failed to send alert")
}

async fn build_attachment(url: Option<String>, file: Option<&Path>) -> Result<Option<Attachment>> {
    let mut attachment = Attachment {
        url,
        ..Default::default()
    };

    if let Some(path) = file {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read attachment {}", path.display()))?;
        attachment.file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        attachment.content = Some(content);
    }

    Ok((attachment != Attachment::default()).then_some(attachment))
}
