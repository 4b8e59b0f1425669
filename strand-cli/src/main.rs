//! strand: entry point.
//!
//! ```text
//! strand stream [--config <path>] [--file <pcm>] [--target host:port]
//! strand transcode <input> <output> [--from enc] [--to enc] [--on-error action] [--bom]
//! strand gen-config [--output <path>]
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use strand_cli::config::StrandConfig;
use strand_cli::service::StreamService;
use strand_cli::transcode::{TranscodeOptions, transcode_file};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "strand", version, about = "Stream PCM over RTP and transcode text files")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "strand.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream a raw PCM file to an RTP receiver.
    Stream {
        /// PCM file, overriding `[media] file`.
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Receiver as `host:port`, overriding `[network]`.
        #[arg(short, long)]
        target: Option<String>,
    },

    /// Convert a text file between encodings.
    Transcode {
        input: PathBuf,
        output: PathBuf,

        /// Input encoding, or "auto".
        #[arg(long)]
        from: Option<String>,

        /// Output encoding.
        #[arg(long)]
        to: Option<String>,

        /// "throw", "replace" or "stop-then-throw".
        #[arg(long)]
        on_error: Option<String>,

        /// Write a byte-order mark.
        #[arg(long)]
        bom: bool,

        /// Output line breaks: "lf", "crlf" or "cr".
        #[arg(long)]
        newline: Option<String>,
    },

    /// Print the default configuration, or write it to `--output`.
    GenConfig {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Command::GenConfig { output } = &cli.command {
        match output {
            Some(path) => StrandConfig::write_default(path)?,
            None => println!("{}", toml::to_string_pretty(&StrandConfig::default())?),
        }
        return Ok(());
    }

    let mut config = StrandConfig::load(&cli.config);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("strand v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Stream { file, target } => {
            if let Some(file) = file {
                config.media.file = file.display().to_string();
            }
            if let Some(target) = target {
                let (host, port) = split_target(&target)?;
                config.network.target_host = host;
                config.network.rtp_port = port;
                config.network.rtcp_port = 0;
            }
            info!("target: {}:{}", config.network.target_host, config.network.rtp_port);
            info!("media: {}", config.media.file);

            let service = StreamService::new(config);
            let stop = service.stop_handle();
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Ctrl-C received, shutting down");
                stop.store(false, std::sync::atomic::Ordering::SeqCst);
            });
            service.run().await?;
        }
        Command::Transcode {
            input,
            output,
            from,
            to,
            on_error,
            bom,
            newline,
        } => {
            if let Some(from) = from {
                config.text.from = from;
            }
            if let Some(to) = to {
                config.text.to = to;
            }
            if let Some(on_error) = on_error {
                config.text.on_error = on_error;
            }
            if let Some(newline) = newline {
                config.text.newline = newline;
            }
            let options = TranscodeOptions {
                from: config.input_encoding()?,
                to: config.output_encoding()?,
                on_error: config.error_action()?,
                bom: bom || config.text.bom,
                newline: config.newline_mode()?,
            };
            transcode_file(&input, &output, &options)?;
        }
        Command::GenConfig { .. } => {}
    }

    Ok(())
}

/// Split `host:port`, accepting `[v6]:port`.
fn split_target(target: &str) -> Result<(String, u16), Box<dyn std::error::Error>> {
    let (host, port) = target
        .rsplit_once(':')
        .ok_or_else(|| format!("target {target:?} is not host:port"))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    Ok((host.to_string(), port.parse()?))
}
