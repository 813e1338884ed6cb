use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;
use futures::stream::{self, StreamExt};
use indicatif::MultiProgress;
use log::{debug, error, info, warn};
use shelf_upload::file_config::FileConfig;
use shelf_upload::upload::planner;
use shelf_upload::upload::progress::file_progress_bar;
use shelf_upload::upload::{DEFAULT_CHUNK_SIZE, RetryPolicy};
use shelf_upload::{
    CancelHandle, Config, UploadConfig, UploadOptions, UploadOutcome, UploadTarget, upload_file,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_RETRIES: u32 = 3;
const MIB: u64 = 1024 * 1024;

#[derive(Parser)]
#[command(name = "shelf-upload")]
#[command(about = "Upload book PDFs, audio tracks and manga chapters in chunks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload one or more files
    Upload {
        /// Files to upload (can specify multiple files)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// What the files are; picks endpoint, size limit and accepted types
        #[arg(long, default_value = "generic", value_parser = clap::value_parser!(UploadTarget))]
        target: UploadTarget,

        /// API token for authentication
        #[arg(short, long, env = "SHELF_API_TOKEN")]
        token: Option<String>,

        /// API base URL
        #[arg(long, env = "SHELF_API_URL")]
        api_url: Option<String>,

        /// Config file (defaults to ./shelf-upload.json or the user config directory)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the target's endpoint (absolute URL or path on the API)
        #[arg(long)]
        endpoint: Option<String>,

        /// Chunk size in MB (default: 5)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..=1024))]
        chunk_size_mb: Option<u64>,

        /// Override the target's maximum file size in MB
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        max_size_mb: Option<u64>,

        /// Per-chunk timeout in seconds (default: 120)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        timeout_secs: Option<u64>,

        /// Retries per chunk for transient failures (default: 3)
        #[arg(long)]
        retries: Option<u32>,

        /// Extra form field sent with every chunk, as key=value
        #[arg(long = "field", value_parser = parse_key_val)]
        fields: Vec<(String, String)>,

        /// Number of files uploaded at the same time (1-8, default: 2)
        #[arg(long, default_value = "2")]
        parallel: usize,
    },

    /// Show how a file would be split, without uploading anything
    Plan {
        file: PathBuf,

        /// Chunk size in MB (default: 5)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..=1024))]
        chunk_size_mb: Option<u64>,
    },
}

/// Parse a `key=value` form field
fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid field '{s}': expected key=value"))?;
    if key.is_empty() {
        return Err(format!("invalid field '{s}': key cannot be empty"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Converts a size given in MB to bytes.
fn mib_to_bytes(mb: u64, what: &str) -> shelf_upload::Result<u64> {
    mb.checked_mul(MIB).ok_or_else(|| {
        shelf_upload::Error::ConfigError(format!("{what} of {mb} MB is too large"))
    })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or_else(|| path.display().to_string(), ToString::to_string)
}

fn plan(file: &Path, chunk_size_mb: Option<u64>) -> Result<()> {
    let size = std::fs::metadata(file)?.len();
    let chunk_size = chunk_size_mb
        .map_or(Ok(DEFAULT_CHUNK_SIZE), |mb| mib_to_bytes(mb, "Chunk size"))?;
    let total = planner::plan_chunks(size, chunk_size);

    println!(
        "{}: {size} bytes, {total} chunk(s) of up to {chunk_size} bytes",
        file.display()
    );
    for chunk in planner::chunks(size, chunk_size) {
        println!(
            "  #{:<4} [{}, {}) {} bytes",
            chunk.index,
            chunk.start,
            chunk.end,
            chunk.len()
        );
    }
    Ok(())
}

#[allow(clippy::too_many_lines)]
#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.to_string().contains("not found") {
            debug!("Error loading .env file: {e}");
        }
    } else {
        debug!("Loaded environment from .env file");
    }

    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("TLS crypto provider already installed");
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::Plan {
            file,
            chunk_size_mb,
        } => plan(&file, chunk_size_mb),
        Commands::Upload {
            files,
            target,
            token,
            api_url,
            config,
            endpoint,
            chunk_size_mb,
            max_size_mb,
            timeout_secs,
            retries,
            fields,
            parallel,
        } => {
            if !(1..=8).contains(&parallel) {
                return Err(anyhow::anyhow!(
                    "Parallel value must be between 1 and 8, got {parallel}"
                ));
            }

            let cli_config = FileConfig {
                api_token: token,
                api_url,
                chunk_size_mb,
                chunk_timeout_secs: timeout_secs,
                max_retries: retries,
            };
            let file_config = FileConfig::load_with_fallback(config.as_ref())?;
            let settings = cli_config.merge_with(&file_config);

            let api_url = settings
                .api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_URL.to_string());
            info!("Using API URL: {api_url}");
            let config = Config::new(settings.api_token.clone(), api_url)?;

            let mut upload_config = UploadConfig::for_target(&config, target)?;
            if let Some(endpoint) = &endpoint {
                upload_config.endpoint = config.endpoint_url(endpoint)?;
            }
            if let Some(mb) = settings.chunk_size_mb {
                upload_config.chunk_size = mib_to_bytes(mb, "Chunk size")?;
            }
            if let Some(mb) = max_size_mb {
                upload_config.max_file_size = mib_to_bytes(mb, "Maximum file size")?;
            }
            if let Some(secs) = settings.chunk_timeout_secs {
                upload_config.chunk_timeout = Duration::from_secs(secs);
            }
            upload_config.retry =
                RetryPolicy::with_retries(settings.max_retries.unwrap_or(DEFAULT_RETRIES));
            upload_config.extra_fields = fields;
            upload_config.validate()?;

            info!(
                "Uploading {} file(s) to {} as {}",
                files.len(),
                upload_config.endpoint,
                target.as_str()
            );

            // One token for the whole batch, so files still queued behind
            // `--parallel` are cancelled too.
            let batch = CancellationToken::new();
            let signal_batch = batch.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                warn!("Interrupted, cancelling uploads (press Ctrl-C again to exit now)...");
                signal_batch.cancel();

                if tokio::signal::ctrl_c().await.is_ok() {
                    error!("Interrupted again, exiting");
                    std::process::exit(130);
                }
            });

            let multi = MultiProgress::new();

            // Each file is its own session; chunks within a file stay sequential.
            let results: Vec<(PathBuf, shelf_upload::Result<UploadOutcome>)> =
                stream::iter(files)
                    .map(|path| {
                        let config = config.clone();
                        let cancel = CancelHandle::child_of(&batch);
                        let options = UploadOptions {
                            upload: upload_config.clone(),
                            progress_bar: Some(multi.add(file_progress_bar(&display_name(&path)))),
                            cancel,
                        };

                        async move {
                            if options.cancel.is_parent_cancelled() {
                                if let Some(pb) = &options.progress_bar {
                                    pb.abandon_with_message("Upload cancelled");
                                }
                                return (path, Ok(UploadOutcome::Cancelled));
                            }
                            let result = upload_file(&config, &path, options).await;
                            (path, result)
                        }
                    })
                    .buffer_unordered(parallel)
                    .collect()
                    .await;

            let mut uploaded = Vec::new();
            let mut cancelled = Vec::new();
            let mut errors = Vec::new();

            for (path, result) in results {
                match result {
                    Ok(UploadOutcome::Completed(upload)) => uploaded.push((path, upload)),
                    Ok(UploadOutcome::Cancelled) => cancelled.push(path),
                    Err(e) => errors.push(format!("{}: {e}", path.display())),
                }
            }

            if !uploaded.is_empty() {
                println!("\n✅ Successfully uploaded {} file(s):", uploaded.len());
                for (path, upload) in &uploaded {
                    println!(
                        "  {} → {} ({})",
                        path.display(),
                        upload.file_url,
                        upload.file_path
                    );
                }
            }

            if !cancelled.is_empty() {
                println!("\n⏹  Cancelled {} upload(s):", cancelled.len());
                for path in &cancelled {
                    println!("  {}", path.display());
                }
            }

            if !errors.is_empty() {
                eprintln!("\n❌ Failed to upload {} file(s):", errors.len());
                for error in &errors {
                    eprintln!("  {error}");
                }
                error!("{} file(s) failed to upload", errors.len());
                std::process::exit(1);
            }

            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("bookSlug=dom-casmurro"),
            Ok(("bookSlug".to_string(), "dom-casmurro".to_string()))
        );
        assert_eq!(
            parse_key_val("note=a=b"),
            Ok(("note".to_string(), "a=b".to_string()))
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_mib_to_bytes() {
        assert_eq!(mib_to_bytes(5, "Chunk size").unwrap(), 5 * MIB);
        assert!(matches!(
            mib_to_bytes(u64::MAX / 2, "Maximum file size"),
            Err(shelf_upload::Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_cli_parses_upload() {
        let cli = Cli::try_parse_from([
            "shelf-upload",
            "upload",
            "novel.pdf",
            "--target",
            "book-pdf",
            "--token",
            "abc",
            "--field",
            "bookSlug=dom-casmurro",
        ])
        .unwrap();

        let Commands::Upload {
            files,
            target,
            token,
            fields,
            parallel,
            ..
        } = cli.command
        else {
            panic!("expected upload command");
        };
        assert_eq!(files, vec![PathBuf::from("novel.pdf")]);
        assert_eq!(target, UploadTarget::BookPdf);
        assert_eq!(token.as_deref(), Some("abc"));
        assert_eq!(fields.len(), 1);
        assert_eq!(parallel, 2);
    }
}
