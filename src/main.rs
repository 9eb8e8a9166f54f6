use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use dumpy_pipeline::Pipeline;
use dumpy_pipeline::config::PipelineConfig;
use dumpy_pipeline::models::{SlideshowRequest, UploadOptions};
use dumpy_pipeline::services::face_tagging::FaceTagger;
use dumpy_pipeline::services::upload_orchestrator::select_tagged_users;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Dumpy photo upload and face-tagging pipeline", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload photos to an event and tag the people in them
    Upload {
        #[arg(long)]
        event: i64,

        /// Uploading user's id
        #[arg(long)]
        user: i64,

        #[arg(long)]
        location: Option<String>,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Identify faces in a photo without uploading it
    Identify { file: PathBuf },
    /// Enroll reference photos for a user
    Enroll {
        #[arg(long)]
        user: i64,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Generate an event slideshow and wait for it
    Slideshow {
        #[arg(long)]
        event: String,

        #[arg(long)]
        theme: String,

        #[arg(long)]
        music: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment & Logging
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dumpy_pipeline=info,dumpy=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // 2. Configuration + clients
    let config = PipelineConfig::from_env();
    info!(
        "🛡️  Pipeline Config: Threshold={}, TopK={}, EXIF={}, Probe={}",
        config.face.threshold,
        config.face.top_k_per_face,
        config.extract_exif,
        config.probe_before_upload
    );
    let pipeline = Pipeline::from_config(config).await?;

    // 3. Command
    match args.command {
        Command::Upload {
            event,
            user,
            location,
            files,
        } => {
            let mut options = UploadOptions::new(event, user);
            options.location = location;

            if let [file] = files.as_slice() {
                let result = pipeline.orchestrator.upload_photo(file, options).await?;
                print_json(&result)?;
            } else {
                let report = pipeline
                    .orchestrator
                    .upload_batch_report(&files, options)
                    .await;
                let failed: Vec<_> = report
                    .failed
                    .iter()
                    .map(|(path, reason)| json!({ "path": path, "error": reason }))
                    .collect();
                print_json(&json!({ "uploaded": report.uploaded, "failed": failed }))?;

                if report.uploaded.is_empty() {
                    anyhow::bail!("all {} uploads failed", files.len());
                }
            }
        }
        Command::Identify { file } => {
            let options = pipeline.config.face.clone();
            let faces = pipeline.tagger.identify(&file, &options).await?;
            let tagged_users = select_tagged_users(&faces, options.threshold);
            print_json(&json!({ "faces": faces, "tagged_users": tagged_users }))?;
        }
        Command::Enroll { user, files } => {
            let client = pipeline.enrollment()?;
            let payload = if let [file] = files.as_slice() {
                client.enroll(user, file).await?
            } else {
                client.enroll_batch(user, &files).await?
            };
            print_json(&payload)?;
        }
        Command::Slideshow {
            event,
            theme,
            music,
        } => {
            let client = pipeline.slideshow()?;
            let job = client
                .generate(&SlideshowRequest {
                    event_id: event,
                    theme_prompt: theme,
                    music_choice: music,
                })
                .await?;

            let Some(job_id) = job.job_id.clone() else {
                print_json(&job)?;
                return Ok(());
            };

            let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
            tokio::spawn(async move {
                shutdown_signal().await;
                let _ = shutdown_tx.send(true);
            });

            let status = client
                .watch(&job_id, pipeline.config.slideshow_poll_interval, shutdown_rx)
                .await?;
            print_json(&status)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, cancelling...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, cancelling...");
        },
    }
}
