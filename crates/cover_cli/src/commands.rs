use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use cover_core::client::{download_path, fetch_artifact, HttpTransport};
use cover_core::config::{ConfigManager, ConfigSection, Settings};
use cover_core::logging::{SessionLogConfig, SessionLogger};
use cover_core::pipeline::ProgressCallback;
use cover_core::poller::PollUpdate;
use cover_core::status::{JobStatus, MediaLocator};
use cover_core::workflows::CoverStudio;
use tokio_util::sync::CancellationToken;

use crate::presenter::show_tracks;
use crate::Command;

pub async fn run(
    command: Command,
    config: &mut ConfigManager,
    cancel: CancellationToken,
) -> Result<()> {
    if let Command::Configure {
        user_id,
        artist,
        base_url,
    } = command
    {
        return configure(config, user_id, artist, base_url);
    }

    let settings = config.settings().clone();
    let studio = CoverStudio::from_settings(&settings).context("Failed to set up backend client")?;

    match command {
        Command::Configure { .. } => Ok(()),
        Command::Search { query } => {
            let locator = studio.search().search(&query.join(" ")).await?;
            show_tracks([("song", &locator)]);
            Ok(())
        }
        Command::Separate { file, wait } => {
            let separation = studio.separation();
            let job = separation
                .submit_path(&file)
                .await
                .with_context(|| format!("Failed to upload {}", file.display()))?;
            println!("Uploaded {}: {}", job.filename, job.ack.body.trim());
            if !wait {
                return Ok(());
            }
            let status = separation.wait(&job.filename, &cancel, print_update).await?;
            report_status(&status)
        }
        Command::Train { files } => {
            let ack = studio.training().submit_paths(&files).await?;
            println!("Training started: {}", ack.body.trim());
            Ok(())
        }
        Command::TrainStatus { wait } => {
            let training = studio.training();
            let status = if wait {
                training.wait(&cancel, print_update).await?
            } else {
                training.check_status().await?
            };
            report_status(&status)
        }
        Command::ConvertUpload { file } => {
            let upload = studio
                .conversion()
                .upload_path(&file)
                .await
                .with_context(|| format!("Failed to upload {}", file.display()))?;
            println!("Inference: {}", upload.inference_ack.body.trim());
            println!("Separation: {}", upload.separation_ack.body.trim());
            println!("Run `cover-studio convert {}` once both are done", upload.filename);
            Ok(())
        }
        Command::Convert {
            filename,
            wait,
            download,
        } => convert(&studio, &settings, config, &filename, wait, download, cancel).await,
        Command::Fetch { locator, output } => {
            let dir = output.unwrap_or_else(|| config.download_folder());
            fetch(&settings, &MediaLocator::new(locator), &dir).await?;
            Ok(())
        }
    }
}

fn configure(
    config: &mut ConfigManager,
    user_id: Option<String>,
    artist: Option<String>,
    base_url: Option<String>,
) -> Result<()> {
    if user_id.is_none() && artist.is_none() && base_url.is_none() {
        let settings = config.settings();
        println!("Config:   {}", config.path().display());
        println!("Backend:  {}", settings.backend.base_url);
        println!("User id:  {}", settings.identity.user_id);
        println!("Artist:   {}", settings.identity.artist);
        return Ok(());
    }

    if user_id.is_some() || artist.is_some() {
        let identity = &mut config.settings_mut().identity;
        if let Some(user_id) = user_id {
            identity.user_id = user_id;
        }
        if let Some(artist) = artist {
            identity.artist = artist;
        }
        config
            .update_section(ConfigSection::Identity)
            .context("Failed to save identity")?;
    }
    if let Some(base_url) = base_url {
        config.settings_mut().backend.base_url = base_url;
        config
            .update_section(ConfigSection::Backend)
            .context("Failed to save backend settings")?;
    }
    println!("Saved {}", config.path().display());
    Ok(())
}

async fn convert(
    studio: &CoverStudio,
    settings: &Settings,
    config: &ConfigManager,
    filename: &str,
    wait: bool,
    download: bool,
    cancel: CancellationToken,
) -> Result<()> {
    let logger = SessionLogger::new(
        format!("convert {}", filename),
        SessionLogConfig::from_settings(&settings.logging),
        None,
    );
    let progress: ProgressCallback = Box::new(|step, percent, message| {
        eprintln!("[{:>3}%] {}: {}", percent, step, message);
    });

    let artifacts = match studio
        .conversion()
        .with_logger(logger.clone())
        .run(filename, wait, cancel, Some(progress))
        .await
    {
        Ok(artifacts) => artifacts,
        Err(e) => {
            logger.show_tail("convert");
            return Err(e.into());
        }
    };

    let tracks = [
        ("vocal", &artifacts.vocal),
        ("instrumental", &artifacts.instrumental),
        ("combined", &artifacts.combined),
    ];
    show_tracks(tracks);

    if download {
        let dir = config.download_folder();
        for (_, locator) in tracks {
            fetch(settings, locator, &dir).await?;
        }
    }
    Ok(())
}

async fn fetch(settings: &Settings, locator: &MediaLocator, dir: &Path) -> Result<PathBuf> {
    if !locator.is_remote() {
        bail!("Not a downloadable URL: {}", locator);
    }
    let transport = HttpTransport::from_settings(&settings.backend)?;
    let dest = download_path(dir, locator, "track.wav");

    let bytes = fetch_artifact(transport.http_client(), locator, &dest, |percent| {
        eprint!("\rDownloading {}: {:>3}%", locator, percent);
    })
    .await
    .with_context(|| format!("Failed to download {}", locator))?;
    eprintln!();

    println!("Saved {} ({} bytes)", dest.display(), bytes);
    Ok(dest)
}

fn print_update(update: PollUpdate) {
    match update {
        PollUpdate::Status(status) => eprintln!("Status: {}", status),
        PollUpdate::TransportError { error, consecutive } => {
            eprintln!("Status check failed ({} in a row): {}", consecutive, error)
        }
    }
}

fn report_status(status: &JobStatus) -> Result<()> {
    match status {
        JobStatus::Completed { artifacts } if !artifacts.is_empty() => {
            show_tracks(artifacts.iter());
            Ok(())
        }
        JobStatus::Failed { reason } => bail!("Job failed: {}", reason),
        other => {
            println!("Status: {}", other);
            Ok(())
        }
    }
}
