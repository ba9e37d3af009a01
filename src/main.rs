//! hls-mirror - CLI entry point.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use hls_mirror::{
    cli::Args,
    config::{validate_config, Config},
    download::{Mirror, MirrorOptions},
    error::{exit_codes, Error, Result},
    output::{
        create_mirror_bar, create_spinner, print_banner, print_config_summary, print_error,
        print_info, print_renditions, print_run_summary, print_success, print_warning,
        set_fraction,
    },
    playlist::RenditionSelector,
    transport::HttpTransport,
};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(e) => {
            print_error(&format!("{}", e));
            match e {
                Error::Config(_)
                | Error::ConfigValidation { .. }
                | Error::MissingConfig(_)
                | Error::TomlParse(_)
                | Error::InvalidUri(_)
                | Error::UrlParse(_) => ExitCode::from(exit_codes::CONFIG_ERROR as u8),
                Error::Transport(_) | Error::Http(_) => {
                    ExitCode::from(exit_codes::TRANSPORT_ERROR as u8)
                }
                Error::RunFailure(_)
                | Error::Playlist(_)
                | Error::Folder { .. }
                | Error::Join(_)
                | Error::Decrypt(_) => ExitCode::from(exit_codes::DOWNLOAD_ERROR as u8),
                _ => ExitCode::from(exit_codes::UNEXPECTED_ERROR as u8),
            }
        }
    }
}

async fn run() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    fmt().with_env_filter(filter).with_target(false).init();

    let list_only = args.list;
    let json = args.json;
    let quiet = args.quiet;

    if !list_only {
        print_banner();
    }

    // Load configuration
    let config_path = args.config.clone();
    let mut config = if config_path.exists() {
        Config::load(&config_path)?
    } else {
        tracing::debug!("No configuration file at {}", config_path.display());
        Config::default()
    };

    // Merge CLI arguments into config
    args.merge_into_config(&mut config);

    // Validate configuration
    validate_config(&config)?;

    let transport = Arc::new(HttpTransport::new(&config.http)?);
    let options = MirrorOptions::from_config(&config);

    let spinner = (!list_only && !quiet).then(|| create_spinner("Fetching playlist..."));
    let connected = Mirror::connect(&config.source.url, options, transport).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let mut mirror = connected?;

    if list_only {
        return print_renditions(&mirror.available_renditions(), json);
    }

    let selection = match config.selection.renditions.is_empty() {
        true => config.selection.mode.to_string(),
        false => format!("{} ({})", config.selection.mode, config.selection.renditions.join(", ")),
    };
    print_config_summary(
        &config.source.url,
        &selection,
        &config.output_directory().display().to_string(),
        config.processing.live_minutes,
    );

    mirror.set_selector(RenditionSelector::from_config(&config.selection));

    let bar = (!quiet).then(|| create_mirror_bar("Mirroring"));
    if let Some(bar) = &bar {
        let bar = bar.clone();
        mirror.on_progress(move |value| set_fraction(&bar, value));
    }

    let outcome = match config.processing.live_minutes {
        Some(minutes) => {
            print_info(&format!("Recording live stream for {} min", minutes));
            mirror
                .download_live(Duration::from_secs_f64(minutes.max(0.0) * 60.0))
                .await
        }
        None => mirror.download().await,
    };

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    outcome?;

    let summary = mirror.summary();
    print_run_summary(&summary);

    if summary.is_complete() {
        print_success(&format!("Mirrored to {}", summary.save_file.display()));
    } else {
        print_warning(&format!(
            "{} segment(s) kept their remote location",
            summary.segments_total - summary.segments_ready
        ));
    }

    Ok(())
}
