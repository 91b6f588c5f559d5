//! ocr-translator - translate text captured from the screen
//!
//! Command-line front end: loads a captured region from disk, runs OCR
//! and/or a vision model, and prints the translation.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ocr_translator::capture::CaptureImage;
use ocr_translator::cli::{Args, Commands, ConfigAction};
use ocr_translator::config::{data_dir, ProviderKind, Settings, SettingsStore, TranslationMode};
use ocr_translator::http::ReqwestTransport;
use ocr_translator::session::Session;
use ocr_translator::translate::TranslationResult;
use ocr_translator::workflow::Workflow;

const LOG_FILE_NAME: &str = "ocr_translator.log";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    let store = match &args.config {
        Some(path) => SettingsStore::new(path),
        None => SettingsStore::default_location()?,
    };
    info!("Using settings file {}", store.path().display());

    match args.command {
        Commands::Config { action } => run_config(&store, action),
        command => run_command(&store, command).await,
    }
}

async fn run_command(store: &SettingsStore, command: Commands) -> Result<()> {
    let mut settings = store.load()?;
    settings.apply_env_overrides();

    let transport = Arc::new(ReqwestTransport::new()?);
    let workflow = Arc::new(Workflow::new(transport));
    let mut session = Session::new(workflow.clone());

    match command {
        Commands::Image { input, target, mode, provider, include_original } => {
            if let Some(target) = target {
                settings.language.target_language = target;
            }
            if let Some(mode) = mode {
                settings.translation.mode = mode.parse::<TranslationMode>()?;
            }
            if let Some(provider) = provider {
                settings.api.selected_api = provider.parse::<ProviderKind>()?;
            }
            if include_original {
                settings.translation.include_original_text = true;
            }

            let image = CaptureImage::from_file(&input)
                .await
                .with_context(|| format!("Failed to load capture {}", input.display()))?;
            info!("Loaded capture {} ({}x{})", input.display(), image.width(), image.height());

            let spinner = spinner(&format!("Translating via {}...", settings.api.selected_api))?;
            session.submit_capture(image, settings);
            let result = session.wait().await;
            spinner.finish_and_clear();

            print_result(result)
        }
        Commands::Text { text, target, provider } => {
            if let Some(target) = target {
                settings.language.target_language = target;
            }
            if let Some(provider) = provider {
                settings.api.selected_api = provider.parse::<ProviderKind>()?;
            }

            let spinner = spinner(&format!("Translating via {}...", settings.api.selected_api))?;
            session.submit_text(text, settings);
            let result = session.wait().await;
            spinner.finish_and_clear();

            print_result(result)
        }
        Commands::Ocr { input, lang } => {
            let image = CaptureImage::from_file(&input)
                .await
                .with_context(|| format!("Failed to load capture {}", input.display()))?;
            let language = lang.unwrap_or_else(|| settings.ocr_language());
            workflow.check_ocr_availability(&settings).await?;

            let spinner = spinner("Recognizing text...")?;
            let text = workflow.extract_text(&image, &language, &settings).await;
            spinner.finish_and_clear();

            println!("{}", text?);
            Ok(())
        }
        Commands::Verify { provider } => {
            let provider = match provider {
                Some(p) => p.parse::<ProviderKind>()?,
                None => settings.api.selected_api,
            };

            let spinner = spinner(&format!("Checking {} API key...", provider))?;
            let outcome = workflow.verify_api_key(provider, &settings).await;
            spinner.finish_and_clear();

            outcome?;
            println!("{} API key is valid", provider);
            Ok(())
        }
        Commands::Config { action } => run_config(store, action),
    }
}

fn run_config(store: &SettingsStore, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Path => {
            println!("{}", store.path().display());
        }
        ConfigAction::Show => {
            let settings = store.load()?;
            println!("{}", serde_json::to_string_pretty(&settings.redacted())?);
        }
        ConfigAction::Get { key } => {
            let settings = store.load()?;
            let value = settings.get_value(&key)?;
            if key.ends_with("api_key") {
                println!("{}", if value.is_empty() { "<unset>" } else { "<redacted>" });
            } else {
                println!("{}", value);
            }
        }
        ConfigAction::Set { key, value } => {
            let mut settings: Settings = store.load()?;
            settings.set_value(&key, &value)?;
            store.save(&settings)?;
            println!("Updated {}", key);
        }
    }
    Ok(())
}

fn print_result(result: Option<TranslationResult>) -> Result<()> {
    let result = result.context("No translation result received")?;

    if !result.is_success() {
        let kind = result.error_kind().map(|k| k.to_string()).unwrap_or_default();
        anyhow::bail!("{}: {}", kind, result.error_message().unwrap_or_default());
    }

    if !result.original_text().is_empty() {
        println!("Original:");
        println!("{}", result.original_text());
        println!();
        println!("Translation:");
    }
    println!("{}", result.translated_text());
    Ok(())
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = data_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, LOG_FILE_NAME);
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Console output goes to stderr so stdout carries only results
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - level: {}, file: {}", log_level, log_dir.join(LOG_FILE_NAME).display());
    Ok(())
}
