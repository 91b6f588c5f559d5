use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Settings file path (JSON, or TOML by extension)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate the text in a captured screen region
    Image {
        /// Captured image (PNG, JPEG or BMP)
        #[arg(short, long)]
        input: PathBuf,

        /// Target language code, e.g. ja or en
        #[arg(short, long)]
        target: Option<String>,

        /// Translation mode (combined, two-step)
        #[arg(short, long)]
        mode: Option<String>,

        /// Provider to use for this request (openai, gemini)
        #[arg(short, long)]
        provider: Option<String>,

        /// Also return the recognized source text in combined mode
        #[arg(long)]
        include_original: bool,
    },

    /// Translate plain text
    Text {
        /// Text to translate
        #[arg(long)]
        text: String,

        /// Target language code
        #[arg(short, long)]
        target: Option<String>,

        /// Provider to use for this request (openai, gemini)
        #[arg(short, long)]
        provider: Option<String>,
    },

    /// Run OCR only and print the recognized text
    Ocr {
        /// Captured image
        #[arg(short, long)]
        input: PathBuf,

        /// Tesseract language codes, e.g. jpn+eng
        #[arg(short, long)]
        lang: Option<String>,
    },

    /// Check the API key of a provider
    Verify {
        /// Provider to check; defaults to the selected one
        #[arg(short, long)]
        provider: Option<String>,
    },

    /// Show or edit settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the current settings with keys masked
    Show,

    /// Print the settings file location
    Path,

    /// Print one setting, e.g. api.selected_api
    Get {
        key: String,
    },

    /// Change one setting and save
    Set {
        key: String,
        value: String,
    },
}
