//! Command line front end driving one [`Workflow`] per invocation.

use crate::config::Settings;
use crate::error::AppError;
use crate::intake::{SelectedFile, StillFrameCamera};
use crate::pipeline::{
    ClassificationService, DisplayConfig, GeminiClassifier, WasteCategory, Workflow,
};
use clap::Parser;
use std::path::PathBuf;
use tracing::{Level, info};

#[derive(Parser, Debug)]
#[command(name = "neurobin")]
#[command(author, version, about = "Classify a photo of a waste item into one of six streams", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (defaults to ./neurobin.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Upload an image file and classify it
    Classify {
        /// Image to classify
        path: PathBuf,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Capture a frame from a camera source and classify it
    Capture {
        /// Still image served as the camera feed
        #[arg(long)]
        frame: PathBuf,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the six waste streams and their disposal methods
    Categories,
}

impl Cli {
    pub fn log_level(&self) -> Level {
        match self.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

fn build_workflow(settings: &Settings) -> Result<Workflow, AppError> {
    let api_key = settings.require_api_key()?;
    let classifier = GeminiClassifier::new(&settings.classifier, api_key)?;
    Ok(Workflow::new(
        settings,
        ClassificationService::new(Box::new(classifier)),
    ))
}

fn render(display: &DisplayConfig, json: bool) -> Result<String, AppError> {
    if json {
        serde_json::to_string_pretty(display).map_err(|e| AppError::Schema(e.to_string()))
    } else {
        Ok(display.to_string())
    }
}

pub fn categories_table() -> String {
    WasteCategory::ALL
        .iter()
        .map(|category| {
            format!(
                "{}. {:<22} {}",
                category.ordinal(),
                category.label(),
                category.disposal_method()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The single line the binary prints to stderr when a command fails.
pub fn error_line(error: &AppError) -> String {
    format!("error: {}", error)
}

pub async fn run(cli: Cli) -> Result<(), AppError> {
    match cli.command {
        Commands::Categories => {
            println!("{}", categories_table());
        }
        Commands::Classify { path, json } => {
            let settings = Settings::load(cli.config.as_deref())?;
            let mut workflow = build_workflow(&settings)?;
            let file = SelectedFile::from_path(&path).await?;
            workflow.select_file(file).await?;
            info!("Analyzing with AI...");
            let display = workflow.analyze().await?;
            println!("{}", render(&display, json)?);
        }
        Commands::Capture { frame, json } => {
            let settings = Settings::load(cli.config.as_deref())?;
            let mut workflow = build_workflow(&settings)?;
            let camera = StillFrameCamera::new(frame);
            workflow.start_camera(&camera).await?;
            workflow.capture().await?;
            info!("Analyzing with AI...");
            let display = workflow.analyze().await?;
            println!("{}", render(&display, json)?);
        }
    }
    Ok(())
}
