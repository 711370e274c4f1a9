// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Inspektor: image quality inspection from the command line.
//
// Entry point. Initialises logging, builds the analyzer from an optional JSON
// engine config, analyses each image, and prints one JSON report per file.

mod report;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use inspektor_analysis::ImageAnalyzer;
use inspektor_core::EngineConfig;
use inspektor_core::error::Result;

use report::{Mode, analyze_file, to_json};

#[derive(Debug, Parser)]
#[command(name = "inspektor", version, about = "Image quality inspection engine")]
struct Cli {
    /// Engine configuration (JSON); defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyze one or more image files.
    Analyze {
        /// Image file(s) to analyze.
        #[arg(long = "image", required = true)]
        images: Vec<PathBuf>,

        #[arg(long, value_enum, default_value_t = Mode::Basic)]
        mode: Mode,

        /// Text the image is expected to contain; implies OCR mode.
        #[arg(long)]
        expected_text: Option<String>,

        /// Run every stage on the calling thread.
        #[arg(long)]
        no_worker_pool: bool,

        /// Directory holding the OCR models.
        #[cfg(feature = "ocr")]
        #[arg(long)]
        model_dir: Option<PathBuf>,

        #[arg(long)]
        pretty: bool,
    },
    /// Print the effective engine configuration.
    Config,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "inspektor failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Command::Config => {
            println!("{}", to_json(&config, true)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Analyze {
            images,
            mode,
            expected_text,
            no_worker_pool,
            #[cfg(feature = "ocr")]
            model_dir,
            pretty,
        } => {
            let mut options = mode.options().with_worker_pool(!no_worker_pool);
            if let Some(text) = expected_text {
                options = options.with_ocr(text);
            }

            let analyzer = ImageAnalyzer::new(config)?;
            #[cfg(feature = "ocr")]
            let analyzer = if options.ocr_mode {
                let extractor = match model_dir {
                    Some(dir) => inspektor_analysis::OcrsTextExtractor::from_model_dir(dir),
                    None => inspektor_analysis::OcrsTextExtractor::new(Default::default()),
                };
                // Without models, each report carries the failure in `ocr_error`.
                match extractor {
                    Ok(extractor) => analyzer.with_text_extractor(std::sync::Arc::new(extractor)),
                    Err(err) => {
                        tracing::warn!(error = %err, "OCR unavailable; continuing without text extraction");
                        analyzer.with_text_extractor(std::sync::Arc::new(report::Unavailable::new(err)))
                    }
                }
            } else {
                analyzer
            };

            // Keep going past bad files; the exit code reports them.
            let mut failures = 0usize;
            for path in &images {
                match analyze_file(&analyzer, path, &options) {
                    Ok(report) => println!("{}", to_json(&report, pretty)?),
                    Err(err) => {
                        failures += 1;
                        error!(path = %path.display(), error = %err, "Analysis failed");
                    }
                }
            }

            let stats = analyzer.performance_stats();
            info!(
                analyses = stats.analyses,
                average_sec = stats.average_processing_time_sec,
                failures,
                "Done"
            );
            analyzer.close();

            Ok(if failures == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}
