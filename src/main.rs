use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

use figdup::services::classifier::FixedClassifier;
use figdup::services::ocr::{NullOcr, OcrEngine, TesseractOcr};
use figdup::{Analyzer, AnalyzerConfig, RecordStore};

#[derive(Parser, Debug)]
#[command(name = "figdup", version, about = "CLI for detecting plagiarized charts and figures")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fingerprint an image and add it to the corpus
    Add {
        /// Image to ingest
        image: PathBuf,

        /// Fingerprint database
        #[arg(long, value_name = "FILE", default_value = "figdup.sqlite")]
        db: PathBuf,

        #[command(flatten)]
        caps: CapabilityOpts,
    },

    /// Check an image against the corpus without storing it
    Check {
        /// Image to check
        image: PathBuf,

        /// Fingerprint database
        #[arg(long, value_name = "FILE", default_value = "figdup.sqlite")]
        db: PathBuf,

        /// Suppress findings scoring below this
        #[arg(long, default_value_t = 0.01)]
        min_score: f64,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        caps: CapabilityOpts,
    },

    /// Ingest every image under a directory
    Scan {
        /// Directory to scan
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,

        /// Fingerprint database
        #[arg(long, value_name = "FILE", default_value = "figdup.sqlite")]
        db: PathBuf,

        #[command(flatten)]
        caps: CapabilityOpts,
    },
}

#[derive(Args, Debug)]
struct CapabilityOpts {
    /// Treat every sub-image as a bar chart (enables structural hashing)
    #[arg(long)]
    treat_as_bar: bool,

    /// Treat every sub-image as a pure image (disables text fingerprinting)
    #[arg(long)]
    treat_as_pure: bool,

    /// OCR backend for text fingerprints
    #[arg(long, value_enum, default_value_t = OcrBackend::None)]
    ocr: OcrBackend,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OcrBackend {
    /// Shell out to the system `tesseract` binary
    Tesseract,
    /// No OCR; text fingerprints come out empty
    None,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Add { image, db, caps } => {
            let store = RecordStore::open(&db)
                .with_context(|| format!("Failed to open database {:?}", db))?;
            let analyzer = build_analyzer(&caps, 0.01);

            println!("▶ Ingesting: {}", image.display());
            let report = analyzer
                .ingest(&image, &store)
                .with_context(|| format!("Failed to ingest {:?}", image))?;
            println!(
                "✅ {}: {} record(s) added, {} duplicate(s) skipped",
                report.parent, report.inserted, report.duplicates
            );
        }

        Commands::Check { image, db, min_score, json, caps } => {
            let store = RecordStore::open(&db)
                .with_context(|| format!("Failed to open database {:?}", db))?;
            if store.is_empty() {
                println!("⚠️  The corpus is empty; nothing to compare against.");
                return Ok(());
            }
            let analyzer = build_analyzer(&caps, min_score);

            println!("▶ Checking: {}", image.display());
            let report = analyzer
                .check(&image, &store)
                .with_context(|| format!("Failed to check {:?}", image))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }

            if report.findings.is_empty() {
                println!("✅ No suspicious matches among {} record(s).", store.len());
            } else {
                println!("⚠️  Found {} suspicious finding(s):", report.findings.len());
                for finding in &report.findings {
                    println!(" {} ({:?}):", finding.record_id, finding.modality);
                    for m in &finding.matches {
                        println!("   ▶ {} (from {}) score {:.3}", m.id, m.parent, m.score);
                    }
                }
            }
        }

        Commands::Scan { path, db, caps } => {
            let store = RecordStore::open(&db)
                .with_context(|| format!("Failed to open database {:?}", db))?;
            let analyzer = build_analyzer(&caps, 0.01);

            println!("▶ Scanning for images in: {}", path.display());
            let images = scan_directory(&path)?;
            if images.is_empty() {
                println!("No images found.");
                return Ok(());
            }

            let bar = ProgressBar::new(images.len() as u64);
            bar.set_style(ProgressStyle::with_template(
                "{bar:40.green} {pos}/{len} {msg}",
            )?);
            let mut inserted = 0;
            let mut duplicates = 0;
            let mut failed = 0;
            for image in &images {
                bar.set_message(image.display().to_string());
                match analyzer.ingest(image, &store) {
                    Ok(report) => {
                        inserted += report.inserted;
                        duplicates += report.duplicates;
                    }
                    Err(err) => {
                        failed += 1;
                        bar.println(format!("⚠️  Skipping {}: {}", image.display(), err));
                    }
                }
                bar.inc(1);
            }
            bar.finish_and_clear();
            println!(
                "✅ Ingested {} image(s): {} record(s) added, {} duplicate(s), {} failed",
                images.len(),
                inserted,
                duplicates,
                failed
            );
        }
    }

    Ok(())
}

fn build_analyzer(caps: &CapabilityOpts, min_score: f64) -> Analyzer {
    let config = AnalyzerConfig { min_score, ..AnalyzerConfig::default() };
    let bar = FixedClassifier::binary("bar", "no_bar", caps.treat_as_bar, 1.0);
    let pure = FixedClassifier::binary("pure", "no_pure", caps.treat_as_pure, 1.0);
    let ocr: Box<dyn OcrEngine> = match caps.ocr {
        OcrBackend::Tesseract => Box::new(TesseractOcr::new()),
        OcrBackend::None => Box::new(NullOcr),
    };
    Analyzer::new(config, Box::new(bar), Box::new(pure), ocr)
}

/// Recursively walk `dir`, returning a Vec of image file paths.
fn scan_directory(dir: &Path) -> Result<Vec<PathBuf>> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    spinner.set_message("Scanning for images…");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let allowed_exts = ["jpg", "jpeg", "png", "gif", "bmp", "tiff"];
    let mut images = Vec::new();
    for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
        let path = entry.path();
        if path.is_file() {
            if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
                if allowed_exts.contains(&ext.to_lowercase().as_str()) {
                    images.push(path.to_path_buf());
                }
            }
        }
        spinner.tick();
    }
    spinner.finish_with_message("Scan complete");
    Ok(images)
}
