mod annotate;
mod args;
mod eval;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use serde::Serialize;

use args::CountArgs;
use coinsum_core::{CoinCounter, CoinReading, CountOutput, OnnxBoxProposer, OnnxValueClassifier};
use coinsum_utils::config::AppSettings;
use coinsum_utils::{configure_telemetry, init_logging, load_image, normalize_path};

#[derive(Debug, Serialize)]
struct CoinRecord {
    value: i32,
    region: [f32; 4],
    center: [f64; 2],
    axes: [f64; 2],
    angle_deg: f64,
}

#[derive(Debug, Serialize)]
struct CountRecord {
    image: String,
    total: i64,
    coins: Vec<CoinRecord>,
}

impl From<&CoinReading> for CoinRecord {
    fn from(reading: &CoinReading) -> Self {
        Self {
            value: reading.value,
            region: [
                reading.region.x,
                reading.region.y,
                reading.region.width,
                reading.region.height,
            ],
            center: [reading.ellipse.cx, reading.ellipse.cy],
            axes: [reading.ellipse.major, reading.ellipse.minor],
            angle_deg: reading.ellipse.angle_deg,
        }
    }
}

fn main() -> Result<()> {
    init_logging(log::LevelFilter::Info)?;
    let args = CountArgs::parse();

    let mut settings = load_settings(args.config.as_ref())?;
    apply_cli_overrides(&mut settings, &args);
    configure_telemetry(
        settings.telemetry.enabled || args.telemetry,
        settings.telemetry.level_filter(),
    );

    info!(
        "loading region-proposal model from {}",
        args.detector_model.display()
    );
    let proposer = OnnxBoxProposer::load(&args.detector_model)
        .with_context(|| format!("failed to load detector {}", args.detector_model.display()))?;

    info!(
        "loading value classifier from {}",
        args.classifier_model.display()
    );
    let classifier = OnnxValueClassifier::load(&args.classifier_model).with_context(|| {
        format!("failed to load classifier {}", args.classifier_model.display())
    })?;

    let counter = CoinCounter::from_settings(&settings, Box::new(proposer), Box::new(classifier));

    if let Some(root) = args.eval_dir.as_ref() {
        let root = normalize_path(root)?;
        let report = eval::evaluate(&counter, &root, args.eval_fraction, args.eval_seed)?;
        info!(
            "finished: {} image(s), {} error(s), error rate {:.3}",
            report.total,
            report.errors,
            report.error_rate()
        );
        println!("{:.3}", report.error_rate());
        return Ok(());
    }

    let input = normalize_path(args.input.as_ref().expect("clap enforces input"))?;
    info!("reading image {}", input.display());
    let image = load_image(&input)?;

    info!("counting coins...");
    let output = counter.count(&image)?;

    let mut running = 0i64;
    for reading in &output.readings {
        running += reading.value as i64;
        info!("coin value = {}, running sum = {}", reading.value, running);
    }
    info!("sum = {}", output.total);

    if let Some(json_path) = args.json.as_ref() {
        write_readings_json(json_path, &input, &output)?;
        info!("readings written to {}", json_path.display());
    }

    let annotated = annotate::annotate(&image, &output);
    let out_path = args
        .annotate
        .clone()
        .unwrap_or_else(|| annotated_path(&input));
    annotated
        .save(&out_path)
        .with_context(|| format!("failed to save annotated image {}", out_path.display()))?;
    info!("annotated image saved to {}", out_path.display());

    println!("{}", output.total);
    Ok(())
}

fn load_settings(config_path: Option<&PathBuf>) -> Result<AppSettings> {
    if let Some(path) = config_path {
        let resolved = normalize_path(path)?;
        AppSettings::load_from_path(&resolved)
    } else {
        Ok(AppSettings::default())
    }
}

fn apply_cli_overrides(settings: &mut AppSettings, args: &CountArgs) {
    if let Some(min_neighbors) = args.min_neighbors {
        settings.detector.min_neighbors = min_neighbors;
    }
    if let Some(min_size) = args.min_size {
        settings.detector.min_size = min_size;
    }
    if let Some(fraction) = args.min_area_fraction {
        settings.pruner.min_area_fraction = fraction;
    }
    if let Some(fraction) = args.max_area_fraction {
        settings.pruner.max_area_fraction = fraction;
    }
}

fn write_readings_json(
    json_path: &std::path::Path,
    input: &std::path::Path,
    output: &CountOutput,
) -> Result<()> {
    if let Some(dir) = json_path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }
    }
    let record = CountRecord {
        image: input.display().to_string(),
        total: output.total,
        coins: output.readings.iter().map(CoinRecord::from).collect(),
    };
    let file = std::fs::File::create(json_path)
        .with_context(|| format!("failed to create {}", json_path.display()))?;
    serde_json::to_writer_pretty(file, &record)
        .with_context(|| format!("failed to write readings JSON to {}", json_path.display()))?;
    Ok(())
}

/// Default annotated-output path: `<stem>_annotated.png` next to the input.
fn annotated_path(input: &std::path::Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frame".to_string());
    input.with_file_name(format!("{stem}_annotated.png"))
}
