//! Batch color correction with JSON configuration
//!
//! Builds a correction recipe from the chart image named in the
//! configuration (or loads a saved one) and corrects every input image.

use chart_calibration::image_loader::{find_image_files, load_image, output_path_for, save_image};
use chart_calibration::{calibrate, BatchApplicator, CalibrationConfig, ChartCatalog, CorrectionRecipe, Roi};
use std::{env, path::Path, process};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_help(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let config_path = Path::new(&args[1]);

    if !config_path.exists() {
        eprintln!("Error: Config file '{}' does not exist", config_path.display());
        process::exit(1);
    }

    // Load configuration
    let config = match CalibrationConfig::from_json_file(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config file: {}", e);
            process::exit(1);
        }
    };

    eprintln!("Loaded configuration from {}", config_path.display());
    eprintln!("Input path: {}", config.input_path.display());
    eprintln!("Output path: {}", config.output_path.display());
    eprintln!();

    let recipe = match obtain_recipe(&config) {
        Ok(recipe) => recipe,
        Err(e) => {
            eprintln!("Error creating calibration recipe: {}", e.user_message());
            eprintln!("  {}", e);
            process::exit(1);
        }
    };

    let image_files = match find_image_files(&config.input_path, &config.batch.extensions) {
        Ok(files) => files,
        Err(e) => {
            eprintln!("Error finding image files: {}", e);
            process::exit(1);
        }
    };

    if image_files.is_empty() {
        eprintln!("No image files found in {}", config.input_path.display());
        process::exit(1);
    }

    eprintln!("Found {} image files to correct", image_files.len());
    eprintln!();

    let applicator = match BatchApplicator::new(recipe).with_output_space(config.batch.output_space) {
        Ok(applicator) => applicator,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let output_dir = config.output_path.clone();
    let report = applicator.run(&image_files, load_image, |source, image| {
        save_image(image, &output_path_for(source, &output_dir))
    });

    eprintln!();
    eprintln!("Batch correction complete:");
    eprintln!("  Success: {}", report.succeeded.len());
    eprintln!("  Errors: {}", report.failures.len());
    for failure in &report.failures {
        eprintln!("    ✗ {} [{}] {}", failure.source.display(), failure.stage, failure.error);
    }
    eprintln!("  Corrected images saved to: {}", config.output_path.display());

    if !report.is_success() {
        process::exit(1);
    }
}

/// Load the saved recipe or calibrate from the chart image
fn obtain_recipe(config: &CalibrationConfig) -> chart_calibration::Result<CorrectionRecipe> {
    if let (true, Some(path)) = (config.batch.reuse_recipe, &config.batch.recipe_path) {
        eprintln!("Using saved recipe {}", path.display());
        return CorrectionRecipe::from_json_file(path);
    }

    let chart = config.chart.resolve(&ChartCatalog::default())?;
    let chart_image = load_image(&config.calibration.chart_image)?;
    let roi: &Roi = &config.calibration.roi;

    eprintln!(
        "Calibrating '{}' with {} in {}",
        chart.name(),
        config.calibration.method,
        config.calibration.reference_space
    );
    let outcome = calibrate(
        &chart_image,
        roi,
        &chart,
        config.calibration.reference_space,
        config.calibration.method,
        &config.calibration_options()?,
    )?;

    let diagnostics = &outcome.diagnostics;
    eprintln!(
        "  ΔE mean {:.2}, median {:.2}, max {:.2}",
        diagnostics.mean_delta_e, diagnostics.median_delta_e, diagnostics.max_delta_e
    );
    if let Some(warning) = &outcome.warning {
        eprintln!("  Warning: {}", warning);
    }

    if let Some(path) = &config.batch.recipe_path {
        outcome.recipe.to_json_file(path)?;
        eprintln!("  Recipe saved to {}", path.display());
    }
    Ok(outcome.recipe)
}

fn print_help(program_name: &str) {
    eprintln!("Usage: {} <config.json>", program_name);
    eprintln!();
    eprintln!("Color-correct a batch of images from one shot of a reference chart.");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  config.json    JSON file containing calibration configuration");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  RUST_LOG=debug Print per-stage details");
    eprintln!();
    eprintln!("Generate a starting configuration with generate_config.");
}
