//! Generate default calibration configuration file
//!
//! Creates a JSON config for the ColorChecker 24 with all default parameters

use chart_calibration::CalibrationConfig;
use std::{env, path::Path, process};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <output_config.json>", args[0]);
        eprintln!();
        eprintln!("Example:");
        eprintln!("  {} batch_correction/config.json", args[0]);
        process::exit(1);
    }

    let output_path = Path::new(&args[1]);

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("Error creating directory: {}", e);
            process::exit(1);
        }
    }

    let config = CalibrationConfig::default_color_checker();

    match config.to_json_file(output_path) {
        Ok(_) => {
            eprintln!("Configuration saved to {}", output_path.display());
            eprintln!();
            eprintln!("Config summary:");
            eprintln!("  Input:  {}", config.input_path.display());
            eprintln!("  Output: {}", config.output_path.display());
            eprintln!("  Chart image: {}", config.calibration.chart_image.display());
            eprintln!(
                "  Mapping: {} in {}",
                config.calibration.method, config.calibration.reference_space
            );
            eprintln!(
                "  Sampling: {}, quality limits ΔE mean {:.1} / max {:.1}",
                config.sampling.statistic, config.quality.max_mean_delta_e, config.quality.max_patch_delta_e
            );
            eprintln!("  Output space: {}", config.batch.output_space);
            eprintln!();
            eprintln!("Edit calibration.roi to the chart corners (top-left, top-right, bottom-right, bottom-left).");
        }
        Err(e) => {
            eprintln!("Error saving config: {}", e);
            process::exit(1);
        }
    }
}
