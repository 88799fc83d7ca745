use ecg_digitizer::config::{load_run_config, RunConfig};
use ecg_digitizer::grid::MultiScaleGridDetector;
use ecg_digitizer::image::io::{load_raster, save_grayscale_f32, save_mask, write_json_file};
use ecg_digitizer::morphology::binarize_auto;
use ecg_digitizer::{Digitization, Digitizer};
use std::env;
use std::path::Path;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let mut args = env::args();
    let program = args.next().unwrap_or_else(|| "digitize".to_string());
    let config_path = args
        .next()
        .ok_or_else(|| format!("Usage: {program} <run.json>"))?;
    let config = load_run_config(Path::new(&config_path)).map_err(|e| e.to_string())?;

    let image = load_raster(&config.input_path).map_err(|e| e.to_string())?;
    let digitizer = Digitizer::new(config.digitizer.clone());
    let outcome = digitizer
        .process(&image, &config.regions)
        .map_err(|e| e.to_string())?;

    println!("{}", outcome.status_line());
    if let Digitization::Completed(result) = &outcome {
        print_summary(result);
    }

    if let Some(path) = &config.output.json_out {
        write_json_file(path, &outcome).map_err(|e| e.to_string())?;
        println!("JSON result written to {}", path.display());
    }

    if let Some(dir) = &config.output.debug_dir {
        save_debug_artifacts(dir, &image, &config)?;
        println!("Debug artifacts written to {}", dir.display());
    }
    Ok(())
}

fn print_summary(result: &ecg_digitizer::DigitizationResult) {
    let m = &result.metadata;
    println!(
        "  calibration: {:.2} x {:.2} px/mm ({:?}), {:.1} px/mV, {:.1} px/s",
        m.calibration.pixels_per_mm_x,
        m.calibration.pixels_per_mm_y,
        m.calibration.source,
        m.calibration.pixels_per_mv,
        m.calibration.pixels_per_second
    );
    println!(
        "  grid: {} horizontal, {} vertical, {} intersections, max order {}",
        m.grid.horizontal_lines, m.grid.vertical_lines, m.grid.intersections, m.grid.max_order
    );
    for attempt in &m.attempts {
        println!(
            "  attempt {:<16} score={:.3} success={}",
            attempt.method.as_str(),
            attempt.score,
            attempt.success
        );
    }
    for lead in &result.leads {
        let snr = m.quality.snr_db.get(&lead.name).copied().unwrap_or(0.0);
        println!(
            "  lead {:<4} {:>5} samples  {:?}  snr={:.1} dB",
            lead.name,
            lead.values.len(),
            lead.status,
            snr
        );
    }
    println!("  total_ms: {:.1}", m.timings.total_ms);
}

fn save_debug_artifacts(
    dir: &Path,
    image: &ecg_digitizer::image::RasterImage,
    config: &RunConfig,
) -> Result<(), String> {
    let luma = image.luma();
    save_grayscale_f32(&luma, &dir.join("luma.png")).map_err(|e| e.to_string())?;
    let mask = binarize_auto(&luma, config.digitizer.finder.binarize_threshold);
    save_mask(&mask, &dir.join("mask.png")).map_err(|e| e.to_string())?;
    let cfg = &config.digitizer;
    let detector = MultiScaleGridDetector::new(
        cfg.multiscale.clone(),
        cfg.finder.clone(),
        cfg.fit.clone(),
        cfg.oscillation.clone(),
    );
    let (fine, bold) = detector.pass_masks(&mask);
    save_mask(&fine, &dir.join("fine_lines.png")).map_err(|e| e.to_string())?;
    save_mask(&bold, &dir.join("bold_lines.png")).map_err(|e| e.to_string())?;
    Ok(())
}
