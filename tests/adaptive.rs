mod common;

use common::synthetic_image::{dot_grid, grid_paper, init_logging, red_grid_paper};
use ecg_digitizer::adaptive::{AdaptiveOptions, AdaptiveProcessor};
use ecg_digitizer::fit::{FitOptions, OscillationOptions};
use ecg_digitizer::grid::{
    DetectionMethod, FftGridReconstructor, FftOptions, MultiScaleGridDetector, MultiScaleOptions,
    TilingOptions,
};
use ecg_digitizer::image::RasterImage;
use ecg_digitizer::lines::LineFinderOptions;
use ecg_digitizer::ProcessingStatus;

fn processor() -> AdaptiveProcessor {
    AdaptiveProcessor::new(
        AdaptiveOptions::default(),
        MultiScaleGridDetector::new(
            MultiScaleOptions::default(),
            LineFinderOptions::default(),
            FitOptions::default(),
            OscillationOptions::default(),
        ),
        FftGridReconstructor::new(FftOptions::default()),
    )
}

#[test]
fn crisp_grid_stops_at_standard_tier() {
    init_logging();
    let img = RasterImage::Gray(grid_paper(400, 300, 0.1, 0.95));
    let out = processor().process(&img);
    assert_eq!(out.attempts.len(), 1);
    assert_eq!(out.method(), DetectionMethod::Standard);
    assert_eq!(out.status, ProcessingStatus::Ok);
    assert!(out.attempts[0].success);
    assert!(out.detection.validation_passed);
    assert_eq!(out.detection.vertical.len(), 50);
    assert_eq!(out.detection.horizontal.len(), 37);
}

#[test]
fn erased_grid_falls_through_to_fft() {
    init_logging();
    let img = RasterImage::Gray(dot_grid(160, 128, 8));
    let out = processor().process(&img);
    let methods: Vec<DetectionMethod> = out.attempts.iter().map(|a| a.method).collect();
    assert_eq!(
        methods,
        vec![
            DetectionMethod::Standard,
            DetectionMethod::ContrastBoosted,
            DetectionMethod::Fft
        ]
    );
    assert_eq!(out.method(), DetectionMethod::Fft);
    assert!(!out.attempts[0].success && !out.attempts[1].success);
    assert_eq!(out.detection.vertical.len(), 20);
    assert_eq!(out.detection.horizontal.len(), 16);
    let json = serde_json::to_value(&out.detection).expect("serialize");
    assert_eq!(json["method"], "fft");
}

#[test]
fn red_grid_is_found_on_color_input() {
    init_logging();
    let img = RasterImage::Rgb(red_grid_paper(400, 300));
    let out = processor().process(&img);
    assert_eq!(out.status, ProcessingStatus::Ok);
    assert!(out.detection.line_count() >= 40);
}

#[test]
fn tiled_detection_recovers_full_grid() {
    init_logging();
    let tiling = TilingOptions {
        multitile: true,
        ..Default::default()
    };
    let p = processor().with_tiling(tiling, 4.0);
    let img = RasterImage::Gray(grid_paper(400, 300, 0.1, 0.95));
    let out = p.process(&img);
    assert_eq!(out.method(), DetectionMethod::Standard);
    assert!(out.detection.vertical.len() >= 50, "{}", out.detection.vertical.len());
    let mut xs: Vec<f64> = out.detection.vertical.iter().map(|l| l.position()).collect();
    xs.dedup_by(|a, b| (*a - *b).abs() < 2.0);
    assert_eq!(xs.len(), 50);
}
