mod common;

use common::synthetic_image::{barrel_line, correlation, draw_sinusoid, init_logging};
use ecg_digitizer::angle::Orientation;
use ecg_digitizer::fit::{FitOptions, OscillationOptions, OscillationValidator, PolynomialLineFitter};
use ecg_digitizer::grid::{Calibration, CalibrationOptions, CalibrationSource};
use ecg_digitizer::image::ImageF32;
use ecg_digitizer::signal::{ExtractionOptions, FilterOptions, SignalExtractor, SignalPostProcessor};
use ecg_digitizer::{LeadRegion, LeadStatus};
use std::f32::consts::PI;

/// 10 px/mm: 100 px/mV and 250 px/s.
fn calibration() -> Calibration {
    Calibration::from_spacing(
        10.0,
        10.0,
        &CalibrationOptions::default(),
        CalibrationSource::Intersections,
    )
}

#[test]
fn sinusoidal_trace_is_recovered() {
    init_logging();
    // 1 s of a 2 Hz, 0.3 mV sine: 250 columns, 125 px period, 30 px amplitude.
    let mut img = ImageF32::filled(300, 160, 0.97);
    draw_sinusoid(&mut img, 25, 275, 79.5, 30.0, 125.0, 0.05);
    let region = LeadRegion::new("V2", 25, 30, 250, 100);

    let extractor = SignalExtractor::new(ExtractionOptions::default());
    let lead = extractor.extract(&img, &region, &calibration());
    assert_eq!(lead.status, LeadStatus::Extracted);
    assert!((lead.duration - 1.0).abs() < 1e-6);
    assert_eq!(lead.values.len(), 500);

    let truth: Vec<f32> = (0..500)
        .map(|i| 0.3 * (2.0 * PI * 2.0 * i as f32 / 500.0).sin())
        .collect();
    let r = correlation(&lead.values, &truth);
    assert!(r > 0.95, "correlation {r}");
    let peak = lead.values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    assert!((peak - 0.3).abs() < 0.03, "peak {peak}");

    let filtered = SignalPostProcessor::new(FilterOptions::default()).process_lead(&lead);
    assert_eq!(filtered.values.len(), lead.values.len());
    let r = correlation(&filtered.values, &truth);
    assert!(r > 0.95, "filtered correlation {r}");
}

#[test]
fn faint_gaps_do_not_jump_to_baseline() {
    let mut img = ImageF32::filled(120, 60, 1.0);
    draw_sinusoid(&mut img, 0, 120, 20.0, 0.0, 100.0, 0.0);
    for x in 50..70 {
        for y in 0..60 {
            img.set(x, y, 1.0);
        }
    }
    let extractor = SignalExtractor::new(ExtractionOptions::default());
    let mv = extractor.column_voltages(&img, 100.0);
    // Trace sits 9.5 px above the centre row.
    for (x, v) in mv.iter().enumerate() {
        assert!((v - 0.095).abs() < 1e-4, "column {x}: {v}");
    }
}

#[test]
fn barrel_distortion_selects_quadratic() {
    init_logging();
    let fitter = PolynomialLineFitter::new(FitOptions::default());
    let points = barrel_line(600, 40.0, 12.0);
    let line = fitter
        .fit_points(Orientation::Horizontal, &points)
        .expect("fit");
    assert_eq!(line.order, 2);

    let r2: Vec<f64> = line.fit_table.iter().map(|f| f.r2).collect();
    assert!(r2[1] > r2[0] + 0.5, "{r2:?}");
    for w in r2[1..].windows(2) {
        assert!((w[1] - w[0]).abs() < 1e-3, "{r2:?}");
    }

    let validator = OscillationValidator::new(OscillationOptions::default());
    let kept = validator.validate(line.clone());
    assert_eq!(kept.order, 2);
    assert!(!kept.demoted);
}

#[test]
fn straight_grid_line_stays_linear() {
    let fitter = PolynomialLineFitter::new(FitOptions::default());
    let points: Vec<[f32; 2]> = (0..400).map(|x| [x as f32, 52.0]).collect();
    let line = fitter
        .fit_points(Orientation::Horizontal, &points)
        .expect("fit");
    assert_eq!(line.order, 1);
    assert!(line.r2 >= 0.9999);
    let validated = OscillationValidator::new(OscillationOptions::default()).validate(line);
    assert_eq!(validated.order, 1);
}
