use std::cell::Cell;

use anyhow::Result;
use image::{DynamicImage, GrayImage};

use coinsum_core::{
    BoxProposer, CoinCounter, FEATURE_LEN, Region, ValueClassifier,
};
use coinsum_utils::config::AppSettings;
use coinsum_utils::fixtures::{disk, embossed_coin};

/// Backend that returns a fixed set of proposals after checking it was handed
/// the resized frame.
#[derive(Debug)]
struct FixedProposer {
    expect_dims: (u32, u32),
    regions: Vec<Region>,
}

impl BoxProposer for FixedProposer {
    fn propose(
        &self,
        image: &GrayImage,
        _: &coinsum_utils::config::DetectorSettings,
    ) -> Result<Vec<Region>> {
        assert_eq!(image.dimensions(), self.expect_dims);
        Ok(self.regions.clone())
    }
}

/// Classifier that replays a fixed value sequence, validating every vector.
#[derive(Debug)]
struct SequenceClassifier {
    values: Vec<i32>,
    cursor: Cell<usize>,
}

impl SequenceClassifier {
    fn new(values: Vec<i32>) -> Self {
        Self { values, cursor: Cell::new(0) }
    }
}

impl ValueClassifier for SequenceClassifier {
    fn predict(&self, features: &[f32]) -> Result<i32> {
        assert_eq!(features.len(), FEATURE_LEN);
        assert!(features.iter().all(|v| v.is_finite()));
        let index = self.cursor.get();
        self.cursor.set(index + 1);
        Ok(self.values[index % self.values.len()])
    }
}

#[derive(Debug)]
struct ConstantClassifier(i32);

impl ValueClassifier for ConstantClassifier {
    fn predict(&self, features: &[f32]) -> Result<i32> {
        assert_eq!(features.len(), FEATURE_LEN);
        Ok(self.0)
    }
}

/// A 640x480 frame holding two well-separated synthetic coins.
///
/// The frame matches the detector's reference dimensions so backend
/// coordinates equal full-resolution coordinates.
fn two_coin_frame() -> DynamicImage {
    let mut frame = GrayImage::from_pixel(640, 480, image::Luma([40]));
    let plain = disk(640, 480, 160.0, 240.0, 60.0, 40, 210);
    let embossed = embossed_coin(640, 480, 480.0, 240.0, 60.0, 4);
    for (x, y, px) in frame.enumerate_pixels_mut() {
        let dx_a = x as f64 - 160.0;
        let dy = y as f64 - 240.0;
        let dx_b = x as f64 - 480.0;
        if dx_a * dx_a + dy * dy <= 60.0 * 60.0 {
            *px = *plain.get_pixel(x, y);
        } else if dx_b * dx_b + dy * dy <= 60.0 * 60.0 {
            *px = *embossed.get_pixel(x, y);
        }
    }
    DynamicImage::ImageLuma8(frame)
}

fn coin_regions() -> Vec<Region> {
    vec![
        Region { x: 90.0, y: 170.0, width: 140.0, height: 140.0 },
        Region { x: 410.0, y: 170.0, width: 140.0, height: 140.0 },
    ]
}

fn counter_with(classifier: Box<dyn ValueClassifier>, regions: Vec<Region>) -> CoinCounter {
    let settings = AppSettings::default();
    let proposer = FixedProposer { expect_dims: (640, 480), regions };
    CoinCounter::from_settings(&settings, Box::new(proposer), classifier)
}

#[test]
fn two_coins_sum_to_their_denominations() {
    let frame = two_coin_frame();
    let counter = counter_with(Box::new(SequenceClassifier::new(vec![1, 2])), coin_regions());

    let output = counter.count(&frame).expect("count");
    assert_eq!(output.regions.len(), 2);
    assert_eq!(output.readings.len(), 2, "each region yields one coin");
    assert_eq!(output.total, 3);
    assert_eq!(output.readings[0].value, 1);
    assert_eq!(output.readings[1].value, 2);
}

#[test]
fn counting_is_deterministic() {
    let frame = two_coin_frame();
    let counter = counter_with(Box::new(ConstantClassifier(5)), coin_regions());

    let first = counter.count(&frame).expect("first count");
    let second = counter.count(&frame).expect("second count");

    assert_eq!(first.total, second.total);
    assert_eq!(first.readings.len(), second.readings.len());
    assert_eq!(first.regions.len(), second.regions.len());
    for (a, b) in first.readings.iter().zip(second.readings.iter()) {
        assert_eq!(a.value, b.value);
        assert_eq!(a.ellipse, b.ellipse);
    }
}

#[test]
fn featureless_regions_contribute_nothing() {
    let frame = two_coin_frame();
    let mut regions = coin_regions();
    // A patch of flat background: no boundary contour, no reading.
    regions.push(Region { x: 250.0, y: 20.0, width: 120.0, height: 120.0 });

    let counter = counter_with(Box::new(ConstantClassifier(1)), regions);
    let output = counter.count(&frame).expect("count");

    assert_eq!(output.regions.len(), 3);
    assert_eq!(output.readings.len(), 2);
    assert_eq!(output.total, 2);
}

#[test]
fn fitted_ellipses_sit_on_the_coin_boundary() {
    let frame = two_coin_frame();
    let counter = counter_with(Box::new(ConstantClassifier(1)), coin_regions());

    let output = counter.count(&frame).expect("count");
    for reading in &output.readings {
        // Patch coordinates: the coin is centered at (70, 70) with radius 60.
        assert!((reading.ellipse.cx - 70.0).abs() < 8.0, "cx = {}", reading.ellipse.cx);
        assert!((reading.ellipse.cy - 70.0).abs() < 8.0, "cy = {}", reading.ellipse.cy);
        assert!(
            reading.ellipse.major >= 115.0 && reading.ellipse.major <= 155.0,
            "major = {}",
            reading.ellipse.major
        );
    }
}
