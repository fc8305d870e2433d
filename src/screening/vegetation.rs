use image::RgbImage;
use imageproc::stats::histogram;

use crate::config::{RATIO_EPSILON, VegetationPolicy};
use crate::models::VegetationReport;

/// Mean R, G, B intensity over all pixels (0-255 scale)
pub fn channel_means(img: &RgbImage) -> [f32; 3] {
    let total = img.width() as f64 * img.height() as f64;
    let mut means = [0.0f32; 3];
    if total == 0.0 {
        return means;
    }

    let hist = histogram(img);
    for (mean, channel) in means.iter_mut().zip(hist.channels.iter()) {
        let sum: u64 = channel
            .iter()
            .enumerate()
            .map(|(value, &count)| value as u64 * count as u64)
            .sum();
        *mean = (sum as f64 / total) as f32;
    }
    means
}

pub fn green_ratio(means: [f32; 3]) -> f32 {
    let [r, g, b] = means;
    g / ((r + b) / 2.0 + RATIO_EPSILON)
}

/// Fraction of pixels whose green channel dominates both others by `dominance`
/// and exceeds `min_green`
pub fn green_fraction(img: &RgbImage, dominance: f32, min_green: u8) -> f32 {
    let total = img.width() as u64 * img.height() as u64;
    if total == 0 {
        return 0.0;
    }

    let green = img
        .pixels()
        .filter(|pixel| {
            let [r, g, b] = pixel.0.map(f32::from);
            g > dominance * r && g > dominance * b && g > min_green as f32
        })
        .count();

    green as f32 / total as f32
}

/// Cheap color gate. Never fails on a non-empty raster.
pub fn check_vegetation(img: &RgbImage, policy: &VegetationPolicy) -> VegetationReport {
    let means = channel_means(img);
    let ratio = green_ratio(means);

    let (accepted, fraction) = match *policy {
        VegetationPolicy::MeanRatio { threshold } => (ratio > threshold, None),
        VegetationPolicy::GreenMask {
            dominance,
            min_green,
            min_fraction,
        } => {
            let fraction = green_fraction(img, dominance, min_green);
            (fraction > min_fraction, Some(fraction))
        }
    };

    VegetationReport {
        means,
        green_ratio: ratio,
        green_fraction: fraction,
        accepted,
    }
}
