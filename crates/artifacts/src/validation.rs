//! Screenshot acceptance checks (§4.7). Cheap enough to run on every
//! capture attempt: a strided pixel sample stands in for a full scan.

use image::GenericImageView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationFailure {
    TooSmall,
    DecodeFailed,
    DimensionTooSmall,
    NearWhite,
    LowVariance,
}

const MIN_BYTES: usize = 1024;
const MIN_DIMENSION: u32 = 100;
const NEAR_WHITE_CHANNEL_FLOOR: u8 = 240;
const NEAR_WHITE_RATIO_CEILING: f64 = 0.95;
const MIN_VARIANCE: f64 = 10.0;
const WHITE_RATIO_STRIDE: usize = 10;
const VARIANCE_STRIDE: usize = 20;

/// Validates raw PNG bytes, returning the decoded dimensions on success.
pub fn validate_capture(png_bytes: &[u8]) -> Result<(u32, u32), ValidationFailure> {
    if png_bytes.len() < MIN_BYTES {
        return Err(ValidationFailure::TooSmall);
    }
    let img = image::load_from_memory(png_bytes).map_err(|_| ValidationFailure::DecodeFailed)?;
    let (width, height) = img.dimensions();
    if width < MIN_DIMENSION || height < MIN_DIMENSION {
        return Err(ValidationFailure::DimensionTooSmall);
    }

    let rgb = img.to_rgb8();
    let pixels: Vec<[u8; 3]> = rgb.pixels().map(|p| p.0).collect();

    let white_sample: Vec<&[u8; 3]> = pixels.iter().step_by(WHITE_RATIO_STRIDE).collect();
    if !white_sample.is_empty() {
        let near_white = white_sample
            .iter()
            .filter(|[r, g, b]| *r > NEAR_WHITE_CHANNEL_FLOOR && *g > NEAR_WHITE_CHANNEL_FLOOR && *b > NEAR_WHITE_CHANNEL_FLOOR)
            .count();
        if near_white as f64 / white_sample.len() as f64 >= NEAR_WHITE_RATIO_CEILING {
            return Err(ValidationFailure::NearWhite);
        }
    }

    let variance_sample: Vec<&[u8; 3]> = pixels.iter().step_by(VARIANCE_STRIDE).collect();
    if !variance_sample.is_empty() && channel_stddev(&variance_sample) < MIN_VARIANCE {
        return Err(ValidationFailure::LowVariance);
    }

    Ok((width, height))
}

fn channel_stddev(samples: &[&[u8; 3]]) -> f64 {
    let n = samples.len() as f64;
    let mean_of = |channel: usize| samples.iter().map(|p| p[channel] as f64).sum::<f64>() / n;
    let means = [mean_of(0), mean_of(1), mean_of(2)];
    let variance_of = |channel: usize| {
        samples.iter().map(|p| (p[channel] as f64 - means[channel]).powi(2)).sum::<f64>() / n
    };
    let avg_variance = (variance_of(0) + variance_of(1) + variance_of(2)) / 3.0;
    avg_variance.sqrt()
}
