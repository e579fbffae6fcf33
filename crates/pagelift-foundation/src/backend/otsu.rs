use image::{DynamicImage, GenericImageView, GrayImage, Luma};
use pagelift_kernel::{ExtractError, Extraction, PageExtractor};
use tracing::debug;

use super::OTSU_VARIANT;

/// Rows/columns with at least this share of page pixels bound the page.
const DEFAULT_MIN_FILL: f32 = 0.25;

/// Finds a bright page on a darker background.
///
/// Pixels brighter than Otsu's threshold form the mask; the crop is the
/// bounding box of rows and columns whose mask coverage reaches `min_fill`.
/// The prompt does not influence the result.
#[derive(Debug, Clone)]
pub struct OtsuExtractor {
    min_fill: f32,
}

impl Default for OtsuExtractor {
    fn default() -> Self {
        Self {
            min_fill: DEFAULT_MIN_FILL,
        }
    }
}

impl OtsuExtractor {
    pub fn with_min_fill(mut self, min_fill: f32) -> Self {
        self.min_fill = min_fill.clamp(0.0, 1.0);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Bounds {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl PageExtractor for OtsuExtractor {
    fn variant(&self) -> &str {
        OTSU_VARIANT
    }

    fn extract_page(&self, image: &DynamicImage, prompt: &str) -> Result<Extraction, ExtractError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(ExtractError::UnsupportedInput(format!(
                "empty image {width}x{height}"
            )));
        }

        let luma = image.to_luma8();
        let threshold = otsu_threshold(&luma);
        let mask = GrayImage::from_fn(width, height, |x, y| {
            if luma.get_pixel(x, y).0[0] > threshold {
                Luma([255])
            } else {
                Luma([0])
            }
        });

        let Some(bounds) = page_bounds(&mask, self.min_fill) else {
            debug!(prompt, threshold, "no page region found; returning full image");
            return Ok(Extraction {
                mask,
                score: 0.0,
                cropped: image.clone(),
            });
        };

        let score = coverage(&mask, bounds);
        let cropped = image.crop_imm(bounds.x, bounds.y, bounds.width, bounds.height);
        debug!(
            prompt,
            threshold,
            x = bounds.x,
            y = bounds.y,
            width = bounds.width,
            height = bounds.height,
            score,
            "page region extracted"
        );

        Ok(Extraction {
            mask,
            score,
            cropped,
        })
    }
}

/// Otsu's method over the 256-bin luma histogram. Pixels strictly above the
/// returned value are foreground.
fn otsu_threshold(luma: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in luma.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total: u64 = histogram.iter().sum();
    let weighted_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(level, &count)| level as f64 * count as f64)
        .sum();

    let mut background = 0u64;
    let mut background_sum = 0f64;
    let mut best = 0u8;
    let mut best_variance = -1f64;

    for (level, &count) in histogram.iter().enumerate() {
        background += count;
        if background == 0 {
            continue;
        }
        let foreground = total - background;
        if foreground == 0 {
            break;
        }
        background_sum += level as f64 * count as f64;

        let mean_background = background_sum / background as f64;
        let mean_foreground = (weighted_total - background_sum) / foreground as f64;
        let variance = background as f64
            * foreground as f64
            * (mean_background - mean_foreground).powi(2);

        if variance > best_variance {
            best_variance = variance;
            best = level as u8;
        }
    }

    best
}

fn page_bounds(mask: &GrayImage, min_fill: f32) -> Option<Bounds> {
    let (width, height) = mask.dimensions();
    let mut row_counts = vec![0u32; height as usize];
    let mut col_counts = vec![0u32; width as usize];

    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel.0[0] > 0 {
            row_counts[y as usize] += 1;
            col_counts[x as usize] += 1;
        }
    }

    let row_min = (min_fill * width as f32).ceil().max(1.0) as u32;
    let col_min = (min_fill * height as f32).ceil().max(1.0) as u32;

    let (top, bottom) = span(&row_counts, row_min)?;
    let (left, right) = span(&col_counts, col_min)?;

    Some(Bounds {
        x: left,
        y: top,
        width: right - left + 1,
        height: bottom - top + 1,
    })
}

/// First and last index whose count reaches `min`.
fn span(counts: &[u32], min: u32) -> Option<(u32, u32)> {
    let first = counts.iter().position(|&c| c >= min)?;
    let last = counts.iter().rposition(|&c| c >= min)?;
    Some((first as u32, last as u32))
}

fn coverage(mask: &GrayImage, bounds: Bounds) -> f32 {
    let mut page = 0u64;
    for y in bounds.y..bounds.y + bounds.height {
        for x in bounds.x..bounds.x + bounds.width {
            if mask.get_pixel(x, y).0[0] > 0 {
                page += 1;
            }
        }
    }
    let area = u64::from(bounds.width) * u64::from(bounds.height);
    page as f32 / area as f32
}
