//! Structural "ratio hash" for bar charts.
//!
//! Encodes the bar-height distribution of a chart into a compact hex string:
//! every bar contributes three hex digits holding its height normalized to
//! [0, 1000] of the tallest bar. The companion distance sorts both height
//! lists before comparing, so two charts with the same multiset of bar
//! heights in different positions are judged identical. That is intentional:
//! reordering bars is a common obfuscation in derivative figures.

use image::{DynamicImage, GrayImage, Luma};
use log::debug;
use serde::{Deserialize, Serialize};

use super::binary;

/// Distance reported when two hashes cannot be meaningfully compared.
pub const MAX_DISTANCE: u32 = 10_000;

/// Hex digits per encoded bar.
const DIGITS_PER_BAR: usize = 3;
/// Hashes with fewer than this many bars carry too little structure.
const MIN_BARS: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatioHashConfig {
    /// Luminance cut for binarization; bars must come out as ink.
    pub threshold: u8,
    /// White border added before cleaning and bar extraction.
    pub border: u32,
    /// Components below this fraction of the image area are speckle noise.
    pub speckle_ratio: f64,
    /// Fill ratio above which the largest component counts as a chart frame.
    pub frame_ratio: f64,
    /// Pixels cut from the frame's top and right edges to open it into an L.
    pub frame_margin: u32,
    /// Minimum bar width as a fraction of image width.
    pub bar_min_width: f64,
    /// Tolerated gap between columns of one bar, as a fraction of width.
    pub gap_ratio: f64,
}

impl Default for RatioHashConfig {
    fn default() -> Self {
        Self {
            threshold: 200,
            border: 20,
            speckle_ratio: 0.004,
            frame_ratio: 0.9,
            frame_margin: 10,
            bar_min_width: 0.01,
            gap_ratio: 0.01,
        }
    }
}

/// Computes the ratio hash of a bar-chart image.
///
/// Total over well-formed images: charts without usable bars produce an empty
/// hash, which the distance metric rejects with the sentinel.
pub fn ratio_hash(image: &DynamicImage, config: &RatioHashConfig) -> String {
    let gray = image.to_luma8();
    let mut bw = binary::threshold(&gray, config.threshold);
    bw = binary::pad(&bw, config.border);
    clean(&mut bw, config.speckle_ratio);
    bw = remove_frame(bw, config);
    let filled = binary::fill_holes(&bw);
    let bars = extract_bars(&filled, config);
    debug!("extracted {} bar(s) from {}x{} chart", bars.len(), gray.width(), gray.height());
    encode(&bars)
}

/// Distance between two ratio hashes; order-invariant over bar heights.
///
/// Returns [`MAX_DISTANCE`] when either hash encodes fewer than four bars,
/// when the bar counts differ, or when a hash is malformed.
pub fn distance(a: &str, b: &str) -> u32 {
    if a.len() < MIN_BARS * DIGITS_PER_BAR || b.len() < MIN_BARS * DIGITS_PER_BAR || a.len() != b.len() {
        return MAX_DISTANCE;
    }
    let (Some(mut heights_a), Some(mut heights_b)) = (decode(a), decode(b)) else {
        return MAX_DISTANCE;
    };
    heights_a.sort_unstable();
    heights_b.sort_unstable();
    heights_a.iter().zip(&heights_b).map(|(&x, &y)| x.abs_diff(y)).sum()
}

/// Removes ink components smaller than `ratio` of the image area.
fn clean(bw: &mut GrayImage, ratio: f64) {
    let (width, height) = bw.dimensions();
    let limit = ratio * width as f64 * height as f64;
    let (labels, components) = binary::label_components(bw);
    let small: Vec<bool> = components.iter().map(|c| (c.area as f64) < limit).collect();
    for (x, y, pixel) in labels.enumerate_pixels() {
        let label = pixel[0];
        if label != 0 && small[label as usize - 1] {
            bw.put_pixel(x, y, Luma([255]));
        }
    }
}

/// Opens a rectangular chart frame into an L shape.
///
/// When the largest filled component is approximately a solid rectangle, the
/// image is whitened outside the region below the frame's top margin and left
/// of its right margin. The remaining left and bottom frame edges no longer
/// interfere with bar-base detection.
fn remove_frame(bw: GrayImage, config: &RatioHashConfig) -> GrayImage {
    let (width, height) = bw.dimensions();
    let filled = binary::fill_holes(&bw);
    let Some(largest) = binary::largest_component(&filled) else {
        return bw;
    };
    let fill_ratio = largest.area as f64 / (largest.width as f64 * largest.height as f64);
    if fill_ratio <= config.frame_ratio {
        return bw;
    }

    let y0 = largest.y + config.frame_margin;
    let x1 = (largest.x + largest.width).saturating_sub(config.frame_margin);
    let mut out = GrayImage::from_pixel(width, height, Luma([255u8]));
    for y in y0..height {
        for x in 0..x1.min(width) {
            out.put_pixel(x, y, *bw.get_pixel(x, y));
        }
    }
    out
}

/// Per-column ink run-length measured upward from the bottom of the image.
fn column_heights(filled: &GrayImage) -> Vec<i64> {
    let (width, height) = filled.dimensions();
    let mut heights = Vec::with_capacity(width as usize);
    for x in 0..width {
        let mut start = height as i64 - 1;
        while start >= 0 && filled.get_pixel(x, start as u32)[0] == 255 {
            start -= 1;
        }
        let mut end = start;
        while end >= 0 && filled.get_pixel(x, end as u32)[0] == 0 {
            end -= 1;
        }
        heights.push(start - end);
    }
    heights
}

/// One open cluster of column heights believed to belong to the same bar.
struct Cluster {
    members: Vec<i64>,
    life: i64,
}

/// Folds noisy per-column heights into discrete bar heights, left to right.
///
/// Streaming clustering with decay: a column joins the most recently opened
/// cluster holding a height within ±1 of it (absorbs antialiasing), boosting
/// that cluster's life up to the gap budget; every column ages all clusters
/// by one. Clusters that die with at least the minimum bar width of members
/// emit their mean height as one bar.
fn extract_bars(filled: &GrayImage, config: &RatioHashConfig) -> Vec<f64> {
    let width = filled.width();
    let min_width = config.bar_min_width * width as f64;
    let gap = (config.gap_ratio * width as f64) as i64;

    let mut open: Vec<Cluster> = Vec::new();
    let mut bars: Vec<f64> = Vec::new();
    for height in column_heights(filled) {
        match open
            .iter_mut()
            .rev()
            .find(|c| c.members.iter().any(|&m| (m - height).abs() <= 1))
        {
            Some(cluster) => {
                cluster.members.push(height);
                cluster.life = (cluster.life + 2).min(gap);
            }
            None => open.push(Cluster { members: vec![height], life: 2 }),
        }
        for cluster in &mut open {
            cluster.life -= 1;
        }
        bars.extend(
            open.iter()
                .filter(|c| c.life <= 0 && c.members.len() as f64 >= min_width)
                .map(|c| mean(&c.members)),
        );
        open.retain(|c| c.life > 0);
    }
    bars.extend(
        open.iter().filter(|c| c.members.len() as f64 >= min_width).map(|c| mean(&c.members)),
    );
    bars.retain(|&b| b >= min_width);
    bars
}

fn mean(values: &[i64]) -> f64 {
    values.iter().sum::<i64>() as f64 / values.len() as f64
}

/// Encodes bar heights as concatenated 3-hex-digit codes, normalized to
/// [0, 1000] of the tallest bar.
fn encode(bars: &[f64]) -> String {
    let max = bars.iter().cloned().fold(0.0f64, f64::max);
    if max <= 0.0 {
        return String::new();
    }
    bars.iter().map(|&b| format!("{:03x}", (b / max * 1000.0).round() as u32)).collect()
}

fn decode(hash: &str) -> Option<Vec<u32>> {
    if hash.len() % DIGITS_PER_BAR != 0 {
        return None;
    }
    hash.as_bytes()
        .chunks(DIGITS_PER_BAR)
        .map(|chunk| {
            let digits = std::str::from_utf8(chunk).ok()?;
            u32::from_str_radix(digits, 16).ok()
        })
        .collect()
}
