//! Shared binary-image primitives for the segmentation and hashing pipelines.
//!
//! All functions operate on `GrayImage` buffers using the same convention as
//! the rest of the core: ink (foreground) is 0, background is 255. Callers
//! are expected to pad images with a white border before flood filling so the
//! background is connected from the top-left corner.

use std::collections::VecDeque;

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

/// Bounding box and pixel area of one connected foreground component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component {
    pub label: u32,
    pub area: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Surrounds the image with a uniform white border.
pub fn pad(img: &GrayImage, padding: u32) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut out = GrayImage::from_pixel(width + 2 * padding, height + 2 * padding, Luma([255u8]));
    for (x, y, &pixel) in img.enumerate_pixels() {
        out.put_pixel(x + padding, y + padding, pixel);
    }
    out
}

/// Fixed-cut binarization: pixels above `cut` become white, the rest ink.
pub fn threshold(img: &GrayImage, cut: u8) -> GrayImage {
    let mut out = img.clone();
    for pixel in out.pixels_mut() {
        pixel[0] = if pixel[0] > cut { 255 } else { 0 };
    }
    out
}

/// Adaptive binarization against a Gaussian-weighted local mean.
///
/// A pixel stays white when it is brighter than the weighted mean of its
/// `block`×`block` neighborhood minus `c`. Borders are handled by clamping
/// (replication). `block` must be odd.
pub fn adaptive_threshold(img: &GrayImage, block: u32, c: f64) -> GrayImage {
    debug_assert!(block % 2 == 1, "block size must be odd");
    let (width, height) = img.dimensions();
    let radius = (block / 2) as i64;
    let kernel = gaussian_kernel(block);

    // Separable filter: horizontal pass, then vertical.
    let mut horizontal = vec![0.0f64; (width * height) as usize];
    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = (x + k as i64 - radius).clamp(0, width as i64 - 1);
                acc += weight * img.get_pixel(sx as u32, y as u32)[0] as f64;
            }
            horizontal[(y * width as i64 + x) as usize] = acc;
        }
    }

    let mut out = GrayImage::new(width, height);
    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let mut mean = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = (y + k as i64 - radius).clamp(0, height as i64 - 1);
                mean += weight * horizontal[(sy * width as i64 + x) as usize];
            }
            let src = img.get_pixel(x as u32, y as u32)[0] as f64;
            let value = if src > mean - c { 255 } else { 0 };
            out.put_pixel(x as u32, y as u32, Luma([value]));
        }
    }
    out
}

/// One iteration of ink dilation with a 2×2 structuring element.
///
/// A pixel becomes ink if any pixel in the 2×2 window ending at it is ink,
/// which grows dark regions by one pixel toward the bottom-right and closes
/// single-pixel gaps.
pub fn dilate_ink(img: &GrayImage) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut out = GrayImage::from_pixel(width, height, Luma([255u8]));
    for y in 0..height {
        for x in 0..width {
            let mut ink = false;
            for dy in 0..2u32 {
                for dx in 0..2u32 {
                    if x >= dx && y >= dy && img.get_pixel(x - dx, y - dy)[0] == 0 {
                        ink = true;
                    }
                }
            }
            if ink {
                out.put_pixel(x, y, Luma([0]));
            }
        }
    }
    out
}

/// Flood-fills the background from the top-left corner and turns everything
/// that is not reachable background into solid ink.
///
/// Shapes come out filled, interior holes included, as ink 0 on a white
/// background. The input must carry a white border; if the corner pixel is
/// not background the image is returned unchanged.
pub fn fill_holes(img: &GrayImage) -> GrayImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 || img.get_pixel(0, 0)[0] != 255 {
        return img.clone();
    }

    let mut background = vec![false; (width * height) as usize];
    let mut queue = VecDeque::new();
    background[0] = true;
    queue.push_back((0u32, 0u32));
    while let Some((x, y)) = queue.pop_front() {
        for (nx, ny) in neighbors4(x, y, width, height) {
            let idx = (ny * width + nx) as usize;
            if !background[idx] && img.get_pixel(nx, ny)[0] == 255 {
                background[idx] = true;
                queue.push_back((nx, ny));
            }
        }
    }

    let mut out = GrayImage::new(width, height);
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let value = if background[(y * width + x) as usize] { 255 } else { 0 };
        *pixel = Luma([value]);
    }
    out
}

/// Labels 8-connected ink components and collects their bounding boxes.
///
/// Returns the label image (0 = background) alongside per-component stats,
/// ordered by label, i.e. by first appearance in raster order.
pub fn label_components(img: &GrayImage) -> (image::ImageBuffer<Luma<u32>, Vec<u32>>, Vec<Component>) {
    let labels = connected_components(img, Connectivity::Eight, Luma([255u8]));
    let mut stats: Vec<Component> = Vec::new();
    for (x, y, pixel) in labels.enumerate_pixels() {
        let label = pixel[0];
        if label == 0 {
            continue;
        }
        let idx = label as usize - 1;
        if stats.len() <= idx {
            stats.resize(
                idx + 1,
                Component { label: 0, area: 0, x: u32::MAX, y: u32::MAX, width: 0, height: 0 },
            );
        }
        let comp = &mut stats[idx];
        comp.label = label;
        comp.area += 1;
        // Track extents first; width/height are fixed up below.
        comp.x = comp.x.min(x);
        comp.y = comp.y.min(y);
        comp.width = comp.width.max(x);
        comp.height = comp.height.max(y);
    }
    for comp in &mut stats {
        comp.width = comp.width - comp.x + 1;
        comp.height = comp.height - comp.y + 1;
    }
    (labels, stats)
}

/// The largest filled component of the image, by pixel area.
pub fn largest_component(img: &GrayImage) -> Option<Component> {
    let (_, stats) = label_components(img);
    stats.into_iter().max_by_key(|c| c.area)
}

/// Crops `img` to the component's bounding box.
pub fn crop_component(img: &GrayImage, comp: &Component) -> GrayImage {
    image::imageops::crop_imm(img, comp.x, comp.y, comp.width, comp.height).to_image()
}

fn neighbors4(x: u32, y: u32, width: u32, height: u32) -> impl Iterator<Item = (u32, u32)> {
    let (x, y) = (x as i64, y as i64);
    [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)]
        .into_iter()
        .filter(move |&(nx, ny)| nx >= 0 && ny >= 0 && nx < width as i64 && ny < height as i64)
        .map(|(nx, ny)| (nx as u32, ny as u32))
}

/// Gaussian weights matching OpenCV's default sigma for a given kernel size.
fn gaussian_kernel(size: u32) -> Vec<f64> {
    let sigma = 0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8;
    let center = (size / 2) as f64;
    let mut kernel: Vec<f64> = (0..size)
        .map(|i| {
            let d = i as f64 - center;
            (-d * d / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let total: f64 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= total;
    }
    kernel
}
