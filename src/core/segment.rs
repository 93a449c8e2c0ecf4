//! Blob segmentation: splits a composite figure into sub-images, one per
//! connected visual blob.

use image::{DynamicImage, GrayImage, Luma};
use log::debug;
use serde::{Deserialize, Serialize};

use super::binary;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// White border added before thresholding so the background is connected
    /// from every edge.
    pub padding: u32,
    /// Ring width erased when the figure carries an outer frame.
    pub margin: u32,
    /// Minimum blob width/height as a fraction of the input dimensions.
    pub min_blob_ratio: f64,
    /// Absolute minimum blob width/height in pixels.
    pub min_blob_px: u32,
    /// Adaptive threshold block size (odd).
    pub block_size: u32,
    /// Adaptive threshold constant subtracted from the local mean.
    pub threshold_c: f64,
    /// Fraction of both dimensions the largest component must cover to count
    /// as a frame, and the minimum filled-area to bounding-box ratio.
    pub frame_ratio: f64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            padding: 10,
            margin: 5,
            min_blob_ratio: 0.10,
            min_blob_px: 10,
            block_size: 11,
            threshold_c: 2.0,
            frame_ratio: 0.9,
        }
    }
}

/// One segmented sub-image with its bounding box in padded-image coordinates.
#[derive(Debug, Clone)]
pub struct Blob {
    pub image: GrayImage,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

pub struct Segmenter {
    config: SegmentConfig,
}

impl Segmenter {
    pub fn new(config: SegmentConfig) -> Self {
        Self { config }
    }

    /// Decomposes an image into blobs, in component discovery order.
    ///
    /// Deterministic for a given image and config. Callers must not rely on
    /// any semantic ordering of the result. A blank image yields no blobs;
    /// the full input image is not included (the orchestrator adds it).
    pub fn segment(&self, image: &DynamicImage) -> Vec<Blob> {
        let gray = image.to_luma8();
        let (width, height) = gray.dimensions();
        let padded = binary::pad(&gray, self.config.padding);

        let mut bw = binary::adaptive_threshold(&padded, self.config.block_size, self.config.threshold_c);
        bw = binary::dilate_ink(&bw);
        bw = self.fix_border(bw);
        let mask = binary::fill_holes(&bw);

        let (_, components) = binary::label_components(&mask);
        let min_w = self.config.min_blob_ratio * width as f64;
        let min_h = self.config.min_blob_ratio * height as f64;
        let blobs: Vec<Blob> = components
            .into_iter()
            .filter(|c| {
                c.width as f64 > min_w
                    && c.height as f64 > min_h
                    && c.width > self.config.min_blob_px
                    && c.height > self.config.min_blob_px
            })
            .map(|c| Blob {
                image: binary::crop_component(&padded, &c),
                x: c.x,
                y: c.y,
                width: c.width,
                height: c.height,
            })
            .collect();
        debug!("segmented {}x{} image into {} blob(s)", width, height, blobs.len());
        blobs
    }

    /// Erases the outer frame of the figure when the largest filled component
    /// is approximately a solid rectangle covering most of the image.
    ///
    /// Everything outside the margin-inset interior of that rectangle is
    /// whitened, which removes the frame stroke while keeping the content.
    /// Known false-positive risk: a blob that is itself a near-full-image
    /// solid rectangle passes both tests and loses its edges.
    fn fix_border(&self, bw: GrayImage) -> GrayImage {
        let (width, height) = bw.dimensions();
        let filled = binary::fill_holes(&bw);
        let Some(largest) = binary::largest_component(&filled) else {
            return bw;
        };
        if (largest.width as f64) < self.config.frame_ratio * width as f64
            || (largest.height as f64) < self.config.frame_ratio * height as f64
        {
            return bw;
        }
        let fill_ratio = largest.area as f64 / (largest.width as f64 * largest.height as f64);
        if fill_ratio <= self.config.frame_ratio {
            return bw;
        }

        let margin = self.config.margin;
        let x0 = largest.x + margin;
        let y0 = largest.y + margin;
        let x1 = (largest.x + largest.width).saturating_sub(margin);
        let y1 = (largest.y + largest.height).saturating_sub(margin);
        let mut out = GrayImage::from_pixel(width, height, Luma([255u8]));
        for y in y0..y1.min(height) {
            for x in x0..x1.min(width) {
                out.put_pixel(x, y, *bw.get_pixel(x, y));
            }
        }
        out
    }
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(SegmentConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill_rect(img: &mut GrayImage, x: u32, y: u32, w: u32, h: u32, value: u8) {
        for yy in y..y + h {
            for xx in x..x + w {
                img.put_pixel(xx, yy, Luma([value]));
            }
        }
    }

    #[test]
    fn blank_image_yields_no_blobs() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(100, 100, Luma([255])));
        let blobs = Segmenter::default().segment(&img);
        assert!(blobs.is_empty());
    }

    #[test]
    fn two_separate_blobs_are_found() {
        let mut gray = GrayImage::from_pixel(200, 200, Luma([255]));
        fill_rect(&mut gray, 20, 20, 60, 60, 0);
        fill_rect(&mut gray, 120, 110, 50, 70, 0);
        let blobs = Segmenter::default().segment(&DynamicImage::ImageLuma8(gray));
        assert_eq!(blobs.len(), 2);
        // Crop sizes track the drawn rectangles (dilation may add a pixel).
        for blob in &blobs {
            assert!(blob.width >= 50 && blob.width <= 62);
            assert!(blob.height >= 60 && blob.height <= 72);
        }
    }

    #[test]
    fn small_specks_are_discarded() {
        let mut gray = GrayImage::from_pixel(100, 100, Luma([255]));
        fill_rect(&mut gray, 10, 10, 5, 5, 0);
        let blobs = Segmenter::default().segment(&DynamicImage::ImageLuma8(gray));
        assert!(blobs.is_empty());
    }

    #[test]
    fn segmentation_is_deterministic() {
        let mut gray = GrayImage::from_pixel(150, 150, Luma([255]));
        fill_rect(&mut gray, 10, 10, 40, 40, 0);
        fill_rect(&mut gray, 80, 80, 40, 40, 0);
        let img = DynamicImage::ImageLuma8(gray);
        let segmenter = Segmenter::default();
        let first = segmenter.segment(&img);
        let second = segmenter.segment(&img);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!((a.x, a.y, a.width, a.height), (b.x, b.y, b.width, b.height));
        }
    }

    #[test]
    fn framed_figure_keeps_interior_content() {
        // A one-pixel frame around the whole figure plus an interior blob.
        // The canvas is large enough that the frame still covers 90% of the
        // padded image.
        let mut gray = GrayImage::from_pixel(300, 300, Luma([255]));
        fill_rect(&mut gray, 0, 0, 300, 1, 0);
        fill_rect(&mut gray, 0, 299, 300, 1, 0);
        fill_rect(&mut gray, 0, 0, 1, 300, 0);
        fill_rect(&mut gray, 299, 0, 1, 300, 0);
        fill_rect(&mut gray, 80, 80, 120, 120, 0);
        let blobs = Segmenter::default().segment(&DynamicImage::ImageLuma8(gray));
        assert_eq!(blobs.len(), 1);
        let blob = &blobs[0];
        assert!(blob.width >= 120 && blob.width < 140);
        assert!(blob.height >= 120 && blob.height < 140);
    }
}
