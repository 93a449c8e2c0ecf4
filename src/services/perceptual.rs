//! Perceptual hashing of sub-images, treated as a given primitive.

use image::DynamicImage;
use image_hasher::{HashAlg, Hasher, HasherConfig, ImageHash};

/// Distance reported when a stored hash cannot be decoded.
pub const MAX_DISTANCE: u32 = 10_000;

/// Gradient (difference) hash over a downscaled image, encoded as base64.
pub struct PerceptualHasher {
    hasher: Hasher,
}

impl PerceptualHasher {
    pub fn new() -> Self {
        Self { hasher: HasherConfig::new().hash_alg(HashAlg::Gradient).to_hasher() }
    }

    pub fn hash(&self, image: &DynamicImage) -> String {
        self.hasher.hash_image(image).to_base64()
    }
}

impl Default for PerceptualHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hamming distance between two base64-encoded hashes.
///
/// Undecodable or differently-sized hashes (possible with hand-edited
/// databases) fold into [`MAX_DISTANCE`] rather than failing the query.
pub fn distance(a: &str, b: &str) -> u32 {
    let (Ok(x), Ok(y)) = (ImageHash::<Box<[u8]>>::from_base64(a), ImageHash::from_base64(b))
    else {
        return MAX_DISTANCE;
    };
    if x.as_bytes().len() != y.as_bytes().len() {
        return MAX_DISTANCE;
    }
    x.dist(&y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn gradient_image(step: u8) -> DynamicImage {
        let mut img = GrayImage::new(64, 64);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = Luma([((x * step as u32 + y) % 256) as u8]);
        }
        DynamicImage::ImageLuma8(img)
    }

    #[test]
    fn identical_images_have_zero_distance() {
        let hasher = PerceptualHasher::new();
        let a = hasher.hash(&gradient_image(3));
        let b = hasher.hash(&gradient_image(3));
        assert_eq!(a, b);
        assert_eq!(distance(&a, &b), 0);
    }

    #[test]
    fn different_images_have_positive_distance() {
        let hasher = PerceptualHasher::new();
        let a = hasher.hash(&gradient_image(3));
        let b = hasher.hash(&gradient_image(250));
        assert!(distance(&a, &b) > 0);
    }

    #[test]
    fn garbage_hashes_hit_the_sentinel() {
        assert_eq!(distance("not-base64!", "also not"), MAX_DISTANCE);
        assert_eq!(distance("", ""), MAX_DISTANCE);
    }
}
