use std::path::Path;

use image::{GrayImage, ImageReader};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open image file: {0}")]
    Open(#[from] std::io::Error),
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image contains no pixels")]
    EmptyImage,
}

/// A grayscale micrograph held as f64 intensities in raster order. Loaded
/// once per run and never mutated; the final statistics are computed from
/// these original values, not from any thresholded derivative.
#[derive(Clone, Debug)]
pub struct Micrograph {
    width: u32,
    height: u32,
    pixels: Vec<f64>,
}

impl Micrograph {
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<f64>) -> Micrograph {
        assert!(width > 0 && height > 0, "micrograph must be non-empty");
        assert_eq!(pixels.len(), (width * height) as usize);
        Micrograph { width, height, pixels }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> f64 {
        self.pixels[(y * self.width + x) as usize]
    }

    /// Pixel values in raster order.
    pub fn pixels(&self) -> &[f64] {
        &self.pixels
    }

    pub fn mean(&self) -> f64 {
        self.pixels.iter().sum::<f64>() / self.pixels.len() as f64
    }

    pub fn min(&self) -> f64 {
        self.pixels.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.pixels.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn median(&self) -> f64 {
        let mut sorted = self.pixels.clone();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        }
    }
}

/// Reads a grayscale raster image and converts it to a Micrograph.
/// Decoded as 16-bit luma, so 8-bit and 16-bit sensor outputs both keep
/// their full range.
pub fn load_micrograph(path: &Path) -> Result<Micrograph, LoadError> {
    let decoded = ImageReader::open(path)?.decode()?;
    let gray = decoded.to_luma16();
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return Err(LoadError::EmptyImage);
    }
    let pixels = gray.as_raw().iter().map(|&v| v as f64).collect();
    Ok(Micrograph::from_pixels(width, height, pixels))
}

/// A binary mask over the micrograph, true = foreground candidate.
/// Each segmentation stage consumes and produces whole masks; none of
/// them touch the original pixel values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl Mask {
    /// An all-background mask.
    pub fn new(width: u32, height: u32) -> Mask {
        Mask { width, height, bits: vec![false; (width * height) as usize] }
    }

    pub fn from_bits(width: u32, height: u32, bits: Vec<bool>) -> Mask {
        assert_eq!(bits.len(), (width * height) as usize);
        Mask { width, height, bits }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        self.bits[(y * self.width + x) as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        self.bits[(y * self.width + x) as usize] = value;
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    pub fn count_set(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    /// Mean of the mask viewed as a {0,1} raster.
    pub fn fraction_set(&self) -> f64 {
        self.count_set() as f64 / self.bits.len() as f64
    }

    pub fn complement(&self) -> Mask {
        let bits = self.bits.iter().map(|&b| !b).collect();
        Mask::from_bits(self.width, self.height, bits)
    }

    /// Re-thresholds the mask at its own mean: a pixel stays set iff its
    /// {0,1} value exceeds the fraction of set pixels. Identity for any
    /// mixed mask; empties an all-true or all-false mask.
    pub fn above_mean(&self) -> Mask {
        let mean = self.fraction_set();
        let bits = self
            .bits
            .iter()
            .map(|&b| (if b { 1.0 } else { 0.0 }) > mean)
            .collect();
        Mask::from_bits(self.width, self.height, bits)
    }

    /// Renders the mask as an 8-bit gray image (255 = foreground) for the
    /// connected-component labeler.
    pub fn to_gray_image(&self) -> GrayImage {
        let raw = self.bits.iter().map(|&b| if b { 255u8 } else { 0u8 }).collect();
        GrayImage::from_raw(self.width, self.height, raw)
            .expect("mask dimensions match its bit buffer")
    }
}
