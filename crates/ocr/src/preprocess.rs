use image::{DynamicImage, GenericImageView, GrayImage, ImageBuffer, Luma, RgbaImage};
use imageproc::contrast::{threshold, ThresholdType};
use imageproc::filter::median_filter;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

use crate::types::{ImageVariant, Technique};

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Invalid image: {0}")]
    InvalidImage(#[from] image::ImageError),
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

/// Tunables for the pixel transforms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreprocessSettings {
    /// Images wider than this are scaled down (aspect preserved).
    pub max_width: u32,
    /// Luminance cutoff for `contrast-threshold`.
    pub threshold: u8,
    /// Exponent for `gamma-threshold`; below 1.0 lifts midtones.
    pub gamma: f32,
    /// Cutoff applied after the gamma lift.
    pub gamma_threshold: u8,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            max_width: 1500,
            threshold: 128,
            gamma: 0.7,
            gamma_threshold: 160,
        }
    }
}

/// Decode raw image bytes (JPEG / PNG / WEBP / …).
pub fn decode(data: &[u8]) -> Result<DynamicImage, PreprocessError> {
    Ok(image::load_from_memory(data)?)
}

/// Decode `data` and produce the variant for one technique.
pub fn preprocess(
    data: &[u8],
    technique: Technique,
    settings: &PreprocessSettings,
) -> Result<ImageVariant, PreprocessError> {
    let img = decode(data)?;
    variant_from(data, &img, technique, settings)
}

/// Decode once, then produce one variant per technique, in order.
pub fn preprocess_all(
    data: &[u8],
    techniques: &[Technique],
    settings: &PreprocessSettings,
) -> Result<Vec<ImageVariant>, PreprocessError> {
    let img = decode(data)?;
    debug!(width = img.width(), height = img.height(), "decoded source image");
    techniques
        .iter()
        .map(|t| variant_from(data, &img, *t, settings))
        .collect()
}

fn variant_from(
    data: &[u8],
    img: &DynamicImage,
    technique: Technique,
    settings: &PreprocessSettings,
) -> Result<ImageVariant, PreprocessError> {
    if technique == Technique::Passthrough {
        return Ok(ImageVariant {
            technique,
            bytes: data.to_vec(),
            width: img.width(),
            height: img.height(),
        });
    }
    let out = apply(img, technique, settings);
    let (width, height) = out.dimensions();
    Ok(ImageVariant {
        technique,
        bytes: encode_as_png(&out)?,
        width,
        height,
    })
}

/// Run a technique on an already-decoded image.
pub fn apply(img: &DynamicImage, technique: Technique, settings: &PreprocessSettings) -> DynamicImage {
    match technique {
        Technique::ContrastThreshold => {
            let img = cap_width(img, settings.max_width);
            let lum = luminance(&img);
            DynamicImage::ImageLuma8(binarize(&lum, settings.threshold))
        }
        Technique::GammaThreshold => {
            let img = cap_width(img, settings.max_width);
            let lum = gamma_correct(&luminance(&img), settings.gamma);
            DynamicImage::ImageLuma8(binarize(&lum, settings.gamma_threshold))
        }
        Technique::Denoise => {
            let img = cap_width(img, settings.max_width);
            DynamicImage::ImageRgba8(median3x3(&img.to_rgba8()))
        }
        Technique::Passthrough => img.clone(),
    }
}

/// Scale down so the width does not exceed `max_width`.
fn cap_width(img: &DynamicImage, max_width: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    if max_width == 0 || w <= max_width {
        return img.clone();
    }
    let new_h = ((h as u64 * max_width as u64) / w as u64).max(1) as u32;
    img.resize_exact(max_width, new_h, image::imageops::FilterType::Lanczos3)
}

/// ITU-R BT.601 weighted sum.
fn luminance(img: &DynamicImage) -> GrayImage {
    let rgb = img.to_rgb8();
    ImageBuffer::from_fn(rgb.width(), rgb.height(), |x, y| {
        let p = rgb.get_pixel(x, y);
        let l = 0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32;
        Luma([l.round().clamp(0.0, 255.0) as u8])
    })
}

fn gamma_correct(gray: &GrayImage, gamma: f32) -> GrayImage {
    let mut lut = [0u8; 256];
    for (i, slot) in lut.iter_mut().enumerate() {
        let v = (i as f32 / 255.0).powf(gamma) * 255.0;
        *slot = v.round().clamp(0.0, 255.0) as u8;
    }
    ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([lut[gray.get_pixel(x, y)[0] as usize]])
    })
}

/// Pixels brighter than `cutoff` become white, everything else black.
fn binarize(gray: &GrayImage, cutoff: u8) -> GrayImage {
    threshold(gray, cutoff, ThresholdType::Binary)
}

/// 3x3 median per channel. The 1-px border keeps the source pixels.
fn median3x3(src: &RgbaImage) -> RgbaImage {
    let (w, h) = src.dimensions();
    if w < 3 || h < 3 {
        return src.clone();
    }
    let mut out = median_filter(src, 1, 1);
    for x in 0..w {
        out.put_pixel(x, 0, *src.get_pixel(x, 0));
        out.put_pixel(x, h - 1, *src.get_pixel(x, h - 1));
    }
    for y in 1..h - 1 {
        out.put_pixel(0, y, *src.get_pixel(0, y));
        out.put_pixel(w - 1, y, *src.get_pixel(w - 1, y));
    }
    out
}

fn encode_as_png(img: &DynamicImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}
