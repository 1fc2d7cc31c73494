use crate::error::AppError;
use crate::models::catalog_types::{CatalogEntry, Label, Page};
use base64::Engine;
use futures::future::join_all;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, Rgb, RgbImage};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

const THUMBNAIL_SIZE: u32 = 140;
const THUMBNAIL_QUALITY: u8 = 60;
const PLACEHOLDER_GREY: u8 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderOptions {
    pub target_size: u32,
    pub placeholder_size: u32,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            target_size: 224,
            placeholder_size: THUMBNAIL_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Decoded,
    Placeholder { caption: String },
}

#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub image: RgbImage,
    pub source: ImageSource,
}

impl LoadedImage {
    pub fn is_placeholder(&self) -> bool {
        matches!(self.source, ImageSource::Placeholder { .. })
    }

    pub fn caption(&self) -> Option<&str> {
        match &self.source {
            ImageSource::Placeholder { caption } => Some(caption),
            ImageSource::Decoded => None,
        }
    }
}

/// Square center crop (side = shorter edge) scaled to `target` x `target`.
pub fn center_crop_square(img: &DynamicImage, target: u32) -> Result<RgbImage, AppError> {
    let (w, h) = (img.width(), img.height());
    let side = w.min(h);
    if side == 0 {
        return Err(AppError::image_decode("Image has no pixels"));
    }

    let crop_x = (w - side) / 2;
    let crop_y = (h - side) / 2;
    let cropped = img.crop_imm(crop_x, crop_y, side, side);
    let resized = if side == target {
        cropped
    } else {
        cropped.resize_exact(target, target, FilterType::Triangle)
    };
    Ok(resized.to_rgb8())
}

/// Flat grey stand-in. The caption travels alongside the pixels since
/// text is drawn by the renderer.
pub fn placeholder(label: Label, size: u32) -> LoadedImage {
    LoadedImage {
        image: RgbImage::from_pixel(size, size, Rgb([PLACEHOLDER_GREY; 3])),
        source: ImageSource::Placeholder {
            caption: format!("Placeholder\n{}", label),
        },
    }
}

fn decode_image(path: &Path) -> Result<DynamicImage, AppError> {
    ImageReader::open(path)
        .map_err(|e| AppError::image_decode(format!("Failed to open image {}: {}", path.display(), e)))?
        .with_guessed_format()
        .map_err(|e| AppError::image_decode(format!("Failed to read image {}: {}", path.display(), e)))?
        .decode()
        .map_err(|e| AppError::image_decode(format!("Failed to decode image {}: {}", path.display(), e)))
}

/// Decodes and preprocesses one entry, falling back to a placeholder.
pub fn load_entry(entry: &CatalogEntry, options: LoaderOptions) -> LoadedImage {
    let result = decode_image(entry.path()).and_then(|img| center_crop_square(&img, options.target_size));
    match result {
        Ok(image) => LoadedImage {
            image,
            source: ImageSource::Decoded,
        },
        Err(e) => {
            warn!("{}", e);
            placeholder(entry.actual_label, options.placeholder_size)
        }
    }
}

/// Loads every entry of the page on blocking workers and returns once all
/// of them have settled, in page order.
pub async fn load_page(page: &Page, options: LoaderOptions) -> Vec<LoadedImage> {
    let tasks = page.entries.iter().cloned().map(|entry| {
        let label = entry.actual_label;
        let handle = tokio::task::spawn_blocking(move || load_entry(&entry, options));
        async move {
            match handle.await {
                Ok(loaded) => loaded,
                Err(e) => {
                    warn!("Image worker failed: {}", e);
                    placeholder(label, options.placeholder_size)
                }
            }
        }
    });

    let images = join_all(tasks).await;
    let placeholders = images.iter().filter(|i| i.is_placeholder()).count();
    if placeholders > 0 {
        debug!("All images processed ({} placeholders)", placeholders);
    } else {
        debug!("All images loaded");
    }
    images
}

/// Encode an image to JPEG bytes at thumbnail size and reduced quality.
pub fn encode_jpeg_thumbnail(img: &RgbImage) -> Result<Vec<u8>, AppError> {
    let thumb = DynamicImage::ImageRgb8(img.clone()).resize(
        THUMBNAIL_SIZE,
        THUMBNAIL_SIZE,
        FilterType::Triangle,
    );
    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, THUMBNAIL_QUALITY);
    thumb
        .write_with_encoder(encoder)
        .map_err(|e| AppError::from(format!("Failed to encode thumbnail: {}", e)))?;
    Ok(buffer.into_inner())
}

pub fn thumbnail_data_uri(img: &RgbImage) -> Result<String, AppError> {
    let bytes = encode_jpeg_thumbnail(img)?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:image/jpeg;base64,{}", encoded))
}
