//! Image encoding: crops → PNG bytes, base64 data URLs, `ImageData`.
//!
//! PNG keeps rendered text lossless. Vision endpoints reject or mis-read
//! tiny images, so crops are padded onto a white canvas up to a minimum
//! side before upload.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{imageops, Rgb, RgbImage};
use std::io::Cursor;
use tracing::debug;

/// Encode as PNG bytes.
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Paste `img` at the origin of a white canvas at least `min_side` on each
/// side. Returns a copy of `img` when it is already large enough.
pub fn pad_to_min_side(img: &RgbImage, min_side: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    if w >= min_side && h >= min_side {
        return img.clone();
    }
    let mut canvas = RgbImage::from_pixel(w.max(min_side), h.max(min_side), Rgb([255, 255, 255]));
    imageops::replace(&mut canvas, img, 0, 0);
    canvas
}

/// `data:image/png;base64,…` after padding to `min_side`.
pub fn png_data_url(img: &RgbImage, min_side: u32) -> Result<String, image::ImageError> {
    let padded = pad_to_min_side(img, min_side);
    let b64 = STANDARD.encode(encode_png(&padded)?);
    debug!("Encoded {}x{} crop → {} bytes base64", padded.width(), padded.height(), b64.len());
    Ok(format!("data:image/png;base64,{}", b64))
}

/// Wrap a crop for an `edgequake-llm` provider.
pub fn encode_image_data(img: &RgbImage, min_side: u32) -> Result<ImageData, image::ImageError> {
    let padded = pad_to_min_side(img, min_side);
    let b64 = STANDARD.encode(encode_png(&padded)?);
    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_crop_is_padded_white() {
        let img = RgbImage::from_pixel(10, 50, Rgb([0, 0, 0]));
        let padded = pad_to_min_side(&img, 32);
        assert_eq!(padded.dimensions(), (32, 50));
        assert_eq!(padded.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(padded.get_pixel(31, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn large_crop_is_unchanged() {
        let img = RgbImage::from_pixel(64, 64, Rgb([10, 20, 30]));
        assert_eq!(pad_to_min_side(&img, 32), img);
    }

    #[test]
    fn data_url_decodes_to_png() {
        let img = RgbImage::from_pixel(4, 4, Rgb([255, 0, 0]));
        let url = png_data_url(&img, 8).expect("encode");
        let b64 = url.strip_prefix("data:image/png;base64,").expect("prefix");
        let bytes = STANDARD.decode(b64).expect("valid base64");
        assert_eq!(&bytes[1..4], b"PNG");
        let decoded = image::load_from_memory(&bytes).expect("png").to_rgb8();
        assert_eq!(decoded.dimensions(), (8, 8));
    }

    #[test]
    fn image_data_has_png_mime() {
        let img = RgbImage::from_pixel(40, 40, Rgb([255, 255, 255]));
        let data = encode_image_data(&img, 32).expect("encode");
        assert_eq!(data.mime_type, "image/png");
        assert!(!data.data.is_empty());
    }
}
