//! Upload validation and preview image processing.
//!
//! Everything here is best-effort: a preview that cannot be produced
//! degrades to the original bytes or to no preview at all, never to a
//! failed upload.

use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::error::AppError;

/// Largest accepted document (100 MiB).
pub const MAX_PDF_BYTES: usize = 100 * 1024 * 1024;

pub const PREVIEW_WIDTH: u32 = 800;
pub const PREVIEW_HEIGHT: u32 = 600;

/// Content types accepted for preview and cover images.
pub const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/webp"];

/// 1×1 transparent PNG served when a material has no preview.
pub const PLACEHOLDER_PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f, 0x15, 0xc4,
    0x89, 0x00, 0x00, 0x00, 0x0b, 0x49, 0x44, 0x41, 0x54, 0x78, 0xda, 0x63, 0x60, 0x00, 0x02, 0x00,
    0x00, 0x05, 0x00, 0x01, 0xe9, 0xfa, 0xdc, 0xd8, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44,
    0xae, 0x42, 0x60, 0x82,
];

pub fn is_allowed_image(content_type: &str) -> bool {
    ALLOWED_IMAGE_TYPES.contains(&content_type.trim().to_ascii_lowercase().as_str())
}

/// Checks the `%PDF` magic and the size ceiling.
pub fn validate_pdf(bytes: &[u8]) -> Result<(), AppError> {
    if bytes.len() > MAX_PDF_BYTES {
        return Err(AppError::BadRequest(
            "PDF file exceeds the 100 MB limit".to_string(),
        ));
    }
    if !bytes.starts_with(b"%PDF") {
        return Err(AppError::BadRequest("Invalid PDF file".to_string()));
    }
    Ok(())
}

/// Fits an image inside 800×600 on a white canvas and encodes it as PNG.
/// Returns the input unchanged when it cannot be decoded.
pub fn resize_preview(bytes: &[u8]) -> Vec<u8> {
    match try_resize(bytes) {
        Ok(png) => png,
        Err(e) => {
            tracing::warn!("Preview resize failed, keeping original image: {}", e);
            bytes.to_vec()
        }
    }
}

fn try_resize(bytes: &[u8]) -> Result<Vec<u8>, image::ImageError> {
    let source = image::load_from_memory(bytes)?;
    letterbox(&source)
}

fn letterbox(source: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let fitted = source
        .resize(PREVIEW_WIDTH, PREVIEW_HEIGHT, FilterType::Lanczos3)
        .to_rgba8();

    let mut canvas = RgbaImage::from_pixel(PREVIEW_WIDTH, PREVIEW_HEIGHT, Rgba([255, 255, 255, 255]));
    let x = (PREVIEW_WIDTH - fitted.width()) / 2;
    let y = (PREVIEW_HEIGHT - fitted.height()) / 2;
    imageops::overlay(&mut canvas, &fitted, i64::from(x), i64::from(y));

    let mut out = Vec::new();
    DynamicImage::ImageRgba8(canvas).write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
    Ok(out)
}

/// Pulls a preview out of a PDF: the first embedded JPEG image stream,
/// letterboxed like an uploaded preview. `None` when the document has no
/// decodable JPEG.
pub fn extract_first_page_image(pdf: &[u8]) -> Option<Vec<u8>> {
    let mut offset = 0;
    while let Some(found) = find(&pdf[offset..], b"/DCTDecode") {
        let start = offset + found;
        if let Some(data) = stream_after(pdf, start) {
            match image::load_from_memory_with_format(data, ImageFormat::Jpeg) {
                Ok(img) => return letterbox(&img).ok(),
                Err(e) => tracing::debug!("Skipping undecodable PDF image stream: {}", e),
            }
        }
        offset = start + b"/DCTDecode".len();
    }
    None
}

/// Body of the first `stream ... endstream` section following `from`.
fn stream_after(pdf: &[u8], from: usize) -> Option<&[u8]> {
    let keyword = from + find(&pdf[from..], b"stream")?;
    let mut body = keyword + b"stream".len();
    if pdf.get(body) == Some(&b'\r') {
        body += 1;
    }
    if pdf.get(body) == Some(&b'\n') {
        body += 1;
    }
    let end = body + find(&pdf[body..], b"endstream")?;
    let data = &pdf[body..end];
    // JPEG data runs from SOI to the last EOI; trailing EOL bytes are dropped.
    let eoi = data.windows(2).rposition(|w| w == [0xFF, 0xD9])?;
    data.starts_with(&[0xFF, 0xD8]).then(|| &data[..eoi + 2])
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 255]));
        let mut out = Vec::new();
        DynamicImage::ImageRgba8(img)
            .to_rgb8()
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg)
            .unwrap();
        out
    }

    fn pdf_with_image(image: &[u8]) -> Vec<u8> {
        let mut pdf = b"%PDF-1.4\n1 0 obj\n<< /Type /XObject /Subtype /Image /Filter /DCTDecode >>\nstream\n".to_vec();
        pdf.extend_from_slice(image);
        pdf.extend_from_slice(b"\nendstream\nendobj\n%%EOF\n");
        pdf
    }

    #[test]
    fn test_validate_pdf() {
        assert!(validate_pdf(b"%PDF-1.7 ...").is_ok());
        assert!(matches!(
            validate_pdf(b"PK\x03\x04 zip"),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_allowed_image_types() {
        assert!(is_allowed_image("image/png"));
        assert!(is_allowed_image("IMAGE/JPEG"));
        assert!(is_allowed_image("image/webp"));
        assert!(!is_allowed_image("image/gif"));
        assert!(!is_allowed_image("application/pdf"));
    }

    #[test]
    fn test_placeholder_is_one_transparent_pixel() {
        let img = image::load_from_memory(PLACEHOLDER_PNG).unwrap();
        assert_eq!(img.dimensions(), (1, 1));
        assert_eq!(img.to_rgba8().get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn test_resize_preview_letterboxes() {
        let png = resize_preview(&jpeg(400, 100));
        let img = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();
        assert_eq!(img.dimensions(), (PREVIEW_WIDTH, PREVIEW_HEIGHT));
        // wide source: top rows are white padding
        assert_eq!(img.to_rgba8().get_pixel(400, 5), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_resize_preview_falls_back_to_original() {
        let garbage = b"definitely not an image".to_vec();
        assert_eq!(resize_preview(&garbage), garbage);
    }

    #[test]
    fn test_extract_first_page_image() {
        let pdf = pdf_with_image(&jpeg(64, 48));
        let png = extract_first_page_image(&pdf).unwrap();
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!(img.dimensions(), (PREVIEW_WIDTH, PREVIEW_HEIGHT));
    }

    #[test]
    fn test_extract_without_images_is_none() {
        assert!(extract_first_page_image(b"%PDF-1.4\n1 0 obj << >> endobj\n%%EOF").is_none());
        let broken = pdf_with_image(&[0xFF, 0xD8, 0x00, 0x01, 0xFF, 0xD9]);
        assert!(extract_first_page_image(&broken).is_none());
    }
}
