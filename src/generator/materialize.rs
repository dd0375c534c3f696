// Turns downloaded image bytes into the requested artifact representation

use crate::error::Result;
use crate::models::{CompressLevel, IconArtifact};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Local};
use image::codecs::ico::IcoEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::{self, FilterType};
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use std::fs;
use std::path::Path;

/// Edge length of the ICO companion file.
pub const ICO_SIZE: u32 = 256;

/// Decode any supported format into RGBA; every output path starts here.
pub fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

fn compression_for(level: Option<CompressLevel>) -> CompressionType {
    match level.map(|l| l.get()) {
        None => CompressionType::Default,
        Some(0..=3) => CompressionType::Fast,
        Some(4..=6) => CompressionType::Default,
        Some(_) => CompressionType::Best,
    }
}

pub fn encode_png(img: &RgbaImage, level: Option<CompressLevel>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    PngEncoder::new_with_quality(&mut buf, compression_for(level), PngFilter::Adaptive).write_image(
        img.as_raw(),
        img.width(),
        img.height(),
        ExtendedColorType::Rgba8,
    )?;
    Ok(buf)
}

/// Fit `img` inside a transparent ICO_SIZE square, keeping its aspect ratio.
fn fit_square(img: &RgbaImage) -> RgbaImage {
    let (w, h) = img.dimensions();
    let longest = w.max(h).max(1);
    let fit_w = ((w as u64 * ICO_SIZE as u64) / longest as u64).max(1) as u32;
    let fit_h = ((h as u64 * ICO_SIZE as u64) / longest as u64).max(1) as u32;

    let resized = imageops::resize(img, fit_w, fit_h, FilterType::Lanczos3);
    let mut canvas = RgbaImage::new(ICO_SIZE, ICO_SIZE);
    imageops::overlay(
        &mut canvas,
        &resized,
        ((ICO_SIZE - fit_w) / 2) as i64,
        ((ICO_SIZE - fit_h) / 2) as i64,
    );
    canvas
}

pub fn encode_ico(img: &RgbaImage) -> Result<Vec<u8>> {
    let squared = fit_square(img);
    let mut buf = Vec::new();
    IcoEncoder::new(&mut buf).write_image(
        squared.as_raw(),
        ICO_SIZE,
        ICO_SIZE,
        ExtendedColorType::Rgba8,
    )?;
    Ok(buf)
}

/// File stems for one batch: `<base>` alone, or `<base>_1..=<base>_n`.
///
/// The base is the caller's prefix or `icon_<timestamp>`.
pub fn icon_stems(prefix: Option<&str>, count: usize, now: DateTime<Local>) -> Vec<String> {
    let base = prefix
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("icon_{}", now.format("%Y%m%d_%H%M%S")));

    if count <= 1 {
        vec![base]
    } else {
        (1..=count).map(|i| format!("{}_{}", base, i)).collect()
    }
}

/// Write `<stem>.png` (and `<stem>.ico` when asked) under `output_dir`.
pub fn write_icon_files(
    img: &RgbaImage,
    output_dir: &Path,
    stem: &str,
    level: Option<CompressLevel>,
    write_ico: bool,
) -> Result<IconArtifact> {
    fs::create_dir_all(output_dir)?;

    let png = output_dir.join(format!("{}.png", stem));
    fs::write(&png, encode_png(img, level)?)?;

    let ico = if write_ico {
        let path = output_dir.join(format!("{}.ico", stem));
        fs::write(&path, encode_ico(img)?)?;
        Some(path)
    } else {
        None
    };

    Ok(IconArtifact::Path { png, ico })
}

pub fn to_base64(png: &[u8]) -> String {
    BASE64.encode(png)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::Rgba;
    use tempfile::TempDir;

    fn sample() -> RgbaImage {
        RgbaImage::from_pixel(64, 64, Rgba([20, 120, 220, 200]))
    }

    #[test]
    fn test_stems_for_single_and_batch() {
        let now = Local.with_ymd_and_hms(2026, 10, 19, 9, 5, 7).unwrap();
        assert_eq!(icon_stems(None, 1, now), ["icon_20261019_090507"]);
        assert_eq!(icon_stems(Some("cal"), 3, now), ["cal_1", "cal_2", "cal_3"]);
    }

    #[test]
    fn test_png_roundtrip_keeps_alpha() {
        let bytes = encode_png(&sample(), CompressLevel::new(9).ok()).unwrap();
        let decoded = decode_rgba(&bytes).unwrap();
        assert_eq!(decoded.get_pixel(3, 3), &Rgba([20, 120, 220, 200]));
    }

    #[test]
    fn test_write_icon_files_with_ico() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("icons");
        let artifact = write_icon_files(&sample(), &out, "app", None, true).unwrap();

        match artifact {
            IconArtifact::Path { png, ico } => {
                assert!(png.is_file());
                let ico = ico.unwrap();
                let decoded = image::open(&ico).unwrap();
                assert_eq!(decoded.width(), ICO_SIZE);
            }
            other => panic!("unexpected artifact: {other:?}"),
        }
    }

    #[test]
    fn test_wide_source_is_padded_not_stretched() {
        let wide = RgbaImage::from_pixel(128, 64, Rgba([10, 200, 10, 255]));
        let squared = fit_square(&wide);
        assert_eq!(squared.dimensions(), (ICO_SIZE, ICO_SIZE));
        assert_eq!(squared.get_pixel(0, 0)[3], 0);
        assert_eq!(squared.get_pixel(128, 30)[3], 0);
        assert_eq!(squared.get_pixel(128, 128)[3], 255);

        let bytes = encode_ico(&wide).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (ICO_SIZE, ICO_SIZE));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_rgba(b"not an image").is_err());
    }
}
