// src/pipeline/images.rs

use std::io::Cursor;

use anyhow::{bail, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageFormat};
use tracing::debug;

use crate::pipeline::asset::Asset;
use crate::pipeline::stage::{Stage, StageContext};

const JPEG_QUALITY_PRODUCTION: u8 = 80;
const JPEG_QUALITY_DEV: u8 = 90;
const RASTER_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Fans a raster image out into a lossless WebP variant plus a re-encoded
/// original. Formats other than PNG and JPEG pass through untouched.
///
/// A re-encode that comes out larger than the source keeps the source bytes.
/// A raster sharing its stem with another raster in the same directory is
/// rejected, since both would claim the same `.webp` output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageVariantsStage;

impl Stage for ImageVariantsStage {
    fn name(&self) -> &'static str {
        "image-variants"
    }

    fn apply(&self, asset: Asset, ctx: &StageContext<'_>) -> Result<Vec<Asset>> {
        let format = match asset.extension().as_deref() {
            Some("png") => ImageFormat::Png,
            Some("jpg" | "jpeg") => ImageFormat::Jpeg,
            _ => return Ok(vec![asset]),
        };

        let own_ext = asset.extension().unwrap_or_default();
        if let Some(sibling) = RASTER_EXTENSIONS
            .iter()
            .filter(|ext| **ext != own_ext)
            .map(|ext| asset.source.with_extension(ext))
            .find(|candidate| ctx.fs.is_file(candidate))
        {
            let mut webp_rel = asset.rel_path.clone();
            webp_rel.set_extension("webp");
            bail!(
                "{} and {} would both produce {}",
                asset.source.display(),
                sibling.display(),
                webp_rel.display()
            );
        }

        let img = image::load_from_memory_with_format(&asset.content, format)
            .with_context(|| format!("decoding {:?} image", format))?;

        let webp = encode_webp(&img)?;
        let recompressed = match format {
            ImageFormat::Png => encode_png(&img, ctx.production)?,
            _ => encode_jpeg(&img, ctx.production)?,
        };

        let original = if recompressed.len() < asset.content.len() {
            debug!(
                file = ?asset.source,
                before = asset.content.len(),
                after = recompressed.len(),
                "recompressed image"
            );
            recompressed
        } else {
            asset.content.clone()
        };

        let mut webp_rel = asset.rel_path.clone();
        webp_rel.set_extension("webp");
        let webp_asset = asset.clone().with_rel_path(webp_rel).with_content(webp);

        Ok(vec![webp_asset, asset.with_content(original)])
    }
}

fn encode_webp(img: &DynamicImage) -> Result<Vec<u8>> {
    let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
    let mut buf = Cursor::new(Vec::new());
    rgba.write_with_encoder(WebPEncoder::new_lossless(&mut buf))
        .context("encoding webp")?;
    Ok(buf.into_inner())
}

fn encode_png(img: &DynamicImage, production: bool) -> Result<Vec<u8>> {
    let compression = if production {
        CompressionType::Best
    } else {
        CompressionType::Default
    };
    let mut buf = Cursor::new(Vec::new());
    img.write_with_encoder(PngEncoder::new_with_quality(
        &mut buf,
        compression,
        FilterType::Adaptive,
    ))
    .context("encoding png")?;
    Ok(buf.into_inner())
}

fn encode_jpeg(img: &DynamicImage, production: bool) -> Result<Vec<u8>> {
    let quality = if production {
        JPEG_QUALITY_PRODUCTION
    } else {
        JPEG_QUALITY_DEV
    };
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Cursor::new(Vec::new());
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))
        .context("encoding jpeg")?;
    Ok(buf.into_inner())
}
