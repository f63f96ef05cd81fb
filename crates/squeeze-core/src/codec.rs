//! Image optimization backends.
//!
//! The optimize stage treats the codec as opaque: it hands over a cached
//! download and gets back the files that were produced, if any.

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::config::OptimizeConfig;
use crate::error::OptimizeError;
use crate::types::OptimizedFile;

/// Trait that all optimization backends implement.
#[async_trait]
pub trait Optimizer: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Optimize `input`, writing results into `output_dir`.
    ///
    /// Returns an empty list when the image could not be made smaller.
    async fn optimize(
        &self,
        input: &Path,
        output_dir: &Path,
    ) -> Result<Vec<OptimizedFile>, OptimizeError>;
}

/// Re-encodes JPEG (lossy) and PNG (lossless) images with the `image` crate.
#[derive(Debug, Clone)]
pub struct ImageOptimizer {
    jpeg_quality: u8,
    png_compression: String,
}

impl ImageOptimizer {
    /// Create an optimizer from the configured quality settings.
    pub fn new(config: &OptimizeConfig) -> Self {
        Self {
            jpeg_quality: config.jpeg_quality,
            png_compression: config.png_compression.clone(),
        }
    }

    /// Synchronous optimize (runs in spawn_blocking).
    fn optimize_sync(
        &self,
        input: &Path,
        output_dir: &Path,
    ) -> Result<Vec<OptimizedFile>, OptimizeError> {
        let original = std::fs::read(input).map_err(|source| OptimizeError::Io {
            path: input.to_path_buf(),
            source,
        })?;

        let reader = image::ImageReader::new(Cursor::new(original.as_slice()))
            .with_guessed_format()
            .map_err(|e| OptimizeError::Decode {
                path: input.to_path_buf(),
                message: format!("Cannot detect image format: {e}"),
            })?;
        let format = reader.format().ok_or_else(|| OptimizeError::Unsupported {
            path: input.to_path_buf(),
            format: extension_of(input),
        })?;
        if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png) {
            return Err(OptimizeError::Unsupported {
                path: input.to_path_buf(),
                format: format!("{format:?}").to_lowercase(),
            });
        }

        let image = reader.decode().map_err(|e| OptimizeError::Decode {
            path: input.to_path_buf(),
            message: e.to_string(),
        })?;

        let encoded = match format {
            ImageFormat::Jpeg => self.encode_jpeg(&image),
            _ => self.encode_png(&image),
        }
        .map_err(|e| OptimizeError::Encode {
            path: input.to_path_buf(),
            message: e.to_string(),
        })?;

        if encoded.len() >= original.len() {
            tracing::debug!(
                "No gain for {:?}: {} -> {} bytes",
                input,
                original.len(),
                encoded.len()
            );
            return Ok(vec![]);
        }

        let file_name = input
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("optimized"));
        let dest = output_dir.join(file_name);
        std::fs::write(&dest, &encoded).map_err(|source| OptimizeError::Io {
            path: dest.clone(),
            source,
        })?;

        Ok(vec![OptimizedFile {
            path: dest,
            size: encoded.len() as u64,
        }])
    }

    fn encode_jpeg(&self, image: &DynamicImage) -> image::ImageResult<Vec<u8>> {
        let mut buffer = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, self.jpeg_quality);
        // JPEG has no alpha channel
        DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)?;
        Ok(buffer)
    }

    fn encode_png(&self, image: &DynamicImage) -> image::ImageResult<Vec<u8>> {
        let mut buffer = Vec::new();
        let encoder = PngEncoder::new_with_quality(
            &mut buffer,
            compression_from_name(&self.png_compression),
            FilterType::Adaptive,
        );
        image.write_with_encoder(encoder)?;
        Ok(buffer)
    }
}

#[async_trait]
impl Optimizer for ImageOptimizer {
    fn name(&self) -> &str {
        "image"
    }

    async fn optimize(
        &self,
        input: &Path,
        output_dir: &Path,
    ) -> Result<Vec<OptimizedFile>, OptimizeError> {
        let this = self.clone();
        let input_owned = input.to_path_buf();
        let output_owned = output_dir.to_path_buf();

        tokio::task::spawn_blocking(move || this.optimize_sync(&input_owned, &output_owned))
            .await
            .map_err(|e| OptimizeError::Encode {
                path: input.to_path_buf(),
                message: format!("Task join error: {e}"),
            })?
    }
}

/// Map a configured compression name to the PNG encoder setting.
fn compression_from_name(name: &str) -> CompressionType {
    match name {
        "fast" => CompressionType::Fast,
        "default" => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    /// A smooth gradient: compresses well, so a low-quality re-encode shrinks it.
    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    fn write_image(path: &Path, image: &DynamicImage, format: ImageFormat) {
        image.save_with_format(path, format).unwrap();
    }

    #[tokio::test]
    async fn test_jpeg_reencode_shrinks_high_quality_source() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("source.jpg");
        let out_dir = dir.path().join("out");
        std::fs::create_dir_all(&out_dir).unwrap();

        let mut buffer = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, 100);
        gradient(256, 256).write_with_encoder(encoder).unwrap();
        std::fs::write(&input, &buffer).unwrap();

        let optimizer = ImageOptimizer::new(&OptimizeConfig {
            jpeg_quality: 40,
            ..OptimizeConfig::default()
        });
        let files = optimizer.optimize(&input, &out_dir).await.unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, out_dir.join("source.jpg"));
        assert!(files[0].size < buffer.len() as u64);
        assert_eq!(
            std::fs::metadata(&files[0].path).unwrap().len(),
            files[0].size
        );
    }

    #[tokio::test]
    async fn test_unsupported_format_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("source.bmp");
        write_image(&input, &gradient(16, 16), ImageFormat::Bmp);

        let optimizer = ImageOptimizer::new(&OptimizeConfig::default());
        let err = optimizer.optimize(&input, dir.path()).await.unwrap_err();
        assert!(matches!(err, OptimizeError::Unsupported { .. }));
    }

    #[tokio::test]
    async fn test_garbage_bytes_fail() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("broken.jpg");
        std::fs::write(&input, b"definitely not an image").unwrap();

        let optimizer = ImageOptimizer::new(&OptimizeConfig::default());
        let result = optimizer.optimize(&input, dir.path()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_missing_input_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let optimizer = ImageOptimizer::new(&OptimizeConfig::default());
        let err = optimizer
            .optimize(&dir.path().join("absent.png"), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, OptimizeError::Io { .. }));
    }

    #[test]
    fn test_compression_from_name() {
        assert!(matches!(compression_from_name("fast"), CompressionType::Fast));
        assert!(matches!(
            compression_from_name("default"),
            CompressionType::Default
        ));
        assert!(matches!(compression_from_name("best"), CompressionType::Best));
    }
}
