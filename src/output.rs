//! Writing render results to disk.

use crate::compute::RenderResult;
use crate::error::{DispatchError, Result};
use image::RgbaImage;
use std::path::Path;

/// Encode the result as a PNG at `path`, creating parent directories as needed.
pub fn write_png(result: &RenderResult, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| DispatchError::output(parent, e))?;
    }

    let image = RgbaImage::from_raw(result.width(), result.height(), result.pixels().to_vec())
        .ok_or_else(|| DispatchError::ImageError {
            message: "pixel buffer does not match image dimensions".to_string(),
        })?;
    image.save_with_format(path, image::ImageFormat::Png)?;
    log::info!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::RawFrame;

    #[test]
    fn writes_readable_png() {
        let frame = RawFrame {
            pixels: [255u8, 0, 0, 255].repeat(6),
            width: 3,
            height: 2,
            samples_per_pixel: 1,
            total_rays: 6,
        };
        let result = RenderResult::from_frame(frame, 1.0).unwrap();

        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("nested").join("out.png");
        write_png(&result, &path).unwrap();

        let decoded = image::open(&path).expect("decode png").to_rgba8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.get_pixel(2, 1).0, [255, 0, 0, 255]);
    }
}
