use std::path::Path;

use image::{ImageReader, RgbaImage};

use crate::error::{BackendError, BackendResult};

/// Decodes the image file at `path` to RGBA8, rejecting images whose sides
/// exceed `max` pixels. The format is taken from the file contents.
pub(super) fn decode_rgba(path: &Path, max: u32) -> BackendResult<RgbaImage> {
    let decode_err = |reason: String| BackendError::Decode { path: path.to_path_buf(), reason };

    let reader = ImageReader::open(path)
        .map_err(|_| BackendError::NotFound(path.to_path_buf()))?
        .with_guessed_format()
        .map_err(|e| decode_err(e.to_string()))?;

    let image = reader.decode().map_err(|e| decode_err(e.to_string()))?;
    if image.width() > max || image.height() > max {
        return Err(decode_err(format!(
            "{}x{} exceeds the {max}px texture limit",
            image.width(),
            image.height()
        )));
    }

    Ok(image.to_rgba8())
}
