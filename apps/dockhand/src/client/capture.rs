//! Best-effort side-channel capture attached to active-phase turns.

use arboard::{Clipboard, Error as ClipboardError};
use async_trait::async_trait;
use base64::Engine;
use thiserror::Error;
use tracing::{debug, warn};

/// Upper bound on the encoded PNG before it is base64 wrapped.
pub const MAX_SNAPSHOT_BYTES: usize = 5 * 1024 * 1024;

/// Produces an optional data URL. Failures are reported as `None`.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn capture(&self) -> Option<String>;
}

/// Never attaches anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSnapshot;

#[async_trait]
impl SnapshotSource for NoSnapshot {
    async fn capture(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("no image on the clipboard")]
    NotAvailable,
    #[error("image is {bytes} bytes, limit is {max_bytes}")]
    TooLarge { bytes: usize, max_bytes: usize },
    #[error("clipboard error: {0}")]
    Clipboard(String),
    #[error("encode error: {0}")]
    Encode(String),
}

/// Attaches whatever image currently sits on the system clipboard.
#[derive(Debug, Clone, Copy)]
pub struct ClipboardSnapshot {
    max_bytes: usize,
}

impl Default for ClipboardSnapshot {
    fn default() -> Self {
        Self {
            max_bytes: MAX_SNAPSHOT_BYTES,
        }
    }
}

#[async_trait]
impl SnapshotSource for ClipboardSnapshot {
    async fn capture(&self) -> Option<String> {
        let max_bytes = self.max_bytes;
        let result = tokio::task::spawn_blocking(move || read_clipboard_image(max_bytes)).await;
        match result {
            Ok(Ok(data_url)) => {
                debug!(target: "dockhand::capture", bytes = data_url.len(), "attached clipboard image");
                Some(data_url)
            }
            Ok(Err(SnapshotError::NotAvailable)) => None,
            Ok(Err(err)) => {
                warn!(target: "dockhand::capture", error = %err, "clipboard capture failed");
                None
            }
            Err(err) => {
                warn!(target: "dockhand::capture", error = %err, "clipboard capture task failed");
                None
            }
        }
    }
}

fn read_clipboard_image(max_bytes: usize) -> Result<String, SnapshotError> {
    let mut clipboard =
        Clipboard::new().map_err(|err| SnapshotError::Clipboard(err.to_string()))?;
    let image = match clipboard.get_image() {
        Ok(image) => image,
        Err(ClipboardError::ContentNotAvailable) => return Err(SnapshotError::NotAvailable),
        Err(err) => return Err(SnapshotError::Clipboard(err.to_string())),
    };
    let encoded = encode_png_rgba(image.width, image.height, image.bytes.as_ref())?;
    png_data_url(&encoded, max_bytes)
}

pub(crate) fn png_data_url(png: &[u8], max_bytes: usize) -> Result<String, SnapshotError> {
    if png.len() > max_bytes {
        return Err(SnapshotError::TooLarge {
            bytes: png.len(),
            max_bytes,
        });
    }
    Ok(format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    ))
}

pub(crate) fn encode_png_rgba(
    width: usize,
    height: usize,
    rgba: &[u8],
) -> Result<Vec<u8>, SnapshotError> {
    let width = u32::try_from(width)
        .map_err(|_| SnapshotError::Encode("image width is too large".to_string()))?;
    let height = u32::try_from(height)
        .map_err(|_| SnapshotError::Encode("image height is too large".to_string()))?;
    let mut bytes = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut bytes, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder
            .write_header()
            .map_err(|err| SnapshotError::Encode(format!("failed to write PNG header: {err}")))?;
        writer
            .write_image_data(rgba)
            .map_err(|err| SnapshotError::Encode(format!("failed to encode PNG bytes: {err}")))?;
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_single_pixel_as_png_data_url() {
        let png = encode_png_rgba(1, 1, &[255, 0, 0, 255]).expect("encode");
        assert_eq!(&png[1..4], b"PNG");
        let url = png_data_url(&png, MAX_SNAPSHOT_BYTES).expect("url");
        assert!(url.starts_with("data:image/png;base64,iVBORw0KGgo"));
    }

    #[test]
    fn rejects_oversized_images() {
        let png = encode_png_rgba(2, 2, &[0; 16]).expect("encode");
        match png_data_url(&png, 8) {
            Err(SnapshotError::TooLarge { bytes, max_bytes }) => {
                assert_eq!(bytes, png.len());
                assert_eq!(max_bytes, 8);
            }
            other => panic!("expected TooLarge, got {other:?}"),
        }
    }

    #[test]
    fn mismatched_buffer_fails_to_encode() {
        assert!(matches!(
            encode_png_rgba(4, 4, &[0; 3]),
            Err(SnapshotError::Encode(_))
        ));
    }

    #[tokio::test]
    async fn no_snapshot_is_always_empty() {
        assert_eq!(NoSnapshot.capture().await, None);
    }
}
