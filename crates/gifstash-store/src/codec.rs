//! Image payload validation.

use std::io::Cursor;

use crate::error::{StoreError, StoreResult};

/// Media type attached to every stored payload when served.
pub const IMAGE_MEDIA_TYPE: &str = "image/gif";

/// Bytes that decoded as a well-formed image.
///
/// The only way to obtain one is [`ImagePayload::decode`], so anything
/// written to the `objects` table has passed validation. The original bytes
/// are kept verbatim; nothing is re-encoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImagePayload(Vec<u8>);

impl ImagePayload {
    /// Validate `data` by decoding the header and the first frame.
    pub fn decode(data: Vec<u8>) -> StoreResult<Self> {
        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::Indexed);
        let mut decoder = options
            .read_info(Cursor::new(data.as_slice()))
            .map_err(|e| StoreError::InvalidContent(e.to_string()))?;
        match decoder.read_next_frame() {
            Ok(Some(_)) => {}
            Ok(None) => return Err(StoreError::InvalidContent("missing image data".into())),
            Err(e) => return Err(StoreError::InvalidContent(e.to_string())),
        }
        drop(decoder);
        Ok(Self(data))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
