use crate::error::{IdentifyError, Result};
use base64::Engine;

/// Decodes an upload sent by the front end: either bare base64 or a
/// `data:<mime>;base64,<payload>` URL as produced by `FileReader`.
pub fn decode_upload(payload: &str) -> Result<Vec<u8>> {
    let payload = payload.trim();
    let encoded = match payload.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| IdentifyError::Decode("malformed data URL".into()))?;
            if !header.ends_with(";base64") {
                return Err(IdentifyError::Decode(
                    "data URL is not base64 encoded".into(),
                ));
            }
            data
        }
        None => payload,
    };

    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| IdentifyError::Decode(format!("invalid base64 payload: {}", e)))
}
