use roost_core::{AssetKind, HostError, HostResult};

/// Classify an incoming asset into a content kind.
///
/// MIME type wins when it maps to a hosted kind; the filename extension is
/// the fallback for payloads that arrive without a usable content type.
/// Anything unclassifiable is rejected; the router has nowhere to put it.
pub fn classify(content_type: Option<&str>, filename: Option<&str>) -> HostResult<AssetKind> {
    if let Some(kind) = content_type.and_then(AssetKind::from_mime) {
        return Ok(kind);
    }
    if let Some(kind) = filename.and_then(AssetKind::from_filename) {
        return Ok(kind);
    }
    Err(HostError::unsupported_media(
        content_type.unwrap_or("unknown"),
    ))
}
