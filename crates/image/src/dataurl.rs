use {
    crate::*,
    base64::{Engine as _, engine::general_purpose::STANDARD as BASE64},
};

pub const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Preview-grade quality used for outgoing frames.
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Split a `data:image/<type>;base64,<body>` URL and return the body.
pub fn split_data_url(encoded: &str) -> Result<&str, ImageError> {
    let (header, body) = encoded
        .split_once(',')
        .ok_or_else(|| ImageError::Header("missing ',' separator".to_string()))?;
    if !header.starts_with("data:image/") {
        return Err(ImageError::Header(format!(
            "expected data:image/ header, got {:?}",
            truncate(header)
        )));
    }
    if !header.split(';').skip(1).any(|param| param == "base64") {
        return Err(ImageError::Header("header does not declare base64".to_string()));
    }
    Ok(body)
}

fn truncate(s: &str) -> &str {
    match s.char_indices().nth(32) {
        Some((index, _)) => &s[..index],
        None => s,
    }
}

/// Data URL text to an Rgb8 frame.
pub fn decode_frame(encoded: &str) -> Result<Image, ImageError> {
    let body = split_data_url(encoded)?;
    let bytes = BASE64.decode(body.trim())?;
    jpeg_to_rgb(&bytes)
}

/// Rgb8 frame to `data:image/jpeg;base64,...` text.
pub fn encode_frame(frame: &Image, quality: u8) -> Result<String, ImageError> {
    let jpeg = rgb_to_jpeg(frame, quality)?;
    let mut encoded = String::with_capacity(JPEG_DATA_URL_PREFIX.len() + jpeg.len() * 4 / 3 + 4);
    encoded.push_str(JPEG_DATA_URL_PREFIX);
    BASE64.encode_string(&jpeg, &mut encoded);
    Ok(encoded)
}

/// `decode_frame` on tokio's blocking pool.
pub async fn decode_frame_async(encoded: String) -> Result<Image, ImageError> {
    tokio::task::spawn_blocking(move || decode_frame(&encoded))
        .await
        .map_err(|e| ImageError::Decode(e.to_string()))?
}

/// `encode_frame` on tokio's blocking pool.
pub async fn encode_frame_async(frame: Image, quality: u8) -> Result<String, ImageError> {
    tokio::task::spawn_blocking(move || encode_frame(&frame, quality))
        .await
        .map_err(|e| ImageError::Encode(e.to_string()))?
}
