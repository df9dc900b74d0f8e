use {
    crate::*,
    base::Vec2,
    crates_image::ImageEncoder,
};

/// Compress a packed Rgb8 image.
pub fn rgb_to_jpeg(image: &Image, quality: u8) -> Result<Vec<u8>, ImageError> {
    if image.format != PixelFormat::Rgb8 {
        return Err(ImageError::Encode(format!(
            "expected Rgb8 format, got {:?}",
            image.format
        )));
    }
    if !image.is_valid() {
        return Err(ImageError::Encode(format!(
            "{} bytes do not describe a {}x{} RGB image",
            image.data.len(),
            image.size.x,
            image.size.y
        )));
    }

    let mut buffer = Vec::new();
    let encoder = crates_image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
    encoder
        .write_image(
            &image.data,
            image.size.x as u32,
            image.size.y as u32,
            crates_image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| ImageError::Encode(e.to_string()))?;
    Ok(buffer)
}

/// Decode any supported compressed image (JPEG, PNG) into Rgb8.
pub fn jpeg_to_rgb(data: &[u8]) -> Result<Image, ImageError> {
    let decoded = crates_image::load_from_memory(data)?.to_rgb8();
    let (width, height) = decoded.dimensions();
    Ok(Image::new(
        Vec2::new(width as usize, height as usize),
        decoded.into_raw(),
        PixelFormat::Rgb8,
    ))
}
