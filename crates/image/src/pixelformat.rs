#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb8,
    Bgr8,
    Jpeg,
}

impl PixelFormat {
    /// Bytes per pixel, `None` for compressed formats.
    pub fn channels(&self) -> Option<usize> {
        match self {
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => Some(3),
            PixelFormat::Jpeg => None,
        }
    }
}
