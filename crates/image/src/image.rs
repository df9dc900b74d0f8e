use {
    crate::*,
    base::Vec2,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub size: Vec2<usize>,
    pub data: Vec<u8>,
    pub format: PixelFormat,
}

impl Image {
    pub fn new(size: Vec2<usize>, data: Vec<u8>, format: PixelFormat) -> Self {
        Self { size, data, format }
    }

    pub fn width(&self) -> usize {
        self.size.x
    }

    pub fn height(&self) -> usize {
        self.size.y
    }

    /// Non-empty, and for raw formats the buffer holds exactly w*h pixels.
    pub fn is_valid(&self) -> bool {
        if self.size.x == 0 || self.size.y == 0 || self.data.is_empty() {
            return false;
        }
        match self.format.channels() {
            Some(channels) => self.data.len() == self.size.x * self.size.y * channels,
            None => true,
        }
    }

    /// Convert between the raw channel orders. Only Rgb8 and Bgr8 are
    /// interchangeable here; JPEG goes through `jpeg_to_rgb`.
    pub fn to_format(&self, format: PixelFormat) -> Result<Image, ImageError> {
        if self.format == format {
            return Ok(self.clone());
        }
        match (self.format, format) {
            (PixelFormat::Rgb8, PixelFormat::Bgr8) | (PixelFormat::Bgr8, PixelFormat::Rgb8) => {
                let mut data = self.data.clone();
                for pixel in data.chunks_exact_mut(3) {
                    pixel.swap(0, 2);
                }
                Ok(Image::new(self.size, data, format))
            }
            (from, to) => Err(ImageError::Encode(format!(
                "cannot convert {from:?} to {to:?}"
            ))),
        }
    }
}
