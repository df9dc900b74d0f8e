use {
    base::{Rect, Vec2},
    image::{Image, ImageError, PixelFormat, draw_rect, draw_text, fill_rect, text_height, text_width},
    inference::{Detection, Detector, InferError},
    std::fmt,
};

#[derive(Debug)]
pub enum AnnotateError {
    /// The frame could not be brought into the detector's color order.
    Format(ImageError),
    Inference(InferError),
}

impl fmt::Display for AnnotateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotateError::Format(error) => write!(f, "frame format: {error}"),
            AnnotateError::Inference(error) => write!(f, "detection failed: {error}"),
        }
    }
}

impl std::error::Error for AnnotateError {}

impl From<ImageError> for AnnotateError {
    fn from(error: ImageError) -> Self {
        AnnotateError::Format(error)
    }
}

impl From<InferError> for AnnotateError {
    fn from(error: InferError) -> Self {
        AnnotateError::Inference(error)
    }
}

const PALETTE: [[u8; 3]; 10] = [
    [0xFF, 0x38, 0x38],
    [0x48, 0xF9, 0x0A],
    [0xFF, 0x70, 0x1F],
    [0x00, 0xC2, 0xFF],
    [0xFF, 0xB2, 0x1D],
    [0x34, 0x45, 0xFF],
    [0xCF, 0xD2, 0x31],
    [0x92, 0xCC, 0x17],
    [0xFF, 0x37, 0xC7],
    [0x1A, 0x93, 0x34],
];

const TEXT_COLOR: [u8; 3] = [0xFF, 0xFF, 0xFF];

pub fn class_color(class_id: usize) -> [u8; 3] {
    PALETTE[class_id % PALETTE.len()]
}

/// Run `detector` on `frame` and draw every detection at or above
/// `confidence_floor`. The result is always Rgb8; a frame without surviving
/// detections comes back pixel-identical.
pub async fn annotate<D: Detector>(
    detector: &D,
    frame: Image,
    confidence_floor: f32,
) -> Result<Image, AnnotateError> {
    let mut frame = frame.to_format(PixelFormat::Rgb8)?;
    let input = frame.to_format(detector.color_order())?;
    let detections: Vec<Detection> = detector
        .detect(input)
        .await?
        .into_iter()
        .filter(|detection| detection.confidence >= confidence_floor)
        .collect();
    draw_detections(&mut frame, &detections);
    Ok(frame)
}

/// Labeled boxes, one color per class.
pub fn draw_detections(frame: &mut Image, detections: &[Detection]) {
    let scale = if frame.width() >= 320 { 2 } else { 1 };
    let thickness = scale;
    for detection in detections {
        let color = class_color(detection.class_id);
        let min = detection.bbox.min();
        let max = detection.bbox.max();
        let bbox = Rect::from_min_max(
            Vec2::new(min.x.round() as i32, min.y.round() as i32),
            Vec2::new(max.x.round() as i32, max.y.round() as i32),
        );
        draw_rect(frame, bbox, thickness, color);

        let label = format!("{} {:.2}", detection.label, detection.confidence);
        let pad = scale;
        let strip_height = text_height(scale) + 2 * pad;
        // above the box when there is room, inside it otherwise
        let strip_top = if bbox.origin.y >= strip_height {
            bbox.origin.y - strip_height
        } else {
            bbox.origin.y
        };
        let strip = Rect::new(
            Vec2::new(bbox.origin.x, strip_top),
            Vec2::new(text_width(&label, scale) + 2 * pad, strip_height),
        );
        fill_rect(frame, strip, color);
        draw_text(frame, bbox.origin.x + pad, strip_top + pad, &label, scale, TEXT_COLOR);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(width: usize, height: usize) -> Image {
        Image::new(
            Vec2::new(width, height),
            vec![90; width * height * 3],
            PixelFormat::Rgb8,
        )
    }

    fn detection(confidence: f32) -> Detection {
        Detection {
            bbox: Rect::new(Vec2::new(10.0, 20.0), Vec2::new(30.0, 30.0)),
            class_id: 0,
            label: "ripe".to_string(),
            confidence,
        }
    }

    fn pixel(frame: &Image, x: usize, y: usize) -> [u8; 3] {
        let offset = (y * frame.width() + x) * 3;
        [frame.data[offset], frame.data[offset + 1], frame.data[offset + 2]]
    }

    #[test]
    fn test_draw_outlines_box_in_class_color() {
        let mut frame = gray(64, 64);
        draw_detections(&mut frame, &[detection(0.9)]);
        assert_eq!(pixel(&frame, 25, 49), class_color(0));
        // interior is untouched
        assert_eq!(pixel(&frame, 25, 40), [90, 90, 90]);
    }

    #[test]
    fn test_draw_nothing_leaves_frame() {
        let mut frame = gray(16, 16);
        let before = frame.clone();
        draw_detections(&mut frame, &[]);
        assert_eq!(frame, before);
    }

    #[test]
    fn test_palette_wraps() {
        assert_eq!(class_color(0), class_color(PALETTE.len()));
        assert_ne!(class_color(0), class_color(1));
    }
}
