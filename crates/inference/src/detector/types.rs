use base::Rect;

/// One detected object in frame pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: Rect<f32>,
    pub class_id: usize,
    pub label: String,
    pub confidence: f32,
}
