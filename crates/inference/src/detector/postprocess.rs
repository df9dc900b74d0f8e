use {
    super::Detection,
    base::{Rect, Vec2},
    candle_core::{Result, Tensor},
    std::collections::VecDeque,
};

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Greedy non-maximum suppression. Returns indices of the kept boxes, highest
/// score first.
pub fn nms(boxes: &[(Rect<f32>, f32)], iou_threshold: f32) -> Vec<usize> {
    let mut order: Vec<usize> = (0..boxes.len()).collect();
    order.sort_by(|&a, &b| boxes[b].1.total_cmp(&boxes[a].1));
    let mut remaining: VecDeque<usize> = order.into();

    let mut keep = Vec::new();
    while let Some(best) = remaining.pop_front() {
        keep.push(best);
        remaining.retain(|&other| boxes[best].0.iou(boxes[other].0) < iou_threshold);
    }
    keep
}

struct Candidate {
    bbox: Rect<f32>,
    class_id: usize,
    confidence: f32,
}

/// Turn raw head output `[1, 4 + nc, anchors]` into detections in frame
/// coordinates. Each anchor votes for its best class; suppression runs per
/// class so overlapping objects of different classes both survive.
pub fn postprocess(
    pred: &Tensor,
    frame_size: Vec2<usize>,
    model_size: Vec2<usize>,
    labels: &[String],
    conf_threshold: f32,
    nms_threshold: f32,
) -> Result<Vec<Detection>> {
    let pred = pred.squeeze(0)?.to_vec2::<f32>()?;
    let rows = pred.len();
    if rows <= 4 {
        return Ok(Vec::new());
    }
    let num_classes = rows - 4;
    let anchors = pred[0].len();

    let mut by_class: Vec<Vec<Candidate>> = (0..num_classes).map(|_| Vec::new()).collect();
    for col in 0..anchors {
        let (class_id, logit) = (0..num_classes)
            .map(|c| (c, pred[4 + c][col]))
            .fold((0, f32::NEG_INFINITY), |best, next| if next.1 > best.1 { next } else { best });
        let confidence = sigmoid(logit);
        if confidence < conf_threshold {
            continue;
        }
        let (cx, cy, w, h) = (pred[0][col], pred[1][col], pred[2][col], pred[3][col]);
        by_class[class_id].push(Candidate {
            bbox: Rect::from_min_max(
                Vec2::new(cx - w / 2.0, cy - h / 2.0),
                Vec2::new(cx + w / 2.0, cy + h / 2.0),
            ),
            class_id,
            confidence,
        });
    }

    let scale = Vec2::new(
        frame_size.x as f32 / model_size.x as f32,
        frame_size.y as f32 / model_size.y as f32,
    );
    let frame_w = frame_size.x as f32;
    let frame_h = frame_size.y as f32;

    let mut detections = Vec::new();
    for candidates in by_class {
        let boxes: Vec<(Rect<f32>, f32)> =
            candidates.iter().map(|c| (c.bbox, c.confidence)).collect();
        for index in nms(&boxes, nms_threshold) {
            let candidate = &candidates[index];
            let min = Vec2::new(
                (candidate.bbox.origin.x * scale.x).clamp(0.0, frame_w),
                (candidate.bbox.origin.y * scale.y).clamp(0.0, frame_h),
            );
            let max = Vec2::new(
                (candidate.bbox.max().x * scale.x).clamp(0.0, frame_w),
                (candidate.bbox.max().y * scale.y).clamp(0.0, frame_h),
            );
            detections.push(Detection {
                bbox: Rect::from_min_max(min, max),
                class_id: candidate.class_id,
                label: labels
                    .get(candidate.class_id)
                    .cloned()
                    .unwrap_or_else(|| format!("class{}", candidate.class_id)),
                confidence: candidate.confidence,
            });
        }
    }
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    Ok(detections)
}
