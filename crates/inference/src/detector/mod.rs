// YOLOv8 object detection
// Ported from HuggingFace candle-examples/yolo-v8
// Source: https://github.com/huggingface/candle/tree/main/candle-examples/examples/yolo-v8
// License: Apache-2.0 OR MIT

mod backbone;
mod blocks;
mod head;
mod neck;
mod object_detector;
mod postprocess;
mod types;

pub use blocks::{C2f, ConvBlock, Dfl, Sppf, Upsample};
pub use head::{dist2bbox, make_anchors};
pub use object_detector::ObjectDetector;
pub use postprocess::{nms, postprocess};
pub use types::Detection;

use {
    crate::InferError,
    backbone::DarkNet,
    candle_core::{Result, Tensor},
    candle_nn::{Module, VarBuilder},
    head::DetectionHead,
    image::{Image, PixelFormat},
    neck::YoloV8Neck,
};

/// Anything that finds labeled regions in a frame.
#[allow(async_fn_in_trait)]
pub trait Detector {
    /// Channel order the detector expects its input in.
    fn color_order(&self) -> PixelFormat {
        PixelFormat::Rgb8
    }

    /// Detections in frame coordinates, best first.
    async fn detect(&self, image: Image) -> std::result::Result<Vec<Detection>, InferError>;
}

/// Depth, width and ratio multipliers of a model size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Multiples {
    pub depth: f64,
    pub width: f64,
    pub ratio: f64,
}

impl Multiples {
    pub fn n() -> Self {
        Self { depth: 0.33, width: 0.25, ratio: 2.0 }
    }

    pub fn s() -> Self {
        Self { depth: 0.33, width: 0.50, ratio: 2.0 }
    }

    pub fn m() -> Self {
        Self { depth: 0.67, width: 0.75, ratio: 1.5 }
    }

    pub fn l() -> Self {
        Self { depth: 1.00, width: 1.00, ratio: 1.0 }
    }

    pub fn x() -> Self {
        Self { depth: 1.00, width: 1.25, ratio: 1.0 }
    }

    /// Pick the size whose first conv has `out_channels` filters.
    pub fn from_stem_channels(out_channels: usize) -> Option<Self> {
        [Self::n(), Self::s(), Self::m(), Self::l(), Self::x()]
            .into_iter()
            .find(|m| (64.0 * m.width) as usize == out_channels)
    }

    /// Channels of the P3, P4 and P5 feature maps.
    pub fn filters(&self) -> [usize; 3] {
        [
            (256.0 * self.width) as usize,
            (512.0 * self.width) as usize,
            (512.0 * self.width * self.ratio) as usize,
        ]
    }

    pub fn n_short(&self) -> usize {
        (3.0 * self.depth).round() as usize
    }

    pub fn n_long(&self) -> usize {
        (6.0 * self.depth).round() as usize
    }
}

/// Backbone, neck and detection head.
#[derive(Debug)]
pub struct YoloV8 {
    net: DarkNet,
    fpn: YoloV8Neck,
    head: DetectionHead,
}

impl YoloV8 {
    pub fn load(vb: VarBuilder, m: Multiples, num_classes: usize) -> Result<Self> {
        Ok(Self {
            net: DarkNet::load(vb.pp("net"), &m)?,
            fpn: YoloV8Neck::load(vb.pp("fpn"), &m)?,
            head: DetectionHead::load(vb.pp("head"), num_classes, &m.filters())?,
        })
    }

    pub fn num_classes(&self) -> usize {
        self.head.num_classes()
    }
}

impl Module for YoloV8 {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let (p3, p4, p5) = self.net.forward(xs)?;
        let (h1, h2, h3) = self.fpn.forward(&p3, &p4, &p5)?;
        self.head.forward(&[h1, h2, h3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    #[test]
    fn test_filters() {
        assert_eq!(Multiples::n().filters(), [64, 128, 256]);
        assert_eq!(Multiples::s().filters(), [128, 256, 512]);
        assert_eq!(Multiples::x().filters(), [320, 640, 640]);
    }

    #[test]
    fn test_from_stem_channels() {
        assert_eq!(Multiples::from_stem_channels(16), Some(Multiples::n()));
        assert_eq!(Multiples::from_stem_channels(48), Some(Multiples::m()));
        assert_eq!(Multiples::from_stem_channels(80), Some(Multiples::x()));
        assert_eq!(Multiples::from_stem_channels(20), None);
    }

    #[test]
    fn test_forward_nano_two_classes() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let model = YoloV8::load(vb, Multiples::n(), 2).unwrap();
        assert_eq!(model.num_classes(), 2);

        let input = Tensor::zeros(&[1, 3, 320, 320], DType::F32, &device).unwrap();
        let output = model.forward(&input).unwrap();
        // 40*40 + 20*20 + 10*10 anchors, 4 box values + 2 classes
        assert_eq!(output.dims(), &[1, 6, 2100]);
    }

    #[test]
    fn test_forward_non_square_input() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let model = YoloV8::load(vb, Multiples::n(), 3).unwrap();

        let input = Tensor::zeros(&[1, 3, 64, 128], DType::F32, &device).unwrap();
        let output = model.forward(&input).unwrap();
        // 8*16 + 4*8 + 2*4
        assert_eq!(output.dims(), &[1, 7, 168]);
    }
}
