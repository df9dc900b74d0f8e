// YOLOv8 detection head
// Ported from HuggingFace candle-examples/yolo-v8
// Source: https://github.com/huggingface/candle/tree/main/candle-examples/examples/yolo-v8
// License: Apache-2.0 OR MIT

use {
    super::{ConvBlock, Dfl},
    candle_core::{Device, Result, Tensor},
    candle_nn::{Conv2d, Module, VarBuilder, conv2d},
};

const REG_MAX: usize = 16;
const STRIDES: [usize; 3] = [8, 16, 32];

#[derive(Debug)]
struct Branch {
    convs: [ConvBlock; 2],
    out: Conv2d,
}

impl Branch {
    fn load(vb: VarBuilder, c_in: usize, c_hidden: usize, c_out: usize) -> Result<Self> {
        Ok(Self {
            convs: [
                ConvBlock::load(vb.pp("0"), c_in, c_hidden, 3, 1)?,
                ConvBlock::load(vb.pp("1"), c_hidden, c_hidden, 3, 1)?,
            ],
            out: conv2d(c_hidden, c_out, 1, Default::default(), vb.pp("2"))?,
        })
    }
}

impl Module for Branch {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        xs.apply(&self.convs[0])?.apply(&self.convs[1])?.apply(&self.out)
    }
}

/// Box regression (cv2) and class logit (cv3) branches at three scales.
/// Output is `[b, 4 + nc, anchors]`: centre-x, centre-y, width, height in
/// input pixels, then one raw logit per class.
#[derive(Debug)]
pub struct DetectionHead {
    cv2: Vec<Branch>,
    cv3: Vec<Branch>,
    dfl: Dfl,
    nc: usize,
}

impl DetectionHead {
    pub fn load(vb: VarBuilder, nc: usize, filters: &[usize; 3]) -> Result<Self> {
        let c2 = (filters[0] / 4).max(16).max(REG_MAX * 4);
        let c3 = filters[0].max(nc.min(100));
        let mut cv2 = Vec::with_capacity(3);
        let mut cv3 = Vec::with_capacity(3);
        for (i, &f) in filters.iter().enumerate() {
            cv2.push(Branch::load(vb.pp(format!("cv2.{i}")), f, c2, 4 * REG_MAX)?);
            cv3.push(Branch::load(vb.pp(format!("cv3.{i}")), f, c3, nc)?);
        }
        let dfl = Dfl::load(vb.pp("dfl"), REG_MAX)?;
        Ok(Self { cv2, cv3, dfl, nc })
    }

    pub fn num_classes(&self) -> usize {
        self.nc
    }

    pub fn forward(&self, xs: &[Tensor; 3]) -> Result<Tensor> {
        let mut outputs = Vec::with_capacity(3);
        for (i, x) in xs.iter().enumerate() {
            let (b, _c, h, w) = x.dims4()?;
            let boxes = self.cv2[i].forward(x)?.reshape((b, 4 * REG_MAX, h * w))?;
            let logits = self.cv3[i].forward(x)?.reshape((b, self.nc, h * w))?;
            let anchors = make_anchors(h, w, STRIDES[i], x.device())?;
            let boxes = dist2bbox(&self.dfl.forward(&boxes)?, &anchors)?;
            outputs.push(Tensor::cat(&[&boxes, &logits], 1)?);
        }
        Tensor::cat(&outputs, 2)
    }
}

/// Cell centres in input pixels, `[h*w, 2]`.
pub fn make_anchors(h: usize, w: usize, stride: usize, device: &Device) -> Result<Tensor> {
    let mut anchors = Vec::with_capacity(h * w * 2);
    for y in 0..h {
        for x in 0..w {
            anchors.push((x as f32 + 0.5) * stride as f32);
            anchors.push((y as f32 + 0.5) * stride as f32);
        }
    }
    Tensor::from_vec(anchors, (h * w, 2), device)
}

/// Left/top/right/bottom distances around each anchor to centre-size boxes.
pub fn dist2bbox(distance: &Tensor, anchors: &Tensor) -> Result<Tensor> {
    let lt = distance.narrow(1, 0, 2)?;
    let rb = distance.narrow(1, 2, 2)?;
    let anchors = anchors.t()?.unsqueeze(0)?;
    let x1y1 = anchors.broadcast_sub(&lt)?;
    let x2y2 = anchors.broadcast_add(&rb)?;
    let centre = ((&x1y1 + &x2y2)? * 0.5)?;
    let size = (x2y2 - x1y1)?;
    Tensor::cat(&[&centre, &size], 1)
}
