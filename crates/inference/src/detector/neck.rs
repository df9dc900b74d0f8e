// YOLOv8 feature pyramid neck
// Ported from HuggingFace candle-examples/yolo-v8
// Source: https://github.com/huggingface/candle/tree/main/candle-examples/examples/yolo-v8
// License: Apache-2.0 OR MIT

use {
    super::{C2f, ConvBlock, Multiples, Upsample},
    candle_core::{Result, Tensor},
    candle_nn::{Module, VarBuilder},
};

#[derive(Debug)]
pub struct YoloV8Neck {
    n1: C2f,
    n2: C2f,
    n3: ConvBlock,
    n4: C2f,
    n5: ConvBlock,
    n6: C2f,
}

impl YoloV8Neck {
    pub fn load(vb: VarBuilder, m: &Multiples) -> Result<Self> {
        let [c3, c4, c5] = m.filters();
        let n = m.n_short();
        Ok(Self {
            n1: C2f::load(vb.pp("n1"), c4 + c5, c4, n, false)?,
            n2: C2f::load(vb.pp("n2"), c3 + c4, c3, n, false)?,
            n3: ConvBlock::load(vb.pp("n3"), c3, c3, 3, 2)?,
            n4: C2f::load(vb.pp("n4"), c3 + c4, c4, n, false)?,
            n5: ConvBlock::load(vb.pp("n5"), c4, c4, 3, 2)?,
            n6: C2f::load(vb.pp("n6"), c4 + c5, c5, n, false)?,
        })
    }

    /// Fuse top-down then bottom-up; returns the three head inputs.
    pub fn forward(&self, p3: &Tensor, p4: &Tensor, p5: &Tensor) -> Result<(Tensor, Tensor, Tensor)> {
        let x = Tensor::cat(&[&Upsample.forward(p5)?, p4], 1)?.apply(&self.n1)?;
        let head1 = Tensor::cat(&[&Upsample.forward(&x)?, p3], 1)?.apply(&self.n2)?;
        let head2 = Tensor::cat(&[&head1.apply(&self.n3)?, &x], 1)?.apply(&self.n4)?;
        let head3 = Tensor::cat(&[&head2.apply(&self.n5)?, p5], 1)?.apply(&self.n6)?;
        Ok((head1, head2, head3))
    }
}
