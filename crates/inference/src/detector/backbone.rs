// YOLOv8 DarkNet backbone
// Ported from HuggingFace candle-examples/yolo-v8
// Source: https://github.com/huggingface/candle/tree/main/candle-examples/examples/yolo-v8
// License: Apache-2.0 OR MIT

use {
    super::{C2f, ConvBlock, Multiples, Sppf},
    candle_core::{Result, Tensor},
    candle_nn::VarBuilder,
};

/// Feature extractor producing the stride 8, 16 and 32 maps.
#[derive(Debug)]
pub struct DarkNet {
    stem: [ConvBlock; 2],
    p3: (C2f, ConvBlock, C2f),
    p4: (ConvBlock, C2f),
    p5: (ConvBlock, C2f, Sppf),
}

impl DarkNet {
    pub fn load(vb: VarBuilder, m: &Multiples) -> Result<Self> {
        let c1 = (64.0 * m.width) as usize;
        let c2 = (128.0 * m.width) as usize;
        let [c3, c4, c5] = m.filters();

        let stem = [
            ConvBlock::load(vb.pp("b1.0"), 3, c1, 3, 2)?,
            ConvBlock::load(vb.pp("b1.1"), c1, c2, 3, 2)?,
        ];
        let p3 = (
            C2f::load(vb.pp("b2.0"), c2, c2, m.n_short(), true)?,
            ConvBlock::load(vb.pp("b2.1"), c2, c3, 3, 2)?,
            C2f::load(vb.pp("b2.2"), c3, c3, m.n_long(), true)?,
        );
        let p4 = (
            ConvBlock::load(vb.pp("b3.0"), c3, c4, 3, 2)?,
            C2f::load(vb.pp("b3.1"), c4, c4, m.n_long(), true)?,
        );
        let p5 = (
            ConvBlock::load(vb.pp("b4.0"), c4, c5, 3, 2)?,
            C2f::load(vb.pp("b4.1"), c5, c5, m.n_short(), true)?,
            Sppf::load(vb.pp("b5.0"), c5, c5, 5)?,
        );
        Ok(Self { stem, p3, p4, p5 })
    }

    pub fn forward(&self, xs: &Tensor) -> Result<(Tensor, Tensor, Tensor)> {
        let xs = xs.apply(&self.stem[0])?.apply(&self.stem[1])?;
        let p3 = xs.apply(&self.p3.0)?.apply(&self.p3.1)?.apply(&self.p3.2)?;
        let p4 = p3.apply(&self.p4.0)?.apply(&self.p4.1)?;
        let p5 = p4.apply(&self.p5.0)?.apply(&self.p5.1)?.apply(&self.p5.2)?;
        Ok((p3, p4, p5))
    }
}
