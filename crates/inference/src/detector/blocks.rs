// YOLOv8 building blocks
// Ported from HuggingFace candle-examples/yolo-v8
// Source: https://github.com/huggingface/candle/tree/main/candle-examples/examples/yolo-v8
// License: Apache-2.0 OR MIT

use candle_core::{Result, Tensor};
use candle_nn::{Conv2d, Conv2dConfig, Module, VarBuilder, batch_norm, conv2d_no_bias};

/// Conv2d (same padding) + BatchNorm + SiLU.
#[derive(Debug)]
pub struct ConvBlock {
    conv: Conv2d,
    bn: candle_nn::BatchNorm,
}

impl ConvBlock {
    pub fn load(vb: VarBuilder, c1: usize, c2: usize, k: usize, stride: usize) -> Result<Self> {
        let config = Conv2dConfig {
            stride,
            padding: k / 2,
            ..Default::default()
        };
        let conv = conv2d_no_bias(c1, c2, k, config, vb.pp("conv"))?;
        let bn = batch_norm(c2, 1e-3, vb.pp("bn"))?;
        Ok(Self { conv, bn })
    }
}

impl Module for ConvBlock {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        xs.apply(&self.conv)?.apply_t(&self.bn, false)?.silu()
    }
}

#[derive(Debug)]
struct Bottleneck {
    cv1: ConvBlock,
    cv2: ConvBlock,
    residual: bool,
}

impl Bottleneck {
    fn load(vb: VarBuilder, c: usize, shortcut: bool) -> Result<Self> {
        Ok(Self {
            cv1: ConvBlock::load(vb.pp("cv1"), c, c, 3, 1)?,
            cv2: ConvBlock::load(vb.pp("cv2"), c, c, 3, 1)?,
            residual: shortcut,
        })
    }
}

impl Module for Bottleneck {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let ys = xs.apply(&self.cv1)?.apply(&self.cv2)?;
        if self.residual { ys + xs } else { Ok(ys) }
    }
}

/// CSP block with two convolutions and `n` bottlenecks.
#[derive(Debug)]
pub struct C2f {
    cv1: ConvBlock,
    cv2: ConvBlock,
    bottlenecks: Vec<Bottleneck>,
}

impl C2f {
    pub fn load(vb: VarBuilder, c1: usize, c2: usize, n: usize, shortcut: bool) -> Result<Self> {
        let hidden = c2 / 2;
        let cv1 = ConvBlock::load(vb.pp("cv1"), c1, 2 * hidden, 1, 1)?;
        let cv2 = ConvBlock::load(vb.pp("cv2"), (2 + n) * hidden, c2, 1, 1)?;
        let bottlenecks = (0..n)
            .map(|i| Bottleneck::load(vb.pp(format!("bottleneck.{i}")), hidden, shortcut))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            cv1,
            cv2,
            bottlenecks,
        })
    }
}

impl Module for C2f {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let halves = xs.apply(&self.cv1)?.chunk(2, 1)?;
        let mut last = halves[1].clone();
        let mut ys = halves;
        for bottleneck in &self.bottlenecks {
            last = last.apply(bottleneck)?;
            ys.push(last.clone());
        }
        Tensor::cat(&ys, 1)?.apply(&self.cv2)
    }
}

/// Spatial pyramid pooling, fast variant: three chained k×k max pools.
#[derive(Debug)]
pub struct Sppf {
    cv1: ConvBlock,
    cv2: ConvBlock,
    k: usize,
}

impl Sppf {
    pub fn load(vb: VarBuilder, c1: usize, c2: usize, k: usize) -> Result<Self> {
        let hidden = c1 / 2;
        Ok(Self {
            cv1: ConvBlock::load(vb.pp("cv1"), c1, hidden, 1, 1)?,
            cv2: ConvBlock::load(vb.pp("cv2"), hidden * 4, c2, 1, 1)?,
            k,
        })
    }

    fn pool(&self, xs: &Tensor) -> Result<Tensor> {
        let pad = self.k / 2;
        xs.pad_with_same(2, pad, pad)?
            .pad_with_same(3, pad, pad)?
            .max_pool2d_with_stride(self.k, 1)
    }
}

impl Module for Sppf {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let x0 = xs.apply(&self.cv1)?;
        let x1 = self.pool(&x0)?;
        let x2 = self.pool(&x1)?;
        let x3 = self.pool(&x2)?;
        Tensor::cat(&[&x0, &x1, &x2, &x3], 1)?.apply(&self.cv2)
    }
}

/// Nearest-neighbour 2x upsampling.
#[derive(Debug, Default)]
pub struct Upsample;

impl Module for Upsample {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let (_b, _c, h, w) = xs.dims4()?;
        xs.upsample_nearest2d(h * 2, w * 2)
    }
}

/// Distribution focal loss decoding: expected value of each of the four
/// box-side distributions.
#[derive(Debug)]
pub struct Dfl {
    conv: Conv2d,
    bins: usize,
}

impl Dfl {
    pub fn load(vb: VarBuilder, bins: usize) -> Result<Self> {
        let conv = conv2d_no_bias(bins, 1, 1, Default::default(), vb.pp("conv"))?;
        Ok(Self { conv, bins })
    }
}

impl Module for Dfl {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        // [b, 4*bins, a] -> [b, bins, 4, a], softmax over bins, weighted sum
        let (b, _c, a) = xs.dims3()?;
        let xs = xs.reshape((b, 4, self.bins, a))?.transpose(2, 1)?;
        let xs = candle_nn::ops::softmax(&xs, 1)?;
        xs.apply(&self.conv)?.reshape((b, 4, a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn zeros(shape: &[usize]) -> Tensor {
        Tensor::zeros(shape, DType::F32, &Device::Cpu).unwrap()
    }

    #[test]
    fn test_conv_block_keeps_spatial_size() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let block = ConvBlock::load(vb, 3, 16, 3, 1).unwrap();
        assert_eq!(block.forward(&zeros(&[1, 3, 32, 32])).unwrap().dims(), &[1, 16, 32, 32]);
    }

    #[test]
    fn test_conv_block_stride_halves() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let block = ConvBlock::load(vb, 3, 16, 3, 2).unwrap();
        assert_eq!(block.forward(&zeros(&[1, 3, 32, 32])).unwrap().dims(), &[1, 16, 16, 16]);
    }

    #[test]
    fn test_c2f_shape() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let block = C2f::load(vb, 32, 64, 2, true).unwrap();
        assert_eq!(block.forward(&zeros(&[1, 32, 16, 16])).unwrap().dims(), &[1, 64, 16, 16]);
    }

    #[test]
    fn test_sppf_shape() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let block = Sppf::load(vb, 64, 64, 5).unwrap();
        assert_eq!(block.forward(&zeros(&[1, 64, 8, 8])).unwrap().dims(), &[1, 64, 8, 8]);
    }

    #[test]
    fn test_upsample_doubles() {
        assert_eq!(Upsample.forward(&zeros(&[1, 8, 4, 6])).unwrap().dims(), &[1, 8, 8, 12]);
    }

    #[test]
    fn test_dfl_shape() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let dfl = Dfl::load(vb, 16).unwrap();
        assert_eq!(dfl.forward(&zeros(&[1, 64, 100])).unwrap().dims(), &[1, 4, 100]);
    }
}
