use {
    crate::{InferError, ObjectDetector},
    base::log,
    candle_core::Device,
    std::path::Path,
};

/// Device handle for local models.
#[derive(Debug, Clone)]
pub struct Inference {
    device: Device,
}

impl Inference {
    pub fn cpu() -> Result<Self, InferError> {
        log::info!("inference device: CPU");
        Ok(Self {
            device: Device::Cpu,
        })
    }

    #[cfg(feature = "cuda")]
    pub fn cuda(ordinal: usize) -> Result<Self, InferError> {
        let device = Device::new_cuda(ordinal)?;
        if device.is_cuda() {
            log::info!("inference device: CUDA (ordinal {ordinal})");
        } else {
            log::warn!("requested CUDA ordinal {ordinal} but device reports non-CUDA");
        }
        Ok(Self { device })
    }

    /// Load a YOLOv8 detection model from safetensors. `labels` names the
    /// classes in model order.
    pub fn use_object_detector(
        &self,
        model_path: impl AsRef<Path>,
        labels: Vec<String>,
    ) -> Result<ObjectDetector, InferError> {
        ObjectDetector::new(model_path, labels, self.device.clone())
    }
}
