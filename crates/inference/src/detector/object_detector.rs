use {
    super::{Detection, Detector, Multiples, YoloV8, postprocess},
    crate::InferError,
    base::{Vec2, log},
    candle_core::{DType, Device, Module, Tensor},
    image::{Image, PixelFormat},
    std::{fmt, path::Path, sync::Arc},
};

const STEM_KEY: &str = "net.b1.0.conv.weight";
const CLASS_KEY: &str = "head.cv3.0.2.weight";
const MAX_INPUT_SIDE: usize = 640;

/// YOLOv8 object detector. Cheap to clone; clones share the model.
#[derive(Clone)]
pub struct ObjectDetector {
    model: Arc<YoloV8>,
    device: Device,
    labels: Arc<Vec<String>>,
    conf_threshold: f32,
    nms_threshold: f32,
}

impl fmt::Debug for ObjectDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectDetector")
            .field("device", &self.device)
            .field("labels", &self.labels)
            .field("conf_threshold", &self.conf_threshold)
            .field("nms_threshold", &self.nms_threshold)
            .finish()
    }
}

impl ObjectDetector {
    pub(crate) fn new(
        model_path: impl AsRef<Path>,
        labels: Vec<String>,
        device: Device,
    ) -> Result<Self, InferError> {
        let path = model_path.as_ref();
        let (multiples, num_classes) = inspect_weights(path)?;
        if labels.len() != num_classes {
            log::warn!(
                "{} labels given for a model with {num_classes} classes",
                labels.len()
            );
        }

        let weights = unsafe {
            candle_nn::VarBuilder::from_mmaped_safetensors(&[path], DType::F32, &device)?
        };
        let model = YoloV8::load(weights, multiples, num_classes)?;
        log::info!(
            "loaded detector {} ({} classes, width {:.2})",
            path.display(),
            model.num_classes(),
            multiples.width
        );
        Ok(Self::from_model(model, labels, device))
    }

    /// Wrap an already built model.
    pub fn from_model(model: YoloV8, labels: Vec<String>, device: Device) -> Self {
        Self {
            model: Arc::new(model),
            device,
            labels: Arc::new(labels),
            conf_threshold: 0.25,
            nms_threshold: 0.45,
        }
    }

    /// Candidate score threshold and IoU suppression threshold.
    pub fn with_thresholds(mut self, conf: f32, nms: f32) -> Self {
        self.conf_threshold = conf;
        self.nms_threshold = nms;
        self
    }

    /// Run the model on the calling thread.
    pub fn detect_blocking(&self, image: &Image) -> Result<Vec<Detection>, InferError> {
        let (input, model_size) = preprocess(image, &self.device)?;
        let output = self.model.forward(&input)?;
        Ok(postprocess(
            &output,
            image.size,
            model_size,
            &self.labels,
            self.conf_threshold,
            self.nms_threshold,
        )?)
    }
}

impl Detector for ObjectDetector {
    async fn detect(&self, image: Image) -> Result<Vec<Detection>, InferError> {
        let detector = self.clone();
        tokio::task::spawn_blocking(move || detector.detect_blocking(&image))
            .await
            .map_err(|e| InferError::Runtime(format!("inference task failed: {e}")))?
    }
}

/// Model input size for a frame: aspect kept, longest side at most 640,
/// both sides multiples of 32.
pub(crate) fn model_input_size(frame: Vec2<usize>) -> Vec2<usize> {
    let scale = (MAX_INPUT_SIDE as f32 / frame.x.max(frame.y) as f32).min(1.0);
    let fit = |side: usize| ((side as f32 * scale) as usize / 32 * 32).max(32);
    Vec2::new(fit(frame.x), fit(frame.y))
}

/// Rgb8 HWC bytes to a `[1, 3, h, w]` 0-1 tensor at model resolution.
fn preprocess(image: &Image, device: &Device) -> Result<(Tensor, Vec2<usize>), InferError> {
    if image.format != PixelFormat::Rgb8 {
        return Err(InferError::Shape(format!(
            "detector expects Rgb8 input, got {:?}",
            image.format
        )));
    }
    if image.size.x == 0 || image.size.y == 0 {
        return Err(InferError::Shape(format!(
            "image dimensions must be non-zero, got {}x{}",
            image.size.x, image.size.y
        )));
    }
    if !image.is_valid() {
        return Err(InferError::Shape(format!(
            "{} bytes do not describe a {}x{} RGB image",
            image.data.len(),
            image.size.x,
            image.size.y
        )));
    }

    let model_size = model_input_size(image.size);
    let tensor = Tensor::from_vec(image.data.clone(), (image.size.y, image.size.x, 3), device)?
        .to_dtype(DType::F32)?
        .permute((2, 0, 1))?
        .contiguous()?
        .unsqueeze(0)?;
    let tensor = if model_size != image.size {
        tensor.upsample_nearest2d(model_size.y, model_size.x)?
    } else {
        tensor
    };
    Ok(((tensor / 255.0)?, model_size))
}

/// Read model size and class count from the safetensors header without
/// loading the weights.
fn inspect_weights(path: &Path) -> Result<(Multiples, usize), InferError> {
    use safetensors::SafeTensors;

    let file = std::fs::File::open(path)?;
    let mmap = unsafe { memmap2::Mmap::map(&file) }
        .map_err(|e| InferError::Io(format!("failed to memory-map {}: {e}", path.display())))?;
    let tensors = SafeTensors::deserialize(&mmap)
        .map_err(|e| InferError::Io(format!("failed to read safetensors header: {e}")))?;

    let leading_dim = |key: &str| -> Result<usize, InferError> {
        let view = tensors
            .tensor(key)
            .map_err(|e| InferError::Shape(format!("key '{key}' not found in safetensors: {e}")))?;
        view.shape()
            .first()
            .copied()
            .ok_or_else(|| InferError::Shape(format!("'{key}' has an empty shape")))
    };

    let stem = leading_dim(STEM_KEY)?;
    let multiples = Multiples::from_stem_channels(stem).ok_or_else(|| {
        InferError::Shape(format!("unknown model size: first conv has {stem} filters"))
    })?;
    let num_classes = leading_dim(CLASS_KEY)?;
    Ok((multiples, num_classes))
}
