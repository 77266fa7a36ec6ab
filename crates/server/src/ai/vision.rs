//! Image embeddings from a Vision Transformer.
//!
//! Runs an ONNX export of `google/vit-base-patch16-224-in21k` and returns the
//! CLS token of `last_hidden_state` as the image vector. Inference is
//! synchronous; async callers go through `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::Mutex;

use image::DynamicImage;
use image::imageops::FilterType;
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::AiError;

/// Square input resolution expected by the model.
pub const INPUT_SIZE: u32 = 224;

/// Width of the ViT-Base hidden state (and of every embedding it produces).
pub const HIDDEN_SIZE: usize = 768;

/// The ViT image processor normalizes every channel with mean 0.5, std 0.5.
const CHANNEL_MEAN: f32 = 0.5;
const CHANNEL_STD: f32 = 0.5;

/// Produces a fixed-length vector for an image.
pub trait ImageEmbedder: Send + Sync {
    /// Embed a decoded image.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn embed(&self, image: &DynamicImage) -> Result<Vec<f32>, AiError>;

    /// Decode and embed an encoded image (PNG, JPEG, ...).
    ///
    /// # Errors
    ///
    /// Returns `AiError::Image` if the bytes cannot be decoded.
    fn embed_bytes(&self, bytes: &[u8]) -> Result<Vec<f32>, AiError> {
        let image = image::load_from_memory(bytes)?;
        self.embed(&image)
    }

    /// Open and embed an image file.
    ///
    /// # Errors
    ///
    /// Returns `AiError::Image` if the file cannot be opened or decoded.
    fn embed_file(&self, path: &Path) -> Result<Vec<f32>, AiError> {
        let image = image::open(path)?;
        self.embed(&image)
    }
}

/// ViT embedder backed by an ONNX Runtime session.
pub struct VitEmbedder {
    session: Mutex<Session>,
}

impl std::fmt::Debug for VitEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VitEmbedder").finish_non_exhaustive()
    }
}

impl VitEmbedder {
    /// Load the model from an `.onnx` file.
    ///
    /// # Errors
    ///
    /// Returns `AiError::Model` if ONNX Runtime cannot be initialized or the
    /// file is not a loadable model.
    pub fn load(model_path: &Path) -> Result<Self, AiError> {
        let session = Session::builder()
            .map_err(|e| AiError::Model(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| AiError::Model(e.to_string()))?
            .with_intra_threads(4)
            .map_err(|e| AiError::Model(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| AiError::Model(e.to_string()))?;

        tracing::info!(path = %model_path.display(), "ViT model loaded");
        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl ImageEmbedder for VitEmbedder {
    fn embed(&self, image: &DynamicImage) -> Result<Vec<f32>, AiError> {
        let side = INPUT_SIZE as usize;
        let input = Tensor::from_array(([1usize, 3, side, side], preprocess(image).into_boxed_slice()))
            .map_err(|e| AiError::Model(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| AiError::Model("vision session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs!["pixel_values" => input])
            .map_err(|e| AiError::Model(e.to_string()))?;

        let (_name, hidden_state) = outputs
            .iter()
            .next()
            .ok_or_else(|| AiError::Model("model produced no outputs".to_string()))?;

        let (_shape, data) = hidden_state
            .try_extract_tensor::<f32>()
            .map_err(|e| AiError::Model(e.to_string()))?;

        cls_token(data).ok_or_else(|| {
            AiError::Model(format!(
                "hidden state has {} values, expected at least {HIDDEN_SIZE}",
                data.len()
            ))
        })
    }
}

/// Resize to 224x224 and lay out normalized RGB planes (NCHW, batch of one).
#[must_use]
pub fn preprocess(image: &DynamicImage) -> Vec<f32> {
    let rgb = image
        .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Triangle)
        .to_rgb8();

    let plane = (INPUT_SIZE * INPUT_SIZE) as usize;
    let mut red = Vec::with_capacity(plane);
    let mut green = Vec::with_capacity(plane);
    let mut blue = Vec::with_capacity(plane);

    for pixel in rgb.pixels() {
        let [r, g, b] = pixel.0;
        red.push(normalize(r));
        green.push(normalize(g));
        blue.push(normalize(b));
    }

    red.extend(green);
    red.extend(blue);
    red
}

fn normalize(channel: u8) -> f32 {
    (f32::from(channel) / 255.0 - CHANNEL_MEAN) / CHANNEL_STD
}

/// First token of a `[1, tokens, HIDDEN_SIZE]` hidden state.
fn cls_token(hidden_state: &[f32]) -> Option<Vec<f32>> {
    hidden_state.get(..HIDDEN_SIZE).map(<[f32]>::to_vec)
}
