use ndarray::{Array1, Array2, ArrayView1, Axis};
use std::path::Path;

use crate::error::Result;

/// An L2-normalised embedding vector.
///
/// Every constructor normalises, so the dot product of two embeddings is
/// their cosine similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding(Array1<f32>);

impl Embedding {
    /// Create a normalised embedding from raw model output
    pub fn new(data: Vec<f32>) -> Self {
        Self(normalize(Array1::from(data)))
    }

    /// Mean of several embeddings, re-normalised.
    ///
    /// Returns `None` for an empty slice or mismatched dimensions.
    pub fn mean(embeddings: &[Embedding]) -> Option<Self> {
        let dim = embeddings.first()?.dim();
        if embeddings.iter().any(|e| e.dim() != dim) {
            return None;
        }

        let mut stacked = Array2::<f32>::zeros((embeddings.len(), dim));
        for (mut row, emb) in stacked.axis_iter_mut(Axis(0)).zip(embeddings) {
            row.assign(&emb.0);
        }

        stacked.mean_axis(Axis(0)).map(|mean| Self(normalize(mean)))
    }

    /// Dimensionality of the vector
    pub fn dim(&self) -> usize {
        self.0.len()
    }

    /// Borrow the underlying vector
    pub fn view(&self) -> ArrayView1<'_, f32> {
        self.0.view()
    }

    /// Cosine similarity in [-1, 1]
    pub fn similarity(&self, other: &Self) -> f32 {
        self.0.dot(&other.0)
    }
}

fn normalize(v: Array1<f32>) -> Array1<f32> {
    let norm = v.dot(&v).sqrt();
    if norm > 0.0 {
        v / norm
    } else {
        v
    }
}

/// Produces image and text embeddings in a shared vector space.
///
/// Implementations must return unit-norm vectors of one fixed dimension.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed the image stored at `path`; fails when the file is unreadable
    /// or cannot be decoded as an image.
    fn embed_image(&self, path: &Path) -> Result<Embedding>;

    /// Embed a text string.
    fn embed_text(&self, text: &str) -> Result<Embedding>;
}

#[cfg(feature = "onnx")]
pub use clip::ClipEmbedder;

#[cfg(feature = "onnx")]
mod clip {
    use image::{imageops::FilterType, DynamicImage, GenericImageView};
    use ort::session::Session;
    use ort::value::Value;
    use std::path::Path;
    use std::sync::Mutex;
    use tokenizers::Tokenizer;

    use super::{Embedding, EmbeddingProvider};
    use crate::core::onnx::create_session;
    use crate::error::{AppError, Result};

    const IMAGE_SIZE: u32 = 224;
    const MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
    const STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];
    const CONTEXT_LENGTH: usize = 77;

    /// CLIP ViT-B/32 split into vision and text ONNX graphs.
    ///
    /// Expects `vision_model.onnx`, `text_model.onnx` and `tokenizer.json`
    /// in one directory.
    pub struct ClipEmbedder {
        vision: Mutex<Session>,
        text: Mutex<Session>,
        tokenizer: Tokenizer,
    }

    impl std::fmt::Debug for ClipEmbedder {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("ClipEmbedder").finish_non_exhaustive()
        }
    }

    impl ClipEmbedder {
        /// Load the CLIP sessions and tokenizer from `model_dir`
        pub fn load(model_dir: &Path) -> Result<Self> {
            let vision = create_session(&model_dir.join("vision_model.onnx"))?;
            let text = create_session(&model_dir.join("text_model.onnx"))?;
            let tokenizer = Tokenizer::from_file(model_dir.join("tokenizer.json"))
                .map_err(|e| AppError::Model(format!("Failed to load tokenizer: {}", e)))?;

            log::info!("Loaded CLIP model from {}", model_dir.display());

            Ok(Self {
                vision: Mutex::new(vision),
                text: Mutex::new(text),
                tokenizer,
            })
        }

        /// Embed an already decoded image
        pub fn embed_decoded(&self, image: &DynamicImage) -> Result<Embedding> {
            let (shape, pixels) = preprocess(image);
            let input = Value::from_array((shape, pixels))?;

            let mut session = self
                .vision
                .lock()
                .map_err(|_| AppError::Model("Vision session lock poisoned".into()))?;
            let outputs = session.run(ort::inputs!["pixel_values" => input])?;
            let embeds = outputs
                .get("image_embeds")
                .ok_or_else(|| AppError::Model("No image_embeds output found".into()))?;
            let (_, data) = embeds.try_extract_tensor::<f32>()?;

            Ok(Embedding::new(data.to_vec()))
        }
    }

    impl EmbeddingProvider for ClipEmbedder {
        fn embed_image(&self, path: &Path) -> Result<Embedding> {
            let image = image::open(path)?;
            self.embed_decoded(&image)
        }

        fn embed_text(&self, text: &str) -> Result<Embedding> {
            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| AppError::Model(format!("Tokenization failed: {}", e)))?;

            let ids: Vec<i64> = encoding
                .get_ids()
                .iter()
                .take(CONTEXT_LENGTH)
                .map(|&x| i64::from(x))
                .collect();
            let mask = vec![1i64; ids.len()];
            let shape = vec![1, ids.len()];

            let ids = Value::from_array((shape.clone(), ids))?;
            let mask = Value::from_array((shape, mask))?;

            let mut session = self
                .text
                .lock()
                .map_err(|_| AppError::Model("Text session lock poisoned".into()))?;
            let outputs = session.run(ort::inputs![
                "input_ids" => ids,
                "attention_mask" => mask
            ])?;
            let embeds = outputs
                .get("text_embeds")
                .ok_or_else(|| AppError::Model("No text_embeds output found".into()))?;
            let (_, data) = embeds.try_extract_tensor::<f32>()?;

            Ok(Embedding::new(data.to_vec()))
        }
    }

    /// Resize the short side to 224, centre crop, CLIP mean/std, CHW layout.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn preprocess(image: &DynamicImage) -> (Vec<usize>, Vec<f32>) {
        let (width, height) = image.dimensions();
        let scale = IMAGE_SIZE as f32 / width.min(height).max(1) as f32;
        let scaled_width = ((width as f32 * scale).round() as u32).max(IMAGE_SIZE);
        let scaled_height = ((height as f32 * scale).round() as u32).max(IMAGE_SIZE);
        let resized = image.resize_exact(scaled_width, scaled_height, FilterType::CatmullRom);
        let x = (scaled_width - IMAGE_SIZE) / 2;
        let y = (scaled_height - IMAGE_SIZE) / 2;
        let rgb = resized.crop_imm(x, y, IMAGE_SIZE, IMAGE_SIZE).to_rgb8();

        let size = IMAGE_SIZE as usize;
        let plane = size * size;
        let mut data = vec![0.0f32; 3 * plane];
        for (i, px) in rgb.pixels().enumerate() {
            for c in 0..3 {
                let val = f32::from(px[c]) / 255.0;
                data[c * plane + i] = (val - MEAN[c]) / STD[c];
            }
        }

        (vec![1, 3, size, size], data)
    }
}
