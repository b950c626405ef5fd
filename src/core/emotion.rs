//! Emotion distributions, the confidence heuristic and the face emotion
//! classifier seam.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::Result;

/// The fixed emotion label set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    /// Angry
    Angry,
    /// Disgust
    Disgust,
    /// Fear
    Fear,
    /// Happy
    Happy,
    /// Sad
    Sad,
    /// Surprise
    Surprise,
    /// Neutral
    Neutral,
}

impl Emotion {
    /// All labels; also the tie-break order for dominance
    pub const ALL: [Emotion; 7] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprise,
        Emotion::Neutral,
    ];

    /// Lowercase label
    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
            Emotion::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Percentage per emotion label, summing to roughly 100.
///
/// Labels missing from JSON input deserialize as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionScores {
    /// Angry percentage
    pub angry: f64,
    /// Disgust percentage
    pub disgust: f64,
    /// Fear percentage
    pub fear: f64,
    /// Happy percentage
    pub happy: f64,
    /// Sad percentage
    pub sad: f64,
    /// Surprise percentage
    pub surprise: f64,
    /// Neutral percentage
    pub neutral: f64,
}

impl EmotionScores {
    /// 100% neutral
    pub fn all_neutral() -> Self {
        Self {
            neutral: 100.0,
            ..Self::default()
        }
    }

    /// Score of one label
    pub fn get(&self, emotion: Emotion) -> f64 {
        match emotion {
            Emotion::Angry => self.angry,
            Emotion::Disgust => self.disgust,
            Emotion::Fear => self.fear,
            Emotion::Happy => self.happy,
            Emotion::Sad => self.sad,
            Emotion::Surprise => self.surprise,
            Emotion::Neutral => self.neutral,
        }
    }

    fn get_mut(&mut self, emotion: Emotion) -> &mut f64 {
        match emotion {
            Emotion::Angry => &mut self.angry,
            Emotion::Disgust => &mut self.disgust,
            Emotion::Fear => &mut self.fear,
            Emotion::Happy => &mut self.happy,
            Emotion::Sad => &mut self.sad,
            Emotion::Surprise => &mut self.surprise,
            Emotion::Neutral => &mut self.neutral,
        }
    }

    /// Label with the highest score; ties go to the earlier label in
    /// [`Emotion::ALL`].
    pub fn dominant(&self) -> Emotion {
        Emotion::ALL
            .into_iter()
            .fold(Emotion::ALL[0], |best, e| {
                if self.get(e) > self.get(best) {
                    e
                } else {
                    best
                }
            })
    }

    /// Apply `f` to every label
    pub fn map(&self, mut f: impl FnMut(f64) -> f64) -> Self {
        let mut out = *self;
        for e in Emotion::ALL {
            *out.get_mut(e) = f(self.get(e));
        }
        out
    }

    /// Element-wise arithmetic mean; `None` for no input
    pub fn mean<'a, I>(scores: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a EmotionScores>,
    {
        let mut sum = Self::default();
        let mut count = 0usize;
        for s in scores {
            for e in Emotion::ALL {
                *sum.get_mut(e) += s.get(e);
            }
            count += 1;
        }
        if count == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = count as f64;
        Some(sum.map(|v| v / n))
    }
}

/// Round to one decimal place on the exact binary value, ties to even.
pub(crate) fn round1(value: f64) -> f64 {
    format!("{:.1}", value).parse().unwrap_or(value)
}

/// Hand-tuned confidence heuristic over an emotion distribution.
///
/// Starts at 60, rewards happy/surprise, lightly rewards neutral, penalises
/// fear/sad/angry, clamps to [30, 100] and rounds to one decimal.
pub fn score_confidence(emotions: &EmotionScores) -> f64 {
    let positive = emotions.happy * 1.0 + emotions.surprise * 0.7;
    let neutral_weighted = emotions.neutral * 0.5;
    let negative = (emotions.fear + emotions.sad + emotions.angry) * 0.3;

    let raw = 60.0 + positive - negative + neutral_weighted * 0.3;
    round1(raw.clamp(30.0, 100.0))
}

/// Per-frame emotion analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionReading {
    /// Distribution over the label set
    pub emotions: EmotionScores,
    /// Label with the highest score
    pub dominant_emotion: Emotion,
    /// Derived confidence score
    pub confidence_score: f64,
}

impl EmotionReading {
    /// Build a reading from a distribution, deriving dominance and confidence
    pub fn from_scores(emotions: EmotionScores) -> Self {
        Self {
            dominant_emotion: emotions.dominant(),
            confidence_score: score_confidence(&emotions),
            emotions,
        }
    }

    /// Substitute used when face analysis fails: all neutral, confidence 50
    pub fn neutral_default() -> Self {
        Self {
            emotions: EmotionScores::all_neutral(),
            dominant_emotion: Emotion::Neutral,
            confidence_score: 50.0,
        }
    }
}

/// Face emotion detector.
pub trait EmotionClassifier: Send + Sync {
    /// Classify the face in the image at `path`.
    fn classify(&self, path: &Path) -> Result<EmotionReading>;
}

/// Classify, substituting [`EmotionReading::neutral_default`] on failure.
pub fn classify_or_neutral(classifier: &dyn EmotionClassifier, path: &Path) -> EmotionReading {
    match classifier.classify(path) {
        Ok(reading) => reading,
        Err(e) => {
            log::warn!("Emotion analysis failed, using neutral reading: {}", e);
            EmotionReading::neutral_default()
        }
    }
}

#[cfg(feature = "onnx")]
pub use ferplus::FerPlusClassifier;

#[cfg(feature = "onnx")]
mod ferplus {
    use image::imageops::FilterType;
    use ort::session::Session;
    use ort::value::Value;
    use std::path::Path;
    use std::sync::Mutex;

    use super::{Emotion, EmotionClassifier, EmotionReading, EmotionScores};
    use crate::core::onnx::create_session;
    use crate::error::{AppError, Result};

    const INPUT_SIZE: u32 = 64;
    const INPUT_NAME: &str = "Input3";
    const OUTPUT_NAME: &str = "Plus692_Output_0";

    // FER+ output order; contempt has no counterpart and is folded into disgust
    const FER_LABELS: [Option<Emotion>; 8] = [
        Some(Emotion::Neutral),
        Some(Emotion::Happy),
        Some(Emotion::Surprise),
        Some(Emotion::Sad),
        Some(Emotion::Angry),
        Some(Emotion::Disgust),
        Some(Emotion::Fear),
        None,
    ];

    /// FER+ (emotion-ferplus-8) classifier on the whole frame.
    pub struct FerPlusClassifier {
        session: Mutex<Session>,
    }

    impl std::fmt::Debug for FerPlusClassifier {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("FerPlusClassifier").finish_non_exhaustive()
        }
    }

    impl FerPlusClassifier {
        /// Load the ONNX model
        pub fn load(model_path: &Path) -> Result<Self> {
            let session = create_session(model_path)?;
            log::info!("Loaded emotion model from {}", model_path.display());
            Ok(Self {
                session: Mutex::new(session),
            })
        }
    }

    impl EmotionClassifier for FerPlusClassifier {
        fn classify(&self, path: &Path) -> Result<EmotionReading> {
            let gray = image::open(path)?
                .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Triangle)
                .to_luma8();
            let pixels: Vec<f32> = gray.pixels().map(|p| f32::from(p[0])).collect();
            let size = INPUT_SIZE as usize;
            let input = Value::from_array((vec![1, 1, size, size], pixels))?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| AppError::Model("Emotion session lock poisoned".into()))?;
            let outputs = session.run(ort::inputs![INPUT_NAME => input])?;
            let logits = outputs
                .get(OUTPUT_NAME)
                .ok_or_else(|| AppError::Model("No emotion output found".into()))?;
            let (_, data) = logits.try_extract_tensor::<f32>()?;
            if data.len() < FER_LABELS.len() {
                return Err(AppError::Model(format!(
                    "Expected {} emotion logits, got {}",
                    FER_LABELS.len(),
                    data.len()
                )));
            }

            Ok(EmotionReading::from_scores(to_scores(&data[..FER_LABELS.len()])))
        }
    }

    fn to_scores(logits: &[f32]) -> EmotionScores {
        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exp: Vec<f64> = logits.iter().map(|&l| f64::from(l - max).exp()).collect();
        let total: f64 = exp.iter().sum();

        let mut scores = EmotionScores::default();
        for (label, value) in FER_LABELS.iter().zip(exp) {
            let pct = value / total * 100.0;
            match label {
                Some(Emotion::Angry) => scores.angry += pct,
                Some(Emotion::Disgust) | None => scores.disgust += pct,
                Some(Emotion::Fear) => scores.fear += pct,
                Some(Emotion::Happy) => scores.happy += pct,
                Some(Emotion::Sad) => scores.sad += pct,
                Some(Emotion::Surprise) => scores.surprise += pct,
                Some(Emotion::Neutral) => scores.neutral += pct,
            }
        }
        scores
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_softmax_mapping() {
            let scores = to_scores(&[0.0, 10.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
            assert_eq!(scores.dominant(), Emotion::Happy);
            let total: f64 = Emotion::ALL.iter().map(|&e| scores.get(e)).sum();
            assert!((total - 100.0).abs() < 1e-6);
        }
    }
}
