//! Text-prompt "personality" read of a photo.

use serde::{Serialize, Serializer};

use crate::core::embeddings::{Embedding, EmbeddingProvider};
use crate::error::{AppError, Result};

/// Phrases the photo is compared against
pub const PERSONALITY_PHRASES: [&str; 8] = [
    "cute and adorable face",
    "charismatic and confident face",
    "gentle and kind face",
    "cool and sophisticated face",
    "energetic and bright face",
    "calm and peaceful face",
    "mysterious and elegant face",
    "friendly and warm face",
];

/// Best matching phrase plus every phrase score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonalityResult {
    /// Phrase with the highest score
    pub main_trait: String,
    /// Its cosine similarity x 100
    pub score: f32,
    /// Score of every phrase, in phrase order; serialized as a JSON object
    #[serde(serialize_with = "ordered_map")]
    pub all_scores: Vec<(String, f32)>,
}

fn ordered_map<S>(scores: &[(String, f32)], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_map(scores.iter().map(|(phrase, score)| (phrase, score)))
}

/// Score `query` against [`PERSONALITY_PHRASES`].
pub fn score_personality(
    query: &Embedding,
    provider: &dyn EmbeddingProvider,
) -> Result<PersonalityResult> {
    score_phrases(query, &PERSONALITY_PHRASES, provider)
}

/// Score `query` against arbitrary phrases; text embeddings are computed on
/// every call. Ties go to the earliest phrase.
pub fn score_phrases(
    query: &Embedding,
    phrases: &[&str],
    provider: &dyn EmbeddingProvider,
) -> Result<PersonalityResult> {
    let mut best: Option<(&str, f32)> = None;
    let mut all_scores = Vec::with_capacity(phrases.len());

    for &phrase in phrases {
        let score = query.similarity(&provider.embed_text(phrase)?) * 100.0;
        all_scores.push((phrase.to_string(), score));
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((phrase, score));
        }
    }

    let (main_trait, score) =
        best.ok_or_else(|| AppError::InvalidInput("No personality phrases given".into()))?;

    Ok(PersonalityResult {
        main_trait: main_trait.to_string(),
        score,
        all_scores,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Maps a few known phrases to fixed directions.
    struct PhraseProvider {
        text_calls: AtomicUsize,
    }

    impl EmbeddingProvider for PhraseProvider {
        fn embed_image(&self, _path: &Path) -> Result<Embedding> {
            unreachable!()
        }

        fn embed_text(&self, text: &str) -> Result<Embedding> {
            self.text_calls.fetch_add(1, Ordering::SeqCst);
            Ok(match text {
                "friendly and warm face" => Embedding::new(vec![1.0, 0.0]),
                "calm and peaceful face" => Embedding::new(vec![1.0, 1.0]),
                _ => Embedding::new(vec![0.0, 1.0]),
            })
        }
    }

    #[test]
    fn test_best_phrase_and_all_scores() {
        let provider = PhraseProvider {
            text_calls: AtomicUsize::new(0),
        };
        let query = Embedding::new(vec![1.0, 0.1]);
        let result = score_personality(&query, &provider).unwrap();

        assert_eq!(result.main_trait, "friendly and warm face");
        assert_eq!(result.all_scores.len(), 8);
        assert!(result
            .all_scores
            .iter()
            .all(|&(_, s)| s <= result.score + f32::EPSILON));
        assert_eq!(provider.text_calls.load(Ordering::SeqCst), 8);

        // No caching of text embeddings between calls
        score_personality(&query, &provider).unwrap();
        assert_eq!(provider.text_calls.load(Ordering::SeqCst), 16);
    }

    #[test]
    fn test_all_scores_keep_phrase_order() {
        let provider = PhraseProvider {
            text_calls: AtomicUsize::new(0),
        };
        let result = score_personality(&Embedding::new(vec![1.0, 0.0]), &provider).unwrap();
        let phrases: Vec<&str> = result.all_scores.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(phrases, PERSONALITY_PHRASES);

        let json = serde_json::to_string(&result).unwrap();
        let cute = json.find("\"cute and adorable face\"").unwrap();
        let charismatic = json.find("\"charismatic and confident face\"").unwrap();
        assert!(cute < charismatic);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["all_scores"].as_object().unwrap().len(), 8);
    }

    #[test]
    fn test_ties_pick_first_phrase() {
        let provider = PhraseProvider {
            text_calls: AtomicUsize::new(0),
        };
        let query = Embedding::new(vec![0.0, 1.0]);
        let result = score_phrases(&query, &["a", "b", "c"], &provider).unwrap();
        assert_eq!(result.main_trait, "a");
    }

    #[test]
    fn test_empty_phrase_list_is_an_error() {
        let provider = PhraseProvider {
            text_calls: AtomicUsize::new(0),
        };
        let query = Embedding::new(vec![1.0, 0.0]);
        assert!(score_phrases(&query, &[], &provider).is_err());
    }
}
