//! Similarity ranking against the catalog, match comments and the blended
//! category title.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::core::catalog::{CatalogEmbedding, Category};
use crate::core::embeddings::Embedding;

/// Default number of matches returned
pub const DEFAULT_TOP_K: usize = 3;

/// One ranked catalog match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityResult {
    /// Catalog entry name
    pub name: String,
    /// Cosine similarity x 100; not clamped
    pub similarity: f32,
    /// Display image of the entry
    pub image: String,
    /// Entry description
    pub description: String,
    /// Entry category
    pub category: Category,
    /// Comment chosen by [`comment_for`]
    pub comment: String,
}

/// Rank catalog entries by cosine similarity to `query`.
///
/// Both sides are unit-norm so the dot product is the cosine. Sorting is
/// stable: equal scores keep catalog order. At most `top_k` results are
/// returned. Callers reject an empty catalog before ranking.
pub fn rank(
    query: &Embedding,
    catalog: &[CatalogEmbedding],
    top_k: usize,
) -> Vec<SimilarityResult> {
    let mut scored: Vec<(f32, &CatalogEmbedding)> = catalog
        .iter()
        .map(|entry| (query.similarity(&entry.embedding) * 100.0, entry))
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    scored.truncate(top_k);

    scored
        .into_iter()
        .map(|(similarity, entry)| SimilarityResult {
            name: entry.name.clone(),
            similarity,
            image: entry.display_image.to_string_lossy().into_owned(),
            description: entry.description.clone(),
            category: entry.category,
            comment: comment_for(similarity).to_string(),
        })
        .collect()
}

/// Pick a comment for a similarity percentage.
///
/// Each threshold is an inclusive lower bound.
pub fn comment_for(similarity: f32) -> &'static str {
    match similarity {
        s if s >= 80.0 => "🎭 도플갱어 발견! 혹시 친척 아니세요?",
        s if s >= 70.0 => "👨‍👩‍👦 꽤 많이 닮았네요! 사진 보여주면 믿을 듯!",
        s if s >= 60.0 => "😊 어느 정도 닮은 구석이 있어요!",
        s if s >= 50.0 => "🤔 살짝 닮은 느낌이 드는데요?",
        _ => "🌟 당신만의 독특한 매력이 있어요!",
    }
}

/// Overall look derived from the categories of the top matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendedLabel {
    /// Both dogs and cats among the matches
    Mixed,
    /// Dogs but no cats
    Dog,
    /// Cats but no dogs
    Cat,
    /// Neither dogs nor cats
    OtherAnimal,
}

impl BlendedLabel {
    /// Classify a set of categories
    pub fn from_categories<I>(categories: I) -> Self
    where
        I: IntoIterator<Item = Category>,
    {
        let set: HashSet<Category> = categories.into_iter().collect();
        match (set.contains(&Category::Dogs), set.contains(&Category::Cats)) {
            (true, true) => Self::Mixed,
            (true, false) => Self::Dog,
            (false, true) => Self::Cat,
            (false, false) => Self::OtherAnimal,
        }
    }

    /// Classify ranked results by their categories
    pub fn from_results(results: &[SimilarityResult]) -> Self {
        Self::from_categories(results.iter().map(|r| r.category))
    }

    /// Result title shown to the user
    pub fn title(self) -> &'static str {
        match self {
            Self::Mixed => "오묘한 매력의 ✨강냥이상✨이시네요!",
            Self::Dog => "다채로운 매력의 🐶 강아지상🐶 입니다!",
            Self::Cat => "시크함과 귀여움이 공존하는 🐱고양이상🐱이네요!",
            Self::OtherAnimal => "세상에, 동물나라에서 온 귀염둥이상이에요! 🥰",
        }
    }
}
