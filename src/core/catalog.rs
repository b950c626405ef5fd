//! The reference catalog of animals and its one-time embedding cache.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::core::embeddings::{Embedding, EmbeddingProvider};
use crate::error::Result;

/// Category tag of a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Dog breeds
    Dogs,
    /// Cat breeds
    Cats,
    /// Any other animal
    CuteAnimals,
}

/// One named animal with its reference photos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Display name, unique within a catalog
    pub name: String,
    /// Category tag
    pub category: Category,
    /// Source photos, relative to the catalog root
    pub images: Vec<PathBuf>,
    /// Photo shown in results; defaults to the first of `images`
    #[serde(default)]
    pub main_image: Option<PathBuf>,
    /// Short description shown next to the match
    pub description: String,
}

impl CatalogEntry {
    fn display_image(&self) -> Option<&Path> {
        self.main_image
            .as_deref()
            .or_else(|| self.images.first().map(PathBuf::as_path))
    }
}

/// An ordered, immutable list of catalog entries rooted at a directory.
#[derive(Debug, Clone)]
pub struct Catalog {
    root: PathBuf,
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Create a catalog from explicit entries
    pub fn new(root: impl Into<PathBuf>, entries: Vec<CatalogEntry>) -> Self {
        Self {
            root: root.into(),
            entries,
        }
    }

    /// The built-in animal catalog
    pub fn builtin(root: impl Into<PathBuf>) -> Self {
        let entries = BUILTIN
            .iter()
            .map(|&(stem, name, category, description)| CatalogEntry {
                name: name.to_string(),
                category,
                images: (1..=3)
                    .map(|i| PathBuf::from(format!("{}_{:03}.jpg", stem, i)))
                    .collect(),
                main_image: Some(PathBuf::from(format!("{}_001.jpg", stem))),
                description: description.to_string(),
            })
            .collect();

        Self::new(root, entries)
    }

    /// Load entries from a JSON array; image paths resolve against `root`.
    pub fn from_json_file(root: impl Into<PathBuf>, path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let entries: Vec<CatalogEntry> = serde_json::from_str(&data)?;
        Ok(Self::new(root, entries))
    }

    /// Catalog entries in definition order
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Directory image paths resolve against
    pub fn root(&self) -> &Path {
        &self.root
    }
}

// (file stem, name, category, description)
const BUILTIN: &[(&str, &str, Category, &str)] = &[
    ("goldenRetriever", "골든 리트리버", Category::Dogs, "friendly and warm, always smiling"),
    ("jindo", "진돗개", Category::Dogs, "loyal and brave"),
    ("pomeranian", "포메라니안", Category::Dogs, "귀여워요"),
    ("corgi", "웰시코기", Category::Dogs, "short legs and cheerful"),
    ("samoyed", "사모예드", Category::Dogs, "fluffy cloud, always happy"),
    ("poodle", "푸들", Category::Dogs, "elegant and smart"),
    ("beagle", "비글", Category::Dogs, "curious and energetic"),
    ("russianBlue", "러시안블루", Category::Cats, "elegant and mysterious gray"),
    ("scottishFold", "스코티시폴드", Category::Cats, "round face and gentle"),
    ("persian", "페르시안", Category::Cats, "fluffy and sophisticated"),
    ("siamese", "샴", Category::Cats, "sleek and vocal"),
    ("koreanShorthair", "코숏", Category::Cats, "typical cute kitty"),
    ("britishShorthair", "브리티시숏헤어", Category::Cats, "round and chubby"),
    ("bengal", "뱅갈", Category::Cats, "wild and energetic"),
    ("panda", "팬더", Category::CuteAnimals, "chubby and adorable"),
    ("rabbit", "토끼", Category::CuteAnimals, "soft and gentle"),
    ("hamster", "햄스터", Category::CuteAnimals, "tiny and cute"),
    ("fennecFox", "페넥여우", Category::CuteAnimals, "big ears and playful"),
    ("alpaca", "알파카", Category::CuteAnimals, "fluffy and calm"),
    ("seal", "물범", Category::CuteAnimals, "round and squishy"),
];

/// Averaged embedding of one catalog entry.
#[derive(Debug, Clone)]
pub struct CatalogEmbedding {
    /// Entry name
    pub name: String,
    /// Mean of the entry's image embeddings, re-normalised
    pub embedding: Embedding,
    /// Path of the image shown for this entry
    pub display_image: PathBuf,
    /// Entry description
    pub description: String,
    /// Entry category
    pub category: Category,
}

/// Computes catalog embeddings at most once and keeps them for the
/// lifetime of the cache.
///
/// Concurrent callers of [`CatalogCache::get_or_build`] block on a single
/// computation.
#[derive(Debug)]
pub struct CatalogCache {
    catalog: Catalog,
    embeddings: OnceLock<Vec<CatalogEmbedding>>,
}

impl CatalogCache {
    /// Wrap a catalog; nothing is computed until first use.
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            embeddings: OnceLock::new(),
        }
    }

    /// The source catalog
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Whether embeddings have been computed
    pub fn is_built(&self) -> bool {
        self.embeddings.get().is_some()
    }

    /// Return the cached embeddings, computing them on first call.
    pub fn get_or_build(&self, provider: &dyn EmbeddingProvider) -> &[CatalogEmbedding] {
        self.embeddings
            .get_or_init(|| build_embeddings(&self.catalog, provider))
    }
}

fn build_embeddings(catalog: &Catalog, provider: &dyn EmbeddingProvider) -> Vec<CatalogEmbedding> {
    log::info!("Initializing animal catalog ({} entries)", catalog.entries().len());

    let embeddings: Vec<CatalogEmbedding> = catalog
        .entries()
        .iter()
        .filter_map(|entry| embed_entry(catalog.root(), entry, provider))
        .collect();

    log::info!("Loaded {} catalog embeddings", embeddings.len());
    embeddings
}

fn embed_entry(
    root: &Path,
    entry: &CatalogEntry,
    provider: &dyn EmbeddingProvider,
) -> Option<CatalogEmbedding> {
    if entry.images.is_empty() {
        log::warn!("No images listed for '{}'", entry.name);
        return None;
    }

    let mut vectors = Vec::with_capacity(entry.images.len());
    for image in &entry.images {
        let path = root.join(image);
        if !path.exists() {
            log::warn!("Image not found for '{}': {}", entry.name, path.display());
            continue;
        }
        match provider.embed_image(&path) {
            Ok(embedding) => vectors.push(embedding),
            Err(e) => log::warn!(
                "Failed to embed '{}' image {}: {}",
                entry.name,
                path.display(),
                e
            ),
        }
    }

    let Some(embedding) = Embedding::mean(&vectors) else {
        log::warn!("Dropping '{}': no usable images", entry.name);
        return None;
    };

    let display_image = entry
        .display_image()
        .map(|p| root.join(p))
        .unwrap_or_else(|| root.to_path_buf());

    Some(CatalogEmbedding {
        name: entry.name.clone(),
        embedding,
        display_image,
        description: entry.description.clone(),
        category: entry.category,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reads a comma separated vector from the "image" file.
    struct FileVectorProvider {
        calls: AtomicUsize,
    }

    impl EmbeddingProvider for FileVectorProvider {
        fn embed_image(&self, path: &Path) -> Result<Embedding> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let text = std::fs::read_to_string(path)?;
            let values = text
                .trim()
                .split(',')
                .map(|v| v.trim().parse::<f32>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| AppError::Model(e.to_string()))?;
            Ok(Embedding::new(values))
        }

        fn embed_text(&self, _text: &str) -> Result<Embedding> {
            unreachable!("catalog never embeds text")
        }
    }

    fn entry(name: &str, category: Category, images: &[&str]) -> CatalogEntry {
        CatalogEntry {
            name: name.to_string(),
            category,
            images: images.iter().map(PathBuf::from).collect(),
            main_image: None,
            description: format!("{} description", name),
        }
    }

    #[test]
    fn test_builtin_catalog() {
        let catalog = Catalog::builtin("static/animals");
        assert_eq!(catalog.entries().len(), 20);
        let dogs = catalog
            .entries()
            .iter()
            .filter(|e| e.category == Category::Dogs)
            .count();
        assert_eq!(dogs, 7);
        let first = &catalog.entries()[0];
        assert_eq!(first.images.len(), 3);
        assert_eq!(first.main_image, Some(PathBuf::from("goldenRetriever_001.jpg")));
    }

    #[test]
    fn test_missing_and_broken_images_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a1.jpg"), "1,0").unwrap();
        std::fs::write(dir.path().join("a2.jpg"), "0,1").unwrap();
        std::fs::write(dir.path().join("broken.jpg"), "not a vector").unwrap();

        let catalog = Catalog::new(
            dir.path(),
            vec![
                entry("a", Category::Dogs, &["a1.jpg", "a2.jpg", "missing.jpg"]),
                entry("b", Category::Cats, &["missing.jpg"]),
                entry("c", Category::Cats, &["broken.jpg"]),
                entry("d", Category::Cats, &[]),
            ],
        );
        let provider = FileVectorProvider {
            calls: AtomicUsize::new(0),
        };
        let cache = CatalogCache::new(catalog);
        let built = cache.get_or_build(&provider);

        assert_eq!(built.len(), 1);
        assert_eq!(built[0].name, "a");
        assert_eq!(built[0].display_image, dir.path().join("a1.jpg"));
        let expected = std::f32::consts::FRAC_1_SQRT_2;
        assert!((built[0].embedding.view()[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_cache_built_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.jpg"), "1,2,3").unwrap();
        let catalog = Catalog::new(dir.path(), vec![entry("x", Category::Dogs, &["x.jpg"])]);
        let provider = FileVectorProvider {
            calls: AtomicUsize::new(0),
        };
        let cache = CatalogCache::new(catalog);
        assert!(!cache.is_built());

        for _ in 0..5 {
            assert_eq!(cache.get_or_build(&provider).len(), 1);
        }
        assert!(cache.is_built());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"[{"name":"otter","category":"cute_animals","images":["otter.jpg"],"description":"slippery"}]"#,
        )
        .unwrap();

        let catalog = Catalog::from_json_file(dir.path(), &path).unwrap();
        assert_eq!(catalog.entries().len(), 1);
        assert_eq!(catalog.entries()[0].category, Category::CuteAnimals);
        assert_eq!(catalog.entries()[0].main_image, None);
    }
}
