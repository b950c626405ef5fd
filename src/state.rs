use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::catalog::{Catalog, CatalogCache};
use crate::core::embeddings::EmbeddingProvider;
use crate::core::emotion::EmotionClassifier;
use crate::core::ranking::DEFAULT_TOP_K;
use crate::error::{AppError, Result};

/// Configuration for the application
#[derive(Clone, Debug)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind_addr: SocketAddr,
    /// Publicly served directory; uploads and reports live below it
    pub static_dir: PathBuf,
    /// Directory holding catalog photos
    pub catalog_dir: PathBuf,
    /// Optional JSON catalog replacing the built-in one
    pub catalog_file: Option<PathBuf>,
    /// Directory with the CLIP ONNX graphs and tokenizer
    pub clip_model_dir: PathBuf,
    /// FER+ emotion model file
    pub emotion_model_path: PathBuf,
    /// Maximum upload size in bytes
    pub max_upload_size: usize,
    /// Allowed file extensions for uploads
    pub allowed_extensions: Vec<String>,
    /// Number of look-alike matches returned
    pub top_k: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            static_dir: PathBuf::from("static"),
            catalog_dir: PathBuf::from("static/animals"),
            catalog_file: None,
            clip_model_dir: PathBuf::from("models/clip"),
            emotion_model_path: PathBuf::from("models/emotion-ferplus-8.onnx"),
            max_upload_size: 16 * 1024 * 1024, // 16MB
            allowed_extensions: vec!["png", "jpg", "jpeg"]
                .into_iter()
                .map(String::from)
                .collect(),
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl Config {
    /// Defaults overridden by `FACEMATCH_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(addr) = env_var("FACEMATCH_BIND_ADDR") {
            config.bind_addr = addr
                .parse()
                .map_err(|e| AppError::Config(format!("FACEMATCH_BIND_ADDR '{}': {}", addr, e)))?;
        }
        if let Some(dir) = env_var("FACEMATCH_STATIC_DIR") {
            config.static_dir = PathBuf::from(dir);
        }
        if let Some(dir) = env_var("FACEMATCH_CATALOG_DIR") {
            config.catalog_dir = PathBuf::from(dir);
        }
        config.catalog_file = env_var("FACEMATCH_CATALOG_FILE").map(PathBuf::from);
        if let Some(dir) = env_var("FACEMATCH_CLIP_MODEL_DIR") {
            config.clip_model_dir = PathBuf::from(dir);
        }
        if let Some(path) = env_var("FACEMATCH_EMOTION_MODEL") {
            config.emotion_model_path = PathBuf::from(path);
        }
        if let Some(size) = env_var("FACEMATCH_MAX_UPLOAD_BYTES") {
            config.max_upload_size = size.parse().map_err(|e| {
                AppError::Config(format!("FACEMATCH_MAX_UPLOAD_BYTES '{}': {}", size, e))
            })?;
        }
        if let Some(k) = env_var("FACEMATCH_TOP_K") {
            config.top_k = k
                .parse()
                .ok()
                .filter(|&k: &usize| k > 0)
                .ok_or_else(|| {
                    AppError::Config(format!(
                        "FACEMATCH_TOP_K must be a positive integer, got '{}'",
                        k
                    ))
                })?;
        }

        Ok(config)
    }

    /// Where uploaded photos are stored
    pub fn upload_dir(&self) -> PathBuf {
        self.static_dir.join("uploads")
    }

    /// Where generated reports and saved frames are stored
    pub fn result_dir(&self) -> PathBuf {
        self.upload_dir().join("results")
    }

    /// URL path under `/static` for a file inside `static_dir`
    pub fn public_url(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.static_dir).unwrap_or(path);
        let joined = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        format!("/static/{}", joined)
    }

    /// Load the configured catalog, falling back to the built-in list
    pub fn load_catalog(&self) -> Result<Catalog> {
        match &self.catalog_file {
            Some(file) => Catalog::from_json_file(&self.catalog_dir, file),
            None => Ok(Catalog::builtin(&self.catalog_dir)),
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Application state that can be shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: Config,
    /// Image and text embedding model
    pub embedder: Arc<dyn EmbeddingProvider>,
    /// Face emotion model
    pub classifier: Arc<dyn EmotionClassifier>,
    /// Lazily computed catalog embeddings
    pub catalog: CatalogCache,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create application state from explicit collaborators
    pub fn new(
        config: Config,
        catalog: Catalog,
        embedder: Arc<dyn EmbeddingProvider>,
        classifier: Arc<dyn EmotionClassifier>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            embedder,
            classifier,
            catalog: CatalogCache::new(catalog),
        })
    }

    /// Load the ONNX models and catalog named by `config`
    #[cfg(feature = "onnx")]
    pub fn with_config(config: Config) -> Result<Arc<Self>> {
        use crate::core::{embeddings::ClipEmbedder, emotion::FerPlusClassifier};

        let embedder = Arc::new(ClipEmbedder::load(&config.clip_model_dir)?);
        let classifier = Arc::new(FerPlusClassifier::load(&config.emotion_model_path)?);
        let catalog = config.load_catalog()?;

        Ok(Self::new(config, catalog, embedder, classifier))
    }

    /// Create the upload and result directories
    pub fn prepare_dirs(&self) -> Result<()> {
        crate::utils::ensure_dir_exists(&self.config.upload_dir())?;
        crate::utils::ensure_dir_exists(&self.config.result_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 8] = [
        "FACEMATCH_BIND_ADDR",
        "FACEMATCH_STATIC_DIR",
        "FACEMATCH_CATALOG_DIR",
        "FACEMATCH_CATALOG_FILE",
        "FACEMATCH_CLIP_MODEL_DIR",
        "FACEMATCH_EMOTION_MODEL",
        "FACEMATCH_MAX_UPLOAD_BYTES",
        "FACEMATCH_TOP_K",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_env() {
        clear_env();
        let config = Config::from_env().unwrap();
        assert_eq!(config.max_upload_size, 16 * 1024 * 1024);
        assert_eq!(config.top_k, 3);
        assert_eq!(config.allowed_extensions, ["png", "jpg", "jpeg"]);
        assert_eq!(config.result_dir(), PathBuf::from("static/uploads/results"));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        std::env::set_var("FACEMATCH_BIND_ADDR", "0.0.0.0:8080");
        std::env::set_var("FACEMATCH_STATIC_DIR", "/srv/public");
        std::env::set_var("FACEMATCH_TOP_K", "5");
        let config = Config::from_env().unwrap();
        clear_env();

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.upload_dir(), PathBuf::from("/srv/public/uploads"));
        assert_eq!(config.top_k, 5);
    }

    #[test]
    #[serial]
    fn test_invalid_env_is_config_error() {
        clear_env();
        std::env::set_var("FACEMATCH_TOP_K", "0");
        let result = Config::from_env();
        clear_env();
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_public_url() {
        let config = Config::default();
        assert_eq!(
            config.public_url(&config.upload_dir().join("a.jpg")),
            "/static/uploads/a.jpg"
        );
        assert_eq!(
            config.public_url(Path::new("static/animals/corgi_001.jpg")),
            "/static/animals/corgi_001.jpg"
        );
    }
}
