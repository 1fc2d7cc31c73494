use crate::config::{TensorLayout, TesterConfig};
use crate::error::{AppError, ErrorKind};
use crate::models::classify_types::ModelMetadata;
use crate::services::classifier::inference::OnnxClassifier;
use futures::StreamExt;
use ort::session::Session;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

const METADATA_FILE: &str = "metadata.json";
const MODEL_FILE: &str = "model.onnx";
const DEFAULT_INPUT_SIZE: u32 = 224;

/// Base location of an exported model, always ending in `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelLocation {
    Remote(String),
    Local(PathBuf),
}

impl ModelLocation {
    /// Accepts a base URL/directory or a direct link to `model.json` /
    /// `model.onnx`.
    pub fn parse(input: &str) -> Result<Self, AppError> {
        let mut base = input.trim().to_string();
        if base.is_empty() {
            return Err(AppError::model_unreachable(
                "Please enter a valid Teachable Machine model URL",
            ));
        }

        for suffix in ["model.json", MODEL_FILE] {
            if let Some(stripped) = base.strip_suffix(suffix) {
                base = stripped.to_string();
                break;
            }
        }
        if !base.ends_with('/') {
            base.push('/');
        }

        if base.starts_with("http://") || base.starts_with("https://") {
            Ok(ModelLocation::Remote(base))
        } else {
            Ok(ModelLocation::Local(PathBuf::from(base)))
        }
    }

    fn remote_file(base: &str, file: &str) -> String {
        format!("{}{}", base, file)
    }

    /// File name used for a downloaded copy of this location's model.
    pub fn cache_file_name(&self) -> String {
        let source = self.to_string();
        let stem: String = source
            .trim_end_matches('/')
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        format!("{}.onnx", stem)
    }
}

impl fmt::Display for ModelLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelLocation::Remote(url) => f.write_str(url),
            ModelLocation::Local(dir) => write!(f, "{}", dir.display()),
        }
    }
}

pub struct LoadedModel {
    pub metadata: ModelMetadata,
    pub classifier: OnnxClassifier,
}

#[derive(Clone)]
pub struct ModelManager {
    pub model_dir: PathBuf,
    client: reqwest::Client,
    layout: TensorLayout,
    use_gpu: bool,
    intra_threads: usize,
}

impl ModelManager {
    pub fn new(config: &TesterConfig) -> Self {
        Self {
            model_dir: config.model_cache_dir.clone(),
            client: reqwest::Client::new(),
            layout: config.tensor_layout,
            use_gpu: config.use_gpu,
            intra_threads: config.intra_threads,
        }
    }

    /// Reachability check; also yields the class names and input size.
    pub async fn fetch_metadata(&self, location: &ModelLocation) -> Result<ModelMetadata, AppError> {
        let content = match location {
            ModelLocation::Remote(base) => {
                let url = ModelLocation::remote_file(base, METADATA_FILE);
                debug!("Fetching metadata from {}", url);
                let resp = self.client.get(&url).send().await.map_err(|e| {
                    AppError::model_unreachable(format!("Failed to fetch {}: {}", url, e))
                })?;
                if !resp.status().is_success() {
                    return Err(AppError::model_unreachable(format!(
                        "Failed to fetch {}: HTTP {}",
                        url,
                        resp.status()
                    )));
                }
                resp.text().await.map_err(|e| {
                    AppError::model_unreachable(format!("Failed to read {}: {}", url, e))
                })?
            }
            ModelLocation::Local(dir) => {
                let path = dir.join(METADATA_FILE);
                tokio::fs::read_to_string(&path).await.map_err(|e| {
                    AppError::model_unreachable(format!("Failed to read {}: {}", path.display(), e))
                })?
            }
        };

        serde_json::from_str(&content)
            .map_err(|e| AppError::model_unreachable(format!("Invalid model metadata: {}", e)))
    }

    /// Local models are used in place; remote ones are downloaded fresh
    /// (cache-busting query) into the model directory.
    pub async fn fetch_model(&self, location: &ModelLocation) -> Result<PathBuf, AppError> {
        match location {
            ModelLocation::Local(dir) => {
                let path = dir.join(MODEL_FILE);
                if !path.exists() {
                    return Err(AppError::model_unreachable(format!(
                        "Model file not found: {}",
                        path.display()
                    )));
                }
                Ok(path)
            }
            ModelLocation::Remote(base) => {
                tokio::fs::create_dir_all(&self.model_dir).await.map_err(|e| AppError {
                    kind: ErrorKind::Io,
                    message: format!("Failed to create model directory: {}", e),
                })?;

                let stamp = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_millis())
                    .unwrap_or(0);
                let url = format!("{}?v={}", ModelLocation::remote_file(base, MODEL_FILE), stamp);
                let dest = self.model_dir.join(location.cache_file_name());
                download_file(&self.client, &url, &dest).await?;
                Ok(dest)
            }
        }
    }

    pub async fn load(&self, location: &ModelLocation) -> Result<LoadedModel, AppError> {
        info!("Loading model from {}", location);
        let metadata = self.fetch_metadata(location).await?;
        info!("Metadata loaded: {:?}", metadata);

        let model_path = self.fetch_model(location).await?;
        let session = self.build_session(model_path).await?;

        let input_size = metadata.image_size.unwrap_or(DEFAULT_INPUT_SIZE);
        let classifier = OnnxClassifier::new(session, metadata.labels.clone(), input_size, self.layout);
        Ok(LoadedModel {
            metadata,
            classifier,
        })
    }

    async fn build_session(&self, model_path: PathBuf) -> Result<Session, AppError> {
        let use_gpu = self.use_gpu;
        let intra_threads = self.intra_threads;

        tokio::task::spawn_blocking(move || -> Result<Session, AppError> {
            let _ = ort::init().with_name("tm-tester").commit();

            let mut builder = Session::builder()
                .map_err(|e| AppError::classification(format!("Failed to create session builder: {}", e)))?
                .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
                .map_err(|e| AppError::classification(format!("Failed to set optimization level: {}", e)))?
                .with_intra_threads(intra_threads)
                .map_err(|e| AppError::classification(format!("Failed to set intra threads: {}", e)))?;

            if use_gpu {
                builder = builder
                    .with_execution_providers([
                        ort::execution_providers::CUDAExecutionProvider::default().build(),
                        ort::execution_providers::CPUExecutionProvider::default().build(),
                    ])
                    .map_err(|e| {
                        AppError::classification(format!("Failed to register GPU execution providers: {}", e))
                    })?;
            } else {
                builder = builder
                    .with_execution_providers([ort::execution_providers::CPUExecutionProvider::default().build()])
                    .map_err(|e| {
                        AppError::classification(format!("Failed to register CPU execution provider: {}", e))
                    })?;
            }

            builder.commit_from_file(&model_path).map_err(|e| {
                AppError::model_unreachable(format!(
                    "Failed to load ONNX model {}: {}",
                    model_path.display(),
                    e
                ))
            })
        })
        .await
        .map_err(|e| AppError::from(format!("Failed to spawn model loading task: {}", e)))?
    }
}

async fn download_file(client: &reqwest::Client, url: &str, dest: &Path) -> Result<(), AppError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::model_unreachable(format!("Failed to download {}: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(AppError::model_unreachable(format!(
            "Failed to download {}: HTTP {}",
            url,
            response.status()
        )));
    }

    let total_size = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;
    let partial = dest.with_extension("part");

    let mut file = tokio::fs::File::create(&partial).await.map_err(|e| AppError {
        kind: ErrorKind::Io,
        message: format!("Failed to create file {}: {}", partial.display(), e),
    })?;

    let mut stream = response.bytes_stream();
    let mut last_logged = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                drop(file);
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e.into());
            }
        };
        downloaded += chunk.len() as u64;
        tokio::io::AsyncWriteExt::write_all(&mut file, &chunk)
            .await
            .map_err(|e| AppError {
                kind: ErrorKind::Io,
                message: format!("Failed to write to file: {}", e),
            })?;

        if total_size > 0 {
            let progress = (downloaded * 100) / total_size;
            if progress >= last_logged + 10 {
                debug!("Model download {}%", progress);
                last_logged = progress;
            }
        }
    }
    tokio::io::AsyncWriteExt::flush(&mut file).await?;
    drop(file);

    tokio::fs::rename(&partial, dest).await?;
    info!("Downloaded {} bytes to {}", downloaded, dest.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strips_model_json_and_adds_slash() {
        let loc = ModelLocation::parse("  https://teachablemachine.withgoogle.com/models/abc/model.json ").unwrap();
        assert_eq!(
            loc,
            ModelLocation::Remote("https://teachablemachine.withgoogle.com/models/abc/".to_string())
        );

        let loc = ModelLocation::parse("https://example.com/m").unwrap();
        assert_eq!(loc, ModelLocation::Remote("https://example.com/m/".to_string()));
    }

    #[test]
    fn test_parse_local_directory() {
        let loc = ModelLocation::parse("models/cats/model.onnx").unwrap();
        assert_eq!(loc, ModelLocation::Local(PathBuf::from("models/cats/")));
    }

    #[test]
    fn test_parse_rejects_blank() {
        let err = ModelLocation::parse("   ").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ModelUnreachable);
    }

    #[test]
    fn test_cache_file_name_is_flat() {
        let loc = ModelLocation::parse("https://example.com/models/abc/").unwrap();
        assert_eq!(loc.cache_file_name(), "https___example_com_models_abc.onnx");
    }

    #[tokio::test]
    async fn test_local_metadata_is_read() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(METADATA_FILE),
            r#"{"labels":["Class 1","Class 2"],"imageSize":224}"#,
        )
        .unwrap();

        let manager = ModelManager::new(&TesterConfig::default());
        let loc = ModelLocation::Local(dir.path().to_path_buf());
        let meta = manager.fetch_metadata(&loc).await.unwrap();
        assert_eq!(meta.labels.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_or_invalid_metadata_is_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::new(&TesterConfig::default());
        let loc = ModelLocation::Local(dir.path().to_path_buf());

        let err = manager.fetch_metadata(&loc).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ModelUnreachable);

        std::fs::write(dir.path().join(METADATA_FILE), "<html>not json</html>").unwrap();
        let err = manager.fetch_metadata(&loc).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ModelUnreachable);
    }

    #[tokio::test]
    async fn test_local_model_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::new(&TesterConfig::default());
        let loc = ModelLocation::Local(dir.path().to_path_buf());
        assert!(manager.fetch_model(&loc).await.is_err());

        std::fs::write(dir.path().join(MODEL_FILE), b"onnx").unwrap();
        assert_eq!(manager.fetch_model(&loc).await.unwrap(), dir.path().join(MODEL_FILE));
    }
}
