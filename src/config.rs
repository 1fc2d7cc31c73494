use crate::error::AppError;
use crate::models::catalog_types::Label;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CatalogSource {
    /// `<dir>/<n>.<extension>` for every `n` in `first..=last`.
    Numbered {
        dir: PathBuf,
        first: u32,
        last: u32,
        #[serde(default = "default_extension")]
        extension: String,
    },
    /// Every image file below `dir`, sorted by path.
    Directory { dir: PathBuf },
}

fn default_extension() -> String {
    "jpg".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    Nhwc,
    Nchw,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesterConfig {
    pub cats: CatalogSource,
    pub dogs: CatalogSource,
    pub per_label: usize,
    pub back_step: usize,
    pub target_size: u32,
    pub placeholder_size: u32,
    pub model_cache_dir: PathBuf,
    pub tensor_layout: TensorLayout,
    pub use_gpu: bool,
    pub intra_threads: usize,
    pub canvas_width: f32,
}

impl Default for TesterConfig {
    fn default() -> Self {
        Self {
            cats: CatalogSource::Numbered {
                dir: PathBuf::from("test_images/MoreImages_Catszip"),
                first: 8497,
                last: 8600,
                extension: default_extension(),
            },
            dogs: CatalogSource::Numbered {
                dir: PathBuf::from("test_images/MoreSamplesDogs"),
                first: 784,
                last: 887,
                extension: default_extension(),
            },
            per_label: 5,
            back_step: 10,
            target_size: 224,
            placeholder_size: 140,
            model_cache_dir: std::env::temp_dir().join("tm-tester").join("models"),
            tensor_layout: TensorLayout::Nhwc,
            use_gpu: false,
            intra_threads: 4,
            canvas_width: 1280.0,
        }
    }
}

impl TesterConfig {
    /// Reads a JSON file; absent fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let config: TesterConfig = serde_json::from_str(&content).map_err(|e| {
            AppError::config(format!("Failed to parse config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.per_label == 0 {
            return Err(AppError::config("per_label must be at least 1"));
        }
        if self.target_size == 0 || self.placeholder_size == 0 {
            return Err(AppError::config("image sizes must be non-zero"));
        }
        if self.intra_threads == 0 {
            return Err(AppError::config("intra_threads must be at least 1"));
        }
        for (label, source) in [(Label::Cat, &self.cats), (Label::Dog, &self.dogs)] {
            if let CatalogSource::Numbered { first, last, .. } = source {
                if first > last {
                    return Err(AppError::config(format!(
                        "{} range is empty: {} > {}",
                        label, first, last
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn source_for(&self, label: Label) -> &CatalogSource {
        match label {
            Label::Cat => &self.cats,
            Label::Dog => &self.dogs,
        }
    }
}
