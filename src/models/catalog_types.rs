use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Cat,
    Dog,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Cat => "Cat",
            Label::Dog => "Dog",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub image_path: PathBuf,
    pub actual_label: Label,
}

impl CatalogEntry {
    pub fn new(image_path: impl Into<PathBuf>, actual_label: Label) -> Self {
        Self {
            image_path: image_path.into(),
            actual_label,
        }
    }

    /// Last path component, used as hover text.
    pub fn file_name(&self) -> String {
        self.image_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }

    pub fn path(&self) -> &Path {
        &self.image_path
    }
}

/// The entries shown together: selected cats first, then selected dogs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Page {
    pub entries: Vec<CatalogEntry>,
}

impl Page {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count_of(&self, label: Label) -> usize {
        self.entries
            .iter()
            .filter(|e| e.actual_label == label)
            .count()
    }
}
