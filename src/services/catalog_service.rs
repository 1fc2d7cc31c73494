use crate::config::CatalogSource;
use crate::error::AppError;
use crate::models::catalog_types::{CatalogEntry, Label, Page};
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff", "tif"];

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Ordered test images for a single label.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    label: Label,
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new(label: Label, entries: Vec<CatalogEntry>) -> Self {
        Self { label, entries }
    }

    /// `<dir>/<n>.<ext>` for `n` in `first..=last`. Paths are not checked;
    /// missing files become placeholders at load time.
    pub fn numbered(label: Label, dir: &Path, first: u32, last: u32, extension: &str) -> Self {
        let entries = (first..=last)
            .map(|n| CatalogEntry::new(dir.join(format!("{}.{}", n, extension)), label))
            .collect();
        Self { label, entries }
    }

    pub fn scan_dir(label: Label, dir: &Path) -> Result<Self, AppError> {
        if !dir.exists() {
            return Err(format!("Path does not exist: {}", dir.display()).into());
        }

        let mut paths: Vec<_> = WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_image_file(e.path()))
            .map(|e| e.into_path())
            .collect();
        paths.sort();

        debug!("Scanned {} {} images in {}", paths.len(), label, dir.display());
        let entries = paths
            .into_iter()
            .map(|p| CatalogEntry::new(p, label))
            .collect();
        Ok(Self { label, entries })
    }

    pub fn from_source(label: Label, source: &CatalogSource) -> Result<Self, AppError> {
        match source {
            CatalogSource::Numbered {
                dir,
                first,
                last,
                extension,
            } => Ok(Self::numbered(label, dir, *first, *last, extension)),
            CatalogSource::Directory { dir } => Self::scan_dir(label, dir),
        }
    }

    pub fn label(&self) -> Label {
        self.label
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }
}

/// Per-label cursor into a catalog.
#[derive(Debug, Clone, PartialEq)]
struct Track {
    catalog: Catalog,
    cursor: usize,
}

impl Track {
    /// Takes up to `count` entries from the cursor. A cursor that reaches
    /// the end is reset to 0 rather than reduced modulo the length.
    fn take(&mut self, count: usize) -> Vec<CatalogEntry> {
        let len = self.catalog.len();
        let start = self.cursor.min(len);
        let taken = count.min(len - start);
        let slice = self.catalog.entries[start..start + taken].to_vec();

        self.cursor = start + taken;
        if self.cursor >= len {
            if len > 0 {
                info!(
                    "All {} images shown, resetting to start",
                    self.catalog.label()
                );
            }
            self.cursor = 0;
        }
        slice
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pager {
    cats: Track,
    dogs: Track,
    per_label: usize,
    back_step: usize,
}

impl Pager {
    pub const DEFAULT_PER_LABEL: usize = 5;
    pub const DEFAULT_BACK_STEP: usize = 10;

    pub fn new(cats: Catalog, dogs: Catalog) -> Self {
        Self::with_steps(cats, dogs, Self::DEFAULT_PER_LABEL, Self::DEFAULT_BACK_STEP)
    }

    pub fn with_steps(cats: Catalog, dogs: Catalog, per_label: usize, back_step: usize) -> Self {
        Self {
            cats: Track {
                catalog: cats,
                cursor: 0,
            },
            dogs: Track {
                catalog: dogs,
                cursor: 0,
            },
            per_label,
            back_step,
        }
    }

    pub fn next_page(&mut self) -> Page {
        let mut entries = self.cats.take(self.per_label);
        entries.extend(self.dogs.take(self.per_label));
        debug!(
            "Generated page of {} (cursors {:?})",
            entries.len(),
            self.cursors()
        );
        Page { entries }
    }

    /// Steps both cursors back, clamped at 0, then generates a page.
    /// Near a catalog boundary this can repeat a page already seen.
    pub fn previous_page(&mut self) -> Page {
        self.cats.cursor = self.cats.cursor.saturating_sub(self.back_step);
        self.dogs.cursor = self.dogs.cursor.saturating_sub(self.back_step);
        self.next_page()
    }

    pub fn reset(&mut self) {
        self.cats.cursor = 0;
        self.dogs.cursor = 0;
    }

    pub fn cursors(&self) -> (usize, usize) {
        (self.cats.cursor, self.dogs.cursor)
    }

    pub fn can_go_back(&self) -> bool {
        !(self.cats.cursor <= self.per_label && self.dogs.cursor <= self.per_label)
    }
}
