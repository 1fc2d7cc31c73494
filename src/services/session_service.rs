use crate::config::TesterConfig;
use crate::error::AppError;
use crate::events::{self, EventSink};
use crate::models::catalog_types::{Label, Page};
use crate::models::classify_types::{ClassificationResult, ClassifyProgress, PageSummary};
use crate::services::catalog_service::{Catalog, Pager};
use crate::services::classifier::adapter::{classify_sequentially, ImageClassifier};
use crate::services::image_service::{self, LoadedImage, LoaderOptions};
use tracing::{info, warn};

pub const LOW_ACCURACY_WARNING: &str = "Warning: 0 matches detected!\n\n\
Please check if your model was trained correctly.\n\n\
Expected labels:\n\
\u{2022} \"Cat\" (or \"Class 1\") for cat images\n\
\u{2022} \"Dog\" (or \"Class 2\") for dog images";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// The current page, its images and results, and the running score.
pub struct TestSession {
    pager: Pager,
    loader: LoaderOptions,
    page: Page,
    images: Vec<LoadedImage>,
    results: Vec<Option<ClassificationResult>>,
    correct_count: usize,
    all_loaded: bool,
    all_classified: bool,
}

impl TestSession {
    pub fn new(pager: Pager, loader: LoaderOptions) -> Self {
        Self {
            pager,
            loader,
            page: Page::default(),
            images: Vec::new(),
            results: Vec::new(),
            correct_count: 0,
            all_loaded: false,
            all_classified: false,
        }
    }

    pub fn from_config(config: &TesterConfig) -> Result<Self, AppError> {
        let cats = Catalog::from_source(Label::Cat, &config.cats)?;
        let dogs = Catalog::from_source(Label::Dog, &config.dogs)?;
        info!("Catalog has {} cats and {} dogs", cats.len(), dogs.len());

        let pager = Pager::with_steps(cats, dogs, config.per_label, config.back_step);
        let loader = LoaderOptions {
            target_size: config.target_size,
            placeholder_size: config.placeholder_size,
        };
        Ok(Self::new(pager, loader))
    }

    /// Clears all per-page state and generates the next page.
    pub fn begin_page(&mut self, direction: Direction) -> &Page {
        self.page = match direction {
            Direction::Next => self.pager.next_page(),
            Direction::Previous => self.pager.previous_page(),
        };
        self.images.clear();
        self.results = vec![None; self.page.len()];
        self.correct_count = 0;
        self.all_loaded = false;
        self.all_classified = self.page.is_empty();
        &self.page
    }

    pub fn set_images(&mut self, images: Vec<LoadedImage>) {
        self.all_loaded = images.len() == self.page.len();
        self.images = images;
    }

    /// Fills a result slot. Slots are written once per page; later writes
    /// are dropped.
    pub fn record(&mut self, index: usize, result: ClassificationResult) {
        let Some(slot) = self.results.get_mut(index) else {
            warn!("Result for index {} is outside the page", index);
            return;
        };
        if slot.is_some() {
            warn!("Result for index {} already recorded", index);
            return;
        }

        if result.is_correct(self.page.entries[index].actual_label) {
            self.correct_count += 1;
        }
        *slot = Some(result);
        self.all_classified = self.results.iter().all(Option::is_some);
    }

    /// Generates, loads and classifies one page, emitting progress on `sink`.
    pub async fn run_page<C, S>(&mut self, direction: Direction, classifier: &mut C, sink: &S) -> PageSummary
    where
        C: ImageClassifier + ?Sized,
        S: EventSink + ?Sized,
    {
        self.begin_page(direction);
        let total = self.page.len();

        let images = image_service::load_page(&self.page, self.loader).await;
        self.set_images(images);
        events::emit(
            sink,
            events::PAGE_LOADED,
            &serde_json::json!({
                "total": total,
                "placeholders": self.images.iter().filter(|i| i.is_placeholder()).count(),
            }),
        );

        let images = std::mem::take(&mut self.images);
        for (index, result) in classify_sequentially(classifier, &images) {
            self.record(index, result);
            events::emit(
                sink,
                events::CLASSIFICATION_PROGRESS,
                &ClassifyProgress {
                    current: index + 1,
                    total,
                    current_file: self.page.entries[index].file_name(),
                    correct: self.correct_count,
                },
            );
        }
        self.images = images;

        let summary = self.summary();
        info!(
            "All images classified: {}/{} correct",
            summary.correct, summary.total
        );
        if summary.low_accuracy_warning {
            warn!("No correct predictions on a page of {}", summary.total);
            events::emit(
                sink,
                events::ALERT,
                &serde_json::json!({ "message": LOW_ACCURACY_WARNING }),
            );
        }
        events::emit(sink, events::PAGE_COMPLETE, &summary);
        summary
    }

    pub fn summary(&self) -> PageSummary {
        let total = self.page.len();
        let accuracy = if total == 0 {
            0.0
        } else {
            self.correct_count as f32 / total as f32 * 100.0
        };
        PageSummary {
            total,
            correct: self.correct_count,
            accuracy,
            low_accuracy_warning: self.all_classified && total > 0 && self.correct_count == 0,
            can_go_back: self.pager.can_go_back(),
        }
    }

    pub fn reset_cursors(&mut self) {
        self.pager.reset();
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn images(&self) -> &[LoadedImage] {
        &self.images
    }

    pub fn results(&self) -> &[Option<ClassificationResult>] {
        &self.results
    }

    pub fn correct_count(&self) -> usize {
        self.correct_count
    }

    pub fn all_loaded(&self) -> bool {
        self.all_loaded
    }

    pub fn all_classified(&self) -> bool {
        self.all_classified
    }

    pub fn cursors(&self) -> (usize, usize) {
        self.pager.cursors()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::testing::RecordingSink;
    use crate::models::classify_types::PredictedLabel;
    use crate::services::classifier::adapter::testing::{pred, ScriptedClassifier};
    use std::path::Path;

    fn session(cats: u32, dogs: u32, dir: &Path) -> TestSession {
        let pager = Pager::new(
            Catalog::numbered(Label::Cat, &dir.join("cats"), 0, cats - 1, "jpg"),
            Catalog::numbered(Label::Dog, &dir.join("dogs"), 0, dogs - 1, "jpg"),
        );
        TestSession::new(pager, LoaderOptions::default())
    }

    #[tokio::test]
    async fn test_counts_correct_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(8, 8, dir.path());
        // Cats 0..5 then dogs 0..5; the model always answers "Class 1".
        let mut classifier = ScriptedClassifier::always("Class 1", 0.9, 10);
        let sink = RecordingSink::default();

        let summary = session.run_page(Direction::Next, &mut classifier, &sink).await;

        assert_eq!(summary.total, 10);
        assert_eq!(summary.correct, 5);
        assert!((summary.accuracy - 50.0).abs() < 1e-4);
        assert!(!summary.low_accuracy_warning);
        assert!(session.all_loaded());
        assert!(session.all_classified());
        assert_eq!(classifier.calls, 10);
        assert_eq!(sink.payloads(events::CLASSIFICATION_PROGRESS).len(), 10);
        assert_eq!(sink.names().last().map(String::as_str), Some(events::PAGE_COMPLETE));
    }

    #[tokio::test]
    async fn test_all_errors_scores_zero_and_warns() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(8, 8, dir.path());
        let mut classifier = ScriptedClassifier::new(
            (0..10).map(|_| Err(AppError::classification("offline"))).collect(),
        );
        let sink = RecordingSink::default();

        let summary = session.run_page(Direction::Next, &mut classifier, &sink).await;

        assert_eq!(summary.correct, 0);
        assert!(summary.low_accuracy_warning);
        assert!(session.all_classified());
        assert!(session.results().iter().all(|r| r.as_ref().is_some_and(|r| r.is_error())));
        let alerts = sink.payloads(events::ALERT);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0]["message"], LOW_ACCURACY_WARNING);
    }

    #[tokio::test]
    async fn test_counters_reset_between_pages() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(8, 8, dir.path());
        let sink = RecordingSink::default();

        let mut perfect = ScriptedClassifier::new(
            (0..10)
                .map(|i| Ok(vec![pred(if i < 5 { "Cat" } else { "Dog" }, 1.0)]))
                .collect(),
        );
        let first = session.run_page(Direction::Next, &mut perfect, &sink).await;
        assert_eq!(first.correct, 10);
        assert_eq!(session.cursors(), (5, 5));

        let mut wrong = ScriptedClassifier::always("Class 3", 0.6, 6);
        let second = session.run_page(Direction::Next, &mut wrong, &sink).await;
        assert_eq!(second.total, 6);
        assert_eq!(second.correct, 0);
        assert_eq!(session.cursors(), (0, 0));
        assert_eq!(
            session.results()[0],
            Some(ClassificationResult::Predicted {
                label: PredictedLabel::Unrecognized("Class 3".to_string()),
                confidence: 0.6,
            })
        );
    }

    #[tokio::test]
    async fn test_missing_images_still_classified() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(3, 3, dir.path());
        let mut classifier = ScriptedClassifier::always("Dog", 0.5, 6);
        let sink = RecordingSink::default();

        session.run_page(Direction::Next, &mut classifier, &sink).await;
        assert_eq!(session.images().len(), 6);
        assert!(session.images().iter().all(|i| i.is_placeholder()));
        assert_eq!(sink.payloads(events::PAGE_LOADED)[0]["placeholders"], 6);
        assert_eq!(session.correct_count(), 3);
    }

    #[test]
    fn test_record_fills_each_slot_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(1, 1, dir.path());
        session.begin_page(Direction::Next);
        assert!(!session.all_classified());

        let cat = ClassificationResult::Predicted {
            label: PredictedLabel::Known(Label::Cat),
            confidence: 0.9,
        };
        session.record(0, cat.clone());
        session.record(0, cat);
        session.record(7, ClassificationResult::Error { message: "x".into() });
        assert_eq!(session.correct_count(), 1);
        assert!(!session.all_classified());

        session.record(1, ClassificationResult::Error { message: "x".into() });
        assert!(session.all_classified());
    }

    #[test]
    fn test_from_config_builds_catalogs() {
        let session = TestSession::from_config(&TesterConfig::default()).unwrap();
        assert_eq!(session.cursors(), (0, 0));
        assert!(session.page().is_empty());
    }
}
