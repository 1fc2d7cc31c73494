use crate::error::AppError;
use crate::models::catalog_types::Label;
use crate::models::classify_types::{ClassificationResult, PredictedLabel, Prediction};
use crate::services::image_service::LoadedImage;
use image::RgbImage;
use tracing::{debug, error};

/// Something that turns an image into ranked predictions, best first.
pub trait ImageClassifier {
    fn classify(&mut self, image: &RgbImage) -> Result<Vec<Prediction>, AppError>;
}

impl<C: ImageClassifier + ?Sized> ImageClassifier for Box<C> {
    fn classify(&mut self, image: &RgbImage) -> Result<Vec<Prediction>, AppError> {
        (**self).classify(image)
    }
}

/// Maps the trainer's default class names onto domain labels. Names that
/// already read exactly "Cat"/"Dog" pass through; anything else is kept
/// verbatim.
pub fn normalize_label(raw: &str) -> PredictedLabel {
    match raw {
        "Cat" => return PredictedLabel::Known(Label::Cat),
        "Dog" => return PredictedLabel::Known(Label::Dog),
        _ => {}
    }
    match raw.to_lowercase().as_str() {
        "class 1" | "class1" => PredictedLabel::Known(Label::Cat),
        "class 2" | "class2" => PredictedLabel::Known(Label::Dog),
        _ => PredictedLabel::Unrecognized(raw.to_string()),
    }
}

/// Keeps only the top-ranked candidate.
pub fn interpret(outcome: Result<Vec<Prediction>, AppError>) -> ClassificationResult {
    match outcome {
        Err(e) => ClassificationResult::Error { message: e.message },
        Ok(predictions) => match predictions.into_iter().next() {
            None => ClassificationResult::Error {
                message: "No classifications returned".to_string(),
            },
            Some(top) => ClassificationResult::Predicted {
                label: normalize_label(&top.class_name),
                confidence: top.confidence.clamp(0.0, 1.0),
            },
        },
    }
}

/// Classifies images one at a time in index order. Each call to `next`
/// runs exactly one classification, so the caller sees every completion.
pub struct SequentialClassifier<'a, C: ?Sized> {
    classifier: &'a mut C,
    images: &'a [LoadedImage],
    next: usize,
}

pub fn classify_sequentially<'a, C: ImageClassifier + ?Sized>(
    classifier: &'a mut C,
    images: &'a [LoadedImage],
) -> SequentialClassifier<'a, C> {
    SequentialClassifier {
        classifier,
        images,
        next: 0,
    }
}

impl<C: ImageClassifier + ?Sized> Iterator for SequentialClassifier<'_, C> {
    type Item = (usize, ClassificationResult);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next;
        let loaded = self.images.get(index)?;
        self.next += 1;

        let result = interpret(self.classifier.classify(&loaded.image));
        match &result {
            ClassificationResult::Error { message } => {
                error!("Classification error at index {}: {}", index, message)
            }
            ClassificationResult::Predicted { label, confidence } => {
                debug!("Classification {}: {} ({:.3})", index, label, confidence)
            }
        }
        Some((index, result))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.images.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl<C: ImageClassifier + ?Sized> ExactSizeIterator for SequentialClassifier<'_, C> {}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;

    /// Replays canned outcomes and counts calls.
    pub struct ScriptedClassifier {
        pub outcomes: VecDeque<Result<Vec<Prediction>, AppError>>,
        pub calls: usize,
    }

    impl ScriptedClassifier {
        pub fn new(outcomes: Vec<Result<Vec<Prediction>, AppError>>) -> Self {
            Self {
                outcomes: outcomes.into(),
                calls: 0,
            }
        }

        pub fn always(class_name: &str, confidence: f32, count: usize) -> Self {
            Self::new((0..count).map(|_| Ok(vec![pred(class_name, confidence)])).collect())
        }
    }

    impl ImageClassifier for ScriptedClassifier {
        fn classify(&mut self, _image: &RgbImage) -> Result<Vec<Prediction>, AppError> {
            self.calls += 1;
            self.outcomes
                .pop_front()
                .unwrap_or_else(|| Err(AppError::classification("script exhausted")))
        }
    }

    pub fn pred(class_name: &str, confidence: f32) -> Prediction {
        Prediction {
            class_name: class_name.to_string(),
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{pred, ScriptedClassifier};
    use super::*;
    use crate::services::image_service::placeholder;

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("Class 1"), PredictedLabel::Known(Label::Cat));
        assert_eq!(normalize_label("CLASS2"), PredictedLabel::Known(Label::Dog));
        assert_eq!(normalize_label("class1"), PredictedLabel::Known(Label::Cat));
        assert_eq!(normalize_label("class 2"), PredictedLabel::Known(Label::Dog));
        assert_eq!(normalize_label("Cat"), PredictedLabel::Known(Label::Cat));
        assert_eq!(normalize_label("Dog"), PredictedLabel::Known(Label::Dog));
        assert_eq!(
            normalize_label("Class 3"),
            PredictedLabel::Unrecognized("Class 3".to_string())
        );
    }

    #[test]
    fn test_normalize_label_is_exact_for_names() {
        assert_eq!(normalize_label("cat"), PredictedLabel::Unrecognized("cat".to_string()));
        assert_eq!(normalize_label("DOG"), PredictedLabel::Unrecognized("DOG".to_string()));
        assert_eq!(
            normalize_label(" Class 1 "),
            PredictedLabel::Unrecognized(" Class 1 ".to_string())
        );
    }

    #[test]
    fn test_lowercase_name_scores_incorrect() {
        let result = interpret(Ok(vec![pred("cat", 0.95)]));
        assert!(!result.is_correct(Label::Cat));
    }

    #[test]
    fn test_interpret_takes_first_candidate() {
        let result = interpret(Ok(vec![pred("Class 2", 0.7), pred("Class 1", 0.3)]));
        assert_eq!(
            result,
            ClassificationResult::Predicted {
                label: PredictedLabel::Known(Label::Dog),
                confidence: 0.7
            }
        );
    }

    #[test]
    fn test_interpret_empty_and_error() {
        assert!(interpret(Ok(Vec::new())).is_error());
        assert!(interpret(Err(AppError::classification("session failed"))).is_error());
    }

    #[test]
    fn test_sequential_yields_each_index_once() {
        let images: Vec<_> = (0..3).map(|_| placeholder(Label::Cat, 8)).collect();
        let mut classifier = ScriptedClassifier::new(vec![
            Ok(vec![pred("Class 1", 0.9)]),
            Err(AppError::classification("boom")),
            Ok(vec![]),
        ]);

        let mut seen = Vec::new();
        let mut iter = classify_sequentially(&mut classifier, &images);
        assert_eq!(iter.len(), 3);
        while let Some((i, result)) = iter.next() {
            seen.push((i, result.is_error()));
        }
        assert_eq!(seen, vec![(0, false), (1, true), (2, true)]);
        assert_eq!(classifier.calls, 3);
    }

    #[test]
    fn test_sequential_is_lazy() {
        let images: Vec<_> = (0..4).map(|_| placeholder(Label::Dog, 8)).collect();
        let mut classifier = ScriptedClassifier::always("Dog", 0.8, 4);
        {
            let mut iter = classify_sequentially(&mut classifier, &images);
            iter.next();
            iter.next();
        }
        assert_eq!(classifier.calls, 2);
    }
}
