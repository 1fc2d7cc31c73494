use crate::config::TesterConfig;
use crate::error::AppError;
use crate::events::{self, EventSink};
use crate::models::classify_types::{ModelMetadata, ModelStatus, PageSummary};
use crate::services::classifier::adapter::ImageClassifier;
use crate::services::classifier::inference::OnnxClassifier;
use crate::services::classifier::model_manager::{ModelLocation, ModelManager};
use crate::services::report_service::{self, ViewState};
use crate::services::session_service::{Direction, TestSession};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    Completed(PageSummary),
    /// A page was in progress, or no model is loaded yet.
    Ignored,
}

const INVALID_MODEL_ALERT: &str = "Invalid Teachable Machine URL";

struct TesterState<C> {
    session: Option<TestSession>,
    classifier: Option<C>,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Translates UI triggers (load model, next, back) into session calls.
pub struct Tester<C = OnnxClassifier> {
    config: TesterConfig,
    model_manager: ModelManager,
    state: Mutex<TesterState<C>>,
    metadata: Mutex<Option<ModelMetadata>>,
    busy: AtomicBool,
    sink: Arc<dyn EventSink>,
}

impl<C: ImageClassifier> Tester<C> {
    pub fn new(config: TesterConfig, sink: Arc<dyn EventSink>) -> Self {
        let model_manager = ModelManager::new(&config);
        Self {
            config,
            model_manager,
            state: Mutex::new(TesterState {
                session: None,
                classifier: None,
            }),
            metadata: Mutex::new(None),
            busy: AtomicBool::new(false),
            sink,
        }
    }

    fn try_begin(&self) -> Option<BusyGuard<'_>> {
        if self.busy.swap(true, Ordering::SeqCst) {
            debug!("Trigger ignored: page in progress");
            None
        } else {
            Some(BusyGuard(&self.busy))
        }
    }

    /// Uses an already constructed classifier: cursors restart at the
    /// beginning and the first page is run.
    pub async fn install_model(&self, metadata: ModelMetadata, classifier: C) -> Result<TriggerOutcome, AppError> {
        let Some(_guard) = self.try_begin() else {
            return Ok(TriggerOutcome::Ignored);
        };
        self.install_locked(metadata, classifier).await
    }

    async fn install_locked(&self, metadata: ModelMetadata, classifier: C) -> Result<TriggerOutcome, AppError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        match state.session.as_mut() {
            Some(session) => session.reset_cursors(),
            None => state.session = Some(TestSession::from_config(&self.config)?),
        }
        state.classifier = Some(classifier);
        *self.metadata.lock().await = Some(metadata);
        events::emit(&*self.sink, events::MODEL_STATUS, &json!({ "status": "loaded" }));

        self.run_locked(state, Direction::Next).await
    }

    pub async fn next_page(&self) -> Result<TriggerOutcome, AppError> {
        self.navigate(Direction::Next).await
    }

    pub async fn previous_page(&self) -> Result<TriggerOutcome, AppError> {
        self.navigate(Direction::Previous).await
    }

    async fn navigate(&self, direction: Direction) -> Result<TriggerOutcome, AppError> {
        let Some(_guard) = self.try_begin() else {
            return Ok(TriggerOutcome::Ignored);
        };
        let mut state = self.state.lock().await;
        self.run_locked(&mut state, direction).await
    }

    async fn run_locked(&self, state: &mut TesterState<C>, direction: Direction) -> Result<TriggerOutcome, AppError> {
        let (Some(session), Some(classifier)) = (state.session.as_mut(), state.classifier.as_mut()) else {
            debug!("Trigger ignored: no model loaded");
            return Ok(TriggerOutcome::Ignored);
        };
        let summary = session.run_page(direction, classifier, &*self.sink).await;
        Ok(TriggerOutcome::Completed(summary))
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Does not wait for a page in progress.
    pub async fn status(&self) -> ModelStatus {
        let metadata = self.metadata.lock().await;
        ModelStatus {
            loaded: metadata.is_some(),
            busy: self.is_busy(),
            model_name: metadata.as_ref().and_then(|m| m.model_name.clone()),
            labels: metadata
                .as_ref()
                .map(|m| m.labels.clone())
                .unwrap_or_default(),
        }
    }

    /// Shows the classifying banner while a page holds the session.
    pub async fn render_text(&self) -> String {
        let Ok(state) = self.state.try_lock() else {
            return banner_text(ViewState::Classifying);
        };
        match &state.session {
            Some(session) => report_service::render_text(session),
            None => banner_text(ViewState::NoModel),
        }
    }

    /// HTML for the current page, or `None` before the first page.
    pub async fn render_html(&self) -> Result<Option<String>, AppError> {
        let state = self.state.lock().await;
        match &state.session {
            Some(session) if session.all_classified() => {
                report_service::render_html(session, self.config.canvas_width).map(Some)
            }
            _ => Ok(None),
        }
    }
}

fn banner_text(view: ViewState) -> String {
    let banner = report_service::banner(view).unwrap_or_default();
    format!("{}\n{}\n", report_service::TITLE, banner)
}

impl Tester<OnnxClassifier> {
    /// Validates the location through its metadata, loads the ONNX model,
    /// then runs the first page. Failures raise an alert and leave the
    /// tester ready for another attempt.
    pub async fn load_model(&self, location: &str) -> Result<TriggerOutcome, AppError> {
        let Some(_guard) = self.try_begin() else {
            return Ok(TriggerOutcome::Ignored);
        };
        events::emit(&*self.sink, events::MODEL_STATUS, &json!({ "status": "loading" }));

        // A blank location reports its own message; anything else that
        // fails is treated as a bad model URL.
        let loaded = match ModelLocation::parse(location) {
            Ok(loc) => self
                .model_manager
                .load(&loc)
                .await
                .map_err(|e| (e, INVALID_MODEL_ALERT.to_string())),
            Err(e) => {
                let alert = e.message.clone();
                Err((e, alert))
            }
        };

        match loaded {
            Ok(model) => {
                info!("Model ready with labels {:?}", model.metadata.labels);
                self.install_locked(model.metadata, model.classifier).await
            }
            Err((e, alert)) => {
                error!("Model loading error: {}", e);
                events::emit(
                    &*self.sink,
                    events::MODEL_STATUS,
                    &json!({ "status": "error", "error": e }),
                );
                events::emit(
                    &*self.sink,
                    events::ALERT,
                    &json!({ "message": alert }),
                );
                Err(e)
            }
        }
    }
}
