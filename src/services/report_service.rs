use crate::error::AppError;
use crate::models::catalog_types::CatalogEntry;
use crate::models::classify_types::{ClassificationResult, PageSummary};
use crate::models::layout_types::{CellAnnotation, GridCell, Rgb};
use crate::services::image_service::{self, LoadedImage};
use crate::services::session_service::TestSession;
use std::fmt::Write;

pub const TITLE: &str = "Teachable Machine Tester";
pub const COLUMNS: usize = 5;
pub const IMAGE_SIZE: f32 = 140.0;
pub const PADDING: f32 = 35.0;
pub const HEADER_HEIGHT: f32 = 120.0;
pub const CAPTION_HEIGHT: f32 = 90.0;
pub const GRID_TOP_MARGIN: f32 = 20.0;
pub const BG_COLOR: &str = "#e8f0fe";
pub const PRIMARY_COLOR: &str = "#1967d2";
pub const BORDER_RADIUS: f32 = 9.0;

pub const CORRECT_BORDER: Rgb = Rgb(0, 200, 0);
pub const INCORRECT_BORDER: Rgb = Rgb(255, 50, 50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    NoModel,
    Classifying,
    Ready,
}

pub fn view_state(model_loaded: bool, session: Option<&TestSession>) -> ViewState {
    match (model_loaded, session) {
        (false, _) | (true, None) => ViewState::NoModel,
        (true, Some(s)) if s.all_classified() => ViewState::Ready,
        (true, Some(_)) => ViewState::Classifying,
    }
}

pub fn banner(state: ViewState) -> Option<&'static str> {
    match state {
        ViewState::NoModel => Some("Enter your model URL above and click LOAD MODEL to begin"),
        ViewState::Classifying => Some("Loading and classifying images..."),
        ViewState::Ready => None,
    }
}

/// Thumbnail positions, five per row, centered on the columns in use.
pub fn grid_layout(count: usize, canvas_width: f32) -> Vec<GridCell> {
    let columns = COLUMNS.min(count).max(1);
    let total_width = columns as f32 * (IMAGE_SIZE + PADDING) - PADDING;
    let start_x = (canvas_width - total_width) / 2.0;

    (0..count)
        .map(|index| {
            let col = index % COLUMNS;
            let row = index / COLUMNS;
            GridCell {
                index,
                x: start_x + col as f32 * (IMAGE_SIZE + PADDING),
                y: HEADER_HEIGHT
                    + GRID_TOP_MARGIN
                    + row as f32 * (IMAGE_SIZE + PADDING + CAPTION_HEIGHT),
            }
        })
        .collect()
}

/// Index of the thumbnail under the pointer, if any.
pub fn hit_test(cells: &[GridCell], x: f32, y: f32) -> Option<usize> {
    cells
        .iter()
        .find(|c| x >= c.x && x <= c.x + IMAGE_SIZE && y >= c.y && y <= c.y + IMAGE_SIZE)
        .map(|c| c.index)
}

pub fn annotate(entry: &CatalogEntry, result: Option<&ClassificationResult>) -> CellAnnotation {
    let is_correct = result.is_some_and(|r| r.is_correct(entry.actual_label));
    let (prediction_text, confidence_text, is_error) = match result {
        Some(ClassificationResult::Predicted { label, confidence }) => (
            label.to_string(),
            Some(format!("{:.1}% confidence", confidence * 100.0)),
            false,
        ),
        _ => ("Error".to_string(), None, true),
    };

    CellAnnotation {
        actual_text: format!("Actual: {}", entry.actual_label),
        prediction_text,
        confidence_text,
        is_error,
        is_correct,
        border: if is_correct {
            CORRECT_BORDER
        } else {
            INCORRECT_BORDER
        },
        tooltip: entry.file_name(),
    }
}

pub fn summary_line(summary: &PageSummary) -> String {
    format!(
        "Total: {}  |  Correct: {}  |  Accuracy: {:.1}%",
        summary.total, summary.correct, summary.accuracy
    )
}

pub fn annotations(session: &TestSession) -> Vec<CellAnnotation> {
    session
        .page()
        .entries
        .iter()
        .zip(session.results())
        .map(|(entry, result)| annotate(entry, result.as_ref()))
        .collect()
}

/// Plain-text rendering for terminals: one line per thumbnail.
pub fn render_text(session: &TestSession) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", TITLE);
    if let Some(text) = banner(view_state(true, Some(session))) {
        let _ = writeln!(out, "{}", text);
        return out;
    }

    let _ = writeln!(out, "{}", summary_line(&session.summary()));
    for (i, (annotation, loaded)) in annotations(session).iter().zip(session.images()).enumerate() {
        let mark = if annotation.is_correct { "ok " } else { "xx " };
        let _ = write!(
            out,
            "{}{:>2}. {:<14} {:<12} {:<10}",
            mark,
            i + 1,
            annotation.tooltip,
            annotation.actual_text,
            annotation.prediction_text
        );
        if let Some(conf) = &annotation.confidence_text {
            let _ = write!(out, " {}", conf);
        }
        if loaded.is_placeholder() {
            let _ = write!(out, " [placeholder]");
        }
        out.push('\n');
    }
    out
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn thumbnail_markup(loaded: &LoadedImage, border: Rgb) -> Result<String, AppError> {
    let style = format!("border-color:{}", border.hex());
    match loaded.caption() {
        Some(caption) => Ok(format!(
            "<div class=\"placeholder\" style=\"{}\">{}</div>",
            style,
            escape_html(caption).replace('\n', "<br>")
        )),
        None => {
            let uri = image_service::thumbnail_data_uri(&loaded.image)?;
            Ok(format!("<img src=\"{}\" style=\"{}\" alt=\"\">", uri, style))
        }
    }
}

/// Self-contained HTML page with embedded thumbnails.
pub fn render_html(session: &TestSession, canvas_width: f32) -> Result<String, AppError> {
    let summary = session.summary();
    let cells = grid_layout(session.page().len(), canvas_width);
    let height = cells
        .last()
        .map(|c| c.y + IMAGE_SIZE + CAPTION_HEIGHT)
        .unwrap_or(HEADER_HEIGHT);

    let mut html = String::new();
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title><style>\
body{{margin:0;background:{bg};font-family:Poppins,sans-serif}}\
.canvas{{position:relative;width:{w}px;height:{h}px;margin:0 auto}}\
h1{{color:{primary};text-align:center;font-size:28px;margin:0;padding-top:25px}}\
.stats{{background:#fff;color:{primary};font-weight:bold;width:500px;height:50px;line-height:50px;\
margin:10px auto 0;text-align:center;border-radius:{r}px}}\
.cell{{position:absolute;width:{s}px;text-align:center;font-size:13px;color:#646464}}\
.cell img,.cell .placeholder{{width:{s}px;height:{s}px;border:6px solid;border-radius:{r}px;\
box-sizing:content-box;margin-left:-6px;margin-top:-6px;display:block}}\
.placeholder{{background:#c8c8c8;color:#646464;font-size:16px;display:flex;align-items:center;justify-content:center}}\
.label{{color:{primary};font-weight:bold}}.error{{color:#f00;font-weight:bold}}\
</style></head><body><div class=\"canvas\">\n<h1>{title}</h1>\n<div class=\"stats\">{stats}</div>\n",
        title = TITLE,
        bg = BG_COLOR,
        primary = PRIMARY_COLOR,
        w = canvas_width,
        h = height,
        r = BORDER_RADIUS,
        s = IMAGE_SIZE,
        stats = escape_html(&summary_line(&summary)),
    );

    for ((cell, annotation), loaded) in cells.iter().zip(annotations(session)).zip(session.images()) {
        let _ = write!(
            html,
            "<div class=\"cell\" style=\"left:{}px;top:{}px\" title=\"{}\">",
            cell.x,
            cell.y,
            escape_html(&annotation.tooltip)
        );
        let thumb = thumbnail_markup(loaded, annotation.border)?;
        let _ = write!(
            html,
            "{}<div>{}</div>",
            thumb,
            escape_html(&annotation.actual_text)
        );
        if annotation.is_error {
            let _ = write!(html, "<div class=\"error\">Error</div>");
        } else {
            let _ = write!(
                html,
                "<div class=\"label\">{}</div><div>{}</div>",
                escape_html(&annotation.prediction_text),
                annotation.confidence_text.as_deref().unwrap_or_default()
            );
        }
        html.push_str("</div>\n");
    }

    html.push_str("</div></body></html>\n");
    Ok(html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog_types::Label;
    use crate::models::classify_types::PredictedLabel;

    #[test]
    fn test_grid_layout_full_page() {
        let cells = grid_layout(10, 1280.0);
        // 5 * 175 - 35 = 840 wide, centered in 1280.
        assert_eq!(cells[0].x, 220.0);
        assert_eq!(cells[0].y, 140.0);
        assert_eq!(cells[4].x, 220.0 + 4.0 * 175.0);
        assert_eq!(cells[5].x, 220.0);
        assert_eq!(cells[5].y, 140.0 + 265.0);
    }

    #[test]
    fn test_grid_layout_centers_short_rows() {
        let cells = grid_layout(2, 1000.0);
        // 2 * 175 - 35 = 315 wide.
        assert_eq!(cells[0].x, (1000.0 - 315.0) / 2.0);
        assert!(grid_layout(0, 1000.0).is_empty());
    }

    #[test]
    fn test_hit_test() {
        let cells = grid_layout(10, 1280.0);
        assert_eq!(hit_test(&cells, 221.0, 141.0), Some(0));
        assert_eq!(hit_test(&cells, 220.0 + 175.0 + 140.0, 140.0 + 265.0), Some(6));
        // Gap between columns.
        assert_eq!(hit_test(&cells, 220.0 + 150.0, 150.0), None);
        assert_eq!(hit_test(&cells, 10.0, 10.0), None);
    }

    #[test]
    fn test_annotate_correct_prediction() {
        let entry = CatalogEntry::new("test_images/cats/8497.jpg", Label::Cat);
        let result = ClassificationResult::Predicted {
            label: PredictedLabel::Known(Label::Cat),
            confidence: 0.9876,
        };
        let a = annotate(&entry, Some(&result));
        assert_eq!(a.actual_text, "Actual: Cat");
        assert_eq!(a.prediction_text, "Cat");
        assert_eq!(a.confidence_text.as_deref(), Some("98.8% confidence"));
        assert_eq!(a.border, CORRECT_BORDER);
        assert_eq!(a.tooltip, "8497.jpg");
    }

    #[test]
    fn test_annotate_error_and_pending() {
        let entry = CatalogEntry::new("dogs/784.jpg", Label::Dog);
        let err = ClassificationResult::Error {
            message: "x".to_string(),
        };
        let a = annotate(&entry, Some(&err));
        assert!(a.is_error);
        assert_eq!(a.prediction_text, "Error");
        assert_eq!(a.border, INCORRECT_BORDER);
        assert!(annotate(&entry, None).is_error);
    }

    #[test]
    fn test_summary_line() {
        let summary = PageSummary {
            total: 10,
            correct: 7,
            accuracy: 70.0,
            low_accuracy_warning: false,
            can_go_back: false,
        };
        assert_eq!(summary_line(&summary), "Total: 10  |  Correct: 7  |  Accuracy: 70.0%");
    }

    #[test]
    fn test_border_hex() {
        assert_eq!(CORRECT_BORDER.hex(), "#00C800");
        assert_eq!(INCORRECT_BORDER.hex(), "#FF3232");
    }

    #[test]
    fn test_view_state_and_banner() {
        assert_eq!(view_state(false, None), ViewState::NoModel);
        assert!(banner(ViewState::NoModel).is_some());
        assert!(banner(ViewState::Ready).is_none());
    }
}
