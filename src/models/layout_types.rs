use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

/// Top-left corner of one thumbnail in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridCell {
    pub index: usize,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellAnnotation {
    pub actual_text: String,
    pub prediction_text: String,
    pub confidence_text: Option<String>,
    pub is_error: bool,
    pub is_correct: bool,
    pub border: Rgb,
    pub tooltip: String,
}
