use crate::config::TensorLayout;
use crate::error::AppError;
use crate::models::classify_types::Prediction;
use crate::services::classifier::adapter::ImageClassifier;
use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;

const PROBABILITY_TOLERANCE: f32 = 1e-3;

/// Builds a `1 x S x S x 3` (or `1 x 3 x S x S`) tensor scaled to [-1, 1].
pub fn image_to_tensor(
    image: &RgbImage,
    input_size: u32,
    layout: TensorLayout,
) -> Result<Array4<f32>, AppError> {
    let resized;
    let rgb = if image.dimensions() == (input_size, input_size) {
        image
    } else {
        resized = image::imageops::resize(image, input_size, input_size, FilterType::Triangle);
        &resized
    };

    let side = input_size as usize;
    let hw = side * side;
    let raw = rgb.as_raw();
    let mut data = vec![0f32; 3 * hw];

    match layout {
        TensorLayout::Nhwc => {
            for (dst, &src) in data.iter_mut().zip(raw.iter()) {
                *dst = src as f32 / 127.5 - 1.0;
            }
        }
        TensorLayout::Nchw => {
            for (i, pixel) in raw.chunks_exact(3).enumerate() {
                data[i] = pixel[0] as f32 / 127.5 - 1.0;
                data[hw + i] = pixel[1] as f32 / 127.5 - 1.0;
                data[2 * hw + i] = pixel[2] as f32 / 127.5 - 1.0;
            }
        }
    }

    let shape = match layout {
        TensorLayout::Nhwc => (1, side, side, 3),
        TensorLayout::Nchw => (1, 3, side, side),
    };
    Array4::from_shape_vec(shape, data)
        .map_err(|e| AppError::classification(format!("Failed to create tensor: {}", e)))
}

/// Exported models usually end in a softmax already; raw logits are
/// converted here.
pub fn to_probabilities(output: &[f32]) -> Vec<f32> {
    let in_range = output.iter().all(|&x| (0.0..=1.0).contains(&x));
    let sum: f32 = output.iter().sum();
    if in_range && (sum - 1.0).abs() <= PROBABILITY_TOLERANCE {
        return output.to_vec();
    }

    let max_logit = output.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp_sum: f32 = output.iter().map(|&x| (x - max_logit).exp()).sum();
    output
        .iter()
        .map(|&x| (x - max_logit).exp() / exp_sum)
        .collect()
}

pub fn rank_predictions(probabilities: &[f32], labels: &[String], top_k: usize) -> Vec<Prediction> {
    let mut indexed: Vec<(usize, f32)> = probabilities.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let top_k = top_k.min(indexed.len());
    indexed[..top_k]
        .iter()
        .map(|&(idx, conf)| {
            let class_name = labels
                .get(idx)
                .cloned()
                .unwrap_or_else(|| format!("class_{}", idx));
            Prediction {
                class_name,
                confidence: conf,
            }
        })
        .collect()
}

/// An ONNX Runtime session plus the class names from the model metadata.
pub struct OnnxClassifier {
    session: Session,
    labels: Vec<String>,
    input_size: u32,
    layout: TensorLayout,
}

impl OnnxClassifier {
    pub fn new(session: Session, labels: Vec<String>, input_size: u32, layout: TensorLayout) -> Self {
        Self {
            session,
            labels,
            input_size,
            layout,
        }
    }

    fn run(&mut self, input: Array4<f32>) -> Result<Vec<f32>, AppError> {
        let input_name = self.session.inputs()[0].name().to_string();

        let input_tensor = Value::from_array(input)
            .map_err(|e| AppError::classification(format!("Failed to create tensor value: {}", e)))?;

        let outputs = self
            .session
            .run(ort::inputs![input_name.as_str() => input_tensor])
            .map_err(|e| AppError::classification(format!("Inference failed: {}", e)))?;

        let output_value = outputs
            .values()
            .next()
            .ok_or_else(|| AppError::classification("Model produced no outputs"))?;

        let (_, data) = output_value
            .try_extract_tensor::<f32>()
            .map_err(|e| AppError::classification(format!("Failed to extract output tensor: {}", e)))?;

        Ok(data.to_vec())
    }
}

impl ImageClassifier for OnnxClassifier {
    fn classify(&mut self, image: &RgbImage) -> Result<Vec<Prediction>, AppError> {
        let tensor = image_to_tensor(image, self.input_size, self.layout)?;
        let output = self.run(tensor)?;
        let probabilities = to_probabilities(&output);
        Ok(rank_predictions(&probabilities, &self.labels, probabilities.len()))
    }
}
