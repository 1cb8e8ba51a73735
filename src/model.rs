use std::fs::File;
use std::io::Read;
use std::path::Path;

use image::imageops::FilterType;
use tensorflow::{Graph, ImportGraphDefOptions, Session, SessionOptions, SessionRunArgs, Tensor};
use thiserror::Error;

use crate::labels::CLASS_NAMES;

/// Side length of the square input the model was trained on.
pub const INPUT_SIZE: u32 = 150;
pub const CHANNELS: usize = 3;

const INPUT_OPERATION: &str = "x";
const OUTPUT_OPERATION: &str = "Identity";

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("failed to read model artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Decode(#[from] image::ImageError),

    #[error("tensorflow error: {0}")]
    TensorFlow(String),

    #[error("operation '{0}' not found in graph")]
    MissingOperation(&'static str),

    #[error("model returned {actual} scores, expected {expected}")]
    OutputShape { expected: usize, actual: usize },
}

fn tf_error(status: tensorflow::Status) -> ModelError {
    ModelError::TensorFlow(status.to_string())
}

/// Normalized `[1, 150, 150, 3]` input, stored row-major (HWC).
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessedImage {
    data: Vec<f32>,
}

impl PreprocessedImage {
    pub fn shape(&self) -> [u64; 4] {
        [1, INPUT_SIZE as u64, INPUT_SIZE as u64, CHANNELS as u64]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Decodes an uploaded image and turns it into the model's input tensor.
pub fn preprocess_image(image_data: &[u8]) -> Result<PreprocessedImage, ModelError> {
    let img = image::load_from_memory(image_data)?;

    let resized = img
        .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom)
        .to_rgb8();

    let data = resized
        .pixels()
        .flat_map(|pixel| pixel.0)
        .map(|channel| channel as f32 / 255.0)
        .collect();

    Ok(PreprocessedImage { data })
}

/// Index of the highest score; the first one wins on ties. A NaN score
/// wins outright, the first NaN if there are several.
pub fn predicted_index(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            return Some(i);
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}

/// Anything that can score a preprocessed leaf image.
pub trait Classifier: Send {
    fn classify(&self, input: &PreprocessedImage) -> Result<Vec<f32>, ModelError>;
}

/// Frozen TensorFlow graph loaded once at startup.
pub struct Model {
    session: Session,
    graph: Graph,
}

impl Model {
    pub fn load(model_path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let mut graph = Graph::new();
        let mut model_file = File::open(model_path.as_ref())?;
        let mut model_bytes = Vec::new();
        model_file.read_to_end(&mut model_bytes)?;

        graph
            .import_graph_def(&model_bytes, &ImportGraphDefOptions::new())
            .map_err(tf_error)?;

        let session = Session::new(&SessionOptions::new(), &graph).map_err(tf_error)?;

        let model = Model { session, graph };
        model.operation(INPUT_OPERATION)?;
        model.operation(OUTPUT_OPERATION)?;
        Ok(model)
    }

    fn operation(&self, name: &'static str) -> Result<tensorflow::Operation, ModelError> {
        self.graph
            .operation_by_name(name)
            .map_err(|e| tf_error(e.into()))?
            .ok_or(ModelError::MissingOperation(name))
    }
}

impl Classifier for Model {
    fn classify(&self, input: &PreprocessedImage) -> Result<Vec<f32>, ModelError> {
        let mut input_tensor = Tensor::<f32>::new(&input.shape());
        input_tensor.copy_from_slice(input.as_slice());

        let input_operation = self.operation(INPUT_OPERATION)?;
        let output_operation = self.operation(OUTPUT_OPERATION)?;

        let mut args = SessionRunArgs::new();
        args.add_feed(&input_operation, 0, &input_tensor);
        let output_token = args.request_fetch(&output_operation, 0);
        self.session.run(&mut args).map_err(tf_error)?;

        let output_tensor: Tensor<f32> = args.fetch(output_token).map_err(tf_error)?;
        let scores = output_tensor.to_vec();

        if scores.len() != CLASS_NAMES.len() {
            return Err(ModelError::OutputShape {
                expected: CLASS_NAMES.len(),
                actual: scores.len(),
            });
        }
        Ok(scores)
    }
}
