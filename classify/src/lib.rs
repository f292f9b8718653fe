#[macro_use]
extern crate log;

pub mod loader;
pub mod postprocess;
pub mod preprocess;
pub mod sample;

use sample_common::SampleDefaults;

pub use loader::LoadError;
pub use postprocess::Classification;
pub use preprocess::{PixelGrid, PreprocessError};
pub use sample::Sample;

pub const SAMPLE_NAME: &str = "tract.sample_classify";

pub const DEFAULTS: SampleDefaults = SampleDefaults {
    data_dirs: &["data/classify/", "data/samples/classify/"],
    model_file_name: "dogs_vs_cats_model.onnx",
    images: &["dog.0.jpg"],
};
