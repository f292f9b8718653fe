use std::path::{Path, PathBuf};

use approx::assert_abs_diff_eq;
use image::{Rgb, RgbImage};
use sample_classify::{LoadError, Sample};
use sample_common::{ModelFormat, SampleParams, TractRuntime};
use tract_core::prelude::*;

fn setup_test_logger() {
    let _ = env_logger::Builder::from_env("SAMPLE_LOG").is_test(true).try_init();
}

/// Writes an NNEF archive whose output is the sum of the first and last
/// sources, all of them shaped `shape`.
fn write_model(dir: &Path, name: &str, sources: usize, shape: [usize; 4]) -> TractResult<PathBuf> {
    let mut model = TypedModel::default();
    let mut inputs = tvec!();
    for ix in 0..sources {
        inputs.push(model.add_source(format!("input_{ix}"), f32::fact(shape))?);
    }
    let scores =
        model.wire_node("scores", tract_core::ops::math::add(), &[inputs[0], inputs[sources - 1]])?;
    model.set_output_outlets(&scores)?;
    let path = dir.join(name);
    let file = std::fs::File::create(&path)?;
    tract_nnef::nnef().with_tract_core().write_to_tar(&model, file)?;
    Ok(path)
}

fn write_image(dir: &Path, name: &str, pixels: [[u8; 3]; 4]) -> PathBuf {
    let mut image = RgbImage::new(2, 2);
    for (ix, rgb) in pixels.iter().enumerate() {
        image.put_pixel(ix as u32 % 2, ix as u32 / 2, Rgb(*rgb));
    }
    let path = dir.join(name);
    image.save(&path).unwrap();
    path
}

const DOG: [[u8; 3]; 4] = [[255, 0, 0], [0, 255, 0], [0, 0, 255], [10, 20, 30]];
const CAT: [[u8; 3]; 4] = [[0, 0, 0], [255, 255, 255], [128, 64, 32], [1, 2, 3]];

fn params(dir: &Path, model: &str, images: &[&str]) -> SampleParams {
    SampleParams {
        data_dirs: vec![dir.join("missing"), dir.to_path_buf()],
        model_file_name: model.to_string(),
        images: images.iter().map(|s| s.to_string()).collect(),
        dla_core: None,
    }
}

fn sample(params: SampleParams) -> Sample<TractRuntime> {
    let runtime = TractRuntime::for_path(&params.model_file_name).unwrap();
    Sample::new(params, runtime)
}

/// Planar RGB of the image, doubled by the model, then softmaxed.
fn expected(pixels: [[u8; 3]; 4]) -> Vec<f32> {
    let mut scores = vec![];
    for channel in 0..3 {
        for px in pixels {
            scores.push(2.0 * f32::from(px[channel]) / 255.0);
        }
    }
    let sum: f32 = scores.iter().map(|x| x.exp()).sum();
    scores.iter().map(|x| x.exp() / sum).collect()
}

#[test]
fn classifies_one_image() {
    setup_test_logger();
    let dir = tempfile::tempdir().unwrap();
    write_model(dir.path(), "tiny.nnef.tar", 1, [1, 3, 2, 2]).unwrap();
    write_image(dir.path(), "dog.0.png", DOG);

    let mut sample = sample(params(dir.path(), "tiny.nnef.tar", &["dog.0.png"]));
    sample.build().unwrap();
    assert_eq!(sample.input_geometry().unwrap().batch, 1);
    let results = sample.infer().unwrap();
    assert_eq!(results.len(), 1);
    let (name, classification) = &results[0];
    assert_eq!(name, "dog.0.png");
    let expected = expected(DOG);
    assert_eq!(classification.probabilities.len(), expected.len());
    for (got, exp) in classification.probabilities.iter().zip(expected.iter()) {
        assert_abs_diff_eq!(*got, *exp, epsilon = 1e-5);
    }
    let sum: f32 = classification.probabilities.iter().sum();
    assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-5);
}

#[test]
fn batches_images_in_order() {
    setup_test_logger();
    let dir = tempfile::tempdir().unwrap();
    write_model(dir.path(), "batch.nnef.tar", 1, [2, 3, 2, 2]).unwrap();
    write_image(dir.path(), "dog.0.png", DOG);
    write_image(dir.path(), "cat.0.png", CAT);

    let mut sample =
        sample(params(dir.path(), "batch.nnef.tar", &["dog.0.png", "cat.0.png", "dog.0.png"]));
    sample.build().unwrap();
    assert_eq!(sample.input_geometry().unwrap().batch, 2);
    let results = sample.infer().unwrap();
    let names: Vec<&str> = results.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["dog.0.png", "cat.0.png", "dog.0.png"]);

    // each batch item is normalized on its own
    for ((_, classification), pixels) in results.iter().zip([DOG, CAT, DOG]) {
        for (got, exp) in classification.probabilities.iter().zip(expected(pixels).iter()) {
            assert_abs_diff_eq!(*got, *exp, epsilon = 1e-5);
        }
    }
}

#[test]
fn three_bindings_fail_the_build() {
    setup_test_logger();
    let dir = tempfile::tempdir().unwrap();
    write_model(dir.path(), "two-inputs.nnef.tar", 2, [1, 3, 2, 2]).unwrap();
    let mut sample = sample(params(dir.path(), "two-inputs.nnef.tar", &["dog.0.png"]));
    let err = sample.build().unwrap_err();
    assert_eq!(
        err.downcast_ref::<LoadError>(),
        Some(&LoadError::Bindings { count: 3, inputs: 2, outputs: 1 })
    );
    assert!(sample.infer().is_err());
}

#[test]
fn missing_model_fails_the_build() {
    setup_test_logger();
    let dir = tempfile::tempdir().unwrap();
    let mut sample = sample(params(dir.path(), "dogs_vs_cats_model.onnx", &["dog.0.jpg"]));
    assert!(sample.build().is_err());
}

#[test]
fn missing_image_fails_inference() {
    setup_test_logger();
    let dir = tempfile::tempdir().unwrap();
    write_model(dir.path(), "tiny.nnef.tar", 1, [1, 3, 2, 2]).unwrap();
    let mut sample = sample(params(dir.path(), "tiny.nnef.tar", &["dog.0.jpg"]));
    sample.build().unwrap();
    let err = sample.infer().unwrap_err();
    assert!(err.to_string().contains("dog.0.jpg"));
}

#[test]
fn runtime_reads_nnef_archives() {
    use sample_common::{Engine, InferenceRuntime};
    let dir = tempfile::tempdir().unwrap();
    let path = write_model(dir.path(), "tiny.nnef.tar", 1, [1, 3, 2, 2]).unwrap();
    let runtime = TractRuntime::new(ModelFormat::Nnef);
    let engine = runtime.deserialize(&std::fs::read(path).unwrap()).unwrap();
    assert_eq!(engine.binding_count(), 2);
    assert!(engine.is_input_binding(0));
    assert!(!engine.is_input_binding(1));
    assert_eq!(engine.binding_shape(0).unwrap().as_slice(), &[1, 3, 2, 2]);
    assert_eq!(engine.binding_shape(1).unwrap().as_slice(), &[1, 3, 2, 2]);
    assert_eq!(engine.binding_index("input_0"), Some(0));
}
