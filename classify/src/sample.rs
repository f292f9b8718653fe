use std::sync::Arc;

use anyhow::{Context, Result, ensure};
use sample_common::{
    Binding, BufferManager, Engine, ExecutionContext, InferenceRuntime, SampleParams, locate_file,
};

use crate::loader::{inspect_bindings, load_engine};
use crate::postprocess::{Classification, verify_output};
use crate::preprocess::{InputGeometry, PixelGrid, fill_batch, read_image};

struct Built<E> {
    engine: Arc<E>,
    input: Binding,
    output: Binding,
    geometry: InputGeometry,
}

/// Loads an engine, then classifies every configured image with it.
pub struct Sample<R: InferenceRuntime> {
    params: SampleParams,
    runtime: R,
    built: Option<Built<R::Engine>>,
}

impl<R: InferenceRuntime> Sample<R> {
    pub fn new(params: SampleParams, runtime: R) -> Sample<R> {
        Sample { params, runtime, built: None }
    }

    pub fn input_geometry(&self) -> Option<&InputGeometry> {
        self.built.as_ref().map(|b| &b.geometry)
    }

    pub fn build(&mut self) -> Result<()> {
        let path = locate_file(&self.params.model_file_name, &self.params.data_dirs)?;
        info!("Importing engine {:?}", path);
        let engine = load_engine(&self.runtime, &path)?;
        let (input, output) = inspect_bindings(&engine)?;
        let geometry = InputGeometry::from_dims(&input.shape)
            .with_context(|| format!("Unsupported input binding {}", input.name))?;
        self.built = Some(Built { engine: Arc::new(engine), input, output, geometry });
        Ok(())
    }

    /// Runs one forward pass per batch of images. Classifications are
    /// returned in image order.
    pub fn infer(&self) -> Result<Vec<(String, Classification)>> {
        let built = self.built.as_ref().context("Sample must be built before running inference")?;
        let geometry = &built.geometry;
        ensure!(!self.params.images.is_empty(), "No image to classify");
        let mut buffers = BufferManager::new(&*built.engine, geometry.batch)?;
        let mut context =
            built.engine.create_execution_context().context("Creating execution context")?;

        let mut classifications = vec![];
        for batch in self.params.images.chunks(geometry.batch) {
            let grids = batch
                .iter()
                .map(|name| self.load_image(name, geometry))
                .collect::<Result<Vec<_>>>()?;
            fill_batch(&grids, geometry, buffers.host_buffer_mut(&built.input.name)?)?;
            buffers.copy_input_to_device()?;
            context.execute(buffers.device_bindings_mut()).context("Running forward pass")?;
            buffers.copy_output_to_host()?;

            let output = buffers.host_buffer_mut(&built.output.name)?;
            let classes = output.len() / geometry.batch;
            ensure!(classes > 0, "Output binding {} is empty", built.output.name);
            for (name, scores) in batch.iter().zip(output.chunks_mut(classes)) {
                info!("Classifying {name}");
                classifications.push((name.clone(), verify_output(scores)));
            }
        }
        Ok(classifications)
    }

    fn load_image(&self, name: &str, geometry: &InputGeometry) -> Result<PixelGrid> {
        let path = locate_file(name, &self.params.data_dirs)?;
        Ok(read_image(path, geometry.height, geometry.width)?)
    }
}
