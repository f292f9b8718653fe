use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use sample_common::{Binding, Engine, InferenceRuntime};

#[derive(Debug, PartialEq, Eq)]
pub enum LoadError {
    /// The engine does not expose exactly one input and one output.
    Bindings { count: usize, inputs: usize, outputs: usize },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LoadError::Bindings { count, inputs, outputs } => write!(
                f,
                "Engine exposes {count} bindings ({inputs} inputs, {outputs} outputs), expected one input and one output"
            ),
        }
    }
}

impl std::error::Error for LoadError {}

/// Reads a serialized engine and hands it to the runtime.
pub fn load_engine<R: InferenceRuntime>(runtime: &R, path: impl AsRef<Path>) -> Result<R::Engine> {
    let path = path.as_ref();
    let blob = fs_err::read(path)?;
    debug!("Read {} bytes from {:?}", blob.len(), path);
    runtime.deserialize(&blob).with_context(|| format!("Could not load engine from {path:?}"))
}

/// Classifies the engine bindings, returning the single input and the
/// single output.
pub fn inspect_bindings(engine: &impl Engine) -> Result<(Binding, Binding), LoadError> {
    let mut input = None;
    let mut output = None;
    let (mut inputs, mut outputs) = (0, 0);
    for ix in 0..engine.binding_count() {
        let Some(binding) = engine.binding(ix) else { continue };
        let direction = if engine.is_input_binding(ix) { "input" } else { "output" };
        info!(
            "Found {direction}: {} shape={} dtype={:?}",
            binding.name, binding.shape, binding.datum_type
        );
        if engine.is_input_binding(ix) {
            inputs += 1;
            input = Some(binding.clone());
        } else {
            outputs += 1;
            output = Some(binding.clone());
        }
    }
    match (input, output) {
        (Some(input), Some(output)) if engine.binding_count() == 2 => Ok((input, output)),
        _ => Err(LoadError::Bindings { count: engine.binding_count(), inputs, outputs }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use sample_common::{DeviceBuffer, ExecutionContext};
    use tract_core::prelude::*;

    struct Unused;

    impl ExecutionContext for Unused {
        fn execute(&mut self, _bindings: &mut [DeviceBuffer]) -> Result<()> {
            bail!("not runnable")
        }
    }

    /// Engine whose blob is a list of bindings, one per byte: odd bytes are
    /// inputs, even bytes are outputs.
    struct FakeRuntime;
    #[derive(Debug)]
    struct FakeEngine(Vec<Binding>);

    impl InferenceRuntime for FakeRuntime {
        type Engine = FakeEngine;

        fn deserialize(&self, blob: &[u8]) -> Result<FakeEngine> {
            let bindings = blob
                .iter()
                .enumerate()
                .map(|(ix, &b)| Binding {
                    name: format!("binding_{ix}"),
                    shape: [1, b as usize].into(),
                    datum_type: f32::datum_type(),
                    is_input: b % 2 == 1,
                })
                .collect();
            Ok(FakeEngine(bindings))
        }
    }

    impl Engine for FakeEngine {
        type Context = Unused;

        fn bindings(&self) -> &[Binding] {
            &self.0
        }

        fn create_execution_context(&self) -> Result<Unused> {
            Ok(Unused)
        }
    }

    fn engine(blob: &[u8]) -> FakeEngine {
        FakeRuntime.deserialize(blob).unwrap()
    }

    #[test]
    fn one_input_one_output() {
        let engine = engine(&[2, 3]);
        let (input, output) = inspect_bindings(&engine).unwrap();
        for ix in 0..engine.binding_count() {
            let recorded = if engine.is_input_binding(ix) { &input } else { &output };
            assert_eq!(Some(&recorded.shape), engine.binding_shape(ix));
        }
        assert_eq!(input.name, "binding_1");
        assert_eq!(output.name, "binding_0");
    }

    #[test]
    fn three_bindings_is_fatal() {
        assert_eq!(
            inspect_bindings(&engine(&[1, 2, 4])).unwrap_err(),
            LoadError::Bindings { count: 3, inputs: 1, outputs: 2 }
        );
    }

    #[test]
    fn two_inputs_is_fatal() {
        assert_eq!(
            inspect_bindings(&engine(&[1, 3])).unwrap_err(),
            LoadError::Bindings { count: 2, inputs: 2, outputs: 0 }
        );
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_engine(&FakeRuntime, dir.path().join("model.onnx")).unwrap_err();
        assert!(format!("{err:?}").contains("model.onnx"));
    }

    #[test]
    fn blob_reaches_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.fake");
        std::fs::write(&path, [1u8, 2]).unwrap();
        let engine = load_engine(&FakeRuntime, &path).unwrap();
        assert_eq!(engine.binding_count(), 2);
        assert!(engine.is_input_binding(0));
    }
}
