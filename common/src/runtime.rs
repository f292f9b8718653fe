//! Narrow view of an inference runtime, and its binding to tract.
//!
//! A sample only needs three things from a runtime: turn a serialized blob
//! into an engine, enumerate the engine's bindings, and run one synchronous
//! forward pass over a list of device buffers in binding order.
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result, bail, ensure};
use tract_core::internal::*;
use tract_onnx::prelude::InferenceModelExt;

use crate::buffers::DeviceBuffer;

/// Concrete tensor shape.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Dims(pub Vec<usize>);

impl Dims {
    pub fn volume(&self) -> usize {
        self.0.iter().product()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}

impl From<&[usize]> for Dims {
    fn from(dims: &[usize]) -> Dims {
        Dims(dims.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Dims {
    fn from(dims: [usize; N]) -> Dims {
        Dims(dims.to_vec())
    }
}

impl fmt::Display for Dims {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let dims: Vec<String> = self.0.iter().map(|d| d.to_string()).collect();
        write!(f, "{}", dims.join("x"))
    }
}

/// A named input or output tensor slot of an engine.
#[derive(Clone, Debug, PartialEq)]
pub struct Binding {
    pub name: String,
    pub shape: Dims,
    pub datum_type: DatumType,
    pub is_input: bool,
}

pub trait InferenceRuntime {
    type Engine: Engine;

    /// Builds an executable engine from a serialized model.
    fn deserialize(&self, blob: &[u8]) -> Result<Self::Engine>;
}

pub trait Engine {
    type Context: ExecutionContext;

    /// All bindings, in binding-index order.
    fn bindings(&self) -> &[Binding];

    fn create_execution_context(&self) -> Result<Self::Context>;

    fn binding_count(&self) -> usize {
        self.bindings().len()
    }

    fn binding(&self, ix: usize) -> Option<&Binding> {
        self.bindings().get(ix)
    }

    fn is_input_binding(&self, ix: usize) -> bool {
        self.binding(ix).map(|b| b.is_input).unwrap_or(false)
    }

    fn binding_shape(&self, ix: usize) -> Option<&Dims> {
        self.binding(ix).map(|b| &b.shape)
    }

    fn binding_index(&self, name: &str) -> Option<usize> {
        self.bindings().iter().position(|b| b.name == name)
    }
}

pub trait ExecutionContext {
    /// Runs one synchronous forward pass. `bindings` holds one device buffer
    /// per engine binding, in binding-index order: inputs are read, outputs
    /// are overwritten.
    fn execute(&mut self, bindings: &mut [DeviceBuffer]) -> Result<()>;
}

/// Serialization formats tract can deserialize an engine from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelFormat {
    Onnx,
    Nnef,
}

impl ModelFormat {
    pub fn for_path(path: impl AsRef<Path>) -> Result<ModelFormat> {
        let path = path.as_ref();
        let name = path.to_string_lossy();
        if path.extension().map(|s| s == "onnx").unwrap_or(false) {
            Ok(ModelFormat::Onnx)
        } else if name.ends_with(".nnef")
            || name.ends_with(".tar")
            || name.ends_with(".tar.gz")
            || path.extension().map(|s| s == "tgz").unwrap_or(false)
        {
            Ok(ModelFormat::Nnef)
        } else {
            bail!("Can not guess model format for {:?} (expected .onnx, .nnef, .tar, .tgz)", path)
        }
    }
}

/// tract-backed runtime. Models are decluttered, optimized and turned into
/// an execution plan at deserialization time.
#[derive(Debug)]
pub struct TractRuntime {
    format: ModelFormat,
}

impl TractRuntime {
    pub fn new(format: ModelFormat) -> TractRuntime {
        TractRuntime { format }
    }

    pub fn for_path(path: impl AsRef<Path>) -> Result<TractRuntime> {
        Ok(TractRuntime::new(ModelFormat::for_path(path)?))
    }

    /// tract runs on the CPU: a requested core is only reported.
    pub fn with_accelerator_core(self, core: Option<usize>) -> TractRuntime {
        if let Some(core) = core {
            warn!("Accelerator core {core} requested, but tract has no accelerator cores. Running on CPU.");
        }
        self
    }

    fn typed_model(&self, blob: &[u8]) -> Result<TypedModel> {
        let mut reader = blob;
        let model = match self.format {
            ModelFormat::Onnx => tract_onnx::onnx()
                .model_for_read(&mut reader)
                .context("Parsing ONNX model")?
                .into_typed()
                .context("Typing ONNX model")?,
            ModelFormat::Nnef => tract_nnef::nnef()
                .with_tract_core()
                .model_for_read(&mut reader)
                .context("Parsing NNEF model")?,
        };
        let model = with_unit_symbols(model)?;
        model.into_optimized().context("Optimizing model")
    }
}

/// Pins every symbol left in the input shapes (typically an exported batch
/// dimension) to 1.
fn with_unit_symbols(model: TypedModel) -> Result<TypedModel> {
    let mut values = SymbolValues::default();
    let mut pinned = false;
    for outlet in model.input_outlets()? {
        for dim in model.outlet_fact(*outlet)?.shape.iter() {
            for sym in dim.symbols() {
                info!("Input dimension {sym} is symbolic, running with {sym}=1");
                values.set(&sym, 1);
                pinned = true;
            }
        }
    }
    if !pinned {
        return Ok(model);
    }
    model.concretize_dims(&values).context("Concretizing input dimensions")
}

impl InferenceRuntime for TractRuntime {
    type Engine = TractEngine;

    fn deserialize(&self, blob: &[u8]) -> Result<TractEngine> {
        ensure!(!blob.is_empty(), "Empty model blob");
        let model = self.typed_model(blob)?;
        let bindings = bindings_of(&model)?;
        debug!("Model has {} bindings", bindings.len());
        let plan = TypedSimplePlan::new(model).context("Building execution plan")?;
        Ok(TractEngine { bindings, plan: Arc::new(plan) })
    }
}

fn bindings_of(model: &TypedModel) -> Result<Vec<Binding>> {
    let mut bindings = vec![];
    for (outlets, is_input) in [(model.input_outlets()?, true), (model.output_outlets()?, false)] {
        for outlet in outlets {
            let name = model.node(outlet.node).name.clone();
            let fact = model.outlet_fact(*outlet)?;
            let Some(shape) = fact.shape.as_concrete() else {
                bail!("Binding {name} has a symbolic shape ({:?}), engines need concrete shapes", fact.shape)
            };
            bindings.push(Binding {
                name,
                shape: Dims::from(shape),
                datum_type: fact.datum_type,
                is_input,
            });
        }
    }
    Ok(bindings)
}

pub struct TractEngine {
    bindings: Vec<Binding>,
    plan: Arc<TypedSimplePlan<TypedModel>>,
}

impl fmt::Debug for TractEngine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TractEngine").field("bindings", &self.bindings).finish()
    }
}

impl Engine for TractEngine {
    type Context = TractContext;

    fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    fn create_execution_context(&self) -> Result<TractContext> {
        let state = TypedSimpleState::new(self.plan.clone()).context("Creating plan state")?;
        Ok(TractContext { bindings: self.bindings.clone(), state })
    }
}

pub struct TractContext {
    bindings: Vec<Binding>,
    state: TypedSimpleState<TypedModel, Arc<TypedSimplePlan<TypedModel>>>,
}

impl ExecutionContext for TractContext {
    fn execute(&mut self, buffers: &mut [DeviceBuffer]) -> Result<()> {
        ensure!(
            buffers.len() == self.bindings.len(),
            "Got {} device buffers for {} bindings",
            buffers.len(),
            self.bindings.len()
        );
        let inputs: TVec<TValue> = self
            .bindings
            .iter()
            .zip(buffers.iter())
            .filter(|(b, _)| b.is_input)
            .map(|(_, buffer)| buffer.tensor().clone().into_tvalue())
            .collect();
        let outputs = self.state.run(inputs)?;
        let slots = self.bindings.iter().zip(buffers.iter_mut()).filter(|(b, _)| !b.is_input);
        for ((binding, buffer), value) in slots.zip(outputs.iter()) {
            buffer
                .assign(value)
                .with_context(|| format!("Writing output binding {}", binding.name))?;
        }
        Ok(())
    }
}
