//! Matched host/device buffer pairs for every binding of an engine.
use anyhow::{Context, Result, bail, ensure};
use tract_core::internal::*;

use crate::runtime::{Binding, Dims, Engine};

/// Memory the runtime reads inputs from and writes outputs to.
#[derive(Clone, Debug)]
pub struct DeviceBuffer(Tensor);

impl DeviceBuffer {
    pub fn zeroed(shape: &Dims) -> Result<DeviceBuffer> {
        Ok(DeviceBuffer(Tensor::zero::<f32>(shape.as_slice())?))
    }

    pub fn tensor(&self) -> &Tensor {
        &self.0
    }

    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    /// Overwrites the buffer content with `value`, which must have the same
    /// shape and element type.
    pub fn assign(&mut self, value: &Tensor) -> Result<()> {
        ensure!(
            value.shape() == self.0.shape(),
            "Shape mismatch: buffer is {:?}, value is {:?}",
            self.0.shape(),
            value.shape()
        );
        self.0.as_slice_mut::<f32>()?.copy_from_slice(value.as_slice::<f32>()?);
        Ok(())
    }

    fn upload(&mut self, host: &[f32]) -> Result<()> {
        self.0.as_slice_mut::<f32>()?.copy_from_slice(host);
        Ok(())
    }

    fn download(&self, host: &mut [f32]) -> Result<()> {
        host.copy_from_slice(self.0.as_slice::<f32>()?);
        Ok(())
    }
}

#[derive(Debug)]
struct ManagedBuffer {
    binding: Binding,
    host: Vec<f32>,
}

/// Owns one host buffer and one device buffer per engine binding, both
/// sized after the binding shape. Buffers are released when the manager is
/// dropped.
#[derive(Debug)]
pub struct BufferManager {
    managed: Vec<ManagedBuffer>,
    device: Vec<DeviceBuffer>,
}

impl BufferManager {
    pub fn new(engine: &impl Engine, batch_size: usize) -> Result<BufferManager> {
        ensure!(batch_size > 0, "Batch size must be at least 1");
        let mut managed = vec![];
        let mut device = vec![];
        for binding in engine.bindings() {
            if binding.datum_type != f32::datum_type() {
                bail!(
                    "Binding {} is {:?}, only f32 bindings are supported",
                    binding.name,
                    binding.datum_type
                )
            }
            // a batch of one also covers engines with an implicit batch dimension
            if batch_size > 1 {
                ensure!(
                    binding.shape.as_slice().first() == Some(&batch_size),
                    "Binding {} has shape {}, expected a leading batch dimension of {}",
                    binding.name,
                    binding.shape,
                    batch_size
                );
            }
            device.push(
                DeviceBuffer::zeroed(&binding.shape)
                    .with_context(|| format!("Allocating device buffer for {}", binding.name))?,
            );
            managed.push(ManagedBuffer {
                binding: binding.clone(),
                host: vec![0.0; binding.shape.volume()],
            });
            debug!("Allocated buffers for {} ({})", binding.name, binding.shape);
        }
        Ok(BufferManager { managed, device })
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.managed
            .iter()
            .position(|m| m.binding.name == name)
            .with_context(|| format!("No binding named {name}"))
    }

    pub fn host_buffer(&self, name: &str) -> Result<&[f32]> {
        let ix = self.index_of(name)?;
        Ok(&self.managed[ix].host)
    }

    pub fn host_buffer_mut(&mut self, name: &str) -> Result<&mut [f32]> {
        let ix = self.index_of(name)?;
        Ok(&mut self.managed[ix].host)
    }

    /// Device buffers in binding-index order, as `ExecutionContext::execute`
    /// expects them.
    pub fn device_bindings_mut(&mut self) -> &mut [DeviceBuffer] {
        &mut self.device
    }

    pub fn copy_input_to_device(&mut self) -> Result<()> {
        for (managed, device) in self.managed.iter().zip(self.device.iter_mut()) {
            if managed.binding.is_input {
                device.upload(&managed.host)?;
            }
        }
        Ok(())
    }

    pub fn copy_output_to_host(&mut self) -> Result<()> {
        for (managed, device) in self.managed.iter_mut().zip(self.device.iter()) {
            if !managed.binding.is_input {
                device.download(&mut managed.host)?;
            }
        }
        Ok(())
    }
}
