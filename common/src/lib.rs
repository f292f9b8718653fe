#[macro_use]
extern crate log;

pub mod args;
pub mod buffers;
pub mod locate;
pub mod params;
pub mod report;
pub mod runtime;

pub use args::{Args, ArgsError, parse_args};
pub use buffers::{BufferManager, DeviceBuffer};
pub use locate::locate_file;
pub use params::{SampleDefaults, SampleParams};
pub use report::{TestAtom, TestResult};
pub use runtime::{
    Binding, Dims, Engine, ExecutionContext, InferenceRuntime, ModelFormat, TractEngine,
    TractRuntime,
};
