use std::path::PathBuf;

use crate::args::Args;

/// Everything a sample needs to know before it touches the runtime.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleParams {
    pub data_dirs: Vec<PathBuf>,
    pub model_file_name: String,
    pub images: Vec<String>,
    pub dla_core: Option<usize>,
}

/// Per-sample defaults, used for whatever the command line leaves out.
#[derive(Clone, Debug)]
pub struct SampleDefaults {
    pub data_dirs: &'static [&'static str],
    pub model_file_name: &'static str,
    pub images: &'static [&'static str],
}

impl SampleParams {
    pub fn from_args(args: &Args, defaults: &SampleDefaults) -> SampleParams {
        let data_dirs = if args.data_dirs.is_empty() {
            defaults.data_dirs.iter().map(PathBuf::from).collect()
        } else {
            args.data_dirs.clone()
        };
        let images = if args.images.is_empty() {
            defaults.images.iter().map(|s| s.to_string()).collect()
        } else {
            args.images.clone()
        };
        SampleParams {
            data_dirs,
            model_file_name: args
                .model
                .clone()
                .unwrap_or_else(|| defaults.model_file_name.to_string()),
            images,
            dla_core: args.dla_core,
        }
    }
}
