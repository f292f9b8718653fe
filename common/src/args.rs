use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

use clap::{App, Arg, ErrorKind};

/// Command line arguments shared by the samples.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Args {
    pub data_dirs: Vec<PathBuf>,
    pub dla_core: Option<usize>,
    pub model: Option<String>,
    pub images: Vec<String>,
    pub verbosity: u64,
}

#[derive(Debug)]
pub enum ArgsError {
    /// `--help` was given. Holds the rendered help.
    Help(String),
    Invalid(clap::Error),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ArgsError::Help(help) => write!(f, "{help}"),
            ArgsError::Invalid(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ArgsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArgsError::Help(_) => None,
            ArgsError::Invalid(e) => Some(e),
        }
    }
}

pub fn app(name: &'static str) -> App<'static> {
    App::new(name)
        .about("Runs a serialized model on images and prints class probabilities")
        .arg(
            Arg::new("datadir")
                .short('d')
                .long("datadir")
                .takes_value(true)
                .multiple_occurrences(true)
                .number_of_values(1)
                .value_name("path")
                .help("Data directory to look for model and images in, overriding the default. Can be repeated to search several directories, in order."),
        )
        .arg(
            Arg::new("useDLACore")
                .long("useDLACore")
                .takes_value(true)
                .value_name("int")
                .validator(|s| s.parse::<usize>())
                .help("Accelerator core to run layers on, from 0 to n-1 where n is the number of cores on the platform."),
        )
        .arg(
            Arg::new("model")
                .long("model")
                .takes_value(true)
                .value_name("file")
                .help("Serialized model file name (.onnx or NNEF archive)"),
        )
        .arg(
            Arg::new("image")
                .long("image")
                .takes_value(true)
                .multiple_occurrences(true)
                .number_of_values(1)
                .value_name("file")
                .help("Image file name. Can be repeated, images are batched in order."),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .multiple_occurrences(true)
                .help("Sets the level of verbosity."),
        )
}

pub fn parse_args<I, T>(name: &'static str, argv: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = match app(name).try_get_matches_from(argv) {
        Ok(matches) => matches,
        Err(e) if e.kind() == ErrorKind::DisplayHelp => return Err(ArgsError::Help(e.to_string())),
        Err(e) => return Err(ArgsError::Invalid(e)),
    };
    let dla_core = if matches.is_present("useDLACore") {
        Some(matches.value_of_t::<usize>("useDLACore").map_err(ArgsError::Invalid)?)
    } else {
        None
    };
    Ok(Args {
        data_dirs: matches.values_of("datadir").into_iter().flatten().map(PathBuf::from).collect(),
        dla_core,
        model: matches.value_of("model").map(|s| s.to_string()),
        images: matches.values_of("image").into_iter().flatten().map(|s| s.to_string()).collect(),
        verbosity: matches.occurrences_of("verbosity"),
    })
}
