#[macro_use]
extern crate log;

use std::process::ExitCode;

use anyhow::Result;
use sample_classify::{DEFAULTS, SAMPLE_NAME, Sample};
use sample_common::{Args, ArgsError, SampleParams, TestAtom, TractRuntime, parse_args};

const BIN_NAME: &str = "sample-classify";

fn init_logger(verbosity: u64) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env = env_logger::Env::default().default_filter_or(level);
    env_logger::Builder::from_env(env).init();
}

fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().collect();
    let args = match parse_args(BIN_NAME, &argv) {
        Ok(args) => args,
        Err(ArgsError::Help(help)) => {
            println!("{help}");
            return ExitCode::SUCCESS;
        }
        Err(ArgsError::Invalid(e)) => {
            init_logger(0);
            error!("Invalid arguments");
            eprintln!("{e}");
            if let Err(e) = sample_common::args::app(BIN_NAME).print_help() {
                warn!("Could not print usage: {e}");
            }
            return ExitCode::FAILURE;
        }
    };
    init_logger(args.verbosity);

    let mut atom = TestAtom::define(SAMPLE_NAME, &argv);
    atom.report_start();
    match run(&args) {
        Ok(()) => atom.report_pass(),
        Err(e) => {
            error!("{e:?}");
            atom.report_fail()
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let params = SampleParams::from_args(args, &DEFAULTS);
    let runtime = TractRuntime::for_path(&params.model_file_name)?
        .with_accelerator_core(params.dla_core);
    let mut sample = Sample::new(params, runtime);

    info!("Building and running an inference engine for dogs vs cats");
    sample.build()?;
    for (image, classification) in sample.infer()? {
        if let Some((class, probability)) = classification.top() {
            println!("{image}: class {class} ({probability:.4})");
        }
    }
    Ok(())
}
