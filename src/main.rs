mod arguments;
mod command;
mod config;
mod error;
mod model;
mod pipeline;
mod report;
mod tools;
mod video;
mod workspace;

use arguments::Arguments;
use config::{Config, Settings};
use pipeline::{Job, Pipeline};
use report::Summary;
use tools::Toolchain;

use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const SETUP_FAILURE: u8 = 2;

fn init_logging(arguments: &Arguments) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(arguments.log_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_options(settings: &Settings, jobs: &[Job]) {
    println!("Videos:     {}", jobs.len());
    println!("Workers:    {}", settings.run.workers.min(jobs.len().max(1)));
    println!("Model:      {} (x{})", settings.upscale.model, settings.upscale.scale);
    println!("Encoder:    {} (crf {}, {})", settings.encode.encoder, settings.encode.crf, settings.encode.preset);
    println!("Audio:      {:?}", settings.encode.audio);
}

fn print_plan(jobs: &[Job]) {
    for job in jobs {
        let note = if job.output.exists() { " (exists)" } else { "" };
        println!("{} -> {}{}", job.input.display(), job.output.display(), note);
    }
}

fn list_models(settings: &Settings) -> anyhow::Result<()> {
    let dir = settings
        .tools
        .model_dir
        .as_deref()
        .context("--list-models needs --model-dir or [tools] model_dir")?;
    let models = model::list(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    if models.is_empty() {
        println!("No models found in {}", dir.display());
    }
    for name in models {
        println!("{}", name);
    }
    Ok(())
}

fn run_pipeline(arguments: Arguments) -> anyhow::Result<Summary> {
    let config = match &arguments.config {
        Some(path) => Config::load(path).with_context(|| format!("failed to load {}", path.display()))?,
        None => Config::default(),
    };
    let settings = Settings::resolve(&arguments, config)?;
    if arguments.list_models {
        list_models(&settings)?;
        return Ok(Summary::default());
    }

    let inputs = arguments.collect_inputs()?;
    let jobs = Job::plan(&inputs, &settings);

    print_options(&settings, &jobs);
    if settings.dry_run {
        print_plan(&jobs);
        return Ok(Summary::default());
    }

    let tools = Toolchain::from_settings(&settings);
    tools.validate(&settings).context("external tools are not ready")?;

    let reports = Pipeline::new(&settings, &tools, jobs.len()).execute(jobs);
    let summary = Summary::new(&reports);
    summary.print(&reports);
    Ok(summary)
}

fn main() -> ExitCode {
    let arguments = Arguments::parse();
    init_logging(&arguments);

    match run_pipeline(arguments) {
        Ok(summary) => summary.exit_code(),
        Err(error) => {
            eprintln!("Error: {:#}", error);
            ExitCode::from(SETUP_FAILURE)
        }
    }
}
