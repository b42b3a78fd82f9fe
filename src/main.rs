use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::Parser;

use agri_sentinel::cli::MAX_PLANTS;
use agri_sentinel::logging::init_logger;
use agri_sentinel::report::save_report;
use agri_sentinel::{
    Args, Config, InferenceService, ModelLoader, OnnxModel, PlantInput, PlantObservation, Summary, observe_plants,
};

fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);

    if args.plants.len() > MAX_PLANTS {
        bail!("at most {MAX_PLANTS} plants are supported, got {}", args.plants.len());
    }

    let mut config = Config::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(model) = &args.model {
        config.model.path = Some(model.clone());
    }
    config.model.cuda |= args.cuda;
    if let Some(threshold) = args.threshold {
        config.policy.moisture_threshold = threshold;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.model.timeout_ms = Some(timeout_ms);
    }
    config.validate()?;
    let policy = config.decision_policy()?;

    // No model, no service: fail before touching any plant.
    let loader = ModelLoader::<OnnxModel>::new(config.model_path()?);
    let model = loader.load_onnx(config.model.cuda, config.model.input_size)?;
    let service = InferenceService::new(model).with_timeout(config.timeout());

    let plants = args
        .plants
        .iter()
        .enumerate()
        .map(|(i, p)| -> Result<PlantInput> {
            let image = match &p.image {
                Some(path) => Some(
                    image::open(path).with_context(|| format!("reading leaf image {}", path.display()))?,
                ),
                None => None,
            };
            Ok(PlantInput {
                plant: format!("Plant {}", i + 1),
                image,
                moisture: p.moisture,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let observations = observe_plants(&service, &policy, &plants)
        .into_iter()
        .collect::<agri_sentinel::Result<Vec<_>>>()?;

    println!("Plant status at {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    for obs in &observations {
        print_observation(obs);
    }

    let summary = Summary::from_observations(&observations);
    println!();
    println!("Total plants:     {}", summary.total);
    println!("Healthy plants:   {}", summary.healthy);
    println!("Unhealthy plants: {}", summary.infected);
    println!("Unknown plants:   {}", summary.unknown);
    println!("Sprayers ON:      {}", summary.sprayers_on);

    save_report(&observations, &args.output)
        .with_context(|| format!("writing report to {}", args.output.display()))?;
    println!("Report written to {}", args.output.display());
    Ok(())
}

fn print_observation(obs: &PlantObservation) {
    let sprayer = if obs.actuation { "Sprayer ON" } else { "Sprayer OFF" };
    print!(
        "{:<9} {:<9} {:>6.2}%  moisture {:>5.1}%  {}",
        obs.plant,
        obs.label(),
        obs.confidence(),
        obs.moisture,
        sprayer
    );
    match obs.error() {
        Some(reason) => println!("  ({reason})"),
        None => println!(),
    }
}
