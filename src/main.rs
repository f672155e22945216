//! Command-line front end for the photo classifier.
//!
//! Usage:
//! ```text
//! photo-classifier --model model.safetensors --labels class_indices.json classify photo.jpg
//! photo-classifier --config classifier.json explain photo.jpg --output saliency.png
//! photo-classifier --model model.safetensors layers
//! ```
//!
//! Logging is controlled with `RUST_LOG` (e.g. `RUST_LOG=photo_classifier=debug`).

use clap::{Parser, Subcommand};
use photo_classifier::core::config::{ClassifierConfig, ConfigValidator};
use photo_classifier::core::init_tracing;
use photo_classifier::models::{load_label_map, load_model};
use photo_classifier::pipeline::ImageClassifier;
use photo_classifier::predictor::inspect_layers;
use photo_classifier::processors::ResizeFilter;
use photo_classifier::utils::image::{load_image, save_rgb_image};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "photo-classifier")]
#[command(about = "Classify photos with a pretrained CNN and explain the decision with Grad-CAM")]
struct Args {
    /// JSON configuration file; flags below override its values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Model file (.onnx or .safetensors)
    #[arg(short, long, global = true)]
    model: Option<PathBuf>,

    /// Label map JSON ({"class name": index})
    #[arg(short, long, global = true)]
    labels: Option<PathBuf>,

    /// Model input size as HEIGHTxWIDTH, e.g. 150x150
    #[arg(long, global = true, value_parser = parse_size)]
    input_size: Option<(u32, u32)>,

    /// Resize filter: catmull_rom, triangle, nearest, gaussian or lanczos3
    #[arg(long, global = true)]
    resize_filter: Option<ResizeFilter>,

    /// Convolutional layer used for saliency
    #[arg(long, global = true)]
    layer: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify one or more images
    Classify {
        /// Image files to classify
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Also compute the saliency summary for each report
        #[arg(long)]
        saliency: bool,

        /// Write a timestamped text report per image into this directory
        #[arg(long)]
        report_dir: Option<PathBuf>,

        /// Print reports as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compute a Grad-CAM heatmap and write it over the image
    Explain {
        image: PathBuf,

        /// Class to explain; defaults to the predicted class
        #[arg(long)]
        class: Option<String>,

        /// Output image; the format follows the extension
        #[arg(short, long, default_value = "saliency.png")]
        output: PathBuf,
    },
    /// List the layers of the model that can be used for saliency
    Layers,
    /// List the classes of the label map
    Labels,
}

fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (height, width) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected HEIGHTxWIDTH, got '{}'", value))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid dimension '{}': {}", s, e))
    };
    Ok((parse(height)?, parse(width)?))
}

impl Args {
    fn resolve_config(&self) -> Result<ClassifierConfig, Box<dyn Error>> {
        let mut config = match &self.config {
            Some(path) => ClassifierConfig::from_path(path)?,
            None => ClassifierConfig::default(),
        };
        if let Some(model) = &self.model {
            config.model_path = model.clone();
        }
        if let Some(labels) = &self.labels {
            config.label_map_path = labels.clone();
        }
        if let Some((height, width)) = self.input_size {
            config.input_size = [height, width];
        }
        if let Some(filter) = self.resize_filter {
            config.resize_filter = filter;
        }
        if let Some(layer) = &self.layer {
            config.saliency_layer = layer.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

fn classify(
    classifier: &ImageClassifier,
    images: &[PathBuf],
    saliency: bool,
    report_dir: Option<&Path>,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    for path in images {
        info!(image = %path.display(), "classifying");
        let image = load_image(path)?;
        let prediction = classifier.classify_image(&image)?;
        let explanation = if saliency {
            Some(classifier.explain(&image, None)?)
        } else {
            None
        };
        let report = classifier.report(&prediction, explanation.as_ref());

        if json {
            println!("{}", report.to_json()?);
        } else {
            println!("{}", path.display());
            println!("{}", report.render_text());
        }
        if let Some(dir) = report_dir {
            let written = report.write_to(dir)?;
            info!(report = %written.display(), "report written");
        }
    }
    Ok(())
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = args.resolve_config()?;

    match &args.command {
        Command::Classify {
            images,
            saliency,
            report_dir,
            json,
        } => {
            let classifier = ImageClassifier::from_config(config)?;
            classify(&classifier, images, *saliency, report_dir.as_deref(), *json)
        }
        Command::Explain {
            image,
            class,
            output,
        } => {
            let classifier = ImageClassifier::from_config(config)?;
            let photo = load_image(image)?;
            let explanation = classifier.explain(&photo, class.as_deref())?;
            save_rgb_image(&explanation.overlay, output)?;

            let (height, width) = explanation.saliency.shape();
            println!(
                "{} ({:.2}%): saliency of '{}' at layer '{}' ({}x{}) written to {}",
                explanation.prediction.predicted_class,
                explanation.prediction.confidence * 100.0,
                explanation.class_name,
                explanation.layer,
                height,
                width,
                output.display()
            );
            Ok(())
        }
        Command::Layers => {
            let model = load_model(&config.model_path)?;
            for layer in inspect_layers(model.as_ref()) {
                let marker = if layer.name == config.saliency_layer {
                    "  (saliency layer)"
                } else {
                    ""
                };
                println!("{:<24} {}{}", layer.name, layer.kind, marker);
            }
            if !model.has_layer(&config.saliency_layer) {
                return Err(format!(
                    "configured saliency layer '{}' is not in the model",
                    config.saliency_layer
                )
                .into());
            }
            Ok(())
        }
        Command::Labels => {
            let labels = load_label_map(&config.label_map_path)?;
            for (index, name) in labels.iter() {
                println!("{:>4}  {}", index, name);
            }
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            eprintln!("error: {}", err);
            let mut source = err.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {}", cause);
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
