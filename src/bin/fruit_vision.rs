//! Fruit type and quality classification from the command line.
//!
//! Loads the two-head model once, then classifies every image given on the
//! command line. `evaluate` additionally reads the ground truth from each
//! image's `<Fruit>/<Quality>/` directories and reports accuracy.
//!
//! # Usage
//!
//! ```bash
//! fruit-vision --model models/fruit_vit.onnx classify apple.jpg banana.png
//! fruit-vision --model models/fruit_vit.onnx evaluate samples/*/*/*.jpg
//! FRUIT_VISION_MODEL=models/fruit_vit.onnx fruit-vision --json classify apple.jpg
//! ```
//!
//! Configuration precedence: command-line flags, then `--config`, then the
//! `FRUIT_VISION_*` environment variables. Each layer only fills what the
//! layers above it leave unset.

use clap::{Parser, Subcommand};
use fruit_vision::core::config::{ConfigError, ENV_MODEL_PATH};
use fruit_vision::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

/// Command-line arguments
#[derive(Parser)]
#[command(name = "fruit-vision")]
#[command(about = "Classifies fruit type and quality with a two-head ONNX model")]
struct Args {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the exported two-head model
    #[arg(short, long, global = true)]
    model: Option<PathBuf>,

    /// JSON file with `fruit` and `quality` label orderings
    #[arg(short, long, global = true)]
    labels: Option<PathBuf>,

    /// Session pool size for concurrent inference
    #[arg(long, global = true)]
    session_pool_size: Option<usize>,

    /// Number of alternatives to show per head
    #[arg(long, default_value = "1", global = true)]
    topk: usize,

    /// Print one JSON object per image instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify images
    Classify {
        /// Images to classify
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Classify labelled samples laid out as <Fruit>/<Quality>/<image>
    Evaluate {
        /// Sample images
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
}

#[derive(Serialize)]
struct Record<'a> {
    image: &'a Path,
    prediction: &'a FruitPrediction,
    mean_confidence: f32,
    #[serde(flatten)]
    verdict: Option<&'a Verdict>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    fruit_vision::utils::init_tracing();

    let args = Args::parse();
    let config = resolve_config(&args, |key| std::env::var(key).ok())?;

    info!(
        model = %config.model_path.display(),
        session_pool_size = config.session_pool_size,
        "loading classifier"
    );
    let start = Instant::now();
    let classifier = match TwoHeadClassifierBuilder::from_config(&config)
        .and_then(|builder| builder.topk(args.topk).build(&config.model_path))
    {
        Ok(classifier) => classifier,
        Err(e) => {
            error!("Failed to load classifier: {e}");
            return Err(e.into());
        }
    };
    info!(
        "Classifier loaded in {:.2}ms",
        start.elapsed().as_secs_f64() * 1000.0
    );

    match &args.command {
        Command::Classify { images } => classify(&classifier, images, args.json),
        Command::Evaluate { images } => evaluate(&classifier, images, args.json),
    }
}

/// Layers command-line flags over the config file over the environment.
fn resolve_config(
    args: &Args,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ClassifierConfig, ConfigError> {
    // --model satisfies the required model path when neither file nor env has one
    let cli_model = args
        .model
        .as_ref()
        .map(|model| model.to_string_lossy().into_owned());
    let lookup = |key: &str| match (key, &cli_model) {
        (ENV_MODEL_PATH, Some(model)) => Some(model.clone()),
        _ => env(key),
    };

    let mut config = match &args.config {
        Some(path) => ClassifierConfig::from_file_with_lookup(path, lookup)?,
        None => ClassifierConfig::from_lookup(lookup)?,
    };

    if let Some(model) = &args.model {
        config.model_path = model.clone();
    }
    if let Some(labels) = &args.labels {
        config.labels_path = Some(labels.clone());
    }
    if let Some(size) = args.session_pool_size {
        config.session_pool_size = size;
    }
    Ok(config)
}

/// Predicts every image in parallel, logging and dropping unreadable ones.
fn predict_all<'a>(
    classifier: &TwoHeadClassifier,
    images: &'a [PathBuf],
) -> Result<Vec<(&'a Path, FruitPrediction)>, VisionError> {
    let start = Instant::now();
    let results: Vec<_> = images
        .par_iter()
        .map(|path| (path.as_path(), classifier.predict_path(path)))
        .collect();

    let mut predictions = Vec::with_capacity(results.len());
    for (path, result) in results {
        match result {
            Ok(prediction) => predictions.push((path, prediction)),
            Err(VisionError::ImageLoad(e)) => {
                error!("Failed to load image {}: {}", path.display(), e);
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        "Classified {} of {} images in {:.2}ms",
        predictions.len(),
        images.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(predictions)
}

fn classify(
    classifier: &TwoHeadClassifier,
    images: &[PathBuf],
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let predictions = predict_all(classifier, images)?;
    if predictions.is_empty() {
        error!("No images could be classified");
        return Err("No images could be classified".into());
    }

    for (path, prediction) in &predictions {
        if json {
            print_json(path, prediction, None)?;
        } else {
            println!("{}: {}", path.display(), prediction);
            print_alternatives(prediction);
        }
    }
    Ok(())
}

fn evaluate(
    classifier: &TwoHeadClassifier,
    images: &[PathBuf],
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let labels = classifier.labels();
    let labelled: Vec<PathBuf> = images
        .iter()
        .filter(|path| match SampleTruth::from_path(path) {
            Ok(truth) => {
                if labels.fruit.position_ignore_case(&truth.fruit).is_none()
                    || labels.quality.position_ignore_case(&truth.quality).is_none()
                {
                    warn!(
                        "{}: '{}/{}' is not a label pair the model can predict",
                        path.display(),
                        truth.fruit,
                        truth.quality
                    );
                }
                true
            }
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                false
            }
        })
        .cloned()
        .collect();

    let predictions = predict_all(classifier, &labelled)?;
    if predictions.is_empty() {
        error!("No samples could be evaluated");
        return Err("No samples could be evaluated".into());
    }

    let mut correct = 0usize;
    for (path, prediction) in &predictions {
        let truth = SampleTruth::from_path(path)?;
        let verdict = Verdict::evaluate(&truth, prediction);
        if verdict.is_correct() {
            correct += 1;
        }

        if json {
            print_json(path, prediction, Some(&verdict))?;
        } else {
            println!("{}: {} => {}", path.display(), prediction, verdict);
            print_alternatives(prediction);
        }
    }

    let total = predictions.len();
    let accuracy = correct as f64 / total as f64 * 100.0;
    if json {
        println!(
            "{}",
            serde_json::json!({ "correct": correct, "total": total, "accuracy": accuracy })
        );
    } else {
        println!("Accuracy: {correct}/{total} ({accuracy:.2}%)");
    }
    Ok(())
}

fn print_json(
    image: &Path,
    prediction: &FruitPrediction,
    verdict: Option<&Verdict>,
) -> Result<(), serde_json::Error> {
    let record = Record {
        image,
        prediction,
        mean_confidence: prediction.mean_confidence(),
        verdict,
    };
    println!("{}", serde_json::to_string(&record)?);
    Ok(())
}

fn print_alternatives(prediction: &FruitPrediction) {
    for (head, result) in [("fruit", &prediction.fruit), ("quality", &prediction.quality)] {
        if result.top_k.len() > 1 {
            let ranked: Vec<String> = result
                .top_k
                .iter()
                .map(|(label, pct)| format!("{label} {pct:.2}%"))
                .collect();
            println!("  {head}: {}", ranked.join(", "));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fruit_vision::core::config::{ENV_LABELS_PATH, ENV_POOL_SIZE};

    fn env_with(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["fruit-vision"];
        argv.extend_from_slice(extra);
        argv.extend_from_slice(&["classify", "apple.jpg"]);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_env_fills_what_the_config_file_omits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "model_path": "file.onnx" }"#).unwrap();

        let args = parse(&["--config", path.to_str().unwrap()]);
        let config = resolve_config(
            &args,
            env_with(&[
                (ENV_MODEL_PATH, "env.onnx"),
                (ENV_LABELS_PATH, "env_labels.json"),
                (ENV_POOL_SIZE, "3"),
            ]),
        )
        .unwrap();

        assert_eq!(config.model_path, PathBuf::from("file.onnx"));
        assert_eq!(config.labels_path, Some(PathBuf::from("env_labels.json")));
        assert_eq!(config.session_pool_size, 3);
    }

    #[test]
    fn test_flags_win_over_file_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "model_path": "file.onnx", "session_pool_size": 2 }"#,
        )
        .unwrap();

        let args = parse(&[
            "--config",
            path.to_str().unwrap(),
            "--model",
            "cli.onnx",
            "--session-pool-size",
            "6",
        ]);
        let config = resolve_config(&args, env_with(&[(ENV_POOL_SIZE, "3")])).unwrap();

        assert_eq!(config.model_path, PathBuf::from("cli.onnx"));
        assert_eq!(config.session_pool_size, 6);
    }

    #[test]
    fn test_model_flag_without_file_keeps_env_settings() {
        let args = parse(&["--model", "cli.onnx"]);
        let config = resolve_config(
            &args,
            env_with(&[(ENV_LABELS_PATH, "env_labels.json"), (ENV_POOL_SIZE, "2")]),
        )
        .unwrap();

        assert_eq!(config.model_path, PathBuf::from("cli.onnx"));
        assert_eq!(config.labels_path, Some(PathBuf::from("env_labels.json")));
        assert_eq!(config.session_pool_size, 2);
    }

    #[test]
    fn test_no_model_anywhere_is_reported() {
        let args = parse(&[]);
        let err = resolve_config(&args, env_with(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv { .. }));
    }
}
