// digits_trainer/src/main.rs
//
// Trains the 784-300-10 digit classifier on MNIST and writes its parameters
// to `pyweights.txt`: 300 hidden biases, 784x300 input->hidden weights, 10
// output biases, 300x10 hidden->output weights, one value per line.
use anyhow::{Context, Result};
use neural_digits::{
    confusion_matrix, export_parameters, load_mnist, log_fit_summary, log_model_summary,
    Classifier, MlpClassifier, MlpConfig, DEFAULT_EXPORT_PATH, MNIST_TRAIN_CUTOFF,
};
use tracing::info;

const DATA_DIR: &str = "data";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mnist = load_mnist(DATA_DIR).context("failed to load MNIST")?;
    info!(rows = mnist.len(), image_size = mnist.image_size(), "loaded MNIST");
    if let Some(first) = mnist.raw_image(0) {
        info!("first image: {:?}", first);
    }

    let (train, test) = mnist
        .to_dataset()
        .split_at(MNIST_TRAIN_CUTOFF)
        .context("failed to split MNIST")?;
    info!(train = train.len(), test = test.len(), "split dataset");

    let classifier = MlpClassifier::new(MlpConfig::mnist());
    info!(config = ?classifier.config(), "training");
    let fitted = classifier
        .fit(&train.features, &train.labels)
        .context("training failed")?;
    log_model_summary(&fitted.model);
    log_fit_summary(&fitted.report);

    if !test.is_empty() {
        let eval = fitted
            .model
            .evaluate(&test.features, &test.labels)
            .context("evaluation failed")?;
        info!("test set: {}", eval);
        let classes = fitted.model.classes().last().map_or(0, |&c| c + 1);
        let cm = confusion_matrix(&fitted.model, &test.features, &test.labels, classes)
            .context("confusion matrix failed")?;
        for (digit, row) in cm.iter().enumerate() {
            info!("confusion {}: {:?}", digit, row);
        }
    }

    export_parameters(&fitted.model, DEFAULT_EXPORT_PATH)
        .with_context(|| format!("failed to export parameters to {}", DEFAULT_EXPORT_PATH))?;
    Ok(())
}
