mod config;
mod display;
mod submission;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use hotelclust_data::columns::RecordKind;
use hotelclust_features::embedding::DestinationEmbeddingTable;
use hotelclust_features::extract::FeatureExtractor;
use hotelclust_features::loader::{Dataset, DatasetLoader};
use hotelclust_model::batched::BatchedClassifier;
use hotelclust_model::classifier::Classifier;
use hotelclust_model::metrics::{self, MAP_CUTOFF};
use hotelclust_model::random_forest::RandomForestClassifier;

use crate::config::PipelineConfig;

#[derive(Parser)]
#[command(name = "hotelclust", about = "Prédiction de clusters d'hôtels à partir des recherches")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Réglages communs à l'entraînement, prioritaires sur le fichier de configuration.
#[derive(clap::Args)]
struct TrainArgs {
    /// Fichier d'entraînement (train.csv)
    #[arg(long)]
    train: PathBuf,
    /// Table des destinations (destinations.csv)
    #[arg(long)]
    destinations: PathBuf,
    /// Nombre maximal d'exemples lus dans le fichier d'entraînement
    #[arg(long)]
    examples: Option<usize>,
    /// Configuration JSON (voir init-config)
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    components: Option<usize>,
    #[arg(long)]
    trees: Option<usize>,
    #[arg(long)]
    chunk_size: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Réduire la table des destinations et afficher la variance expliquée
    Embed {
        #[arg(long)]
        destinations: PathBuf,
        #[arg(long, default_value = "10")]
        components: usize,
        /// Nombre de destinations affichées
        #[arg(long, default_value = "5")]
        show: usize,
    },
    /// Entraîner sur le début du fichier et mesurer le MAP@5 sur la fin
    Evaluate {
        #[command(flatten)]
        args: TrainArgs,
    },
    /// Entraîner puis écrire les 5 meilleurs clusters de chaque recherche du fichier de test
    Predict {
        #[command(flatten)]
        args: TrainArgs,
        /// Fichier de scoring (test.csv)
        #[arg(long)]
        test: PathBuf,
        #[arg(short, long, default_value = "submission.csv")]
        output: PathBuf,
    },
    /// Écrire la configuration par défaut
    InitConfig {
        #[arg(short, long, default_value = "hotelclust.json")]
        output: PathBuf,
    },
}

fn resolve_config(args: &TrainArgs) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::load_or_default(args.config.as_deref())?;
    if let Some(n) = args.components {
        config.n_components = n;
    }
    if let Some(n) = args.trees {
        config.forest.n_trees = n;
    }
    if let Some(n) = args.chunk_size {
        config.chunk_size = n;
    }
    config.validate()?;
    Ok(config)
}

fn rows_bar(total: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
        )?
        .progress_chars("=> "),
    );
    Ok(pb)
}

fn build_table(path: &Path, n_components: usize) -> Result<DestinationEmbeddingTable> {
    log::info!("Réduction de {:?} à {} composantes", path, n_components);
    let table = DestinationEmbeddingTable::build(path, n_components)?;
    println!("{} destinations chargées ({} composantes)", table.len(), table.dim());
    Ok(table)
}

fn labels_of(dataset: &Dataset) -> Result<Vec<u32>> {
    let labels = dataset
        .labels
        .as_ref()
        .context("Jeu de données sans colonne hotel_cluster")?;
    Ok(labels.to_vec())
}

fn fit_forest(config: &PipelineConfig, train: &Dataset) -> Result<BatchedClassifier<RandomForestClassifier>> {
    let labels = labels_of(train)?;
    let mut model = BatchedClassifier::new(RandomForestClassifier::new(config.forest.clone()), config.chunk_size)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!(
        "Entraînement de {} arbres sur {} exemples...",
        config.forest.n_trees,
        train.n_examples()
    ));
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));
    model.fit(train.features.view(), &labels)?;
    spinner.finish_and_clear();

    let inner = model.inner();
    display::display_model(inner.name(), &inner.params(), inner.classes().len());
    Ok(model)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Embed { destinations, components, show } => {
            let table = build_table(&destinations, components)?;
            display::display_embedding(&table, show);
        }
        Command::Evaluate { args } => {
            let config = resolve_config(&args)?;
            let start = Instant::now();

            let table = build_table(&args.destinations, config.n_components)?;
            let loader = DatasetLoader::new(FeatureExtractor::new(&table, config.n_components));
            let dataset = loader.load(&args.train, args.examples, RecordKind::Labeled)?;
            display::display_load_stats("train", &dataset);

            let (train, holdout) = dataset.split_holdout(config.holdout)?;
            println!(
                "{} exemples d'entraînement, {} de validation",
                train.n_examples(),
                holdout.n_examples()
            );

            let model = fit_forest(&config, &train)?;

            let pb = rows_bar(holdout.n_examples())?;
            let probs = model.predict_probabilities_with(holdout.features.view(), |done, _| {
                pb.set_position(done as u64)
            })?;
            pb.finish_and_clear();

            let truth = labels_of(&holdout)?;
            let map5 = metrics::mean_average_precision_at_5(probs.view(), model.classes(), &truth)?;
            log::info!("MAP@5 = {:.4}", map5);
            display::display_score(
                train.n_examples(),
                holdout.n_examples(),
                map5,
                start.elapsed().as_millis(),
            );
        }
        Command::Predict { args, test, output } => {
            let config = resolve_config(&args)?;

            let table = build_table(&args.destinations, config.n_components)?;
            let loader = DatasetLoader::new(FeatureExtractor::new(&table, config.n_components));
            let train = loader.load(&args.train, args.examples, RecordKind::Labeled)?;
            display::display_load_stats("train", &train);
            let scoring = loader.load(&test, None, RecordKind::Unlabeled)?;
            display::display_load_stats("test", &scoring);

            let model = fit_forest(&config, &train)?;

            let pb = rows_bar(scoring.n_examples())?;
            let best = model.predict_top_k(scoring.features.view(), MAP_CUTOFF, |done, _| {
                pb.set_position(done as u64)
            })?;
            pb.finish_and_clear();

            let ids = scoring
                .ids
                .as_deref()
                .context("Fichier de test sans colonne id")?;
            submission::save_submission(&output, ids, &best)?;
            println!("\n{} prédictions écrites dans {:?}", best.len(), output);
        }
        Command::InitConfig { output } => {
            PipelineConfig::default().save(&output)?;
            println!("Configuration par défaut écrite dans {:?}", output);
        }
    }

    Ok(())
}
