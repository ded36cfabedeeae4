extern crate failure;
extern crate hitlist;
#[macro_use]
extern crate tracing;
extern crate tracing_subscriber;

use std::env;
use std::fs::{create_dir_all, File};
use std::process;

use tracing_subscriber::EnvFilter;

use hitlist::config::ExperimentConfig;
use hitlist::datasets::{load_csv, Dataset};
use hitlist::evaluation::{compare, rmse, EvaluationError, NamedModel};
use hitlist::models::item_similarity::ItemSimilarityModel;
use hitlist::models::popularity::PopularityModel;
use hitlist::models::save;
use hitlist::report::{write_comparison, write_summary};
use hitlist::RecommendationModel;

fn raw_items(dataset: &Dataset, item_ids: &[usize]) -> Vec<String> {
    item_ids
        .iter()
        .map(|&item_id| dataset.items.raw(item_id).unwrap_or("?").to_owned())
        .collect()
}

fn report_rmse<M: RecommendationModel + Sync + ?Sized>(
    name: &str,
    model: &M,
    test: &hitlist::data::Interactions,
) -> Result<(), failure::Error> {
    match rmse(model, test) {
        Ok(value) => println!("{} RMSE: {:.4}", name, value),
        Err(EvaluationError::EmptyTestSet) => info!(model = name, "no ratings, skipping RMSE"),
        Err(error) => return Err(error.into()),
    }

    Ok(())
}

fn run() -> Result<(), failure::Error> {
    let config = match env::args().nth(1) {
        Some(path) => ExperimentConfig::from_path(path)?,
        None => ExperimentConfig::default(),
    };

    let dataset = load_csv(&config.data_path, &config.columns())?;
    let (train, test) = config.split().split(&dataset.interactions)?;

    println!(
        "Data: {:?}, train: {}, test: {}",
        dataset.interactions.shape(),
        train.len(),
        test.len()
    );

    let popularity = PopularityModel::fit(&train)?;
    let mut similarity: ItemSimilarityModel = config.item_similarity().build();
    similarity.fit(&train)?;

    let train_mat = train.to_compressed();
    let test_mat = test.to_compressed();

    let models: [NamedModel; 2] = [("popularity", &popularity), ("personalised", &similarity)];
    let comparison = compare(&models, &train_mat, &test_mat, &config.evaluator())?;

    for model in comparison.models() {
        println!(
            "{} ({:?}): AUC {:.4} over {} users",
            model.name,
            model.kind,
            model.auc,
            model.curve.num_users()
        );
    }

    for &(name, model) in &models {
        if model.estimates_ratings() {
            report_rmse(name, model, &test)?;
        } else {
            info!(model = name, "does not estimate ratings, skipping RMSE");
        }
    }

    if let Some(user_id) = test_mat.iter_users().find(|user| !user.item_ids.is_empty()).map(|user| user.user_id) {
        println!(
            "Popular for user {}: {:?}",
            dataset.users.raw(user_id).unwrap_or("?"),
            raw_items(&dataset, &popularity.recommend(user_id, 5)?)
        );
        println!(
            "Personalised for user {}: {:?}",
            dataset.users.raw(user_id).unwrap_or("?"),
            raw_items(&dataset, &similarity.recommend(user_id, 5)?)
        );

        if let Some(&item_id) = train_mat.user_items(user_id).first() {
            let similar: Vec<usize> = similarity
                .similar_items(item_id, 5)?
                .into_iter()
                .map(|(other_id, _)| other_id)
                .collect();
            println!(
                "Similar to {}: {:?}",
                dataset.items.raw(item_id).unwrap_or("?"),
                raw_items(&dataset, &similar)
            );
        }
    }

    if let Some(ref path) = config.curves_path {
        write_comparison(&comparison, File::create(path)?)?;
        write_summary(&comparison, File::create(path.with_extension("summary.csv"))?)?;
        info!(path = %path.display(), "wrote curves");
    }

    if let Some(ref dir) = config.models_dir {
        create_dir_all(dir)?;
        save(&popularity, dir.join("popularity.json"))?;
        save(&similarity, dir.join("item_similarity.json"))?;
        info!(dir = %dir.display(), "saved models");
    }

    Ok(())
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(error) = run() {
        error!("{}", error);
        for cause in error.iter_causes() {
            error!("caused by: {}", cause);
        }
        process::exit(1);
    }
}
