#[macro_use]
extern crate criterion;

extern crate hitlist;

use criterion::Criterion;

use hitlist::data::{user_stratified_split, Interaction, Interactions};
use hitlist::evaluation::Evaluator;
use hitlist::models::item_similarity::Hyperparameters;
use hitlist::models::popularity::PopularityModel;

/// Users consume a window of items whose position depends on the user, so
/// that neighbouring users share items.
fn synthetic(num_users: usize, num_items: usize, per_user: usize) -> Interactions {
    let mut interactions = Interactions::new(num_users, num_items);

    for user_id in 0..num_users {
        let start = (user_id * 7) % num_items;
        for offset in 0..per_user {
            let item_id = (start + offset * offset) % num_items;
            interactions.push(Interaction::new(user_id, item_id, None));
        }
    }

    interactions
}

fn bench_split(c: &mut Criterion) {
    let data = synthetic(2000, 1000, 30);

    c.bench_function("stratified_split", move |b| {
        b.iter(|| user_stratified_split(&data, 0.2, 42).unwrap())
    });
}

fn bench_popularity_curve(c: &mut Criterion) {
    let data = synthetic(2000, 1000, 30);
    let (train, test) = user_stratified_split(&data, 0.2, 42).unwrap();
    let (train_mat, test_mat) = (train.to_compressed(), test.to_compressed());
    let model = PopularityModel::fit(&train).unwrap();
    let evaluator = Evaluator::new();

    c.bench_function("popularity_curve", move |b| {
        b.iter(|| {
            evaluator
                .precision_recall_curve(&model, &train_mat, &test_mat)
                .unwrap()
        })
    });
}

fn bench_item_similarity(c: &mut Criterion) {
    let data = synthetic(500, 300, 20);
    let (train, test) = user_stratified_split(&data, 0.2, 42).unwrap();
    let (train_mat, test_mat) = (train.to_compressed(), test.to_compressed());

    let mut model = Hyperparameters::new().only_top_k(32).build();
    model.fit(&train).unwrap();
    let evaluator = Evaluator::new();

    c.bench_function("item_similarity_fit", move |b| {
        b.iter(|| {
            let mut model = Hyperparameters::new().only_top_k(32).build();
            model.fit(&train).unwrap();
        })
    });
    c.bench_function("item_similarity_curve", move |b| {
        b.iter(|| {
            evaluator
                .precision_recall_curve(&model, &train_mat, &test_mat)
                .unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_split,
    bench_popularity_curve,
    bench_item_similarity
);
criterion_main!(benches);
