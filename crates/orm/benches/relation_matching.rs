//! Relation Matching Benchmarks
//!
//! Compares dictionary-based eager loading with a naive nested scan and
//! measures normalization of nested payloads.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use elif_store_orm::{
    map_to_dictionary, Database, DictionaryKey, Element, Model, ModelDefinition, Orm, Relation,
};
use serde_json::{json, Value};

fn database() -> Database {
    Database::builder()
        .register(
            ModelDefinition::new("users")
                .attr("name")
                .relation(
                    "posts",
                    Relation::has_many("users", "posts", "user_id", "id").expect("valid relation"),
                ),
        )
        .register(ModelDefinition::new("posts").attr("user_id").attr("title"))
        .build()
        .expect("valid models")
}

fn element(value: Value) -> Element {
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn seeded(users: usize, posts_per_user: usize) -> Orm {
    let orm = Orm::new(database());
    let user_rows = (0..users)
        .map(|id| element(json!({ "id": id, "name": format!("User_{}", id) })))
        .collect();
    let post_rows = (0..users * posts_per_user)
        .map(|id| element(json!({ "id": id, "user_id": id % users, "title": format!("Post_{}", id) })))
        .collect();
    orm.insert("users", user_rows).expect("users inserted");
    orm.insert("posts", post_rows).expect("posts inserted");
    orm
}

fn models(entity: &str, rows: Vec<Value>) -> Vec<Model> {
    rows.into_iter().map(|row| Model::new(entity, element(row))).collect()
}

fn naive_match(parents: &[Model], children: &[Model]) -> usize {
    parents
        .iter()
        .map(|parent| {
            children
                .iter()
                .filter(|child| child.get("user_id") == parent.get("id"))
                .count()
        })
        .sum()
}

fn dictionary_match(parents: &[Model], children: &[Model]) -> usize {
    let dictionary = map_to_dictionary(children, |child| {
        Some((DictionaryKey::from_value(child.get("user_id")?), child))
    });
    parents
        .iter()
        .filter_map(|parent| parent.get("id"))
        .map(|id| dictionary.get(&DictionaryKey::from_value(id)).map_or(0, |found| found.len()))
        .sum()
}

fn bench_matching_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("matching_strategies");

    for size in [10usize, 100, 1000] {
        let parents = models("users", (0..size).map(|id| json!({ "id": id })).collect());
        let children = models(
            "posts",
            (0..size * 5).map(|id| json!({ "id": id, "user_id": id % size })).collect(),
        );

        group.bench_with_input(BenchmarkId::new("naive_scan", size), &size, |b, _| {
            b.iter(|| naive_match(black_box(&parents), black_box(&children)))
        });
        group.bench_with_input(BenchmarkId::new("dictionary", size), &size, |b, _| {
            b.iter(|| dictionary_match(black_box(&parents), black_box(&children)))
        });
    }

    group.finish();
}

fn bench_eager_loading(c: &mut Criterion) {
    let mut group = c.benchmark_group("eager_loading");

    for users in [10usize, 100, 500] {
        let orm = seeded(users, 5);
        group.bench_with_input(BenchmarkId::new("has_many", users), &users, |b, _| {
            b.iter(|| {
                let query = orm.query("users").expect("registered").with("posts");
                black_box(query.get().expect("loaded"))
            })
        });
    }

    group.finish();
}

fn bench_normalization(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalization");
    let orm = Orm::new(database());

    for users in [10usize, 100] {
        let payload = Value::Array(
            (0..users)
                .map(|id| {
                    json!({
                        "id": id,
                        "name": format!("User_{}", id),
                        "posts": (0..5).map(|n| json!({ "id": id * 5 + n })).collect::<Vec<_>>()
                    })
                })
                .collect(),
        );

        group.bench_with_input(BenchmarkId::new("nested_users", users), &payload, |b, payload| {
            b.iter(|| black_box(orm.normalize("users", payload).expect("normalized")))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_matching_strategies,
    bench_eager_loading,
    bench_normalization
);
criterion_main!(benches);
