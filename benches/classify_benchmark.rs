use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use partiql_middleware::prelude::*;

const STATEMENTS: [(&str, &str); 5] = [
    ("select", r#"SELECT id, name, email FROM "users"."by-email" WHERE email = ? AND id > ?"#),
    (
        "insert",
        r#"INSERT INTO "users" VALUE {'id': ?, 'name': ?, 'note': 'literal ? mark', 'tags': [?, ?]}"#,
    ),
    (
        "update_returning",
        r#"UPDATE "users" SET name = ? SET tags = set_add(tags, <<?>>) REMOVE legacy WHERE id = ? RETURNING ALL NEW id, name"#,
    ),
    ("delete", r#"DELETE FROM "users" WHERE id = ? AND note <> 'x?y'"#),
    ("describe", r#"SELECT * FROM "!pqxd_describe_table" WHERE table_name = ?"#),
];

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    for (name, sql) in STATEMENTS {
        group.bench_with_input(BenchmarkId::from_parameter(name), sql, |b, sql| {
            b.iter(|| classify(black_box(sql)));
        });
    }
    group.finish();
}

fn bench_bind(c: &mut Criterion) {
    let params = vec![
        Param::from(42_i64),
        Param::from("Ada"),
        Param::from(serde_json::json!({"tags": ["a", "b"], "score": 1.5})),
        Param::from(None::<String>),
    ];
    c.bench_function("bind_mixed_params", |b| {
        b.iter(|| bind(black_box(&params)));
    });
}

criterion_group!(benches, bench_classify, bench_bind);
criterion_main!(benches);
