use criterion::{black_box, criterion_group, criterion_main, Criterion};
use storm_core::{Converter, IdentityConverter};

fn bench_value_conversion(c: &mut Criterion) {
    let conv = IdentityConverter;
    let domain = "the quick brown fox".to_string();

    c.bench_function("value/to_database_text", |b| {
        b.iter(|| {
            let v = conv.to_database(black_box(&domain));
            black_box(v);
        });
    });

    let stored = conv.to_database(&domain);
    c.bench_function("value/from_database_text", |b| {
        b.iter(|| {
            let d = conv.from_database(black_box(&stored)).unwrap();
            black_box(d);
        });
    });
}

criterion_group!(benches, bench_value_conversion);
criterion_main!(benches);
