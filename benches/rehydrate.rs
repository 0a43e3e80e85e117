use criterion::{criterion_group, criterion_main, Criterion};
use markdown_merge::rehydrate;

fn generate_markdown(links: usize) -> String {
    let mut out = String::new();
    for i in 0..links {
        out.push_str(&format!(
            "See [link {i}](https://example.com/{i}) for more detail.\n\n"
        ));
    }
    for i in 0..links {
        out.push_str(&format!("[link{i}]: https://example.com/{i}\n"));
    }
    out
}

fn bench_rehydrate(c: &mut Criterion) {
    let mut group = c.benchmark_group("rehydrate");
    group.sample_size(20);

    let content = generate_markdown(300);
    group.bench_function("full_pass", |b| {
        b.iter(|| {
            let result = rehydrate::rehydrate(std::hint::black_box(&content));
            std::hint::black_box(result.count);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_rehydrate);
criterion_main!(benches);
