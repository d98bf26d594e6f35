//! Benchmarks for descriptor parsing and graph resolution.
//!
//! These benchmarks measure resolving long import chains and wide fan-outs,
//! the two shapes that stress the import stack and the provenance merge.

use std::fmt::Write as _;
use std::path::Path;

use confgraph::bootstrap;
use confgraph::config::{self, DescriptorFormat};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// A chain `C0 -> C1 -> ... -> C{length-1}`, each link with one bean method.
fn generate_chain(length: usize) -> String {
    let mut yaml = String::from("roots: [com.bench.C0]\nclasses:\n");
    for index in 0..length {
        let _ = write!(
            yaml,
            "  - name: com.bench.C{index}\n    annotations:\n      - type: Configuration\n"
        );
        if index + 1 < length {
            let _ = write!(
                yaml,
                "      - type: Import\n        attributes:\n          value: [com.bench.C{}]\n",
                index + 1
            );
        }
        let _ = write!(
            yaml,
            "    methods:\n      - name: bean{index}\n        annotations:\n          - type: Bean\n"
        );
    }
    yaml
}

/// `roots` root classes that all import the same `shared` classes.
fn generate_fan_out(roots: usize, shared: usize) -> String {
    let shared_names: Vec<String> = (0..shared).map(|i| format!("com.bench.S{i}")).collect();
    let root_names: Vec<String> = (0..roots).map(|i| format!("com.bench.R{i}")).collect();
    let mut yaml = format!("roots: [{}]\nclasses:\n", root_names.join(", "));
    for root in &root_names {
        let _ = write!(
            yaml,
            "  - name: {root}\n    annotations:\n      - type: Configuration\n      - type: Import\n        attributes:\n          value: [{}]\n",
            shared_names.join(", ")
        );
    }
    for name in &shared_names {
        let _ = write!(
            yaml,
            "  - name: {name}\n    annotations:\n      - type: Configuration\n"
        );
    }
    yaml
}

fn bench_descriptor_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("descriptor_parsing");
    for length in [10, 100] {
        let yaml = generate_chain(length);
        group.bench_with_input(BenchmarkId::new("chain", length), &yaml, |b, yaml| {
            b.iter(|| config::parse(black_box(yaml), DescriptorFormat::Yaml))
        });
    }
    group.finish();
}

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");

    for length in [10, 50, 200] {
        let descriptor = config::parse(&generate_chain(length), DescriptorFormat::Yaml)
            .expect("chain descriptor parses");
        group.bench_with_input(
            BenchmarkId::new("import_chain", length),
            &descriptor,
            |b, descriptor| b.iter(|| bootstrap::resolve(black_box(descriptor), Path::new("."))),
        );
    }

    for roots in [5, 20] {
        let descriptor = config::parse(&generate_fan_out(roots, 20), DescriptorFormat::Yaml)
            .expect("fan-out descriptor parses");
        group.bench_with_input(
            BenchmarkId::new("fan_out", roots),
            &descriptor,
            |b, descriptor| b.iter(|| bootstrap::resolve(black_box(descriptor), Path::new("."))),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_descriptor_parsing, bench_resolution);
criterion_main!(benches);
