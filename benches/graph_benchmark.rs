use criterion::{Criterion, criterion_group, criterion_main};
use kiln::build::{ArchContext, ExtensionSet, construct_graph, discover};
use kiln::config::KilnConfig;
use std::fs;
use std::hint::black_box;
use std::path::Path;

const MOCK_CONFIG: &str = r#"
[package]
name = "benchmark_fw"

[build]
includes = ["include"]
symbols = { F_CPU = "16000000UL" }
libs = ["hal", "m"]

[[library]]
name = "hal"
kind = "embedded"
src = "libs/hal/src"
includes = ["libs/hal/include"]
headers = ["libs/hal/include/gpio.h"]

[[library]]
name = "m"
kind = "binary"
path = "libs/m/lib"
include = "libs/m/include"
"#;

fn populate(root: &Path) {
    for dir in 0..8 {
        let sub = root.join("src").join(format!("mod{}", dir));
        fs::create_dir_all(&sub).unwrap();
        for file in 0..25 {
            fs::write(sub.join(format!("unit{}.c", file)), "int x;\n").unwrap();
        }
    }
    let hal = root.join("libs/hal/src");
    fs::create_dir_all(&hal).unwrap();
    for file in 0..50 {
        fs::write(hal.join(format!("drv{}.c", file)), "int y;\n").unwrap();
    }
    fs::create_dir_all(root.join("libs/hal/include")).unwrap();
    fs::write(root.join("libs/hal/include/gpio.h"), "\n").unwrap();
    fs::create_dir_all(root.join("libs/m/include")).unwrap();
}

fn bench_config_parse(c: &mut Criterion) {
    c.bench_function("parse_kiln_toml", |b| {
        b.iter(|| KilnConfig::parse(black_box(MOCK_CONFIG)).unwrap())
    });
}

fn bench_discover(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path());
    let extensions = ExtensionSet::default();
    let src = dir.path().join("src");

    c.bench_function("discover_200_sources", |b| {
        b.iter(|| discover(black_box(&src), &extensions))
    });
}

fn bench_construct_graph(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path());
    let config = KilnConfig::parse(MOCK_CONFIG).unwrap();

    c.bench_function("construct_graph_250_sources", |b| {
        b.iter(|| construct_graph(dir.path(), &config, ArchContext::new("avr")).unwrap())
    });
}

fn bench_plan(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path());
    let config = KilnConfig::parse(MOCK_CONFIG).unwrap();
    let (_, graph) = construct_graph(dir.path(), &config, ArchContext::new("avr")).unwrap();

    c.bench_function("plan_cold_graph", |b| b.iter(|| black_box(&graph).plan()));
}

criterion_group!(
    benches,
    bench_config_parse,
    bench_discover,
    bench_construct_graph,
    bench_plan
);
criterion_main!(benches);
