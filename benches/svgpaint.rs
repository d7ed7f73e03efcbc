//! svgpaint benchmarks
//!
//! Run with: cargo bench -p svgpaint-bench

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use svgpaint::path_parser::tokenize;
use svgpaint::shapes::build_path;
use svgpaint::{RenderOptions, Transform};
use svgpaint_bench::{generate_path_data, generate_scene, parse_offline};
use svgpaint_canvas::CanvasRenderingContext2D;

fn path_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("path");

    for (label, segments) in [("small", 10), ("medium", 100), ("large", 1000)] {
        let d = generate_path_data(segments);
        group.throughput(Throughput::Bytes(d.len() as u64));
        group.bench_with_input(BenchmarkId::new("tokenize", label), &d, |b, d| {
            b.iter(|| tokenize(d))
        });

        // Full geometry: command dispatch, arcs, bounds and markers.
        let markup = format!(r#"<svg><path d="{}"/></svg>"#, d);
        let document = parse_offline(&markup).expect("fixture parses");
        let path = document.document_element().expect("fixture has a root").children()[0].clone();
        group.bench_with_input(BenchmarkId::new("build", label), &path, |b, path| {
            b.iter(|| build_path(path, None, &document))
        });
    }

    group.finish();
}

fn transform_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform");

    group.bench_function("parse_single", |b| {
        b.iter(|| Transform::parse("translate(10, 20)", (0.0, 0.0)))
    });

    group.bench_function("parse_list", |b| {
        b.iter(|| {
            Transform::parse(
                "translate(10,20) rotate(45 5 5) scale(2) skewX(10) skewY(5) matrix(1 0 0 1 3 4)",
                (0.0, 0.0),
            )
        })
    });

    group.finish();
}

fn document_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("document");

    for (label, shapes) in [("small", 10), ("medium", 100), ("large", 1000)] {
        let scene = generate_scene(shapes);
        group.throughput(Throughput::Bytes(scene.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse", label), &scene, |b, scene| {
            b.iter(|| parse_offline(scene))
        });

        let document = parse_offline(&scene).expect("fixture parses");
        group.bench_with_input(BenchmarkId::new("render", label), &document, |b, document| {
            b.iter(|| {
                let mut ctx = CanvasRenderingContext2D::new(800.0, 600.0);
                document.render_frame(&mut ctx, &RenderOptions::default());
                ctx.take_commands()
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    path_benchmarks,
    transform_benchmarks,
    document_benchmarks,
);

criterion_main!(benches);
