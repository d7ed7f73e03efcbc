//! # svgpaint bench
//!
//! Performance benchmarking for svgpaint.
//!
//! ## Features
//!
//! - Path data parsing benchmarks
//! - Transform list parsing benchmarks
//! - Whole-document parse and render benchmarks
//! - Generated fixtures shared with the criterion benches
//!
//! ## Usage
//!
//! ```rust,ignore
//! use svgpaint_bench::Benchmark;
//!
//! let suite = Benchmark::new().run_all();
//! suite.print_summary();
//! ```

use std::rc::Rc;
use std::time::{Duration, Instant};

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use svgpaint::{Document, DocumentOptions, RenderOptions, ResourceLoader, SvgError, Transform};
use svgpaint_canvas::{CanvasRenderingContext2D, ImageBitmap};
use thiserror::Error;
use tracing::debug;

/// Benchmark errors.
#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Benchmark failed: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single benchmark result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub name: String,
    pub iterations: u64,
    /// Total time in nanoseconds.
    pub total_ns: u64,
    /// Mean time per iteration in nanoseconds.
    pub mean_ns: u64,
    pub std_dev_ns: u64,
    pub min_ns: u64,
    pub max_ns: u64,
    /// Throughput in operations per second.
    pub ops_per_sec: f64,
}

impl BenchmarkResult {
    /// Summarise sample times.
    pub fn from_samples(name: impl Into<String>, samples: &[Duration]) -> Self {
        let name = name.into();
        let iterations = samples.len() as u64;

        let times_ns: Vec<u64> = samples.iter().map(|d| d.as_nanos() as u64).collect();
        let total_ns: u64 = times_ns.iter().sum();
        let mean_ns = total_ns.checked_div(iterations).unwrap_or(0);
        let min_ns = times_ns.iter().min().copied().unwrap_or(0);
        let max_ns = times_ns.iter().max().copied().unwrap_or(0);

        let variance = if iterations == 0 {
            0.0
        } else {
            times_ns
                .iter()
                .map(|&t| {
                    let diff = t as f64 - mean_ns as f64;
                    diff * diff
                })
                .sum::<f64>()
                / iterations as f64
        };

        let ops_per_sec = if mean_ns > 0 {
            1_000_000_000.0 / mean_ns as f64
        } else {
            0.0
        };

        Self {
            name,
            iterations,
            total_ns,
            mean_ns,
            std_dev_ns: variance.sqrt() as u64,
            min_ns,
            max_ns,
            ops_per_sec,
        }
    }

    pub fn format_mean(&self) -> String {
        format_duration(self.mean_ns)
    }

    pub fn print_line(&self) {
        println!(
            "{:40} {:>12} {:>12} {:>12}/s",
            self.name,
            self.format_mean(),
            format!("±{}", format_duration(self.std_dev_ns)),
            format_ops(self.ops_per_sec),
        );
    }
}

fn format_duration(ns: u64) -> String {
    if ns >= 1_000_000_000 {
        format!("{:.2} s", ns as f64 / 1_000_000_000.0)
    } else if ns >= 1_000_000 {
        format!("{:.2} ms", ns as f64 / 1_000_000.0)
    } else if ns >= 1_000 {
        format!("{:.2} µs", ns as f64 / 1_000.0)
    } else {
        format!("{} ns", ns)
    }
}

fn format_ops(ops: f64) -> String {
    if ops >= 1_000_000.0 {
        format!("{:.2}M", ops / 1_000_000.0)
    } else if ops >= 1_000.0 {
        format!("{:.2}K", ops / 1_000.0)
    } else {
        format!("{:.2}", ops)
    }
}

/// Results of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkSuite {
    pub name: String,
    pub results: Vec<BenchmarkResult>,
    pub total_time: Duration,
}

impl BenchmarkSuite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            results: Vec::new(),
            total_time: Duration::ZERO,
        }
    }

    pub fn add(&mut self, result: BenchmarkResult) {
        self.results.push(result);
    }

    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(80));
        println!("Benchmark Suite: {}", self.name);
        println!("{}", "=".repeat(80));
        println!(
            "{:40} {:>12} {:>12} {:>12}",
            "Name", "Mean", "StdDev", "Throughput"
        );
        println!("{}", "-".repeat(80));
        for result in &self.results {
            result.print_line();
        }
        println!("{}", "-".repeat(80));
        println!("Total time: {:?}", self.total_time);
        println!();
    }

    /// Save results to a JSON file.
    pub fn save_json(&self, path: &str) -> Result<(), BenchError> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| BenchError::Failed(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Benchmark runner.
pub struct Benchmark {
    pub warmup: u64,
    pub iterations: u64,
}

impl Benchmark {
    pub fn new() -> Self {
        Self {
            warmup: 10,
            iterations: 100,
        }
    }

    pub fn with_iterations(mut self, iterations: u64) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_warmup(mut self, warmup: u64) -> Self {
        self.warmup = warmup;
        self
    }

    /// Time `f` after a warmup.
    pub fn run<F>(&self, name: &str, mut f: F) -> BenchmarkResult
    where
        F: FnMut(),
    {
        debug!(
            name,
            warmup = self.warmup,
            iterations = self.iterations,
            "Running benchmark"
        );

        for _ in 0..self.warmup {
            f();
        }

        let mut samples = Vec::with_capacity(self.iterations as usize);
        for _ in 0..self.iterations {
            let start = Instant::now();
            f();
            samples.push(start.elapsed());
        }

        BenchmarkResult::from_samples(name, &samples)
    }

    /// Run the standard benchmarks.
    pub fn run_all(&self) -> BenchmarkSuite {
        let start = Instant::now();
        let mut suite = BenchmarkSuite::new("svgpaint");

        let path = generate_path_data(100);
        suite.add(self.run(&format!("path/tokenize ({} bytes)", path.len()), || {
            let _ = svgpaint::path_parser::tokenize(&path);
        }));

        let transform = "translate(10,20) rotate(45 5 5) scale(2) skewX(10) matrix(1 0 0 1 3 4)";
        suite.add(self.run("transform/parse (5 ops)", || {
            let _ = Transform::parse(transform, (0.0, 0.0));
        }));

        let scene = generate_scene(100);
        suite.add(self.run(&format!("document/parse ({} bytes)", scene.len()), || {
            let _ = parse_offline(&scene);
        }));

        if let Ok(document) = parse_offline(&scene) {
            suite.add(self.run("document/render (100 shapes)", || {
                let mut ctx = CanvasRenderingContext2D::new(800.0, 600.0);
                document.render_frame(&mut ctx, &RenderOptions::default());
            }));
        }

        suite.total_time = start.elapsed();
        suite
    }
}

impl Default for Benchmark {
    fn default() -> Self {
        Self::new()
    }
}

/// Loader for fixtures that reference nothing external.
pub struct OfflineLoader;

impl ResourceLoader for OfflineLoader {
    fn fetch_text(&self, href: &str) -> LocalBoxFuture<'static, Result<String, SvgError>> {
        let error = SvgError::Resource(format!("offline: {}", href));
        async move { Err(error) }.boxed_local()
    }

    fn create_image(
        &self,
        href: &str,
        _anonymous_cross_origin: bool,
    ) -> LocalBoxFuture<'static, Result<ImageBitmap, SvgError>> {
        let error = SvgError::Resource(format!("offline: {}", href));
        async move { Err(error) }.boxed_local()
    }
}

/// Parse a fixture with the offline loader.
pub fn parse_offline(markup: &str) -> Result<Rc<Document>, SvgError> {
    Document::parse(markup, DocumentOptions::default(), Rc::new(OfflineLoader))
}

/// Path data with `n` segments cycling through every command family.
pub fn generate_path_data(n: usize) -> String {
    let mut d = String::from("M10,10");
    for i in 0..n {
        let v = (i % 50) as f64;
        let segment = match i % 6 {
            0 => format!(" L{},{}", v, v * 2.0),
            1 => format!(" h{} v-{}", v, v / 2.0),
            2 => format!(" C{},{} {},{} {},{}", v, 0.0, v + 5.0, 10.0, v + 10.0, 5.0),
            3 => " s5,5 10,0".to_string(),
            4 => format!(" Q{},{} {},{} t10,0", v, v, v + 3.0, v - 3.0),
            _ => format!(" A5,3 30 0,1 {},{}", v + 4.0, v),
        };
        d.push_str(&segment);
    }
    d.push_str(" Z");
    d
}

/// A document with `n` styled shapes, a gradient and some text.
pub fn generate_scene(n: usize) -> String {
    let mut svg = String::from(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="800" height="600" viewBox="0 0 400 300">
<style>.a { fill: steelblue; stroke: black } #s3 { opacity: 0.5 }</style>
<defs><linearGradient id="g"><stop offset="0" stop-color="red"/><stop offset="1" stop-color="blue"/></linearGradient></defs>
"##,
    );
    for i in 0..n {
        let x = (i % 20) * 20;
        let y = (i / 20) * 20;
        let shape = match i % 4 {
            0 => format!(r#"<rect id="s{}" class="a" x="{}" y="{}" width="15" height="15" rx="3"/>"#, i, x, y),
            1 => format!(r##"<circle id="s{}" cx="{}" cy="{}" r="7" fill="url(#g)"/>"##, i, x + 7, y + 7),
            2 => format!(
                r#"<path id="s{}" d="M{},{} l10,0 l-5,10 z" transform="rotate(15 {} {})"/>"#,
                i, x, y, x, y
            ),
            _ => format!(r#"<text id="s{}" x="{}" y="{}" font-size="8px">t{}</text>"#, i, x, y + 10, i),
        };
        svg.push_str(&shape);
        svg.push('\n');
    }
    svg.push_str("</svg>");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_benchmark_result() {
        let samples = vec![
            Duration::from_micros(100),
            Duration::from_micros(120),
            Duration::from_micros(90),
        ];
        let result = BenchmarkResult::from_samples("test", &samples);
        assert_eq!(result.iterations, 3);
        assert_eq!(result.min_ns, 90_000);
        assert!(result.mean_ns > 0);
    }

    #[test]
    fn test_empty_samples() {
        let result = BenchmarkResult::from_samples("empty", &[]);
        assert_eq!(result.mean_ns, 0);
        assert_eq!(result.ops_per_sec, 0.0);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(500), "500 ns");
        assert_eq!(format_duration(1_500), "1.50 µs");
        assert_eq!(format_duration(1_500_000), "1.50 ms");
        assert_eq!(format_duration(1_500_000_000), "1.50 s");
    }

    #[test]
    fn test_fixtures_parse() {
        let document = parse_offline(&generate_scene(8)).unwrap();
        assert_eq!(document.document_element().unwrap().child_count(), 10);

        let d = generate_path_data(12);
        assert!(d.starts_with("M10,10"));
        assert!(d.ends_with('Z'));
    }

    #[test]
    fn test_run_all_small() {
        let suite = Benchmark::new().with_warmup(0).with_iterations(2).run_all();
        assert_eq!(suite.results.len(), 4);
        assert!(suite.results.iter().all(|result| result.iterations == 2));
    }
}
