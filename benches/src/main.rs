use std::{hint::black_box, time::Instant};

use clap::Parser;
use index_bvh::index_bvh::IndexBvh;
use nalgebra::Point3;
use rand::{rng, Rng};

/// Compares radius queries through an index, including its build, with brute force.
/// Prints the median speedup over all samples.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(long)]
    entries: usize,
    #[arg(long)]
    queries: usize,
    #[arg(long)]
    samples: usize,
    #[arg(long, default_value_t = 1.0)]
    radius: f32,
}

fn random_point<R: Rng>(rng: &mut R, extent: f32) -> Point3<f32> {
    Point3::new(
        rng.random_range(-extent..=extent),
        rng.random_range(-extent..=extent),
        rng.random_range(-extent..=extent),
    )
}

fn main() {
    let cli = Cli::parse();
    let mut rng = rng();
    let radius_squared = cli.radius * cli.radius;

    let mut samples = Vec::new();
    let mut entries = Vec::new();
    let mut queries = Vec::new();

    for i in 0..cli.samples {
        entries.clear();
        queries.clear();

        for _ in 0..cli.entries {
            entries.push(random_point(&mut rng, 100.0));
        }
        for _ in 0..cli.queries {
            queries.push(random_point(&mut rng, 100.0));
        }

        let mut brute_force_duration = f64::NAN;
        let mut index_duration = f64::NAN;
        let mut build_duration = f64::NAN;

        let mut measure_brute_force = |entries: &[Point3<f32>]| {
            let start_brute_force = Instant::now();
            for query in &queries {
                black_box(
                    black_box(entries)
                        .iter()
                        .filter(|entry| nalgebra::distance_squared(entry, query) <= radius_squared)
                        .count(),
                );
            }
            brute_force_duration = start_brute_force.elapsed().as_secs_f64();
        };

        let mut measure_index = |entries: &[Point3<f32>]| {
            let start_index = Instant::now();
            let index = match IndexBvh::try_new(black_box(entries.to_vec()), cli.radius) {
                Ok(index) => index,
                Err(err) => {
                    eprintln!("{}", err);
                    std::process::exit(1);
                }
            };
            build_duration = start_index.elapsed().as_secs_f64();
            for query in &queries {
                black_box(index.entries_near(black_box(query)).len());
            }
            index_duration = start_index.elapsed().as_secs_f64();
        };

        // Flip order to minimize bias due to caching.
        if i % 2 == 0 {
            measure_index(&entries);
            measure_brute_force(&entries);
        } else {
            measure_brute_force(&entries);
            measure_index(&entries);
        }

        eprintln!(
            "sample {}: build {:.3}s, index {:.3}s, brute force {:.3}s",
            i, build_duration, index_duration, brute_force_duration
        );
        samples.push(brute_force_duration / index_duration);
    }

    if samples.is_empty() {
        return;
    }
    samples.sort_by(|a, b| a.total_cmp(b));

    // Median.
    println!("{}", samples[samples.len() / 2]);
}
