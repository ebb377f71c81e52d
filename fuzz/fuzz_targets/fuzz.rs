#![no_main]
use std::fmt::{self, Debug, Formatter};

use arbitrary::Arbitrary;
use index_bvh::builder::BuildQuality;
use index_bvh::error::IndexBvhError;
use index_bvh::index_bvh::{IndexBvh, IndexBvhSettings};
use libfuzzer_sys::fuzz_target;
use nalgebra::Point3;
use ordered_float::NotNan;

type Float = f32;
const LIMIT: Float = 1_000_000.0;

fuzz_target!(|workload: Workload| {
    workload.fuzz();
});

#[derive(Arbitrary)]
struct ArbitraryPoint {
    coordinates: [NotNan<Float>; 3],
}

impl ArbitraryPoint {
    fn point(&self) -> Point3<Float> {
        Point3::from(self.coordinates.map(|f| f.into_inner().clamp(-LIMIT, LIMIT)))
    }
}

impl Debug for ArbitraryPoint {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        Debug::fmt(&self.point(), f)
    }
}

#[derive(Debug, Arbitrary)]
enum ArbitraryQuality {
    Low,
    Medium,
    High,
}

#[derive(Debug, Arbitrary)]
struct Workload {
    entries: Vec<ArbitraryPoint>,
    radius: NotNan<Float>,
    quality: ArbitraryQuality,
    parallel_threshold: u8,
    queries: Vec<(ArbitraryPoint, NotNan<Float>)>,
}

impl Workload {
    fn fuzz(self) {
        let entries = self.entries.iter().map(ArbitraryPoint::point).collect::<Vec<_>>();
        let radius = self.radius.into_inner().clamp(-1.0, LIMIT);
        let settings = IndexBvhSettings {
            quality: match self.quality {
                ArbitraryQuality::Low => BuildQuality::Low,
                ArbitraryQuality::Medium => BuildQuality::Medium,
                ArbitraryQuality::High => BuildQuality::High,
            },
            parallel_threshold: self.parallel_threshold as usize,
        };

        let index = match IndexBvh::try_with_settings(entries.clone(), radius, settings) {
            Ok(index) => index,
            Err(IndexBvhError::EmptyEntrySet) => {
                assert!(entries.is_empty());
                return;
            }
            Err(IndexBvhError::InvalidRadius(_)) => {
                assert!(radius < 0.0);
                return;
            }
            Err(err) => panic!("Unexpected error: {}", err),
        };

        // Every entry appears in exactly one leaf and every skip index moves forward.
        let mut seen = vec![false; entries.len()];
        for (i, node) in index.nodes().iter().enumerate() {
            assert!(node.exit_index() as usize > i);
            assert!(node.exit_index() as usize <= index.node_count());
            if let Some(entry) = node.entry_index() {
                assert!(!seen[entry as usize]);
                seen[entry as usize] = true;
            }
        }
        assert!(seen.into_iter().all(|seen| seen));
        assert_eq!(index.nodes()[0].exit_index() as usize, index.node_count());

        for (query, query_radius) in &self.queries {
            let query = query.point();
            let query_radius = query_radius.into_inner().abs().min(LIMIT);

            let mut within = index.entries_within(&query, query_radius);
            within.sort_unstable();
            let brute_force = entries
                .iter()
                .enumerate()
                .filter(|(_, p)| nalgebra::distance_squared(*p, &query) <= query_radius * query_radius)
                .map(|(i, _)| i)
                .collect::<Vec<_>>();
            assert_eq!(within, brute_force);

            // Check that these don't panic.
            let _near = index.entries_near(&query);
            let _nearest = index.nearest_entry(&query);
        }
    }
}
