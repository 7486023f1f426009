use crate::uniform::build::build_rstar;
use crate::uniform::{data_points, dataset, DIMENSION as D, NUM_QUERIES, SELECTIVITY};
use criterion::Criterion;
use mdindex::{IndexKind, QueryRange, SpatialIndex, WorkloadGenerator};
use rstar::{Envelope, RTree, SelectionFunction, AABB};

pub fn benchmark(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("query");
    group.sample_size(10);

    let points = dataset();
    let data = data_points(&points);
    let queries = WorkloadGenerator::new(42)
        .mixed(&data, NUM_QUERIES, SELECTIVITY)
        .expect("Failed to generate workload");

    for kind in IndexKind::ALL.into_iter().chain([IndexKind::Linear]) {
        let mut index = kind.create();
        index.build(&data).expect("Failed to build index");
        group.bench_function(kind.as_str(), |b| {
            b.iter(|| query_index(index.as_ref(), &queries));
        });
    }

    let rstar = build_rstar(&points);
    group.bench_function("rstar", |b| {
        b.iter(|| query_rstar(&rstar, &queries));
    });
    group.finish();
}

fn query_index(index: &dyn SpatialIndex, queries: &[QueryRange]) -> usize {
    queries
        .iter()
        .map(|range| index.query(range).expect("Failed to query").len())
        .sum()
}

// Points inside a closed box; subtrees are visited while their envelope overlaps it.
struct InBox(AABB<[f64; D]>);

impl SelectionFunction<[f64; D]> for InBox {
    fn should_unpack_parent(&self, envelope: &AABB<[f64; D]>) -> bool {
        self.0.intersects(envelope)
    }

    fn should_unpack_leaf(&self, leaf: &[f64; D]) -> bool {
        self.0.contains_point(leaf)
    }
}

fn query_rstar(rstar: &RTree<[f64; D]>, queries: &[QueryRange]) -> usize {
    queries
        .iter()
        .map(|range| {
            let mut lo = [0.0; D];
            let mut hi = [0.0; D];
            lo.copy_from_slice(range.min());
            hi.copy_from_slice(range.max());
            let selection = InBox(AABB::from_corners(lo, hi));
            rstar.locate_with_selection_function(selection).count()
        })
        .sum()
}
