use crate::uniform::{data_points, dataset, DIMENSION as D};
use criterion::Criterion;
use mdindex::{IndexKind, SpatialIndex};
use rstar::RTree;

pub fn benchmark(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("build");
    group.sample_size(10);

    let points = dataset();
    let data = data_points(&points);
    for kind in IndexKind::ALL {
        group.bench_function(kind.as_str(), |b| {
            b.iter(|| {
                let mut index = kind.create();
                index.build(&data).expect("Failed to build index");
                index
            });
        });
    }

    group.bench_function("rstar", |b| {
        b.iter(|| build_rstar(&points));
    });
    group.finish();
}

pub fn build_rstar(points: &[[f64; D]]) -> RTree<[f64; D]> {
    RTree::bulk_load(points.to_vec())
}
