use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tessella::staging::resolve_all;
use tessella::{
    Axis, CostModel, FieldGeometry, KernelRegion, NoPeers, OperatorContext, PackTarget,
    SignatureSet,
};

fn geom() -> FieldGeometry {
    FieldGeometry::new([16, 16, 16, 16], 3, 4)
}

fn bench_signature_build(c: &mut Criterion) {
    let ctx = OperatorContext::new([true, true, false, false], false, true, 2);
    c.bench_function("signature_set_build", |b| {
        b.iter(|| {
            let set = SignatureSet::new(black_box(&ctx), [true, true, false, false], true);
            black_box(set.for_region(KernelRegion::Interior).len())
        })
    });
}

fn bench_route_resolution(c: &mut Criterion) {
    let g = geom();
    let mask = PackTarget::HOST | PackTarget::REMOTE;
    c.bench_function("staging_resolve_all", |b| {
        b.iter(|| resolve_all(black_box(mask), &NoPeers, &g, 0).unwrap())
    });
}

fn bench_cost_model(c: &mut Criterion) {
    let g = geom();
    let ctx = OperatorContext::new([true; 4], false, true, 2);
    c.bench_function("cost_model_all_regions", |b| {
        b.iter(|| {
            let mut total = 0u64;
            for region in [
                KernelRegion::Interior,
                KernelRegion::Exterior(Axis::X),
                KernelRegion::Exterior(Axis::Y),
                KernelRegion::Exterior(Axis::Z),
                KernelRegion::Exterior(Axis::T),
                KernelRegion::ExteriorAll,
                KernelRegion::Policy,
            ] {
                total += CostModel::flop_count(region, black_box(&ctx), &g);
                total += CostModel::byte_count(region, black_box(&ctx), &g);
            }
            total
        })
    });
}

criterion_group!(
    benches,
    bench_signature_build,
    bench_route_resolution,
    bench_cost_model
);
criterion_main!(benches);
