use tessella::{
    Axis, CostModel, DispatchConfig, ExteriorStrategy, FieldGeometry, HostField, HostStream,
    KernelRegion, NoPeers, OperatorContext, StencilDispatcher, StencilField, TuningCache,
};

fn geom() -> FieldGeometry {
    FieldGeometry::new([4, 4, 4, 4], 3, 4)
}

fn fields() -> (HostField, HostField) {
    let g = geom();
    let mut input = HostField::new(g.clone());
    input.fill(|i| ((i % 17) as f32) * 0.25 - 1.0);
    (HostField::new(g), input)
}

fn dispatcher_for(partitioned: [bool; 4], strategy: ExteriorStrategy) -> StencilDispatcher {
    let config = DispatchConfig {
        strategy,
        ..DispatchConfig::multi_device(partitioned)
    };
    StencilDispatcher::new(config, &geom(), Box::new(NoPeers), TuningCache::new())
}

fn multi_dispatcher(strategy: ExteriorStrategy) -> StencilDispatcher {
    dispatcher_for([true, true, false, false], strategy)
}

fn reference_application() -> HostField {
    let config = DispatchConfig::single_device();
    let mut reference =
        StencilDispatcher::new(config, &geom(), Box::new(NoPeers), TuningCache::new());
    let mut stream = HostStream::new();
    let (mut out, mut input) = fields();
    let ctx = OperatorContext::new([false; 4], false, true, 2);
    reference
        .apply(&mut stream, &mut out, &mut input, &ctx)
        .unwrap();
    out
}

fn assert_fields_close(a: &HostField, b: &HostField) {
    for (x, y) in a.data().iter().zip(b.data()) {
        assert!((x - y).abs() < 1e-3, "{} vs {}", x, y);
    }
}

fn comm_ctx(pack: bool) -> OperatorContext {
    let g = geom();
    let mut ctx = OperatorContext::new([true, true, false, false], false, true, 2);
    if pack {
        ctx.pack_threads = 2 * (g.ghost_face(Axis::X) + g.ghost_face(Axis::Y));
    }
    ctx
}

#[test]
fn per_dimension_strategy_launches_interior_then_each_enabled_axis() {
    let mut dispatcher = multi_dispatcher(ExteriorStrategy::PerDimension);
    let mut stream = HostStream::new();
    let (mut out, mut input) = fields();

    let report = dispatcher
        .apply(&mut stream, &mut out, &mut input, &comm_ctx(true))
        .unwrap();

    let expected = vec![
        KernelRegion::Interior,
        KernelRegion::Exterior(Axis::X),
        KernelRegion::Exterior(Axis::Y),
    ];
    assert_eq!(report.regions, expected);
    assert_eq!(stream.launched_regions(), expected);
    assert!(stream.log[1].name.contains("exterior_x"));
    assert!(stream.log[2].name.contains("exterior_y"));
}

#[test]
fn fused_strategy_folds_every_axis_into_one_exterior_pass() {
    let mut dispatcher = multi_dispatcher(ExteriorStrategy::Fused);
    let mut stream = HostStream::new();
    let (mut out, mut input) = fields();

    let report = dispatcher
        .apply(&mut stream, &mut out, &mut input, &comm_ctx(true))
        .unwrap();

    assert_eq!(
        report.regions,
        vec![KernelRegion::Interior, KernelRegion::ExteriorAll]
    );
}

#[test]
fn no_communication_runs_the_interior_alone() {
    let config = DispatchConfig::single_device();
    let mut dispatcher =
        StencilDispatcher::new(config, &geom(), Box::new(NoPeers), TuningCache::new());
    let mut stream = HostStream::new();
    let (mut out, mut input) = fields();

    let ctx = OperatorContext::new([false; 4], false, false, 2);
    let report = dispatcher
        .apply(&mut stream, &mut out, &mut input, &ctx)
        .unwrap();
    assert_eq!(report.regions, vec![KernelRegion::Interior]);
}

#[test]
fn report_totals_match_the_policy_aggregate() {
    let g = geom();
    let ctx = comm_ctx(false);
    let mut dispatcher = multi_dispatcher(ExteriorStrategy::PerDimension);
    let mut stream = HostStream::new();
    let (mut out, mut input) = fields();

    let report = dispatcher
        .apply(&mut stream, &mut out, &mut input, &ctx)
        .unwrap();
    assert_eq!(
        report.flops,
        CostModel::flop_count(KernelRegion::Policy, &ctx, &g)
    );
    assert_eq!(
        report.bytes,
        CostModel::byte_count(KernelRegion::Policy, &ctx, &g)
    );
}

#[test]
fn split_application_agrees_with_the_single_device_operator() {
    // reference: one interior pass over the full periodic volume
    let out_ref = reference_application();

    // split: interior skips the X/Y faces, the staged halo brings them back
    let mut dispatcher = multi_dispatcher(ExteriorStrategy::PerDimension);
    let mut stream = HostStream::new();
    let (mut out, mut input) = fields();
    dispatcher
        .apply(&mut stream, &mut out, &mut input, &comm_ctx(true))
        .unwrap();

    assert_fields_close(&out, &out_ref);
}

#[test]
fn temporal_split_agrees_with_the_single_device_operator() {
    let out_ref = reference_application();

    // the temporal slab is staged with the projection scale applied and
    // the delivery divides it back out, so the T halo arrives unscaled
    let g = geom();
    let mut dispatcher = dispatcher_for([false, false, false, true], ExteriorStrategy::PerDimension);
    let mut stream = HostStream::new();
    let (mut out, mut input) = fields();
    let mut ctx = OperatorContext::new([false, false, false, true], false, true, 2);
    ctx.pack_threads = 2 * g.ghost_face(Axis::T);

    let report = dispatcher
        .apply(&mut stream, &mut out, &mut input, &ctx)
        .unwrap();
    assert_eq!(
        report.regions,
        vec![KernelRegion::Interior, KernelRegion::Exterior(Axis::T)]
    );
    assert_fields_close(&out, &out_ref);
}

#[test]
fn fused_split_agrees_with_the_single_device_operator() {
    let out_ref = reference_application();

    let mut dispatcher = multi_dispatcher(ExteriorStrategy::Fused);
    let mut stream = HostStream::new();
    let (mut out, mut input) = fields();
    dispatcher
        .apply(&mut stream, &mut out, &mut input, &comm_ctx(true))
        .unwrap();

    assert_fields_close(&out, &out_ref);
}

#[test]
fn second_application_reuses_every_tuned_configuration() {
    let mut dispatcher = multi_dispatcher(ExteriorStrategy::PerDimension);
    let mut stream = HostStream::new();
    let (mut out, mut input) = fields();
    let ctx = comm_ctx(true);

    dispatcher
        .apply(&mut stream, &mut out, &mut input, &ctx)
        .unwrap();
    let first = out.data().to_vec();
    assert_eq!(dispatcher.tuner.stats.searches, 3);
    assert!(dispatcher.tuner.stats.timed_runs > 0);
    let timed = dispatcher.tuner.stats.timed_runs;

    dispatcher
        .apply(&mut stream, &mut out, &mut input, &ctx)
        .unwrap();
    assert_eq!(dispatcher.tuner.stats.searches, 3);
    assert_eq!(dispatcher.tuner.stats.timed_runs, timed);
    assert_eq!(dispatcher.tuner.stats.cache_hits, 3);

    // speculative timing runs during the first search left no residue
    assert_eq!(out.data(), first.as_slice());
}

#[test]
fn input_buffer_rotates_once_per_application() {
    let mut dispatcher = multi_dispatcher(ExteriorStrategy::Fused);
    let mut stream = HostStream::new();
    let (mut out, mut input) = fields();
    let ctx = comm_ctx(true);

    assert_eq!(input.buffer_index(), 0);
    dispatcher
        .apply(&mut stream, &mut out, &mut input, &ctx)
        .unwrap();
    assert_eq!(input.buffer_index(), 1);
    dispatcher
        .apply(&mut stream, &mut out, &mut input, &ctx)
        .unwrap();
    assert_eq!(input.buffer_index(), 0);
}

#[test]
fn undefined_parity_is_rejected_before_any_launch() {
    let mut dispatcher = multi_dispatcher(ExteriorStrategy::PerDimension);
    let mut stream = HostStream::new();
    let (mut out, mut input) = fields();

    let ctx = OperatorContext::new([true, true, false, false], false, false, 3);
    let err = dispatcher
        .apply(&mut stream, &mut out, &mut input, &ctx)
        .unwrap_err();
    assert_eq!(err, "n_parity = 3 undefined");
    assert!(stream.log.is_empty());
}

#[test]
fn communication_needs_a_partitioned_axis() {
    let mut dispatcher = multi_dispatcher(ExteriorStrategy::PerDimension);
    let mut stream = HostStream::new();
    let (mut out, mut input) = fields();

    let ctx = OperatorContext::new([false, false, true, false], false, false, 2);
    let err = dispatcher
        .apply(&mut stream, &mut out, &mut input, &ctx)
        .unwrap_err();
    assert!(err.contains("unpartitioned axis z"));
}

#[test]
fn single_device_configuration_rejects_communication() {
    let config = DispatchConfig::single_device();
    let mut dispatcher =
        StencilDispatcher::new(config, &geom(), Box::new(NoPeers), TuningCache::new());
    let mut stream = HostStream::new();
    let (mut out, mut input) = fields();

    let ctx = OperatorContext::new([true, false, false, false], false, false, 2);
    assert!(dispatcher
        .apply(&mut stream, &mut out, &mut input, &ctx)
        .is_err());
}
