use tessella::{Axis, KernelRegion, OperatorContext, PackLabel, SignatureSet};

fn ctx(comm_dim: [bool; 4], dagger: bool, xpay: bool) -> OperatorContext {
    OperatorContext::new(comm_dim, dagger, xpay, 2)
}

#[test]
fn base_string_carries_comm_mask_and_flags_in_order() {
    let set = SignatureSet::new(
        &ctx([true, true, false, false], true, true),
        [true, true, false, false],
        true,
    );
    assert_eq!(set.base(), ",commDim=1100,xpay,dagger");

    let plain = SignatureSet::new(
        &ctx([false; 4], false, false),
        [false; 4],
        true,
    );
    assert_eq!(plain.base(), ",commDim=0000");
}

#[test]
fn identical_invocations_produce_identical_signatures() {
    let a = SignatureSet::new(&ctx([true; 4], false, true), [true; 4], true);
    let b = SignatureSet::new(&ctx([true; 4], false, true), [true; 4], true);
    for region in [
        KernelRegion::Interior,
        KernelRegion::Exterior(Axis::Z),
        KernelRegion::ExteriorAll,
        KernelRegion::Policy,
    ] {
        assert_eq!(a.for_region(region), b.for_region(region));
    }
}

#[test]
fn every_flag_perturbs_the_signature() {
    let base = SignatureSet::new(&ctx([true, false, false, false], false, false), [true; 4], true);
    let daggered = SignatureSet::new(&ctx([true, false, false, false], true, false), [true; 4], true);
    let accumulating =
        SignatureSet::new(&ctx([true, false, false, false], false, true), [true; 4], true);
    let other_comm =
        SignatureSet::new(&ctx([false, true, false, false], false, false), [true; 4], true);

    let r = KernelRegion::Interior;
    assert_ne!(base.for_region(r), daggered.for_region(r));
    assert_ne!(base.for_region(r), accumulating.for_region(r));
    assert_ne!(base.for_region(r), other_comm.for_region(r));
}

#[test]
fn interior_carries_the_partition_mask() {
    let set = SignatureSet::new(&ctx([true, true, false, false], false, false), [true, true, false, true], true);
    assert_eq!(
        set.for_region(KernelRegion::Interior),
        "policy_kernel=interior,comm=1101,commDim=1100"
    );
    assert_eq!(
        set.for_region(KernelRegion::Exterior(Axis::X)),
        "policy_kernel=exterior_x,commDim=1100"
    );
}

#[test]
fn single_device_interior_has_a_dedicated_tag() {
    let set = SignatureSet::new(&ctx([false; 4], false, false), [false; 4], false);
    assert_eq!(
        set.for_region(KernelRegion::Interior),
        "policy_kernel=single-device,commDim=0000"
    );
}

#[test]
fn regions_never_share_a_signature() {
    let set = SignatureSet::new(&ctx([true; 4], false, false), [true; 4], true);
    let regions = [
        KernelRegion::Interior,
        KernelRegion::Exterior(Axis::X),
        KernelRegion::Exterior(Axis::Y),
        KernelRegion::Exterior(Axis::Z),
        KernelRegion::Exterior(Axis::T),
        KernelRegion::ExteriorAll,
        KernelRegion::Policy,
    ];
    for (i, a) in regions.iter().enumerate() {
        for b in &regions[i + 1..] {
            assert_ne!(set.for_region(*a), set.for_region(*b));
        }
    }
}

#[test]
fn pack_signature_appends_the_staging_label() {
    let mut set = SignatureSet::new(&ctx([true, true, false, false], false, true), [true; 4], true);
    set.set_pack(KernelRegion::Interior, PackLabel::HostRemote);
    let sig = set.pack().to_string();
    assert!(sig.starts_with("policy_kernel=interior"));
    assert!(sig.ends_with(",fused_pack,host-remote"));

    // re-deriving with a different label replaces the suffix
    set.set_pack(KernelRegion::Interior, PackLabel::DeviceDevice);
    assert!(set.pack().ends_with(",fused_pack,device-device"));
    assert_ne!(set.pack(), sig);
}
