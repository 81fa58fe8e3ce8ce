use qbench_core::rng::{derive_substream_seed, RngHandle};
use rand::RngCore;

#[test]
fn rng_emits_reproducible_sequence() {
    let mut rng_a = RngHandle::from_seed(47);
    let mut rng_b = RngHandle::from_seed(47);

    let seq_a: Vec<u64> = (0..100).map(|_| rng_a.next_u64()).collect();
    let seq_b: Vec<u64> = (0..100).map(|_| rng_b.next_u64()).collect();

    assert_eq!(seq_a, seq_b);
    assert_eq!(rng_a.seed(), Some(47));
}

#[test]
fn substreams_differ_but_repeat() {
    assert_eq!(derive_substream_seed(7, 1), derive_substream_seed(7, 1));
    assert_ne!(derive_substream_seed(7, 1), derive_substream_seed(7, 2));
}

#[test]
fn entropy_handles_have_no_seed() {
    assert_eq!(RngHandle::from_optional_seed(None).seed(), None);
    assert_eq!(RngHandle::from_optional_seed(Some(3)).seed(), Some(3));
}
