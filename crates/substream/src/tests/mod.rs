mod property_combinators;
mod property_splitter;

pub(crate) fn quickcheck_iterations() -> u64 {
    if cfg!(any(miri, feature = "test-fast")) {
        10
    } else if is_ci::cached() {
        10_000
    } else {
        1_000
    }
}
