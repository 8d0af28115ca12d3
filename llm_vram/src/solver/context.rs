/// The available context length closest to `target`.
///
/// Distance is absolute; on a tie the larger context wins, so a 6K request resolves to 8K
/// between 4K and 8K. `None` only when `available` is empty.
pub fn nearest_context_length(available: impl IntoIterator<Item = u64>, target: u64) -> Option<u64> {
    available
        .into_iter()
        .min_by(|a, b| {
            a.abs_diff(target)
                .cmp(&b.abs_diff(target))
                .then_with(|| b.cmp(a))
        })
}
