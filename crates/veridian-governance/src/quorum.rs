/// Byzantine quorum threshold for a group of size `n` tolerating up to
/// `f = (n - 1) / 3` faulty members: `n - f`. Any two quorums of this size
/// intersect in at least `f + 1` members, so at least one honest member sees
/// both decisions and at most one can pass.
pub fn quorum_size(n: usize) -> usize {
    n - (n.saturating_sub(1)) / 3
}
