//! `CandidateSelector` — the "tail intersection" policy.
//!
//! Given the local listing `local` (sorted ascending) and the probe's
//! missing-on-target set `missing` (sorted ascending), compute the longest
//! common suffix: the files newer than whatever the sink already has. See
//! spec §4.4 for the full rationale — this must never re-ship files older
//! than the oldest file currently on the sink, even though the sink's
//! retention policy is externally mutable.

/// Returns the longest common suffix of two ascending-sorted slices.
pub fn tail_intersection(local: &[String], missing: &[String]) -> Vec<String> {
    let mut i = local.len();
    let mut j = missing.len();
    let mut result = Vec::new();
    while i > 0 && j > 0 && local[i - 1] == missing[j - 1] {
        result.push(local[i - 1].clone());
        i -= 1;
        j -= 1;
    }
    result.reverse();
    result
}

/// Number of elements of `a` that are absent from `b`. Both must be sorted
/// ascending. Used to detect files that rotated away mid-round.
pub fn count_missing(a: &[String], b: &[String]) -> usize {
    let set: std::collections::HashSet<&String> = b.iter().collect();
    a.iter().filter(|x| !set.contains(x)).count()
}
