use crate::shared::constants::DEFAULT_OVERLAP_THRESHOLD;

use super::blob::Blob;

/// Removes blobs that have converged onto the same object.
///
/// For every ordered pair `(a, b)` with `a` earlier in the collection, `a`
/// is dropped when its box overlaps `b`'s at or above the threshold. The
/// latest blob of an overlapping cluster survives. The rule is pairwise and
/// order-dependent: a removed blob still counts as `b` for earlier blobs,
/// so a chain `a ~ b ~ c` with `a` and `c` disjoint collapses to `c`.
pub struct DuplicateResolver {
    overlap_threshold: f64,
}

impl DuplicateResolver {
    pub fn new(overlap_threshold: f64) -> Self {
        Self { overlap_threshold }
    }

    /// Returns the number of blobs removed.
    pub fn remove_duplicates(&self, blobs: &mut Vec<Blob>) -> usize {
        let mut removed = vec![false; blobs.len()];

        for i in 0..blobs.len() {
            for j in (i + 1)..blobs.len() {
                if blobs[i].overlap(&blobs[j].bounding_box()) >= self.overlap_threshold {
                    log::debug!(
                        "Duplicate blob removed: id={} overlaps later blob id={}",
                        blobs[i].id().short(),
                        blobs[j].id().short()
                    );
                    removed[i] = true;
                    break;
                }
            }
        }

        let count = removed.iter().filter(|r| **r).count();
        if count > 0 {
            let mut index = 0;
            blobs.retain(|_| {
                let keep = !removed[index];
                index += 1;
                keep
            });
        }
        count
    }
}

impl Default for DuplicateResolver {
    fn default() -> Self {
        Self::new(DEFAULT_OVERLAP_THRESHOLD)
    }
}
