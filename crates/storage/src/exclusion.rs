//! Range-exclusion constraint on active segments
//!
//! The store refuses any batch that would leave two active segments of the
//! same span overlapping. This holds independently of the validation done by
//! the mutation operations, so a buggy or bypassing writer still cannot
//! persist an overlapping chain.
//!
//! Soft-deleted segments are ignored. Spans are independent: segments of
//! different spans never constrain each other.

use std::cmp::Ordering;

use spanline_core::{Error, Result, Segment};

/// Check that no two active segments in `segments` overlap
///
/// `segments` must all belong to one span. Order does not matter.
///
/// # Errors
///
/// - `Error::Overlap` naming the first offending pair in lower-bound order
/// - `Error::DomainMismatch` if segments use different domains
pub fn check_exclusion<'a>(segments: impl IntoIterator<Item = &'a Segment>) -> Result<()> {
    let mut active: Vec<&Segment> = segments.into_iter().filter(|s| s.is_active()).collect();
    if active.len() < 2 {
        return Ok(());
    }

    let domain = active[0].range.domain();
    if let Some(other) = active.iter().find(|s| s.range.domain() != domain) {
        return Err(Error::DomainMismatch {
            expected: domain,
            found: other.range.domain(),
        });
    }

    active.sort_by(|a, b| {
        a.range
            .lower()
            .partial_cmp(b.range.lower())
            .unwrap_or(Ordering::Equal)
    });

    // After sorting by lower bound, an overlap anywhere implies an overlap
    // with the running maximum upper bound.
    let mut reach = active[0];
    for seg in &active[1..] {
        if seg.range.overlaps(&reach.range)? {
            return Err(Error::Overlap {
                first: reach.id,
                second: seg.id,
            });
        }
        if seg.range.upper() > reach.range.upper() {
            reach = seg;
        }
    }
    Ok(())
}
