//! Primary Health Care Unit (PHCU) pairing helpers
//!
//! A PHCU is a health center and a co-located unit registered as two
//! records. The parent half has no `parent_phcu_id`; the child half points
//! at the parent's national identifier. In the destination the child is
//! nested under the parent instead of sitting next to it.

use crate::api::registry::FacilityRecord;

/// Indexes of `records` with PHCU parent halves first, page order otherwise
pub fn processing_order(records: &[FacilityRecord]) -> Vec<usize> {
    let (mut parents, others): (Vec<usize>, Vec<usize>) =
        (0..records.len()).partition(|&i| records[i].is_phcu_parent());
    parents.extend(others);
    parents
}

/// The parent half referenced by `national_id`, if it is on the same page
pub fn find_parent_half<'r>(
    records: &'r [FacilityRecord],
    national_id: &str,
) -> Option<&'r FacilityRecord> {
    records
        .iter()
        .find(|r| r.is_phcu_parent() && r.national_identifier == national_id)
}
