// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Subtraction of accepted issues from found issues.

use crate::IssueReport;

/// Compute the net-new issues: `found` minus `accepted`, bucket by bucket.
///
/// Header lines must match exactly. Buckets that only exist in `accepted`
/// are ignored. Buckets left empty are dropped from the result. `found` is
/// never modified; the result is an independent copy.
pub fn diff(found: &IssueReport, accepted: Option<&IssueReport>) -> IssueReport {
    let mut net_new = found.clone();
    let Some(accepted) = accepted else {
        return net_new;
    };

    for bucket in net_new.assemblies_mut().iter_mut() {
        if let Some(allowed) = accepted.get(&bucket.header) {
            bucket.issues.retain(|issue| !allowed.contains(issue));
        }
    }
    net_new.assemblies_mut().retain(|b| !b.issues.is_empty());
    net_new
}
