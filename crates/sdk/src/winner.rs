use std::cmp::Ordering;

use crate::types::{OwnerId, PnlResult};

/// Best-first order: greater pnl first, then lower owner. NaN ranks last.
fn compare(a: &PnlResult, b: &PnlResult) -> Ordering {
    let key = |r: &PnlResult| {
        if r.pnl.is_nan() {
            f64::NEG_INFINITY
        } else {
            r.pnl
        }
    };
    key(b)
        .total_cmp(&key(a))
        .then_with(|| a.pnl.is_nan().cmp(&b.pnl.is_nan()))
        .then_with(|| a.owner.cmp(&b.owner))
}

/// Sort `results` best first.
pub fn rank(mut results: Vec<PnlResult>) -> Vec<PnlResult> {
    results.sort_by(compare);
    results
}

/// Select the owner with the greatest pnl.
///
/// Ties are broken by the lexicographically lowest owner, so the result does
/// not depend on the order of `results`.
pub fn select_winner(results: &[PnlResult]) -> crate::Result<OwnerId> {
    results
        .iter()
        .min_by(|a, b| compare(a, b))
        .map(|winner| winner.owner.clone())
        .ok_or(crate::Error::NoParticipants { tournament: None })
}
