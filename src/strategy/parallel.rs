//! Parallel Root Search
//!
//! Uses Rayon to search several context roots at once. Results come back in
//! root order whatever the scheduling.

use rayon::prelude::*;
use tracing::trace;

use crate::dom::{Document, NodeId};
use crate::search::{search, Exclude, Query};

/// Search every root, one result list per root in the order given
///
/// Below `threshold` roots the search stays on the calling thread.
pub fn search_roots(
    doc: &Document,
    roots: &[NodeId],
    query: &Query,
    exclude: Exclude<'_>,
    limit: Option<usize>,
    threshold: usize,
) -> Vec<Vec<NodeId>> {
    if roots.len() < threshold.max(2) {
        return roots
            .iter()
            .map(|&root| search(doc, root, query, exclude, limit))
            .collect();
    }
    trace!(roots = roots.len(), "parallel root search");
    roots
        .par_iter()
        .map(|&root| search(doc, root, query, exclude, limit))
        .collect()
}
