//! Guaranteed release of ephemeral contexts and their parent chains

use tracing::{debug, warn};

use crate::resolver::EphemeralContext;

/// Release `context` and every ancestor in its parent chain
///
/// Iterative walk: release the context, move to its parent, repeat until a
/// context has no parent left to yield. A release failure at any level is
/// logged and discarded so the walk always reaches the end of the chain;
/// nothing here can mask a merge or resolution error already in flight.
pub fn tear_down(mut context: Box<dyn EphemeralContext>) {
    let mut depth = 0usize;
    loop {
        if let Err(error) = context.release() {
            warn!(depth, "failed to release ephemeral context: {error}");
        }
        match context.take_parent() {
            Some(parent) => {
                context = parent;
                depth += 1;
            }
            None => break,
        }
    }
    debug!(contexts = depth + 1, "ephemeral context chain released");
}
