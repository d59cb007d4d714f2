//! Round-robin selection over the currently available paths.

use tracing::trace;

use super::rtt::first_sendable;
use super::Subflow;

/// Per-connection round-robin position.
///
/// The index refers to the available set of the previous call; the set is
/// recounted on every call since paths come and go between opportunities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundRobinCursor {
    last_index: Option<usize>,
    last_count: usize,
}

impl RoundRobinCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_index(&self) -> Option<usize> {
        self.last_index
    }

    /// Size of the set the last selection was made from.
    pub fn last_count(&self) -> usize {
        self.last_count
    }

    fn advance(&mut self, count: usize) -> usize {
        let next = self.last_index.map_or(0, |last| (last + 1) % count);
        self.last_index = Some(next);
        self.last_count = count;
        next
    }

    /// Pick the next path: regular paths first, then backup paths, then (if
    /// `relaxed`) any path able to send at all.
    pub fn select<'a>(
        &mut self,
        available: &[&'a Subflow],
        all: &'a [Subflow],
        relaxed: bool,
    ) -> Option<&'a Subflow> {
        for backup in [false, true] {
            let tier: Vec<&Subflow> = available
                .iter()
                .copied()
                .filter(|path| path.backup == backup)
                .collect();
            if tier.is_empty() {
                continue;
            }

            let index = self.advance(tier.len());
            let selected = tier[index];
            trace!(
                index,
                count = tier.len(),
                backup,
                path = %selected.id,
                "round-robin selection"
            );
            return Some(selected);
        }

        if relaxed {
            first_sendable(all)
        } else {
            None
        }
    }
}
