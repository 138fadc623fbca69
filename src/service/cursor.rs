//! Incremental sync cursors
//!
//! Process-local lower bounds for the created and deleted feeds.
//! Nothing is persisted; a restart starts from the initial lookback again.

use chrono::{Duration, NaiveDateTime};

/// Lookback used the first time a feed is polled
pub const INITIAL_LOOKBACK: Duration = Duration::days(1);

/// Overlap kept on later polls to tolerate clock skew and late backend writes
pub const OVERLAP_WINDOW: Duration = Duration::minutes(6);

/// Incremental feed selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    Created,
    Deleted,
}

impl Feed {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Deleted => "deleted",
        }
    }
}

/// Last bound handed out per feed
#[derive(Debug, Default, Clone)]
pub struct SyncCursors {
    created: Option<NaiveDateTime>,
    deleted: Option<NaiveDateTime>,
}

impl SyncCursors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the lower bound for the next poll of `feed` and advance it.
    ///
    /// The cursor moves whether or not the poll that follows succeeds.
    pub fn next_bound(&mut self, feed: Feed, now: NaiveDateTime) -> NaiveDateTime {
        let slot = self.slot_mut(feed);
        let bound = match slot {
            None => now - INITIAL_LOOKBACK,
            Some(_) => now - OVERLAP_WINDOW,
        };
        *slot = Some(bound);
        bound
    }

    /// Bound used by the most recent poll, if any
    pub fn last(&self, feed: Feed) -> Option<NaiveDateTime> {
        match feed {
            Feed::Created => self.created,
            Feed::Deleted => self.deleted,
        }
    }

    fn slot_mut(&mut self, feed: Feed) -> &mut Option<NaiveDateTime> {
        match feed {
            Feed::Created => &mut self.created,
            Feed::Deleted => &mut self.deleted,
        }
    }
}
