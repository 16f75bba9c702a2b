//! What to do with a change notification, decided without side effects.

use crate::ordering::ColumnMap;
use crate::store::FeedItem;
use crate::types::{ChangeKind, ChangeTable, OwnerId};

#[derive(Debug, Clone, Copy)]
pub struct MergeContext<'a> {
    pub owner: OwnerId,
    /// The first full fetch has completed.
    pub loaded: bool,
    pub writes_in_flight: bool,
    pub snapshot: &'a ColumnMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    OtherOwner,
    NotLoaded,
    Subtasks,
    AlreadyReflected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    Ignore(IgnoreReason),
    /// Refetch once the last in-flight write settles.
    Defer,
    /// Refetch now and replace the snapshot wholesale.
    Refetch,
}

/// Rules apply in order; the first match wins.
pub fn decide(item: &FeedItem, context: &MergeContext<'_>) -> MergeDecision {
    let event = match item {
        FeedItem::Lagged(_) => {
            return if !context.loaded {
                MergeDecision::Ignore(IgnoreReason::NotLoaded)
            } else if context.writes_in_flight {
                MergeDecision::Defer
            } else {
                MergeDecision::Refetch
            };
        }
        FeedItem::Event(event) => event,
    };

    if event.owner != context.owner {
        return MergeDecision::Ignore(IgnoreReason::OtherOwner);
    }
    if !context.loaded {
        return MergeDecision::Ignore(IgnoreReason::NotLoaded);
    }
    if event.table == ChangeTable::Subtasks {
        return MergeDecision::Ignore(IgnoreReason::Subtasks);
    }
    if context.writes_in_flight {
        return MergeDecision::Defer;
    }

    let reflected = match event.kind {
        ChangeKind::Insert | ChangeKind::Update => event
            .task
            .as_ref()
            .is_some_and(|row| context.snapshot.task(row.id) == Some(row)),
        ChangeKind::Delete => context.snapshot.task(event.record_id).is_none(),
    };
    if reflected {
        MergeDecision::Ignore(IgnoreReason::AlreadyReflected)
    } else {
        MergeDecision::Refetch
    }
}
