//! Reassembly of facets fetched alongside base bug fields.

use crate::bugzilla::model::{Attachment, Bug, Comment, Event};

/// Per-bug facet lists, each in requested-id order; `None` when the facet
/// wasn't requested.
#[derive(Debug, Default)]
pub struct Facets {
    pub attachments: Option<Vec<Vec<Attachment>>>,
    pub comments: Option<Vec<Vec<Comment>>>,
    pub history: Option<Vec<Vec<Event>>>,
}

/// Slots that can each be taken once.
struct Slots<T>(Vec<Option<Vec<T>>>);

impl<T> Slots<T> {
    fn new(lists: Option<Vec<Vec<T>>>) -> Self {
        Self(lists.unwrap_or_default().into_iter().map(Some).collect())
    }

    fn take(&mut self, index: usize) -> Vec<T> {
        self.0.get_mut(index).and_then(Option::take).unwrap_or_default()
    }
}

/// Attach facets to bugs by the bug's position in the requested id list.
///
/// Permissive gets may return fewer bugs than were requested, so the
/// facet lists are matched on id position rather than on reply order.
pub fn attach_facets(bugs: Vec<Bug>, ids: &[u64], facets: Facets) -> Vec<Bug> {
    let mut attachments = Slots::new(facets.attachments);
    let mut comments = Slots::new(facets.comments);
    let mut history = Slots::new(facets.history);
    bugs.into_iter()
        .map(|mut bug| {
            if let Some(index) = ids.iter().position(|&id| id == bug.id) {
                bug.attachments = attachments.take(index);
                bug.comments = comments.take(index);
                bug.history = history.take(index);
            }
            bug
        })
        .collect()
}
