use std::collections::HashMap;

use cl_types::Change;

use crate::conflict::Conflict;
use crate::types::DiffResult;

/// Compares incoming changes against a replica's own recent changes.
pub struct DiffEngine;

impl DiffEngine {
    /// Split `remote` into deltas to apply and conflicts.
    ///
    /// `local` holds the receiving side's changes since its last incorporated
    /// checkpoint. A remote change with no local counterpart is a delta;
    /// one already equal to the local state is dropped; one based on the
    /// local revision is a delta; anything else conflicts.
    pub fn diff(local: &[Change], remote: Vec<Change>) -> DiffResult {
        let by_id: HashMap<&str, &Change> =
            local.iter().map(|c| (c.model_id.as_str(), c)).collect();
        let mut result = DiffResult::default();
        for change in remote {
            match by_id.get(change.model_id.as_str()) {
                Some(local) if change.equals(local) => {}
                Some(local) if change.conflicts_with(local) => {
                    result.conflicts.push(Conflict::new(change, (*local).clone()));
                }
                _ => result.deltas.push(change),
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::ConflictKind;
    use cl_types::Revision;

    fn rev(b: u8) -> Option<Revision> {
        Some(Revision::from_digest([b; 32]))
    }

    fn change(id: &str, prev: Option<Revision>, rev: Option<Revision>) -> Change {
        let mut c = Change::new("Note", id, 1);
        c.prev = prev;
        c.rev = rev;
        c
    }

    #[test]
    fn no_local_change_is_delta() {
        let out = DiffEngine::diff(&[], vec![change("a", None, rev(1))]);
        assert_eq!(out.deltas.len(), 1);
        assert!(out.conflicts.is_empty());
    }

    #[test]
    fn based_on_local_is_delta() {
        let local = [change("a", None, rev(1))];
        let out = DiffEngine::diff(&local, vec![change("a", rev(1), rev(2))]);
        assert_eq!(out.deltas.len(), 1);
        assert!(out.conflicts.is_empty());
    }

    #[test]
    fn equal_states_are_dropped() {
        let local = [change("a", rev(1), rev(2))];
        let out = DiffEngine::diff(&local, vec![change("a", rev(0), rev(2))]);
        assert!(out.deltas.is_empty());
        assert!(out.conflicts.is_empty());

        let local = [change("b", rev(1), None)];
        let out = DiffEngine::diff(&local, vec![change("b", rev(3), None)]);
        assert!(out.deltas.is_empty());
        assert!(out.conflicts.is_empty());
    }

    #[test]
    fn divergent_edits_conflict() {
        let local = [change("a", rev(1), rev(3)), change("b", rev(1), None)];
        let remote = vec![change("a", rev(1), rev(2)), change("b", rev(1), rev(2))];
        let out = DiffEngine::diff(&local, remote);
        assert!(out.deltas.is_empty());
        assert_eq!(out.conflicts.len(), 2);
        assert_eq!(out.conflicts[0].kind, ConflictKind::UpdateUpdate);
        assert_eq!(out.conflicts[1].kind, ConflictKind::UpdateDelete);
        assert_eq!(out.conflicts[1].target_change.rev, None);
    }
}
