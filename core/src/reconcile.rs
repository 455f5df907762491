use crate::assignment::TargetAssignment;
use crate::ids::{EntityId, UserId};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Pruned {
    pub assignment: TargetAssignment,
    pub removed: Vec<(UserId, EntityId)>,
}

/// Drops every target that no longer resolves. Returns `None` when nothing changed.
pub fn prune_assignment<F>(assignment: &TargetAssignment, exists: F) -> Option<Pruned>
where
    F: Fn(&EntityId) -> bool,
{
    let mut next = assignment.clone();
    let mut removed = Vec::new();
    for (user, set) in next.sets_mut() {
        set.retain(|id| {
            let keep = exists(id);
            if !keep {
                removed.push((user.clone(), id.clone()));
            }
            keep
        });
    }
    if removed.is_empty() {
        return None;
    }
    Some(Pruned {
        assignment: next,
        removed,
    })
}
