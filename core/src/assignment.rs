use serde_json::{Map, Value};

use crate::ids::{EntityId, UserId};

pub const FLAG_SCOPE: &str = "targetweave";
pub const FLAG_KEY: &str = "targetsByUser";

/// Ordered, duplicate-free list of target entity ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSet(Vec<EntityId>);

impl TargetSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn single(id: EntityId) -> Self {
        Self(vec![id])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.0.contains(id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EntityId> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[EntityId] {
        &self.0
    }

    /// Appends `id` unless already present. Returns whether the set grew.
    pub fn insert(&mut self, id: EntityId) -> bool {
        if self.0.contains(&id) {
            return false;
        }
        self.0.push(id);
        true
    }

    pub fn remove(&mut self, id: &EntityId) -> bool {
        let before = self.0.len();
        self.0.retain(|existing| existing != id);
        self.0.len() != before
    }

    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&EntityId) -> bool,
    {
        self.0.retain(keep);
    }

    pub fn into_vec(self) -> Vec<EntityId> {
        self.0
    }
}

impl FromIterator<EntityId> for TargetSet {
    fn from_iter<I: IntoIterator<Item = EntityId>>(iter: I) -> Self {
        let mut set = TargetSet::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

impl<'a> IntoIterator for &'a TargetSet {
    type Item = &'a EntityId;
    type IntoIter = std::slice::Iter<'a, EntityId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A single user gesture turned into a change of one proposer's set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetEdit {
    Replace(EntityId),
    Toggle(EntityId),
    Clear,
}

impl TargetEdit {
    pub fn apply(&self, current: &TargetSet) -> TargetSet {
        match self {
            TargetEdit::Replace(id) => TargetSet::single(id.clone()),
            TargetEdit::Toggle(id) => {
                let mut next = current.clone();
                if !next.remove(id) {
                    next.insert(id.clone());
                }
                next
            }
            TargetEdit::Clear => TargetSet::new(),
        }
    }
}

/// Per-participant record of every proposer's chosen targets, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetAssignment {
    entries: Vec<(UserId, TargetSet)>,
}

impl TargetAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|(_, set)| set.is_empty())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&UserId, &TargetSet)> {
        self.entries.iter().map(|(user, set)| (user, set))
    }

    pub fn proposers(&self) -> impl Iterator<Item = &UserId> {
        self.entries.iter().map(|(user, _)| user)
    }

    pub fn get(&self, proposer: &UserId) -> Option<&TargetSet> {
        self.entries
            .iter()
            .find(|(user, _)| user == proposer)
            .map(|(_, set)| set)
    }

    /// Targets of `proposer`, empty when the proposer has no entry.
    pub fn targets_for(&self, proposer: &UserId) -> TargetSet {
        self.get(proposer).cloned().unwrap_or_default()
    }

    /// Replaces the full set for `proposer`, keeping its position if it already had an entry.
    pub fn set(&mut self, proposer: UserId, targets: TargetSet) {
        if let Some(slot) = self.entries.iter_mut().find(|(user, _)| *user == proposer) {
            slot.1 = targets;
        } else {
            self.entries.push((proposer, targets));
        }
    }

    /// Like [`TargetAssignment::set`], but a non-empty set also empties every other proposer.
    pub fn set_exclusive(&mut self, proposer: UserId, targets: TargetSet) {
        if !targets.is_empty() {
            for (user, set) in self.entries.iter_mut() {
                if *user != proposer {
                    *set = TargetSet::new();
                }
            }
        }
        self.set(proposer, targets);
    }

    pub fn first_non_empty_proposer(&self) -> Option<&UserId> {
        self.entries
            .iter()
            .find(|(_, set)| !set.is_empty())
            .map(|(user, _)| user)
    }

    /// Empties every proposer's set without dropping the entries.
    pub fn clear_all(&mut self) {
        for (_, set) in self.entries.iter_mut() {
            *set = TargetSet::new();
        }
    }

    pub fn sets_mut(&mut self) -> impl Iterator<Item = (&UserId, &mut TargetSet)> {
        self.entries.iter_mut().map(|(user, set)| (&*user, set))
    }

    /// Reads the persisted flag value. Anything that is not an object of string arrays is
    /// treated as missing data, never as an error.
    pub fn from_flag(value: Option<&Value>) -> Self {
        let mut assignment = TargetAssignment::new();
        let Some(Value::Object(map)) = value else {
            return assignment;
        };
        for (key, list) in map {
            let Ok(user) = UserId::parse(key) else {
                continue;
            };
            let targets = match list {
                Value::Array(items) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(|raw| EntityId::parse(raw).ok())
                    .collect(),
                _ => TargetSet::new(),
            };
            assignment.set(user, targets);
        }
        assignment
    }

    pub fn to_flag(&self) -> Value {
        let mut map = Map::new();
        for (user, set) in &self.entries {
            let ids = set
                .iter()
                .map(|id| Value::String(id.as_str().to_string()))
                .collect();
            map.insert(user.as_str().to_string(), Value::Array(ids));
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eid(raw: &str) -> EntityId {
        EntityId::parse(raw).expect("valid entity id")
    }

    fn uid(raw: &str) -> UserId {
        UserId::parse(raw).expect("valid user id")
    }

    fn set(ids: &[&str]) -> TargetSet {
        ids.iter().map(|raw| eid(raw)).collect()
    }

    #[test]
    fn toggle_is_symmetric_difference() {
        let current = set(&["a", "b"]);
        assert_eq!(TargetEdit::Toggle(eid("b")).apply(&current), set(&["a"]));
        assert_eq!(
            TargetEdit::Toggle(eid("c")).apply(&current),
            set(&["a", "b", "c"])
        );
    }

    #[test]
    fn replace_and_clear_ignore_current() {
        let current = set(&["a", "b"]);
        assert_eq!(TargetEdit::Replace(eid("z")).apply(&current), set(&["z"]));
        assert!(TargetEdit::Clear.apply(&current).is_empty());
    }

    #[test]
    fn collecting_drops_duplicates_in_order() {
        assert_eq!(set(&["b", "a", "b"]).into_vec(), vec![eid("b"), eid("a")]);
    }

    #[test]
    fn first_non_empty_follows_insertion_order() {
        let mut assignment = TargetAssignment::new();
        assignment.set(uid("u2"), TargetSet::new());
        assignment.set(uid("u1"), set(&["a"]));
        assignment.set(uid("u3"), set(&["b"]));
        assert_eq!(assignment.first_non_empty_proposer(), Some(&uid("u1")));
    }

    #[test]
    fn set_exclusive_clears_other_authors_only_when_non_empty() {
        let mut assignment = TargetAssignment::new();
        assignment.set(uid("u1"), set(&["a"]));
        assignment.set_exclusive(uid("u2"), TargetSet::new());
        assert_eq!(assignment.targets_for(&uid("u1")), set(&["a"]));
        assignment.set_exclusive(uid("u2"), set(&["b"]));
        assert!(assignment.targets_for(&uid("u1")).is_empty());
        assert_eq!(assignment.first_non_empty_proposer(), Some(&uid("u2")));
    }

    #[test]
    fn malformed_flag_reads_as_empty() {
        assert!(TargetAssignment::from_flag(None).is_empty());
        assert!(TargetAssignment::from_flag(Some(&json!("junk"))).is_empty());
        let parsed = TargetAssignment::from_flag(Some(&json!({
            "u1": "not-a-list",
            "u2": ["a", 7, null, "a", "b"],
            "": ["c"],
        })));
        assert!(parsed.targets_for(&uid("u1")).is_empty());
        assert_eq!(parsed.targets_for(&uid("u2")), set(&["a", "b"]));
        assert_eq!(parsed.proposers().count(), 2);
    }

    #[test]
    fn flag_keeps_proposer_order() {
        let mut assignment = TargetAssignment::new();
        assignment.set(uid("zed"), set(&["a"]));
        assignment.set(uid("amy"), set(&["b", "c"]));
        let value = assignment.to_flag();
        let keys: Vec<_> = value
            .as_object()
            .expect("object flag")
            .keys()
            .cloned()
            .collect();
        assert_eq!(keys, vec!["zed".to_string(), "amy".to_string()]);
        assert_eq!(TargetAssignment::from_flag(Some(&value)), assignment);
    }
}
