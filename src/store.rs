use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use targetweave_core::{
    AssignmentSource, AuthorshipPolicy, ParticipantId, TargetAssignment, TargetSet, UserId,
    FLAG_KEY, FLAG_SCOPE,
};

use crate::error::StoreError;
use crate::host::FlagStore;

/// Reads and writes the per-participant target records held in the host's document store.
///
/// Reads made while this client's own write is still in flight see the value being written,
/// so a redraw scheduled between submit and acknowledgement does not flicker back.
pub struct TargetStore {
    flags: Rc<dyn FlagStore>,
    in_flight: RefCell<HashMap<ParticipantId, (u64, TargetAssignment)>>,
    next_ticket: Cell<u64>,
}

impl TargetStore {
    pub fn new(flags: Rc<dyn FlagStore>) -> Self {
        Self {
            flags,
            in_flight: RefCell::new(HashMap::new()),
            next_ticket: Cell::new(0),
        }
    }

    pub fn get(&self, participant: &ParticipantId) -> TargetAssignment {
        if let Some((_, pending)) = self.in_flight.borrow().get(participant) {
            return pending.clone();
        }
        let raw = self.flags.read_flag(participant, FLAG_SCOPE, FLAG_KEY);
        TargetAssignment::from_flag(raw.as_ref())
    }

    pub fn get_for(&self, participant: &ParticipantId, proposer: &UserId) -> TargetSet {
        self.get(participant).targets_for(proposer)
    }

    pub fn first_non_empty_proposer(&self, participant: &ParticipantId) -> Option<UserId> {
        self.get(participant).first_non_empty_proposer().cloned()
    }

    /// Replaces one proposer's set, leaving other proposers untouched.
    pub async fn set(
        &self,
        participant: &ParticipantId,
        proposer: &UserId,
        targets: TargetSet,
    ) -> Result<TargetAssignment, StoreError> {
        self.commit(participant, proposer, targets, AuthorshipPolicy::Shared)
            .await
    }

    pub async fn commit(
        &self,
        participant: &ParticipantId,
        proposer: &UserId,
        targets: TargetSet,
        policy: AuthorshipPolicy,
    ) -> Result<TargetAssignment, StoreError> {
        let mut next = self.get(participant);
        match policy {
            AuthorshipPolicy::Exclusive => next.set_exclusive(proposer.clone(), targets),
            AuthorshipPolicy::Shared => next.set(proposer.clone(), targets),
        }
        self.write(participant, next.clone()).await?;
        Ok(next)
    }

    pub async fn clear(&self, participant: &ParticipantId) -> Result<(), StoreError> {
        let mut next = self.get(participant);
        next.clear_all();
        self.write(participant, next).await
    }

    /// Writes the whole record. The overlay entry is dropped once the write settles, unless a
    /// newer write for the same participant replaced it meanwhile.
    pub async fn write(
        &self,
        participant: &ParticipantId,
        assignment: TargetAssignment,
    ) -> Result<(), StoreError> {
        let ticket = self.next_ticket.get().wrapping_add(1);
        self.next_ticket.set(ticket);
        let value = assignment.to_flag();
        self.in_flight
            .borrow_mut()
            .insert(participant.clone(), (ticket, assignment));

        let result = self
            .flags
            .write_flag(participant, FLAG_SCOPE, FLAG_KEY, value)
            .await;

        let mut in_flight = self.in_flight.borrow_mut();
        if in_flight
            .get(participant)
            .is_some_and(|(current, _)| *current == ticket)
        {
            in_flight.remove(participant);
        }
        result
    }

    pub fn has_pending_writes(&self) -> bool {
        !self.in_flight.borrow().is_empty()
    }
}

impl AssignmentSource for TargetStore {
    fn assignment(&self, participant: &ParticipantId) -> TargetAssignment {
        self.get(participant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::LocalBoxFuture;
    use serde_json::Value;
    use std::future::Future;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use targetweave_core::EntityId;

    /// A flag store whose writes stay pending until the first poll after `release`.
    #[derive(Default)]
    struct GatedFlags {
        values: RefCell<HashMap<ParticipantId, Value>>,
        released: Cell<bool>,
        fail: Cell<bool>,
    }

    struct Gate<'a> {
        flags: &'a GatedFlags,
        participant: ParticipantId,
        value: Option<Value>,
    }

    impl Future for Gate<'_> {
        type Output = Result<(), StoreError>;

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
            if !self.flags.released.get() {
                cx.waker().wake_by_ref();
                return Poll::Pending;
            }
            if self.flags.fail.get() {
                return Poll::Ready(Err(StoreError::Rejected {
                    participant: self.participant.clone(),
                    reason: "offline".to_string(),
                }));
            }
            if let Some(value) = self.value.take() {
                self.flags
                    .values
                    .borrow_mut()
                    .insert(self.participant.clone(), value);
            }
            Poll::Ready(Ok(()))
        }
    }

    impl FlagStore for GatedFlags {
        fn read_flag(&self, participant: &ParticipantId, _scope: &str, _key: &str) -> Option<Value> {
            self.values.borrow().get(participant).cloned()
        }

        fn write_flag<'a>(
            &'a self,
            participant: &'a ParticipantId,
            _scope: &'a str,
            _key: &'a str,
            value: Value,
        ) -> LocalBoxFuture<'a, Result<(), StoreError>> {
            Box::pin(Gate {
                flags: self,
                participant: participant.clone(),
                value: Some(value),
            })
        }
    }

    fn pid(raw: &str) -> ParticipantId {
        ParticipantId::parse(raw).expect("valid participant id")
    }

    fn uid(raw: &str) -> UserId {
        UserId::parse(raw).expect("valid user id")
    }

    fn eid(raw: &str) -> EntityId {
        EntityId::parse(raw).expect("valid entity id")
    }

    fn poll_once<F: Future>(future: Pin<&mut F>) -> Poll<F::Output> {
        let waker = futures_util::task::noop_waker();
        let mut cx = Context::from_waker(&waker);
        future.poll(&mut cx)
    }

    #[test]
    fn reads_see_writes_that_have_not_settled() {
        let flags = Rc::new(GatedFlags::default());
        let store = TargetStore::new(flags.clone());
        let p1 = pid("p1");
        let alice = uid("alice");

        let mut pending = Box::pin(store.set(&p1, &alice, TargetSet::single(eid("e2"))));
        assert!(poll_once(pending.as_mut()).is_pending());
        assert_eq!(store.get_for(&p1, &alice).as_slice(), &[eid("e2")]);
        assert!(flags.read_flag(&p1, FLAG_SCOPE, FLAG_KEY).is_none());

        flags.released.set(true);
        assert!(matches!(poll_once(pending.as_mut()), Poll::Ready(Ok(_))));
        drop(pending);
        assert!(!store.has_pending_writes());
        assert_eq!(store.get_for(&p1, &alice).as_slice(), &[eid("e2")]);
    }

    #[test]
    fn failed_write_falls_back_to_canonical_state() {
        let flags = Rc::new(GatedFlags::default());
        flags.released.set(true);
        flags.fail.set(true);
        let store = TargetStore::new(flags);
        let p1 = pid("p1");

        let alice = uid("alice");
        let mut pending = Box::pin(store.set(&p1, &alice, TargetSet::single(eid("e2"))));
        assert!(matches!(poll_once(pending.as_mut()), Poll::Ready(Err(_))));
        drop(pending);
        assert!(store.get(&p1).is_empty());
    }

    #[test]
    fn exclusive_commit_clears_other_proposers() {
        let flags = Rc::new(GatedFlags::default());
        flags.released.set(true);
        let store = TargetStore::new(flags);
        let p1 = pid("p1");

        let gm = uid("gm");
        let alice = uid("alice");
        let mut first = Box::pin(store.set(&p1, &gm, TargetSet::single(eid("e2"))));
        assert!(poll_once(first.as_mut()).is_ready());
        drop(first);
        let mut second = Box::pin(store.commit(
            &p1,
            &alice,
            TargetSet::single(eid("e3")),
            AuthorshipPolicy::Exclusive,
        ));
        assert!(poll_once(second.as_mut()).is_ready());
        drop(second);

        assert!(store.get_for(&p1, &uid("gm")).is_empty());
        assert_eq!(store.first_non_empty_proposer(&p1), Some(uid("alice")));
    }
}
