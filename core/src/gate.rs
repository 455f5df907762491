use crate::ids::{ParticipantId, UserId};
use crate::session::{Participant, SessionHost, UserInfo};

/// Decides whether `actor` may change the active participant's targets right now.
///
/// The referee only stands in for participants without a human owner; everyone else needs to
/// own the active participant's entity.
pub fn can_modify(actor: &UserInfo, session: &dyn SessionHost) -> bool {
    active_for(actor, session).is_some()
}

/// Like [`can_modify`], returning the active participant on success.
pub fn active_for(actor: &UserInfo, session: &dyn SessionHost) -> Option<Participant> {
    if !session.is_started() {
        return None;
    }
    let participant = session.active_participant()?;
    let token = participant.token.as_ref()?;
    if !session.entity_exists(token) {
        return None;
    }
    let allowed = if actor.referee {
        !participant.is_player_controlled()
    } else {
        session.user_owns(&actor.id, token)
    };
    if allowed {
        Some(participant)
    } else {
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    NotAuthority,
    NotStarted,
    NoActiveParticipant,
    StaleParticipant,
    UnknownRequester,
    NotOwner,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestVerdict {
    Accept(Participant),
    Drop(DropReason),
}

/// Authority-side re-validation of a remote mutation request.
pub fn check_request(
    participant: &ParticipantId,
    requester: &UserId,
    session: &dyn SessionHost,
) -> RequestVerdict {
    if !session.local_is_authority() {
        return RequestVerdict::Drop(DropReason::NotAuthority);
    }
    if !session.is_started() {
        return RequestVerdict::Drop(DropReason::NotStarted);
    }
    let Some(active) = session.active_participant() else {
        return RequestVerdict::Drop(DropReason::NoActiveParticipant);
    };
    if active.id != *participant {
        return RequestVerdict::Drop(DropReason::StaleParticipant);
    }
    let Some(actor) = session.user(requester) else {
        return RequestVerdict::Drop(DropReason::UnknownRequester);
    };
    match active_for(&actor, session) {
        Some(active) => RequestVerdict::Accept(active),
        None => RequestVerdict::Drop(DropReason::NotOwner),
    }
}
