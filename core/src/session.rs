use crate::assignment::TargetAssignment;
use crate::geometry::{Footprint, GridShape};
use crate::ids::{EntityId, ParticipantId, UserId};

/// One entry in the turn order. Owned by the host's turn engine; read-only here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Participant {
    pub id: ParticipantId,
    pub token: Option<EntityId>,
    pub owner: Option<UserId>,
    pub npc: bool,
}

impl Participant {
    /// Whether a human player controls this participant's entity.
    pub fn is_player_controlled(&self) -> bool {
        !self.npc && self.owner.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserInfo {
    pub id: UserId,
    pub referee: bool,
    pub color: Option<String>,
}

/// Turn/session engine queries.
pub trait SessionHost {
    fn is_started(&self) -> bool;
    fn active_participant(&self) -> Option<Participant>;
    /// Every participant in turn order.
    fn participants(&self) -> Vec<Participant>;
    fn entity_exists(&self, entity: &EntityId) -> bool;
    fn user_owns(&self, user: &UserId, entity: &EntityId) -> bool;
    fn user(&self, user: &UserId) -> Option<UserInfo>;
    /// The local viewer.
    fn viewer(&self) -> UserInfo;

    /// Whether this process holds canonical write authority.
    fn local_is_authority(&self) -> bool {
        self.viewer().referee
    }

    fn participant_for_entity(&self, entity: &EntityId) -> Option<Participant> {
        self.participants()
            .into_iter()
            .find(|participant| participant.token.as_ref() == Some(entity))
    }
}

/// Per-viewer visibility answers.
pub trait VisibilityOracle {
    fn is_visible(&self, entity: &EntityId) -> bool;
    fn viewer_owns(&self, entity: &EntityId) -> bool;
}

pub trait SceneQuery {
    fn footprint(&self, entity: &EntityId) -> Option<Footprint>;
    fn grid_shape(&self) -> GridShape;
}

/// Read access to the canonical target records.
pub trait AssignmentSource {
    fn assignment(&self, participant: &ParticipantId) -> TargetAssignment;
}
