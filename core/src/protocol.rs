use rkyv::{Archive, Deserialize, Serialize};
use serde_json::Value;

use crate::assignment::TargetSet;
use crate::codec::{decode, CodecError};
use crate::ids::{EntityId, IdError, ParticipantId, UserId};

pub const SOCKET_CHANNEL: &str = "module.targetweave";

/// Messages on the shared broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, Archive, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SocketMsg {
    /// Canonical state changed; re-read it and redraw. Carries no state.
    Redraw,
    /// A non-authority client asks the authority to commit a full target set.
    RequestTargetsUpdate {
        participant_id: ParticipantId,
        proposer_identity: UserId,
        target_entity_ids: Vec<EntityId>,
    },
}

impl SocketMsg {
    pub fn request(participant: &ParticipantId, proposer: &UserId, targets: &TargetSet) -> Self {
        SocketMsg::RequestTargetsUpdate {
            participant_id: participant.clone(),
            proposer_identity: proposer.clone(),
            target_entity_ids: targets.iter().cloned().collect(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SocketMsg::Redraw => "redraw",
            SocketMsg::RequestTargetsUpdate { .. } => "requestTargetsUpdate",
        }
    }

    /// Decodes a transport frame. Archived ids skip [`ParticipantId::parse`], so every id is
    /// checked again before the message is handed on.
    pub fn from_frame(bytes: &[u8]) -> Result<SocketMsg, CodecError> {
        let msg: SocketMsg = decode(bytes)?;
        msg.check_ids()?;
        Ok(msg)
    }

    fn check_ids(&self) -> Result<(), IdError> {
        match self {
            SocketMsg::Redraw => Ok(()),
            SocketMsg::RequestTargetsUpdate {
                participant_id,
                proposer_identity,
                target_entity_ids,
            } => {
                participant_id.check()?;
                proposer_identity.check()?;
                target_entity_ids.iter().try_for_each(EntityId::check)
            }
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Lenient decoding for hosts that relay plain JSON objects. Unknown types and requests
    /// missing their participant or proposer yield `None`; a missing or malformed target list
    /// becomes empty.
    pub fn from_json(value: &Value) -> Option<SocketMsg> {
        let object = value.as_object()?;
        match object.get("type")?.as_str()? {
            "redraw" => Some(SocketMsg::Redraw),
            "requestTargetsUpdate" => {
                let participant_id = object
                    .get("participantId")
                    .and_then(Value::as_str)
                    .and_then(|raw| ParticipantId::parse(raw).ok())?;
                let proposer_identity = object
                    .get("proposerIdentity")
                    .and_then(Value::as_str)
                    .and_then(|raw| UserId::parse(raw).ok())?;
                let target_entity_ids = match object.get("targetEntityIds") {
                    Some(Value::Array(items)) => items
                        .iter()
                        .filter_map(Value::as_str)
                        .filter_map(|raw| EntityId::parse(raw).ok())
                        .collect::<TargetSet>()
                        .into_vec(),
                    _ => Vec::new(),
                };
                Some(SocketMsg::RequestTargetsUpdate {
                    participant_id,
                    proposer_identity,
                    target_entity_ids,
                })
            }
            _ => None,
        }
    }
}
