use targetweave_core::{CodecError, ParticipantId, UserId};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("participant {0} has no backing document")]
    MissingParticipant(ParticipantId),
    #[error("document write rejected for participant {participant}: {reason}")]
    Rejected {
        participant: ParticipantId,
        reason: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    Disconnected,
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("send failed: {0}")]
    Send(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("rendering surface is not ready")]
    NotReady,
    #[error("layer {name} could not be created: {reason}")]
    Layer { name: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("commit failed (participant={participant} proposer={proposer}): {source}")]
    Commit {
        participant: ParticipantId,
        proposer: UserId,
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}
