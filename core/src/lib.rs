pub mod assignment;
pub mod codec;
pub mod color;
pub mod config;
pub mod frame;
pub mod gate;
pub mod geometry;
pub mod ids;
pub mod protocol;
pub mod reconcile;
pub mod session;

pub use assignment::{TargetAssignment, TargetEdit, TargetSet, FLAG_KEY, FLAG_SCOPE};
pub use codec::{decode, encode, CodecError};
pub use color::Color;
pub use config::{AuthorshipPolicy, ConfigError, TargetsConfig, ToggleModifier};
pub use frame::{compose_frame, Emphasis, FrameInputs, Layer, Primitive, RenderFrame};
pub use gate::{can_modify, check_request, DropReason, RequestVerdict};
pub use geometry::{Footprint, GridShape, Point};
pub use ids::{EntityId, IdError, ParticipantId, UserId};
pub use protocol::{SocketMsg, SOCKET_CHANNEL};
pub use reconcile::{prune_assignment, Pruned};
pub use session::{
    AssignmentSource, Participant, SceneQuery, SessionHost, UserInfo, VisibilityOracle,
};
