use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::MessageResponse;

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, username: String },

    /// A message addressed to this connection's user was just persisted
    NewMessage { message: MessageResponse },

    /// The set of connected users changed
    OnlineUsers { user_ids: Vec<Uuid> },
}
