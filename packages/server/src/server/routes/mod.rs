pub mod aggregate;
pub mod autocomplete;
pub mod collections;
pub mod events;
pub mod health;
pub mod items;
pub mod search;
pub mod suggest;

use serde::Serialize;

/// The `{message}` acknowledgement most write endpoints return.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
