//! Conversion logic between DTOs and domain entities.

use crate::domain::StoredMessage;
use crate::infrastructure::dto::websocket::WireMessage;

impl From<StoredMessage> for WireMessage {
    fn from(model: StoredMessage) -> Self {
        let text = if model.body.is_empty() {
            None
        } else {
            Some(model.body)
        };
        Self {
            session_id: model.session_id.into_string(),
            sender: model.sender.into_string(),
            text,
            image_data: model.image_ref,
            message_type: model.kind,
            question_number: model.question_number,
            timestamp: model.timestamp.value(),
        }
    }
}
