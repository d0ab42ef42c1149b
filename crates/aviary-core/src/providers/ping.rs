use super::GenerateMessage;
use crate::error::Result;
use crate::types::Message;

/// Emits the same literal message on every tick. Mainly useful for
/// exercising the scheduler and dispatch path end to end.
pub struct PingProvider {
    message: String,
}

impl PingProvider {
    pub fn new(message: String) -> Self {
        Self { message }
    }
}

#[async_trait::async_trait]
impl GenerateMessage for PingProvider {
    async fn generate(&mut self) -> Result<Vec<Message>> {
        Ok(vec![Message {
            text: self.message.clone(),
            attachments: Vec::new(),
        }])
    }
}
