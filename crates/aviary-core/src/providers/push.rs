use crate::types::Message;

/// Push providers don't generate messages on a schedule; they accept
/// webhook-supplied text directly. `build_message` truncates to
/// `max_length` (if configured) with an ellipsis, and supplies
/// `default_message` when the webhook carried no text at all.
pub struct PushProvider {
    default_message: Option<String>,
    max_length: Option<usize>,
}

impl PushProvider {
    pub fn new(default_message: Option<String>, max_length: Option<usize>) -> Self {
        Self {
            default_message,
            max_length,
        }
    }

    pub fn build_message(&self, text: Option<String>) -> Message {
        let mut text = text
            .filter(|t| !t.is_empty())
            .or_else(|| self.default_message.clone())
            .unwrap_or_default();

        if let Some(max) = self.max_length {
            if text.chars().count() > max {
                let truncated: String = text.chars().take(max.saturating_sub(1)).collect();
                text = format!("{truncated}…");
            }
        }

        Message {
            text,
            attachments: Vec::new(),
        }
    }
}
