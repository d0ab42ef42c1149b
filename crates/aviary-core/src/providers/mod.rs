//! Message-generating providers. Each provider kind in `ProviderKind`
//! implements `GenerateMessage`, producing zero or more candidate messages
//! on a scheduler tick or webhook call.

mod command;
mod jsoncommand;
mod multijsoncommand;
mod ping;
mod push;
mod rssfeed;

pub use command::CommandProvider;
pub use jsoncommand::JsonCommandProvider;
pub use multijsoncommand::MultiJsonCommandProvider;
pub use ping::PingProvider;
pub use push::PushProvider;
pub use rssfeed::RssFeedProvider;

use crate::error::Result;
use crate::types::Message;

/// A source of candidate messages. `ping`/`command`/`jsoncommand` produce at
/// most one message per tick; `multijsoncommand`/`rssfeed` may produce many,
/// each filtered against a processed-item cache.
#[async_trait::async_trait]
pub trait GenerateMessage: Send + Sync {
    async fn generate(&mut self) -> Result<Vec<Message>>;
}
