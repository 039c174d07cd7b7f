//! CLI channel: stdin/stdout chat as a single local user.

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use crate::channels::{Channel, IncomingMessage, MessageStream};
use crate::error::ChannelError;

/// Sender id used for every stdin line.
pub const CLI_USER_ID: &str = "local-user";

/// Reads lines from stdin and prints replies to stdout.
pub struct CliChannel {
    user_name: String,
}

impl CliChannel {
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
        }
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new("You")
    }
}

/// Forward non-blank lines from `reader` as messages from the local user
/// until EOF, a read error, or the receiver going away.
async fn forward_lines<R>(reader: R, user_name: String, tx: mpsc::UnboundedSender<IncomingMessage>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    eprint!("> ");
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "Error reading stdin");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            eprint!("> ");
            continue;
        }
        let msg = IncomingMessage::new("cli", CLI_USER_ID, line).with_sender_name(&user_name);
        if tx.send(msg).is_err() {
            break;
        }
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        tokio::spawn(forward_lines(stdin, self.user_name.clone(), tx));

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });
        Ok(Box::pin(stream))
    }

    async fn send(&self, _user_id: &str, text: &str) -> Result<(), ChannelError> {
        println!("\n{text}\n");
        eprint!("> ");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
