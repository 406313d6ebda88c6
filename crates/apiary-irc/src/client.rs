// SPDX-License-Identifier: GPL-3.0-or-later
use std::time::Duration;

use apiary_domain::AnnounceEvent;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::message::IrcMessage;
use crate::session::{Action, AnnounceSession, IrcSettings};

const JOIN_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum IrcError {
    #[error("could not connect to {server}: {source}")]
    Connect {
        server: String,
        #[source]
        source: std::io::Error,
    },
    #[error("IRC connection error: {0}")]
    Io(#[from] std::io::Error),
    #[error("connection closed by server")]
    Closed,
    #[error("announce receiver dropped")]
    ReceiverDropped,
}

/// Connect to the announce server and forward announces until the connection
/// ends. There is no reconnection.
pub async fn run(
    settings: IrcSettings,
    announces: mpsc::Sender<AnnounceEvent>,
) -> Result<(), IrcError> {
    info!(target: "irc", tracker = %settings.tracker, server = %settings.server, "connecting to IRC");
    let stream = TcpStream::connect(&settings.server)
        .await
        .map_err(|source| IrcError::Connect {
            server: settings.server.clone(),
            source,
        })?;
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    let session = AnnounceSession::new(settings);
    for line in session.registration() {
        send(&mut writer, &line).await?;
    }

    while let Some(line) = lines.next_line().await? {
        trace!(target: "irc", %line, "received");
        let Some(msg) = IrcMessage::parse(&line) else {
            continue;
        };
        for action in session.handle(&msg) {
            match action {
                Action::Send(line) => send(&mut writer, &line).await?,
                Action::JoinSoon(channel) => {
                    tokio::time::sleep(JOIN_DELAY).await;
                    info!(target: "irc", %channel, "joining announce channel");
                    send(&mut writer, &format!("JOIN {}", channel)).await?;
                }
                Action::Announce(text) => {
                    debug!(target: "irc", tracker = %session.settings().tracker, announce = %text, "announce received");
                    let event = AnnounceEvent {
                        tracker: session.settings().tracker.clone(),
                        line: text,
                    };
                    announces
                        .send(event)
                        .await
                        .map_err(|_| IrcError::ReceiverDropped)?;
                }
            }
        }
    }

    warn!(target: "irc", tracker = %session.settings().tracker, "IRC connection closed");
    Err(IrcError::Closed)
}

async fn send<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> Result<(), IrcError> {
    // keep secrets out of the logs
    if !line.starts_with("PRIVMSG") {
        trace!(target: "irc", %line, "sending");
    }
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\r\n").await?;
    writer.flush().await?;
    Ok(())
}
