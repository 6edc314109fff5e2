use std::sync::atomic::{AtomicU64, Ordering};

use h4wire_frame::{
    BufferedReader, CloseHandle, Direction, Dispatcher, FrameParser, PacketType, PacketWriter,
    ParseStats, MAX_PACKET_SIZE,
};
use h4wire_transport::{Connector, LinkSettings};
use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Session behavior configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Packet buffer capacity. Default fits the largest legal packet.
    pub buffer_capacity: usize,
    /// Which side of the link this session reads.
    pub direction: Direction,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: MAX_PACKET_SIZE,
            direction: Direction::default(),
        }
    }
}

/// Why a [`Session::run`] call returned normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The transport reported end of stream between packets.
    StreamEnded,
    /// The session was closed through a [`CloseHandle`].
    Closed,
}

/// Outcome of a completed [`Session::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    /// Packets dispatched over the life of the session.
    pub packets: u64,
    /// Bytes skipped over the life of the session.
    pub skipped_bytes: u64,
    pub end: EndReason,
}

/// One H4 link and everything needed to frame it.
///
/// The session reads with a single task: [`run`](Session::run) borrows it
/// mutably, so writes and reconfiguration happen between runs. To stop a
/// run from elsewhere, take a [`close_handle`](Session::close_handle) first.
pub struct Session<C: Connector, D> {
    id: String,
    connector: C,
    settings: LinkSettings,
    reader: Option<BufferedReader<C::Source>>,
    parser: FrameParser,
    writer: PacketWriter,
    dispatcher: D,
}

impl<C: Connector, D: Dispatcher> Session<C, D> {
    /// Open the link through `connector` and build a session around it.
    pub async fn open(
        connector: C,
        settings: LinkSettings,
        dispatcher: D,
        config: SessionConfig,
    ) -> Result<Self> {
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        Self::open_with_id(format!("session-{id}"), connector, settings, dispatcher, config).await
    }

    /// Like [`open`](Session::open) with an explicit session id.
    pub async fn open_with_id(
        id: impl Into<String>,
        mut connector: C,
        settings: LinkSettings,
        dispatcher: D,
        config: SessionConfig,
    ) -> Result<Self> {
        let id = id.into();
        let source = connector.open(&settings).await?;
        info!(
            session = %id,
            baud_rate = settings.baud_rate,
            direction = ?config.direction,
            "session opened"
        );

        Ok(Self {
            id,
            connector,
            settings,
            reader: Some(BufferedReader::new(source)),
            parser: FrameParser::with_capacity(config.buffer_capacity)
                .with_direction(config.direction),
            writer: PacketWriter::new(),
            dispatcher,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Settings the current link was opened with.
    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    /// Handle that stops an in-flight [`run`](Session::run) of the current link.
    ///
    /// A reconfigured link has a new handle.
    pub fn close_handle(&self) -> Option<CloseHandle> {
        self.reader.as_ref().map(BufferedReader::close_handle)
    }

    /// Parser counters accumulated over the life of the session.
    pub fn stats(&self) -> ParseStats {
        self.parser.stats()
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut D {
        &mut self.dispatcher
    }

    pub fn into_dispatcher(self) -> D {
        self.dispatcher
    }

    /// Frame packets and dispatch them until the link ends or is closed.
    ///
    /// On normal return the link has been released. A framing error (a
    /// packet cut short, an oversized packet, a transport failure) also
    /// releases it, since the stream position is lost. A dispatcher error
    /// leaves the link open so `run` can resume with the next packet.
    pub async fn run(&mut self) -> Result<SessionSummary> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| SessionError::NotOpen(self.id.clone()))?;

        match self.parser.run(reader, &mut self.dispatcher).await {
            Ok(stats) => {
                let end = if reader.is_closed() {
                    EndReason::Closed
                } else {
                    EndReason::StreamEnded
                };
                info!(
                    session = %self.id,
                    packets = stats.packets,
                    skipped = stats.skipped_bytes,
                    ?end,
                    "session stream finished"
                );
                self.release().await;
                Ok(SessionSummary {
                    packets: stats.packets,
                    skipped_bytes: stats.skipped_bytes,
                    end,
                })
            }
            Err(err) if !err.is_fatal() => {
                debug!(session = %self.id, error = %err, "dispatcher refused packet");
                Err(err.into())
            }
            Err(err) => {
                warn!(session = %self.id, error = %err, "session aborted");
                self.release().await;
                Err(err.into())
            }
        }
    }

    /// Frame and write one packet to the link.
    pub async fn send(&mut self, packet_type: PacketType, body: &[u8]) -> Result<()> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| SessionError::NotOpen(self.id.clone()))?;
        self.writer
            .send(reader.source_mut(), packet_type, body)
            .await?;
        Ok(())
    }

    /// Close the current link. Closing a closed session is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut reader) = self.reader.take() {
            reader.close().await?;
            info!(session = %self.id, "session closed");
        }
        Ok(())
    }

    /// Replace the link with a fresh one opened with `settings`.
    ///
    /// The current reader and source are closed first; buffered bytes from
    /// the old link are discarded.
    pub async fn reconfigure(&mut self, settings: LinkSettings) -> Result<()> {
        self.close().await?;
        let source = self.connector.open(&settings).await?;
        info!(
            session = %self.id,
            baud_rate = settings.baud_rate,
            flow_control = ?settings.flow_control,
            "session reconfigured"
        );
        self.reader = Some(BufferedReader::new(source));
        self.settings = settings;
        Ok(())
    }

    /// Reopen the link with the current settings.
    pub async fn reopen(&mut self) -> Result<()> {
        let settings = self.settings.clone();
        self.reconfigure(settings).await
    }

    async fn release(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            if let Err(err) = reader.close().await {
                warn!(session = %self.id, error = %err, "failed closing link");
            }
        }
    }
}

impl<C: Connector, D> std::fmt::Debug for Session<C, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("settings", &self.settings)
            .field("open", &self.reader.is_some())
            .field("stats", &self.parser.stats())
            .finish()
    }
}
