use std::future::Future;

use bytes::Bytes;

use crate::error::Result;

/// An asynchronous source of link bytes.
///
/// Chunk boundaries carry no meaning: a transport may split one packet over
/// many chunks or pack several packets into one. Implementations suspend in
/// [`next_chunk`](StreamSource::next_chunk) until bytes arrive.
pub trait StreamSource: Send {
    /// Wait for the next chunk of bytes.
    ///
    /// Returns `Ok(None)` once the stream has ended. An empty chunk is legal
    /// and carries no information.
    fn next_chunk(&mut self) -> impl Future<Output = Result<Option<Bytes>>> + Send;

    /// Write bytes to the link, suspending until the transport accepts all of them.
    fn write(&mut self, bytes: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Close the source. Subsequent reads report end of stream.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Hardware flow control mode requested for a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowControl {
    /// No flow control.
    #[default]
    None,
    /// RTS/CTS hardware flow control.
    Hardware,
}

/// Parameters a link is opened with.
///
/// Transports that have no notion of a line rate (sockets, channels) accept
/// and ignore these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSettings {
    /// UART baud rate.
    pub baud_rate: u32,
    /// Flow control mode.
    pub flow_control: FlowControl,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            flow_control: FlowControl::Hardware,
        }
    }
}

/// Opens fresh sources for a link.
///
/// Changing link parameters never mutates an open source: the owner closes
/// the current one and asks the connector for a new one.
pub trait Connector: Send {
    /// The source type this connector produces.
    type Source: StreamSource;

    /// Open a new source with the given settings.
    fn open(
        &mut self,
        settings: &LinkSettings,
    ) -> impl Future<Output = Result<Self::Source>> + Send;
}

/// [`Connector`] handing out one source that was opened elsewhere.
///
/// Useful when a listener accepted the link. Reopening fails with
/// [`TransportError::Closed`](crate::TransportError::Closed).
#[derive(Debug)]
pub struct OnceConnector<S> {
    source: Option<S>,
}

impl<S> OnceConnector<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Some(source),
        }
    }
}

impl<S: StreamSource> Connector for OnceConnector<S> {
    type Source = S;

    async fn open(&mut self, _settings: &LinkSettings) -> Result<S> {
        self.source.take().ok_or(crate::TransportError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChunkChannel;
    use crate::TransportError;

    #[tokio::test]
    async fn once_connector_opens_exactly_once() {
        let (_tx, source) = ChunkChannel::new(1);
        let mut connector = OnceConnector::new(source);
        let settings = LinkSettings::default();

        assert!(connector.open(&settings).await.is_ok());
        assert!(matches!(
            connector.open(&settings).await,
            Err(TransportError::Closed)
        ));
    }

    #[test]
    fn default_link_settings() {
        let settings = LinkSettings::default();
        assert_eq!(settings.baud_rate, 115_200);
        assert_eq!(settings.flow_control, FlowControl::Hardware);
    }
}
