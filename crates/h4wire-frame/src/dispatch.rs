use tokio::sync::mpsc;

use crate::error::{FrameError, Result};
use crate::packet::{OwnedPacket, Packet};

/// Consumer of assembled packets.
///
/// A packet borrows the parser's buffer, so a dispatcher must finish with it
/// (or copy it) before returning; the next packet is read into the same
/// bytes. Returning an error stops the parse loop.
pub trait Dispatcher {
    fn dispatch(&mut self, packet: Packet<'_>) -> Result<()>;
}

impl<D: Dispatcher + ?Sized> Dispatcher for &mut D {
    fn dispatch(&mut self, packet: Packet<'_>) -> Result<()> {
        (**self).dispatch(packet)
    }
}

impl<D: Dispatcher + ?Sized> Dispatcher for Box<D> {
    fn dispatch(&mut self, packet: Packet<'_>) -> Result<()> {
        (**self).dispatch(packet)
    }
}

/// Dispatcher backed by a closure. See [`dispatch_fn`].
#[derive(Debug, Clone)]
pub struct FnDispatcher<F>(F);

/// Turn a closure into a [`Dispatcher`].
pub fn dispatch_fn<F>(f: F) -> FnDispatcher<F>
where
    F: FnMut(Packet<'_>) -> Result<()>,
{
    FnDispatcher(f)
}

impl<F> Dispatcher for FnDispatcher<F>
where
    F: FnMut(Packet<'_>) -> Result<()>,
{
    fn dispatch(&mut self, packet: Packet<'_>) -> Result<()> {
        (self.0)(packet)
    }
}

/// Copies every packet into memory.
#[derive(Debug, Clone, Default)]
pub struct PacketCollector {
    packets: Vec<OwnedPacket>,
}

impl PacketCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn packets(&self) -> &[OwnedPacket] {
        &self.packets
    }

    pub fn into_packets(self) -> Vec<OwnedPacket> {
        self.packets
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}

impl Dispatcher for PacketCollector {
    fn dispatch(&mut self, packet: Packet<'_>) -> Result<()> {
        self.packets.push(packet.to_owned_packet());
        Ok(())
    }
}

/// Forwards copies of packets to another task.
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::UnboundedSender<OwnedPacket>,
}

impl ChannelDispatcher {
    pub fn new(tx: mpsc::UnboundedSender<OwnedPacket>) -> Self {
        Self { tx }
    }

    /// Create a dispatcher and the receiver its packets arrive on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OwnedPacket>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl Dispatcher for ChannelDispatcher {
    fn dispatch(&mut self, packet: Packet<'_>) -> Result<()> {
        self.tx
            .send(packet.to_owned_packet())
            .map_err(|_| FrameError::dispatch("packet receiver dropped"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PacketType;

    fn event() -> OwnedPacket {
        OwnedPacket::new(PacketType::Event, &[0x0e, 0x01, 0x05]).unwrap()
    }

    #[test]
    fn closure_dispatcher_sees_packet() {
        let mut seen = Vec::new();
        let mut dispatcher = dispatch_fn(|packet: Packet<'_>| {
            seen.push(packet.len());
            Ok(())
        });
        let packet = event();
        dispatcher.dispatch(packet.as_packet()).unwrap();
        drop(dispatcher);
        assert_eq!(seen, vec![4]);
    }

    #[test]
    fn collector_copies_packets() {
        let mut collector = PacketCollector::new();
        let packet = event();
        collector.dispatch(packet.as_packet()).unwrap();
        collector.dispatch(packet.as_packet()).unwrap();
        assert_eq!(collector.len(), 2);
        assert_eq!(collector.packets()[0], packet);
    }

    #[test]
    fn dyn_dispatcher_through_reference() {
        let mut collector = PacketCollector::new();
        {
            let dispatcher: &mut dyn Dispatcher = &mut collector;
            dispatcher.dispatch(event().as_packet()).unwrap();
        }
        assert_eq!(collector.len(), 1);
    }

    #[tokio::test]
    async fn channel_dispatcher_forwards_and_detects_drop() {
        let (mut dispatcher, mut rx) = ChannelDispatcher::channel();
        dispatcher.dispatch(event().as_packet()).unwrap();
        assert_eq!(rx.recv().await.unwrap(), event());

        drop(rx);
        let err = dispatcher.dispatch(event().as_packet()).unwrap_err();
        assert!(matches!(err, FrameError::Dispatch(_)));
        assert!(!err.is_fatal());
    }
}
