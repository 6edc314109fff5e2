//! Drive a session against a simulated controller and change baud rate.
//!
//! Run with:
//!   cargo run --example link-session
//!
//! Each time the session opens the link, the connector starts a fake
//! controller that answers one command with Command Complete and then hangs
//! up. Reconfiguring closes the link and opens a new one.

use bytes::Bytes;
use h4wire::frame::{PacketCollector, PacketType};
use h4wire::session::{Session, SessionConfig};
use h4wire::transport::{ChunkChannel, Connector, LinkSettings, Result};
use tokio::sync::mpsc;

struct SimulatedController;

impl Connector for SimulatedController {
    type Source = ChunkChannel;

    async fn open(&mut self, settings: &LinkSettings) -> Result<ChunkChannel> {
        eprintln!("controller link up at {} baud", settings.baud_rate);

        let (tx, source) = ChunkChannel::new(8);
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Bytes>();

        tokio::spawn(async move {
            if let Some(command) = out_rx.recv().await {
                if let [0x01, lo, hi, ..] = command[..] {
                    let reply = vec![0x04, 0x0e, 0x04, 0x01, lo, hi, 0x00];
                    let _ = tx.push(reply).await;
                }
            }
            tx.finish();
        });

        Ok(source.with_outbound(out_tx))
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(
        SimulatedController,
        LinkSettings::default(),
        PacketCollector::new(),
        SessionConfig::default(),
    )
    .await?;

    // HCI_Reset
    session.send(PacketType::Command, &[0x03, 0x0c, 0x00]).await?;
    let summary = session.run().await?;
    eprintln!("first link: {} packets, ended {:?}", summary.packets, summary.end);

    session
        .reconfigure(LinkSettings {
            baud_rate: 3_000_000,
            ..session.settings().clone()
        })
        .await?;

    // HCI_Read_Local_Version_Information
    session.send(PacketType::Command, &[0x01, 0x10, 0x00]).await?;
    session.run().await?;

    for packet in session.dispatcher().packets() {
        println!(
            "{} payload={:02x?}",
            packet.packet_type(),
            packet.payload()
        );
    }
    Ok(())
}
