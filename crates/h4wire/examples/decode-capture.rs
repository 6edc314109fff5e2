//! Frame a controller capture that arrives in awkward chunks.
//!
//! Run with:
//!   cargo run --example decode-capture
//!
//! A producer task pushes the capture three bytes at a time, so packets
//! straddle chunk boundaries. The parser still hands out whole packets.

use h4wire::frame::{dispatch_fn, BufferedReader, FrameParser};
use h4wire::transport::ChunkChannel;

// HCI_Reset Command Complete, a 4-byte ACL packet, and a stray byte that
// starts no packet in the controller-to-host direction.
const CAPTURE: &[u8] = &[
    0x04, 0x0e, 0x04, 0x01, 0x03, 0x0c, 0x00, //
    0x02, 0x01, 0x20, 0x04, 0x00, 0xde, 0xad, 0xbe, 0xef, //
    0x01, //
    0x04, 0x13, 0x05, 0x01, 0x01, 0x00, 0x01, 0x00,
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (tx, source) = ChunkChannel::new(4);

    let producer = tokio::spawn(async move {
        for chunk in CAPTURE.chunks(3) {
            if tx.push(chunk.to_vec()).await.is_err() {
                break;
            }
        }
        tx.finish();
    });

    let mut reader = BufferedReader::new(source);
    let mut parser = FrameParser::new();
    let mut printer = dispatch_fn(|packet| {
        println!(
            "{:<5} header={:02x?} payload={:02x?}",
            packet.packet_type().name(),
            packet.header(),
            packet.payload()
        );
        Ok(())
    });

    let stats = parser.run(&mut reader, &mut printer).await?;
    producer.await?;

    eprintln!(
        "{} packets, {} bytes skipped",
        stats.packets, stats.skipped_bytes
    );
    Ok(())
}
