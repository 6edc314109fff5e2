use h4wire_frame::{OwnedPacket, PacketType};
use h4wire_session::{Session, SessionConfig};
use h4wire_transport::{LinkSettings, UnixConnector};
use tracing::info;

use crate::cmd::SendArgs;
use crate::exit::{session_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::parse_hex;

pub async fn run(args: SendArgs) -> CliResult<i32> {
    let packet_type = PacketType::from(args.packet_type);
    let body = resolve_body(packet_type, &args.hex)?;

    let mut session = Session::open(
        UnixConnector::new(&args.path),
        LinkSettings::default(),
        h4wire_frame::PacketCollector::new(),
        SessionConfig::default(),
    )
    .await
    .map_err(|err| session_error("connect failed", err))?;

    session
        .send(packet_type, &body)
        .await
        .map_err(|err| session_error("send failed", err))?;
    session
        .close()
        .await
        .map_err(|err| session_error("close failed", err))?;

    info!(%packet_type, len = body.len() + 1, "packet sent");
    Ok(SUCCESS)
}

/// Decode `--hex` and check it frames as a complete packet before connecting.
fn resolve_body(packet_type: PacketType, hex: &str) -> CliResult<Vec<u8>> {
    let body = parse_hex(hex).map_err(|err| CliError::new(USAGE, format!("--hex: {err}")))?;
    OwnedPacket::new(packet_type, &body)
        .map_err(|err| CliError::new(USAGE, format!("--hex: {err}")))?;
    Ok(body)
}
