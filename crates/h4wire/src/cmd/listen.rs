use std::sync::Arc;

use h4wire_frame::{ChannelDispatcher, Direction};
use h4wire_session::{Session, SessionConfig};
use h4wire_transport::{LinkSettings, OnceConnector, UnixDomainSocket};
use tokio::sync::Notify;
use tracing::info;

use crate::cmd::ListenArgs;
use crate::exit::{session_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_packet, OutputFormat};

pub async fn run(args: ListenArgs, format: OutputFormat, direction: Direction) -> CliResult<i32> {
    let interrupt = Arc::new(Notify::new());
    install_ctrlc_handler(interrupt.clone())?;

    let listener = UnixDomainSocket::bind(&args.path)
        .map_err(|err| transport_error("bind failed", err))?;
    info!(path = %args.path.display(), "listening");

    let source = tokio::select! {
        biased;
        _ = interrupt.notified() => return Ok(SUCCESS),
        accepted = listener.accept() => accepted.map_err(|err| transport_error("accept failed", err))?,
    };

    let (dispatcher, mut rx) = ChannelDispatcher::channel();
    let config = SessionConfig {
        buffer_capacity: args.buffer_capacity,
        direction,
    };
    let mut session = Session::open(
        OnceConnector::new(source),
        LinkSettings::default(),
        dispatcher,
        config,
    )
    .await
    .map_err(|err| session_error("session setup failed", err))?;
    let handle = session
        .close_handle()
        .ok_or_else(|| CliError::new(INTERNAL, "session opened without a link"))?;
    let label = session.id().to_string();

    let task = tokio::spawn(async move { session.run().await });

    let mut printed = 0u64;
    loop {
        tokio::select! {
            biased;
            _ = interrupt.notified() => {
                handle.close();
                break;
            }
            packet = rx.recv() => {
                let Some(packet) = packet else { break };
                print_packet(&packet.as_packet(), &label, printed, format);
                printed += 1;
                if args.count.is_some_and(|count| printed >= count) {
                    handle.close();
                    break;
                }
            }
        }
    }

    let outcome = task
        .await
        .map_err(|err| CliError::new(INTERNAL, format!("session task failed: {err}")))?;
    let summary = match outcome {
        Ok(summary) => summary,
        // Closing locally can cut the packet in flight short.
        Err(err) if handle.is_closed() => {
            info!(error = %err, "link closed mid-packet");
            return Ok(SUCCESS);
        }
        Err(err) => return Err(session_error("receive failed", err)),
    };
    info!(
        packets = summary.packets,
        skipped = summary.skipped_bytes,
        end = ?summary.end,
        "link finished"
    );

    Ok(SUCCESS)
}

fn install_ctrlc_handler(interrupt: Arc<Notify>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        interrupt.notify_one();
    })
    .map_err(|err| {
        CliError::new(
            INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
