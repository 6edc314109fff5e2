use h4wire_frame::{BufferedReader, Direction, FrameParser};
use h4wire_transport::IoSource;
use tracing::{info, warn};

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_packet, OutputFormat};

pub async fn run(args: DecodeArgs, format: OutputFormat, direction: Direction) -> CliResult<i32> {
    if args.chunk_size == 0 {
        return Err(CliError::new(USAGE, "--chunk-size must be greater than zero"));
    }

    let file = tokio::fs::File::open(&args.path)
        .await
        .map_err(|err| io_error(&format!("failed opening {}", args.path.display()), err))?;
    let source = IoSource::with_chunk_size(file, args.chunk_size);
    let mut reader = BufferedReader::new(source);
    let mut parser = FrameParser::new().with_direction(direction);
    let label = args.path.display().to_string();

    let mut printed = 0u64;
    while args.count.is_none_or(|count| printed < count) {
        let packet = match parser.next_packet(&mut reader).await {
            Ok(Some(packet)) => packet,
            Ok(None) => break,
            Err(err) => return Err(frame_error("decode failed", err)),
        };
        print_packet(&packet, &label, printed, format);
        printed += 1;
    }

    let stats = parser.stats();
    if stats.skipped_bytes > 0 {
        warn!(
            skipped = stats.skipped_bytes,
            "capture contained bytes that start no valid packet"
        );
    }
    info!(packets = stats.packets, path = %label, "decode finished");

    Ok(SUCCESS)
}
