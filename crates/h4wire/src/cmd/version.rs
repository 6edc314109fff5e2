use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("h4wire {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: h4wire");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "build_target: {}",
        option_env!("H4WIRE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "features: session={}, cli=true",
        cfg!(feature = "session")
    );
    println!("max_packet_size: {}", h4wire_frame::MAX_PACKET_SIZE);

    Ok(SUCCESS)
}
