use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use h4wire_frame::{Direction, PacketType};

use crate::exit::{io_error, CliResult};
#[cfg(not(unix))]
use crate::exit::{CliError, USAGE};
use crate::output::OutputFormat;

pub mod decode;
#[cfg(unix)]
pub mod listen;
#[cfg(unix)]
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Frame a capture of raw H4 bytes and print its packets.
    Decode(DecodeArgs),
    /// Accept one link on a Unix socket and print received packets.
    Listen(ListenArgs),
    /// Send a single packet over a Unix socket link.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat, direction: Direction) -> CliResult<i32> {
    match command {
        Command::Decode(args) => block_on(decode::run(args, format, direction)),
        #[cfg(unix)]
        Command::Listen(args) => block_on(listen::run(args, format, direction)),
        #[cfg(unix)]
        Command::Send(args) => block_on(send::run(args)),
        #[cfg(not(unix))]
        Command::Listen(_) | Command::Send(_) => Err(CliError::new(
            USAGE,
            "unix socket links are not available on this platform",
        )),
        Command::Version(args) => version::run(args),
    }
}

fn block_on<F>(future: F) -> CliResult<i32>
where
    F: std::future::Future<Output = CliResult<i32>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime setup failed", err))?;
    runtime.block_on(future)
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum DirectionArg {
    /// Controller output: events, ACL, SCO, ISO.
    ControllerToHost,
    /// Host output: commands, ACL, SCO, ISO.
    HostToController,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::ControllerToHost => Direction::ControllerToHost,
            DirectionArg::HostToController => Direction::HostToController,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum PacketTypeArg {
    Command,
    Acl,
    Sco,
    Event,
    Iso,
}

impl From<PacketTypeArg> for PacketType {
    fn from(arg: PacketTypeArg) -> Self {
        match arg {
            PacketTypeArg::Command => PacketType::Command,
            PacketTypeArg::Acl => PacketType::Acl,
            PacketTypeArg::Sco => PacketType::Sco,
            PacketTypeArg::Event => PacketType::Event,
            PacketTypeArg::Iso => PacketType::Iso,
        }
    }
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Capture file holding raw H4 bytes.
    pub path: PathBuf,
    /// Bytes per read, to reproduce a transport's chunking.
    #[arg(long, default_value = "1024")]
    pub chunk_size: usize,
    /// Stop after N packets.
    #[arg(long)]
    pub count: Option<u64>,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Exit after receiving N packets.
    #[arg(long)]
    pub count: Option<u64>,
    /// Packet buffer capacity in bytes.
    #[arg(long, default_value_t = h4wire_frame::MAX_PACKET_SIZE)]
    pub buffer_capacity: usize,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Packet type.
    #[arg(long = "type", value_name = "TYPE")]
    pub packet_type: PacketTypeArg,
    /// Header tail and payload as hex (e.g. "03 0c 00").
    #[arg(long, default_value = "")]
    pub hex: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
