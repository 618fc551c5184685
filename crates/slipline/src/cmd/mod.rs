use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{ArgGroup, Args, Subcommand, ValueEnum};
use slipline_frame::EscapePolicy;
use slipline_link::{CloseHandle, Link, LinkConfig};
use slipline_transport::{Endpoint, SlipStream, UnixDomainSocket};

use crate::exit::{link_error, transport_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod echo;
pub mod encode;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one frame over a link.
    Send(SendArgs),
    /// Print frames received on a link.
    Listen(ListenArgs),
    /// Send every received frame back to the peer.
    Echo(EchoArgs),
    /// Frame stdin and write the wire bytes to stdout.
    Encode(EncodeArgs),
    /// Decode a SLIP byte stream from stdin.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat, config: Option<&Path>) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format, load_config(config)?),
        Command::Listen(args) => listen::run(args, format, load_config(config)?),
        Command::Echo(args) => echo::run(args, load_config(config)?),
        Command::Encode(args) => encode::run(args),
        Command::Decode(args) => decode::run(args, format, load_config(config)?),
        Command::Version(args) => version::run(args),
    }
}

fn load_config(path: Option<&Path>) -> CliResult<LinkConfig> {
    match path {
        Some(path) => LinkConfig::from_file(path).map_err(|err| link_error("config", err)),
        None => Ok(LinkConfig::default()),
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum EscapePolicyArg {
    Skip,
    PassThrough,
    DiscardFrame,
}

impl From<EscapePolicyArg> for EscapePolicy {
    fn from(arg: EscapePolicyArg) -> Self {
        match arg {
            EscapePolicyArg::Skip => EscapePolicy::Skip,
            EscapePolicyArg::PassThrough => EscapePolicy::PassThrough,
            EscapePolicyArg::DiscardFrame => EscapePolicy::DiscardFrame,
        }
    }
}

/// Receive-side settings shared by every command that decodes.
#[derive(Args, Debug, Default)]
pub struct DecodeOptions {
    /// Receive buffer capacity in bytes (largest frame accepted).
    #[arg(long, env = "SLIPLINE_RX_CAPACITY")]
    pub rx_capacity: Option<usize>,
    /// Treatment of an escape byte followed by an invalid code.
    #[arg(long, value_enum)]
    pub escape_policy: Option<EscapePolicyArg>,
}

impl DecodeOptions {
    fn apply(&self, config: &mut LinkConfig) {
        if let Some(capacity) = self.rx_capacity {
            config.rx_capacity = capacity;
        }
        if let Some(policy) = self.escape_policy {
            config.escape_policy = policy.into();
        }
    }
}

#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Endpoint: serial:/dev/ttyUSB0, unix:/tmp/slip.sock, or a bare path.
    pub endpoint: String,
    /// Serial baud rate.
    #[arg(long, env = "SLIPLINE_BAUD")]
    pub baud: Option<u32>,
    #[command(flatten)]
    pub decode: DecodeOptions,
}

impl LinkArgs {
    /// Layer flags over the config file values.
    pub fn link_config(&self, mut config: LinkConfig) -> CliResult<LinkConfig> {
        let endpoint: Endpoint = self
            .endpoint
            .parse()
            .map_err(|err| transport_error("invalid endpoint", err))?;
        config.endpoint = Some(endpoint);
        if let Some(baud) = self.baud {
            config.baud = baud;
        }
        self.decode.apply(&mut config);
        config
            .validate()
            .map_err(|err| link_error("invalid configuration", err))?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("payload").required(true).args(["data", "hex", "file"])))]
pub struct SendArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Raw string payload.
    #[arg(long)]
    pub data: Option<String>,
    /// Hex-encoded payload.
    #[arg(long)]
    pub hex: Option<String>,
    /// Read payload from file.
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Wait for one response frame and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for response when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Bind the (unix socket) endpoint and accept connections instead of connecting.
    #[arg(long)]
    pub bind: bool,
    /// Exit after receiving N frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Bind the (unix socket) endpoint and accept connections instead of connecting.
    #[arg(long)]
    pub bind: bool,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Write hex text instead of raw bytes.
    #[arg(long)]
    pub hex: bool,
    /// Encode each input line as its own frame.
    #[arg(long)]
    pub lines: bool,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Input is hex text (whitespace ignored) instead of raw bytes.
    #[arg(long)]
    pub hex: bool,
    /// Print decoder counters after the last frame.
    #[arg(long)]
    pub stats: bool,
    #[command(flatten)]
    pub decode: DecodeOptions,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Bind the configured endpoint as a listening Unix socket.
pub(crate) fn bind_endpoint(config: &LinkConfig) -> CliResult<UnixDomainSocket> {
    let endpoint = config
        .endpoint()
        .map_err(|err| link_error("invalid configuration", err))?;
    let Endpoint::Unix { path } = &endpoint else {
        return Err(CliError::new(
            USAGE,
            format!("--bind requires a unix socket endpoint, got {endpoint}"),
        ));
    };
    UnixDomainSocket::bind(path).map_err(|err| transport_error("bind failed", err))
}

/// Accept one connection and wrap it in an open link.
pub(crate) fn accept_link(
    listener: &UnixDomainSocket,
    config: &LinkConfig,
    close: &CloseHandle,
) -> CliResult<Link> {
    let stream = listener
        .accept()
        .map_err(|err| transport_error("accept failed", err))?;
    let mut reader = stream
        .try_clone()
        .map_err(|err| transport_error("accept failed", err))?;
    let mut writer = stream;
    reader
        .set_read_timeout(Some(config.read_timeout()))
        .map_err(|err| transport_error("accept failed", err))?;
    writer
        .set_write_timeout(config.write_timeout())
        .map_err(|err| transport_error("accept failed", err))?;

    let link: Link<SlipStream, SlipStream> = Link::attach(reader, writer, config.clone())
        .map_err(|err| link_error("accept failed", err))?;
    Ok(link.with_close_handle(close.clone()))
}

/// Close `handle` on Ctrl-C; a second Ctrl-C exits immediately.
pub(crate) fn install_ctrlc_handler(handle: CloseHandle) -> CliResult<()> {
    ctrlc::set_handler(move || {
        if handle.is_closed() {
            std::process::exit(130);
        }
        handle.close();
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
