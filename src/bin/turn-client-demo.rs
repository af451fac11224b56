use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use log::info;

use turn_client::{create, BaseTransport, Dialect as RelayDialect, Endpoint};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DialectArg {
    Draft9,
    Msn,
    Google,
}

impl From<DialectArg> for RelayDialect {
    fn from(value: DialectArg) -> Self {
        match value {
            DialectArg::Draft9 => RelayDialect::Draft9,
            DialectArg::Msn => RelayDialect::Msn,
            DialectArg::Google => RelayDialect::Google,
        }
    }
}

/// Minimal interactive exercise of the TURN relay shim: binds a local UDP
/// socket, sets a peer binding through the chosen dialect, sends one
/// message, and prints whatever comes back.
#[derive(Parser)]
#[command(
    about = env!("CARGO_PKG_DESCRIPTION"),
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// TURN server address, e.g. 203.0.113.10:3478
    #[arg(long)]
    server: SocketAddr,

    /// Peer address to relay to.
    #[arg(long)]
    peer: SocketAddr,

    /// Wire dialect to speak with the server.
    #[arg(long, value_enum, default_value_t = DialectArg::Draft9)]
    dialect: DialectArg,

    /// Username; base64 for --dialect msn.
    #[arg(long, default_value = "")]
    username: String,

    /// Password; ignored for --dialect google, base64 for --dialect msn.
    #[arg(long, default_value = "")]
    password: String,

    /// Payload to send to the peer once bound.
    #[arg(long, default_value = "hello from turn-client-demo")]
    message: String,
}

fn main() -> anyhow::Result<()> {
    simple_logger::init_with_level(log::Level::Info)?;
    let cli = Cli::parse();

    let base = BaseTransport::bind(None).context("binding local UDP socket")?;
    info!("bound local socket at {}", base.local_addr()?);

    let server = Endpoint::new(cli.server);
    let peer = Endpoint::new(cli.peer);

    let mut relay = create(
        base,
        server,
        &cli.username,
        &cli.password,
        cli.dialect.into(),
    )
    .context("constructing relay state")?;

    if !relay.set_peer(peer) {
        anyhow::bail!("set_peer rejected (binding already pending or channels exhausted)");
    }

    // Give the server a moment to answer the binding request before we
    // try to push data through it.
    std::thread::sleep(Duration::from_millis(200));

    let mut from = Endpoint::new(cli.peer);
    let mut scratch = [0u8; 1500];
    let n = relay.recv(&mut from, &mut scratch);
    if n > 0 {
        info!("control message processed ({n} bytes consumed internally or delivered)");
    }

    if !relay.send(&peer, cli.message.as_bytes()) {
        anyhow::bail!("send failed to dispatch");
    }
    info!("sent {} bytes toward {}", cli.message.len(), cli.peer);

    std::thread::sleep(Duration::from_millis(200));
    let n = relay.recv(&mut from, &mut scratch);
    if n > 0 {
        info!(
            "received {} bytes from {}: {:?}",
            n,
            from.copy_to_sockaddr(),
            String::from_utf8_lossy(&scratch[..n as usize])
        );
    } else {
        info!("nothing received yet");
    }

    relay.close();
    Ok(())
}
