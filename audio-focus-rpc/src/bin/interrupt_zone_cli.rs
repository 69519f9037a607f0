//! Interactive zone administration against a running policy server.
//!
//! Usage: `interrupt-zone-cli [server-addr]`

use std::io;
use std::process::ExitCode;

use audio_focus_rpc::{run_zone_repl, ClientConfig, RpcTransport, DEFAULT_SERVER_ADDR};

fn main() -> ExitCode {
    env_logger::init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_SERVER_ADDR.to_string());
    let transport = match RpcTransport::connect(ClientConfig::new(addr)) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("interrupt-zone-cli: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let stdin = io::stdin();
    match run_zone_repl(stdin.lock(), io::stdout(), &transport) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("interrupt-zone-cli: {}", e);
            ExitCode::FAILURE
        }
    }
}
