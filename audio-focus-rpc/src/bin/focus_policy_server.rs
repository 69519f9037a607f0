//! Standalone focus policy service.
//!
//! Usage: `focus-policy-server [bind-addr] [policy.json]`

use std::path::PathBuf;
use std::process::ExitCode;

use audio_focus_rpc::{PolicyServer, ServerConfig};

fn main() -> ExitCode {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let config = ServerConfig {
        bind_addr: args.next(),
        policy_file: args.next().map(PathBuf::from),
        ..Default::default()
    };

    let server = match PolicyServer::from_config(&config) {
        Ok(server) => server,
        Err(e) => {
            log::error!("failed to start policy server: {}", e);
            eprintln!("focus-policy-server: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match server.serve() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("policy server exited: {}", e);
            ExitCode::FAILURE
        }
    }
}
