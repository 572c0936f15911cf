//! Serve a backend over the in-process transport and drive a demo client.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use srvfs::backend::{DiskBackend, MemBackend};
use srvfs::config::{BackendKind, Config};
use srvfs::ipc::inproc::{pair, SharedArena};
use srvfs::proto::Status;
use srvfs::server::FileServer;
use srvfs::trc;

#[derive(Parser)]
#[command(version, about = "Userspace filesystem server core demo.")]
struct Args {
    /// Optional path to a TOML config file.
    #[arg(short, long, value_parser)]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Mount the configured backend and run one open/read/close round trip.
    Run {
        /// Path to open against the mounted filesystem.
        #[arg(short, long, default_value = "motd")]
        open: String,
    },
}

const CLIENT_PID: u32 = 100;
const CLIENT_REGION: usize = 4096;

fn main() {
    let args = Args::parse();

    let config = Config::load_or_default(args.config_path.as_deref()).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        std::process::exit(1);
    });

    if let Err(e) = trc::init() {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    let open = match args.command.unwrap_or(Command::Run {
        open: "motd".to_owned(),
    }) {
        Command::Run { open } => open,
    };

    let arena = SharedArena::new();
    let (server_end, mut client) = pair(CLIENT_PID, &arena, CLIENT_REGION);

    let mount = config.mount.clone();
    let server = std::thread::spawn(move || serve(&config, server_end, arena));

    info!(mount = %mount, path = %open, "opening");
    match client.open(&open) {
        Ok(reply) if reply.status == Status::Ok => {
            let handle = reply.ident;
            let mut offset = 0u64;
            loop {
                match client.read(handle, 512, offset) {
                    Ok((rep, data)) if rep.status == Status::Ok => {
                        info!(bytes = rep.size, "read: {}", String::from_utf8_lossy(&data));
                        offset += u64::from(rep.size);
                    }
                    Ok((rep, _)) if rep.status == Status::EndOfData => break,
                    Ok((rep, _)) => {
                        warn!(status = ?rep.status, "read failed");
                        break;
                    }
                    Err(e) => {
                        error!("transport failed mid-read: {e}");
                        break;
                    }
                }
            }
            if let Ok(rep) = client.close(handle) {
                info!(status = ?rep.status, "closed");
            }
        }
        Ok(reply) => warn!(status = ?reply.status, path = %open, "open refused"),
        Err(e) => error!("transport failed on open: {e}"),
    }

    // Dropping the client disconnects the transport and stops the server.
    drop(client);
    match server.join() {
        Ok(Ok(())) => info!("server stopped"),
        Ok(Err(e)) => error!("server failed: {e}"),
        Err(_) => error!("server thread panicked"),
    }
}

fn serve(
    config: &Config,
    transport: srvfs::ipc::inproc::ServerEnd,
    arena: SharedArena,
) -> Result<(), srvfs::ServeError> {
    match config.backend {
        BackendKind::Mem => {
            let mut backend = MemBackend::new();
            // The demo file; real deployments populate their own entries.
            if let Err(e) = backend.add("motd", &b"hello from srvfs\n"[..]) {
                warn!("could not register demo file: {e}");
            }
            FileServer::new(config.mount.clone(), backend, transport, arena).run()
        }
        BackendKind::Disk => {
            let backend = DiskBackend::new(config.disk_root.clone());
            FileServer::new(config.mount.clone(), backend, transport, arena).run()
        }
        #[cfg(target_os = "linux")]
        BackendKind::Proc => {
            let backend =
                srvfs::backend::SnapshotBackend::new("proc", srvfs::backend::ProcSnapshot);
            FileServer::new(config.mount.clone(), backend, transport, arena).run()
        }
    }
}
