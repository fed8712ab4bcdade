//! UCI adapter binary.

mod flushing_logger;
mod search_log;
mod session;
mod stdin_reader;
mod uci;

use anyhow::Result;
use clap::Parser;
use crossbeam_channel::{select, unbounded};

use flushing_logger::FlushingStderrWriter;
use session::Session;
use stdin_reader::spawn_stdin_reader;

#[derive(Parser, Debug)]
#[command(author, version, about = "UCI chess engine", long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .target(env_logger::Target::Pipe(Box::new(FlushingStderrWriter::new())))
        .init();

    log::info!("engine starting");

    let (cmd_tx, cmd_rx) = unbounded();
    let (ctrl_tx, ctrl_rx) = unbounded();
    // The reader thread lives until stdin closes; exiting main reaps it.
    let _reader = spawn_stdin_reader(cmd_tx, ctrl_tx);

    let mut session = Session::new();

    loop {
        // Control commands preempt queued work.
        let cmd = select! {
            recv(ctrl_rx) -> cmd => cmd,
            recv(cmd_rx) -> cmd => cmd,
        };

        let Ok(cmd) = cmd else {
            break;
        };

        if !session.handle(cmd) {
            break;
        }
    }

    drop(session);
    log::info!("engine exiting");
    Ok(())
}
