//! Dedicated stdin reader thread.
//!
//! Control-plane commands (`stop`, `ponderhit`, `quit`) go to their own
//! channel so a queue of pending `position`/`go` lines can never delay
//! them.

use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;

use crate::uci::{parse_uci_command, UciCommand};

pub fn spawn_stdin_reader(
    cmd_tx: Sender<UciCommand>,
    ctrl_tx: Sender<UciCommand>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let stdin = io::stdin();
        let reader = stdin.lock();

        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    log::error!("stdin read error: {e}");
                    break;
                }
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            log::debug!("received: {line}");

            match parse_uci_command(line) {
                Ok(cmd) => {
                    let is_ctrl = matches!(
                        cmd,
                        UciCommand::Stop | UciCommand::PonderHit | UciCommand::Quit
                    );
                    let target = if is_ctrl { &ctrl_tx } else { &cmd_tx };
                    if target.send(cmd).is_err() {
                        log::debug!("command channel closed, exiting stdin reader");
                        return;
                    }
                }
                Err(e) => {
                    // Malformed input never kills the engine.
                    log::warn!("{e}");
                }
            }
        }

        // EOF: the GUI hung up, shut down gracefully.
        let _ = ctrl_tx.send(UciCommand::Quit);
        log::debug!("stdin reader exiting on EOF");
    })
}
