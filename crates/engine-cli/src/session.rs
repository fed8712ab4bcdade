//! Engine session: command dispatch, option handling and the search
//! thread lifecycle.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use engine_core::engine::{Engine, EngineOptions};
use engine_core::position::Position;
use engine_core::search::{InfoSink, SearchFlags, SearchLimits};
use engine_core::types::Color;
use engine_core::Board;

use crate::search_log::SearchLog;
use crate::uci::{
    info_to_uci, option_lines, send_info_string, send_response, GoParams, UciCommand, UciResponse,
};

const ENGINE_NAME: &str = "RChess 0.9";
const ENGINE_AUTHOR: &str = "the RChess developers";

/// Searches need room for a hundred plies of recursion.
const SEARCH_STACK_SIZE: usize = 32 * 1024 * 1024;

pub struct Session {
    engine: Arc<Mutex<Engine>>,
    position: Position,
    search_handle: Option<JoinHandle<()>>,
    flags: Arc<SearchFlags>,
    search_log: Arc<Mutex<SearchLog>>,
}

impl Session {
    pub fn new() -> Session {
        let engine = Engine::new(EngineOptions::default());
        let flags = engine.flags();
        Session {
            engine: Arc::new(Mutex::new(engine)),
            position: Position::startpos(),
            search_handle: None,
            flags,
            search_log: Arc::new(Mutex::new(SearchLog::default())),
        }
    }

    /// Handle one command; `false` means quit.
    pub fn handle(&mut self, cmd: UciCommand) -> bool {
        match cmd {
            UciCommand::Uci => {
                send_response(UciResponse::Id {
                    name: ENGINE_NAME.to_string(),
                    author: ENGINE_AUTHOR.to_string(),
                });
                for opt in option_lines() {
                    send_response(UciResponse::Option(opt));
                }
                send_response(UciResponse::UciOk);
            }
            UciCommand::IsReady => send_response(UciResponse::ReadyOk),
            UciCommand::UciNewGame => {
                self.wait_for_search_end();
                self.engine.lock().unwrap().new_game();
            }
            UciCommand::Position {
                startpos,
                fen,
                moves,
            } => {
                self.wait_for_search_end();
                self.set_position(startpos, fen.as_deref(), &moves);
            }
            UciCommand::SetOption { name, value } => {
                self.wait_for_search_end();
                self.set_option(&name, value.as_deref());
            }
            UciCommand::Go(params) => {
                self.wait_for_search_end();
                self.go(params);
            }
            UciCommand::Stop => self.stop(),
            UciCommand::PonderHit => self.flags.ponderhit(),
            UciCommand::Quit => {
                self.stop();
                self.wait_for_search_end();
                return false;
            }
        }
        true
    }

    /// User stop: clear the ponder state first so a pending internal
    /// stop-on-ponderhit cannot swallow it, then stop.
    pub fn stop(&self) {
        self.flags.ponder.store(false, std::sync::atomic::Ordering::SeqCst);
        self.flags.request_stop();
    }

    fn wait_for_search_end(&mut self) {
        if let Some(handle) = self.search_handle.take() {
            let _ = handle.join();
        }
    }

    fn set_position(&mut self, startpos: bool, fen: Option<&str>, moves: &[String]) {
        let board = if startpos {
            Board::starting_position()
        } else {
            match fen.map(str::parse) {
                Some(Ok(board)) => board,
                Some(Err(e)) => {
                    log::warn!("rejected position: {e}");
                    return;
                }
                None => return,
            }
        };

        let mut position = Position::new(board);
        for uci in moves {
            match position.move_from_uci(uci) {
                Some(mv) => position.do_move(mv),
                None => {
                    log::warn!("illegal move in position command: {uci}");
                    break;
                }
            }
        }
        self.position = position;
    }

    fn set_option(&mut self, name: &str, value: Option<&str>) {
        let mut engine = self.engine.lock().unwrap();

        let int = |v: Option<&str>| v.and_then(|s| s.parse::<i64>().ok());
        let boolean = |v: Option<&str>| v.map(|s| s.eq_ignore_ascii_case("true"));

        match name {
            "Hash" => {
                if let Some(mb) = int(value) {
                    engine.set_hash_mb(mb.clamp(1, 16384) as usize);
                }
            }
            "Clear Hash" => engine.clear_hash(),
            "MultiPV" => {
                if let Some(n) = int(value) {
                    engine.set_multi_pv(n.clamp(1, 64) as usize);
                }
            }
            "Skill Level" => {
                if let Some(level) = int(value) {
                    engine.set_skill_level(level as i32);
                }
            }
            "Threads" => {
                if let Some(n) = int(value) {
                    engine.set_threads(n.clamp(1, 64) as usize);
                }
            }
            "Min Split Depth" => {
                if let Some(d) = int(value) {
                    engine.set_min_split_depth(d as i32);
                }
            }
            "Use Sleeping Threads" => {
                if let Some(b) = boolean(value) {
                    engine.set_use_sleeping_threads(b);
                }
            }
            "Ponder" => {
                // Pondering is driven per-`go`; the option only advertises
                // the capability.
            }
            "Use Search Log" => {
                if let Some(b) = boolean(value) {
                    self.search_log.lock().unwrap().enabled = b;
                }
            }
            "Search Log Filename" => {
                if let Some(v) = value {
                    self.search_log.lock().unwrap().filename = v.to_string();
                }
            }
            "OwnBook" | "Book File" | "Best Book Move" => {
                log::info!("no opening book in this build; ignoring option {name}");
            }
            "UCI_Chess960" => {
                log::info!("Chess960 notation not supported; ignoring option {name}");
            }
            other => send_info_string(format!("No such option: {other}")),
        }
    }

    fn go(&mut self, params: GoParams) {
        let limits = self.build_limits(&params);
        let engine = Arc::clone(&self.engine);
        let flags = Arc::clone(&self.flags);
        let search_log = Arc::clone(&self.search_log);
        let mut position = self.position.clone();
        let wait_ponder = params.ponder;
        let wait_infinite = params.infinite;

        let handle = std::thread::Builder::new()
            .name("search-0".to_string())
            .stack_size(SEARCH_STACK_SIZE)
            .spawn(move || {
                let engine = engine.lock().unwrap();
                search_log
                    .lock()
                    .unwrap()
                    .log_search_start(&position.board().to_fen(), &limits);

                let info_log = Arc::clone(&search_log);
                let total_nodes = Arc::new(std::sync::atomic::AtomicU64::new(0));
                let sink_nodes = Arc::clone(&total_nodes);
                let sink: InfoSink = Arc::new(move |event| {
                    if let engine_core::search::InfoEvent::Iteration { nodes, .. } = &event {
                        sink_nodes.store(*nodes, std::sync::atomic::Ordering::Relaxed);
                    }
                    info_log.lock().unwrap().log_iteration(&event);
                    send_response(UciResponse::Info(info_to_uci(&event)));
                });

                let start = std::time::Instant::now();
                let result = engine.search(&mut position, limits, sink);

                // While pondering or in an infinite search the best move
                // is withheld until the GUI releases us.
                if !flags.stop_requested() && (wait_ponder || wait_infinite) {
                    loop {
                        if flags.stop_requested() {
                            break;
                        }
                        if wait_ponder
                            && !flags.ponder.load(std::sync::atomic::Ordering::SeqCst)
                        {
                            break;
                        }
                        std::thread::sleep(Duration::from_millis(2));
                    }
                }

                let best = if result.best_move.is_some() {
                    result.best_move.to_uci()
                } else {
                    "(none)".to_string()
                };
                search_log.lock().unwrap().log_search_end(
                    total_nodes.load(std::sync::atomic::Ordering::Relaxed),
                    start.elapsed().as_millis() as u64,
                    &best,
                );

                send_response(UciResponse::BestMove {
                    best_move: result.best_move,
                    ponder: Some(result.ponder_move).filter(|m| m.is_some()),
                });
            })
            .expect("failed to spawn search thread");

        self.search_handle = Some(handle);
    }

    fn build_limits(&self, params: &GoParams) -> SearchLimits {
        let us = self.position.side_to_move();
        let (time, increment) = match us {
            Color::White => (params.wtime, params.winc),
            Color::Black => (params.btime, params.binc),
        };

        let search_moves = params
            .search_moves
            .iter()
            .filter_map(|s| self.position.move_from_uci(s))
            .collect();

        SearchLimits {
            time,
            increment,
            moves_to_go: params.moves_to_go,
            max_depth: params.depth,
            max_nodes: params.nodes,
            max_time: params.movetime,
            infinite: params.infinite,
            ponder: params.ponder,
            search_moves,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
