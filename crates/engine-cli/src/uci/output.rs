//! UCI output formatting.

use std::fmt;
use std::io::Write;

use engine_core::search::{InfoEvent, ScoreBound};
use engine_core::types::{Move, Value, MAX_PLY, PAWN_VALUE_MIDGAME};

/// Responses sent to the GUI.
#[derive(Debug, Clone)]
pub enum UciResponse {
    Id { name: String, author: String },
    UciOk,
    ReadyOk,
    BestMove { best_move: Move, ponder: Option<Move> },
    Info(String),
    Option(String),
    String(String),
}

impl fmt::Display for UciResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UciResponse::Id { name, author } => {
                writeln!(f, "id name {name}")?;
                write!(f, "id author {author}")
            }
            UciResponse::UciOk => write!(f, "uciok"),
            UciResponse::ReadyOk => write!(f, "readyok"),
            UciResponse::BestMove { best_move, ponder } => {
                if best_move.is_some() {
                    write!(f, "bestmove {}", best_move.to_uci())?;
                } else {
                    write!(f, "bestmove (none)")?;
                }
                if let Some(p) = ponder {
                    write!(f, " ponder {}", p.to_uci())?;
                }
                Ok(())
            }
            UciResponse::Info(body) => write!(f, "info {body}"),
            UciResponse::Option(opt) => write!(f, "option {opt}"),
            UciResponse::String(msg) => write!(f, "info string {msg}"),
        }
    }
}

/// Write a response to stdout and flush so the GUI never waits on a
/// buffered line.
pub fn send_response(response: UciResponse) {
    let mut stdout = std::io::stdout().lock();
    if writeln!(stdout, "{response}").and_then(|()| stdout.flush()).is_err() {
        // The GUI hung up; there is nobody left to talk to.
        log::error!("stdout closed, exiting");
        std::process::exit(1);
    }
}

pub fn send_info_string(message: impl Into<String>) {
    send_response(UciResponse::String(message.into()));
}

/// `cp <x>` below the mate window, `mate <y>` (moves, not plies) inside
/// it, with a bound marker while an aspiration window is open.
pub fn score_to_uci(v: Value, bound: ScoreBound) -> String {
    let mut s = if v.abs() < Value::MATE - MAX_PLY {
        format!("cp {}", v.raw() * 100 / PAWN_VALUE_MIDGAME.raw())
    } else if v > Value::ZERO {
        format!("mate {}", (Value::MATE - v + 1).raw() / 2)
    } else {
        format!("mate {}", (-Value::MATE - v).raw() / 2)
    };

    match bound {
        ScoreBound::Lower => s.push_str(" lowerbound"),
        ScoreBound::Upper => s.push_str(" upperbound"),
        ScoreBound::Exact => {}
    }
    s
}

/// Render a search progress event as an `info` body.
pub fn info_to_uci(event: &InfoEvent) -> String {
    match event {
        InfoEvent::Iteration {
            depth,
            seldepth,
            multipv,
            score,
            bound,
            nodes,
            nps,
            time_ms,
            pv,
        } => {
            let mut s = format!(
                "depth {depth} seldepth {seldepth} multipv {multipv} score {} nodes {nodes} nps {nps} time {time_ms}",
                score_to_uci(*score, *bound)
            );
            if !pv.is_empty() {
                s.push_str(" pv");
                for mv in pv {
                    s.push(' ');
                    s.push_str(&mv.to_uci());
                }
            }
            s
        }
        InfoEvent::CurrMove { depth, mv, number } => {
            format!("depth {depth} currmove {} currmovenumber {number}", mv.to_uci())
        }
    }
}

/// The option list for the `uci` handshake.
pub fn option_lines() -> Vec<String> {
    vec![
        "name Hash type spin default 32 min 1 max 16384".to_string(),
        "name Clear Hash type button".to_string(),
        "name MultiPV type spin default 1 min 1 max 64".to_string(),
        "name Skill Level type spin default 20 min 0 max 20".to_string(),
        "name Threads type spin default 1 min 1 max 64".to_string(),
        "name Min Split Depth type spin default 4 min 1 max 16".to_string(),
        "name Use Sleeping Threads type check default true".to_string(),
        "name Ponder type check default true".to_string(),
        "name Use Search Log type check default false".to_string(),
        "name Search Log Filename type string default SearchLog.txt".to_string(),
        "name OwnBook type check default false".to_string(),
        "name Book File type string default book.bin".to_string(),
        "name Best Book Move type check default false".to_string(),
        "name UCI_Chess960 type check default false".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_formatting() {
        // One pawn scales to 100 centipawns exactly.
        assert_eq!(score_to_uci(PAWN_VALUE_MIDGAME, ScoreBound::Exact), "cp 100");
        assert_eq!(score_to_uci(Value::ZERO, ScoreBound::Exact), "cp 0");

        assert_eq!(score_to_uci(Value::mate_in(1), ScoreBound::Exact), "mate 1");
        assert_eq!(score_to_uci(Value::mate_in(3), ScoreBound::Exact), "mate 2");
        assert_eq!(score_to_uci(Value::mated_in(2), ScoreBound::Exact), "mate -1");

        assert_eq!(score_to_uci(Value::new(50), ScoreBound::Lower), "cp 25 lowerbound");
        assert_eq!(score_to_uci(Value::new(-50), ScoreBound::Upper), "cp -25 upperbound");
    }

    #[test]
    fn bestmove_formatting() {
        let mv = Move::new(
            engine_core::types::Square::E2,
            engine_core::types::Square::from_algebraic("e4").unwrap(),
        );
        assert_eq!(
            UciResponse::BestMove {
                best_move: mv,
                ponder: None
            }
            .to_string(),
            "bestmove e2e4"
        );
        assert_eq!(
            UciResponse::BestMove {
                best_move: mv,
                ponder: Some(Move::new(
                    engine_core::types::Square::E7,
                    engine_core::types::Square::from_algebraic("e5").unwrap(),
                ))
            }
            .to_string(),
            "bestmove e2e4 ponder e7e5"
        );
        assert_eq!(
            UciResponse::BestMove {
                best_move: Move::NONE,
                ponder: None
            }
            .to_string(),
            "bestmove (none)"
        );
    }

    #[test]
    fn info_line_rendering() {
        let event = InfoEvent::Iteration {
            depth: 8,
            seldepth: 12,
            multipv: 1,
            score: Value::new(34),
            bound: ScoreBound::Exact,
            nodes: 12345,
            nps: 100000,
            time_ms: 123,
            pv: vec![Move::new(
                engine_core::types::Square::E2,
                engine_core::types::Square::from_algebraic("e4").unwrap(),
            )],
        };
        assert_eq!(
            info_to_uci(&event),
            "depth 8 seldepth 12 multipv 1 score cp 17 nodes 12345 nps 100000 time 123 pv e2e4"
        );
    }
}
