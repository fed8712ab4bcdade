//! UCI command parser.

use anyhow::{anyhow, Result};
use log::warn;

use super::commands::{GoParams, UciCommand};

/// Parse one line from the GUI.
pub fn parse_uci_command(line: &str) -> Result<UciCommand> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.is_empty() {
        return Err(anyhow!("Empty command"));
    }

    match parts[0] {
        "uci" => Ok(UciCommand::Uci),
        "isready" => Ok(UciCommand::IsReady),
        "ucinewgame" => Ok(UciCommand::UciNewGame),
        "quit" => Ok(UciCommand::Quit),
        "stop" => Ok(UciCommand::Stop),
        "ponderhit" => Ok(UciCommand::PonderHit),

        "setoption" => parse_setoption(&parts[1..]),
        "position" => parse_position(&parts[1..]),
        "go" => parse_go(&parts[1..]),

        other => Err(anyhow!("Unknown command: {other}")),
    }
}

fn parse_setoption(parts: &[&str]) -> Result<UciCommand> {
    // Format: name <name...> [value <value...>]
    if parts.first() != Some(&"name") {
        return Err(anyhow!("Invalid setoption format"));
    }

    let value_pos = parts.iter().position(|&p| p == "value");
    let name = match value_pos {
        Some(pos) => parts[1..pos].join(" "),
        None => parts[1..].join(" "),
    };
    if name.is_empty() {
        return Err(anyhow!("setoption requires a name"));
    }

    let value = value_pos.and_then(|pos| {
        let v = parts[pos + 1..].join(" ");
        if v.is_empty() {
            None
        } else {
            Some(v)
        }
    });

    Ok(UciCommand::SetOption { name, value })
}

fn parse_position(parts: &[&str]) -> Result<UciCommand> {
    if parts.is_empty() {
        return Err(anyhow!("Invalid position format"));
    }

    let (startpos, fen, moves_start) = match parts[0] {
        "startpos" => (true, None, 1),
        "fen" => {
            let moves_pos = parts.iter().position(|&p| p == "moves");
            let fen_end = moves_pos.unwrap_or(parts.len());
            if fen_end <= 1 {
                return Err(anyhow!("Invalid FEN"));
            }
            (false, Some(parts[1..fen_end].join(" ")), fen_end)
        }
        _ => return Err(anyhow!("Position must start with 'startpos' or 'fen'")),
    };

    let moves = if parts.get(moves_start) == Some(&"moves") {
        parts[moves_start + 1..].iter().map(|s| s.to_string()).collect()
    } else {
        Vec::new()
    };

    Ok(UciCommand::Position {
        startpos,
        fen,
        moves,
    })
}

fn parse_go(parts: &[&str]) -> Result<UciCommand> {
    let mut params = GoParams::default();
    let mut i = 0;

    fn value<'a>(parts: &[&'a str], i: &mut usize, key: &str) -> Result<&'a str> {
        *i += 1;
        parts
            .get(*i)
            .copied()
            .ok_or_else(|| anyhow!("go {key} requires a value"))
    }

    while i < parts.len() {
        match parts[i] {
            "ponder" => params.ponder = true,
            "infinite" => params.infinite = true,

            "wtime" => {
                let v = value(parts, &mut i, "wtime")?;
                params.wtime = Some(v.parse().map_err(|_| anyhow!("Invalid wtime value: {v}"))?);
            }
            "btime" => {
                let v = value(parts, &mut i, "btime")?;
                params.btime = Some(v.parse().map_err(|_| anyhow!("Invalid btime value: {v}"))?);
            }
            "winc" => {
                let v = value(parts, &mut i, "winc")?;
                params.winc = Some(v.parse().map_err(|_| anyhow!("Invalid winc value: {v}"))?);
            }
            "binc" => {
                let v = value(parts, &mut i, "binc")?;
                params.binc = Some(v.parse().map_err(|_| anyhow!("Invalid binc value: {v}"))?);
            }
            "movestogo" => {
                let v = value(parts, &mut i, "movestogo")?;
                params.moves_to_go =
                    Some(v.parse().map_err(|_| anyhow!("Invalid movestogo value: {v}"))?);
            }
            "depth" => {
                let v = value(parts, &mut i, "depth")?;
                params.depth = Some(v.parse().map_err(|_| anyhow!("Invalid depth value: {v}"))?);
            }
            "nodes" => {
                let v = value(parts, &mut i, "nodes")?;
                params.nodes = Some(v.parse().map_err(|_| anyhow!("Invalid nodes value: {v}"))?);
            }
            "movetime" => {
                let v = value(parts, &mut i, "movetime")?;
                params.movetime =
                    Some(v.parse().map_err(|_| anyhow!("Invalid movetime value: {v}"))?);
            }
            "searchmoves" => {
                // Everything that looks like a move until the next keyword.
                while let Some(&candidate) = parts.get(i + 1) {
                    if !looks_like_move(candidate) {
                        break;
                    }
                    params.search_moves.push(candidate.to_string());
                    i += 1;
                }
            }
            other => {
                warn!("Unknown go parameter: {other}");
            }
        }
        i += 1;
    }

    Ok(UciCommand::Go(params))
}

fn looks_like_move(s: &str) -> bool {
    let bytes = s.as_bytes();
    (4..=5).contains(&bytes.len())
        && bytes[0].is_ascii_lowercase()
        && bytes[1].is_ascii_digit()
        && bytes[2].is_ascii_lowercase()
        && bytes[3].is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_commands() {
        assert_eq!(parse_uci_command("uci").unwrap(), UciCommand::Uci);
        assert_eq!(parse_uci_command("isready").unwrap(), UciCommand::IsReady);
        assert_eq!(parse_uci_command("ucinewgame").unwrap(), UciCommand::UciNewGame);
        assert_eq!(parse_uci_command("stop").unwrap(), UciCommand::Stop);
        assert_eq!(parse_uci_command("ponderhit").unwrap(), UciCommand::PonderHit);
        assert_eq!(parse_uci_command("quit").unwrap(), UciCommand::Quit);
    }

    #[test]
    fn setoption_variants() {
        match parse_uci_command("setoption name Hash value 128").unwrap() {
            UciCommand::SetOption { name, value } => {
                assert_eq!(name, "Hash");
                assert_eq!(value.as_deref(), Some("128"));
            }
            _ => panic!("expected SetOption"),
        }

        // Multi-word names and button options without values.
        match parse_uci_command("setoption name Clear Hash").unwrap() {
            UciCommand::SetOption { name, value } => {
                assert_eq!(name, "Clear Hash");
                assert_eq!(value, None);
            }
            _ => panic!("expected SetOption"),
        }

        match parse_uci_command("setoption name Search Log Filename value my log.txt").unwrap() {
            UciCommand::SetOption { name, value } => {
                assert_eq!(name, "Search Log Filename");
                assert_eq!(value.as_deref(), Some("my log.txt"));
            }
            _ => panic!("expected SetOption"),
        }
    }

    #[test]
    fn position_variants() {
        match parse_uci_command("position startpos moves e2e4 e7e5").unwrap() {
            UciCommand::Position {
                startpos,
                fen,
                moves,
            } => {
                assert!(startpos);
                assert!(fen.is_none());
                assert_eq!(moves, vec!["e2e4", "e7e5"]);
            }
            _ => panic!("expected Position"),
        }

        match parse_uci_command("position fen 6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1").unwrap() {
            UciCommand::Position { startpos, fen, .. } => {
                assert!(!startpos);
                assert_eq!(fen.as_deref(), Some("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1"));
            }
            _ => panic!("expected Position"),
        }
    }

    #[test]
    fn go_variants() {
        assert_eq!(parse_uci_command("go").unwrap(), UciCommand::Go(GoParams::default()));

        match parse_uci_command("go wtime 60000 btime 50000 winc 1000 binc 1000 movestogo 20")
            .unwrap()
        {
            UciCommand::Go(p) => {
                assert_eq!(p.wtime, Some(60_000));
                assert_eq!(p.btime, Some(50_000));
                assert_eq!(p.winc, Some(1000));
                assert_eq!(p.binc, Some(1000));
                assert_eq!(p.moves_to_go, Some(20));
            }
            _ => panic!("expected Go"),
        }

        match parse_uci_command("go ponder depth 12 nodes 100000 movetime 3000 infinite").unwrap() {
            UciCommand::Go(p) => {
                assert!(p.ponder && p.infinite);
                assert_eq!(p.depth, Some(12));
                assert_eq!(p.nodes, Some(100_000));
                assert_eq!(p.movetime, Some(3000));
            }
            _ => panic!("expected Go"),
        }

        match parse_uci_command("go depth 8 searchmoves e2e4 g1f3").unwrap() {
            UciCommand::Go(p) => {
                assert_eq!(p.search_moves, vec!["e2e4", "g1f3"]);
                assert_eq!(p.depth, Some(8));
            }
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn searchmoves_stops_at_keywords() {
        match parse_uci_command("go searchmoves e2e4 e7e8q depth 5").unwrap() {
            UciCommand::Go(p) => {
                assert_eq!(p.search_moves, vec!["e2e4", "e7e8q"]);
                assert_eq!(p.depth, Some(5));
            }
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn errors() {
        assert!(parse_uci_command("").is_err());
        assert!(parse_uci_command("banana").is_err());
        assert!(parse_uci_command("setoption").is_err());
        assert!(parse_uci_command("position").is_err());
        assert!(parse_uci_command("position e4").is_err());
        assert!(parse_uci_command("go depth").is_err());
        assert!(parse_uci_command("go wtime abc").is_err());
    }
}
