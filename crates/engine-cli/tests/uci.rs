//! End-to-end UCI protocol tests against the real binary.

use std::io::Write;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use assert_cmd::cargo::CommandCargoExt;
use predicates::prelude::*;
use predicates::str::contains;

struct EngineProcess {
    child: Child,
    stdout: std::io::BufReader<std::process::ChildStdout>,
}

impl EngineProcess {
    fn spawn() -> EngineProcess {
        let mut child = Command::cargo_bin("rchess")
            .expect("binary builds")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("engine starts");
        let stdout = std::io::BufReader::new(child.stdout.take().unwrap());
        EngineProcess { child, stdout }
    }

    fn send(&mut self, line: &str) {
        let stdin = self.child.stdin.as_mut().unwrap();
        writeln!(stdin, "{line}").unwrap();
        stdin.flush().unwrap();
    }

    /// Read lines until one starts with `prefix`, with a timeout guard.
    fn read_until(&mut self, prefix: &str, timeout: Duration) -> Vec<String> {
        use std::io::BufRead;
        let deadline = Instant::now() + timeout;
        let mut lines = Vec::new();
        let mut buf = String::new();
        loop {
            assert!(Instant::now() < deadline, "timed out waiting for '{prefix}', got {lines:?}");
            buf.clear();
            let n = self.stdout.read_line(&mut buf).unwrap();
            assert!(n > 0, "engine closed stdout waiting for '{prefix}', got {lines:?}");
            let line = buf.trim_end().to_string();
            let done = line.starts_with(prefix);
            lines.push(line);
            if done {
                return lines;
            }
        }
    }

    fn quit(mut self) {
        self.send("quit");
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            match self.child.try_wait().unwrap() {
                Some(_) => break,
                None if Instant::now() > deadline => {
                    self.child.kill().unwrap();
                    panic!("engine did not exit on quit");
                }
                None => std::thread::sleep(Duration::from_millis(10)),
            }
        }
    }
}

#[test]
fn handshake_reports_id_and_options() {
    let mut engine = EngineProcess::spawn();
    engine.send("uci");
    let lines = engine.read_until("uciok", Duration::from_secs(10));
    let all = lines.join("\n");

    assert!(contains("id name").eval(&all));
    assert!(contains("id author").eval(&all));
    assert!(contains("option name Hash type spin").eval(&all));
    assert!(contains("option name MultiPV type spin").eval(&all));
    assert!(contains("option name Skill Level type spin").eval(&all));
    assert!(contains("option name Threads type spin").eval(&all));
    assert!(contains("option name Min Split Depth type spin").eval(&all));

    engine.send("isready");
    engine.read_until("readyok", Duration::from_secs(10));
    engine.quit();
}

#[test]
fn finds_mate_in_one() {
    let mut engine = EngineProcess::spawn();
    engine.send("uci");
    engine.read_until("uciok", Duration::from_secs(10));
    engine.send("position fen 6k1/5ppp/8/8/8/8/5PPP/R5K1 w - -");
    engine.send("go depth 3");
    let lines = engine.read_until("bestmove", Duration::from_secs(30));

    let best = lines.last().unwrap();
    assert_eq!(best.split_whitespace().nth(1), Some("a1a8"));
    let all = lines.join("\n");
    assert!(contains("score mate 1").eval(&all), "missing mate score in: {all}");
    engine.quit();
}

#[test]
fn stalemate_returns_none() {
    let mut engine = EngineProcess::spawn();
    engine.send("uci");
    engine.read_until("uciok", Duration::from_secs(10));
    engine.send("position fen 7k/5Q2/6K1/8/8/8/8/8 b - -");
    engine.send("go depth 1");
    let lines = engine.read_until("bestmove", Duration::from_secs(10));

    assert_eq!(lines.last().unwrap(), "bestmove (none)");
    let all = lines.join("\n");
    assert!(contains("score cp 0").eval(&all), "missing draw score in: {all}");
    engine.quit();
}

#[test]
fn stop_during_infinite_search_produces_bestmove() {
    let mut engine = EngineProcess::spawn();
    engine.send("uci");
    engine.read_until("uciok", Duration::from_secs(10));
    engine.send("position startpos");
    engine.send("go infinite");
    std::thread::sleep(Duration::from_millis(300));
    engine.send("stop");
    let lines = engine.read_until("bestmove", Duration::from_secs(10));
    assert!(lines.last().unwrap().starts_with("bestmove "));
    engine.quit();
}

#[test]
fn go_movetime_terminates() {
    let mut engine = EngineProcess::spawn();
    engine.send("uci");
    engine.read_until("uciok", Duration::from_secs(10));
    engine.send("position startpos moves e2e4 e7e5");
    engine.send("go movetime 200");
    let lines = engine.read_until("bestmove", Duration::from_secs(15));
    assert!(lines.last().unwrap().starts_with("bestmove "));
    engine.quit();
}

#[test]
fn multipv_reports_multiple_lines() {
    let mut engine = EngineProcess::spawn();
    engine.send("uci");
    engine.read_until("uciok", Duration::from_secs(10));
    engine.send("setoption name MultiPV value 3");
    engine.send("position startpos");
    engine.send("go depth 5");
    let lines = engine.read_until("bestmove", Duration::from_secs(30));
    let all = lines.join("\n");
    assert!(contains("multipv 1").eval(&all));
    assert!(contains("multipv 2").eval(&all));
    assert!(contains("multipv 3").eval(&all));
    engine.quit();
}

#[test]
fn unknown_command_is_tolerated() {
    let mut engine = EngineProcess::spawn();
    engine.send("banana split");
    engine.send("uci");
    engine.read_until("uciok", Duration::from_secs(10));
    engine.quit();
}

#[test]
fn searchmoves_restricts_root() {
    let mut engine = EngineProcess::spawn();
    engine.send("uci");
    engine.read_until("uciok", Duration::from_secs(10));
    engine.send("position startpos");
    engine.send("go depth 4 searchmoves a2a3");
    let lines = engine.read_until("bestmove", Duration::from_secs(20));
    assert_eq!(lines.last().unwrap().split_whitespace().nth(1), Some("a2a3"));
    engine.quit();
}

#[test]
fn threads_option_still_finds_mate() {
    let mut engine = EngineProcess::spawn();
    engine.send("uci");
    engine.read_until("uciok", Duration::from_secs(10));
    engine.send("setoption name Threads value 2");
    engine.send("setoption name Min Split Depth value 4");
    engine.send("position fen 6k1/5ppp/8/8/8/8/5PPP/R5K1 w - -");
    engine.send("go depth 6");
    let lines = engine.read_until("bestmove", Duration::from_secs(30));
    assert_eq!(lines.last().unwrap().split_whitespace().nth(1), Some("a1a8"));
    engine.quit();
}
