//! Optional plain-text search log, controlled by the `Use Search Log` and
//! `Search Log Filename` options. Append-only.

use std::fs::OpenOptions;
use std::io::Write;

use engine_core::search::{InfoEvent, SearchLimits};

pub struct SearchLog {
    pub enabled: bool,
    pub filename: String,
}

impl Default for SearchLog {
    fn default() -> SearchLog {
        SearchLog {
            enabled: false,
            filename: "SearchLog.txt".to_string(),
        }
    }
}

impl SearchLog {
    fn append(&self, text: &str) {
        if !self.enabled {
            return;
        }
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.filename)
            .and_then(|mut f| writeln!(f, "{text}"));
        if let Err(e) = result {
            log::warn!("search log write failed: {e}");
        }
    }

    pub fn log_search_start(&self, fen: &str, limits: &SearchLimits) {
        self.append(&format!(
            "\nSearching: {fen}\ninfinite: {} ponder: {} time: {} increment: {} moves to go: {}",
            limits.infinite,
            limits.ponder,
            limits.time.unwrap_or(0),
            limits.increment.unwrap_or(0),
            limits.moves_to_go.unwrap_or(0),
        ));
    }

    pub fn log_iteration(&self, event: &InfoEvent) {
        if !self.enabled {
            return;
        }
        if let InfoEvent::Iteration {
            depth,
            score,
            time_ms,
            nodes,
            pv,
            multipv: 1,
            ..
        } = event
        {
            let line: Vec<String> = pv.iter().map(|m| m.to_uci()).collect();
            self.append(&format!(
                "{depth:>2} {:>7} {time_ms:>8}ms {nodes:>10}  {}",
                score.raw(),
                line.join(" ")
            ));
        }
    }

    pub fn log_search_end(&self, nodes: u64, elapsed_ms: u64, best_move: &str) {
        self.append(&format!(
            "Nodes: {nodes}\nNodes/second: {}\nBest move: {best_move}",
            if elapsed_ms > 0 { nodes * 1000 / elapsed_ms } else { 0 }
        ));
    }
}
