//! Parsed UCI commands.

/// Parameters of the `go` command. Times are milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoParams {
    pub wtime: Option<u64>,
    pub btime: Option<u64>,
    pub winc: Option<u64>,
    pub binc: Option<u64>,
    pub moves_to_go: Option<u32>,
    pub depth: Option<i32>,
    pub nodes: Option<u64>,
    pub movetime: Option<u64>,
    pub infinite: bool,
    pub ponder: bool,
    /// Coordinate strings; resolved against the current position later.
    pub search_moves: Vec<String>,
}

/// A line received from the GUI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciCommand {
    Uci,
    IsReady,
    UciNewGame,
    Position {
        startpos: bool,
        fen: Option<String>,
        moves: Vec<String>,
    },
    SetOption {
        name: String,
        value: Option<String>,
    },
    Go(GoParams),
    Stop,
    PonderHit,
    Quit,
}
