//! UCI protocol: commands, parsing and output formatting.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::{GoParams, UciCommand};
pub use output::{
    info_to_uci, option_lines, score_to_uci, send_info_string, send_response, UciResponse,
};
pub use parser::parse_uci_command;
