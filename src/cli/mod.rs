//! Terminal surface: slash-command parsing, output rendering, and the
//! interactive REPL that drives the dispatcher.

mod command;
mod render;
mod repl;

pub use command::{Command, HistoryRequest, Input, parse_line};
pub use render::TerminalRenderer;
pub use repl::{Repl, login};
