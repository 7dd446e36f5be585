pub mod attrs;
pub mod canvas;
pub mod cli;
pub mod error;
pub mod grid;
pub mod keymap;
pub mod parser;
pub mod session;

pub use cli::Cli;
pub use error::TcvtError;
pub use session::Session;
