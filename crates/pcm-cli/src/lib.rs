pub mod cli;
pub mod output;
pub mod scenario;

pub use cli::{Cli, Commands, Overrides};
