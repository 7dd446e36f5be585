//! Command-line surface (§6): `tcvt [-c N] -- cmd [args...]`.

use clap::Parser;

/// Run a program under a logical N-column virtual terminal.
#[derive(Debug, Parser)]
#[command(name = "tcvt", version, about)]
pub struct Cli {
    /// Number of side-by-side columns to stack the logical screen into.
    #[arg(short = 'c', long = "columns", default_value_t = 2)]
    pub columns: usize,

    /// Command to run, and its arguments. Defaults to $SHELL when empty.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_columns_flag_and_trailing_command() {
        let cli = Cli::parse_from(["tcvt", "-c", "3", "--", "vim", "-R", "file.txt"]);
        assert_eq!(cli.columns, 3);
        assert_eq!(cli.command, vec!["vim", "-R", "file.txt"]);
    }

    #[test]
    fn defaults_to_two_columns_with_no_command() {
        let cli = Cli::parse_from(["tcvt"]);
        assert_eq!(cli.columns, 2);
        assert!(cli.command.is_empty());
    }
}
