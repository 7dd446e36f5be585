use clap::Parser;

use tcvt::{Cli, Session, TcvtError};

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        // ChildExecFailed and startup BadWidth are echoed to stdout, the
        // same channel the errpipe protocol this replaces used (§6/§7);
        // everything else (terminfo, raw mode, PTY plumbing) goes to stderr.
        let wants_stdout = err.chain().any(|cause| {
            matches!(
                cause.downcast_ref::<TcvtError>(),
                Some(TcvtError::ChildExecFailed(_)) | Some(TcvtError::BadWidth(_))
            )
        });
        if wants_stdout {
            println!("tcvt: {err:#}");
        } else {
            eprintln!("tcvt: {err:#}");
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut session = Session::spawn(&cli.command, cli.columns)?;
    session.run()
}
