use argh::FromArgs;
use script_launcher::{ScriptRunner, logging};
use std::path::PathBuf;

#[derive(FromArgs)]
/// Run a launcher control script, then hand off to the entry point it names.
///
/// A script path starting with `-` must follow `--`.
struct Args {
    #[argh(positional)]
    /// path to the control script. It is deleted before the entry point runs.
    script: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();
    logging::init();

    let outcome = ScriptRunner::default().run(&args.script)?;
    std::process::exit(outcome.code())
}
