use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "maphack")]
#[command(about = "Map-hack directive interpreter CLI")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Mode,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Mode {
    /// Loads a map in the sandbox world, runs its maphack and prints a report.
    Run(RunArgs),
    /// Checks maphack scripts without running them.
    Check(CheckArgs),
}

#[derive(Debug, Args)]
pub(crate) struct RunArgs {
    #[arg(long = "game-dir")]
    pub(crate) game_dir: String,
    #[arg(long = "map")]
    pub(crate) map: String,
    /// Entity lump file; defaults to `maps/<map>.ent` under the game dir.
    #[arg(long = "entities")]
    pub(crate) entities: Option<String>,
    /// JSON file with the interpreter configuration.
    #[arg(long = "config")]
    pub(crate) config: Option<String>,
    #[arg(long = "script")]
    pub(crate) script: Option<String>,
    #[arg(long = "ticks", default_value_t = 0)]
    pub(crate) ticks: usize,
    #[arg(long = "interval", default_value_t = 0.1)]
    pub(crate) interval: f32,
    #[arg(long = "seed")]
    pub(crate) seed: Option<u64>,
    /// Sound names the sandbox should know about.
    #[arg(long = "sound")]
    pub(crate) sounds: Vec<String>,
    /// `target:output` pairs fired after the level loads.
    #[arg(long = "fire")]
    pub(crate) fire: Vec<String>,
    #[arg(long = "game-event")]
    pub(crate) game_events: Vec<String>,
    /// Console lines run after the level loads, in order.
    #[arg(long = "command")]
    pub(crate) commands: Vec<String>,
    #[arg(long = "allow-server-command")]
    pub(crate) allow_server_command: bool,
    #[arg(long = "debug")]
    pub(crate) debug: bool,
}

#[derive(Debug, Args)]
pub(crate) struct CheckArgs {
    /// A script file or a directory scanned for `.txt` scripts.
    #[arg(long = "path")]
    pub(crate) path: String,
}
