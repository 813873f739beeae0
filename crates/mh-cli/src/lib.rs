use std::ffi::OsString;
use std::sync::Arc;

use clap::Parser;
use mh_api::{
    check_script, run_level_load, run_ticks, FileScriptSource, LevelLoadOptions, ScriptCheck,
};
use serde::Serialize;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

mod cli_args;
mod cli_error;
mod source_loader;

pub(crate) use cli_args::{CheckArgs, Cli, Mode, RunArgs};
pub(crate) use cli_error::{emit_error, CliError};
pub(crate) use source_loader::{
    load_config, read_check_targets, read_entity_lump, resolve_game_dir,
};
#[cfg(test)]
pub(crate) use source_loader::{resolve_path, EMPTY_LEVEL_LUMP};

const LOG_ENV: &str = "MAPHACK_LOG";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileCheck<'a> {
    path: &'a str,
    #[serde(flatten)]
    check: &'a ScriptCheck,
}

pub fn run_cli_from_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => return error.exit_code(),
    };
    match run(cli) {
        Ok(code) => code,
        Err(error) => emit_error(error),
    }
}

fn run(cli: Cli) -> Result<i32, CliError> {
    match cli.command {
        Mode::Run(args) => run_level(args),
        Mode::Check(args) => run_check(args),
    }
}

/// Log lines go to stderr so stdout stays line-oriented for callers.
fn init_logging(debug: bool) {
    let fallback = if debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub(crate) fn parse_fire_spec(spec: &str) -> Result<(&str, &str), CliError> {
    match spec.split_once(':') {
        Some((target, output)) if !target.is_empty() && !output.is_empty() => {
            Ok((target, output))
        }
        _ => Err(CliError::FireInvalid(spec.to_string())),
    }
}

fn run_level(args: RunArgs) -> Result<i32, CliError> {
    let mut config = load_config(args.config.as_deref())?;
    config.debug |= args.debug;
    config.allow_server_command |= args.allow_server_command;
    if let Some(script) = args.script {
        config.filename = Some(script);
    }
    init_logging(config.debug);

    let fires = args
        .fire
        .iter()
        .map(|spec| parse_fire_spec(spec))
        .collect::<Result<Vec<_>, _>>()?;

    let game_dir = resolve_game_dir(&args.game_dir)?;
    let entity_lump = read_entity_lump(&game_dir, &args.map, args.entities.as_deref())?;
    debug!(game_dir = %game_dir.display(), map = args.map.as_str(), "loading level");

    let mut session = run_level_load(LevelLoadOptions {
        map_name: args.map.clone(),
        entity_lump,
        config,
        script_source: Some(Arc::new(FileScriptSource::new(&game_dir))),
        sounds: args.sounds,
        random_seed: args.seed,
    })?;

    for line in &args.commands {
        if !session.console_command(line) {
            warn!(command = line.as_str(), "not a maphack console command");
        }
    }
    for (target, output) in fires {
        if !session.fire_output(target, output) {
            warn!(target_name = target, output, "no entity to fire output on");
        }
    }
    for name in &args.game_events {
        session.game_event(name);
    }
    run_ticks(&mut session, args.ticks, args.interval);

    let report = session.report();
    println!("RESULT:OK");
    println!("PATCHED:{}", report.patched);
    println!(
        "REPORT_JSON:{}",
        serde_json::to_string(&report).expect("report json")
    );
    Ok(0)
}

fn run_check(args: CheckArgs) -> Result<i32, CliError> {
    init_logging(false);
    let targets = read_check_targets(&args.path)?;

    let checks: Vec<(String, ScriptCheck)> = targets
        .into_iter()
        .map(|(path, text)| {
            let check = check_script(&text);
            (path, check)
        })
        .collect();
    let error_count: usize = checks.iter().map(|(_, check)| check.errors.len()).sum();

    println!(
        "RESULT:{}",
        if error_count == 0 { "OK" } else { "CHECK_FAILED" }
    );
    for (path, check) in &checks {
        let entry = FileCheck { path, check };
        println!(
            "CHECK_JSON:{}",
            serde_json::to_string(&entry).expect("check json")
        );
    }
    Ok(if error_count == 0 { 0 } else { 1 })
}
