use std::io;
use std::path::{PathBuf, StripPrefixError};

use mh_core::MapHackError;
use thiserror::Error;

/// Everything `maphack` can fail with before or around a level session.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    #[error("cannot resolve working directory: {0}")]
    WorkingDir(#[source] io::Error),
    #[error("path does not exist: {}", .0.display())]
    NotFound(PathBuf),
    #[error("game-dir is not a directory: {}", .0.display())]
    NotDir(PathBuf),
    #[error("cannot read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("{0}")]
    Scan(#[from] StripPrefixError),
    #[error("No .txt scripts found under {}", .0.display())]
    NoScripts(PathBuf),
    #[error("cannot read config {}: {source}", path.display())]
    ConfigRead { path: PathBuf, source: io::Error },
    #[error("config {}: {}", path.display(), source.message)]
    ConfigInvalid { path: PathBuf, source: MapHackError },
    #[error("expected <target>:<output>, got \"{0}\"")]
    FireInvalid(String),
    #[error("{}", .0.message)]
    Level(#[from] MapHackError),
}

impl CliError {
    pub(crate) fn code(&self) -> &str {
        match self {
            Self::WorkingDir(_) => "CLI_SOURCE_PATH",
            Self::NotFound(_) => "CLI_SOURCE_NOT_FOUND",
            Self::NotDir(_) => "CLI_SOURCE_NOT_DIR",
            Self::Read { .. } => "CLI_SOURCE_READ",
            Self::Scan(_) => "CLI_SOURCE_SCAN",
            Self::NoScripts(_) => "CLI_SOURCE_EMPTY",
            Self::ConfigRead { .. } => "CLI_CONFIG_READ",
            Self::ConfigInvalid { .. } => "CLI_CONFIG_INVALID",
            Self::FireInvalid(_) => "CLI_FIRE_INVALID",
            Self::Level(error) => &error.code,
        }
    }

    pub(crate) fn read(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Read { path, source }
    }
}

/// The `RESULT:ERROR` block. Level errors that carry a source span add an
/// `ERROR_SPAN_JSON:` line.
pub(crate) fn render_error(error: &CliError) -> Vec<String> {
    let mut lines = vec![
        "RESULT:ERROR".to_string(),
        format!("ERROR_CODE:{}", error.code()),
        format!(
            "ERROR_MSG_JSON:{}",
            serde_json::to_string(&error.to_string()).expect("string json")
        ),
    ];
    if let CliError::Level(MapHackError {
        span: Some(span), ..
    }) = error
    {
        lines.push(format!(
            "ERROR_SPAN_JSON:{}",
            serde_json::to_string(span).expect("span json")
        ));
    }
    lines
}

pub(crate) fn emit_error(error: CliError) -> i32 {
    for line in render_error(&error) {
        println!("{}", line);
    }
    1
}

#[cfg(test)]
mod cli_error_tests {
    use super::*;
    use mh_core::{SourceLocation, SourceSpan};

    #[test]
    fn emit_error_returns_non_zero_exit_code() {
        assert_eq!(emit_error(CliError::FireInvalid("door".to_string())), 1);
    }

    #[test]
    fn codes_follow_the_failing_step() {
        let strip_error = std::path::Path::new("/a")
            .strip_prefix("/b")
            .expect_err("strip prefix");
        assert_eq!(CliError::from(strip_error).code(), "CLI_SOURCE_SCAN");
        assert_eq!(
            CliError::read("maps/a.ent")(io::Error::other("denied")).code(),
            "CLI_SOURCE_READ"
        );
        assert_eq!(
            CliError::NotDir(PathBuf::from("maps")).code(),
            "CLI_SOURCE_NOT_DIR"
        );

        let level = CliError::from(MapHackError::new("API_SCRIPT_NOT_FOUND", "no script"));
        assert_eq!(level.code(), "API_SCRIPT_NOT_FOUND");
        assert_eq!(level.to_string(), "no script");
    }

    #[test]
    fn read_errors_name_the_file() {
        let error = CliError::read("maps/gate.ent")(io::Error::other("denied"));
        assert_eq!(error.to_string(), "cannot read maps/gate.ent: denied");

        let invalid = CliError::ConfigInvalid {
            path: PathBuf::from("cfg.json"),
            source: MapHackError::new("MH_CONFIG_INVALID", "bad"),
        };
        assert_eq!(invalid.code(), "CLI_CONFIG_INVALID");
        assert_eq!(invalid.to_string(), "config cfg.json: bad");
    }

    #[test]
    fn spans_are_rendered_for_level_errors() {
        let span = SourceSpan {
            start: SourceLocation { line: 2, column: 5 },
            end: SourceLocation { line: 2, column: 6 },
        };
        let lines = render_error(&CliError::from(MapHackError::with_span(
            "KV_PARSE_ERROR",
            "unexpected '}'",
            span,
        )));
        assert_eq!(lines[0], "RESULT:ERROR");
        assert_eq!(lines[1], "ERROR_CODE:KV_PARSE_ERROR");
        assert_eq!(lines[2], r#"ERROR_MSG_JSON:"unexpected '}'""#);
        assert!(lines[3].starts_with("ERROR_SPAN_JSON:{\"start\":{\"line\":2"));

        let lines = render_error(&CliError::FireInvalid("gate".to_string()));
        assert_eq!(lines.len(), 3);
    }
}
