use std::fs;
use std::path::{Path, PathBuf};

use mh_runtime::MapHackConfig;
use walkdir::WalkDir;

use crate::CliError;

/// Stands in for a level when no compiled entity lump is available.
pub(crate) const EMPTY_LEVEL_LUMP: &str = "{\n\"classname\" \"worldspawn\"\n}\n";

pub(crate) fn resolve_path(raw: &str) -> Result<PathBuf, CliError> {
    let path = PathBuf::from(raw);
    let absolute = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .map_err(CliError::WorkingDir)?
            .join(path)
    };

    if !absolute.exists() {
        return Err(CliError::NotFound(absolute));
    }
    Ok(absolute)
}

pub(crate) fn resolve_game_dir(raw: &str) -> Result<PathBuf, CliError> {
    let absolute = resolve_path(raw)?;
    if !absolute.is_dir() {
        return Err(CliError::NotDir(absolute));
    }
    Ok(absolute)
}

/// Reads the level's entity lump. An explicit path must exist; the default
/// `maps/<map>.ent` falls back to a lump holding only the world entity.
pub(crate) fn read_entity_lump(
    game_dir: &Path,
    map: &str,
    explicit: Option<&str>,
) -> Result<String, CliError> {
    if let Some(raw) = explicit {
        let path = resolve_path(raw)?;
        return fs::read_to_string(&path).map_err(CliError::read(&path));
    }

    let default_path = game_dir.join("maps").join(format!("{}.ent", map));
    if !default_path.is_file() {
        return Ok(EMPTY_LEVEL_LUMP.to_string());
    }
    fs::read_to_string(&default_path).map_err(CliError::read(&default_path))
}

pub(crate) fn load_config(path: Option<&str>) -> Result<MapHackConfig, CliError> {
    let Some(raw) = path else {
        return Ok(MapHackConfig::default());
    };
    let path = resolve_path(raw)?;
    let text = fs::read_to_string(&path).map_err(|source| CliError::ConfigRead {
        path: path.clone(),
        source,
    })?;
    MapHackConfig::from_json_str(&text).map_err(|source| CliError::ConfigInvalid { path, source })
}

/// Collects `(relative path, text)` for one script file, or for every `.txt`
/// file under a directory, sorted by path.
pub(crate) fn read_check_targets(raw: &str) -> Result<Vec<(String, String)>, CliError> {
    let root = resolve_path(raw)?;
    if root.is_file() {
        let name = root
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("script")
            .to_string();
        let text = fs::read_to_string(&root).map_err(CliError::read(&root))?;
        return Ok(vec![(name, text)]);
    }

    let mut targets = Vec::new();
    for entry in WalkDir::new(&root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some("txt") {
            continue;
        }

        let relative = path
            .strip_prefix(&root)?
            .to_string_lossy()
            .replace('\\', "/");
        let text = fs::read_to_string(path).map_err(CliError::read(path))?;
        targets.push((relative, text));
    }

    if targets.is_empty() {
        return Err(CliError::NoScripts(root));
    }
    targets.sort_by(|left, right| left.0.cmp(&right.0));
    Ok(targets)
}
