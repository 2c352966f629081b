//! Level loading: source text → [`MazeDto`] → [`Maze`] → [`MapModel`].
//!
//! Syntax and pattern errors stop here as [`LoadError`]s. Everything that is
//! well-formed but inconsistent is passed through for the validator to report.

pub mod dto;
pub mod pattern;
pub mod xml;

use crate::error::LoadError;
use crate::model::MapModel;
use dto::MazeDto;
use std::path::Path;
use tracing::debug;

pub use xml::parse_maze_xml;

/// Supported level encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelFormat {
    Xml,
    Yaml,
    Json,
}

impl LevelFormat {
    /// Pick a format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "xml" => Ok(LevelFormat::Xml),
            "yaml" | "yml" => Ok(LevelFormat::Yaml),
            "json" => Ok(LevelFormat::Json),
            _ => Err(LoadError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Parse a YAML string into a MazeDto.
///
/// No referential validation is performed here.
pub fn parse_maze_yaml(yaml_str: &str) -> Result<MazeDto, LoadError> {
    let dto: MazeDto = serde_yaml::from_str(yaml_str)?;
    Ok(dto)
}

/// Parse a JSON string into a MazeDto.
pub fn parse_maze_json(json_str: &str) -> Result<MazeDto, LoadError> {
    let dto: MazeDto = serde_json::from_str(json_str)?;
    Ok(dto)
}

/// Parse `source` and build an indexed model.
pub fn load_str(source: &str, format: LevelFormat) -> Result<MapModel, LoadError> {
    let dto = match format {
        LevelFormat::Xml => parse_maze_xml(source)?,
        LevelFormat::Yaml => parse_maze_yaml(source)?,
        LevelFormat::Json => parse_maze_json(source)?,
    };
    let maze = dto.into_maze()?;
    debug!(
        rooms = maze.rooms.len(),
        declared = maze.total_rooms,
        ?format,
        "parsed level"
    );
    Ok(MapModel::new(maze)?)
}

/// Read and load a level file, choosing the format by extension.
pub fn load_path(path: &Path) -> Result<MapModel, LoadError> {
    let format = LevelFormat::from_path(path)?;
    let source = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "loading level");
    load_str(&source, format)
}
