use crate::error::{Result, VaryError};
use crate::field::Field;
use crate::grid::Grid;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Numbers read from a file reference.
#[derive(Debug, Clone, PartialEq)]
pub enum FileValue {
    Scalar(f64),
    List(Vec<f64>),
}

impl FileValue {
    pub fn len(&self) -> usize {
        match self {
            FileValue::Scalar(_) => 1,
            FileValue::List(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_list(self) -> Vec<f64> {
        match self {
            FileValue::Scalar(value) => vec![value],
            FileValue::List(values) => values,
        }
    }

    /// Interpret the values as a dense field over `grid`.
    pub fn into_field(self, grid: &Grid, parameter: &str) -> Result<Field> {
        Field::from_values(grid, parameter, self.into_list())
    }
}

/// Reader for values referenced from a settings file
pub struct FileLoader;

impl FileLoader {
    /// Read a file reference, dispatching on its extension.
    ///
    /// `.json` holds a number or a (nested) array of numbers, `.txt` or no
    /// extension holds whitespace or comma separated numbers.
    pub fn load<P: AsRef<Path>>(file_path: P) -> Result<FileValue> {
        let path = file_path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");

        let value = match extension {
            "json" => Self::parse_json_str(&Self::read(path)?)?,
            "txt" | "" => Self::parse_ascii_str(&Self::read(path)?).map_err(|message| {
                VaryError::invalid_parameter(path.display().to_string(), message)
            })?,
            _ => {
                return Err(VaryError::UnsupportedFile {
                    path: path.to_path_buf(),
                });
            }
        };
        debug!(path = %path.display(), values = value.len(), "loaded file reference");
        Ok(value)
    }

    fn read(path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|e| VaryError::io(path, e))
    }

    /// Parse JSON text holding a number or a (nested) array of numbers.
    pub fn parse_json_str(json_str: &str) -> Result<FileValue> {
        let json: Value = serde_json::from_str(json_str)?;
        if let Some(number) = json.as_f64() {
            return Ok(FileValue::Scalar(number));
        }
        let mut values = Vec::new();
        Self::flatten(&json, &mut values).map_err(|message| {
            VaryError::invalid_parameter("file reference", message)
        })?;
        Ok(FileValue::List(values))
    }

    fn flatten(json: &Value, out: &mut Vec<f64>) -> std::result::Result<(), String> {
        match json {
            Value::Array(items) => {
                for item in items {
                    Self::flatten(item, out)?;
                }
                Ok(())
            }
            other => match other.as_f64() {
                Some(number) => {
                    out.push(number);
                    Ok(())
                }
                None => Err(format!("expected a number, found {other}")),
            },
        }
    }

    /// Parse ASCII text holding numbers separated by whitespace or commas.
    pub fn parse_ascii_str(text: &str) -> std::result::Result<FileValue, String> {
        let values = text
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|token| !token.is_empty())
            .map(|token| {
                token
                    .parse::<f64>()
                    .map_err(|e| format!("could not parse `{token}`: {e}"))
            })
            .collect::<std::result::Result<Vec<f64>, String>>()?;
        match values.as_slice() {
            [single] => Ok(FileValue::Scalar(*single)),
            _ => Ok(FileValue::List(values)),
        }
    }

    /// Resolve a reference relative to the directory of the settings file.
    pub fn resolve_path(reference: &Path, base_dir: Option<&Path>) -> PathBuf {
        match base_dir {
            Some(base) if reference.is_relative() => base.join(reference),
            _ => reference.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_json_values() {
        assert_eq!(FileLoader::parse_json_str("5").unwrap(), FileValue::Scalar(5.0));
        assert_eq!(
            FileLoader::parse_json_str("[[1, 2], [3.5, 4]]").unwrap(),
            FileValue::List(vec![1.0, 2.0, 3.5, 4.0])
        );
        assert!(FileLoader::parse_json_str(r#"{"broken": "json""#).is_err());
        assert!(FileLoader::parse_json_str(r#"[1, "two"]"#).is_err());
    }

    #[test]
    fn test_ascii_values() {
        assert_eq!(FileLoader::parse_ascii_str(" 10.6\n").unwrap(), FileValue::Scalar(10.6));
        assert_eq!(
            FileLoader::parse_ascii_str("1 2,3\n4\t5").unwrap(),
            FileValue::List(vec![1.0, 2.0, 3.0, 4.0, 5.0])
        );
        assert!(FileLoader::parse_ascii_str("1 two").is_err());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("permeability.txt");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "1e-10 2e-10\n3e-10 4e-10").unwrap();

        let grid = Grid::build(&[2, 2, 1], 1.0).unwrap();
        let field = FileLoader::load(&path)
            .unwrap()
            .into_field(&grid, "permeability")
            .unwrap();
        assert_eq!(field.get(1, 1, 0), Some(4e-10));

        let small = Grid::build(&[3, 2, 1], 1.0).unwrap();
        let err = FileLoader::load(&path)
            .unwrap()
            .into_field(&small, "permeability")
            .unwrap_err();
        assert!(matches!(err, VaryError::ShapeMismatch { expected: 6, actual: 4, .. }));
    }

    #[test]
    fn test_error_handling() {
        let missing = PathBuf::from("/path/that/does/not/exist.json");
        assert!(matches!(FileLoader::load(missing), Err(VaryError::Io { .. })));

        let h5 = PathBuf::from("permeability.h5");
        assert!(matches!(FileLoader::load(h5), Err(VaryError::UnsupportedFile { .. })));
    }

    #[test]
    fn test_resolve_path() {
        let base = Path::new("/settings");
        assert_eq!(
            FileLoader::resolve_path(Path::new("perm.txt"), Some(base)),
            PathBuf::from("/settings/perm.txt")
        );
        assert_eq!(
            FileLoader::resolve_path(Path::new("/abs/perm.txt"), Some(base)),
            PathBuf::from("/abs/perm.txt")
        );
    }
}
