//! Result selection and saving downloads to disk.

use anyhow::Context;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf, is_separator};

/// Parse the answer to the download prompt.
///
/// Returns the zero-based index of the chosen result, or `None` if the user
/// quit with `q` or an empty line.
///
/// # Errors
///
/// Returns an error for non-numeric input or a number outside `1..=count`.
pub fn parse_selection(input: &str, count: usize) -> anyhow::Result<Option<usize>> {
    let input = input.trim();
    if input.is_empty() || input.eq_ignore_ascii_case("q") {
        return Ok(None);
    }

    match input.parse::<usize>() {
        Ok(choice) if (1..=count).contains(&choice) => Ok(Some(choice - 1)),
        _ => anyhow::bail!("invalid selection: {input}"),
    }
}

/// Decide where a download named `filename` is written.
///
/// Without `output` the file lands in the current directory under its own
/// base name. An `output` ending in a path separator, or naming an existing
/// directory, receives the file inside it; any other `output` is the file
/// path itself.
///
/// # Errors
///
/// Returns an error if `filename` has no usable base name.
pub fn resolve_output_path(output: Option<&Path>, filename: &str) -> anyhow::Result<PathBuf> {
    let base = Path::new(filename.trim())
        .file_name()
        .with_context(|| format!("result has no usable filename: {filename:?}"))?;

    let Some(output) = output else {
        return Ok(PathBuf::from(base));
    };

    let names_directory = output
        .to_str()
        .and_then(|s| s.chars().last())
        .is_some_and(is_separator);
    if names_directory || output.is_dir() {
        Ok(output.join(base))
    } else {
        Ok(output.to_path_buf())
    }
}

/// Write `data` to `path`, readable only by the owner on unix.
///
/// Missing parent directories are created.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn save(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .with_context(|| format!("failed to save {}", path.display()))?;
    file.write_all(data)
        .with_context(|| format!("failed to save {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection("1\n", 3).unwrap(), Some(0));
        assert_eq!(parse_selection(" 3 ", 3).unwrap(), Some(2));
        assert_eq!(parse_selection("q", 3).unwrap(), None);
        assert_eq!(parse_selection("Q\n", 3).unwrap(), None);
        assert_eq!(parse_selection("\n", 3).unwrap(), None);
    }

    #[test]
    fn test_parse_selection_rejects_bad_input() {
        assert!(parse_selection("0", 3).is_err());
        assert!(parse_selection("4", 3).is_err());
        assert!(parse_selection("-1", 3).is_err());
        assert!(parse_selection("two", 3).is_err());
    }

    #[test]
    fn test_default_output_is_base_name() {
        assert_eq!(
            resolve_output_path(None, "Moby Dick.epub").unwrap(),
            PathBuf::from("Moby Dick.epub")
        );
        assert_eq!(
            resolve_output_path(None, "../../etc/Moby Dick.epub").unwrap(),
            PathBuf::from("Moby Dick.epub")
        );
        assert!(resolve_output_path(None, "").is_err());
        assert!(resolve_output_path(None, "..").is_err());
    }

    #[test]
    fn test_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            resolve_output_path(Some(dir.path()), "book.epub").unwrap(),
            dir.path().join("book.epub")
        );

        let trailing = PathBuf::from(format!("new{}", std::path::MAIN_SEPARATOR));
        assert_eq!(
            resolve_output_path(Some(&trailing), "book.epub").unwrap(),
            trailing.join("book.epub")
        );
    }

    #[test]
    fn test_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("renamed.epub");
        assert_eq!(
            resolve_output_path(Some(&target), "book.epub").unwrap(),
            target
        );
    }

    #[test]
    fn test_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("books/book.epub");
        save(&path, b"contents").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"contents");

        save(&path, b"new").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
