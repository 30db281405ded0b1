//! Search result listings.
//!
//! A search bot answers with a text file (usually zipped) holding one
//! offer per line:
//!
//! ```text
//! !Oatmeal Charles Dickens - Oliver Twist.epub ::INFO:: 468.1KB
//! !Bsk 7f3a2c | Dickens - Bleak House.mobi
//! !xdcc send 12 "Moby Dick.epub"
//! ```
//!
//! The whole line is the command that requests the file; everything else
//! is header noise and is skipped.

/// Marker that starts every offer line
pub const ENTRY_MARKER: char = '!';

/// Start of trailing metadata on an offer line
const METADATA_MARKER: &str = " ::";

/// One offer from a search listing
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchResult {
    command: String,
    /// Display filename
    pub filename: String,
}

impl SearchResult {
    /// Parse one listing line. Returns `None` unless the trimmed line
    /// starts with [`ENTRY_MARKER`].
    #[must_use]
    pub fn from_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.starts_with(ENTRY_MARKER) {
            return None;
        }
        Some(Self {
            command: line.to_string(),
            filename: extract_filename(line).to_string(),
        })
    }

    /// Command to send verbatim to the channel to request this file
    #[must_use]
    pub fn replay_command(&self) -> &str {
        &self.command
    }
}

/// Parse a listing payload into results, skipping non-offer lines
#[must_use]
pub fn parse_listing(data: &[u8]) -> Vec<SearchResult> {
    String::from_utf8_lossy(data)
        .lines()
        .filter_map(SearchResult::from_line)
        .collect()
}

/// Keep results whose filename ends with one of `extensions`.
///
/// Matching is case-insensitive and a leading dot on an extension is
/// optional. An empty list (or one holding only blanks) keeps everything.
#[must_use]
pub fn filter_by_extension<S: AsRef<str>>(
    results: Vec<SearchResult>,
    extensions: &[S],
) -> Vec<SearchResult> {
    let suffixes: Vec<String> = extensions
        .iter()
        .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{ext}"))
        .collect();
    if suffixes.is_empty() {
        return results;
    }

    results
        .into_iter()
        .filter(|r| {
            let name = r.filename.to_lowercase();
            suffixes.iter().any(|suffix| name.ends_with(suffix.as_str()))
        })
        .collect()
}

fn extract_filename(line: &str) -> &str {
    let rest = line.split_once(char::is_whitespace).map_or("", |(_, rest)| rest);
    let rest = rest.split_once(METADATA_MARKER).map_or(rest, |(name, _)| name);
    let rest = rest.rsplit_once('|').map_or(rest, |(_, name)| name);
    unquote(rest.trim())
}

/// Contents of a trailing `"..."` segment, or `text` unchanged
///
/// Quotes inside a title are part of the name.
fn unquote(text: &str) -> &str {
    text.strip_suffix('"')
        .and_then(|head| head.rsplit_once('"'))
        .map_or(text, |(_, quoted)| quoted.trim())
}
