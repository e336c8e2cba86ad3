//! Per-folder vehicle notes
//!
//! A folder of fragments may carry a note file. Each non-empty, non-heading
//! line is either `<model>: <note>` for one vehicle or a note for the whole
//! folder.

use crate::error::CompileError;
use crate::storage::read_optional;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Qualifying lines of a note file: trimmed, non-empty, not headings,
/// list bullets removed
pub fn note_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            line.strip_prefix("- ")
                .or_else(|| line.strip_prefix("* "))
                .unwrap_or(line)
                .trim()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// Pick the note for `car_model` from qualifying lines
///
/// A line whose text before a colon names the vehicle wins; the comparison
/// ignores case, colons, repeated whitespace and the `Category:` prefix.
/// Without a match, the first line (or its text after the first colon)
/// applies to every vehicle. The result is parenthesized.
pub fn match_note<'a>(lines: impl IntoIterator<Item = &'a str>, car_model: &str) -> Option<String> {
    let lines: Vec<&str> = lines.into_iter().collect();
    let wanted = variants(car_model);

    for line in &lines {
        for (position, _) in line.match_indices(':') {
            let (Some(prefix), Some(suffix)) = (line.get(..position), line.get(position + 1..))
            else {
                continue;
            };
            let suffix = suffix.trim();
            if suffix.is_empty() {
                continue;
            }
            if variants(prefix).iter().any(|v| wanted.contains(v)) {
                return Some(parenthesize(suffix));
            }
        }
    }

    let first = lines.first()?;
    let generic = first
        .split_once(':')
        .map_or(*first, |(_, suffix)| suffix)
        .trim();
    (!generic.is_empty()).then(|| parenthesize(generic))
}

/// Wrap `text` in parentheses unless it already is
pub fn parenthesize(text: &str) -> String {
    let text = text.trim();
    if text.starts_with('(') && text.ends_with(')') {
        text.to_string()
    } else {
        format!("({text})")
    }
}

fn normalize(text: &str) -> String {
    text.to_lowercase()
        .replace(':', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn variants(name: &str) -> Vec<String> {
    let mut variants = vec![normalize(name)];
    if let Some((_, model)) = name.split_once(':') {
        variants.push(normalize(model));
    }
    variants.retain(|v| !v.is_empty());
    variants
}

/// Looks up note files beside leaf fragments
#[derive(Debug, Clone)]
pub struct NoteResolver {
    profiles_dir: PathBuf,
    file_name: String,
}

impl NoteResolver {
    /// Create a resolver for note files named `file_name`
    pub fn new(profiles_dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            profiles_dir: profiles_dir.into(),
            file_name: file_name.into(),
        }
    }

    /// Note file that applies to the fragment stored under `key`
    pub fn note_path(&self, key: &Path) -> PathBuf {
        let folder = key.parent().unwrap_or_else(|| Path::new(""));
        self.profiles_dir.join(folder).join(&self.file_name)
    }

    /// Resolve the note for one vehicle; a missing note file yields `None`
    pub async fn resolve(&self, key: &Path, car_model: &str) -> Result<Option<String>, CompileError> {
        let path = self.note_path(key);
        let Some(text) = read_optional(&path).await? else {
            return Ok(None);
        };
        let note = match_note(note_lines(&text), car_model);
        debug!(path = ?path, car_model = %car_model, matched = note.is_some(), "Resolved note");
        Ok(note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    const NOTES: &str = "# Notes\n\n- Kona: Requires firmware 4.2\n- EV: Ioniq 5 : Only 2022+\n";

    #[test]
    fn skips_headings_and_blank_lines() {
        assert_eq!(
            note_lines(NOTES),
            vec!["Kona: Requires firmware 4.2", "EV: Ioniq 5 : Only 2022+"]
        );
    }

    #[test]
    fn matches_without_category_prefix() {
        assert_eq!(
            match_note(note_lines(NOTES), "EV: Kona"),
            Some("(Requires firmware 4.2)".to_string())
        );
    }

    #[test]
    fn matches_full_name_with_odd_spacing_and_case() {
        assert_eq!(
            match_note(note_lines(NOTES), "ev:  IONIQ 5"),
            Some("(Only 2022+)".to_string())
        );
    }

    #[test]
    fn falls_back_to_first_line_suffix() {
        assert_eq!(
            match_note(note_lines(NOTES), "EV: Niro"),
            Some("(Requires firmware 4.2)".to_string())
        );
    }

    #[test]
    fn generic_line_without_colon_is_used_whole() {
        assert_eq!(
            match_note(["Tested by the community"], "EV: Niro"),
            Some("(Tested by the community)".to_string())
        );
    }

    #[test]
    fn no_lines_means_no_note() {
        assert_eq!(match_note(Vec::<&str>::new(), "EV: Niro"), None);
    }

    #[test]
    fn already_parenthesized_is_kept() {
        assert_eq!(
            match_note(["Kona: (beta)"], "EV: Kona"),
            Some("(beta)".to_string())
        );
        assert_eq!(parenthesize("(beta)"), "(beta)");
        assert_eq!(parenthesize("beta"), "(beta)");
    }

    #[tokio::test]
    async fn reads_note_beside_fragment() -> TestResult {
        let temp_dir = TempDir::new()?;
        std::fs::create_dir_all(temp_dir.path().join("hyundai"))?;
        std::fs::write(temp_dir.path().join("hyundai/note.md"), NOTES)?;

        let resolver = NoteResolver::new(temp_dir.path(), "note.md");
        let note = resolver
            .resolve(Path::new("hyundai/kona.json"), "EV: Kona")
            .await?;
        assert_eq!(note.as_deref(), Some("(Requires firmware 4.2)"));

        let absent = resolver
            .resolve(Path::new("tesla/model3.json"), "EV: Tesla Model 3")
            .await?;
        assert!(absent.is_none());
        Ok(())
    }
}
