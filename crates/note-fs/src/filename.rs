//! Filename sanitization for note creation and rename targets.

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum FilenameError {
    #[error("sanitized filename is empty")]
    Empty,
}

const DANGEROUS_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|', '\0'];

/// Strip leading/trailing whitespace and dots, replace each dangerous
/// character with `-`. Rejects an empty result.
pub fn sanitize_filename(name: &str) -> Result<String, FilenameError> {
    let mut cleaned: String = name
        .trim()
        .chars()
        .map(|c| if DANGEROUS_CHARS.contains(&c) { '-' } else { c })
        .collect();
    cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        return Err(FilenameError::Empty);
    }
    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_dangerous_characters() {
        assert_eq!(
            sanitize_filename("a/b\\c:d*e?f\"g<h>i|j").unwrap(),
            "a-b-c-d-e-f-g-h-i-j"
        );
    }

    #[test]
    fn trims_whitespace_and_dots() {
        assert_eq!(sanitize_filename("  ..hidden..  ").unwrap(), "hidden");
    }

    #[test]
    fn rejects_empty_result() {
        assert_eq!(sanitize_filename("   ..."), Err(FilenameError::Empty));
        assert_eq!(sanitize_filename(""), Err(FilenameError::Empty));
    }

    #[test]
    fn leaves_clean_name_untouched() {
        assert_eq!(sanitize_filename("Meeting Notes").unwrap(), "Meeting Notes");
    }
}
