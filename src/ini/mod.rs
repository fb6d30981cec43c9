//! Ini text format.
//!
//! An [`IniDocument`] is a set of named sections, each an ordered map of
//! keys to raw string values. Comment lines (`;` or `#`) directly above a
//! header or key are kept with it. Newlines inside values are stored as the
//! two characters `\n`. Sections and keys are written sorted by name.

mod encoding;
mod value;

pub use encoding::TextEncoding;
pub use value::{IniValue, IniValueInfo};

use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// One `key=value` line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniEntry {
    pub value: String,
    pub comment: Option<String>,
}

/// Keys of one `[Section]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniSection {
    pub comment: Option<String>,
    entries: BTreeMap<String, IniEntry>,
}

impl IniSection {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entry(key).map(|e| e.value.as_str())
    }

    /// Exact match first, then ASCII case-insensitive.
    pub fn entry(&self, key: &str) -> Option<&IniEntry> {
        self.entries.get(key).or_else(|| {
            self.entries
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, e)| e)
        })
    }

    /// Set a value. An existing key differing only in case is updated.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let key = self.resolve_key(&key).unwrap_or(key);
        self.entries.entry(key).or_default().value = value.into();
    }

    pub fn set_comment(&mut self, key: &str, comment: Option<String>) {
        let Some(key) = self.resolve_key(key) else { return };
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.comment = comment;
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<IniEntry> {
        let key = self.resolve_key(key)?;
        self.entries.remove(&key)
    }

    fn resolve_key(&self, key: &str) -> Option<String> {
        if self.entries.contains_key(key) {
            return Some(key.to_string());
        }
        self.entries
            .keys()
            .find(|k| k.eq_ignore_ascii_case(key))
            .cloned()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Keys with their raw values, sorted by key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), e.value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append this section in ini form to `out`.
    pub fn render(&self, name: &str, write_comments: bool, out: &mut String) {
        if write_comments {
            push_comment(self.comment.as_deref(), out);
        }
        out.push('[');
        out.push_str(name);
        out.push_str("]\n");
        for (key, entry) in &self.entries {
            if write_comments {
                push_comment(entry.comment.as_deref(), out);
            }
            out.push_str(key);
            out.push('=');
            out.push_str(&escape(&entry.value));
            out.push('\n');
        }
    }
}

/// Parsed ini text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    sections: BTreeMap<String, IniSection>,
}

impl IniDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_lines(text, None)
    }

    /// Parse, checking `cancel` between lines.
    pub fn parse_with_cancel(text: &str, cancel: &CancellationToken) -> Result<Self> {
        Self::parse_lines(text, Some(cancel))
    }

    fn parse_lines(text: &str, cancel: Option<&CancellationToken>) -> Result<Self> {
        let mut doc = Self::new();
        let mut current: Option<String> = None;
        let mut pending_comment: Vec<&str> = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            if cancel.is_some_and(|c| c.is_cancelled()) {
                return Err(Error::Cancelled);
            }
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(comment) = line.strip_prefix(';').or_else(|| line.strip_prefix('#')) {
                pending_comment.push(comment.trim());
                continue;
            }
            let comment = take_comment(&mut pending_comment);

            if let Some(header) = line.strip_prefix('[') {
                let Some(name) = header.strip_suffix(']') else {
                    return Err(Error::Parse {
                        line: line_no,
                        reason: format!("unterminated section header '{}'", line),
                    });
                };
                let name = name.trim();
                let name = doc.resolve_section(name).unwrap_or_else(|| name.to_string());
                let section = doc.sections.entry(name.clone()).or_default();
                if comment.is_some() {
                    section.comment = comment;
                }
                current = Some(name);
                continue;
            }

            let Some(section_name) = current.as_ref() else {
                tracing::warn!(line = line_no, "Ignoring key before first section header");
                continue;
            };
            let Some((key, value)) = line.split_once('=') else {
                tracing::warn!(line = line_no, "Ignoring line without '='");
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                tracing::warn!(line = line_no, "Ignoring line with empty key");
                continue;
            }
            // Last duplicate wins, keeping the first spelling of the key
            let section = doc.sections.entry(section_name.clone()).or_default();
            let key = section.resolve_key(key).unwrap_or_else(|| key.to_string());
            section.entries.insert(
                key,
                IniEntry {
                    value: unescape(value.trim()),
                    comment,
                },
            );
        }
        Ok(doc)
    }

    /// Render the whole document.
    pub fn to_ini_string(&self, write_comments: bool) -> String {
        let mut out = String::new();
        for (i, (name, section)) in self.sections.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            section.render(name, write_comments, &mut out);
        }
        out
    }

    /// Exact match first, then ASCII case-insensitive.
    pub fn section(&self, name: &str) -> Option<&IniSection> {
        self.sections.get(name).or_else(|| {
            self.sections
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, s)| s)
        })
    }

    /// Section by name, created when missing. Matching is case-insensitive.
    pub fn section_mut(&mut self, name: &str) -> &mut IniSection {
        let name = self.resolve_section(name).unwrap_or_else(|| name.to_string());
        self.sections.entry(name).or_default()
    }

    pub fn remove_section(&mut self, name: &str) -> Option<IniSection> {
        let name = self.resolve_section(name)?;
        self.sections.remove(&name)
    }

    /// Remove a single key, leaving the section in place.
    pub fn remove(&mut self, section: &str, key: &str) -> Option<IniEntry> {
        let name = self.resolve_section(section)?;
        self.sections.get_mut(&name)?.remove(key)
    }

    /// Drop sections without keys.
    pub fn prune_empty(&mut self) {
        self.sections.retain(|_, s| !s.is_empty());
    }

    fn resolve_section(&self, name: &str) -> Option<String> {
        if self.sections.contains_key(name) {
            return Some(name.to_string());
        }
        self.sections
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section).and_then(|s| s.get(key))
    }

    pub fn set(&mut self, section: &str, key: impl Into<String>, value: impl Into<String>) {
        self.section_mut(section).set(key, value);
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &IniSection)> {
        self.sections.iter().map(|(k, s)| (k.as_str(), s))
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Name of the dedicated section holding a map-typed property.
pub fn map_section_name(section: &str, ini_key: &str) -> String {
    format!("{}-{}", section, ini_key)
}

fn take_comment(lines: &mut Vec<&str>) -> Option<String> {
    if lines.is_empty() {
        return None;
    }
    let comment = lines.join("\n");
    lines.clear();
    Some(comment)
}

fn push_comment(comment: Option<&str>, out: &mut String) {
    let Some(comment) = comment else { return };
    for line in comment.lines() {
        out.push_str("; ");
        out.push_str(line);
        out.push('\n');
    }
}

fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace("\r\n", "\\n")
        .replace('\n', "\\n")
}

/// `\n` is a newline and `\\` a backslash; any other backslash is literal.
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('n') => {
                chars.next();
                out.push('\n');
            }
            Some('\\') => {
                chars.next();
                out.push('\\');
            }
            _ => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
; leading comment
stray=ignored

; Core settings
[Core]
# display name
Name = Robin
Age=21
Age=22

[Core-Counts]
One=1
";

    #[test]
    fn test_parse_sections_and_keys() {
        let doc = IniDocument::parse(SAMPLE).unwrap();
        assert_eq!(doc.section_names().collect::<Vec<_>>(), vec!["Core", "Core-Counts"]);
        assert_eq!(doc.get("Core", "Name"), Some("Robin"));
        assert_eq!(doc.get("core", "name"), Some("Robin"));
        assert_eq!(doc.get("Core-Counts", "One"), Some("1"));
    }

    #[test]
    fn test_keys_before_first_header_are_skipped() {
        let doc = IniDocument::parse(SAMPLE).unwrap();
        assert!(doc.sections().all(|(_, s)| s.get("stray").is_none()));
    }

    #[test]
    fn test_last_duplicate_wins() {
        let doc = IniDocument::parse(SAMPLE).unwrap();
        assert_eq!(doc.get("Core", "Age"), Some("22"));
    }

    #[test]
    fn test_comments_attach_to_following_item() {
        let doc = IniDocument::parse(SAMPLE).unwrap();
        let core = doc.section("Core").unwrap();
        assert_eq!(core.comment.as_deref(), Some("Core settings"));
        assert_eq!(core.entry("Name").unwrap().comment.as_deref(), Some("display name"));
    }

    #[test]
    fn test_unterminated_header_is_an_error() {
        let err = IniDocument::parse("[Core\nName=x\n").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 1, .. }));
    }

    #[test]
    fn test_newline_escaping_round_trip() {
        let mut doc = IniDocument::new();
        doc.set("S", "Text", "line one\nline two");
        let text = doc.to_ini_string(false);
        assert!(text.contains("Text=line one\\nline two"));
        let back = IniDocument::parse(&text).unwrap();
        assert_eq!(back.get("S", "Text"), Some("line one\nline two"));
    }

    #[test]
    fn test_render_sorted_with_comments() {
        let mut doc = IniDocument::new();
        doc.set("B", "z", "1");
        doc.set("B", "a", "2");
        doc.set("A", "k", "v");
        doc.section_mut("B").comment = Some("section b".to_string());
        doc.section_mut("B").set_comment("a", Some("first key".to_string()));

        let text = doc.to_ini_string(true);
        assert_eq!(text, "[A]\nk=v\n\n; section b\n[B]\n; first key\na=2\nz=1\n");
        assert!(!doc.to_ini_string(false).contains(';'));
    }

    #[test]
    fn test_parse_honors_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let err = IniDocument::parse_with_cancel(SAMPLE, &token).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn test_set_matches_existing_key_case() {
        let mut doc = IniDocument::parse("[core]\nname=a\n").unwrap();
        doc.set("Core", "Name", "b");
        assert_eq!(doc.to_ini_string(false), "[core]\nname=b\n");
        doc.remove("CORE", "NAME");
        doc.prune_empty();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_duplicates_differing_in_case_collapse() {
        let doc = IniDocument::parse("[Core]\nAge=1\nage=2\n[core]\nName=x\n").unwrap();
        assert_eq!(doc.section_names().collect::<Vec<_>>(), vec!["Core"]);
        assert_eq!(doc.get("Core", "Age"), Some("2"));
        assert_eq!(doc.get("Core", "Name"), Some("x"));
        assert_eq!(doc.to_ini_string(false), "[Core]\nAge=2\nName=x\n");
    }

    #[test]
    fn test_backslashes_survive_round_trip() {
        let mut doc = IniDocument::new();
        doc.set("S", "Path", "C:\\new\\dir\nnext");
        let text = doc.to_ini_string(false);
        assert!(text.contains("Path=C:\\\\new\\\\dir\\nnext"));
        let back = IniDocument::parse(&text).unwrap();
        assert_eq!(back.get("S", "Path"), Some("C:\\new\\dir\nnext"));

        let plain = IniDocument::parse("[S]\nPath=C:\\dir\n").unwrap();
        assert_eq!(plain.get("S", "Path"), Some("C:\\dir"));
    }

    #[test]
    fn test_map_section_name() {
        assert_eq!(map_section_name("Core", "Counts"), "Core-Counts");
    }
}
