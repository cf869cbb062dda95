//! Encoder option lists and LAME-style option string parsing.

use std::fmt;
use std::str::FromStr;

/// One `keyword [value]` entry, e.g. `-m j` or `--vbr-new`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionEntry {
    pub keyword: String,
    pub value: Option<String>,
}

impl OptionEntry {
    pub fn new(keyword: impl Into<String>, value: Option<&str>) -> Self {
        Self {
            keyword: keyword.into(),
            value: value.map(str::to_string),
        }
    }

    /// Keyword only, for switches such as `--cbr`.
    pub fn flag(keyword: impl Into<String>) -> Self {
        Self::new(keyword, None)
    }
}

impl fmt::Display for OptionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{} {}", self.keyword, value),
            None => f.write_str(&self.keyword),
        }
    }
}

/// Ordered list of option entries for one encoder setting.
///
/// Entries are applied in order, so later entries override earlier ones
/// exactly as they would on a LAME command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncoderConfig {
    entries: Vec<OptionEntry>,
}

impl EncoderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a LAME command-line style string such as `"-m j -V 2 --vbr-new"`.
    ///
    /// A token starting with `-` opens a new entry unless it is a negative
    /// number following a keyword, in which case it is that keyword's value.
    /// Further plain tokens are appended to the current value separated by a
    /// space. Plain tokens before the first keyword are ignored.
    pub fn parse(options: &str) -> Self {
        let mut entries: Vec<OptionEntry> = Vec::new();

        for token in options.split_whitespace() {
            let opens_entry = token.starts_with('-') && !is_negative_number(token);
            if opens_entry {
                entries.push(OptionEntry::flag(token));
                continue;
            }
            let Some(current) = entries.last_mut() else {
                continue;
            };
            match &mut current.value {
                Some(value) => {
                    value.push(' ');
                    value.push_str(token);
                }
                None => current.value = Some(token.to_string()),
            }
        }

        Self { entries }
    }

    /// Append an entry.
    pub fn push(&mut self, entry: OptionEntry) {
        self.entries.push(entry);
    }

    /// Builder: append an entry.
    pub fn with(mut self, keyword: &str, value: Option<&str>) -> Self {
        self.push(OptionEntry::new(keyword, value));
        self
    }

    pub fn entries(&self) -> &[OptionEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OptionEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromStr for EncoderConfig {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for EncoderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{entry}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a EncoderConfig {
    type Item = &'a OptionEntry;
    type IntoIter = std::slice::Iter<'a, OptionEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn is_negative_number(token: &str) -> bool {
    token.len() > 1 && token.parse::<f64>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keywords_and_values() {
        let config = EncoderConfig::parse("-m j  -V 2 --vbr-new");
        assert_eq!(
            config.entries(),
            &[
                OptionEntry::new("-m", Some("j")),
                OptionEntry::new("-V", Some("2")),
                OptionEntry::flag("--vbr-new"),
            ]
        );
    }

    #[test]
    fn test_parse_negative_value() {
        let config = EncoderConfig::parse("-q -3 --cbr");
        assert_eq!(config.entries()[0], OptionEntry::new("-q", Some("-3")));
        assert_eq!(config.entries()[1], OptionEntry::flag("--cbr"));
    }

    #[test]
    fn test_parse_joins_extra_tokens_and_skips_leading_noise() {
        let config = EncoderConfig::parse("stray -m j x");
        assert_eq!(config.len(), 1);
        assert_eq!(config.entries()[0].value.as_deref(), Some("j x"));
    }

    #[test]
    fn test_parse_empty() {
        assert!(EncoderConfig::parse("   ").is_empty());
        assert!("".parse::<EncoderConfig>().unwrap().is_empty());
    }

    #[test]
    fn test_display_normalises_whitespace() {
        let config = EncoderConfig::parse("  -b   192\t--cbr ");
        assert_eq!(config.to_string(), "-b 192 --cbr");

        let built = EncoderConfig::new().with("-m", Some("s")).with("-k", None);
        assert_eq!(built.to_string(), "-m s -k");
    }
}
