//! Placeholder templates such as `"{title}"` or `"{minutes} minutes"`.
//!
//! Only names listed in [`Placeholder`] are substituted. Anything else in
//! braces is copied through unchanged so a typo stays visible in the output.

use std::collections::BTreeMap;
use std::fmt;

/// Every placeholder a template may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Placeholder {
    Title,
    Artist,
    Album,
    Genre,
    Comment,
    TrackNumber,
    FileName,
    ConfigName,
    Minutes,
    /// Output naming: source base name without extension.
    Name,
    /// Output naming: source extension without the dot.
    Ext,
}

impl Placeholder {
    pub const ALL: [Placeholder; 11] = [
        Placeholder::Title,
        Placeholder::Artist,
        Placeholder::Album,
        Placeholder::Genre,
        Placeholder::Comment,
        Placeholder::TrackNumber,
        Placeholder::FileName,
        Placeholder::ConfigName,
        Placeholder::Minutes,
        Placeholder::Name,
        Placeholder::Ext,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Placeholder::Title => "title",
            Placeholder::Artist => "artist",
            Placeholder::Album => "album",
            Placeholder::Genre => "genre",
            Placeholder::Comment => "comment",
            Placeholder::TrackNumber => "track_number",
            Placeholder::FileName => "file_name",
            Placeholder::ConfigName => "config_name",
            Placeholder::Minutes => "minutes",
            Placeholder::Name => "name",
            Placeholder::Ext => "ext",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.as_str() == name)
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Values available to a template. Recognized placeholders without a value render empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placeholders {
    values: BTreeMap<Placeholder, String>,
}

impl Placeholders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: Placeholder, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: Placeholder, value: impl Into<String>) {
        self.values.insert(key, value.into());
    }

    pub fn get(&self, key: Placeholder) -> Option<&str> {
        self.values.get(&key).map(String::as_str)
    }

    /// Copy all of `other`'s values over this set.
    pub fn merge(&mut self, other: &Placeholders) {
        for (k, v) in &other.values {
            self.values.insert(*k, v.clone());
        }
    }

    /// Substitute `{name}` occurrences in `template`.
    ///
    /// `{{` and `}}` yield literal braces; unknown names and unbalanced
    /// braces are copied verbatim.
    pub fn render(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(pos) = rest.find(['{', '}']) {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];

            if tail.starts_with("{{") || tail.starts_with("}}") {
                out.push_str(&tail[..1]);
                rest = &tail[2..];
                continue;
            }
            if tail.starts_with('}') {
                out.push('}');
                rest = &tail[1..];
                continue;
            }

            match tail[1..].find(['{', '}']) {
                Some(end) if tail.as_bytes()[end + 1] == b'}' => {
                    let name = &tail[1..end + 1];
                    match Placeholder::from_name(name) {
                        Some(key) => out.push_str(self.get(key).unwrap_or("")),
                        None => {
                            log::debug!("unknown placeholder {{{}}} left as is", name);
                            out.push_str(&tail[..end + 2]);
                        }
                    }
                    rest = &tail[end + 2..];
                }
                _ => {
                    out.push('{');
                    rest = &tail[1..];
                }
            }
        }
        out.push_str(rest);
        out
    }
}
