// Dictionary source for HMAC secret recovery
// Lazily iterates candidate secrets; large wordlists are never loaded whole

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use tracing::warn;

/// Anything that can hand out a fresh lazy stream of candidate secrets
pub trait SecretSource: Send + Sync {
    fn candidates(&self) -> Box<dyn Iterator<Item = String> + Send + '_>;
}

/// In-memory list of secrets
#[derive(Debug, Clone, Default)]
pub struct Wordlist(pub Vec<String>);

impl Wordlist {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(words.into_iter().map(Into::into).collect())
    }
}

impl SecretSource for Wordlist {
    fn candidates(&self) -> Box<dyn Iterator<Item = String> + Send + '_> {
        Box::new(self.0.iter().cloned())
    }
}

/// Text encoding of a wordlist file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Charset {
    #[default]
    #[serde(rename = "UTF-8", alias = "utf-8", alias = "utf8")]
    Utf8,
    #[serde(rename = "ISO-8859-1", alias = "iso-8859-1", alias = "latin1")]
    Latin1,
    #[serde(rename = "US-ASCII", alias = "us-ascii", alias = "ascii")]
    Ascii,
}

impl Charset {
    /// Malformed input becomes U+FFFD rather than ending the wordlist
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Charset::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Charset::Latin1 => bytes.iter().map(|&b| b as char).collect(),
            Charset::Ascii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { b as char } else { char::REPLACEMENT_CHARACTER })
                .collect(),
        }
    }
}

impl std::str::FromStr for Charset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Charset::Utf8),
            "iso-8859-1" | "latin1" => Ok(Charset::Latin1),
            "us-ascii" | "ascii" => Ok(Charset::Ascii),
            other => Err(format!("unsupported wordlist charset: {}", other)),
        }
    }
}

/// A wordlist file, one candidate per line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WordlistFile {
    pub path: PathBuf,
    pub charset: Charset,
    /// Lines starting with this token are skipped
    pub comment_token: Option<String>,
    pub ignore_first_line: bool,
    pub ignore_trimmed_empty_lines: bool,
    /// Maximum number of candidates, 0 for no limit
    pub limit: usize,
}

impl Default for WordlistFile {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            charset: Charset::Utf8,
            comment_token: None,
            ignore_first_line: false,
            ignore_trimmed_empty_lines: true,
            limit: 0,
        }
    }
}

impl WordlistFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    fn keep(&self, line: &str) -> bool {
        if self.ignore_trimmed_empty_lines && line.trim().is_empty() {
            return false;
        }
        match &self.comment_token {
            Some(token) if !token.is_empty() => !line.starts_with(token.as_str()),
            _ => true,
        }
    }
}

impl SecretSource for WordlistFile {
    fn candidates(&self) -> Box<dyn Iterator<Item = String> + Send + '_> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) => {
                warn!("[JWT] unable to open wordlist {}: {}", self.path.display(), e);
                return Box::new(std::iter::empty());
            }
        };

        let path = self.path.display().to_string();
        let charset = self.charset;
        let lines = BufReader::new(file)
            .split(b'\n')
            .map_while(move |line| match line {
                Ok(mut bytes) => {
                    if bytes.last() == Some(&b'\r') {
                        bytes.pop();
                    }
                    Some(charset.decode(&bytes))
                }
                Err(e) => {
                    warn!("[JWT] stopped reading wordlist {}: {}", path, e);
                    None
                }
            })
            .skip(usize::from(self.ignore_first_line))
            .filter(move |line| self.keep(line));

        if self.limit > 0 {
            Box::new(lines.take(self.limit))
        } else {
            Box::new(lines)
        }
    }
}
