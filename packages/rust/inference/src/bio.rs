//! BIO tag decoding.
//!
//! The NER model labels every token with `B-<TYPE>` (first token of an
//! entity), `I-<TYPE>` (continuation) or `O` (outside any entity). Decoding
//! turns that token stream into the distinct person, location and
//! organization names it mentions.

use std::collections::HashSet;
use std::fmt;

use serde::Deserialize;

use newsreader_shared::{NewsReaderError, Result};

/// One labelled token as returned by the model server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PredictionToken {
    #[serde(default)]
    pub token: String,
    #[serde(rename = "pred", default)]
    pub label: String,
}

impl PredictionToken {
    pub fn new(token: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            label: label.into(),
        }
    }
}

/// Entity types the decoder keeps. Every other type is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Person,
    Location,
    Organization,
}

impl EntityKind {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Person => "PER",
            Self::Location => "LOC",
            Self::Organization => "ORG",
        }
    }

    fn from_begin_label(label: &str) -> Option<Self> {
        match label {
            "B-PER" => Some(Self::Person),
            "B-LOC" => Some(Self::Location),
            "B-ORG" => Some(Self::Organization),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Decoded entity names, each list in first-appearance order without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entities {
    pub pers: Vec<String>,
    pub locs: Vec<String>,
    pub orgs: Vec<String>,
}

/// Assemble the entity starting at `tokens[0]`.
///
/// The first token must carry `B-<kind>`; following `I-<kind>` tokens are
/// appended, separated by one space, up to the first token with any other label.
pub fn span(tokens: &[PredictionToken], kind: EntityKind) -> Result<String> {
    let Some((first, rest)) = tokens.split_first() else {
        return Err(NewsReaderError::decode("len must be > 0"));
    };

    let tag = kind.tag();
    if first.label.strip_prefix("B-") != Some(tag) {
        return Err(NewsReaderError::decode(format!(
            "does not start with B-{tag}, got={}",
            first.label
        )));
    }

    let mut parts = vec![first.token.as_str()];
    parts.extend(
        rest.iter()
            .take_while(|t| t.label.strip_prefix("I-") == Some(tag))
            .map(|t| t.token.as_str()),
    );
    Ok(parts.join(" "))
}

/// Decode a labelled token stream.
///
/// `O` and continuation tokens never start an entity; a continuation without
/// its `B-` token is dropped. Unknown labels are ignored.
pub fn decode(tokens: &[PredictionToken]) -> Entities {
    let mut entities = Entities::default();

    for (i, token) in tokens.iter().enumerate() {
        if token.label == "O" || token.label.starts_with('I') {
            continue;
        }
        let Some(kind) = EntityKind::from_begin_label(&token.label) else {
            continue;
        };
        // Cannot fail: tokens[i] carries B-<kind>.
        let Ok(name) = span(&tokens[i..], kind) else {
            continue;
        };
        match kind {
            EntityKind::Person => entities.pers.push(name),
            EntityKind::Location => entities.locs.push(name),
            EntityKind::Organization => entities.orgs.push(name),
        }
    }

    Entities {
        pers: remove_duplicates(entities.pers),
        locs: remove_duplicates(entities.locs),
        orgs: remove_duplicates(entities.orgs),
    }
}

/// Keep the first occurrence of every name.
pub fn remove_duplicates(names: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(names.len());
    names
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect()
}
