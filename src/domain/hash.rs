use crate::domain::PageContent;
use derive_more::derive::Display;
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_128;

const HASH_LEN: usize = 32;

/// 128-bit xxh3 digest of a version's ordered contents, as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(try_from = "String", into = "String")]
#[display("{}", _0)]
pub struct ContentHash(String);

#[derive(Serialize)]
struct CanonicalBlock<'a> {
    id: String,
    markup: &'a str,
    assets: &'a [String],
}

impl ContentHash {
    pub fn compute(contents: &[PageContent]) -> Self {
        // field order is fixed by the struct, so the encoding is canonical
        let blocks: Vec<CanonicalBlock> = contents
            .iter()
            .map(|content| CanonicalBlock {
                id: content.id.hyphenated().to_string(),
                markup: &content.markup,
                assets: &content.assets,
            })
            .collect();

        let encoded = serde_json::to_vec(&blocks).unwrap_or_default();

        Self(format!("{:032x}", xxh3_128(&encoded)))
    }

    /// Accepts exactly 32 hex characters, normalized to lowercase.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() != HASH_LEN || !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(raw.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ContentHash {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid content hash '{}'", value))
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}
