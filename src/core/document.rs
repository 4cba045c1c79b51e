use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::types::ColumnValueSet;

/// Body of one fetched document. Text is always UTF-8; bytes are kept only
/// for archives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Body {
    Text(String),
    #[serde(serialize_with = "to_hex", deserialize_with = "from_hex")]
    Binary(Vec<u8>),
}

impl Body {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(text) => Some(text),
            Body::Binary(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Body::Text(text) => text.as_bytes(),
            Body::Binary(bytes) => bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().iter().all(u8::is_ascii_whitespace)
    }
}

fn to_hex<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}

fn from_hex<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let text = String::deserialize(deserializer)?;
    hex::decode(text).map_err(serde::de::Error::custom)
}

/// One fetched document with the metadata parsers use for detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// File name or URL path, used for extension matching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub body: Body,
}

impl Document {
    pub fn text(name: Option<String>, text: impl Into<String>) -> Self {
        Self {
            name,
            content_type: None,
            body: Body::Text(text.into()),
        }
    }

    pub fn binary(name: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            name,
            content_type: None,
            body: Body::Binary(bytes),
        }
    }

    /// Lower-cased extension of the document name, `tar.gz` included.
    pub fn extension(&self) -> Option<String> {
        let name = self.name.as_deref()?;
        let name = name.split(['?', '#']).next().unwrap_or(name);
        let file = name.rsplit(['/', '\\']).next().unwrap_or(name).to_lowercase();
        if file.ends_with(".tar.gz") {
            return Some("tar.gz".to_string());
        }
        let (_, ext) = file.rsplit_once('.')?;
        (!ext.is_empty()).then(|| ext.to_string())
    }
}

/// Result of one fetch executor call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// A single text or binary document to be parsed.
    Document(Document),
    /// Several documents, parsed one by one with `__file` provenance.
    Files { documents: Vec<Document> },
    /// Already columnar data (databases, LDAP).
    Records { values: ColumnValueSet },
}

#[cfg(test)]
mod tests;
