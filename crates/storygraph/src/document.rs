use crate::Link;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const PLACEHOLDER_STORY_NAME: &str = "Untitled story";

/// Interchange document as received. Nothing about its shape is trusted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UntrustedDocument {
    pub name: Option<Value>,
    pub description: Option<Value>,
    pub tags: Option<Value>,
    pub startnode: Option<Value>,
    pub passages: Option<Value>,
}

impl UntrustedDocument {
    pub fn from_value(value: &Value) -> Self {
        let Value::Object(map) = value else {
            return Self::default();
        };
        Self {
            name: present(map, "name"),
            description: present(map, "description"),
            tags: present(map, "tags"),
            startnode: present(map, "startnode"),
            passages: present(map, "passages"),
        }
    }

    /// Passage entries in source order. A non-array `passages` field yields no entries.
    pub fn entries(&self) -> Vec<UntrustedEntry> {
        match &self.passages {
            Some(Value::Array(items)) => items.iter().map(UntrustedEntry::from_value).collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum UntrustedEntry {
    Record(UntrustedPassage),
    Malformed(Value),
}

impl UntrustedEntry {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self::Record(UntrustedPassage {
                pid: present(map, "pid"),
                name: present(map, "name"),
                text: present(map, "text"),
                tags: present(map, "tags"),
                links: present(map, "links"),
                position: present(map, "position"),
                metadata: present(map, "metadata"),
                raw: value.clone(),
            }),
            other => Self::Malformed(other.clone()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UntrustedPassage {
    pub pid: Option<Value>,
    pub name: Option<Value>,
    pub text: Option<Value>,
    pub tags: Option<Value>,
    pub links: Option<Value>,
    pub position: Option<Value>,
    pub metadata: Option<Value>,
    pub raw: Value,
}

fn present(map: &Map<String, Value>, key: &str) -> Option<Value> {
    map.get(key).filter(|value| !value.is_null()).cloned()
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A passage after repair: unique name, list-typed tags and links, numeric id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub pid: u64,
    pub name: String,
    pub text: String,
    pub tags: Vec<String>,
    pub links: Vec<Link>,
    pub position: Option<Position>,
    pub metadata: Option<Map<String, Value>>,
    /// The entry exactly as it arrived, kept for audit.
    pub source: Value,
}

impl Passage {
    pub fn new(pid: u64, name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            pid,
            name: name.into(),
            text: text.into(),
            tags: Vec::new(),
            links: Vec::new(),
            position: None,
            metadata: None,
            source: Value::Null,
        }
    }

    pub fn with_links(mut self, links: Vec<Link>) -> Self {
        self.links = links;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoryDocument {
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub start_node: u64,
    pub passages: Vec<Passage>,
}

impl StoryDocument {
    pub fn new(name: impl Into<String>, passages: Vec<Passage>) -> Self {
        let start_node = passages.first().map(|p| p.pid).unwrap_or(1);
        Self {
            name: name.into(),
            description: None,
            tags: Vec::new(),
            start_node,
            passages,
        }
    }

    pub fn passage(&self, name: &str) -> Option<&Passage> {
        self.passages.iter().find(|p| p.name == name)
    }

    pub fn start_passage(&self) -> Option<&Passage> {
        self.passages.iter().find(|p| p.pid == self.start_node)
    }
}
