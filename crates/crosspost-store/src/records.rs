//! Shared record types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A post to be published to one or more destinations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Unique, stable identifier; doubles as the scheduler job id.
    pub id: Uuid,
    /// Post body text.
    pub text: String,
    /// When to publish. `None` means publish immediately.
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Repeat policy after the first publication.
    pub repeat: Repeat,
    /// If true the post is published at creation and never registered
    /// with the scheduler; `scheduled_at` is ignored.
    pub immediate: bool,
    /// Destinations to fan out to. Must be non-empty before scheduling.
    pub destinations: Vec<Destination>,
    /// Optional media attachment reference.
    pub attachment: Option<Asset>,
    /// When this record was created.
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Create a new post with a fresh id.
    pub fn new(text: impl Into<String>, destinations: Vec<Destination>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            scheduled_at: None,
            repeat: Repeat::None,
            immediate: false,
            destinations,
            attachment: None,
            created_at: Utc::now(),
        }
    }

    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }

    pub fn repeating(mut self, repeat: Repeat) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    pub fn with_attachment(mut self, attachment: Asset) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

/// How a post repeats after its first publication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Repeat {
    /// Publish once, never again.
    #[default]
    None,
    /// Same wall-clock time every day.
    Daily,
    /// Same weekday and time every week.
    Weekly,
    /// Same day-of-month and time every month (day clamped to 28).
    Monthly,
    /// Fixed number of seconds between publications.
    Every { seconds: u64 },
}

impl Repeat {
    /// Whether this policy produces more than one occurrence.
    pub fn is_recurring(&self) -> bool {
        !matches!(self, Repeat::None)
    }
}

/// A publishing destination.
///
/// Adding a destination means adding one variant here plus one
/// constructor arm in the destination registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    X,
    Instagram,
    Bluesky,
}

impl Destination {
    /// All known destinations.
    pub const ALL: [Destination; 3] = [Destination::X, Destination::Instagram, Destination::Bluesky];
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Destination::X => "x",
            Destination::Instagram => "instagram",
            Destination::Bluesky => "bluesky",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Destination {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x" => Ok(Destination::X),
            "instagram" => Ok(Destination::Instagram),
            "bluesky" => Ok(Destination::Bluesky),
            other => Err(format!("unknown destination: {}", other)),
        }
    }
}

/// Reference to a media object owned by the object store.
///
/// The bytes themselves live in the object store; this record only
/// identifies them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Object store bucket.
    pub bucket: String,
    /// Object key within the bucket.
    pub key: String,
    /// Original file name, used as upload name and alt text fallback.
    pub file_name: String,
    /// MIME type of the content.
    pub mime_type: String,
}

/// Credentials for a single destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    X {
        consumer_key: String,
        consumer_secret: String,
        access_token: String,
        access_secret: String,
        bearer_token: String,
    },
    Instagram {
        username: String,
        password: String,
    },
    Bluesky {
        handle: String,
        app_password: String,
    },
}

impl Credentials {
    /// The destination these credentials belong to.
    pub fn destination(&self) -> Destination {
        match self {
            Credentials::X { .. } => Destination::X,
            Credentials::Instagram { .. } => Destination::Instagram,
            Credentials::Bluesky { .. } => Destination::Bluesky,
        }
    }
}
