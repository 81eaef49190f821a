// Feed side of the pipeline: identities, wire schemas, classification, sockets
pub mod classifier;     // RawPayload -> ClassifiedEvent
pub mod connection;     // one socket lifecycle for one feed
pub mod connector;      // transport seam (tungstenite in prod, mock in tests)
pub mod wire;           // serde shapes of both feeds

use std::fmt;

/// A decoded feed frame. Created per message and consumed by the classifier.
pub type RawPayload = serde_json::Value;

/// Which of the two external feeds a connection, payload or notice belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedIdentity {
    /// JMA earthquake early warnings (wolfx).
    PrimaryEew,
    /// Intensity / hypocenter bulletins (P2PQuake).
    SecondaryQuake,
}

impl FeedIdentity {
    pub const ALL: [FeedIdentity; 2] = [FeedIdentity::PrimaryEew, FeedIdentity::SecondaryQuake];

    /// Short label used in lifecycle notices and metric labels.
    pub fn label(&self) -> &'static str {
        match self {
            FeedIdentity::PrimaryEew => "EEW",
            FeedIdentity::SecondaryQuake => "P2P",
        }
    }
}

impl fmt::Display for FeedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
