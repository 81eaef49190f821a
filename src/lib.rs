//! quake-relay
//!
//! Ingests two earthquake feeds (JMA EEW via wolfx, P2PQuake bulletins),
//! classifies each message, renders a Japanese bulletin and hands it to a
//! [`sink::NotificationSink`]. Both sockets are kept alive by the
//! [`supervisor::ConnectionSupervisor`] with a fixed-delay reconnect.

pub mod bulletin;
pub mod config;
pub mod error;
pub mod feeds;
pub mod sink;
pub mod supervisor;
pub mod telemetry;

pub use bulletin::ClassifiedEvent;
pub use config::Settings;
pub use feeds::connector::{Connector, TungsteniteConnector};
pub use feeds::FeedIdentity;
pub use sink::{ChannelSink, Notice, NoticeKind, NotificationSink, StdoutSink};
pub use supervisor::{ConnectionState, ConnectionSupervisor};
