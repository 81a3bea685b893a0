//! Topic layout of one station.
//!
//! Every topic lives under a configurable prefix (default `esp`):
//!
//! ```text
//! <prefix>/commands/<category>             shared command topic
//! <prefix>/commands/<category>/<device>    per-device command topic
//! <prefix>/commands[/<device>]             aliases of the state category
//! <prefix>/status/<device>                 retained lifecycle state
//! <prefix>/logs/<device>                   telemetry lines
//! <prefix>/events/<category>/<device>      command confirmations
//! <prefix>/maintenance/status/<device>     maintenance progress
//! ```

use crate::commands::CommandCategory;
use crate::error::{ProtocolError, Result};
use dock_core::DeviceId;

/// Precomputed topics for one device.
///
/// # Examples
///
/// ```
/// use dock_core::DeviceId;
/// use dock_protocol::{CommandCategory, TopicSet};
///
/// let device = DeviceId::new("a4cf12b3c9d0").unwrap();
/// let topics = TopicSet::new("esp", &device);
///
/// assert_eq!(topics.status(), "esp/status/a4cf12b3c9d0");
/// assert_eq!(topics.route("esp/commands/booking"), Some(CommandCategory::Booking));
/// assert_eq!(topics.route("esp/commands/a4cf12b3c9d0"), Some(CommandCategory::State));
/// assert_eq!(topics.route("esp/commands/booking/other-device"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSet {
    prefix: String,
    device: String,
    routes: Vec<(String, CommandCategory)>,
    status: String,
    logs: String,
    maintenance_status: String,
}

impl TopicSet {
    pub fn new(prefix: &str, device: &DeviceId) -> Self {
        let prefix = prefix.trim_matches('/').to_string();
        let device = device.as_str().to_string();

        let mut topics = Self {
            status: format!("{prefix}/status/{device}"),
            logs: format!("{prefix}/logs/{device}"),
            maintenance_status: format!("{prefix}/maintenance/status/{device}"),
            routes: Vec::with_capacity(CommandCategory::ALL.len() * 2 + 2),
            prefix,
            device,
        };

        for category in CommandCategory::ALL {
            let own = topics.device_command(category);
            let shared = topics.shared_command(category);
            topics.routes.push((own, category));
            topics.routes.push((shared, category));
        }
        let bare = format!("{}/commands", topics.prefix);
        let own = format!("{bare}/{}", topics.device);
        topics.routes.push((bare, CommandCategory::State));
        topics.routes.push((own, CommandCategory::State));
        topics
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Category of an inbound topic, or `None` if it is not one of ours.
    pub fn route(&self, topic: &str) -> Option<CommandCategory> {
        self.routes
            .iter()
            .find(|(candidate, _)| candidate == topic)
            .map(|(_, category)| *category)
    }

    /// Like [`TopicSet::route`], as a `Result`.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::UnknownTopic` for unmatched topics.
    pub fn try_route(&self, topic: &str) -> Result<CommandCategory> {
        self.route(topic)
            .ok_or_else(|| ProtocolError::UnknownTopic(topic.to_string()))
    }

    /// Every inbound topic to subscribe to.
    pub fn command_topics(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|(topic, _)| topic.as_str())
    }

    pub fn shared_command(&self, category: CommandCategory) -> String {
        format!("{}/commands/{}", self.prefix, category)
    }

    pub fn device_command(&self, category: CommandCategory) -> String {
        format!("{}/commands/{}/{}", self.prefix, category, self.device)
    }

    /// Retained lifecycle status.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Remote telemetry lines.
    pub fn logs(&self) -> &str {
        &self.logs
    }

    pub fn maintenance_status(&self) -> &str {
        &self.maintenance_status
    }

    /// Confirmation topic for a category.
    ///
    /// Maintenance confirmations go to [`TopicSet::maintenance_status`] and
    /// status requests answer on [`TopicSet::status`].
    pub fn confirmation(&self, category: CommandCategory) -> String {
        match category {
            CommandCategory::Maintenance => self.maintenance_status.clone(),
            CommandCategory::Status => self.status.clone(),
            _ => format!("{}/events/{}/{}", self.prefix, category, self.device),
        }
    }
}
