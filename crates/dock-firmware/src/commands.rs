//! Inbound command handling.
//!
//! [`CommandAuthority`] turns `(topic, payload)` pairs from the transport into
//! lifecycle requests. It routes the topic to a category, parses the payload
//! against that category's vocabulary and checks the command's precondition
//! before asking the lifecycle for the transition.
//!
//! Commands are not authenticated: anything that can publish on a command
//! topic can drive the station.

use dock_core::{CommandEnvelope, DeviceState, LogDestination, LogSeverity, Millis};
use dock_hardware::Transport;
use dock_protocol::{Command, CommandCategory, ProtocolError, TopicSet};
use dock_telemetry::TelemetryBuffer;
use serde::Serialize;
use tracing::debug;

use crate::lifecycle::{DeviceLifecycle, StateTransition, TransitionCause};

/// Result of handling one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// No command route matches the topic. Dropped.
    UnknownTopic { topic: String },
    /// The payload is not part of the category's vocabulary.
    UnknownPayload {
        category: CommandCategory,
        payload: String,
    },
    /// Recognised but not allowed from the current state.
    Refused {
        command: Command,
        current: DeviceState,
    },
    /// Transition applied. `confirmed` is false if the confirmation publish
    /// failed.
    Applied {
        command: Command,
        transition: StateTransition,
        confirmed: bool,
    },
    /// Status request answered with the current state.
    StatusReported { state: DeviceState, published: bool },
}

impl CommandOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, CommandOutcome::Applied { .. })
    }
}

/// Counters over everything the authority has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CommandStats {
    pub applied: u64,
    pub refused: u64,
    pub unknown: u64,
    pub status_requests: u64,
}

/// Validates inbound commands and applies accepted ones.
#[derive(Debug, Clone)]
pub struct CommandAuthority {
    topics: TopicSet,
    stats: CommandStats,
}

impl CommandAuthority {
    pub fn new(topics: TopicSet) -> Self {
        Self {
            topics,
            stats: CommandStats::default(),
        }
    }

    /// Handle one inbound message.
    pub async fn handle<T: Transport>(
        &mut self,
        envelope: &CommandEnvelope,
        lifecycle: &mut DeviceLifecycle,
        telemetry: &mut TelemetryBuffer,
        transport: &mut T,
        now: Millis,
    ) -> CommandOutcome {
        let payload = envelope.payload.as_str();
        let command = match self
            .topics
            .try_route(&envelope.topic)
            .and_then(|category| Command::parse(category, payload))
        {
            Ok(command) => command,
            Err(ProtocolError::UnknownTopic(topic)) => {
                telemetry.log(
                    LogSeverity::Warning,
                    LogDestination::Both,
                    format!(
                        "Dropped message on unhandled topic {topic} in state {}",
                        lifecycle.state()
                    ),
                    now,
                );
                self.stats.unknown += 1;
                return CommandOutcome::UnknownTopic { topic };
            }
            Err(ProtocolError::UnknownPayload { category, payload }) => {
                telemetry.log(
                    LogSeverity::Error,
                    LogDestination::Both,
                    format!("Unknown {category} command: {payload}"),
                    now,
                );
                self.stats.unknown += 1;
                return CommandOutcome::UnknownPayload { category, payload };
            }
        };

        let current = lifecycle.state();
        debug!(%command, %current, "Command received");

        if command == Command::StatusRequest {
            return self.report_status(current, telemetry, transport, now).await;
        }

        let transition = match command.target() {
            Some(target) if command.permits(current) => {
                lifecycle.change_state(target, TransitionCause::Command, now).ok()
            }
            _ => None,
        };
        let Some(transition) = transition else {
            telemetry.log(
                LogSeverity::Warning,
                LogDestination::Both,
                format!("Command {command} refused in state {current}"),
                now,
            );
            self.stats.refused += 1;
            return CommandOutcome::Refused { command, current };
        };

        self.stats.applied += 1;
        telemetry.log(
            LogSeverity::Info,
            LogDestination::Both,
            format!(
                "Command {command} accepted: {} -> {}",
                transition.from, transition.to
            ),
            now,
        );

        let confirmed = match command.confirmation() {
            Some(confirmation) => {
                let topic = self.topics.confirmation(command.category());
                match transport.publish(&topic, confirmation, false).await {
                    Ok(()) => true,
                    Err(e) => {
                        telemetry.log(
                            LogSeverity::Warning,
                            LogDestination::Both,
                            format!(
                                "Confirmation {confirmation} on {topic} failed ({} -> {}): {e}",
                                transition.from, transition.to
                            ),
                            now,
                        );
                        false
                    }
                }
            }
            None => false,
        };

        CommandOutcome::Applied {
            command,
            transition,
            confirmed,
        }
    }

    async fn report_status<T: Transport>(
        &mut self,
        state: DeviceState,
        telemetry: &mut TelemetryBuffer,
        transport: &mut T,
        now: Millis,
    ) -> CommandOutcome {
        self.stats.status_requests += 1;
        let published = match transport
            .publish(self.topics.status(), state.as_str(), true)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                telemetry.log(
                    LogSeverity::Warning,
                    LogDestination::Both,
                    format!(
                        "Status request for {state} not answered on {}: {e}",
                        self.topics.status()
                    ),
                    now,
                );
                false
            }
        };
        CommandOutcome::StatusReported { state, published }
    }

    pub fn topics(&self) -> &TopicSet {
        &self.topics
    }

    pub fn stats(&self) -> CommandStats {
        self.stats
    }
}
