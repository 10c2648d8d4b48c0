use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{value} is not a valid {kind}")]
pub struct ParseError {
    kind: &'static str,
    value: String,
}

/// The lifecycle of a room. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Created,
    Live,
    Ended,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Live => "live",
            Self::Ended => "ended",
        }
    }

    /// Returns true if a room in this status may move to `next`
    pub fn can_transition_to(&self, next: RoomStatus) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Live) | (Self::Created, Self::Ended) | (Self::Live, Self::Ended)
        )
    }
}

impl Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoomStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "live" => Ok(Self::Live),
            "ended" => Ok(Self::Ended),
            other => Err(ParseError {
                kind: "room status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Host,
    Viewer,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Viewer => "viewer",
        }
    }
}

impl Display for ParticipantRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParticipantRole {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "host" => Ok(Self::Host),
            "viewer" => Ok(Self::Viewer),
            other => Err(ParseError {
                kind: "participant role",
                value: other.to_string(),
            }),
        }
    }
}

/// The mutations a room accepts through its update endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomAction {
    StartStream,
    EndStream,
    JoinViewer,
    LeaveViewer,
}

impl RoomAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartStream => "start_stream",
            Self::EndStream => "end_stream",
            Self::JoinViewer => "join_viewer",
            Self::LeaveViewer => "leave_viewer",
        }
    }
}

impl Display for RoomAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoomAction {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start_stream" => Ok(Self::StartStream),
            "end_stream" => Ok(Self::EndStream),
            "join_viewer" => Ok(Self::JoinViewer),
            "leave_viewer" => Ok(Self::LeaveViewer),
            other => Err(ParseError {
                kind: "room action",
                value: other.to_string(),
            }),
        }
    }
}

/// Someone shown in a room's viewer list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    pub user_id: String,
    pub user_name: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_status_transitions() {
        use RoomStatus::*;

        assert!(Created.can_transition_to(Live));
        assert!(Created.can_transition_to(Ended));
        assert!(Live.can_transition_to(Ended));

        assert!(!Live.can_transition_to(Live));
        assert!(!Live.can_transition_to(Created));
        assert!(!Ended.can_transition_to(Live));
        assert!(!Ended.can_transition_to(Ended));
    }

    #[test]
    fn test_parse_action() {
        assert_eq!(
            "join_viewer".parse::<RoomAction>().unwrap(),
            RoomAction::JoinViewer
        );
        assert!("dance".parse::<RoomAction>().is_err());
        assert_eq!(RoomStatus::Live.to_string(), "live");
    }
}
