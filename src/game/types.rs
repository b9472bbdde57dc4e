use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)] // Platform ids travel as plain strings
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a posted prompt (join message, vote prompt, prediction prompt).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptId(Uuid);

impl PromptId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PromptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PromptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Whatever the platform needs to reach a user privately (a mention, a DM handle).
/// The session only stores and forwards it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserHandle(String);

impl UserHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colour {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
}

impl Colour {
    pub const ALL: [Colour; 6] = [
        Colour::Red,
        Colour::Orange,
        Colour::Yellow,
        Colour::Green,
        Colour::Blue,
        Colour::Purple,
    ];

    pub fn emoji(self) -> &'static str {
        match self {
            Colour::Red => "🔴",
            Colour::Orange => "🟠",
            Colour::Yellow => "🟡",
            Colour::Green => "🟢",
            Colour::Blue => "🔵",
            Colour::Purple => "🟣",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Colour::Red => "red",
            Colour::Orange => "orange",
            Colour::Yellow => "yellow",
            Colour::Green => "green",
            Colour::Blue => "blue",
            Colour::Purple => "purple",
        }
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.emoji())
    }
}

impl FromStr for Colour {
    type Err = ParseTokenError;

    /// Accepts either the colour name (any case) or its emoji token.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        Colour::ALL
            .into_iter()
            .find(|c| c.emoji() == token || c.name().eq_ignore_ascii_case(token))
            .ok_or_else(|| ParseTokenError::Colour(token.to_string()))
    }
}

/// A player's share of the votes in a round. Used both for the prediction a
/// player makes about themselves and for the result computed at tally time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Standing {
    #[default]
    Unset,
    Most,
    Some,
    #[serde(rename = "none")]
    NoVotes,
}

impl Standing {
    pub fn emoji(self) -> &'static str {
        match self {
            Standing::Most => "💕",
            Standing::Some => "💓",
            Standing::NoVotes => "💔",
            Standing::Unset => "",
        }
    }

    /// Points awarded when a prediction of this standing turns out right.
    pub fn reward(self) -> u32 {
        match self {
            Standing::Some => 1,
            Standing::Most | Standing::NoVotes => 3,
            Standing::Unset => 0,
        }
    }
}

impl fmt::Display for Standing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Standing::Unset => "UNSET",
            Standing::Most => "MOST",
            Standing::Some => "SOME",
            Standing::NoVotes => "NONE",
        };
        f.write_str(label)
    }
}

impl FromStr for Standing {
    type Err = ParseTokenError;

    /// Parses a prediction. `unset` is not something a player can choose.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "most" | "💕" => Ok(Standing::Most),
            "some" | "💓" => Ok(Standing::Some),
            "none" | "💔" => Ok(Standing::NoVotes),
            other => Err(ParseTokenError::Prediction(other.to_string())),
        }
    }
}

/// Which control a vote prompt refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteSlot {
    Lock = 0,
    First = 1,
    Second = 2,
}

/// How the per-round wait condition was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundCompletion {
    AllLocked,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseTokenError {
    #[error("'{0}' is not a colour")]
    Colour(String),
    #[error("'{0}' is not a prediction (expected most, some or none)")]
    Prediction(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("Vote is already locked")]
    VoteLocked,
    #[error("Vote was already locked")]
    AlreadyLocked,
    #[error("Skip was already requested")]
    AlreadySkipped,
    #[error("Player {0} is not in this game")]
    UnknownPlayer(PlayerId),
    #[error("The lock control does not take a colour")]
    NotABallot,
    #[error("Question bank is exhausted")]
    QuestionBankExhausted,
}
