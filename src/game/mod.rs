pub mod domain;
pub mod picker;
pub mod signal;
pub mod types;


pub use domain::{GameSession, Player};
pub use types::{ChannelId, Colour, GameError, PlayerId, PromptId, RoundCompletion, Standing, UserHandle, VoteSlot};
