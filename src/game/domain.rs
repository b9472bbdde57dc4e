use std::collections::{HashMap, HashSet};

use super::picker::QuestionPicker;
use super::signal::{RoundSignal, RoundWaiter};
use super::types::{
    ChannelId, Colour, GameError, PlayerId, PromptId, RoundCompletion, Standing, UserHandle, VoteSlot,
};

#[derive(Debug, Clone)]
pub struct Player {
    pub display_name: String,
    pub colour: Colour,
    pub user_handle: UserHandle,
    pub points: u32,
    pub vote_locked: bool,
    pub vote1: Option<Colour>,
    pub vote2: Option<Colour>,
    pub prediction: Standing,
    pub votes_received: u32,
    pub round_result: Standing,
}

impl Player {
    fn new(display_name: String, colour: Colour, user_handle: UserHandle) -> Self {
        Self {
            display_name,
            colour,
            user_handle,
            points: 0,
            vote_locked: false,
            vote1: None,
            vote2: None,
            prediction: Standing::Unset,
            votes_received: 0,
            round_result: Standing::Unset,
        }
    }

    fn clear_round(&mut self) {
        self.vote_locked = false;
        self.vote1 = None;
        self.vote2 = None;
        self.prediction = Standing::Unset;
        self.votes_received = 0;
        self.round_result = Standing::Unset;
    }
}

/// All state for the game running in one channel.
///
/// Rounds go collecting -> locked -> tallied -> scored. The ordering is the
/// caller's job: `tally_votes`, `determine_round_result` and `assign_points`
/// must run in that order after the round signal resolves.
#[derive(Debug)]
pub struct GameSession {
    channel_id: ChannelId,
    join_prompt_id: PromptId,
    prediction_prompt_id: Option<PromptId>,
    vote_correlation: HashMap<PromptId, (VoteSlot, PlayerId)>,
    remaining_questions: Vec<String>,
    asked_questions: Vec<String>,
    current_question: Option<String>,
    colour_to_player: HashMap<Colour, PlayerId>,
    players: HashMap<PlayerId, Player>,
    join_order: Vec<PlayerId>,
    skippers: HashSet<PlayerId>,
    round_signal: RoundSignal,
}

impl GameSession {
    #[tracing::instrument(skip(questions), fields(bank_size = questions.len()))]
    pub fn new(channel_id: ChannelId, join_prompt_id: PromptId, questions: Vec<String>) -> Self {
        Self {
            channel_id,
            join_prompt_id,
            prediction_prompt_id: None,
            vote_correlation: HashMap::new(),
            remaining_questions: questions,
            asked_questions: Vec::new(),
            current_question: None,
            colour_to_player: HashMap::new(),
            players: HashMap::new(),
            join_order: Vec::new(),
            skippers: HashSet::new(),
            round_signal: RoundSignal::new(),
        }
    }

    // Getters
    pub fn get_channel_id(&self) -> &ChannelId {
        &self.channel_id
    }

    pub fn get_join_prompt_id(&self) -> PromptId {
        self.join_prompt_id
    }

    pub fn get_prediction_prompt_id(&self) -> Option<PromptId> {
        self.prediction_prompt_id
    }

    pub fn get_vote_correlation(&self) -> &HashMap<PromptId, (VoteSlot, PlayerId)> {
        &self.vote_correlation
    }

    pub fn get_current_question(&self) -> Option<&str> {
        self.current_question.as_deref()
    }

    pub fn get_remaining_questions(&self) -> &[String] {
        &self.remaining_questions
    }

    pub fn get_asked_questions(&self) -> &[String] {
        &self.asked_questions
    }

    pub fn get_colour_to_player(&self) -> &HashMap<Colour, PlayerId> {
        &self.colour_to_player
    }

    pub fn get_player(&self, player_id: &PlayerId) -> Option<&Player> {
        self.players.get(player_id)
    }

    /// Players in join order.
    pub fn get_players(&self) -> impl Iterator<Item = (&PlayerId, &Player)> {
        self.join_order
            .iter()
            .filter_map(|id| self.players.get(id).map(|player| (id, player)))
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn skipper_count(&self) -> usize {
        self.skippers.len()
    }

    pub fn has_player(&self, player_id: &PlayerId) -> bool {
        self.players.contains_key(player_id)
    }

    pub fn is_colour_taken(&self, colour: Colour) -> bool {
        self.colour_to_player.contains_key(&colour)
    }

    pub fn get_prediction(&self, player_id: &PlayerId) -> Result<Standing, GameError> {
        Ok(self.player(player_id)?.prediction)
    }

    /// Waiter for the current round. Take it after `reset_round`.
    pub fn round_waiter(&self) -> RoundWaiter {
        self.round_signal.waiter()
    }

    pub fn round_completion(&self) -> Option<RoundCompletion> {
        self.round_signal.completion()
    }

    //  --- Players ---
    /// Callers must check that neither the player nor the colour is already
    /// registered; this overwrites silently.
    #[tracing::instrument(skip(self, user_handle), fields(channel_id = %self.channel_id))]
    pub fn add_player(&mut self, player_id: PlayerId, display_name: String, colour: Colour, user_handle: UserHandle) {
        if !self.players.contains_key(&player_id) {
            self.join_order.push(player_id.clone());
        }
        self.players
            .insert(player_id.clone(), Player::new(display_name, colour, user_handle));
        self.colour_to_player.insert(colour, player_id);
    }

    #[tracing::instrument(skip(self), fields(channel_id = %self.channel_id))]
    pub fn start_game(&mut self) {
        self.players.clear();
        self.join_order.clear();
        self.colour_to_player.clear();
        self.skippers.clear();
    }

    //  --- Prompts ---
    pub fn set_join_prompt(&mut self, prompt_id: PromptId) {
        self.join_prompt_id = prompt_id;
    }

    pub fn set_prediction_prompt(&mut self, prompt_id: PromptId) {
        self.prediction_prompt_id = Some(prompt_id);
    }

    pub fn register_vote_prompt(&mut self, prompt_id: PromptId, slot: VoteSlot, player_id: PlayerId) {
        self.vote_correlation.insert(prompt_id, (slot, player_id));
    }

    //  --- Round lifecycle ---
    #[tracing::instrument(skip(self), fields(channel_id = %self.channel_id))]
    pub fn reset_round(&mut self) {
        self.vote_correlation.clear();
        self.prediction_prompt_id = None;
        self.skippers.clear();
        self.round_signal.rearm();

        for player in self.players.values_mut() {
            player.clear_round();
        }
    }

    #[tracing::instrument(skip(self, picker), fields(channel_id = %self.channel_id))]
    pub fn pick_question(&mut self, picker: &mut impl QuestionPicker) -> Result<&str, GameError> {
        if self.remaining_questions.is_empty() {
            tracing::warn!("no questions left to ask");
            return Err(GameError::QuestionBankExhausted);
        }

        let index = picker.pick_index(self.remaining_questions.len());
        let question = self.remaining_questions.remove(index);
        self.asked_questions.push(question.clone());

        Ok(self.current_question.insert(question).as_str())
    }

    //  --- Voting ---
    #[tracing::instrument(skip(self), fields(channel_id = %self.channel_id))]
    pub fn add_vote(&mut self, player_id: &PlayerId, slot: VoteSlot, colour: Colour) -> Result<(), GameError> {
        let player = self.player_mut(player_id)?;
        if player.vote_locked {
            return Err(GameError::VoteLocked);
        }

        match slot {
            VoteSlot::First => player.vote1 = Some(colour),
            VoteSlot::Second => player.vote2 = Some(colour),
            VoteSlot::Lock => return Err(GameError::NotABallot),
        }
        Ok(())
    }

    /// Locks the player's votes. Fires the round signal when this was the last
    /// unlocked player.
    #[tracing::instrument(skip(self), fields(channel_id = %self.channel_id))]
    pub fn lock_vote(&mut self, player_id: &PlayerId) -> Result<(), GameError> {
        let player = self.player_mut(player_id)?;
        if player.vote_locked {
            return Err(GameError::AlreadyLocked);
        }
        player.vote_locked = true;

        if self.players.values().all(|p| p.vote_locked) {
            tracing::info!("all votes locked");
            self.round_signal.fire(RoundCompletion::AllLocked);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(channel_id = %self.channel_id))]
    pub fn add_prediction(&mut self, player_id: &PlayerId, prediction: Standing) -> Result<(), GameError> {
        let player = self.player_mut(player_id)?;
        if player.vote_locked {
            return Err(GameError::VoteLocked);
        }
        player.prediction = prediction;
        Ok(())
    }

    /// Records a request to skip the round. Once every player has asked, the
    /// round signal fires with [`RoundCompletion::Skipped`].
    #[tracing::instrument(skip(self), fields(channel_id = %self.channel_id))]
    pub fn add_skipper(&mut self, player_id: &PlayerId) -> Result<(), GameError> {
        self.player(player_id)?;
        if !self.skippers.insert(player_id.clone()) {
            return Err(GameError::AlreadySkipped);
        }

        if self.skippers.len() == self.players.len() {
            tracing::info!("every player asked to skip the round");
            self.round_signal.fire(RoundCompletion::Skipped);
        }
        Ok(())
    }

    /// Clears the ballots of every player who never locked, so they count
    /// as non-voters when the round is scored on timeout. Their prediction
    /// stands.
    #[tracing::instrument(skip(self), fields(channel_id = %self.channel_id))]
    pub fn discard_unlocked_votes(&mut self) {
        for player in self.players.values_mut().filter(|p| !p.vote_locked) {
            player.vote1 = None;
            player.vote2 = None;
        }
    }

    //  --- Tally & scoring ---
    /// Votes naming a colour nobody holds (or never cast) are skipped.
    #[tracing::instrument(skip(self), fields(channel_id = %self.channel_id))]
    pub fn tally_votes(&mut self) {
        let targets: Vec<PlayerId> = self
            .players
            .values()
            .flat_map(|player| [player.vote1, player.vote2])
            .flatten()
            .filter_map(|colour| self.colour_to_player.get(&colour).cloned())
            .collect();

        for target in targets {
            if let Some(player) = self.players.get_mut(&target) {
                player.votes_received += 1;
            }
        }
    }

    /// Several players can share `Most` when they tie on the top count.
    #[tracing::instrument(skip(self), fields(channel_id = %self.channel_id))]
    pub fn determine_round_result(&mut self) {
        let max_votes = self.players.values().map(|p| p.votes_received).max().unwrap_or(0);

        for player in self.players.values_mut() {
            player.round_result = if player.votes_received == 0 {
                Standing::NoVotes
            } else if player.votes_received == max_votes {
                Standing::Most
            } else {
                Standing::Some
            };
        }
    }

    /// Adds each player's reward for a correct prediction and returns the
    /// points awarded this round, in join order.
    #[tracing::instrument(skip(self), fields(channel_id = %self.channel_id))]
    pub fn assign_points(&mut self) -> Vec<(PlayerId, u32)> {
        let mut awarded = Vec::with_capacity(self.join_order.len());

        for id in &self.join_order {
            let Some(player) = self.players.get_mut(id) else {
                continue;
            };
            let points = if player.prediction == player.round_result {
                player.round_result.reward()
            } else {
                0
            };
            player.points += points;
            awarded.push((id.clone(), points));
        }
        awarded
    }

    /// Every player holding the top score, plus that score. Empty with 0 points
    /// when nobody joined.
    pub fn get_winner(&self) -> (Vec<PlayerId>, u32) {
        let top = self.players.values().map(|p| p.points).max().unwrap_or(0);
        let winners = self
            .get_players()
            .filter(|(_, player)| player.points == top)
            .map(|(id, _)| id.clone())
            .collect();

        (winners, top)
    }

    //  --- Private helpers ---
    fn player(&self, player_id: &PlayerId) -> Result<&Player, GameError> {
        self.players
            .get(player_id)
            .ok_or_else(|| GameError::UnknownPlayer(player_id.clone()))
    }

    fn player_mut(&mut self, player_id: &PlayerId) -> Result<&mut Player, GameError> {
        self.players
            .get_mut(player_id)
            .ok_or_else(|| GameError::UnknownPlayer(player_id.clone()))
    }
}
