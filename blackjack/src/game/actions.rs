//! Player commands and seat management.
//!
//! Each function here is pure with respect to its input: it either returns a
//! brand new [`RoundState`] or a [`Rejection`], never both.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{
    constants::BLACKJACK,
    entities::{Chips, PlayerId, PlayerState, PlayerStatus, RoundOutcome, Settlement, TurnOutcome},
    state_machine::{GameEvent, Phase, Rejection, RoundState},
};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    PlaceBet,
    Hit,
    Stand,
    DoubleDown,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::PlaceBet => "place a bet",
            Self::Hit => "hit",
            Self::Stand => "stand",
            Self::DoubleDown => "double down",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    PlaceBet { amount: Chips },
    Hit,
    Stand,
    DoubleDown,
}

impl Command {
    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        match self {
            Self::PlaceBet { .. } => CommandKind::PlaceBet,
            Self::Hit => CommandKind::Hit,
            Self::Stand => CommandKind::Stand,
            Self::DoubleDown => CommandKind::DoubleDown,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlaceBet { amount } => write!(f, "bet {amount}"),
            other => write!(f, "{}", other.kind()),
        }
    }
}

/// Applies a player command.
pub fn apply(
    state: &RoundState,
    player_id: &PlayerId,
    command: Command,
) -> Result<RoundState, Rejection> {
    let mut next = state.clone();
    match command {
        Command::PlaceBet { amount } => next.place_bet(player_id, amount)?,
        Command::Hit => next.hit(player_id)?,
        Command::Stand => next.stand(player_id)?,
        Command::DoubleDown => next.double_down(player_id)?,
    }
    Ok(next)
}

/// Seats a player, or treats a repeat join as a reconnect that keeps the
/// existing seat and chips.
pub fn join(
    state: &RoundState,
    player_id: &PlayerId,
    display_name: &str,
    balance: Chips,
) -> Result<RoundState, Rejection> {
    if state.player(player_id).is_some() {
        let mut next = state.clone();
        let name = state
            .player(player_id)
            .map(|player| player.display_name.clone())
            .unwrap_or_default();
        next.log(format!("{name} reconnected."));
        return Ok(next);
    }
    if state.players.len() >= state.settings().max_players {
        return Err(Rejection::RoomFull);
    }

    let mut next = state.clone();
    let mut player = PlayerState::new(player_id.clone(), display_name, balance);
    let can_bet = balance >= next.min_bet;
    if matches!(next.phase, Phase::Betting) && can_bet {
        player.status = PlayerStatus::Betting;
    }
    let name = player.display_name.clone();
    next.players.push(player);
    next.log(format!("{name} joined the table."));
    if next.phase == Phase::WaitingForPlayers {
        next.start_betting();
    }
    Ok(next)
}

/// Removes a player. A bet already in play is forfeited. If it was their
/// turn the turn moves on; if they were the last one still betting the
/// cards come out.
pub fn leave(state: &RoundState, player_id: &PlayerId) -> Result<RoundState, Rejection> {
    let mut next = state.clone();
    let idx = next.player_index(player_id)?;
    let player = next.players.remove(idx);
    next.log(format!("{} left the table.", player.display_name));

    let dealt_in = matches!(next.phase, Phase::PlayerTurns | Phase::DealerTurn);
    if let (true, Some(bet)) = (dealt_in, player.bet) {
        next.log(format!("{} forfeits {bet}.", player.display_name));
        next.push_event(GameEvent::Settled(Settlement {
            player_id: player.id.clone(),
            outcome: RoundOutcome::Lost,
            bet,
            delta: -bet,
        }));
    }

    if next.players.is_empty() {
        next.current_turn = None;
        return Ok(next);
    }

    match next.phase {
        Phase::Betting => next.close_betting_if_done()?,
        Phase::PlayerTurns if state.is_current_turn(player_id) => next.advance_turn(idx),
        _ => {}
    }
    Ok(next)
}

/// Stands on behalf of a player who let their turn clock run out. Anything
/// that no longer matches the live turn is refused.
pub fn auto_stand(
    state: &RoundState,
    player_id: &PlayerId,
    turn_seq: u64,
) -> Result<RoundState, Rejection> {
    if state.phase != Phase::PlayerTurns {
        return Err(Rejection::InvalidPhase { phase: state.phase });
    }
    if !state.is_current_turn(player_id) || state.turn_seq != turn_seq {
        return Err(Rejection::NotCurrentTurn);
    }
    let mut next = state.clone();
    let idx = next.player_index(player_id)?;
    let name = next.players[idx].display_name.clone();
    next.log(format!("{name} ran out of time and stands."));
    next.finish_turn(idx, TurnOutcome::Stood);
    Ok(next)
}

/// Closes betting: anyone who hasn't bet sits the round out.
pub fn sit_out_idle_bettors(state: &RoundState) -> Result<RoundState, Rejection> {
    if state.phase != Phase::Betting {
        return Err(Rejection::InvalidPhase { phase: state.phase });
    }
    let mut next = state.clone();
    let mut idle = Vec::new();
    for player in &mut next.players {
        if player.status == PlayerStatus::Betting {
            player.status = PlayerStatus::Waiting;
            idle.push(player.display_name.clone());
        }
    }
    for name in idle {
        next.log(format!("{name} didn't bet in time and sits out this round."));
    }
    next.close_betting_if_done()?;
    Ok(next)
}

impl RoundState {
    fn require_phase(&self, phase: Phase) -> Result<(), Rejection> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(Rejection::InvalidPhase { phase: self.phase })
        }
    }

    /// Common checks for hit, stand, and double down.
    fn acting_player(&self, player_id: &PlayerId, kind: CommandKind) -> Result<usize, Rejection> {
        let idx = self.player_index(player_id)?;
        self.require_phase(Phase::PlayerTurns)?;
        if !self.is_current_turn(player_id) {
            return Err(Rejection::NotCurrentTurn);
        }
        let player = &self.players[idx];
        let allowed = player.status == PlayerStatus::Playing
            && match kind {
                CommandKind::Hit => player.flags.can_hit,
                CommandKind::Stand => player.flags.can_stand,
                CommandKind::DoubleDown => player.flags.can_double,
                CommandKind::PlaceBet => false,
            };
        if !allowed {
            return Err(Rejection::ActionNotAllowed(kind));
        }
        Ok(idx)
    }

    fn place_bet(&mut self, player_id: &PlayerId, amount: Chips) -> Result<(), Rejection> {
        let idx = self.player_index(player_id)?;
        self.require_phase(Phase::Betting)?;
        let player = &self.players[idx];
        if player.status != PlayerStatus::Betting {
            return Err(Rejection::ActionNotAllowed(CommandKind::PlaceBet));
        }
        if amount < self.min_bet || amount > self.max_bet || amount > player.balance {
            return Err(Rejection::InvalidBetAmount {
                min: self.min_bet,
                max: self.max_bet,
                balance: player.balance,
            });
        }

        let player = &mut self.players[idx];
        player.bet = Some(amount);
        player.status = PlayerStatus::Waiting;
        let name = player.display_name.clone();
        self.log(format!("{name} bets {amount}."));
        self.close_betting_if_done()
    }

    fn hit(&mut self, player_id: &PlayerId) -> Result<(), Rejection> {
        let idx = self.acting_player(player_id, CommandKind::Hit)?;
        let card = self.deck_mut().deal()?;

        let player = &mut self.players[idx];
        player.receive(card);
        player.flags.can_double = false;
        let name = player.display_name.clone();
        let score = player.score;
        self.log(format!("{name} hits and draws {card} ({}).", score.total));

        if score.is_bust() {
            self.log(format!("{name} busts!"));
            self.finish_turn(idx, TurnOutcome::Busted);
        } else if score.total == BLACKJACK {
            self.log(format!("{name} has 21 and stands."));
            self.finish_turn(idx, TurnOutcome::Stood);
        }
        Ok(())
    }

    fn stand(&mut self, player_id: &PlayerId) -> Result<(), Rejection> {
        let idx = self.acting_player(player_id, CommandKind::Stand)?;
        let player = &self.players[idx];
        let message = format!("{} stands on {}.", player.display_name, player.score.total);
        self.log(message);
        self.finish_turn(idx, TurnOutcome::Stood);
        Ok(())
    }

    fn double_down(&mut self, player_id: &PlayerId) -> Result<(), Rejection> {
        let idx = self.acting_player(player_id, CommandKind::DoubleDown)?;
        let player = &self.players[idx];
        let bet = player.bet.unwrap_or(0);
        if player.balance < bet {
            return Err(Rejection::InsufficientBalanceForDouble {
                required: bet,
                available: player.balance,
            });
        }

        let name = player.display_name.clone();
        let Ok(card) = self.deck_mut().deal() else {
            // Bet stays as it was and the turn ends.
            self.log(format!("The shoe is empty. {name} stands."));
            self.finish_turn(idx, TurnOutcome::Stood);
            return Ok(());
        };

        let player = &mut self.players[idx];
        player.bet = Some(bet * 2);
        player.receive(card);
        let score = player.score;
        self.log(format!(
            "{name} doubles down to {} and draws {card} ({}).",
            bet * 2,
            score.total
        ));
        if score.is_bust() {
            self.log(format!("{name} busts!"));
            self.finish_turn(idx, TurnOutcome::Busted);
        } else {
            self.finish_turn(idx, TurnOutcome::Stood);
        }
        Ok(())
    }
}
