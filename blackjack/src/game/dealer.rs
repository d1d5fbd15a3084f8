//! Dealer play and bet settlement.

use log::warn;

use super::{
    constants::{BLACKJACK, DEALER_STAND_THRESHOLD},
    entities::{Chips, DealerStatus, PlayerStatus, RoundOutcome, Settlement, TurnOutcome},
    state_machine::{GameEvent, Phase, Rejection, RoundState},
};

/// Reveals the hole card, draws to 17, ends the round, and settles every
/// bet still on the table.
pub fn play_dealer_turn(state: &RoundState) -> Result<RoundState, Rejection> {
    if state.phase != Phase::DealerTurn {
        return Err(Rejection::InvalidPhase { phase: state.phase });
    }
    let mut next = state.clone();
    next.run_dealer();
    next.transition(Phase::RoundOver, Some("Round over.".to_string()));
    next.settle();
    Ok(next)
}

/// Payout for one bet. Returns the outcome and the signed balance change.
///
/// Naturals pay 3:2 rounded down. A non-natural 21 against a dealer natural
/// is a push.
#[must_use]
pub fn resolve(
    turn: TurnOutcome,
    player_total: u8,
    dealer_status: DealerStatus,
    dealer_total: u8,
    bet: Chips,
) -> (RoundOutcome, Chips) {
    match turn {
        TurnOutcome::Busted => (RoundOutcome::Lost, -bet),
        TurnOutcome::NaturalBlackjack => {
            if dealer_status == DealerStatus::NaturalBlackjack {
                (RoundOutcome::Push, 0)
            } else {
                (RoundOutcome::Won, bet * 3 / 2)
            }
        }
        TurnOutcome::Stood => {
            if dealer_status == DealerStatus::Busted {
                (RoundOutcome::Won, bet)
            } else if dealer_status == DealerStatus::NaturalBlackjack {
                if player_total == BLACKJACK {
                    (RoundOutcome::Push, 0)
                } else {
                    (RoundOutcome::Lost, -bet)
                }
            } else if player_total > dealer_total {
                (RoundOutcome::Won, bet)
            } else if player_total < dealer_total {
                (RoundOutcome::Lost, -bet)
            } else {
                (RoundOutcome::Push, 0)
            }
        }
    }
}

impl RoundState {
    fn run_dealer(&mut self) {
        self.dealer.status = DealerStatus::Playing;
        if let Some(card) = self.dealer.reveal_hole_card() {
            let total = self.dealer.score.total;
            self.log(format!("Dealer reveals {card} ({total})."));
        }

        while self.dealer.score.total < DEALER_STAND_THRESHOLD {
            let Ok(card) = self.deck_mut().deal() else {
                warn!("shoe ran dry during dealer turn in round {}", self.round_id);
                self.log("The shoe is empty. Dealer stops drawing.");
                break;
            };
            self.dealer.receive(card);
            let total = self.dealer.score.total;
            self.log(format!("Dealer draws {card} ({total})."));
        }

        let total = self.dealer.score.total;
        self.dealer.status = if self.dealer.hand.is_natural() {
            self.log("Dealer has Blackjack!");
            DealerStatus::NaturalBlackjack
        } else if self.dealer.score.is_bust() {
            self.log(format!("Dealer busts with {total}!"));
            DealerStatus::Busted
        } else {
            self.log(format!("Dealer stands on {total}."));
            DealerStatus::Stood
        };
    }

    fn settle(&mut self) {
        let dealer_status = self.dealer.status;
        let dealer_total = self.dealer.score.total;
        let mut settlements = Vec::new();

        for player in &mut self.players {
            let (Some(bet), PlayerStatus::Finished { turn }) = (player.bet, player.status) else {
                continue;
            };
            let (outcome, delta) =
                resolve(turn, player.score.total, dealer_status, dealer_total, bet);
            player.balance += delta;
            player.status = PlayerStatus::Settled { turn, outcome };
            settlements.push((player.display_name.clone(), Settlement {
                player_id: player.id.clone(),
                outcome,
                bet,
                delta,
            }));
        }

        for (name, settlement) in settlements {
            let message = match settlement.outcome {
                RoundOutcome::Won => format!("{name} wins {}.", settlement.delta),
                RoundOutcome::Lost => format!("{name} loses {}.", settlement.bet),
                RoundOutcome::Push => format!("{name} pushes."),
            };
            self.log(message);
            self.push_event(GameEvent::Settled(settlement));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{
        actions::{Command, apply, join},
        entities::{Card, Deck, PlayerId, Rank, Suit},
        state_machine::GameSettings,
    };

    #[test]
    fn settlement_table() {
        use DealerStatus as D;
        use RoundOutcome::{Lost, Push, Won};
        use TurnOutcome as T;

        let cases = [
            (T::Busted, 25, D::Busted, 24, Lost, -100),
            (T::Busted, 22, D::Stood, 18, Lost, -100),
            (T::NaturalBlackjack, 21, D::NaturalBlackjack, 21, Push, 0),
            (T::NaturalBlackjack, 21, D::Stood, 20, Won, 150),
            (T::NaturalBlackjack, 21, D::Busted, 23, Won, 150),
            (T::Stood, 20, D::NaturalBlackjack, 21, Lost, -100),
            (T::Stood, 21, D::NaturalBlackjack, 21, Push, 0),
            (T::Stood, 18, D::Busted, 22, Won, 100),
            (T::Stood, 20, D::Stood, 19, Won, 100),
            (T::Stood, 17, D::Stood, 19, Lost, -100),
            (T::Stood, 18, D::Stood, 18, Push, 0),
        ];
        for (turn, player, dealer_status, dealer, outcome, delta) in cases {
            assert_eq!(
                resolve(turn, player, dealer_status, dealer, 100),
                (outcome, delta),
                "{turn:?} {player} vs {dealer_status:?} {dealer}"
            );
        }
    }

    #[test]
    fn natural_payout_rounds_down() {
        assert_eq!(
            resolve(TurnOutcome::NaturalBlackjack, 21, DealerStatus::Stood, 17, 15),
            (RoundOutcome::Won, 22)
        );
    }

    #[test]
    fn dealer_turn_out_of_phase_is_rejected() {
        let state = RoundState::new(GameSettings::default());
        assert_eq!(
            play_dealer_turn(&state),
            Err(Rejection::InvalidPhase {
                phase: Phase::WaitingForPlayers
            })
        );
    }

    #[test]
    fn dealer_draws_to_seventeen_and_settles() {
        // alice 10, 8 ; dealer 6, (5) ; dealer draws 3 then 4 -> 18
        let cards = [
            Rank::Ten,
            Rank::Six,
            Rank::Eight,
            Rank::Five,
            Rank::Three,
            Rank::Four,
            Rank::King,
        ]
        .into_iter()
        .map(|rank| Card::new(rank, Suit::Diamonds))
        .collect();
        let alice = PlayerId::new("alice");
        let mut state = RoundState::with_deck(GameSettings::default(), Deck::stacked(cards, 1));
        state = join(&state, &alice, "alice", 1000).unwrap();
        state = apply(&state, &alice, Command::PlaceBet { amount: 40 }).unwrap();
        state = apply(&state, &alice, Command::Stand).unwrap();
        state.drain_events();

        let mut state = play_dealer_turn(&state).unwrap();
        let events = state.drain_events();
        assert!(events.contains(&GameEvent::Settled(Settlement {
            player_id: alice.clone(),
            outcome: RoundOutcome::Push,
            bet: 40,
            delta: 0,
        })));

        assert_eq!(state.phase, Phase::RoundOver);
        assert_eq!(state.dealer.score.total, 18);
        assert_eq!(state.dealer.status, DealerStatus::Stood);
        assert_eq!(state.dealer.hand.len(), 4);
        assert!(state.dealer.hand.cards().iter().all(|card| !card.face_down));
        assert_eq!(state.players[0].balance, 1000);
        assert_eq!(state.players[0].bet, Some(40));
        assert_eq!(state.deck().remaining(), 1);
    }

    #[test]
    fn dealer_stops_when_shoe_runs_dry() {
        let cards = [Rank::Ten, Rank::Two, Rank::Nine, Rank::Three]
            .into_iter()
            .map(|rank| Card::new(rank, Suit::Clubs))
            .collect();
        let alice = PlayerId::new("alice");
        let mut state = RoundState::with_deck(GameSettings::default(), Deck::stacked(cards, 1));
        state = join(&state, &alice, "alice", 1000).unwrap();
        state = apply(&state, &alice, Command::PlaceBet { amount: 10 }).unwrap();
        state = apply(&state, &alice, Command::Stand).unwrap();

        let state = play_dealer_turn(&state).unwrap();
        assert_eq!(state.dealer.score.total, 5);
        assert_eq!(state.dealer.status, DealerStatus::Stood);
        assert_eq!(state.players[0].balance, 1010);
        assert_eq!(
            state.players[0].status,
            PlayerStatus::Settled {
                turn: TurnOutcome::Stood,
                outcome: RoundOutcome::Won
            }
        );
    }
}
