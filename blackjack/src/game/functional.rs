//! Pure hand scoring.

use serde::{Deserialize, Serialize};

use super::{
    constants::{ACE_ADJUSTMENT, BLACKJACK},
    entities::Card,
};

/// Best blackjack total of a hand and whether an ace is still counting 11.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct HandScore {
    pub total: u8,
    pub is_soft: bool,
}

impl HandScore {
    #[must_use]
    pub const fn is_bust(self) -> bool {
        self.total > BLACKJACK
    }
}

fn score_cards<'a>(cards: impl Iterator<Item = &'a Card>) -> HandScore {
    let mut total: u8 = 0;
    let mut high_aces = 0;
    for card in cards {
        total = total.saturating_add(card.value());
        if card.rank.is_ace() {
            high_aces += 1;
        }
    }
    while total > BLACKJACK && high_aces > 0 {
        total -= ACE_ADJUSTMENT;
        high_aces -= 1;
    }
    HandScore {
        total,
        is_soft: high_aces > 0,
    }
}

/// Scores the face-up cards. Face-down cards contribute nothing, so a
/// dealer's score shows only the up-card until the hole card is revealed.
#[must_use]
pub fn score(cards: &[Card]) -> HandScore {
    score_cards(cards.iter().filter(|card| !card.face_down))
}

/// Scores every card, face-down or not.
#[must_use]
pub fn full_score(cards: &[Card]) -> HandScore {
    score_cards(cards.iter())
}

/// Exactly two cards worth 21.
#[must_use]
pub fn is_natural(cards: &[Card]) -> bool {
    cards.len() == 2 && full_score(cards).total == BLACKJACK
}
