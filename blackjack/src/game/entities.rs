use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

use super::{
    constants::{self, CARDS_PER_DECK},
    functional::{self, HandScore},
};

/// Type alias for whole chips. Signed so settlement deltas share the type.
pub type Chips = i64;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Suit {
    Hearts,
    Diamonds,
    Clubs,
    Spades,
}

impl Suit {
    pub const ALL: [Self; 4] = [Self::Hearts, Self::Diamonds, Self::Clubs, Self::Spades];
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Hearts => "H",
            Self::Diamonds => "D",
            Self::Clubs => "C",
            Self::Spades => "S",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Rank {
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

impl Rank {
    pub const ALL: [Self; 13] = [
        Self::Two,
        Self::Three,
        Self::Four,
        Self::Five,
        Self::Six,
        Self::Seven,
        Self::Eight,
        Self::Nine,
        Self::Ten,
        Self::Jack,
        Self::Queen,
        Self::King,
        Self::Ace,
    ];

    /// Nominal point value. Aces count 11 here; the scorer downgrades them.
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
            Self::Five => 5,
            Self::Six => 6,
            Self::Seven => 7,
            Self::Eight => 8,
            Self::Nine => 9,
            Self::Ten | Self::Jack | Self::Queen | Self::King => 10,
            Self::Ace => 11,
        }
    }

    #[must_use]
    pub const fn is_ace(self) -> bool {
        matches!(self, Self::Ace)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Jack => "J",
            Self::Queen => "Q",
            Self::King => "K",
            Self::Ace => "A",
            other => return write!(f, "{}", other.value()),
        };
        write!(f, "{repr}")
    }
}

/// A playing card. Only `face_down` ever changes after the card is dealt.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
    pub face_down: bool,
}

impl Card {
    #[must_use]
    pub const fn new(rank: Rank, suit: Suit) -> Self {
        Self {
            rank,
            suit,
            face_down: false,
        }
    }

    #[must_use]
    pub const fn value(&self) -> u8 {
        self.rank.value()
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}", self.suit, self.rank)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum DeckError {
    #[error("no cards left in the shoe")]
    Empty,
}

/// A shoe of one or more 52-card decks, treated as a stack. The top of the
/// stack is the end of the vector.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Deck {
    cards: Vec<Card>,
    num_decks: usize,
}

impl Deck {
    /// Builds an ordered (unshuffled) shoe of `num_decks` decks.
    #[must_use]
    pub fn build(num_decks: usize) -> Self {
        let mut cards = Vec::with_capacity(CARDS_PER_DECK * num_decks);
        for _ in 0..num_decks {
            for suit in Suit::ALL {
                for rank in Rank::ALL {
                    cards.push(Card::new(rank, suit));
                }
            }
        }
        Self { cards, num_decks }
    }

    #[must_use]
    pub fn new_shuffled(num_decks: usize) -> Self {
        let mut deck = Self::build(num_decks);
        deck.shuffle();
        deck
    }

    /// A shoe whose first card is dealt first. Mostly useful for rigging
    /// rounds in tests and benchmarks; reshuffles still rebuild a full shoe
    /// of `num_decks` decks.
    #[must_use]
    pub fn stacked(mut cards: Vec<Card>, num_decks: usize) -> Self {
        cards.reverse();
        Self { cards, num_decks }
    }

    pub fn shuffle(&mut self) {
        self.shuffle_with(&mut rand::rng());
    }

    /// Fisher-Yates: walk down from the last index, swapping each position
    /// with a uniformly chosen index in `[0, i]`.
    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for i in (1..self.cards.len()).rev() {
            let j = rng.random_range(0..=i);
            self.cards.swap(i, j);
        }
    }

    /// Throws away whatever is left and replaces it with a fresh shuffled shoe.
    pub fn reshuffle(&mut self) {
        *self = Self::new_shuffled(self.num_decks);
    }

    pub fn deal(&mut self) -> Result<Card, DeckError> {
        self.cards.pop().ok_or(DeckError::Empty)
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.cards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    #[must_use]
    pub fn num_decks(&self) -> usize {
        self.num_decks
    }

    /// Size of a complete shoe for this deck count.
    #[must_use]
    pub fn full_size(&self) -> usize {
        CARDS_PER_DECK * self.num_decks
    }

    #[must_use]
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Drops cards off the top until `remaining` are left.
    pub fn truncate(&mut self, remaining: usize) {
        let start = self.cards.len().saturating_sub(remaining);
        self.cards.drain(..start);
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::new_shuffled(constants::DEFAULT_NUM_DECKS)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Hand(Vec<Card>);

impl Hand {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, card: Card) {
        self.0.push(card);
    }

    #[must_use]
    pub fn cards(&self) -> &[Card] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Score of the cards everyone can see.
    #[must_use]
    pub fn score(&self) -> HandScore {
        functional::score(&self.0)
    }

    #[must_use]
    pub fn is_natural(&self) -> bool {
        functional::is_natural(&self.0)
    }

    /// Turns the first face-down card face up and returns it.
    pub fn reveal(&mut self) -> Option<Card> {
        let card = self.0.iter_mut().find(|card| card.face_down)?;
        card.face_down = false;
        Some(*card)
    }
}

impl From<Vec<Card>> for Hand {
    fn from(value: Vec<Card>) -> Self {
        Self(value)
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = self
            .0
            .iter()
            .map(|card| {
                if card.face_down {
                    "??".to_string()
                } else {
                    card.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        write!(f, "{repr}")
    }
}

/// Trims `s` and keeps at most [`constants::MAX_ID_LENGTH`] characters.
fn clip(s: &str) -> String {
    s.trim().chars().take(constants::MAX_ID_LENGTH).collect()
}

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(s: &str) -> Self {
        Self(clip(s))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<'de> Deserialize<'de> for PlayerId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(&s))
    }
}

impl From<String> for PlayerId {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(s: &str) -> Self {
        Self(clip(s))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<'de> Deserialize<'de> for RoomId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(&s))
    }
}

impl From<String> for RoomId {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// How a player's turn ended.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    Busted,
    Stood,
    NaturalBlackjack,
}

/// How a player's bet was resolved against the dealer.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundOutcome {
    Won,
    Lost,
    Push,
}

impl fmt::Display for RoundOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Won => "won",
            Self::Lost => "lost",
            Self::Push => "push",
        };
        write!(f, "{repr}")
    }
}

/// A player's place in the current round. The turn outcome survives
/// settlement so "busted and lost" never collapses into plain "lost".
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlayerStatus {
    /// Seated with nothing to do: bet already placed, sitting out, or joined
    /// after the cards came out.
    Waiting,
    Betting,
    Playing,
    Finished {
        turn: TurnOutcome,
    },
    Settled {
        turn: TurnOutcome,
        outcome: RoundOutcome,
    },
}

impl PlayerStatus {
    /// Flat status name as clients know it.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Betting => "betting",
            Self::Playing => "playing",
            Self::Finished { turn } => match turn {
                TurnOutcome::Busted => "busted",
                TurnOutcome::Stood => "stood",
                TurnOutcome::NaturalBlackjack => "blackjack",
            },
            Self::Settled { outcome, .. } => match outcome {
                RoundOutcome::Won => "won",
                RoundOutcome::Lost => "lost",
                RoundOutcome::Push => "push",
            },
        }
    }

    #[must_use]
    pub const fn turn_outcome(&self) -> Option<TurnOutcome> {
        match self {
            Self::Finished { turn } | Self::Settled { turn, .. } => Some(*turn),
            _ => None,
        }
    }

    #[must_use]
    pub const fn round_outcome(&self) -> Option<RoundOutcome> {
        match self {
            Self::Settled { outcome, .. } => Some(*outcome),
            _ => None,
        }
    }
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// UI hints for the player whose turn it is. They double as rule gates.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct TurnFlags {
    pub can_hit: bool,
    pub can_stand: bool,
    pub can_double: bool,
}

impl TurnFlags {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PlayerState {
    pub id: PlayerId,
    pub display_name: String,
    pub hand: Hand,
    pub score: HandScore,
    pub bet: Option<Chips>,
    pub balance: Chips,
    pub status: PlayerStatus,
    pub flags: TurnFlags,
}

impl PlayerState {
    #[must_use]
    pub fn new(id: PlayerId, display_name: &str, balance: Chips) -> Self {
        let mut display_name = clip(display_name);
        if display_name.is_empty() {
            display_name = id.to_string();
        }
        Self {
            id,
            display_name,
            hand: Hand::new(),
            score: HandScore::default(),
            bet: None,
            balance,
            status: PlayerStatus::Waiting,
            flags: TurnFlags::default(),
        }
    }

    /// Adds a card and recomputes the score.
    pub fn receive(&mut self, card: Card) {
        self.hand.push(card);
        self.score = self.hand.score();
    }

    pub(crate) fn reset_for_round(&mut self) {
        self.hand.clear();
        self.score = HandScore::default();
        self.bet = None;
        self.status = PlayerStatus::Waiting;
        self.flags.clear();
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DealerStatus {
    Waiting,
    Playing,
    Busted,
    Stood,
    NaturalBlackjack,
}

impl fmt::Display for DealerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Waiting => "waiting",
            Self::Playing => "playing",
            Self::Busted => "busted",
            Self::Stood => "stood",
            Self::NaturalBlackjack => "blackjack",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DealerState {
    pub hand: Hand,
    /// Score of the face-up cards only until the hole card is revealed.
    pub score: HandScore,
    pub status: DealerStatus,
}

impl Default for DealerState {
    fn default() -> Self {
        Self {
            hand: Hand::new(),
            score: HandScore::default(),
            status: DealerStatus::Waiting,
        }
    }
}

impl DealerState {
    pub fn receive(&mut self, card: Card) {
        self.hand.push(card);
        self.score = self.hand.score();
    }

    /// Flips the hole card. Only the first call returns a card.
    pub fn reveal_hole_card(&mut self) -> Option<Card> {
        let card = self.hand.reveal()?;
        self.score = self.hand.score();
        Some(card)
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Result of settling one player's bet.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Settlement {
    pub player_id: PlayerId,
    pub outcome: RoundOutcome,
    pub bet: Chips,
    pub delta: Chips,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};
    use std::collections::HashMap;

    fn tally(cards: &[Card]) -> HashMap<(Rank, Suit), usize> {
        let mut counts = HashMap::new();
        for card in cards {
            *counts.entry((card.rank, card.suit)).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn build_contains_each_card_once_per_deck() {
        for n in 1..=8 {
            let deck = Deck::build(n);
            assert_eq!(deck.remaining(), 52 * n);
            let counts = tally(deck.cards());
            assert_eq!(counts.len(), 52);
            assert!(counts.values().all(|&count| count == n));
        }
    }

    #[test]
    fn shuffle_preserves_the_multiset() {
        let ordered = Deck::build(6);
        let mut shuffled = ordered.clone();
        shuffled.shuffle_with(&mut StdRng::seed_from_u64(7));
        assert_eq!(tally(ordered.cards()), tally(shuffled.cards()));
        assert_ne!(ordered.cards(), shuffled.cards());
    }

    #[test]
    fn deal_takes_from_the_top_until_empty() {
        let first = Card::new(Rank::Ace, Suit::Spades);
        let second = Card::new(Rank::Two, Suit::Hearts);
        let mut deck = Deck::stacked(vec![first, second], 1);
        assert_eq!(deck.deal(), Ok(first));
        assert_eq!(deck.deal(), Ok(second));
        assert_eq!(deck.deal(), Err(DeckError::Empty));
    }

    #[test]
    fn reshuffle_restores_a_full_shoe() {
        let mut deck = Deck::build(2);
        deck.truncate(3);
        assert_eq!(deck.remaining(), 3);
        deck.reshuffle();
        assert_eq!(deck.remaining(), deck.full_size());
        assert_eq!(deck.remaining(), 104);
    }

    #[test]
    fn card_display() {
        assert_eq!(Card::new(Rank::Ace, Suit::Hearts).to_string(), "H-A");
        assert_eq!(Card::new(Rank::Ten, Suit::Spades).to_string(), "S-10");
        assert_eq!(Card::new(Rank::Seven, Suit::Clubs).to_string(), "C-7");
    }

    #[test]
    fn reveal_flips_only_once() {
        let mut dealer = DealerState::default();
        dealer.receive(Card::new(Rank::Nine, Suit::Clubs));
        dealer.receive(Card {
            face_down: true,
            ..Card::new(Rank::King, Suit::Hearts)
        });
        assert_eq!(dealer.score.total, 9);
        assert_eq!(dealer.hand.to_string(), "C-9 ??");

        assert!(dealer.reveal_hole_card().is_some());
        assert_eq!(dealer.score.total, 19);
        assert!(dealer.reveal_hole_card().is_none());
    }

    #[test]
    fn status_labels_keep_turn_outcome() {
        let status = PlayerStatus::Settled {
            turn: TurnOutcome::Busted,
            outcome: RoundOutcome::Lost,
        };
        assert_eq!(status.label(), "lost");
        assert_eq!(status.turn_outcome(), Some(TurnOutcome::Busted));
        assert_eq!(status.round_outcome(), Some(RoundOutcome::Lost));
        assert_eq!(PlayerStatus::Playing.turn_outcome(), None);
    }

    #[test]
    fn ids_are_trimmed() {
        assert_eq!(PlayerId::new("  alice ").as_str(), "alice");
        let id: RoomId = serde_json::from_str("\" lobby \"").unwrap();
        assert_eq!(id.as_str(), "lobby");
    }

    #[test]
    fn long_multibyte_ids_are_cut_by_character() {
        let euros = "€".repeat(40);
        let player = PlayerId::new(&euros);
        assert_eq!(player.as_str().chars().count(), constants::MAX_ID_LENGTH);
        assert!(player.as_str().chars().all(|c| c == '€'));

        let room = RoomId::new(&format!(" {} ", "é".repeat(33)));
        assert_eq!(room.as_str(), "é".repeat(constants::MAX_ID_LENGTH));

        // 20 three-byte characters straddle the 32-byte mark but fit.
        assert_eq!(PlayerId::new(&"€".repeat(20)).as_str(), "€".repeat(20));
    }

    #[test]
    fn display_names_are_cut_by_character() {
        let player = PlayerState::new(PlayerId::new("alice"), &"€".repeat(50), 100);
        assert_eq!(player.display_name, "€".repeat(constants::MAX_ID_LENGTH));

        let player = PlayerState::new(PlayerId::new("bob"), "   ", 100);
        assert_eq!(player.display_name, "bob");
    }
}
