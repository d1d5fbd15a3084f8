//! Room actor implementation with async message handling.

use log::{debug, error, info, warn};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::{mpsc, oneshot};

use super::{
    config::RoomConfig,
    messages::{
        RoomError, RoomEvent, RoomMessage, RoomResponse, ScheduledEvent, ScheduledKind,
    },
};
use crate::{
    db::{ProfileRepository, timeouts::with_default_timeout},
    game::{
        Command, GameEvent, Phase, RoundState, RoundView, actions, dealer,
        entities::{Chips, PlayerId, RoomId, Settlement},
        state_machine,
    },
};

/// Room actor handle for sending messages
#[derive(Clone, Debug)]
pub struct RoomHandle {
    sender: mpsc::Sender<RoomMessage>,
    room_id: RoomId,
}

impl RoomHandle {
    pub fn new(sender: mpsc::Sender<RoomMessage>, room_id: RoomId) -> Self {
        Self { sender, room_id }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// True once the actor behind this handle has shut down.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Whether both handles talk to the same actor.
    pub fn same_room(&self, other: &Self) -> bool {
        self.sender.same_channel(&other.sender)
    }

    pub async fn send(&self, message: RoomMessage) -> Result<(), RoomError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| RoomError::RoomClosed(self.room_id.clone()))
    }

    /// Sends a message carrying a oneshot and waits for the reply. A dropped
    /// reply means the actor shut down with the message still queued.
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RoomMessage,
    ) -> Result<T, RoomError> {
        let (response, reply) = oneshot::channel();
        self.send(build(response)).await?;
        reply
            .await
            .map_err(|_| RoomError::RoomClosed(self.room_id.clone()))
    }

    pub async fn join(
        &self,
        player_id: &PlayerId,
        display_name: &str,
        balance: Chips,
    ) -> Result<RoomResponse, RoomError> {
        self.request(|response| RoomMessage::Join {
            player_id: player_id.clone(),
            display_name: display_name.to_string(),
            balance,
            response,
        })
        .await
    }

    pub async fn leave(&self, player_id: &PlayerId) -> Result<RoomResponse, RoomError> {
        self.request(|response| RoomMessage::Leave {
            player_id: player_id.clone(),
            response,
        })
        .await
    }

    pub async fn act(
        &self,
        player_id: &PlayerId,
        command: Command,
    ) -> Result<RoomResponse, RoomError> {
        self.request(|response| RoomMessage::Act {
            player_id: player_id.clone(),
            command,
            response,
        })
        .await
    }

    pub async fn view(&self) -> Result<RoundView, RoomError> {
        self.request(|response| RoomMessage::GetView { response })
            .await
    }

    pub async fn subscribe(
        &self,
        player_id: &PlayerId,
        sender: mpsc::Sender<RoomEvent>,
    ) -> Result<(), RoomError> {
        self.send(RoomMessage::Subscribe {
            player_id: player_id.clone(),
            sender,
        })
        .await
    }

    pub async fn unsubscribe(&self, player_id: &PlayerId) -> Result<(), RoomError> {
        self.send(RoomMessage::Unsubscribe {
            player_id: player_id.clone(),
        })
        .await
    }
}

/// Owns one room's [`RoundState`]. Every change to the room goes through
/// this actor's inbox, one message at a time.
pub struct RoomActor {
    id: RoomId,

    config: RoomConfig,

    state: RoundState,

    inbox: mpsc::Receiver<RoomMessage>,

    /// Timers hold this instead of a real sender so they never keep a
    /// closed room reachable.
    scheduler: mpsc::WeakSender<RoomMessage>,

    repository: Arc<dyn ProfileRepository>,

    subscribers: HashMap<PlayerId, mpsc::Sender<RoomEvent>>,

    is_closed: bool,
}

impl RoomActor {
    pub fn new(
        id: RoomId,
        config: RoomConfig,
        repository: Arc<dyn ProfileRepository>,
    ) -> (Self, RoomHandle) {
        let state = RoundState::new(config.game_settings());
        Self::with_state(id, config, state, repository)
    }

    /// Starts a room from an existing state, e.g. one with a rigged shoe.
    pub fn with_state(
        id: RoomId,
        config: RoomConfig,
        state: RoundState,
        repository: Arc<dyn ProfileRepository>,
    ) -> (Self, RoomHandle) {
        let (sender, inbox) = mpsc::channel(config.inbox_capacity);
        let actor = Self {
            id: id.clone(),
            config,
            state,
            inbox,
            scheduler: sender.downgrade(),
            repository,
            subscribers: HashMap::new(),
            is_closed: false,
        };
        (actor, RoomHandle::new(sender, id))
    }

    /// Runs until the last player leaves or every handle is dropped.
    pub async fn run(mut self) {
        info!("Room {} open", self.id);

        while let Some(message) = self.inbox.recv().await {
            self.handle_message(message);
            if self.is_closed {
                self.inbox.close();
                break;
            }
        }

        info!("Room {} closed", self.id);
    }

    fn handle_message(&mut self, message: RoomMessage) {
        match message {
            RoomMessage::Join {
                player_id,
                display_name,
                balance,
                response,
            } => {
                let result = self.handle_join(&player_id, &display_name, balance);
                let _ = response.send(result);
            }
            RoomMessage::Leave {
                player_id,
                response,
            } => {
                let result = self.handle_leave(&player_id);
                let _ = response.send(result);
            }
            RoomMessage::Act {
                player_id,
                command,
                response,
            } => {
                let result = self.handle_command(&player_id, command);
                let _ = response.send(result);
            }
            RoomMessage::GetView { response } => {
                let _ = response.send(self.state.view());
            }
            RoomMessage::Subscribe { player_id, sender } => {
                let snapshot = RoomEvent::StateSnapshot {
                    state: Box::new(self.state.view()),
                };
                if sender.try_send(snapshot).is_ok() {
                    debug!("{player_id} subscribed to room {}", self.id);
                    self.subscribers.insert(player_id, sender);
                }
            }
            RoomMessage::Unsubscribe { player_id } => {
                self.subscribers.remove(&player_id);
                debug!("{player_id} unsubscribed from room {}", self.id);
            }
            RoomMessage::Scheduled(event) => self.handle_scheduled(event),
        }
    }

    fn handle_join(&mut self, player_id: &PlayerId, display_name: &str, balance: Chips) -> RoomResponse {
        match actions::join(&self.state, player_id, display_name, balance) {
            Ok(next) => {
                info!("Room {}: {player_id} joined", self.id);
                self.commit(next);
                RoomResponse::Success
            }
            Err(rejection) => RoomResponse::Rejected(rejection),
        }
    }

    fn handle_leave(&mut self, player_id: &PlayerId) -> RoomResponse {
        match actions::leave(&self.state, player_id) {
            Ok(next) => {
                info!("Room {}: {player_id} left", self.id);
                self.subscribers.remove(player_id);
                self.commit(next);
                let room_closed = self.state.players.is_empty();
                self.is_closed = room_closed;
                RoomResponse::Left { room_closed }
            }
            Err(rejection) => RoomResponse::Rejected(rejection),
        }
    }

    fn handle_command(&mut self, player_id: &PlayerId, command: Command) -> RoomResponse {
        match actions::apply(&self.state, player_id, command) {
            Ok(next) => {
                self.commit(next);
                RoomResponse::Success
            }
            Err(rejection) => {
                debug!("Room {}: {player_id} {command} rejected: {rejection}", self.id);
                self.send_to(
                    player_id,
                    RoomEvent::ActionRejected {
                        player_id: player_id.clone(),
                        kind: command.kind(),
                        reason: rejection.to_string(),
                    },
                );
                RoomResponse::Rejected(rejection)
            }
        }
    }

    fn handle_scheduled(&mut self, event: ScheduledEvent) {
        if event.round_id != self.state.round_id {
            debug!("Room {}: dropping {:?} from an old round", self.id, event.kind);
            return;
        }

        let result = match &event.kind {
            ScheduledKind::DealerPlay => dealer::play_dealer_turn(&self.state),
            ScheduledKind::NextRound => state_machine::start_next_round(&self.state),
            ScheduledKind::TurnTimeout {
                player_id,
                turn_seq,
            } => actions::auto_stand(&self.state, player_id, *turn_seq),
            ScheduledKind::BettingTimeout => actions::sit_out_idle_bettors(&self.state),
        };

        match result {
            Ok(next) => self.commit(next),
            Err(rejection) => {
                debug!("Room {}: {:?} no longer applies: {rejection}", self.id, event.kind);
            }
        }
    }

    /// Installs a new state and reacts to whatever it queued.
    fn commit(&mut self, next: RoundState) {
        self.state = next;
        for event in self.state.drain_events() {
            self.on_game_event(event);
        }
        self.broadcast(RoomEvent::StateSnapshot {
            state: Box::new(self.state.view()),
        });
    }

    fn on_game_event(&mut self, event: GameEvent) {
        match event {
            GameEvent::PhaseChanged { phase, message } => {
                let current_turn = if phase == self.state.phase {
                    self.state.current_turn.clone()
                } else {
                    None
                };
                self.broadcast(RoomEvent::PhaseChanged {
                    phase,
                    message,
                    current_turn,
                });
                match phase {
                    Phase::Betting => {
                        self.schedule(self.config.betting_timeout(), ScheduledKind::BettingTimeout)
                    }
                    Phase::DealerTurn => {
                        self.schedule(self.config.dealer_delay(), ScheduledKind::DealerPlay)
                    }
                    Phase::RoundOver => {
                        self.schedule(self.config.next_round_delay(), ScheduledKind::NextRound)
                    }
                    _ => {}
                }
            }
            GameEvent::TurnStarted {
                player_id,
                turn_seq,
            } => self.schedule(
                self.config.turn_timeout(),
                ScheduledKind::TurnTimeout {
                    player_id,
                    turn_seq,
                },
            ),
            GameEvent::Reshuffled => info!("Room {}: shoe reshuffled", self.id),
            GameEvent::Settled(settlement) => self.persist(settlement),
        }
    }

    /// Delivers `kind` back to this room after `delay`, tagged with the
    /// current round.
    fn schedule(&self, delay: Duration, kind: ScheduledKind) {
        let event = ScheduledEvent {
            round_id: self.state.round_id,
            kind,
        };
        let scheduler = self.scheduler.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(sender) = scheduler.upgrade() {
                let _ = sender.send(RoomMessage::Scheduled(event)).await;
            }
        });
    }

    /// Fire-and-forget write of a settled bet. Failures are logged only.
    fn persist(&self, settlement: Settlement) {
        let repository = Arc::clone(&self.repository);
        let room_id = self.id.clone();
        tokio::spawn(async move {
            let Settlement {
                player_id,
                outcome,
                delta,
                ..
            } = settlement;
            if let Err(e) =
                with_default_timeout(repository.apply_balance_delta(&player_id, delta)).await
            {
                error!("Room {room_id}: failed to apply {delta} to {player_id}: {e}");
            }
            if let Err(e) =
                with_default_timeout(repository.record_round_outcome(&player_id, outcome)).await
            {
                error!("Room {room_id}: failed to record {outcome} for {player_id}: {e}");
            }
        });
    }

    /// Broadcast to every subscriber, dropping the ones that hung up.
    fn broadcast(&mut self, event: RoomEvent) {
        let room_id = &self.id;
        self.subscribers
            .retain(|player_id, sender| match sender.try_send(event.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("Room {room_id}: {player_id} channel full, dropping event");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("Room {room_id}: {player_id} disconnected, removing");
                    false
                }
            });
    }

    fn send_to(&mut self, player_id: &PlayerId, event: RoomEvent) {
        if let Some(sender) = self.subscribers.get(player_id)
            && let Err(mpsc::error::TrySendError::Closed(_)) = sender.try_send(event)
        {
            self.subscribers.remove(player_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{InMemoryProfileRepository, PlayerProfile},
        game::{
            entities::{Card, Deck, PlayerStatus, Rank, Suit, TurnOutcome},
            state_machine::Rejection,
        },
    };
    use uuid::Uuid;

    fn fast_config() -> RoomConfig {
        RoomConfig {
            dealer_delay_ms: 10,
            next_round_delay_ms: 30,
            turn_timeout_ms: 10_000,
            betting_timeout_ms: 10_000,
            ..RoomConfig::default()
        }
    }

    fn rigged(config: &RoomConfig, ranks: &[Rank]) -> RoundState {
        let cards = ranks
            .iter()
            .map(|&rank| Card::new(rank, Suit::Clubs))
            .collect();
        RoundState::with_deck(config.game_settings(), Deck::stacked(cards, 1))
    }

    fn spawn_room(
        config: RoomConfig,
        state: RoundState,
        repository: Arc<dyn ProfileRepository>,
    ) -> RoomHandle {
        let (actor, handle) = RoomActor::with_state(RoomId::new("test"), config, state, repository);
        tokio::spawn(actor.run());
        handle
    }

    async fn wait_for_phase(events: &mut mpsc::Receiver<RoomEvent>, phase: Phase) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while let Some(event) = events.recv().await {
                if let RoomEvent::PhaseChanged { phase: seen, .. } = event
                    && seen == phase
                {
                    return;
                }
            }
            panic!("event stream closed before {phase}");
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {phase}"));
    }

    #[tokio::test]
    async fn dealer_plays_after_delay_and_next_round_opens() {
        let config = RoomConfig {
            next_round_delay_ms: 300,
            ..fast_config()
        };
        let alice = PlayerId::new("alice");
        let repo = Arc::new(InMemoryProfileRepository::with_profiles([PlayerProfile::new(
            alice.clone(),
            "Alice",
            1000,
        )]));
        // alice 10, 9 ; dealer 6, (5), draws 3, 4 -> 18
        let state = rigged(
            &config,
            &[Rank::Ten, Rank::Six, Rank::Nine, Rank::Five, Rank::Three, Rank::Four],
        );
        let room = spawn_room(config, state, repo.clone());

        let (tx, mut events) = mpsc::channel(256);
        assert_eq!(room.join(&alice, "Alice", 1000).await, Ok(RoomResponse::Success));
        room.subscribe(&alice, tx).await.unwrap();

        room.act(&alice, Command::PlaceBet { amount: 40 }).await.unwrap();
        room.act(&alice, Command::Stand).await.unwrap();
        wait_for_phase(&mut events, Phase::RoundOver).await;

        let view = room.view().await.unwrap();
        assert_eq!(view.dealer.score, 18);
        assert_eq!(view.players[0].balance, 1040);
        assert_eq!(view.players[0].status_label, "won");

        wait_for_phase(&mut events, Phase::Betting).await;
        let view = room.view().await.unwrap();
        assert_eq!(view.players[0].status, PlayerStatus::Betting);
        assert!(view.players[0].hand.is_empty());

        // Persistence runs on its own task.
        let mut profile = None;
        for _ in 0..50 {
            let current = repo.fetch_profile(&alice).await.unwrap().unwrap();
            if current.games_played == 1 {
                profile = Some(current);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let profile = profile.expect("settlement was never persisted");
        assert_eq!(profile.balance, 1040);
        assert_eq!(profile.wins, 1);
    }

    #[tokio::test]
    async fn turn_timeout_stands_for_idle_player() {
        let config = RoomConfig {
            turn_timeout_ms: 30,
            dealer_delay_ms: 10_000,
            ..fast_config()
        };
        let alice = PlayerId::new("alice");
        let state = rigged(&config, &[Rank::Ten, Rank::Six, Rank::Seven, Rank::King]);
        let room = spawn_room(config, state, Arc::new(InMemoryProfileRepository::new()));

        let (tx, mut events) = mpsc::channel(256);
        room.join(&alice, "Alice", 1000).await.unwrap();
        room.subscribe(&alice, tx).await.unwrap();
        room.act(&alice, Command::PlaceBet { amount: 10 }).await.unwrap();

        wait_for_phase(&mut events, Phase::DealerTurn).await;
        let view = room.view().await.unwrap();
        assert_eq!(
            view.players[0].status,
            PlayerStatus::Finished {
                turn: TurnOutcome::Stood
            }
        );
        assert!(
            view.message_log
                .iter()
                .any(|line| line.contains("ran out of time"))
        );
    }

    #[tokio::test]
    async fn rejection_goes_only_to_the_sender() {
        let config = fast_config();
        let alice = PlayerId::new("alice");
        let bob = PlayerId::new("bob");
        let state = rigged(
            &config,
            &[Rank::Ten, Rank::Nine, Rank::Five, Rank::Six, Rank::Seven, Rank::King],
        );
        let room = spawn_room(config, state, Arc::new(InMemoryProfileRepository::new()));

        room.join(&alice, "Alice", 1000).await.unwrap();
        room.join(&bob, "Bob", 1000).await.unwrap();
        let (alice_tx, mut alice_events) = mpsc::channel(256);
        let (bob_tx, mut bob_events) = mpsc::channel(256);
        room.subscribe(&alice, alice_tx).await.unwrap();
        room.subscribe(&bob, bob_tx).await.unwrap();
        room.act(&alice, Command::PlaceBet { amount: 10 }).await.unwrap();
        room.act(&bob, Command::PlaceBet { amount: 10 }).await.unwrap();

        let before = room.view().await.unwrap();
        assert_eq!(
            room.act(&bob, Command::Hit).await,
            Ok(RoomResponse::Rejected(Rejection::NotCurrentTurn))
        );
        assert_eq!(room.view().await.unwrap(), before);

        let mut bob_rejections = 0;
        while let Ok(event) = bob_events.try_recv() {
            if let RoomEvent::ActionRejected { player_id, .. } = event {
                assert_eq!(player_id, bob);
                bob_rejections += 1;
            }
        }
        assert_eq!(bob_rejections, 1);
        while let Ok(event) = alice_events.try_recv() {
            assert!(!matches!(event, RoomEvent::ActionRejected { .. }));
        }
    }

    #[tokio::test]
    async fn stale_timers_are_ignored() {
        let config = fast_config();
        let alice = PlayerId::new("alice");
        let state = rigged(&config, &[Rank::Ten, Rank::Six, Rank::Seven, Rank::King]);
        let room = spawn_room(config, state, Arc::new(InMemoryProfileRepository::new()));

        room.join(&alice, "Alice", 1000).await.unwrap();
        room.act(&alice, Command::PlaceBet { amount: 10 }).await.unwrap();
        let before = room.view().await.unwrap();
        assert_eq!(before.phase, Phase::PlayerTurns);

        room.send(RoomMessage::Scheduled(ScheduledEvent {
            round_id: Uuid::new_v4(),
            kind: ScheduledKind::TurnTimeout {
                player_id: alice.clone(),
                turn_seq: 1,
            },
        }))
        .await
        .unwrap();
        room.send(RoomMessage::Scheduled(ScheduledEvent {
            round_id: before.round_id,
            kind: ScheduledKind::DealerPlay,
        }))
        .await
        .unwrap();

        assert_eq!(room.view().await.unwrap(), before);
    }

    #[tokio::test]
    async fn last_leave_closes_the_room() {
        let alice = PlayerId::new("alice");
        let (actor, room) = RoomActor::new(
            RoomId::new("solo"),
            fast_config(),
            Arc::new(InMemoryProfileRepository::new()),
        );
        let task = tokio::spawn(actor.run());

        room.join(&alice, "Alice", 1000).await.unwrap();
        assert_eq!(
            room.leave(&alice).await,
            Ok(RoomResponse::Left { room_closed: true })
        );
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(room.is_closed());
        assert_eq!(
            room.view().await,
            Err(RoomError::RoomClosed(RoomId::new("solo")))
        );
    }

    #[tokio::test]
    async fn forfeit_is_persisted_as_a_loss() {
        let config = fast_config();
        let alice = PlayerId::new("alice");
        let bob = PlayerId::new("bob");
        let repo = Arc::new(InMemoryProfileRepository::with_profiles([
            PlayerProfile::new(alice.clone(), "Alice", 1000),
            PlayerProfile::new(bob.clone(), "Bob", 1000),
        ]));
        let state = rigged(
            &config,
            &[Rank::Ten, Rank::Nine, Rank::Five, Rank::Six, Rank::Seven, Rank::King],
        );
        let room = spawn_room(config, state, repo.clone());

        room.join(&alice, "Alice", 1000).await.unwrap();
        room.join(&bob, "Bob", 1000).await.unwrap();
        room.act(&alice, Command::PlaceBet { amount: 25 }).await.unwrap();
        room.act(&bob, Command::PlaceBet { amount: 10 }).await.unwrap();
        room.leave(&alice).await.unwrap();

        let view = room.view().await.unwrap();
        assert_eq!(view.current_turn, Some(bob.clone()));

        let mut persisted = false;
        for _ in 0..50 {
            let profile = repo.fetch_profile(&alice).await.unwrap().unwrap();
            if profile.losses == 1 {
                assert_eq!(profile.balance, 975);
                persisted = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(persisted);
    }
}
