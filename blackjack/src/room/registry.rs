//! Room registry: finds, creates, and forgets room actors.

use log::info;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{RwLock, mpsc};

use super::{
    actor::{RoomActor, RoomHandle},
    config::RoomConfig,
    messages::{RoomError, RoomEvent, RoomResponse, RoomSummary},
};
use crate::{
    db::ProfileRepository,
    game::{
        Command, RoundView,
        entities::{Chips, PlayerId, RoomId},
    },
};

/// A join that races a closing room retries on a fresh one this many times.
const JOIN_ATTEMPTS: usize = 2;

/// Process-wide index of live rooms. Rooms are created on first join and
/// dropped when their last player leaves.
pub struct RoomRegistry {
    config: RoomConfig,

    repository: Arc<dyn ProfileRepository>,

    rooms: Arc<RwLock<HashMap<RoomId, RoomHandle>>>,
}

impl RoomRegistry {
    pub fn new(config: RoomConfig, repository: Arc<dyn ProfileRepository>) -> Self {
        Self {
            config,
            repository,
            rooms: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn repository(&self) -> &Arc<dyn ProfileRepository> {
        &self.repository
    }

    /// Returns the live room for `room_id`, spawning one if there isn't.
    pub async fn get_or_create(&self, room_id: &RoomId) -> RoomHandle {
        if let Some(handle) = self.get(room_id).await {
            return handle;
        }

        let mut rooms = self.rooms.write().await;
        if let Some(handle) = rooms.get(room_id)
            && !handle.is_closed()
        {
            return handle.clone();
        }

        let (actor, handle) = RoomActor::new(
            room_id.clone(),
            self.config.clone(),
            Arc::clone(&self.repository),
        );
        tokio::spawn(actor.run());
        rooms.insert(room_id.clone(), handle.clone());
        info!("Created room {room_id}");
        handle
    }

    /// Live room for `room_id`, if any. Never creates one.
    pub async fn get(&self, room_id: &RoomId) -> Option<RoomHandle> {
        self.rooms
            .read()
            .await
            .get(room_id)
            .filter(|handle| !handle.is_closed())
            .cloned()
    }

    /// Drops `handle` from the index, unless the entry has already been
    /// replaced by a newer room with the same id.
    pub async fn remove(&self, handle: &RoomHandle) -> bool {
        let mut rooms = self.rooms.write().await;
        match rooms.get(handle.room_id()) {
            Some(current) if current.same_room(handle) => {
                rooms.remove(handle.room_id());
                info!("Removed room {}", handle.room_id());
                true
            }
            _ => false,
        }
    }

    pub async fn join(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
        display_name: &str,
        balance: Chips,
    ) -> Result<RoomResponse, RoomError> {
        for _ in 0..JOIN_ATTEMPTS {
            let handle = self.get_or_create(room_id).await;
            match handle.join(player_id, display_name, balance).await {
                Err(RoomError::RoomClosed(_)) => {
                    self.remove(&handle).await;
                }
                result => return result,
            }
        }
        Err(RoomError::RoomClosed(room_id.clone()))
    }

    pub async fn leave(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
    ) -> Result<RoomResponse, RoomError> {
        let handle = self.live(room_id).await?;
        let result = handle.leave(player_id).await;
        if matches!(
            result,
            Ok(RoomResponse::Left { room_closed: true }) | Err(RoomError::RoomClosed(_))
        ) {
            self.remove(&handle).await;
        }
        result
    }

    pub async fn act(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
        command: Command,
    ) -> Result<RoomResponse, RoomError> {
        let handle = self.live(room_id).await?;
        self.remove_if_closed(&handle, handle.act(player_id, command).await)
            .await
    }

    pub async fn snapshot(&self, room_id: &RoomId) -> Result<RoundView, RoomError> {
        let handle = self.live(room_id).await?;
        self.remove_if_closed(&handle, handle.view().await).await
    }

    pub async fn subscribe(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
        sender: mpsc::Sender<RoomEvent>,
    ) -> Result<(), RoomError> {
        let handle = self.live(room_id).await?;
        self.remove_if_closed(&handle, handle.subscribe(player_id, sender).await)
            .await
    }

    pub async fn unsubscribe(&self, room_id: &RoomId, player_id: &PlayerId) -> Result<(), RoomError> {
        let handle = self.live(room_id).await?;
        self.remove_if_closed(&handle, handle.unsubscribe(player_id).await)
            .await
    }

    /// Summaries of every live room, sorted by id.
    pub async fn list_rooms(&self) -> Vec<RoomSummary> {
        let handles: Vec<RoomHandle> = self.rooms.read().await.values().cloned().collect();
        let mut summaries = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(view) = handle.view().await {
                summaries.push(RoomSummary::from_view(handle.room_id().clone(), &view));
            }
        }
        summaries.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        summaries
    }

    pub async fn room_count(&self) -> usize {
        self.rooms
            .read()
            .await
            .values()
            .filter(|handle| !handle.is_closed())
            .count()
    }

    async fn live(&self, room_id: &RoomId) -> Result<RoomHandle, RoomError> {
        self.get(room_id)
            .await
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))
    }

    async fn remove_if_closed<T>(
        &self,
        handle: &RoomHandle,
        result: Result<T, RoomError>,
    ) -> Result<T, RoomError> {
        if let Err(RoomError::RoomClosed(_)) = &result {
            self.remove(handle).await;
        }
        result
    }
}
