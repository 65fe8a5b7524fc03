mod error;
mod mutations;
mod queries;
pub mod rotation;
mod store;
mod writer;

pub use error::EngineError;
pub use mutations::{AreaPatch, RoomPatch};
pub use rotation::{plan_rotation, Pick};
pub use store::RotaState;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, RwLock, RwLockReadGuard};

use crate::model::*;
use crate::notify::{NotifyHub, Topic};
use crate::wal::Wal;

use writer::{wal_writer_loop, WalCommand};

/// One tenant's rota. All state sits behind a single lock so a generation
/// pass reads a consistent roster and replaces a week's rows atomically.
pub struct Engine {
    state: RwLock<RotaState>,
    wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
}

impl Engine {
    /// Replay the WAL at `wal_path` and start its writer task. Must run inside a Tokio runtime.
    pub fn new(wal_path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let mut state = RotaState::new();
        for event in &events {
            state.apply(event);
        }
        tracing::debug!(
            "replayed {} events from {}: {} rooms, {} areas",
            events.len(),
            wal_path.display(),
            state.room_count(),
            state.area_count()
        );

        Ok(Self {
            state: RwLock::new(state),
            wal_tx,
            notify,
        })
    }

    /// Shared read access for queries.
    pub async fn read(&self) -> RwLockReadGuard<'_, RotaState> {
        self.state.read().await
    }

    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// WAL-append, apply, notify. The caller holds the write lock.
    pub(super) async fn persist_and_apply(
        &self,
        state: &mut RotaState,
        topic: Topic,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        state.apply(event);
        self.notify.send(topic, event);
        Ok(())
    }

    /// Rewrite the WAL with the events needed to rebuild the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        // Hold the read lock until the writer has swapped files so no append slips in between.
        let state = self.state.read().await;
        let events = state.snapshot_events();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        let result = rx
            .await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()));
        drop(state);
        result
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
