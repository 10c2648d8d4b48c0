mod claim;
mod db;
mod events;
mod rooms;
mod stats;
mod token;

use std::sync::Arc;

pub use claim::*;
pub use db::*;
pub use events::*;
pub use rooms::*;
pub use stats::*;
pub use token::*;

use crossbeam::channel::unbounded;
use onair_core::Config;

/// The onair collab system, facilitating room management, viewer rosters, stats and tokens.
pub struct Collab {
    pub rooms: RoomManager,
    pub stats: StreamingStats,
    pub tokens: TokenMinter,
    pub claims: Claims,

    event_receiver: EventReceiver,
}

/// A type passed to various components of the collab system, to access state and emit events.
#[derive(Clone)]
pub struct CollabContext {
    pub database: Arc<dyn Database>,
    pub config: Config,

    event_sender: EventSender,
}

impl Collab {
    pub fn new(
        database: Arc<dyn Database>,
        config: Config,
        credentials: Option<EngineCredentials>,
    ) -> Self {
        let (event_sender, event_receiver) = unbounded();

        let context = CollabContext {
            database,
            config: config.clone(),
            event_sender,
        };

        Self {
            rooms: RoomManager::new(&context),
            stats: StreamingStats::new(&context),
            tokens: TokenMinter::new(credentials, config.token_effective_time_in_seconds()),
            claims: Claims,
            event_receiver,
        }
    }

    /// Blocks until the next event is emitted
    pub fn wait_for_event(&self) -> Option<CollabEvent> {
        self.event_receiver.recv().ok()
    }

    /// Returns the next event if one is pending
    pub fn try_next_event(&self) -> Option<CollabEvent> {
        self.event_receiver.try_recv().ok()
    }
}

impl CollabContext {
    pub fn emit(&self, event: CollabEvent) {
        // Only fails once the collab, and with it the receiver, is gone
        let _ = self.event_sender.send(event);
    }
}
