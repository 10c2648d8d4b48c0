use std::{collections::VecDeque, time::Duration};

use tokio::time::Instant;

use crate::{util::now_millis, Id};

pub type BulletId = Id<Bullet>;

/// A chat or heart message floating over the stream
#[derive(Debug, Clone, PartialEq)]
pub struct Bullet {
    pub id: BulletId,
    pub text: String,
    pub user_id: String,
    pub user_name: Option<String>,
    /// Milliseconds since the unix epoch
    pub timestamp: i64,
}

impl Bullet {
    pub fn new(text: String, user_id: String, user_name: Option<String>) -> Self {
        Self {
            id: BulletId::new(),
            text,
            user_id,
            user_name,
            timestamp: now_millis(),
        }
    }

    /// The name shown next to the bullet
    pub fn display_name(&self) -> &str {
        self.user_name.as_deref().unwrap_or("Anonymous")
    }
}

/// Bullets currently on screen. Each one expires a fixed time after it was shown.
#[derive(Debug)]
pub struct BulletScreen {
    lifetime: Duration,
    shown: VecDeque<(Instant, Bullet)>,
}

impl BulletScreen {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            lifetime,
            shown: VecDeque::new(),
        }
    }

    pub fn show(&mut self, bullet: Bullet) {
        let expires_at = Instant::now() + self.lifetime;
        self.shown.push_back((expires_at, bullet));
    }

    /// When the oldest bullet expires, if any are shown
    pub fn next_expiry(&self) -> Option<Instant> {
        self.shown.front().map(|(at, _)| *at)
    }

    /// Removes expired bullets, returning true if any were removed
    pub fn prune(&mut self, now: Instant) -> bool {
        let before = self.shown.len();

        // Bullets are pushed in expiry order
        while matches!(self.shown.front(), Some((at, _)) if *at <= now) {
            self.shown.pop_front();
        }

        self.shown.len() != before
    }

    pub fn bullets(&self) -> Vec<Bullet> {
        self.shown.iter().map(|(_, b)| b.clone()).collect()
    }
}
