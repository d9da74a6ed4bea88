//! Congestion-recovery episode boundaries.
//!
//! A record is in recovery when any of the recovery bits of its `t_flags`
//! word is set. An episode opens on the first such record and closes on the
//! first record after it with none of them set.

use log::debug;

use crate::schema::flags::recovery_flags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryState {
    #[default]
    Idle,
    InEpisode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterEvent {
    /// Carries the 1-based number of the episode that began.
    EpisodeStarted(u32),
    /// Carries the 1-based number of the episode that ended.
    EpisodeClosed(u32),
}

#[derive(Debug, Default)]
pub struct RecoverySegmenter {
    state: RecoveryState,
    episodes: u32,
}

impl RecoverySegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the `t_flags` word of the next record of the flow.
    pub fn observe(&mut self, t_flags: u32) -> Option<SegmenterEvent> {
        let in_recovery = recovery_flags(t_flags) != 0;
        match (self.state, in_recovery) {
            (RecoveryState::Idle, true) => {
                self.state = RecoveryState::InEpisode;
                self.episodes += 1;
                debug!("recovery episode {} started", self.episodes);
                Some(SegmenterEvent::EpisodeStarted(self.episodes))
            }
            (RecoveryState::InEpisode, false) => {
                self.state = RecoveryState::Idle;
                debug!("recovery episode {} closed", self.episodes);
                Some(SegmenterEvent::EpisodeClosed(self.episodes))
            }
            _ => None,
        }
    }

    pub fn state(&self) -> RecoveryState {
        self.state
    }

    pub fn in_episode(&self) -> bool {
        self.state == RecoveryState::InEpisode
    }

    /// Number of the current (or last) episode; zero before the first one.
    pub fn current_episode(&self) -> u32 {
        self.episodes
    }

    pub fn episodes(&self) -> u32 {
        self.episodes
    }
}
