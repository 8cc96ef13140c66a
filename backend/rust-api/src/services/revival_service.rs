use std::sync::Arc;

use rand::Rng;

use crate::error::QuizError;
use crate::metrics::PARTICIPANTS_REVIVED_TOTAL;
use crate::models::{Participant, Session};
use crate::repositories::Repositories;
use crate::services::locks::SessionLocks;
use crate::services::notifier::Notifier;
use crate::services::pacing::{PacingConfig, PacingPhase};

/// Uniform sample of `count` items without replacement: a full Fisher-Yates
/// shuffle, then the first `count`.
pub fn select_revivals<T, R: Rng + ?Sized>(mut pool: Vec<T>, count: usize, rng: &mut R) -> Vec<T> {
    for i in (1..pool.len()).rev() {
        let j = rng.random_range(0..=i);
        pool.swap(i, j);
    }
    pool.truncate(count);
    pool
}

pub struct RevivalService {
    repos: Repositories,
    locks: Arc<SessionLocks>,
    notifier: Notifier,
    pacing: PacingConfig,
}

impl RevivalService {
    pub fn new(
        repos: Repositories,
        locks: Arc<SessionLocks>,
        notifier: Notifier,
        pacing: PacingConfig,
    ) -> Self {
        Self {
            repos,
            locks,
            notifier,
            pacing,
        }
    }

    async fn revivable_session(&self, session_id: &str) -> Result<Session, QuizError> {
        let session = self
            .repos
            .sessions
            .get_by_id(session_id)
            .await?
            .ok_or(QuizError::SessionNotFound)?;
        if !session.is_active() {
            return Err(QuizError::SessionNotActive);
        }
        if !session.settings.revival_enabled {
            return Err(QuizError::RevivalDisabled);
        }
        Ok(session)
    }

    /// Brings back up to `min(count, revivalCount, pool)` random eliminated
    /// participants. A `count` of zero is treated as one.
    ///
    /// The pool is announced first, then read again under the session lock
    /// after the reveal pause, so concurrent revivals never pick the same
    /// participant twice.
    pub async fn start_revival(
        &self,
        session_id: &str,
        count: u32,
    ) -> Result<Vec<Participant>, QuizError> {
        let requested = count.max(1);

        self.revivable_session(session_id).await?;
        let candidates = self
            .repos
            .participants
            .get_eliminated_by_session(session_id)
            .await?;
        if candidates.is_empty() {
            return Err(QuizError::NoRevivalCandidates);
        }

        self.notifier.revival_start(session_id, &candidates).await;
        self.pacing.hold(PacingPhase::RevivalReveal).await;

        let revived = {
            let _guard = self.locks.exclusive(session_id).await;

            let session = self.revivable_session(session_id).await?;
            let pool = self
                .repos
                .participants
                .get_eliminated_by_session(session_id)
                .await?;

            let effective = (requested as usize)
                .min(session.settings.revival_count as usize)
                .min(pool.len());

            let mut selected = {
                let mut rng = rand::rng();
                select_revivals(pool, effective, &mut rng)
            };

            for participant in selected.iter_mut() {
                participant.revive();
                self.repos.participants.update(participant).await?;
            }

            tracing::info!(
                session_id = %session_id,
                requested,
                revived = selected.len(),
                "Revival completed"
            );
            selected
        };

        PARTICIPANTS_REVIVED_TOTAL.inc_by(revived.len() as u64);
        self.notifier.revival_result(session_id, &revived).await;
        Ok(revived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn selection_never_repeats_and_respects_count() {
        let mut rng = StdRng::seed_from_u64(7);
        for count in 0..=12 {
            let pool: Vec<u32> = (0..10).collect();
            let picked = select_revivals(pool, count, &mut rng);
            assert_eq!(picked.len(), count.min(10));
            let unique: HashSet<_> = picked.iter().collect();
            assert_eq!(unique.len(), picked.len());
        }
    }

    #[test]
    fn selection_is_roughly_uniform() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut hits = [0u32; 5];
        for _ in 0..5000 {
            let picked = select_revivals((0..5).collect::<Vec<usize>>(), 1, &mut rng);
            hits[picked[0]] += 1;
        }
        // each bucket expects ~1000
        for h in hits {
            assert!((800..1200).contains(&h), "skewed selection: {:?}", hits);
        }
    }

    #[test]
    fn empty_pool_selects_nothing() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(select_revivals(Vec::<u8>::new(), 3, &mut rng).is_empty());
    }
}
