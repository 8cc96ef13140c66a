use std::time::Duration;

/// Presentation pauses between related broadcasts.
///
/// These exist so clients can animate one event before the next one lands.
/// They are not synchronization points: no lock is held while waiting and
/// anything that happens during the pause is picked up by re-reading state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacingPhase {
    /// Between `question_end` and `round_result`.
    RoundResult,
    /// Between `revival_start` and the selection that feeds `revival_result`.
    RevivalReveal,
}

impl PacingPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PacingPhase::RoundResult => "round_result",
            PacingPhase::RevivalReveal => "revival_reveal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingConfig {
    pub round_result_delay: Duration,
    pub revival_reveal_delay: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            round_result_delay: Duration::from_secs(2),
            revival_reveal_delay: Duration::from_secs(3),
        }
    }
}

impl PacingConfig {
    pub fn immediate() -> Self {
        Self {
            round_result_delay: Duration::ZERO,
            revival_reveal_delay: Duration::ZERO,
        }
    }

    pub fn delay(&self, phase: PacingPhase) -> Duration {
        match phase {
            PacingPhase::RoundResult => self.round_result_delay,
            PacingPhase::RevivalReveal => self.revival_reveal_delay,
        }
    }

    /// Waits out the pause for `phase`. Callers must not hold session locks here.
    pub async fn hold(&self, phase: PacingPhase) {
        let delay = self.delay(phase);
        if delay.is_zero() {
            return;
        }
        tracing::debug!(phase = phase.as_str(), ?delay, "Pacing pause");
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_map_to_phases() {
        let pacing = PacingConfig::default();
        assert_eq!(pacing.delay(PacingPhase::RoundResult), Duration::from_secs(2));
        assert_eq!(pacing.delay(PacingPhase::RevivalReveal), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn hold_sleeps_for_configured_delay() {
        let pacing = PacingConfig::default();
        let start = tokio::time::Instant::now();
        pacing.hold(PacingPhase::RevivalReveal).await;
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn immediate_does_not_wait() {
        let start = std::time::Instant::now();
        PacingConfig::immediate().hold(PacingPhase::RoundResult).await;
        assert!(start.elapsed() < Duration::from_millis(500));
    }
}
