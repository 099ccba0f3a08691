use std::time::Duration;
use tokio::time::Instant;

/// Longest delay honoured between two fetches against one domain
pub const MAX_CRAWL_DELAY: Duration = Duration::from_secs(60 * 60);

/// Tracks politeness bookkeeping for a domain during crawling
///
/// `last_visit` holds the most recent fetch start that has been handed out
/// (or the most recent fetch completion, whichever is later). It never moves
/// backwards, so every worker computes its start against the latest commitment.
#[derive(Debug, Clone)]
pub struct DomainVisitState {
    /// Time of the last fetch slot against this domain; `None` before the first
    pub last_visit: Option<Instant>,

    /// Minimum time between two fetches against this domain
    pub crawl_delay: Duration,
}

impl DomainVisitState {
    /// Creates the state of a domain that has not been visited yet
    ///
    /// Delays above [`MAX_CRAWL_DELAY`] are capped.
    pub fn new(crawl_delay: Duration) -> Self {
        Self {
            last_visit: None,
            crawl_delay: crawl_delay.min(MAX_CRAWL_DELAY),
        }
    }

    /// Returns the earliest instant a new fetch may start
    pub fn next_allowed(&self, now: Instant) -> Instant {
        let Some(last) = self.last_visit else {
            return now;
        };
        let delay = self.crawl_delay.min(MAX_CRAWL_DELAY);
        let next = last
            .checked_add(delay)
            .or_else(|| last.checked_add(MAX_CRAWL_DELAY))
            .unwrap_or(last);
        next.max(now)
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now, or the duration to wait otherwise.
    pub fn time_until_next_request(&self, now: Instant) -> Option<Duration> {
        let wait = self.next_allowed(now).saturating_duration_since(now);
        (!wait.is_zero()).then_some(wait)
    }

    /// Reserves the next fetch slot and returns its start time
    ///
    /// The reservation is recorded as the last visit, so a second caller
    /// racing for the same domain is pushed back by a full crawl delay.
    pub fn reserve_slot(&mut self, now: Instant) -> Instant {
        let start = self.next_allowed(now);
        self.last_visit = Some(start);
        start
    }

    /// Records that a fetch against this domain finished at `now`
    pub fn record_visit(&mut self, now: Instant) {
        self.last_visit = Some(match self.last_visit {
            Some(last) => last.max(now),
            None => now,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(1000);

    #[test]
    fn test_new_domain_state() {
        let state = DomainVisitState::new(DELAY);
        assert!(state.last_visit.is_none());
        assert_eq!(state.crawl_delay, DELAY);
    }

    #[test]
    fn test_unvisited_domain_is_ready() {
        let state = DomainVisitState::new(DELAY);
        let now = Instant::now();
        assert_eq!(state.next_allowed(now), now);
        assert!(state.time_until_next_request(now).is_none());
    }

    #[test]
    fn test_time_until_next_request() {
        let mut state = DomainVisitState::new(DELAY);
        let now = Instant::now();
        state.last_visit = Some(now);

        assert_eq!(state.time_until_next_request(now), Some(DELAY));

        let soon = now + Duration::from_millis(400);
        assert_eq!(
            state.time_until_next_request(soon),
            Some(Duration::from_millis(600))
        );

        let later = now + Duration::from_millis(1100);
        assert!(state.time_until_next_request(later).is_none());
    }

    #[test]
    fn test_reservations_are_spaced_by_delay() {
        let mut state = DomainVisitState::new(DELAY);
        let now = Instant::now();

        let first = state.reserve_slot(now);
        let second = state.reserve_slot(now);
        let third = state.reserve_slot(now);

        assert_eq!(first, now);
        assert_eq!(second, now + DELAY);
        assert_eq!(third, now + DELAY * 2);
    }

    #[test]
    fn test_huge_delay_is_capped() {
        let mut state = DomainVisitState::new(Duration::MAX);
        assert_eq!(state.crawl_delay, MAX_CRAWL_DELAY);

        let now = Instant::now();
        state.reserve_slot(now);
        assert_eq!(state.reserve_slot(now), now + MAX_CRAWL_DELAY);
    }

    #[test]
    fn test_reserve_slot_never_overflows() {
        let mut state = DomainVisitState::new(DELAY);
        state.crawl_delay = Duration::MAX;

        let now = Instant::now();
        state.reserve_slot(now);
        assert_eq!(state.reserve_slot(now), now + MAX_CRAWL_DELAY);
    }

    #[test]
    fn test_record_visit_is_monotonic() {
        let mut state = DomainVisitState::new(DELAY);
        let now = Instant::now();

        let reserved = state.reserve_slot(now + Duration::from_secs(5));
        state.record_visit(now + Duration::from_secs(1));
        assert_eq!(state.last_visit, Some(reserved));

        state.record_visit(now + Duration::from_secs(9));
        assert_eq!(state.last_visit, Some(now + Duration::from_secs(9)));
    }
}
