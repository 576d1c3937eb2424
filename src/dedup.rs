// src/dedup.rs
use parking_lot::Mutex;
use std::collections::HashSet;

use crate::deal::DealIdentity;

/// In-memory record of deals already dispatched.
/// - Grows for the lifetime of the process; never pruned, never persisted.
/// - `is_new` does NOT mutate state.
/// - State is updated via `mark_sent` (or `Claim::commit`) after a successful send.
/// - Concurrent pipelines use `try_claim` so only one of them can treat an identity
///   as new at a time.
#[derive(Debug, Default)]
pub struct SentDeals {
    inner: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    sent: HashSet<DealIdentity>,
    in_flight: HashSet<DealIdentity>,
}

impl SentDeals {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the identity was neither sent nor is currently being dispatched.
    pub fn is_new(&self, id: &DealIdentity) -> bool {
        let st = self.inner.lock();
        !st.sent.contains(id) && !st.in_flight.contains(id)
    }

    /// Record a successful dispatch. Returns false if it was already recorded.
    pub fn mark_sent(&self, id: DealIdentity) -> bool {
        let mut st = self.inner.lock();
        st.in_flight.remove(&id);
        st.sent.insert(id)
    }

    /// Atomically check-and-reserve `id`.
    ///
    /// Returns `None` if it was already sent or another pipeline holds it. The
    /// reservation is released on drop unless [`Claim::commit`] is called.
    pub fn try_claim(&self, id: DealIdentity) -> Option<Claim<'_>> {
        let mut st = self.inner.lock();
        if st.sent.contains(&id) || !st.in_flight.insert(id.clone()) {
            return None;
        }
        Some(Claim {
            owner: self,
            id: Some(id),
        })
    }

    pub fn len(&self) -> usize {
        self.inner.lock().sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, id: &DealIdentity) {
        self.inner.lock().in_flight.remove(id);
    }
}

/// Exclusive right to dispatch one identity.
#[must_use = "dropping a claim releases it immediately"]
#[derive(Debug)]
pub struct Claim<'a> {
    owner: &'a SentDeals,
    id: Option<DealIdentity>,
}

impl Claim<'_> {
    pub fn identity(&self) -> Option<&DealIdentity> {
        self.id.as_ref()
    }

    /// Mark the identity as sent.
    pub fn commit(mut self) {
        if let Some(id) = self.id.take() {
            self.owner.mark_sent(id);
        }
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.owner.release(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn id(n: u32) -> DealIdentity {
        DealIdentity::new(&format!("deal {n}"), "https://shop.test/item")
    }

    #[test]
    fn mark_sent_is_sticky() {
        let d = SentDeals::new();
        assert!(d.is_new(&id(1)));
        assert!(d.mark_sent(id(1)));
        assert!(!d.is_new(&id(1)));
        assert!(!d.is_new(&id(1)));
        assert!(!d.mark_sent(id(1)));
        assert!(d.is_new(&id(2)));
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn second_claim_is_refused_while_first_held() {
        let d = SentDeals::new();
        let first = d.try_claim(id(1)).expect("first claim");
        assert!(d.try_claim(id(1)).is_none());
        assert!(!d.is_new(&id(1)));
        first.commit();
        assert!(d.try_claim(id(1)).is_none());
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn claim_carries_its_identity() {
        let d = SentDeals::new();
        let c = d.try_claim(id(3)).expect("claim");
        assert_eq!(c.identity(), Some(&id(3)));
        c.commit();
        assert!(!d.is_new(&id(3)));
    }

    #[test]
    fn dropped_claim_releases_identity() {
        let d = SentDeals::new();
        {
            let _c = d.try_claim(id(7)).expect("claim");
        }
        assert!(d.is_new(&id(7)));
        assert!(d.is_empty());
        assert!(d.try_claim(id(7)).is_some());
    }

    #[test]
    fn concurrent_claims_yield_exactly_one_winner() {
        let d = Arc::new(SentDeals::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let d = Arc::clone(&d);
                std::thread::spawn(move || match d.try_claim(id(42)) {
                    Some(c) => {
                        c.commit();
                        1
                    }
                    None => 0,
                })
            })
            .collect();
        let winners: i32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(winners, 1);
        assert!(!d.is_new(&id(42)));
    }
}
