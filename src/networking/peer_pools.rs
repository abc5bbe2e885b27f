// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! The five TTL'd, address-keyed peer candidate pools (§4.8): addresses a
//! peer hasn't tried yet, addresses currently connected, addresses tried
//! too recently to retry, addresses known healthy, and addresses banned.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// How long an address sits in `unused` before it's evicted as stale.
pub const UNUSED_CANDIDATE_TTL: Duration = Duration::from_secs(30 * 60);
/// How often `unused` is swept for stale entries.
pub const UNUSED_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);
/// How long an address stays in `recently_attempted` before it's retryable.
pub const RECENTLY_ATTEMPTED_TTL: Duration = Duration::from_secs(30);
/// How often `recently_attempted` is swept.
pub const RECENTLY_ATTEMPTED_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);
/// How long a peer stays in `healthy` without being re-seen before it's dropped.
pub const HEALTHY_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// How long a ban lasts.
pub const BAN_TTL: Duration = Duration::from_secs(3 * 60 * 60);

/// The five pools tracking peer addresses across their lifecycle.
#[derive(Default)]
pub struct PeerPools {
    unused_peer_candidates: BTreeMap<SocketAddr, Instant>,
    currently_used: std::collections::BTreeSet<SocketAddr>,
    recently_attempted: BTreeMap<SocketAddr, Instant>,
    healthy: BTreeMap<SocketAddr, (Instant, u32)>,
    banned: BTreeMap<SocketAddr, Instant>,
    last_unused_cleanup: Option<Instant>,
    last_attempted_cleanup: Option<Instant>,
}

impl PeerPools {
    /// An empty set of pools.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `addr` as a candidate to try, unless it's banned, already in use,
    /// or already known healthy.
    pub fn offer_candidate(&mut self, addr: SocketAddr, now: Instant) {
        if self.banned.contains_key(&addr) || self.currently_used.contains(&addr) || self.healthy.contains_key(&addr)
        {
            return;
        }
        self.unused_peer_candidates.entry(addr).or_insert(now);
    }

    /// Pop the next candidate to dial, skipping anything recently attempted.
    pub fn take_candidate(&mut self, now: Instant) -> Option<SocketAddr> {
        let addr = self
            .unused_peer_candidates
            .keys()
            .find(|a| {
                self.recently_attempted
                    .get(a)
                    .map(|&t| now.duration_since(t) >= RECENTLY_ATTEMPTED_TTL)
                    .unwrap_or(true)
            })
            .copied()?;
        self.unused_peer_candidates.remove(&addr);
        self.currently_used.insert(addr);
        self.recently_attempted.insert(addr, now);
        Some(addr)
    }

    /// Number of addresses currently dialed or connected.
    pub fn currently_used_count(&self) -> usize {
        self.currently_used.len()
    }

    /// Mark `addr` healthy with the given capability bitflags.
    pub fn mark_healthy(&mut self, addr: SocketAddr, capabilities: u32, now: Instant) {
        self.currently_used.insert(addr);
        self.healthy.insert(addr, (now, capabilities));
    }

    /// Remove `addr` from the in-use and healthy sets, returning it to
    /// `unused` so it can be retried later.
    pub fn release(&mut self, addr: SocketAddr, now: Instant) {
        self.currently_used.remove(&addr);
        self.healthy.remove(&addr);
        if !self.banned.contains_key(&addr) {
            self.unused_peer_candidates.insert(addr, now);
        }
    }

    /// Ban `addr` for [`BAN_TTL`], dropping it from every other pool.
    pub fn ban(&mut self, addr: SocketAddr, now: Instant) {
        self.currently_used.remove(&addr);
        self.healthy.remove(&addr);
        self.unused_peer_candidates.remove(&addr);
        self.banned.insert(addr, now);
    }

    /// Whether `addr` is currently banned.
    pub fn is_banned(&self, addr: &SocketAddr) -> bool {
        self.banned.contains_key(addr)
    }

    /// Currently healthy addresses and their capability bitflags.
    pub fn healthy_peers(&self) -> impl Iterator<Item = (SocketAddr, u32)> + '_ {
        self.healthy.iter().map(|(&addr, &(_, caps))| (addr, caps))
    }

    /// Number of healthy peers.
    pub fn healthy_count(&self) -> usize {
        self.healthy.len()
    }

    /// Number of candidates waiting to be dialed.
    pub fn unused_count(&self) -> usize {
        self.unused_peer_candidates.len()
    }

    /// Sweep every pool for TTL-expired entries, at most once per pool's own
    /// cleanup interval.
    pub fn cleanup(&mut self, now: Instant) {
        if self
            .last_unused_cleanup
            .map(|t| now.duration_since(t) >= UNUSED_CLEANUP_INTERVAL)
            .unwrap_or(true)
        {
            self.unused_peer_candidates
                .retain(|_, &mut seen| now.duration_since(seen) < UNUSED_CANDIDATE_TTL);
            self.last_unused_cleanup = Some(now);
        }
        if self
            .last_attempted_cleanup
            .map(|t| now.duration_since(t) >= RECENTLY_ATTEMPTED_CLEANUP_INTERVAL)
            .unwrap_or(true)
        {
            self.recently_attempted
                .retain(|_, &mut t| now.duration_since(t) < RECENTLY_ATTEMPTED_TTL);
            self.last_attempted_cleanup = Some(now);
        }
        self.healthy.retain(|_, &mut (last_seen, _)| now.duration_since(last_seen) < HEALTHY_TTL);
        self.banned.retain(|_, &mut t| now.duration_since(t) < BAN_TTL);
    }

    /// Push freshly resolved DNS seed addresses in as candidates.
    pub fn seed(&mut self, addrs: impl IntoIterator<Item = SocketAddr>, now: Instant) {
        for addr in addrs {
            self.offer_candidate(addr, now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn candidate_round_trips_through_use_and_release() {
        let mut pools = PeerPools::new();
        let now = Instant::now();
        pools.offer_candidate(addr(1), now);
        assert_eq!(pools.unused_count(), 1);
        let taken = pools.take_candidate(now).unwrap();
        assert_eq!(taken, addr(1));
        assert_eq!(pools.currently_used_count(), 1);
        pools.release(addr(1), now);
        assert_eq!(pools.currently_used_count(), 0);
        assert_eq!(pools.unused_count(), 1);
    }

    #[test]
    fn banned_address_is_never_offered_again() {
        let mut pools = PeerPools::new();
        let now = Instant::now();
        pools.offer_candidate(addr(2), now);
        pools.ban(addr(2), now);
        pools.offer_candidate(addr(2), now);
        assert_eq!(pools.unused_count(), 0);
        assert!(pools.is_banned(&addr(2)));
    }

    #[test]
    fn recently_attempted_address_is_skipped_until_ttl_elapses() {
        let mut pools = PeerPools::new();
        let now = Instant::now();
        pools.offer_candidate(addr(3), now);
        let first = pools.take_candidate(now).unwrap();
        pools.release(first, now);
        assert!(pools.take_candidate(now).is_none());
    }

    #[test]
    fn healthy_peer_survives_cleanup_within_ttl() {
        let mut pools = PeerPools::new();
        let now = Instant::now();
        pools.mark_healthy(addr(4), 1, now);
        pools.cleanup(now);
        assert_eq!(pools.healthy_count(), 1);
    }
}
