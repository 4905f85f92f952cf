//! Optimistic mutation state machine.
//!
//! Every key tracks the last remotely confirmed value plus the target value of
//! each in-flight operation. The value the UI sees is derived from both, so a
//! confirmation or rollback always works against the state present when it
//! arrives, never against a value captured when the mutation was issued.
//!
//! ```text
//!            apply(op)                 resolve(op, Confirmed)
//!   confirmed ───────▶ confirmed + pending ───────────────────▶ confirmed'
//!        ▲                     │
//!        └─────────────────────┘ resolve(op, Rejected)
//! ```
//!
//! Ordering rules:
//! - `OpId`s are assigned in program order.
//! - The visible value is the target of the newest pending op when that op
//!   is newer than the op that last moved the confirmed baseline.
//! - A success only moves the baseline when it is newer than the current
//!   baseline. Older successes are superseded.
//! - A failure only drops its own op.
//!
//! Once every op has settled, the value equals the target of the newest
//! successful op, or the original baseline when none succeeded.
//!
//! The map also remembers which ops are in flight and the outcome of the most
//! recent [`SETTLED_HISTORY`] settled ones, so an observer that missed a
//! resolution can read it back with [`OptimisticMap::status`]. Clearing the
//! map forgets values, not ops.

use marketplace_sync_core::effect::Effect;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::future::Future;

/// Identifier of one optimistic operation. Monotonic per map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OpId(u64);

impl OpId {
    /// The confirmed baseline that no operation produced.
    pub const BASELINE: Self = Self(0);

    /// Raw value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

/// How the remote side answered an optimistic operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// The remote applied the mutation.
    Confirmed,
    /// The remote refused or could not be reached.
    Rejected(String),
}

impl RemoteOutcome {
    /// Map a gateway result onto an outcome.
    pub fn from_result<T, E: fmt::Display>(result: &Result<T, E>) -> Self {
        match result {
            Ok(_) => Self::Confirmed,
            Err(error) => Self::Rejected(error.to_string()),
        }
    }
}

/// Number of settled outcomes an [`OptimisticMap`] keeps for [`OptimisticMap::status`].
pub const SETTLED_HISTORY: usize = 1024;

/// Where an operation stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpStatus {
    /// Issued and not answered yet.
    InFlight,
    /// Answered.
    Settled(RemoteOutcome),
    /// Not in flight and too old to have a recorded outcome.
    Expired,
}

/// Effect of resolving an operation on local state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement<V> {
    /// The op's target became the confirmed baseline.
    Confirmed,
    /// The op failed and the visible value changed back.
    RolledBack {
        /// Value visible after the rollback.
        restored: Option<V>,
    },
    /// The op settled without changing the visible value (a newer op owns it).
    Superseded,
    /// No such op for this key (already settled, or state was cleared).
    Unknown,
}

/// What the last mutation request did, read back by callers after dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Issue {
    /// A local mutation landed and a remote call was issued.
    Issued(OpId),
    /// Nothing to do (already in the requested state).
    #[default]
    Unchanged,
    /// Refused before any mutation (no session or wrong owner).
    Denied,
}

#[derive(Debug, Clone)]
struct OptimisticCell<V> {
    confirmed: Option<V>,
    confirmed_by: OpId,
    pending: BTreeMap<OpId, Option<V>>,
}

impl<V> OptimisticCell<V> {
    const fn new(confirmed: Option<V>) -> Self {
        Self {
            confirmed,
            confirmed_by: OpId::BASELINE,
            pending: BTreeMap::new(),
        }
    }

    fn visible(&self) -> Option<&V> {
        match self.pending.last_key_value() {
            Some((op, target)) if *op > self.confirmed_by => target.as_ref(),
            _ => self.confirmed.as_ref(),
        }
    }

    fn is_vacant(&self) -> bool {
        self.confirmed.is_none() && self.pending.is_empty()
    }
}

/// Keyed optimistic state.
///
/// Iteration is in key order.
#[derive(Debug, Clone)]
pub struct OptimisticMap<K, V> {
    cells: BTreeMap<K, OptimisticCell<V>>,
    next_op: u64,
    in_flight: BTreeSet<OpId>,
    settled: VecDeque<(OpId, RemoteOutcome)>,
}

impl<K, V> Default for OptimisticMap<K, V> {
    fn default() -> Self {
        Self {
            cells: BTreeMap::new(),
            next_op: 1,
            in_flight: BTreeSet::new(),
            settled: VecDeque::new(),
        }
    }
}

impl<K: Ord + Clone, V: Clone + PartialEq> OptimisticMap<K, V> {
    /// Empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map with confirmed baseline entries.
    #[must_use]
    pub fn from_confirmed(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        let mut map = Self::new();
        map.hydrate(entries);
        map
    }

    /// Visible value for `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.cells.get(key).and_then(OptimisticCell::visible)
    }

    /// Whether `key` is visibly present.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Visible entries, in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.cells
            .iter()
            .filter_map(|(key, cell)| cell.visible().map(|value| (key, value)))
    }

    /// Number of visible entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Whether nothing is visible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Whether `key` has unsettled operations.
    #[must_use]
    pub fn is_pending(&self, key: &K) -> bool {
        self.cells.get(key).is_some_and(|cell| !cell.pending.is_empty())
    }

    /// Total unsettled operations across all keys.
    #[must_use]
    pub fn pending_ops(&self) -> usize {
        self.cells.values().map(|cell| cell.pending.len()).sum()
    }

    /// Whether `op` is in flight, settled, or too old to tell.
    #[must_use]
    pub fn status(&self, op: OpId) -> OpStatus {
        if self.in_flight.contains(&op) {
            return OpStatus::InFlight;
        }
        self.settled
            .iter()
            .rev()
            .find(|(settled, _)| *settled == op)
            .map_or(OpStatus::Expired, |(_, outcome)| OpStatus::Settled(outcome.clone()))
    }

    fn record(&mut self, op: OpId, outcome: &RemoteOutcome) {
        if !self.in_flight.remove(&op) {
            return;
        }
        if self.settled.len() == SETTLED_HISTORY {
            self.settled.pop_front();
        }
        self.settled.push_back((op, outcome.clone()));
    }

    /// Land a local mutation: `key` becomes `target` until resolved.
    pub fn apply(&mut self, key: K, target: Option<V>) -> OpId {
        let op = OpId(self.next_op);
        self.next_op += 1;
        self.in_flight.insert(op);

        self.cells
            .entry(key)
            .or_insert_with(|| OptimisticCell::new(None))
            .pending
            .insert(op, target);
        op
    }

    /// Settle `op` for `key` against the state present now.
    pub fn resolve(&mut self, key: &K, op: OpId, outcome: &RemoteOutcome) -> Settlement<V> {
        self.record(op, outcome);
        let Some(cell) = self.cells.get_mut(key) else {
            return Settlement::Unknown;
        };
        let before = cell.visible().cloned();
        let Some(target) = cell.pending.remove(&op) else {
            return Settlement::Unknown;
        };

        let settlement = match outcome {
            RemoteOutcome::Confirmed if op > cell.confirmed_by => {
                cell.confirmed = target;
                cell.confirmed_by = op;
                Settlement::Confirmed
            },
            RemoteOutcome::Confirmed => Settlement::Superseded,
            RemoteOutcome::Rejected(_) => {
                let after = cell.visible().cloned();
                if after == before {
                    Settlement::Superseded
                } else {
                    Settlement::RolledBack { restored: after }
                }
            },
        };

        if cell.is_vacant() {
            self.cells.remove(key);
        }
        settlement
    }

    /// Replace confirmed baselines with a fresh remote listing.
    ///
    /// Keys absent from the listing lose their baseline. In-flight operations
    /// are kept and still settle normally.
    pub fn hydrate(&mut self, entries: impl IntoIterator<Item = (K, V)>) {
        for cell in self.cells.values_mut() {
            cell.confirmed = None;
        }
        for (key, value) in entries {
            self.cells
                .entry(key)
                .or_insert_with(|| OptimisticCell::new(None))
                .confirmed = Some(value);
        }
        self.cells.retain(|_, cell| !cell.is_vacant());
    }

    /// Drop every value. Late confirmations resolve as [`Settlement::Unknown`]
    /// and are still recorded for [`Self::status`].
    pub fn clear(&mut self) {
        self.cells.clear();
    }
}

/// Apply a local mutation and describe the remote call that confirms it.
///
/// The returned effect awaits `remote` and emits the action built by
/// `on_resolved`; the reducer handling that action then calls
/// [`OptimisticMap::resolve`].
pub fn apply_optimistic<K, V, A, T, E, Fut, F>(
    map: &mut OptimisticMap<K, V>,
    key: K,
    target: Option<V>,
    remote: Fut,
    on_resolved: F,
) -> (OpId, Effect<A>)
where
    K: Ord + Clone + Send + 'static,
    V: Clone + PartialEq,
    E: fmt::Display,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    F: FnOnce(K, OpId, RemoteOutcome) -> A + Send + 'static,
    A: Send + 'static,
{
    let op = map.apply(key.clone(), target);
    let effect = Effect::future(async move {
        let result = remote.await;
        Some(on_resolved(key, op, RemoteOutcome::from_result(&result)))
    });
    (op, effect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rejected() -> RemoteOutcome {
        RemoteOutcome::Rejected("offline".to_string())
    }

    #[test]
    fn apply_is_visible_immediately() {
        let mut map: OptimisticMap<&str, u32> = OptimisticMap::new();
        let op = map.apply("a", Some(1));

        assert_eq!(map.get(&"a"), Some(&1));
        assert!(map.is_pending(&"a"));
        assert_eq!(map.resolve(&"a", op, &RemoteOutcome::Confirmed), Settlement::Confirmed);
        assert!(!map.is_pending(&"a"));
        assert_eq!(map.get(&"a"), Some(&1));
    }

    #[test]
    fn failure_restores_confirmed_value() {
        let mut map = OptimisticMap::from_confirmed([("a", 1)]);
        let op = map.apply("a", None);
        assert_eq!(map.get(&"a"), None);

        assert_eq!(
            map.resolve(&"a", op, &rejected()),
            Settlement::RolledBack { restored: Some(1) }
        );
        assert_eq!(map.get(&"a"), Some(&1));
    }

    #[test]
    fn newer_success_wins_over_late_older_success() {
        let mut map: OptimisticMap<&str, ()> = OptimisticMap::new();
        let add = map.apply("p", Some(()));
        let remove = map.apply("p", None);

        assert_eq!(map.resolve(&"p", remove, &RemoteOutcome::Confirmed), Settlement::Confirmed);
        assert_eq!(map.resolve(&"p", add, &RemoteOutcome::Confirmed), Settlement::Superseded);
        assert!(!map.contains_key(&"p"));
    }

    #[test]
    fn older_failure_does_not_clobber_newer_pending_op() {
        let mut map: OptimisticMap<&str, ()> = OptimisticMap::new();
        let add = map.apply("p", Some(()));
        let remove = map.apply("p", None);

        assert_eq!(map.resolve(&"p", add, &rejected()), Settlement::Superseded);
        assert!(!map.contains_key(&"p"));
        assert_eq!(map.resolve(&"p", remove, &rejected()), Settlement::Superseded);
        assert!(!map.contains_key(&"p"));
    }

    #[test]
    fn settled_absent_cells_are_dropped() {
        let mut map: OptimisticMap<&str, ()> = OptimisticMap::new();
        let op = map.apply("p", Some(()));
        let _ = map.resolve(&"p", op, &rejected());
        assert_eq!(map.pending_ops(), 0);
        assert!(map.cells.is_empty());
    }

    #[test]
    fn clear_makes_late_confirmations_unknown() {
        let mut map: OptimisticMap<&str, u32> = OptimisticMap::new();
        let op = map.apply("a", Some(3));
        map.clear();

        assert_eq!(map.resolve(&"a", op, &RemoteOutcome::Confirmed), Settlement::Unknown);
        assert!(map.is_empty());
    }

    #[test]
    fn status_follows_op_through_clear() {
        let mut map: OptimisticMap<&str, u32> = OptimisticMap::new();
        let kept = map.apply("a", Some(1));
        let dropped = map.apply("b", Some(2));
        assert_eq!(map.status(kept), OpStatus::InFlight);

        assert_eq!(map.resolve(&"a", kept, &RemoteOutcome::Confirmed), Settlement::Confirmed);
        assert_eq!(map.status(kept), OpStatus::Settled(RemoteOutcome::Confirmed));

        map.clear();
        assert_eq!(map.status(dropped), OpStatus::InFlight);
        assert_eq!(map.resolve(&"b", dropped, &rejected()), Settlement::Unknown);
        assert_eq!(map.status(dropped), OpStatus::Settled(rejected()));
    }

    #[test]
    fn settled_history_is_bounded() {
        let mut map: OptimisticMap<u32, ()> = OptimisticMap::new();
        let first = map.apply(0, Some(()));
        let _ = map.resolve(&0, first, &RemoteOutcome::Confirmed);

        for key in (1..).take(SETTLED_HISTORY) {
            let op = map.apply(key, Some(()));
            let _ = map.resolve(&key, op, &RemoteOutcome::Confirmed);
        }
        assert_eq!(map.status(first), OpStatus::Expired);
        assert_eq!(map.settled.len(), SETTLED_HISTORY);
    }

    #[test]
    fn hydrate_keeps_pending_ops() {
        let mut map = OptimisticMap::from_confirmed([("a", 1), ("b", 2)]);
        let op = map.apply("c", Some(3));

        map.hydrate([("a", 10)]);
        assert_eq!(map.iter().collect::<Vec<_>>(), vec![(&"a", &10), (&"c", &3)]);

        let _ = map.resolve(&"c", op, &rejected());
        assert_eq!(map.len(), 1);
    }

    #[tokio::test]
    async fn apply_optimistic_emits_resolution() {
        let mut map: OptimisticMap<&'static str, u32> = OptimisticMap::new();
        let (op, effect) = apply_optimistic(
            &mut map,
            "a",
            Some(5),
            async { Err::<(), _>("boom") },
            |key, op, outcome| (key, op, outcome),
        );
        assert_eq!(map.get(&"a"), Some(&5));

        let Effect::Future(fut) = effect else {
            unreachable!("remote calls are futures");
        };
        assert_eq!(fut.await, Some(("a", op, RemoteOutcome::Rejected("boom".to_string()))));
    }

    fn scenario() -> impl Strategy<Value = (Option<u8>, Vec<(Option<u8>, bool)>, Vec<usize>)> {
        (
            any::<Option<u8>>(),
            prop::collection::vec((any::<Option<u8>>(), any::<bool>()), 1..10),
        )
            .prop_flat_map(|(baseline, ops)| {
                let order: Vec<usize> = (0..ops.len()).collect();
                (Just(baseline), Just(ops), Just(order).prop_shuffle())
            })
    }

    proptest! {
        #[test]
        fn converges_to_newest_successful_target((baseline, ops, order) in scenario()) {
            let mut map: OptimisticMap<u8, u8> =
                OptimisticMap::from_confirmed(baseline.map(|value| (0, value)));

            let ids: Vec<OpId> = ops.iter().map(|(target, _)| map.apply(0, *target)).collect();
            prop_assert_eq!(map.get(&0).copied(), ops.last().and_then(|(target, _)| *target));

            for index in order {
                let outcome = if ops[index].1 { RemoteOutcome::Confirmed } else { rejected() };
                let _ = map.resolve(&0, ids[index], &outcome);
            }

            let expected = ops
                .iter()
                .rev()
                .find(|(_, succeeds)| *succeeds)
                .map_or(baseline, |(target, _)| *target);
            prop_assert_eq!(map.get(&0).copied(), expected);
            prop_assert_eq!(map.pending_ops(), 0);
        }

        #[test]
        fn failures_on_one_key_leave_others_alone(
            targets in prop::collection::vec(any::<bool>(), 1..6),
        ) {
            let mut map: OptimisticMap<u8, ()> = OptimisticMap::from_confirmed([(1, ())]);
            let ids: Vec<OpId> = targets
                .iter()
                .map(|present| map.apply(0, present.then_some(())))
                .collect();
            for op in ids {
                let _ = map.resolve(&0, op, &rejected());
            }
            prop_assert!(!map.contains_key(&0));
            prop_assert!(map.contains_key(&1));
        }
    }
}
