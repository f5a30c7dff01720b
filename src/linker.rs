//! Heuristic linking of activities the trigger forest does not connect
//!
//! Some activities belong to an operation even though no `triggerId` chain
//! leads to them from the operation's root. Two heuristics recover them:
//!
//! - **Adjacency**: ids are assigned in creation order, so the candidate with
//!   the greatest id below a reference is the most recently created one
//!   before it.
//! - **Proximity**: a TLS wrap and the socket wrap it encrypts are created by
//!   the same parent, from the same user call site, within a couple of
//!   milliseconds, and their first callbacks run close together.
//!
//! Neither heuristic is exact. Nothing ties the two resources together
//! directly, so a busy process that opens several TLS connections from one
//! call site within the init window can produce ambiguous matches (reported,
//! never guessed) and a slow event loop can push a real pair outside the
//! windows (a false negative). The thresholds are configuration, not proven
//! constants.

use crate::activity::{Activity, ActivityId, ActivitySnapshot};
use serde::{Deserialize, Serialize};

/// Greatest candidate id strictly below `reference`
///
/// # Example
/// ```
/// use netstitch::linker::immediately_before_id;
///
/// assert_eq!(immediately_before_id([2, 7, 11], 9), Some(7));
/// assert_eq!(immediately_before_id([2, 7, 11], 2), None);
/// ```
pub fn immediately_before_id<I>(candidates: I, reference: ActivityId) -> Option<ActivityId>
where
    I: IntoIterator<Item = ActivityId>,
{
    candidates.into_iter().filter(|&id| id < reference).max()
}

/// Windows used to pair a TLS wrap with its socket wrap
///
/// Defaults come from observed traces: TLS init lands under 1ms after the
/// socket init, and the socket's first callback runs about 4.5ms after the
/// TLS wrap's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximityThresholds {
    /// Init stack frame that must be byte-identical in both wraps
    pub signature_frame: usize,

    /// Both init stacks must have at least this many frames
    pub min_stack_len: usize,

    /// `tls.init - tcp.init` must be within this window (tls after tcp)
    pub max_init_delta_ns: u64,

    /// `tcp.before[0] - tls.before[0]` must be within this window
    pub max_before_delta_ns: u64,

    /// `tcp.after[0] - tls.after[0]` must be within this window
    pub max_after_delta_ns: u64,
}

impl Default for ProximityThresholds {
    fn default() -> Self {
        Self {
            signature_frame: 3,
            min_stack_len: 5,
            max_init_delta_ns: 2_000_000,    // 2ms
            max_before_delta_ns: 10_000_000, // 10ms
            max_after_delta_ns: 10_000_000,  // 10ms
        }
    }
}

impl ProximityThresholds {
    pub fn validate(&self) -> Result<(), String> {
        if self.min_stack_len <= self.signature_frame {
            return Err(format!(
                "min_stack_len ({}) must exceed signature_frame ({})",
                self.min_stack_len, self.signature_frame
            ));
        }
        if self.max_init_delta_ns == 0
            || self.max_before_delta_ns == 0
            || self.max_after_delta_ns == 0
        {
            return Err("proximity windows must be non-zero".to_string());
        }
        Ok(())
    }
}

/// Outcome of proximity correlation for one socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProximityMatch {
    Unmatched,
    Unique(ActivityId),
    /// Several candidates satisfied every window; none is linked
    Ambiguous(Vec<ActivityId>),
}

impl ProximityMatch {
    pub fn linked(&self) -> Option<ActivityId> {
        match self {
            ProximityMatch::Unique(id) => Some(*id),
            ProximityMatch::Unmatched | ProximityMatch::Ambiguous(_) => None,
        }
    }
}

/// `later - earlier` when `later >= earlier` and the gap fits in `max`
fn within(earlier: u64, later: u64, max: u64) -> bool {
    later >= earlier && later - earlier <= max
}

fn has_signals(a: &Activity, t: &ProximityThresholds) -> bool {
    a.stack_len() >= t.min_stack_len
        && a.init.is_some()
        && !a.before.is_empty()
        && !a.after.is_empty()
}

/// Whether `tls` passes every proximity check against `tcp`
///
/// Checks: same known trigger parent, identical signature frame, tls init no more
/// than `max_init_delta_ns` after tcp init, and tcp's first before/after no
/// more than their windows after tls's.
pub fn is_proximate(tcp: &Activity, tls: &Activity, t: &ProximityThresholds) -> bool {
    if tcp.trigger_id.is_none() || tcp.trigger_id != tls.trigger_id {
        return false;
    }
    if !has_signals(tcp, t) || !has_signals(tls, t) {
        return false;
    }
    if tcp.frame(t.signature_frame) != tls.frame(t.signature_frame) {
        return false;
    }

    // Signals are present, checked above
    let (Some(tcp_init), Some(tls_init)) = (tcp.init, tls.init) else {
        return false;
    };

    within(tcp_init, tls_init, t.max_init_delta_ns)
        && within(tls.before[0], tcp.before[0], t.max_before_delta_ns)
        && within(tls.after[0], tcp.after[0], t.max_after_delta_ns)
}

/// Every candidate that passes the proximity checks against `tcp_id`
pub fn proximity_matches<I>(
    snapshot: &ActivitySnapshot,
    tcp_id: ActivityId,
    candidates: I,
    thresholds: &ProximityThresholds,
) -> Vec<ActivityId>
where
    I: IntoIterator<Item = ActivityId>,
{
    let Some(tcp) = snapshot.get(tcp_id) else {
        return Vec::new();
    };
    candidates
        .into_iter()
        .filter(|&id| {
            snapshot
                .get(id)
                .is_some_and(|tls| is_proximate(tcp, tls, thresholds))
        })
        .collect()
}

/// Pair `tcp_id` with at most one TLS wrap among `candidates`
pub fn correlate_by_proximity<I>(
    snapshot: &ActivitySnapshot,
    tcp_id: ActivityId,
    candidates: I,
    thresholds: &ProximityThresholds,
) -> ProximityMatch
where
    I: IntoIterator<Item = ActivityId>,
{
    let mut matches = proximity_matches(snapshot, tcp_id, candidates, thresholds);
    match matches.len() {
        0 => ProximityMatch::Unmatched,
        1 => ProximityMatch::Unique(matches.remove(0)),
        _ => {
            tracing::warn!(
                socket = tcp_id,
                candidates = ?matches,
                "ambiguous TLS proximity match, leaving socket unlinked"
            );
            ProximityMatch::Ambiguous(matches)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityType;

    const ORIGIN: &str = "at Socket.onserverListening (/dev/tls.client.js:91:10)";

    fn wrap(
        id: ActivityId,
        t: ActivityType,
        init: u64,
        before: u64,
        after: u64,
        origin: &str,
    ) -> Activity {
        let mut a = Activity::new(id, t);
        a.trigger_id = Some(1);
        a.init_stack = Some(vec![
            "at TLSSocket._wrapHandle (_tls_wrap.js:372:42)".to_string(),
            "at new TLSSocket (_tls_wrap.js:290:18)".to_string(),
            "at Object.exports.connect (_tls_wrap.js:1051:16)".to_string(),
            origin.to_string(),
            "at emitOne (events.js:126:20)".to_string(),
        ]);
        a.init = Some(init);
        a.before = vec![before];
        a.after = vec![after];
        a
    }

    fn tcp() -> Activity {
        wrap(
            10,
            ActivityType::TcpWrap,
            148_565_595,
            157_863_372,
            158_064_014,
            ORIGIN,
        )
    }

    fn tls() -> Activity {
        wrap(
            11,
            ActivityType::TlsWrap,
            149_439_787,
            153_352_646,
            153_461_245,
            ORIGIN,
        )
    }

    #[test]
    fn test_immediately_before() {
        assert_eq!(immediately_before_id([3, 8, 5], 7), Some(5));
        assert_eq!(immediately_before_id([3, 8, 5], 3), None);
        assert_eq!(immediately_before_id(Vec::new(), 3), None);
    }

    #[test]
    fn test_observed_pair_is_proximate() {
        assert!(is_proximate(&tcp(), &tls(), &ProximityThresholds::default()));
    }

    #[test]
    fn test_init_delta_exceeded() {
        let mut late = tls();
        late.init = Some(148_565_595 + 2_000_001);
        assert!(!is_proximate(&tcp(), &late, &ProximityThresholds::default()));
    }

    #[test]
    fn test_tls_init_before_tcp_rejected() {
        let mut early = tls();
        early.init = Some(148_000_000);
        assert!(!is_proximate(&tcp(), &early, &ProximityThresholds::default()));
    }

    #[test]
    fn test_before_direction_matters() {
        let mut flipped = tls();
        flipped.before = vec![158_000_000];
        assert!(!is_proximate(&tcp(), &flipped, &ProximityThresholds::default()));
    }

    #[test]
    fn test_after_delta_exceeded() {
        let mut slow = tls();
        slow.after = vec![158_064_014 - 10_000_001];
        assert!(!is_proximate(&tcp(), &slow, &ProximityThresholds::default()));
    }

    #[test]
    fn test_signature_frame_must_be_identical() {
        let other = wrap(
            11,
            ActivityType::TlsWrap,
            149_439_787,
            153_352_646,
            153_461_245,
            "at Socket.onserverListening (/dev/tls.client.js:92:10)",
        );
        assert!(!is_proximate(&tcp(), &other, &ProximityThresholds::default()));
    }

    #[test]
    fn test_different_parent_rejected() {
        let mut orphan = tls();
        orphan.trigger_id = Some(99);
        assert!(!is_proximate(&tcp(), &orphan, &ProximityThresholds::default()));
    }

    #[test]
    fn test_parentless_pair_rejected() {
        let mut tcp = tcp();
        let mut tls = tls();
        tcp.trigger_id = None;
        tls.trigger_id = None;
        assert!(!is_proximate(&tcp, &tls, &ProximityThresholds::default()));
    }

    #[test]
    fn test_missing_signals_rejected() {
        let mut silent = tls();
        silent.before.clear();
        assert!(!is_proximate(&tcp(), &silent, &ProximityThresholds::default()));

        let mut shallow = tls();
        shallow.init_stack.as_mut().unwrap().truncate(4);
        assert!(!is_proximate(&tcp(), &shallow, &ProximityThresholds::default()));
    }

    #[test]
    fn test_correlate_unique_and_ambiguous() {
        let t = ProximityThresholds::default();
        let mut twin = tls();
        twin.id = 12;

        let snapshot = ActivitySnapshot::from_activities([tcp(), tls()]);
        assert_eq!(
            correlate_by_proximity(&snapshot, 10, [11], &t),
            ProximityMatch::Unique(11)
        );

        let snapshot = ActivitySnapshot::from_activities([tcp(), tls(), twin]);
        let result = correlate_by_proximity(&snapshot, 10, [11, 12], &t);
        assert_eq!(result, ProximityMatch::Ambiguous(vec![11, 12]));
        assert_eq!(result.linked(), None);

        assert_eq!(
            correlate_by_proximity(&snapshot, 99, [11], &t),
            ProximityMatch::Unmatched
        );
    }

    #[test]
    fn test_threshold_validation() {
        assert!(ProximityThresholds::default().validate().is_ok());
        let bad = ProximityThresholds {
            min_stack_len: 3,
            ..ProximityThresholds::default()
        };
        assert!(bad.validate().is_err());
        let zero = ProximityThresholds {
            max_init_delta_ns: 0,
            ..ProximityThresholds::default()
        };
        assert!(zero.validate().is_err());
    }
}
