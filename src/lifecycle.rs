//! Lifecycle timestamps of activities and operations
//!
//! All stamps are nanoseconds relative to the capture start. Each stamp is
//! paired with a rendered millisecond string so summaries stay readable.

use crate::activity::Activity;
use serde::{Serialize, Serializer};

/// Marker used wherever a value was never observed
pub const UNKNOWN: &str = "<Unknown>";

/// A nanosecond instant or duration with its rendered form
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Stamp {
    pub ns: u64,
}

impl Stamp {
    pub fn new(ns: u64) -> Self {
        Self { ns }
    }

    /// Milliseconds with two decimals, e.g. "2.60ms"
    pub fn pretty(&self) -> String {
        pretty_ns(self.ns)
    }
}

pub fn pretty_ns(ns: u64) -> String {
    format!("{:.2}ms", ns as f64 / 1e6)
}

/// Duration between creation and destruction
///
/// `Unknown` is distinct from a zero duration: a missing end must never
/// read as an instantaneous operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeAlive {
    Known(Stamp),
    Unknown,
}

impl TimeAlive {
    pub fn between(created: Option<Stamp>, destroyed: Option<Stamp>) -> Self {
        match (created, destroyed) {
            (Some(c), Some(d)) => match d.ns.checked_sub(c.ns) {
                Some(ns) => Self::Known(Stamp::new(ns)),
                None => {
                    tracing::warn!(
                        created = c.ns,
                        destroyed = d.ns,
                        "destroyed before created, lifetime unknown"
                    );
                    Self::Unknown
                }
            },
            _ => Self::Unknown,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    pub fn stamp(&self) -> Option<Stamp> {
        match self {
            Self::Known(s) => Some(*s),
            Self::Unknown => None,
        }
    }
}

/// Created/destroyed window of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifeCycle {
    #[serde(serialize_with = "serialize_stamp")]
    pub created: Option<Stamp>,
    #[serde(serialize_with = "serialize_stamp")]
    pub destroyed: Option<Stamp>,
    #[serde(serialize_with = "serialize_time_alive")]
    pub time_alive: TimeAlive,
}

impl LifeCycle {
    pub fn new(created: Option<Stamp>, destroyed: Option<Stamp>) -> Self {
        Self {
            created,
            destroyed,
            time_alive: TimeAlive::between(created, destroyed),
        }
    }

    /// Lifecycle of a single activity, using the destruction fallback chain
    pub fn of_activity(activity: &Activity) -> Self {
        Self::new(activity.init.map(Stamp::new), destroyed_stamp(activity))
    }
}

/// Best available end-of-life stamp: destroy, then last after, last before, init
pub fn destroyed_stamp(activity: &Activity) -> Option<Stamp> {
    first_observed(&[
        activity.destroy,
        activity.after.last().copied(),
        activity.before.last().copied(),
        activity.init,
    ])
    .map(Stamp::new)
}

/// First candidate that was actually observed
pub fn first_observed(candidates: &[Option<u64>]) -> Option<u64> {
    candidates.iter().flatten().next().copied()
}

#[derive(Serialize)]
struct Rendered {
    ms: String,
    ns: u64,
}

fn serialize_stamp<S: Serializer>(stamp: &Option<Stamp>, s: S) -> Result<S::Ok, S::Error> {
    match stamp {
        Some(stamp) => Rendered {
            ms: stamp.pretty(),
            ns: stamp.ns,
        }
        .serialize(s),
        None => s.serialize_none(),
    }
}

fn serialize_time_alive<S: Serializer>(t: &TimeAlive, s: S) -> Result<S::Ok, S::Error> {
    match t {
        TimeAlive::Known(stamp) => serialize_stamp(&Some(*stamp), s),
        TimeAlive::Unknown => s.serialize_str(UNKNOWN),
    }
}
