//! The closed capability set an adapter may declare.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A capability an [`Adapter`](../../router_adapter/trait.Adapter.html) may hold.
///
/// The set is core-governed and closed: adapters cannot invent new
/// capability strings, and the router only ever checks membership against
/// this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// The adapter may be invoked in `dry_run` mode (or simulated without it).
    DryRun,
    /// The adapter may mutate state outside the router (real side effects).
    Apply,
    /// The adapter enforces its own call timeout.
    Timeout,
    /// The adapter reaches outside the local process (network, subprocess).
    External,
}

impl Capability {
    /// Stable `&'static str` form, e.g. `"apply"`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DryRun => "dry_run",
            Self::Apply => "apply",
            Self::Timeout => "timeout",
            Self::External => "external",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable set of capabilities, as declared by an adapter.
pub type CapabilitySet = BTreeSet<Capability>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let cap = Capability::Apply;
        let json = serde_json::to_string(&cap).unwrap();
        assert_eq!(json, "\"apply\"");
        let back: Capability = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cap);
    }

    #[test]
    fn set_is_sorted_for_canonical_output() {
        let mut set = CapabilitySet::new();
        set.insert(Capability::Apply);
        set.insert(Capability::DryRun);
        let ordered: Vec<_> = set.into_iter().collect();
        assert_eq!(ordered, vec![Capability::DryRun, Capability::Apply]);
    }
}
