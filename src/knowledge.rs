use crate::VariableId;
use std::collections::{HashMap, HashSet};

/// Background knowledge about which direct causal edges may or must exist.
///
/// The adjacency search only uses this to decide which neighbors of `x` may appear in a set
/// conditioning `x`: see [`possible_parent`].
pub trait Knowledge<V>: Sync {
    /// Returns `true` if `from --> to` may not appear in the true graph.
    fn is_forbidden(&self, from: V, to: V) -> bool;

    /// Returns `true` if `from --> to` must appear in the true graph.
    fn is_required(&self, from: V, to: V) -> bool;
}

impl<V, K: Knowledge<V> + ?Sized> Knowledge<V> for &K {
    fn is_forbidden(&self, from: V, to: V) -> bool {
        (**self).is_forbidden(from, to)
    }

    fn is_required(&self, from: V, to: V) -> bool {
        (**self).is_required(from, to)
    }
}

/// Returns `true` unless knowledge rules out `candidate` as a parent of `of`: that is, unless
/// `candidate --> of` is forbidden or `of --> candidate` is required.
pub fn possible_parent<V: Copy, K: Knowledge<V> + ?Sized>(
    knowledge: &K,
    candidate: V,
    of: V,
) -> bool {
    !knowledge.is_forbidden(candidate, of) && !knowledge.is_required(of, candidate)
}

/// Knowledge that permits every edge and requires none.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoKnowledge;

impl<V> Knowledge<V> for NoKnowledge {
    fn is_forbidden(&self, _: V, _: V) -> bool {
        false
    }

    fn is_required(&self, _: V, _: V) -> bool {
        false
    }
}

/// Knowledge given as explicit forbidden and required edges, plus an optional temporal ordering
/// of the variables into tiers.
///
/// Causes can't come after their effects, so an edge from a later tier into an earlier one is
/// forbidden. Edges within a tier are allowed unless that tier is marked with
/// [`EdgeKnowledge::forbid_within_tier`].
///
/// ```
/// use stable_adjacency::{possible_parent, EdgeKnowledge, Knowledge};
///
/// const SMOKING: u8 = 0;
/// const TAR: u8 = 1;
/// const CANCER: u8 = 2;
///
/// let mut knowledge = EdgeKnowledge::new();
/// knowledge.add_to_tier(0, SMOKING);
/// knowledge.add_to_tier(1, CANCER);
/// knowledge.require(SMOKING, TAR);
///
/// assert!(knowledge.is_forbidden(CANCER, SMOKING));
/// assert!(!knowledge.is_forbidden(SMOKING, CANCER));
/// assert!(!possible_parent(&knowledge, CANCER, SMOKING));
/// assert!(!possible_parent(&knowledge, TAR, SMOKING));
/// assert!(possible_parent(&knowledge, SMOKING, TAR));
/// ```
#[derive(Clone, Debug)]
pub struct EdgeKnowledge<V: VariableId> {
    forbidden: HashSet<(V, V)>,
    required: HashSet<(V, V)>,
    tiers: HashMap<V, usize>,
    forbidden_within: HashSet<usize>,
}

impl<V: VariableId> Default for EdgeKnowledge<V> {
    fn default() -> Self {
        EdgeKnowledge {
            forbidden: HashSet::new(),
            required: HashSet::new(),
            tiers: HashMap::new(),
            forbidden_within: HashSet::new(),
        }
    }
}

impl<V: VariableId> EdgeKnowledge<V> {
    /// Creates knowledge that permits everything.
    pub fn new() -> Self {
        EdgeKnowledge::default()
    }

    /// Forbids `from --> to`.
    pub fn forbid(&mut self, from: V, to: V) -> &mut Self {
        self.forbidden.insert((from, to));
        self
    }

    /// Requires `from --> to`.
    pub fn require(&mut self, from: V, to: V) -> &mut Self {
        self.required.insert((from, to));
        self
    }

    /// Places `variable` in `tier`, moving it out of any tier it was in.
    pub fn add_to_tier(&mut self, tier: usize, variable: V) -> &mut Self {
        self.tiers.insert(variable, tier);
        self
    }

    /// Forbids every edge between two variables of `tier`.
    pub fn forbid_within_tier(&mut self, tier: usize) -> &mut Self {
        self.forbidden_within.insert(tier);
        self
    }

    /// The tier `variable` was placed in, if any.
    pub fn tier(&self, variable: V) -> Option<usize> {
        self.tiers.get(&variable).copied()
    }

    fn forbidden_by_tiers(&self, from: V, to: V) -> bool {
        match (self.tier(from), self.tier(to)) {
            (Some(a), Some(b)) => a > b || (a == b && self.forbidden_within.contains(&a)),
            _ => false,
        }
    }
}

impl<V: VariableId> Knowledge<V> for EdgeKnowledge<V> {
    fn is_forbidden(&self, from: V, to: V) -> bool {
        self.forbidden.contains(&(from, to)) || self.forbidden_by_tiers(from, to)
    }

    fn is_required(&self, from: V, to: V) -> bool {
        self.required.contains(&(from, to))
    }
}
