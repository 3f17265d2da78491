use crate::core::error::{NetworkError, NetworkResult};
use crate::models::{Connection, Neighbor, UserId};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};

/// Canonical key of an undirected edge: the two endpoints in sorted order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    pub low: UserId,
    pub high: UserId,
}

impl EdgeKey {
    /// Build the key for the unordered pair `{a, b}`, rejecting self-loops
    pub fn new(a: UserId, b: UserId) -> NetworkResult<Self> {
        if a == b {
            return Err(NetworkError::InvalidConnection(a));
        }
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        Ok(Self { low, high })
    }
}

/// Check that a trust weight lies in [0, 1]
pub fn validate_trust(trust: f64) -> NetworkResult<()> {
    if !(0.0..=1.0).contains(&trust) {
        return Err(NetworkError::InvalidInput(format!(
            "trust score must be within [0, 1], got {}",
            trust
        )));
    }
    Ok(())
}

/// Undirected, weighted graph of direct connections
///
/// Adjacency is stored in both directions so `neighbors` is a single lookup;
/// `edges` is the source of truth for uniqueness of the unordered pair.
#[derive(Debug, Clone, Default)]
pub struct ConnectionGraph {
    edges: HashMap<EdgeKey, Connection>,
    adjacency: HashMap<UserId, BTreeMap<UserId, f64>>,
}

impl ConnectionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an edge between `a` and `b`.
    ///
    /// Fails with `InvalidConnection` on a self-loop and `DuplicateConnection`
    /// if the pair is already connected in either direction. The graph is
    /// untouched on failure.
    pub fn connect(&mut self, a: UserId, b: UserId, trust: f64) -> NetworkResult<Connection> {
        let key = EdgeKey::new(a, b)?;
        validate_trust(trust)?;

        if self.edges.contains_key(&key) {
            return Err(NetworkError::DuplicateConnection(key.low, key.high));
        }

        let connection = Connection {
            user_low: key.low,
            user_high: key.high,
            trust_score: trust,
            created_at: Utc::now(),
        };
        self.insert(connection.clone());
        Ok(connection)
    }

    /// Insert an already-validated connection (used when loading from storage)
    pub fn insert(&mut self, connection: Connection) {
        let key = EdgeKey {
            low: connection.user_low,
            high: connection.user_high,
        };
        self.adjacency
            .entry(key.low)
            .or_default()
            .insert(key.high, connection.trust_score);
        self.adjacency
            .entry(key.high)
            .or_default()
            .insert(key.low, connection.trust_score);
        self.edges.insert(key, connection);
    }

    /// First-degree peers of `user_id`, ordered by peer id
    pub fn neighbors(&self, user_id: UserId) -> Vec<Neighbor> {
        self.adjacency
            .get(&user_id)
            .map(|peers| {
                peers
                    .iter()
                    .map(|(peer, trust)| Neighbor {
                        user_id: *peer,
                        trust_score: *trust,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Trust weight of the edge `{a, b}`, if connected
    pub fn trust(&self, a: UserId, b: UserId) -> Option<f64> {
        let key = EdgeKey::new(a, b).ok()?;
        self.edges.get(&key).map(|c| c.trust_score)
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
