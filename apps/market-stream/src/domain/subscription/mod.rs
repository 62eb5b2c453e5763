//! Subscription Set
//!
//! Tracks the topics the caller currently wants to receive, independent of
//! connection state. The connection manager reads a snapshot of this set
//! every time it builds a connection target, so reconnects restore exactly
//! the desired topics.
//!
//! # Design
//!
//! Backed by a `BTreeSet` so snapshots come out in a deterministic order
//! (the combined stream URL and tests depend on it). The set never touches
//! the socket; it is only mutated by subscribe/unsubscribe calls.

use std::collections::BTreeSet;

use super::topic::Topic;

/// The caller's desired set of stream topics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSet {
    topics: BTreeSet<Topic>,
}

impl SubscriptionSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add topics, returning how many were not already present.
    pub fn add<I>(&mut self, topics: I) -> usize
    where
        I: IntoIterator<Item = Topic>,
    {
        topics
            .into_iter()
            .filter(|topic| self.topics.insert(topic.clone()))
            .count()
    }

    /// Remove topics, returning how many were actually present.
    pub fn remove<'a, I>(&mut self, topics: I) -> usize
    where
        I: IntoIterator<Item = &'a Topic>,
    {
        topics
            .into_iter()
            .filter(|topic| self.topics.remove(*topic))
            .count()
    }

    /// Check if there are no desired topics.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Number of desired topics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// Check if a topic is desired.
    #[must_use]
    pub fn contains(&self, topic: &Topic) -> bool {
        self.topics.contains(topic)
    }

    /// Ordered copy of the current topics.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Topic> {
        self.topics.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::topic::StreamKind;

    fn ticker(symbol: &str) -> Topic {
        Topic::new(symbol, StreamKind::Ticker)
    }

    #[test]
    fn add_new_topics() {
        let mut set = SubscriptionSet::new();

        let added = set.add([ticker("BTCUSDT"), ticker("ETHUSDT")]);

        assert_eq!(added, 2);
        assert_eq!(set.len(), 2);
        assert!(set.contains(&ticker("btcusdt")));
    }

    #[test]
    fn add_existing_topic_is_noop() {
        let mut set = SubscriptionSet::new();
        set.add([ticker("BTCUSDT")]);

        let added = set.add([ticker("btcusdt")]);

        assert_eq!(added, 0);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn remove_absent_topic_is_noop() {
        let mut set = SubscriptionSet::new();
        set.add([ticker("BTCUSDT")]);

        let removed = set.remove(&[ticker("ETHUSDT")]);

        assert_eq!(removed, 0);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn remove_last_topic_empties_set() {
        let mut set = SubscriptionSet::new();
        set.add([ticker("BTCUSDT")]);

        let removed = set.remove(&[ticker("BTCUSDT")]);

        assert_eq!(removed, 1);
        assert!(set.is_empty());
    }

    #[test]
    fn snapshot_is_sorted_and_detached() {
        let mut set = SubscriptionSet::new();
        set.add([ticker("XRPUSDT"), ticker("BTCUSDT"), ticker("ETHUSDT")]);

        let snapshot = set.snapshot();
        set.remove(&[ticker("BTCUSDT")]);

        let names: Vec<_> = snapshot.iter().map(Topic::as_str).collect();
        assert_eq!(names, vec!["btcusdt@ticker", "ethusdt@ticker", "xrpusdt@ticker"]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn ticker_and_kline_topics_are_independent() {
        let mut set = SubscriptionSet::new();
        set.add([ticker("BTCUSDT"), Topic::new("BTCUSDT", StreamKind::Kline1m)]);

        set.remove(&[ticker("BTCUSDT")]);

        assert_eq!(set.snapshot(), vec![Topic::new("btcusdt", StreamKind::Kline1m)]);
    }
}
