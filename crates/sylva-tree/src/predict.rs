//! Prediction methods for the random forest ensemble.

use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::forest::RandomForest;
use crate::item::{Item, Value};
use crate::tree::DecisionPath;

/// Votes per category from one forest prediction.
///
/// Categories are kept in the order they first received a vote. The full
/// tally is returned so callers can apply their own tie-breaking or
/// confidence threshold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoteTally {
    votes: Vec<(Value, usize)>,
}

impl VoteTally {
    /// Add one vote for `category`.
    pub(crate) fn add(&mut self, category: &Value) {
        match self.votes.iter_mut().find(|(c, _)| c == category) {
            Some((_, count)) => *count += 1,
            None => self.votes.push((category.clone(), 1)),
        }
    }

    /// Return the vote count for `category` (0 when it got no votes).
    #[must_use]
    pub fn get(&self, category: &Value) -> usize {
        self.votes
            .iter()
            .find(|(c, _)| c == category)
            .map_or(0, |(_, count)| *count)
    }

    /// Return the total number of votes cast.
    #[must_use]
    pub fn total(&self) -> usize {
        self.votes.iter().map(|(_, count)| count).sum()
    }

    /// Iterate over `(category, votes)` in first-vote order.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, usize)> {
        self.votes.iter().map(|(c, count)| (c, *count))
    }

    /// Return the number of distinct categories that received votes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.votes.len()
    }

    /// Return `true` if no votes were cast.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    /// Return the category with the most votes.
    ///
    /// Ties go to the category that received its first vote earliest.
    #[must_use]
    pub fn winner(&self) -> Option<&Value> {
        let mut best: Option<(&Value, usize)> = None;
        for (category, count) in self.iter() {
            if best.is_none_or(|(_, best_count)| count > best_count) {
                best = Some((category, count));
            }
        }
        best.map(|(category, _)| category)
    }
}

impl<'a> FromIterator<&'a Value> for VoteTally {
    fn from_iter<I: IntoIterator<Item = &'a Value>>(iter: I) -> Self {
        let mut tally = VoteTally::default();
        for category in iter {
            tally.add(category);
        }
        tally
    }
}

impl RandomForest {
    /// Ask every tree for a category and tally the answers.
    ///
    /// The tally's total always equals the number of trees.
    #[must_use]
    pub fn predict(&self, item: &Item) -> VoteTally {
        self.trees.iter().map(|tree| tree.predict(item)).collect()
    }

    /// Explain every tree's vote: one decision path per tree, in tree order.
    #[must_use]
    pub fn decision_paths<'a>(&'a self, item: &'a Item) -> Vec<DecisionPath<'a>> {
        self.trees
            .iter()
            .map(|tree| tree.decision_path(item))
            .collect()
    }

    /// Tally votes for a batch of items in parallel.
    #[must_use]
    pub fn predict_batch(&self, items: &[Item]) -> Vec<VoteTally> {
        items
            .into_par_iter()
            .map(|item| self.predict(item))
            .collect()
    }
}
