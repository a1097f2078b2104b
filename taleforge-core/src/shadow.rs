//! The shadow queue: entities dreamt up ahead of time.
//!
//! The dreamer fills the queue between turns; the forge checks it before
//! calling the creator. Each entry is handed out at most once. The queue is
//! optional throughout: without it every entity is generated fresh.

use crate::forge::NewEntity;
use crate::resolver::{EntityKind, EntityResolver};
use std::collections::VecDeque;

/// Keywords shorter than this are ignored when matching.
const MIN_KEYWORD_LEN: usize = 3;

/// A pre-generated entity and the words it answers to.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowEntry {
    pub keywords: Vec<String>,
    pub entity: NewEntity,
}

impl ShadowEntry {
    pub fn new(entity: NewEntity, keywords: Vec<String>) -> Self {
        Self { keywords, entity }
    }

    /// The entity's name followed by its usable keywords.
    fn labels(&self) -> Vec<&str> {
        std::iter::once(self.entity.name())
            .chain(
                self.keywords
                    .iter()
                    .map(|k| k.trim())
                    .filter(|k| k.len() >= MIN_KEYWORD_LEN),
            )
            .collect()
    }
}

/// Bounded FIFO of pre-generated entities.
#[derive(Debug, Clone)]
pub struct ShadowQueue {
    entries: VecDeque<ShadowEntry>,
    limit: usize,
}

impl ShadowQueue {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// How many more entries fit.
    pub fn room(&self) -> usize {
        self.limit.saturating_sub(self.entries.len())
    }

    /// Queue an entry. Returns `false` if the queue is full.
    pub fn push(&mut self, entry: ShadowEntry) -> bool {
        if self.room() == 0 {
            return false;
        }
        self.entries.push_back(entry);
        true
    }

    pub fn entries(&self) -> impl Iterator<Item = &ShadowEntry> {
        self.entries.iter()
    }

    /// Remove and return the first entry that answers to `name`.
    ///
    /// Matching uses the resolver's tiers against each entry's name and
    /// keywords. With `kind`, only entries of that kind are considered.
    pub fn take_match(
        &mut self,
        name: &str,
        matcher: &EntityResolver,
        kind: Option<EntityKind>,
    ) -> Option<NewEntity> {
        let index = {
            let candidates: Vec<(usize, Vec<&str>)> = self
                .entries
                .iter()
                .enumerate()
                .filter(|(_, entry)| kind.map_or(true, |k| entry.entity.kind() == k))
                .map(|(i, entry)| (i, entry.labels()))
                .collect();
            let labels: Vec<Vec<&str>> = candidates.iter().map(|(_, l)| l.clone()).collect();
            let hit = matcher.first_match(name, &labels)?;
            candidates[hit].0
        };

        let entry = self.entries.remove(index)?;
        tracing::debug!(query = name, entity = entry.entity.name(), "shadow queue hit");
        Some(entry.entity)
    }
}
