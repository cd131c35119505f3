//! Reporting of publish outcomes.

use crate::error::Result;
use crate::record::{Disposition, FileRecord};
use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

/// Logs published records whose disposition is among a configured set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reporter {
    states: BTreeSet<Disposition>,
}

impl Reporter {
    pub fn new(states: impl IntoIterator<Item = Disposition>) -> Self {
        Self {
            states: states.into_iter().collect(),
        }
    }

    /// Build a reporter from disposition names, such as those found in
    /// configuration files.
    pub fn from_names<S: AsRef<str>>(names: impl IntoIterator<Item = S>) -> Result<Self> {
        let states = names.into_iter().map(|name| name.as_ref().parse::<Disposition>()).collect::<Result<_>>()?;
        Ok(Self { states })
    }

    /// Whether `record` should be reported. Records without an outcome never
    /// are.
    pub fn wants(&self, record: &FileRecord) -> bool {
        record.disposition().is_some_and(|disposition| self.states.contains(&disposition))
    }

    /// Log `record` if it's wanted. Returns whether it was.
    pub fn report(&self, record: &FileRecord) -> bool {
        if !self.wants(record) {
            return false;
        }
        let Some(outcome) = record.outcome() else {
            return false;
        };
        match &outcome.remote_modified {
            Some(modified) => tracing::info!(
                path = record.path(),
                disposition = %outcome.disposition,
                hash = outcome.content_hash.as_ref().map(|h| h.as_str()),
                %modified,
                "published",
            ),
            None => tracing::info!(
                path = record.path(),
                disposition = %outcome.disposition,
                hash = outcome.content_hash.as_ref().map(|h| h.as_str()),
                "published",
            ),
        }
        true
    }
}
impl Default for Reporter {
    fn default() -> Self {
        Self::new([Disposition::Create, Disposition::Update])
    }
}

/// Per-disposition counts for a publish run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub cache: usize,
    pub skip: usize,
    pub update: usize,
    pub create: usize,
    pub delete: usize,
    /// Records that passed through without an outcome.
    pub untouched: usize,
    /// Records that failed.
    pub failed: usize,
}

impl Summary {
    /// Count a processed record.
    pub fn add(&mut self, record: &FileRecord) {
        match record.disposition() {
            Some(Disposition::Cache) => self.cache += 1,
            Some(Disposition::Skip) => self.skip += 1,
            Some(Disposition::Update) => self.update += 1,
            Some(Disposition::Create) => self.create += 1,
            Some(Disposition::Delete) => self.delete += 1,
            None => self.untouched += 1,
        }
    }

    /// Number of records that resulted in an upload.
    pub fn uploaded(&self) -> usize {
        self.create + self.update
    }

    /// Total number of records seen.
    pub fn total(&self) -> usize {
        self.cache + self.skip + self.update + self.create + self.delete + self.untouched + self.failed
    }
}
impl Display for Summary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} skipped, {} cached, {} deleted, {} failed",
            self.create, self.update, self.skip, self.cache, self.delete, self.failed
        )
    }
}
