use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rand::{CryptoRng, RngCore};

use crate::clock::{Clock, SystemClock};
use crate::config::{ElectionConfig, SetupError};
use crate::election::Election;
use crate::identity::ElectionId;

/// A directory of independent elections, addressed by their [`ElectionId`].
///
/// The registry lock only guards the directory itself. Operations on an
/// election go through its own handle and never touch this lock.
#[derive(Debug)]
pub struct ElectionRegistry<C = SystemClock> {
    elections: RwLock<HashMap<ElectionId, Arc<Election<C>>>>,
}

impl<C> Default for ElectionRegistry<C> {
    fn default() -> Self {
        Self {
            elections: RwLock::new(HashMap::new()),
        }
    }
}

impl<C: Clock> ElectionRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an election and add it to the registry.
    pub fn create(
        &self,
        config: ElectionConfig,
        rng: impl RngCore + CryptoRng,
        clock: C,
    ) -> Result<Arc<Election<C>>, SetupError> {
        let election = Election::create(config, &[], rng, clock)?;
        Ok(self.insert(election))
    }

    /// Add an existing election, e.g. one restored from a snapshot.
    pub fn insert(&self, election: Election<C>) -> Arc<Election<C>> {
        let election = Arc::new(election);
        self.elections
            .write()
            .insert(*election.id(), Arc::clone(&election));
        election
    }

    pub fn get(&self, id: &ElectionId) -> Option<Arc<Election<C>>> {
        self.elections.read().get(id).cloned()
    }

    pub fn remove(&self, id: &ElectionId) -> Option<Arc<Election<C>>> {
        self.elections.write().remove(id)
    }

    pub fn ids(&self) -> Vec<ElectionId> {
        let mut ids = self.elections.read().keys().copied().collect::<Vec<_>>();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.elections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.elections.read().is_empty()
    }
}
