use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use scribe_auth::{LookupError, OwnerLookup};
use scribe_core::{ResourceId, UserId};

/// Who created each post and comment.
#[derive(Debug, Default)]
pub struct InMemoryOwnerRegistry {
    inner: RwLock<HashMap<ResourceId, UserId>>,
}

impl InMemoryOwnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, resource: impl Into<ResourceId>, owner: UserId) -> Result<(), LookupError> {
        self.inner
            .write()
            .map_err(|_| poisoned())?
            .insert(resource.into(), owner);
        Ok(())
    }

    pub fn owner(&self, resource: impl Into<ResourceId>) -> Result<Option<UserId>, LookupError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(&resource.into()).copied())
    }

    pub fn remove(&self, resource: impl Into<ResourceId>) -> Result<Option<UserId>, LookupError> {
        Ok(self
            .inner
            .write()
            .map_err(|_| poisoned())?
            .remove(&resource.into()))
    }
}

fn poisoned() -> LookupError {
    LookupError("owner registry lock poisoned".to_string())
}

#[async_trait]
impl OwnerLookup for InMemoryOwnerRegistry {
    async fn owner_of(&self, resource: ResourceId) -> Result<Option<UserId>, LookupError> {
        self.owner(resource)
    }
}
