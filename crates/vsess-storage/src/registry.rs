//! Asset registry.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use vsess_models::{ArtifactName, AssetId, DerivedArtifact, VideoAsset};

use crate::error::{StorageError, StorageResult};

/// Records of ingested assets and the artifacts rendered from them.
#[async_trait]
pub trait AssetRegistry: Send + Sync {
    /// Register an asset, replacing any record with the same id.
    async fn insert_asset(&self, asset: VideoAsset) -> StorageResult<()>;

    async fn get_asset(&self, id: &AssetId) -> StorageResult<Option<VideoAsset>>;

    /// All registered assets, oldest first.
    async fn list_assets(&self) -> StorageResult<Vec<VideoAsset>>;

    /// Remove an asset and every artifact record derived from it.
    ///
    /// Returns the removed asset and artifacts.
    async fn remove_asset(
        &self,
        id: &AssetId,
    ) -> StorageResult<Option<(VideoAsset, Vec<DerivedArtifact>)>>;

    /// Register an artifact of a registered asset.
    ///
    /// Fails with [`StorageError::NotFound`] when the source asset is not
    /// registered, so no record can outlive its asset.
    async fn insert_artifact(&self, artifact: DerivedArtifact) -> StorageResult<()>;

    async fn get_artifact(&self, name: &ArtifactName) -> StorageResult<Option<DerivedArtifact>>;

    /// Artifacts derived from `id`, oldest first.
    async fn artifacts_for(&self, id: &AssetId) -> StorageResult<Vec<DerivedArtifact>>;
}

#[derive(Debug, Default)]
struct RegistryState {
    assets: HashMap<AssetId, VideoAsset>,
    artifacts: HashMap<ArtifactName, DerivedArtifact>,
}

/// [`AssetRegistry`] held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    state: RwLock<RegistryState>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssetRegistry for InMemoryRegistry {
    async fn insert_asset(&self, asset: VideoAsset) -> StorageResult<()> {
        self.state.write().await.assets.insert(asset.id.clone(), asset);
        Ok(())
    }

    async fn get_asset(&self, id: &AssetId) -> StorageResult<Option<VideoAsset>> {
        Ok(self.state.read().await.assets.get(id).cloned())
    }

    async fn list_assets(&self) -> StorageResult<Vec<VideoAsset>> {
        let mut assets: Vec<_> = self.state.read().await.assets.values().cloned().collect();
        assets.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(assets)
    }

    async fn remove_asset(
        &self,
        id: &AssetId,
    ) -> StorageResult<Option<(VideoAsset, Vec<DerivedArtifact>)>> {
        let mut state = self.state.write().await;
        let Some(asset) = state.assets.remove(id) else {
            return Ok(None);
        };

        let names: Vec<_> = state
            .artifacts
            .values()
            .filter(|a| &a.source == id)
            .map(|a| a.name.clone())
            .collect();
        let artifacts = names
            .iter()
            .filter_map(|name| state.artifacts.remove(name))
            .collect();

        Ok(Some((asset, artifacts)))
    }

    async fn insert_artifact(&self, artifact: DerivedArtifact) -> StorageResult<()> {
        let mut state = self.state.write().await;
        if !state.assets.contains_key(&artifact.source) {
            return Err(StorageError::not_found(artifact.source.to_string()));
        }
        state.artifacts.insert(artifact.name.clone(), artifact);
        Ok(())
    }

    async fn get_artifact(&self, name: &ArtifactName) -> StorageResult<Option<DerivedArtifact>> {
        Ok(self.state.read().await.artifacts.get(name).cloned())
    }

    async fn artifacts_for(&self, id: &AssetId) -> StorageResult<Vec<DerivedArtifact>> {
        let mut artifacts: Vec<_> = self
            .state
            .read()
            .await
            .artifacts
            .values()
            .filter(|a| &a.source == id)
            .cloned()
            .collect();
        artifacts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(artifacts)
    }
}
