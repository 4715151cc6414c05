//! Object-safe view of a [`Protocol`] bound to a database, one transaction
//! per request.

use async_trait::async_trait;
use geojson::{Feature, FeatureCollection, GeoJson};
use papyrus_geo::MappingSchema;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, IntoActiveModel, TransactionTrait,
};
use tracing::{instrument, warn};

use crate::error::ProtocolError;
use crate::params::MapfishRequest;
use crate::protocol::Protocol;

/// What the HTTP layer needs from a `MapFish` resource.
#[async_trait]
pub trait MapfishService: Send + Sync {
    async fn count(&self, req: &MapfishRequest) -> Result<u64, ProtocolError>;

    async fn read(&self, req: &MapfishRequest, id: Option<String>)
    -> Result<GeoJson, ProtocolError>;

    async fn create(&self, req: &MapfishRequest)
    -> Result<Option<FeatureCollection>, ProtocolError>;

    async fn update(&self, req: &MapfishRequest, id: String) -> Result<Feature, ProtocolError>;

    async fn delete(&self, req: &MapfishRequest, id: String) -> Result<(), ProtocolError>;

    fn is_readonly(&self) -> bool;

    /// Column layout, used to describe the resource as XSD.
    fn schema(&self) -> MappingSchema;
}

/// [`MapfishService`] over a sea-orm connection pool.
pub struct DbMapfishService<E: EntityTrait> {
    db: DatabaseConnection,
    protocol: Protocol<E>,
}

impl<E: EntityTrait> DbMapfishService<E> {
    #[must_use]
    pub fn new(db: DatabaseConnection, protocol: Protocol<E>) -> Self {
        Self { db, protocol }
    }

    #[must_use]
    pub fn protocol(&self) -> &Protocol<E> {
        &self.protocol
    }
}

/// Commit on success, roll back otherwise.
async fn finish<T>(
    txn: DatabaseTransaction,
    res: Result<T, ProtocolError>,
) -> Result<T, ProtocolError> {
    match res {
        Ok(v) => {
            txn.commit().await?;
            Ok(v)
        }
        Err(err) => {
            if let Err(e) = txn.rollback().await {
                warn!(error = %e, "rollback failed");
            }
            Err(err)
        }
    }
}

#[async_trait]
impl<E> MapfishService for DbMapfishService<E>
where
    E: EntityTrait + 'static,
    E::Column: ColumnTrait + Copy,
    E::Model: IntoActiveModel<E::ActiveModel> + Send + Sync,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send + Sync,
{
    #[instrument(skip_all, fields(class = self.protocol.mapping().class_name()))]
    async fn count(&self, req: &MapfishRequest) -> Result<u64, ProtocolError> {
        let txn = self.db.begin().await?;
        let res = self.protocol.count(&txn, req, None).await;
        finish(txn, res).await
    }

    #[instrument(skip_all, fields(class = self.protocol.mapping().class_name(), id = ?id))]
    async fn read(
        &self,
        req: &MapfishRequest,
        id: Option<String>,
    ) -> Result<GeoJson, ProtocolError> {
        let txn = self.db.begin().await?;
        let res = self.protocol.read(&txn, req, None, id.as_deref()).await;
        finish(txn, res).await
    }

    #[instrument(skip_all, fields(class = self.protocol.mapping().class_name()))]
    async fn create(
        &self,
        req: &MapfishRequest,
    ) -> Result<Option<FeatureCollection>, ProtocolError> {
        let txn = self.db.begin().await?;
        let res = self.protocol.create(&txn, req).await;
        finish(txn, res).await
    }

    #[instrument(skip_all, fields(class = self.protocol.mapping().class_name(), id = %id))]
    async fn update(&self, req: &MapfishRequest, id: String) -> Result<Feature, ProtocolError> {
        let txn = self.db.begin().await?;
        let res = self.protocol.update(&txn, req, &id).await;
        finish(txn, res).await
    }

    #[instrument(skip_all, fields(class = self.protocol.mapping().class_name(), id = %id))]
    async fn delete(&self, req: &MapfishRequest, id: String) -> Result<(), ProtocolError> {
        let txn = self.db.begin().await?;
        let res = self.protocol.delete(&txn, req, &id).await;
        finish(txn, res).await
    }

    fn is_readonly(&self) -> bool {
        self.protocol.is_readonly()
    }

    fn schema(&self) -> MappingSchema {
        self.protocol.mapping().schema()
    }
}
