use geojson::Feature;
use papyrus_geo::GeoRecord;
use sea_orm::EntityTrait;

use crate::params::MapfishRequest;

/// Lifecycle callbacks of a [`crate::Protocol`].
///
/// Every hook may mutate what it is given. An `Err` aborts the request with
/// an internal error and rolls the transaction back.
pub trait Hooks<E: EntityTrait>: Send + Sync {
    /// Called for each feature of a create request before it is written.
    /// `existing` is the stored record when the feature's id matches one.
    ///
    /// # Errors
    /// Any error vetoes the request.
    fn before_create(
        &self,
        req: &MapfishRequest,
        feature: &mut Feature,
        existing: Option<&mut GeoRecord<E>>,
    ) -> anyhow::Result<()> {
        let _ = (req, feature, existing);
        Ok(())
    }

    /// Called on a new record right before it is inserted.
    ///
    /// # Errors
    /// Any error vetoes the request.
    fn before_insert(
        &self,
        req: &MapfishRequest,
        feature: &Feature,
        record: &mut GeoRecord<E>,
    ) -> anyhow::Result<()> {
        let _ = (req, feature, record);
        Ok(())
    }

    /// # Errors
    /// Any error vetoes the request.
    fn before_update(
        &self,
        req: &MapfishRequest,
        feature: &mut Feature,
        record: &mut GeoRecord<E>,
    ) -> anyhow::Result<()> {
        let _ = (req, feature, record);
        Ok(())
    }

    /// # Errors
    /// Any error vetoes the request.
    fn before_delete(&self, req: &MapfishRequest, record: &GeoRecord<E>) -> anyhow::Result<()> {
        let _ = (req, record);
        Ok(())
    }
}

/// Hooks that do nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

impl<E: EntityTrait> Hooks<E> for NoHooks {}
