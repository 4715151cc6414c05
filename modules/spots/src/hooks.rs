use chrono::{SecondsFormat, Utc};
use geojson::Feature;
use papyrus_geo::GeoRecord;
use papyrus_protocol::{Hooks, MapfishRequest};

use crate::infra::entity::Entity;

/// Stamps `updated_at` on every written feature; clients cannot set it.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpotHooks;

fn stamp(feature: &mut Feature) {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    feature.set_property("updated_at", now);
}

impl Hooks<Entity> for SpotHooks {
    fn before_create(
        &self,
        _req: &MapfishRequest,
        feature: &mut Feature,
        _existing: Option<&mut GeoRecord<Entity>>,
    ) -> anyhow::Result<()> {
        stamp(feature);
        Ok(())
    }

    fn before_update(
        &self,
        _req: &MapfishRequest,
        feature: &mut Feature,
        _record: &mut GeoRecord<Entity>,
    ) -> anyhow::Result<()> {
        stamp(feature);
        Ok(())
    }
}
