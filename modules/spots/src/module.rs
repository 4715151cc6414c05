use std::sync::Arc;

use anyhow::Context as _;
use axum::Router;
use papyrus_geo::ColumnInfo;
use papyrus_http::{MapfishResource, RouteTable, register_routes, register_xsd_route};
use papyrus_protocol::{DbMapfishService, Protocol};
use papyrus_render::{
    ElementCallback, GeoJsonRenderer, Renderer, RendererRegistry, XsdError, XsdGenerator,
    XsdWriter,
};
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::config::SpotsConfig;
use crate::hooks::SpotHooks;
use crate::infra::migrations::Migrator;
use crate::mapping::spot_mapping;

/// Apply the pending `spots` migrations.
///
/// # Errors
/// Database errors from the migrator.
pub async fn migrate(db: &DatabaseConnection) -> anyhow::Result<()> {
    info!("Running spots database migrations");
    Migrator::up(db, None)
        .await
        .context("spots migrations failed")?;
    info!("Spots database migrations completed");
    Ok(())
}

/// `<xsd:annotation><xsd:appinfo><readonly value="true"/>` on columns
/// annotated `readonly=true`.
fn annotate_readonly(w: &mut XsdWriter, column: &ColumnInfo) -> Result<(), XsdError> {
    if column.info.get("readonly").is_some_and(|v| v == "true") {
        w.tag("xsd:annotation", &[], |w| {
            w.tag("xsd:appinfo", &[], |w| w.empty("readonly", &[("value", "true")]))
        })?;
    }
    Ok(())
}

fn renderers(cfg: &SpotsConfig) -> RendererRegistry {
    let mut registry = RendererRegistry::default();
    registry.register(
        "geojson",
        Renderer::GeoJson(GeoJsonRenderer::new(
            cfg.jsonp_param_name.clone(),
            cfg.collection_type,
        )),
    );
    let element_callback: ElementCallback = Arc::new(annotate_readonly);
    registry.register(
        "xsd",
        Renderer::Xsd(
            XsdGenerator::default()
                .include_primary_keys(cfg.xsd_include_primary_keys)
                .with_element_callback(element_callback),
        ),
    );
    registry
}

/// Mount the spots `MapFish` routes and its XSD on `router`.
///
/// # Errors
/// Fails if the spot mapping is inconsistent.
pub fn register(
    router: Router,
    db: DatabaseConnection,
    cfg: &SpotsConfig,
) -> anyhow::Result<(Router, RouteTable)> {
    let mapping = spot_mapping().context("invalid spot mapping")?;
    let mut protocol = Protocol::new(Arc::new(mapping))
        .readonly(cfg.readonly)
        .with_hooks(Arc::new(SpotHooks));
    if let Some(dialect) = &cfg.spatial {
        protocol = protocol.with_spatial(dialect.clone());
    }

    let resource = MapfishResource::new(Arc::new(DbMapfishService::new(db, protocol)))
        .with_renderers(&renderers(cfg));
    let (router, mut routes) =
        register_routes(router, &cfg.route_prefix, &cfg.base_url, resource.clone());
    let (router, xsd) = register_xsd_route(router, &cfg.route_prefix, &cfg.base_url, resource);
    routes.push(xsd);

    info!(
        base_url = %cfg.base_url,
        readonly = cfg.readonly,
        routes = routes.len(),
        "spots routes registered"
    );
    Ok((router, routes))
}
