//! The `MapFish` protocol over one mapped entity.

use std::sync::Arc;

use geojson::{Feature, FeatureCollection, GeoJson};
use papyrus_geo::value::parse_text;
use papyrus_geo::{GeoMapping, GeoRecord, id_to_value};
use sea_orm::sea_query::Order;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbBackend,
    DbErr, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    Value,
};
use tracing::debug;

use crate::error::{FilterError, ProtocolError};
use crate::filter::create_filter;
use crate::hooks::{Hooks, NoHooks};
use crate::params::{MapfishRequest, Params, asbool};
use crate::spatial::SpatialDialect;

/// CRUD over entity `E` driven by `MapFish` query parameters.
///
/// Operations take the connection to run on, normally the request's
/// transaction. Not-found, read-only and malformed-input outcomes come back
/// as [`ProtocolError`] values.
pub struct Protocol<E: EntityTrait> {
    mapping: Arc<GeoMapping<E>>,
    readonly: bool,
    hooks: Arc<dyn Hooks<E>>,
    dialect: Option<SpatialDialect>,
}

impl<E: EntityTrait> Clone for Protocol<E> {
    fn clone(&self) -> Self {
        Self {
            mapping: Arc::clone(&self.mapping),
            readonly: self.readonly,
            hooks: Arc::clone(&self.hooks),
            dialect: self.dialect.clone(),
        }
    }
}

fn parse_count(param: &'static str, text: &str) -> Result<u64, FilterError> {
    text.trim()
        .parse::<u64>()
        .map_err(|_| FilterError::InvalidParam {
            param,
            reason: format!("`{text}` is not a non-negative integer"),
        })
}

/// Largest row count SQLite and `MySQL` accept as a bound `LIMIT`.
const UNBOUNDED_LIMIT: u64 = i64::MAX.unsigned_abs();

/// `(limit, offset)`; `limit` overrides `maxfeatures`.
///
/// SQLite and `MySQL` reject `OFFSET` without `LIMIT`, so an offset alone is
/// paired with an unbounded limit there.
fn paging(
    params: &Params,
    backend: DbBackend,
) -> Result<(Option<u64>, Option<u64>), FilterError> {
    let mut limit = None;
    if let Some(v) = params.get("maxfeatures") {
        limit = Some(parse_count("maxfeatures", v)?);
    }
    if let Some(v) = params.get("limit") {
        limit = Some(parse_count("limit", v)?);
    }
    let offset = params
        .get("offset")
        .map(|v| parse_count("offset", v))
        .transpose()?;
    if limit.is_none() && offset.is_some() && backend != DbBackend::Postgres {
        limit = Some(UNBOUNDED_LIMIT);
    }
    Ok((limit, offset))
}

/// Apply `attrs` and `no_geom` to an outgoing feature.
fn restrict(feature: &mut Feature, params: &Params) {
    if let Some(attrs) = params.list("attrs") {
        let props = feature.properties.get_or_insert_with(Default::default);
        props.retain(|k, _| attrs.contains(&k.as_str()));
    }
    if params.get("no_geom").is_some_and(asbool) {
        feature.geometry = None;
    }
}

fn parse_body(body: &[u8]) -> Result<GeoJson, ProtocolError> {
    serde_json::from_slice::<GeoJson>(body)
        .map_err(|e| ProtocolError::BadRequest(format!("invalid GeoJSON body: {e}")))
}

impl<E: EntityTrait> Protocol<E> {
    #[must_use]
    pub fn new(mapping: Arc<GeoMapping<E>>) -> Self {
        Self {
            mapping,
            readonly: false,
            hooks: Arc::new(NoHooks),
            dialect: None,
        }
    }

    /// Reject create, update and delete with 405.
    #[must_use]
    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<dyn Hooks<E>>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Pin the spatial dialect instead of deriving it from the connection.
    #[must_use]
    pub fn with_spatial(mut self, dialect: SpatialDialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    #[must_use]
    pub fn mapping(&self) -> &GeoMapping<E> {
        &self.mapping
    }

    #[must_use]
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    #[must_use]
    pub fn dialect(&self, backend: DbBackend) -> SpatialDialect {
        self.dialect
            .clone()
            .unwrap_or_else(|| SpatialDialect::for_backend(backend))
    }
}

impl<E> Protocol<E>
where
    E: EntityTrait + 'static,
    E::Column: ColumnTrait + Copy,
    E::Model: IntoActiveModel<E::ActiveModel> + Send + Sync,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
{
    /// The default `MapFish` filter for `params` on this resource.
    ///
    /// # Errors
    /// See [`create_filter`].
    pub fn create_filter(
        &self,
        params: &Params,
        backend: DbBackend,
    ) -> Result<Option<Condition>, FilterError> {
        create_filter(params, &self.mapping, &self.dialect(backend))
    }

    fn resolve_filter<C: ConnectionTrait>(
        &self,
        conn: &C,
        req: &MapfishRequest,
        filter: Option<Condition>,
    ) -> Result<Option<Condition>, FilterError> {
        match filter {
            Some(f) => Ok(Some(f)),
            None => self.create_filter(&req.params, conn.get_database_backend()),
        }
    }

    async fn find<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: Value,
    ) -> Result<Option<GeoRecord<E>>, DbErr> {
        let pk = self.mapping.primary_key().col;
        let model = E::find().filter(pk.eq(id)).one(conn).await?;
        Ok(model.map(GeoRecord::from_model))
    }

    /// Look up a record by the `{id}` path segment. Ids that do not fit
    /// the key type match nothing.
    async fn find_by_path<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
    ) -> Result<Option<GeoRecord<E>>, DbErr> {
        match parse_text(self.mapping.primary_key().kind(), id) {
            Ok(value) => self.find(conn, value).await,
            Err(e) => {
                debug!(id, error = %e, "id does not fit the primary key");
                Ok(None)
            }
        }
    }

    fn to_feature(&self, record: &GeoRecord<E>, params: &Params) -> Result<Feature, ProtocolError> {
        let mut feature = record.read(&self.mapping).map_err(ProtocolError::Record)?;
        restrict(&mut feature, params);
        Ok(feature)
    }

    fn order_by(&self, params: &Params) -> Option<(E::Column, Order)> {
        let name = params.get("sort").or_else(|| params.get("order_by"))?;
        let def = self.mapping.get(name)?;
        let order = if params
            .get("dir")
            .is_some_and(|d| d.eq_ignore_ascii_case("DESC"))
        {
            Order::Desc
        } else {
            Order::Asc
        };
        Some((def.col, order))
    }

    /// Number of rows matching `filter`, or the filter built from the
    /// request parameters when `filter` is `None`.
    ///
    /// # Errors
    /// Filter or database errors.
    pub async fn count<C: ConnectionTrait>(
        &self,
        conn: &C,
        req: &MapfishRequest,
        filter: Option<Condition>,
    ) -> Result<u64, ProtocolError> {
        let mut query = E::find();
        if let Some(f) = self.resolve_filter(conn, req, filter)? {
            query = query.filter(f);
        }
        let n = query.count(conn).await?;
        debug!(count = n, "count");
        Ok(n)
    }

    /// One feature by id, or a collection selected by `filter` (or the
    /// request's filter), sorted and paged by the request parameters.
    ///
    /// # Errors
    /// - `ProtocolError::NotFound` for an unknown id
    /// - filter, paging, stored-geometry or database errors
    pub async fn read<C: ConnectionTrait>(
        &self,
        conn: &C,
        req: &MapfishRequest,
        filter: Option<Condition>,
        id: Option<&str>,
    ) -> Result<GeoJson, ProtocolError> {
        if let Some(id) = id {
            let record = self
                .find_by_path(conn, id)
                .await?
                .ok_or_else(|| ProtocolError::NotFound(id.to_owned()))?;
            return Ok(GeoJson::Feature(self.to_feature(&record, &req.params)?));
        }

        let mut query = E::find();
        if let Some(f) = self.resolve_filter(conn, req, filter)? {
            query = query.filter(f);
        }
        if let Some((col, order)) = self.order_by(&req.params) {
            query = query.order_by(col, order);
        }
        let (limit, offset) = paging(&req.params, conn.get_database_backend())?;
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        if let Some(offset) = offset {
            query = query.offset(offset);
        }

        let models = query.all(conn).await?;
        debug!(rows = models.len(), ?limit, ?offset, "read");
        let features = models
            .into_iter()
            .map(|m| self.to_feature(&GeoRecord::from_model(m), &req.params))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(GeoJson::FeatureCollection(FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }))
    }

    /// Insert or update every feature of a `FeatureCollection` body.
    ///
    /// A feature whose id matches a stored row updates it in place. Returns
    /// the written features, or `None` for an empty collection.
    ///
    /// # Errors
    /// - `ProtocolError::MethodNotAllowed` on a read-only resource
    /// - `ProtocolError::BadRequest` unless the body is a `FeatureCollection`
    /// - `ProtocolError::InvalidFeature` for a feature that cannot be written
    /// - hook and database errors
    pub async fn create<C: ConnectionTrait>(
        &self,
        conn: &C,
        req: &MapfishRequest,
    ) -> Result<Option<FeatureCollection>, ProtocolError> {
        if self.readonly {
            return Err(ProtocolError::MethodNotAllowed);
        }
        let GeoJson::FeatureCollection(collection) = parse_body(&req.body)? else {
            return Err(ProtocolError::BadRequest(
                "expected a FeatureCollection".to_owned(),
            ));
        };

        let pk = self.mapping.primary_key();
        let mut written = Vec::with_capacity(collection.features.len());
        for mut feature in collection.features {
            let mut existing = match feature.id.as_ref().map(|id| id_to_value(pk.kind(), id)) {
                Some(Ok(value)) => self.find(conn, value).await?,
                _ => None,
            };
            self.hooks
                .before_create(req, &mut feature, existing.as_mut())
                .map_err(ProtocolError::Hook)?;

            let record = match existing {
                None => {
                    let mut record = GeoRecord::init(&self.mapping, &feature)
                        .map_err(ProtocolError::InvalidFeature)?;
                    self.hooks
                        .before_insert(req, &feature, &mut record)
                        .map_err(ProtocolError::Hook)?;
                    record.insert(conn).await?
                }
                Some(mut record) => {
                    record
                        .update(&self.mapping, &feature)
                        .map_err(ProtocolError::InvalidFeature)?;
                    record.save(conn).await?
                }
            };
            written.push(record.read(&self.mapping).map_err(ProtocolError::Record)?);
        }

        debug!(features = written.len(), "create");
        if written.is_empty() {
            return Ok(None);
        }
        Ok(Some(FeatureCollection {
            bbox: None,
            features: written,
            foreign_members: None,
        }))
    }

    /// Apply a `Feature` body to the stored row `id`.
    ///
    /// # Errors
    /// - `ProtocolError::MethodNotAllowed` on a read-only resource
    /// - `ProtocolError::NotFound` for an unknown id
    /// - `ProtocolError::BadRequest` unless the body is a `Feature`
    /// - `ProtocolError::InvalidFeature`, hook and database errors
    pub async fn update<C: ConnectionTrait>(
        &self,
        conn: &C,
        req: &MapfishRequest,
        id: &str,
    ) -> Result<Feature, ProtocolError> {
        if self.readonly {
            return Err(ProtocolError::MethodNotAllowed);
        }
        let mut record = self
            .find_by_path(conn, id)
            .await?
            .ok_or_else(|| ProtocolError::NotFound(id.to_owned()))?;
        let GeoJson::Feature(mut feature) = parse_body(&req.body)? else {
            return Err(ProtocolError::BadRequest("expected a Feature".to_owned()));
        };

        self.hooks
            .before_update(req, &mut feature, &mut record)
            .map_err(ProtocolError::Hook)?;
        record
            .update(&self.mapping, &feature)
            .map_err(ProtocolError::InvalidFeature)?;
        let record = record.save(conn).await?;
        debug!(id, "update");
        record.read(&self.mapping).map_err(ProtocolError::Record)
    }

    /// Remove the stored row `id`.
    ///
    /// # Errors
    /// - `ProtocolError::MethodNotAllowed` on a read-only resource
    /// - `ProtocolError::NotFound` for an unknown id (the hook is not called)
    /// - hook and database errors
    pub async fn delete<C: ConnectionTrait>(
        &self,
        conn: &C,
        req: &MapfishRequest,
        id: &str,
    ) -> Result<(), ProtocolError> {
        if self.readonly {
            return Err(ProtocolError::MethodNotAllowed);
        }
        let record = self
            .find_by_path(conn, id)
            .await?
            .ok_or_else(|| ProtocolError::NotFound(id.to_owned()))?;
        self.hooks
            .before_delete(req, &record)
            .map_err(ProtocolError::Hook)?;
        record.delete(conn).await?;
        debug!(id, "delete");
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use bytes::Bytes;
    use papyrus_geo::{ColumnDef, ColumnKind, GeometryType};
    use sea_orm::{ConnectOptions, Database, DatabaseConnection};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    mod ent {
        use sea_orm::entity::prelude::*;

        #[derive(Debug, Clone, PartialEq, Eq, DeriveEntityModel)]
        #[sea_orm(table_name = "spots")]
        pub struct Model {
            #[sea_orm(primary_key)]
            pub id: i32,
            pub name: String,
            pub height: Option<i32>,
            pub owner_id: Option<i32>,
            pub geom: Option<Vec<u8>>,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }

    fn mapping() -> Arc<GeoMapping<ent::Entity>> {
        let mapping = GeoMapping::builder("Spot")
            .column(ColumnDef::new("id", ent::Column::Id, ColumnKind::Int).primary_key())
            .column(ColumnDef::new(
                "name",
                ent::Column::Name,
                ColumnKind::String { max_len: None },
            ))
            .column(ColumnDef::new("height", ent::Column::Height, ColumnKind::Int).nullable())
            .column(
                ColumnDef::new("owner_id", ent::Column::OwnerId, ColumnKind::Int)
                    .nullable()
                    .foreign_key(),
            )
            .column(
                ColumnDef::new(
                    "geom",
                    ent::Column::Geom,
                    ColumnKind::geometry(GeometryType::Point, 4326),
                )
                .nullable(),
            )
            .build()
            .unwrap();
        Arc::new(mapping)
    }

    async fn setup_db() -> DatabaseConnection {
        let opts = ConnectOptions::new("sqlite::memory:")
            .max_connections(1)
            .to_owned();
        let db = Database::connect(opts).await.unwrap();
        db.execute_unprepared(
            "CREATE TABLE spots (
id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
name TEXT NOT NULL,
height INTEGER,
owner_id INTEGER,
geom BLOB
)",
        )
        .await
        .unwrap();
        db
    }

    fn request(query: &str, body: serde_json::Value) -> MapfishRequest {
        MapfishRequest::new(
            Params::parse(query).unwrap(),
            Bytes::from(serde_json::to_vec(&body).unwrap()),
        )
    }

    fn spot(name: &str, height: i32, coords: [f64; 2]) -> serde_json::Value {
        json!({
            "type": "Feature",
            "properties": {"name": name, "height": height},
            "geometry": {"type": "Point", "coordinates": coords}
        })
    }

    async fn seed(protocol: &Protocol<ent::Entity>, db: &DatabaseConnection) {
        let body = json!({
            "type": "FeatureCollection",
            "features": [
                spot("alpha", 10, [0.0, 0.0]),
                spot("bravo", 30, [5.0, 5.0]),
                spot("charlie", 20, [1.0, 1.0]),
            ]
        });
        protocol.create(db, &request("", body)).await.unwrap();
    }

    fn collection(doc: GeoJson) -> FeatureCollection {
        match doc {
            GeoJson::FeatureCollection(fc) => fc,
            _ => panic!("expected a collection"),
        }
    }

    fn names(fc: &FeatureCollection) -> Vec<String> {
        fc.features
            .iter()
            .map(|f| f.property("name").unwrap().as_str().unwrap().to_owned())
            .collect()
    }

    #[test]
    fn paging_prefers_limit_over_maxfeatures() {
        let params = Params::parse("maxfeatures=5&limit=2&offset=1").unwrap();
        assert_eq!(paging(&params, DbBackend::Sqlite).unwrap(), (Some(2), Some(1)));

        let params = Params::parse("maxfeatures=5").unwrap();
        assert_eq!(paging(&params, DbBackend::Sqlite).unwrap(), (Some(5), None));

        let params = Params::parse("offset=-1").unwrap();
        assert!(matches!(
            paging(&params, DbBackend::Sqlite),
            Err(FilterError::InvalidParam { param: "offset", .. })
        ));
    }

    #[test]
    fn offset_alone_gets_unbounded_limit_outside_postgres() {
        let params = Params::parse("offset=3").unwrap();
        assert_eq!(
            paging(&params, DbBackend::Sqlite).unwrap(),
            (Some(UNBOUNDED_LIMIT), Some(3))
        );
        assert_eq!(
            paging(&params, DbBackend::MySql).unwrap(),
            (Some(UNBOUNDED_LIMIT), Some(3))
        );
        assert_eq!(paging(&params, DbBackend::Postgres).unwrap(), (None, Some(3)));
        assert_eq!(
            paging(&Params::default(), DbBackend::Sqlite).unwrap(),
            (None, None)
        );
    }

    #[tokio::test]
    async fn read_with_offset_only() {
        let db = setup_db().await;
        let protocol = Protocol::new(mapping());
        seed(&protocol, &db).await;

        let req = request("sort=height&offset=1", json!(null));
        let fc = collection(protocol.read(&db, &req, None, None).await.unwrap());
        assert_eq!(names(&fc), ["charlie", "bravo"]);
    }

    #[tokio::test]
    async fn count_uses_request_filter() {
        let db = setup_db().await;
        let protocol = Protocol::new(mapping());
        seed(&protocol, &db).await;

        let all = protocol.count(&db, &request("", json!(null)), None).await.unwrap();
        assert_eq!(all, 3);

        let req = request("queryable=height&height__gte=20", json!(null));
        assert_eq!(protocol.count(&db, &req, None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn explicit_filter_replaces_request_filter() {
        let db = setup_db().await;
        let protocol = Protocol::new(mapping());
        seed(&protocol, &db).await;

        let req = request("queryable=height&height__gte=20", json!(null));
        let only_alpha = Condition::all().add(ent::Column::Name.eq("alpha"));
        assert_eq!(protocol.count(&db, &req, Some(only_alpha)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn read_sorts_and_pages() {
        let db = setup_db().await;
        let protocol = Protocol::new(mapping());
        seed(&protocol, &db).await;

        let req = request("sort=height&dir=DESC", json!(null));
        let fc = collection(protocol.read(&db, &req, None, None).await.unwrap());
        assert_eq!(names(&fc), ["bravo", "charlie", "alpha"]);

        let req = request("order_by=height&maxfeatures=10&limit=2&offset=1", json!(null));
        let fc = collection(protocol.read(&db, &req, None, None).await.unwrap());
        assert_eq!(names(&fc), ["charlie", "bravo"]);
    }

    #[tokio::test]
    async fn read_restricts_attributes() {
        let db = setup_db().await;
        let protocol = Protocol::new(mapping());
        seed(&protocol, &db).await;

        let req = request("attrs=name&no_geom=true&sort=name", json!(null));
        let fc = collection(protocol.read(&db, &req, None, None).await.unwrap());
        let first = &fc.features[0];
        assert!(first.geometry.is_none());
        let props = first.properties.as_ref().unwrap();
        assert_eq!(props.len(), 1);
        assert_eq!(props["name"], "alpha");
        assert!(first.id.is_some());
    }

    #[tokio::test]
    async fn read_one_by_id() {
        let db = setup_db().await;
        let protocol = Protocol::new(mapping());
        seed(&protocol, &db).await;

        let doc = protocol
            .read(&db, &request("", json!(null)), None, Some("2"))
            .await
            .unwrap();
        let GeoJson::Feature(feature) = doc else {
            panic!("expected a feature");
        };
        assert_eq!(feature.property("name").unwrap(), "bravo");
        assert!(feature.geometry.is_some());

        for id in ["99", "not-a-number"] {
            let err = protocol
                .read(&db, &request("", json!(null)), None, Some(id))
                .await
                .unwrap_err();
            assert!(matches!(err, ProtocolError::NotFound(ref got) if got == id));
        }
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn unparsable_id_is_logged_and_not_found() {
        let db = setup_db().await;
        let protocol = Protocol::new(mapping());
        let err = protocol
            .delete(&db, &request("", json!(null)), "abc")
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::NotFound(_)));
        assert!(logs_contain("id does not fit the primary key"));
    }

    #[tokio::test]
    async fn malformed_filter_is_a_client_error() {
        let db = setup_db().await;
        let protocol = Protocol::new(mapping());

        let req = request("queryable=height&height__eq=tall", json!(null));
        let err = protocol.count(&db, &req, None).await.unwrap_err();
        assert!(err.is_client_error());
        assert!(matches!(err, ProtocolError::Filter(FilterError::InvalidValue { .. })));
    }

    #[tokio::test]
    async fn create_inserts_and_updates_by_id() {
        let db = setup_db().await;
        let protocol = Protocol::new(mapping());
        seed(&protocol, &db).await;

        let body = json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "id": 1, "properties": {"name": "alpha-2"}, "geometry": null},
                {"type": "Feature", "properties": {"name": "delta"}, "geometry": null}
            ]
        });
        let written = protocol.create(&db, &request("", body)).await.unwrap().unwrap();
        assert_eq!(written.features.len(), 2);
        assert_eq!(written.features[1].property("name").unwrap(), "delta");

        let stored = ent::Entity::find_by_id(1).one(&db).await.unwrap().unwrap();
        assert_eq!(stored.name, "alpha-2");
        assert_eq!(stored.height, None);
        assert!(stored.geom.is_some(), "absent geometry leaves the column alone");
        assert_eq!(protocol.count(&db, &request("", json!(null)), None).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn create_rejects_bad_bodies() {
        let db = setup_db().await;
        let protocol = Protocol::new(mapping());

        let req = request("", spot("alpha", 1, [0.0, 0.0]));
        let err = protocol.create(&db, &req).await.unwrap_err();
        assert!(matches!(err, ProtocolError::BadRequest(_)));

        let req = MapfishRequest::new(Params::default(), Bytes::from_static(b"{not json"));
        let err = protocol.create(&db, &req).await.unwrap_err();
        assert!(matches!(err, ProtocolError::BadRequest(_)));

        let body = json!({"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {"name": null}, "geometry": null}
        ]});
        let err = protocol.create(&db, &request("", body)).await.unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidFeature(_)));
    }

    #[tokio::test]
    async fn create_with_empty_collection_returns_none() {
        let db = setup_db().await;
        let protocol = Protocol::new(mapping());
        let body = json!({"type": "FeatureCollection", "features": []});
        assert!(protocol.create(&db, &request("", body)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn readonly_rejects_writes_before_touching_the_database() {
        // No table: any query would fail with a database error.
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let protocol = Protocol::new(mapping()).readonly(true);
        let req = request("", json!({"type": "FeatureCollection", "features": []}));

        assert!(matches!(
            protocol.create(&db, &req).await,
            Err(ProtocolError::MethodNotAllowed)
        ));
        assert!(matches!(
            protocol.update(&db, &req, "1").await,
            Err(ProtocolError::MethodNotAllowed)
        ));
        assert!(matches!(
            protocol.delete(&db, &req, "1").await,
            Err(ProtocolError::MethodNotAllowed)
        ));
    }

    #[tokio::test]
    async fn update_applies_feature() {
        let db = setup_db().await;
        let protocol = Protocol::new(mapping());
        seed(&protocol, &db).await;

        let body = json!({
            "type": "Feature",
            "properties": {"name": "bravo-2", "height": 31},
            "geometry": {"type": "Point", "coordinates": [6.0, 6.0]}
        });
        let feature = protocol.update(&db, &request("", body), "2").await.unwrap();
        assert_eq!(feature.property("height").unwrap(), 31);
        assert_eq!(feature.id, Some(geojson::feature::Id::Number(2.into())));

        let missing = protocol
            .update(&db, &request("", spot("x", 1, [0.0, 0.0])), "99")
            .await
            .unwrap_err();
        assert!(matches!(missing, ProtocolError::NotFound(_)));

        let wrong = json!({"type": "FeatureCollection", "features": []});
        let err = protocol.update(&db, &request("", wrong), "2").await.unwrap_err();
        assert!(matches!(err, ProtocolError::BadRequest(_)));
    }

    #[derive(Default)]
    struct Recording {
        mapping: Option<Arc<GeoMapping<ent::Entity>>>,
        created: AtomicUsize,
        inserted: AtomicUsize,
        deleted: AtomicUsize,
        veto_delete: bool,
    }

    impl Hooks<ent::Entity> for Recording {
        fn before_create(
            &self,
            _req: &MapfishRequest,
            feature: &mut Feature,
            _existing: Option<&mut GeoRecord<ent::Entity>>,
        ) -> anyhow::Result<()> {
            self.created.fetch_add(1, Ordering::SeqCst);
            feature.set_property("height", 7);
            Ok(())
        }

        fn before_insert(
            &self,
            _req: &MapfishRequest,
            _feature: &Feature,
            record: &mut GeoRecord<ent::Entity>,
        ) -> anyhow::Result<()> {
            self.inserted.fetch_add(1, Ordering::SeqCst);
            if let Some(mapping) = &self.mapping {
                record.set_property(mapping, "owner_id", &json!(42))?;
            }
            Ok(())
        }

        fn before_delete(
            &self,
            _req: &MapfishRequest,
            _record: &GeoRecord<ent::Entity>,
        ) -> anyhow::Result<()> {
            self.deleted.fetch_add(1, Ordering::SeqCst);
            if self.veto_delete {
                anyhow::bail!("spots are forever");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn hooks_see_and_mutate_writes() {
        let db = setup_db().await;
        let mapping = mapping();
        let hooks = Arc::new(Recording {
            mapping: Some(Arc::clone(&mapping)),
            ..Recording::default()
        });
        let protocol = Protocol::new(mapping).with_hooks(hooks.clone());
        seed(&protocol, &db).await;

        assert_eq!(hooks.created.load(Ordering::SeqCst), 3);
        assert_eq!(hooks.inserted.load(Ordering::SeqCst), 3);
        let stored = ent::Entity::find_by_id(1).one(&db).await.unwrap().unwrap();
        assert_eq!(stored.height, Some(7));
        assert_eq!(stored.owner_id, Some(42));

        let err = protocol.delete(&db, &request("", json!(null)), "99").await.unwrap_err();
        assert!(matches!(err, ProtocolError::NotFound(_)));
        assert_eq!(hooks.deleted.load(Ordering::SeqCst), 0);

        protocol.delete(&db, &request("", json!(null)), "1").await.unwrap();
        assert_eq!(hooks.deleted.load(Ordering::SeqCst), 1);
        assert!(ent::Entity::find_by_id(1).one(&db).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn hook_error_aborts_delete() {
        let db = setup_db().await;
        let hooks = Arc::new(Recording {
            veto_delete: true,
            ..Recording::default()
        });
        let protocol = Protocol::new(mapping()).with_hooks(hooks);
        seed(&protocol, &db).await;

        let err = protocol.delete(&db, &request("", json!(null)), "1").await.unwrap_err();
        assert!(matches!(err, ProtocolError::Hook(_)));
        assert!(!err.is_client_error());
        assert!(ent::Entity::find_by_id(1).one(&db).await.unwrap().is_some());
    }
}
