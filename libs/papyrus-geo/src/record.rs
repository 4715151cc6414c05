//! Geo-interface record: an entity's active model viewed as a `GeoJSON`
//! feature.
//!
//! The record owns the `ActiveModel`, the shape parsed from the last written
//! geometry and the values of the mapping's virtual properties. Only the
//! active model is ever persisted.

use geojson::feature::Id;
use geojson::{Feature, JsonObject};
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, IntoActiveModel,
    Value,
};
use serde_json::Value as JsonValue;

use crate::adapter::{Shape, from_shape, from_wkb, to_shape, to_wkb};
use crate::column::ColumnKind;
use crate::error::{RecordError, ValueError};
use crate::mapping::{ColumnDef, GeoMapping};
use crate::value::{from_json, parse_text, to_json};

pub struct GeoRecord<E: EntityTrait> {
    active: E::ActiveModel,
    shape: Option<Shape>,
    virtual_values: JsonObject,
}

/// Coerce a feature id (or a path segment) to the primary key's type.
///
/// # Errors
/// Any `ValueError` from the coercion.
pub fn id_to_value(kind: &ColumnKind, id: &Id) -> Result<Value, ValueError> {
    match id {
        Id::String(s) => parse_text(kind, s),
        Id::Number(n) => from_json(kind, &JsonValue::Number(n.clone())),
    }
}

fn id_from_value(value: &Value) -> Option<Id> {
    match to_json(value) {
        JsonValue::Number(n) => Some(Id::Number(n)),
        JsonValue::String(s) => Some(Id::String(s)),
        _ => None,
    }
}

impl<E> Default for GeoRecord<E>
where
    E: EntityTrait,
    E::ActiveModel: ActiveModelBehavior,
{
    fn default() -> Self {
        Self {
            active: <E::ActiveModel as ActiveModelBehavior>::new(),
            shape: None,
            virtual_values: JsonObject::new(),
        }
    }
}

impl<E> GeoRecord<E>
where
    E: EntityTrait,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
    E::Model: IntoActiveModel<E::ActiveModel>,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a row loaded from the database. No shape is cached yet.
    #[must_use]
    pub fn from_model(model: E::Model) -> Self {
        Self {
            active: model.into_active_model(),
            shape: None,
            virtual_values: JsonObject::new(),
        }
    }

    /// New record from a feature: the primary key comes from `feature.id`
    /// when present, everything else from [`GeoRecord::update`].
    ///
    /// # Errors
    /// `RecordError::Id` for an id the key column cannot hold, otherwise the
    /// errors of [`GeoRecord::update`].
    pub fn init(mapping: &GeoMapping<E>, feature: &Feature) -> Result<Self, RecordError> {
        let mut record = Self::new();
        if let Some(id) = &feature.id {
            let pk = mapping.primary_key();
            let value = id_to_value(pk.kind(), id).map_err(RecordError::Id)?;
            record.active.set(pk.col, value);
        }
        record.update(mapping, feature)?;
        Ok(record)
    }

    /// Copy a feature's properties and geometry onto the record.
    ///
    /// Primary and foreign keys are never written. A missing property sets a
    /// nullable column to null and leaves a non-nullable one untouched; an
    /// explicit `null` for a non-nullable column is rejected. The geometry
    /// column is written only when the feature carries a geometry.
    ///
    /// # Errors
    /// - `RecordError::Property` when a property cannot be coerced
    /// - `RecordError::Geo` when the geometry cannot be converted to WKB
    pub fn update(&mut self, mapping: &GeoMapping<E>, feature: &Feature) -> Result<(), RecordError> {
        let props = feature.properties.as_ref();
        for def in mapping.columns() {
            let info = &def.info;
            if info.primary_key || info.foreign_key {
                continue;
            }
            if info.kind.is_geometry() {
                if let Some(geometry) = &feature.geometry {
                    let shape = to_shape(geometry)?;
                    let wkb = to_wkb(&shape)?;
                    self.active.set(def.col, Value::Bytes(Some(Box::new(wkb))));
                    self.shape = Some(shape);
                }
                continue;
            }
            match props.and_then(|p| p.get(&info.name)) {
                Some(raw) => self.assign(def, raw)?,
                None if info.nullable => self.assign(def, &JsonValue::Null)?,
                None => {}
            }
        }
        for name in mapping.virtual_properties() {
            let value = props
                .and_then(|p| p.get(name))
                .cloned()
                .unwrap_or(JsonValue::Null);
            self.virtual_values.insert(name.clone(), value);
        }
        Ok(())
    }

    fn assign(&mut self, def: &ColumnDef<E>, raw: &JsonValue) -> Result<(), RecordError> {
        let property = |source| RecordError::Property {
            property: def.info.name.clone(),
            source,
        };
        if raw.is_null() && !def.info.nullable {
            return Err(property(ValueError::NullNotAllowed));
        }
        let value = from_json(def.kind(), raw).map_err(property)?;
        self.active.set(def.col, value);
        Ok(())
    }

    /// Set a single mapped property, as hooks do for computed columns.
    ///
    /// Unlike [`GeoRecord::update`] this also writes foreign keys. Unknown
    /// names are stored as virtual values.
    ///
    /// # Errors
    /// `RecordError::Property` when the value cannot be coerced.
    pub fn set_property(
        &mut self,
        mapping: &GeoMapping<E>,
        name: &str,
        value: &JsonValue,
    ) -> Result<(), RecordError> {
        match mapping.get(name) {
            Some(def) if def.kind().is_geometry() => {
                let value = from_json(def.kind(), value).map_err(|source| {
                    RecordError::Property {
                        property: name.to_owned(),
                        source,
                    }
                })?;
                if let Value::Bytes(Some(bytes)) = &value {
                    self.shape = Some(from_wkb(bytes)?);
                } else {
                    self.shape = None;
                }
                self.active.set(def.col, value);
                Ok(())
            }
            Some(def) => self.assign(def, value),
            None => {
                self.virtual_values.insert(name.to_owned(), value.clone());
                Ok(())
            }
        }
    }

    /// Current value of a mapped column, `None` when it was never set.
    #[must_use]
    pub fn value(&self, def: &ColumnDef<E>) -> Option<Value> {
        self.active.get(def.col).into_value()
    }

    /// The feature view of the record.
    ///
    /// # Errors
    /// `RecordError::Geo` when the stored geometry is not valid WKB.
    pub fn read(&self, mapping: &GeoMapping<E>) -> Result<Feature, RecordError> {
        let mut id = None;
        let mut geometry = None;
        let mut properties = JsonObject::new();

        for def in mapping.columns() {
            let info = &def.info;
            let value = self.value(def);
            if info.primary_key {
                id = value.as_ref().and_then(id_from_value);
            } else if info.kind.is_geometry() {
                geometry = match (&self.shape, value) {
                    (Some(shape), _) => Some(from_shape(shape)),
                    (None, Some(Value::Bytes(Some(bytes)))) => Some(from_shape(&from_wkb(&bytes)?)),
                    (None, _) => None,
                };
            } else if !info.foreign_key {
                properties.insert(
                    info.name.clone(),
                    value.as_ref().map_or(JsonValue::Null, to_json),
                );
            }
        }
        for name in mapping.virtual_properties() {
            let value = self
                .virtual_values
                .get(name)
                .cloned()
                .unwrap_or(JsonValue::Null);
            properties.insert(name.clone(), value);
        }

        Ok(Feature {
            bbox: None,
            geometry,
            id,
            properties: Some(properties),
            foreign_members: None,
        })
    }

    #[must_use]
    pub fn shape(&self) -> Option<&Shape> {
        self.shape.as_ref()
    }

    #[must_use]
    pub fn active_model(&self) -> &E::ActiveModel {
        &self.active
    }

    pub fn active_model_mut(&mut self) -> &mut E::ActiveModel {
        &mut self.active
    }

    /// Insert the record; the returned record reflects database defaults.
    ///
    /// # Errors
    /// Any `DbErr` from the insert.
    pub async fn insert<C: ConnectionTrait>(self, conn: &C) -> Result<Self, DbErr> {
        let Self {
            active,
            shape,
            virtual_values,
        } = self;
        let model = active.insert(conn).await?;
        Ok(Self {
            active: model.into_active_model(),
            shape,
            virtual_values,
        })
    }

    /// Write changed columns of an existing row.
    ///
    /// # Errors
    /// Any `DbErr` from the update, including `RecordNotUpdated`.
    pub async fn save<C: ConnectionTrait>(self, conn: &C) -> Result<Self, DbErr> {
        let Self {
            active,
            shape,
            virtual_values,
        } = self;
        let model = active.update(conn).await?;
        Ok(Self {
            active: model.into_active_model(),
            shape,
            virtual_values,
        })
    }

    /// # Errors
    /// Any `DbErr` from the delete.
    pub async fn delete<C: ConnectionTrait>(self, conn: &C) -> Result<(), DbErr> {
        self.active.delete(conn).await?;
        Ok(())
    }
}
