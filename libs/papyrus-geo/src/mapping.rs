//! Explicit property ↔ column table for a `SeaORM` entity.

use std::collections::HashSet;

use sea_orm::{EntityName, EntityTrait};

use crate::column::{ColumnInfo, ColumnKind};
use crate::error::MappingError;

/// One mapped column: the entity column and its metadata.
#[derive(Clone, Debug)]
#[must_use]
pub struct ColumnDef<E: EntityTrait> {
    pub col: E::Column,
    pub info: ColumnInfo,
}

impl<E: EntityTrait> ColumnDef<E> {
    pub fn new(name: impl Into<String>, col: E::Column, kind: ColumnKind) -> Self {
        Self {
            col,
            info: ColumnInfo::new(name, kind),
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.info.primary_key = true;
        self
    }

    /// Mark the column nullable. Must match an `Option<_>` field on the model.
    pub fn nullable(mut self) -> Self {
        self.info.nullable = true;
        self
    }

    pub fn foreign_key(mut self) -> Self {
        self.info.foreign_key = true;
        self
    }

    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.info.info.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.info.name
    }

    #[must_use]
    pub fn kind(&self) -> &ColumnKind {
        &self.info.kind
    }
}

/// Entity-independent view of a mapping, enough to describe the resource
/// (e.g. as an XSD document).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MappingSchema {
    pub class_name: String,
    pub columns: Vec<ColumnInfo>,
}

/// Validated mapping of a `MapFish` resource onto entity `E`.
#[derive(Clone, Debug)]
pub struct GeoMapping<E: EntityTrait> {
    class_name: String,
    columns: Vec<ColumnDef<E>>,
    virtual_properties: Vec<String>,
    pk: usize,
    geometry: Option<usize>,
}

#[must_use]
pub struct GeoMappingBuilder<E: EntityTrait> {
    class_name: String,
    columns: Vec<ColumnDef<E>>,
    virtual_properties: Vec<String>,
}

impl<E: EntityTrait> GeoMapping<E> {
    /// Start a mapping; `class_name` names the XSD complex type.
    pub fn builder(class_name: impl Into<String>) -> GeoMappingBuilder<E> {
        GeoMappingBuilder {
            class_name: class_name.into(),
            columns: Vec::new(),
            virtual_properties: Vec::new(),
        }
    }

    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    #[must_use]
    pub fn table_name(&self) -> String {
        E::default().table_name().to_owned()
    }

    /// Columns in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnDef<E>] {
        &self.columns
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ColumnDef<E>> {
        self.columns.iter().find(|c| c.info.name == name)
    }

    #[must_use]
    pub fn primary_key(&self) -> &ColumnDef<E> {
        &self.columns[self.pk]
    }

    #[must_use]
    pub fn geometry(&self) -> Option<&ColumnDef<E>> {
        self.geometry.map(|i| &self.columns[i])
    }

    #[must_use]
    pub fn schema(&self) -> MappingSchema {
        MappingSchema {
            class_name: self.class_name.clone(),
            columns: self.columns.iter().map(|c| c.info.clone()).collect(),
        }
    }

    /// Properties carried by features but not stored in a column.
    #[must_use]
    pub fn virtual_properties(&self) -> &[String] {
        &self.virtual_properties
    }
}

impl<E: EntityTrait> GeoMappingBuilder<E> {
    pub fn column(mut self, def: ColumnDef<E>) -> Self {
        self.columns.push(def);
        self
    }

    pub fn add_properties<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.virtual_properties
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Validate and freeze the mapping.
    ///
    /// # Errors
    /// - `MappingError::PrimaryKey` unless exactly one column is a primary key
    /// - `MappingError::MultipleGeometry` for a second geometry column
    /// - `MappingError::DuplicateProperty` when a column or virtual property
    ///   name repeats
    pub fn build(self) -> Result<GeoMapping<E>, MappingError> {
        let class = self.class_name;

        let mut seen = HashSet::new();
        let names = self
            .columns
            .iter()
            .map(|c| c.info.name.as_str())
            .chain(self.virtual_properties.iter().map(String::as_str));
        for name in names {
            if !seen.insert(name) {
                return Err(MappingError::DuplicateProperty {
                    class,
                    name: name.to_owned(),
                });
            }
        }

        let pks: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.info.primary_key)
            .map(|(i, _)| i)
            .collect();
        let &[pk] = pks.as_slice() else {
            return Err(MappingError::PrimaryKey {
                class,
                count: pks.len(),
            });
        };

        let mut geometry: Option<usize> = None;
        for (i, c) in self.columns.iter().enumerate() {
            if !c.info.kind.is_geometry() {
                continue;
            }
            if let Some(first) = geometry {
                return Err(MappingError::MultipleGeometry {
                    first: self.columns[first].info.name.clone(),
                    second: c.info.name.clone(),
                    class,
                });
            }
            geometry = Some(i);
        }

        tracing::debug!(
            class = %class,
            columns = self.columns.len(),
            has_geometry = geometry.is_some(),
            "geo mapping built"
        );

        Ok(GeoMapping {
            class_name: class,
            columns: self.columns,
            virtual_properties: self.virtual_properties,
            pk,
            geometry,
        })
    }
}
