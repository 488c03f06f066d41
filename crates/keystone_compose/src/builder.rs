//! Generic resource builder.
//!
//! A [`Builder`] starts from the policy table's defaults for its kind and
//! applies caller operations one field at a time:
//!
//! - `set` overwrites a field; the last write wins. On a list field it
//!   replaces the whole list.
//! - `add` appends one item to a list field, keeping call order and
//!   duplicates.
//! - `insert` adds or overwrites one entry of a map field.
//! - `unset` removes a field, defaults included.
//! - `add_child` appends a nested spec the parent kind accepts.
//!
//! `finish` freezes the builder and returns the [`ResourceSpec`]; any later
//! mutation is a `FrozenBuilder` error. Value shapes are checked when the
//! spec is bound, not here.

use crate::error::{ComposeError, ComposeResult};
use crate::policy::PolicyTable;
use crate::schema::{schema_for, FieldSchema, KindSchema};
use crate::spec::{IntoSpec, ResourceSpec};
use indexmap::IndexMap;
use keystone_core::{FieldValue, LogicalName, ResourceKind};

/// Mutable accumulator for one resource
#[derive(Debug, Clone)]
pub struct Builder {
    kind: ResourceKind,
    name: LogicalName,
    schema: &'static KindSchema,
    fields: IndexMap<String, FieldValue>,
    children: Vec<ResourceSpec>,
    frozen: bool,
}

impl Builder {
    /// Start a builder from the built-in defaults
    ///
    /// # Errors
    ///
    /// Returns error if `name` is not a valid logical name or the built-in
    /// table has no entry for `kind`
    pub fn start(kind: ResourceKind, name: &str) -> ComposeResult<Self> {
        Self::start_with(PolicyTable::builtin(), kind, name)
    }

    /// Start a builder from the defaults in `table`
    ///
    /// # Errors
    ///
    /// Returns error if `name` is not a valid logical name or `table` has
    /// no entry for `kind`
    pub fn start_with(table: &PolicyTable, kind: ResourceKind, name: &str) -> ComposeResult<Self> {
        let defaults = table.defaults_for(kind)?;
        let name = LogicalName::new(name)?;
        Ok(Self {
            kind,
            name,
            schema: schema_for(kind),
            fields: defaults.clone(),
            children: Vec::new(),
            frozen: false,
        })
    }

    /// Start a builder from a kind tag such as `"queue"`
    ///
    /// # Errors
    ///
    /// Returns `UnknownKind` if the tag names no kind, otherwise as
    /// [`Builder::start_with`]
    pub fn start_tagged(table: &PolicyTable, kind: &str, name: &str) -> ComposeResult<Self> {
        let kind: ResourceKind = kind.parse()?;
        Self::start_with(table, kind, name)
    }

    /// Resource kind
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Logical name
    #[must_use]
    pub const fn name(&self) -> &LogicalName {
        &self.name
    }

    /// Current value of a field
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Whether `finish` has been called
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Overwrite one field
    ///
    /// # Errors
    ///
    /// Returns `FrozenBuilder` after `finish`, `UnknownField` if the kind
    /// declares no such field
    pub fn set(&mut self, key: &str, value: impl Into<FieldValue>) -> ComposeResult<&mut Self> {
        self.ensure_mutable("set a field")?;
        self.field_schema(key)?;
        self.fields.insert(key.to_string(), value.into());
        Ok(self)
    }

    /// Append one item to a list field
    ///
    /// # Errors
    ///
    /// Returns `FrozenBuilder` after `finish`, `UnknownField` if the kind
    /// declares no such field, `InvalidField` if the field is not a list
    pub fn add(&mut self, key: &str, item: impl Into<FieldValue>) -> ComposeResult<&mut Self> {
        self.ensure_mutable("add to a field")?;
        let schema = self.field_schema(key)?;
        if !schema.ty.is_list() {
            return Err(self.invalid(key, format!("{} is not multi-valued; use set", schema.ty)));
        }

        match self.fields.get_mut(key) {
            Some(FieldValue::List(items)) => items.push(item.into()),
            Some(other) => {
                let found = other.type_name();
                return Err(self.invalid(key, format!("cannot append to a {}", found)));
            }
            None => {
                self.fields
                    .insert(key.to_string(), FieldValue::List(vec![item.into()]));
            }
        }
        Ok(self)
    }

    /// Add or overwrite one entry of a map field
    ///
    /// # Errors
    ///
    /// Returns `FrozenBuilder` after `finish`, `UnknownField` if the kind
    /// declares no such field, `InvalidField` if the field is not a map
    pub fn insert(
        &mut self,
        key: &str,
        entry: &str,
        value: impl Into<FieldValue>,
    ) -> ComposeResult<&mut Self> {
        self.ensure_mutable("insert into a field")?;
        let schema = self.field_schema(key)?;
        if !schema.ty.is_map() {
            return Err(self.invalid(key, format!("{} is not a map; use set", schema.ty)));
        }

        match self.fields.get_mut(key) {
            Some(FieldValue::Map(entries)) => {
                entries.insert(entry.to_string(), value.into());
            }
            Some(other) => {
                let found = other.type_name();
                return Err(self.invalid(key, format!("cannot insert into a {}", found)));
            }
            None => {
                let mut entries = IndexMap::new();
                entries.insert(entry.to_string(), value.into());
                self.fields.insert(key.to_string(), FieldValue::Map(entries));
            }
        }
        Ok(self)
    }

    /// Remove a field, including its default
    ///
    /// # Errors
    ///
    /// Returns `FrozenBuilder` after `finish`, `UnknownField` if the kind
    /// declares no such field
    pub fn unset(&mut self, key: &str) -> ComposeResult<&mut Self> {
        self.ensure_mutable("unset a field")?;
        self.field_schema(key)?;
        self.fields.shift_remove(key);
        Ok(self)
    }

    /// Append a nested spec
    ///
    /// # Errors
    ///
    /// Returns `FrozenBuilder` after `finish`, `KindMismatch` if this kind
    /// does not accept the child's kind
    pub fn add_child(&mut self, child: impl IntoSpec) -> ComposeResult<&mut Self> {
        self.ensure_mutable("add a child")?;
        let child = child.into_spec()?;
        if !self.schema.accepts_child(child.kind()) {
            return Err(ComposeError::KindMismatch {
                parent: self.name.clone(),
                parent_kind: self.kind,
                child: child.name().clone(),
                child_kind: child.kind(),
            });
        }
        self.children.push(child);
        Ok(self)
    }

    /// Freeze and return the spec
    ///
    /// Calling it again returns an equal spec.
    pub fn finish(&mut self) -> ResourceSpec {
        self.frozen = true;
        ResourceSpec::new(
            self.kind,
            self.name.clone(),
            self.fields.clone(),
            self.children.clone(),
        )
    }

    fn ensure_mutable(&self, operation: &'static str) -> ComposeResult<()> {
        if self.frozen {
            return Err(ComposeError::FrozenBuilder {
                kind: self.kind,
                name: self.name.clone(),
                operation,
            });
        }
        Ok(())
    }

    fn field_schema(&self, key: &str) -> ComposeResult<&'static FieldSchema> {
        self.schema.field(key).ok_or_else(|| ComposeError::UnknownField {
            kind: self.kind,
            name: self.name.clone(),
            field: key.to_string(),
        })
    }

    fn invalid(&self, key: &str, reason: String) -> ComposeError {
        ComposeError::InvalidField {
            name: self.name.clone(),
            field: key.to_string(),
            reason,
        }
    }
}

impl IntoSpec for Builder {
    fn into_spec(mut self) -> ComposeResult<ResourceSpec> {
        Ok(self.finish())
    }
}
