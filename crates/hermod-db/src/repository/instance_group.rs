//! SurrealDB implementation of [`GroupRepository`].

use chrono::{DateTime, Utc};
use hermod_core::error::HermodResult;
use hermod_core::models::instance_group::{
    CreateInstanceGroup, InstanceGroup, UpdateInstanceGroup,
};
use hermod_core::repository::GroupRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::{DbError, map_write_error};

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct GroupRow {
    name: String,
    alias: String,
    description: Option<String>,
    enabled: bool,
    instances: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GroupRow {
    fn into_group(self, id: Uuid) -> InstanceGroup {
        InstanceGroup {
            id,
            name: self.name,
            alias: self.alias,
            description: self.description,
            enabled: self.enabled,
            instances: self.instances,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct GroupRowWithId {
    record_id: String,
    name: String,
    alias: String,
    description: Option<String>,
    enabled: bool,
    instances: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GroupRowWithId {
    fn try_into_group(self) -> Result<InstanceGroup, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Migration(format!("invalid UUID: {e}")))?;
        Ok(InstanceGroup {
            id,
            name: self.name,
            alias: self.alias,
            description: self.description,
            enabled: self.enabled,
            instances: self.instances,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the instance-group repository.
#[derive(Clone)]
pub struct SurrealGroupRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealGroupRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Count groups matching `field = $value`, excluding `exclude` when
    /// given. Used for friendly duplicate messages ahead of the unique
    /// indexes.
    async fn count_where(
        &self,
        field: &str,
        value: String,
        exclude: Option<Uuid>,
    ) -> Result<u64, DbError> {
        let query = match exclude {
            Some(_) => format!(
                "SELECT count() AS total FROM instance_group \
                 WHERE {field} = $value AND meta::id(id) != $exclude GROUP ALL"
            ),
            None => format!(
                "SELECT count() AS total FROM instance_group \
                 WHERE {field} = $value GROUP ALL"
            ),
        };

        let mut builder = self.db.query(&query).bind(("value", value));
        if let Some(id) = exclude {
            builder = builder.bind(("exclude", id.to_string()));
        }

        let mut result = builder.await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    async fn fetch_row(&self, id: Uuid) -> Result<GroupRow, DbError> {
        let id_str = id.to_string();
        let mut result = self
            .db
            .query("SELECT * FROM type::record('instance_group', $id)")
            .bind(("id", id_str.clone()))
            .await?;

        let rows: Vec<GroupRow> = result.take(0)?;
        rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "instance_group".into(),
            id: id_str,
        })
    }

    async fn fetch_by_field(&self, field: &str, value: String) -> Result<InstanceGroup, DbError> {
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM instance_group \
             WHERE {field} = $value"
        );
        let mut result = self.db.query(&query).bind(("value", value.clone())).await?;

        let rows: Vec<GroupRowWithId> = result.take(0)?;
        let row = rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "instance_group".into(),
            id: value,
        })?;
        row.try_into_group()
    }
}

impl<C: Connection> GroupRepository for SurrealGroupRepository<C> {
    async fn create(&self, input: CreateInstanceGroup) -> HermodResult<InstanceGroup> {
        if self.count_where("name", input.name.clone(), None).await? > 0 {
            return Err(DbError::UniqueViolation(format!(
                "group name '{}' already exists",
                input.name
            ))
            .into());
        }
        if self.count_where("alias", input.alias.clone(), None).await? > 0 {
            return Err(DbError::UniqueViolation(format!(
                "group alias '{}' already exists",
                input.alias
            ))
            .into());
        }

        let id = Uuid::new_v4();

        let result = self
            .db
            .query(
                "CREATE type::record('instance_group', $id) SET \
                 name = $name, alias = $alias, \
                 description = $description, enabled = $enabled, \
                 instances = $instances",
            )
            .bind(("id", id.to_string()))
            .bind(("name", input.name))
            .bind(("alias", input.alias))
            .bind(("description", input.description))
            .bind(("enabled", input.enabled))
            .bind(("instances", input.instances))
            .await
            .map_err(|e| map_write_error(e, "group name or alias"))?;

        let mut result = result
            .check()
            .map_err(|e| map_write_error(e, "group name or alias"))?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "instance_group".into(),
            id: id.to_string(),
        })?;

        Ok(row.into_group(id))
    }

    async fn get_by_id(&self, id: Uuid) -> HermodResult<InstanceGroup> {
        let row = self.fetch_row(id).await?;
        Ok(row.into_group(id))
    }

    async fn get_by_name(&self, name: &str) -> HermodResult<InstanceGroup> {
        Ok(self.fetch_by_field("name", name.to_string()).await?)
    }

    async fn get_by_alias(&self, alias: &str) -> HermodResult<InstanceGroup> {
        Ok(self.fetch_by_field("alias", alias.to_string()).await?)
    }

    async fn update(&self, id: Uuid, input: UpdateInstanceGroup) -> HermodResult<InstanceGroup> {
        if let Some(name) = &input.name
            && self.count_where("name", name.clone(), Some(id)).await? > 0
        {
            return Err(
                DbError::UniqueViolation(format!("group name '{name}' already exists")).into(),
            );
        }
        if let Some(alias) = &input.alias
            && self.count_where("alias", alias.clone(), Some(id)).await? > 0
        {
            return Err(
                DbError::UniqueViolation(format!("group alias '{alias}' already exists")).into(),
            );
        }

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.alias.is_some() {
            sets.push("alias = $alias");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.enabled.is_some() {
            sets.push("enabled = $enabled");
        }
        if input.instances.is_some() {
            sets.push("instances = $instances");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('instance_group', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id.to_string()));
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(alias) = input.alias {
            builder = builder.bind(("alias", alias));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(enabled) = input.enabled {
            builder = builder.bind(("enabled", enabled));
        }
        if let Some(instances) = input.instances {
            builder = builder.bind(("instances", instances));
        }

        let result = builder
            .await
            .map_err(|e| map_write_error(e, "group name or alias"))?;
        let mut result = result
            .check()
            .map_err(|e| map_write_error(e, "group name or alias"))?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "instance_group".into(),
            id: id.to_string(),
        })?;

        Ok(row.into_group(id))
    }

    async fn delete(&self, id: Uuid) -> HermodResult<()> {
        // Verify existence first so deletes of unknown ids surface 404.
        self.fetch_row(id).await?;

        self.db
            .query("DELETE type::record('instance_group', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn list(&self) -> HermodResult<Vec<InstanceGroup>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM instance_group \
                 ORDER BY created_at ASC",
            )
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRowWithId> = result.take(0).map_err(DbError::from)?;

        let groups = rows
            .into_iter()
            .map(|row| row.try_into_group())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(groups)
    }

    async fn add_instance(&self, id: Uuid, instance: &str) -> HermodResult<InstanceGroup> {
        let row = self.fetch_row(id).await?;
        if row.instances.iter().any(|name| name == instance) {
            return Err(DbError::UniqueViolation(format!(
                "instance '{instance}' is already a member of the group"
            ))
            .into());
        }

        let mut result = self
            .db
            .query(
                "UPDATE type::record('instance_group', $id) SET \
                 instances += $instance, updated_at = time::now()",
            )
            .bind(("id", id.to_string()))
            .bind(("instance", instance.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "instance_group".into(),
            id: id.to_string(),
        })?;

        Ok(row.into_group(id))
    }

    async fn remove_instance(&self, id: Uuid, instance: &str) -> HermodResult<InstanceGroup> {
        let row = self.fetch_row(id).await?;
        if !row.instances.iter().any(|name| name == instance) {
            return Err(hermod_core::error::HermodError::validation(format!(
                "instance '{instance}' is not a member of the group"
            )));
        }
        if row.instances.len() == 1 {
            return Err(hermod_core::error::HermodError::validation(
                "cannot remove the last instance from a group",
            ));
        }

        let mut result = self
            .db
            .query(
                "UPDATE type::record('instance_group', $id) SET \
                 instances -= $instance, updated_at = time::now()",
            )
            .bind(("id", id.to_string()))
            .bind(("instance", instance.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "instance_group".into(),
            id: id.to_string(),
        })?;

        Ok(row.into_group(id))
    }
}
