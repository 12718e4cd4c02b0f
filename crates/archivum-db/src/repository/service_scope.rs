//! SurrealDB implementation of [`ServiceScopeRepository`].

use std::collections::BTreeSet;

use archivum_core::error::ArchiveResult;
use archivum_core::models::identity::ServiceCode;
use archivum_core::models::service_scope::{CreateServiceScope, ServiceScope, UpdateServiceScope};
use archivum_core::repository::{PaginatedResult, Pagination, ServiceScopeRepository};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_optional_uuid, parse_uuid};
use crate::error::DbError;

const ENTITY: &str = "service_scope";

/// DB-side row struct for statements where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct ServiceScopeRow {
    name: String,
    code: String,
    members: Vec<String>,
    responsible: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct ServiceScopeRowWithId {
    record_id: String,
    name: String,
    code: String,
    members: Vec<String>,
    responsible: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ServiceScopeRow {
    fn into_service_scope(self, id: Uuid) -> Result<ServiceScope, DbError> {
        let members = self
            .members
            .iter()
            .map(|m| parse_uuid(ENTITY, m))
            .collect::<Result<BTreeSet<_>, _>>()?;
        let code =
            ServiceCode::new(self.code).map_err(|e| DbError::decode(ENTITY, e.to_string()))?;
        Ok(ServiceScope {
            id,
            name: self.name,
            code,
            members,
            responsible: parse_optional_uuid(ENTITY, self.responsible.as_deref())?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl ServiceScopeRowWithId {
    fn try_into_service_scope(self) -> Result<ServiceScope, DbError> {
        let id = parse_uuid(ENTITY, &self.record_id)?;
        ServiceScopeRow {
            name: self.name,
            code: self.code,
            members: self.members,
            responsible: self.responsible,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_service_scope(id)
    }
}

#[derive(Clone)]
pub struct SurrealServiceScopeRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealServiceScopeRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Run a statement addressing one record by `$id` and decode the
    /// record it returns.
    async fn single(
        &self,
        query: &str,
        id: Uuid,
        user_id: Option<Uuid>,
    ) -> ArchiveResult<ServiceScope> {
        let id_str = id.to_string();
        let mut builder = self.db.query(query).bind(("id", id_str.clone()));
        if let Some(user_id) = user_id {
            builder = builder.bind(("user_id", user_id.to_string()));
        }

        let result = builder.await.map_err(|e| DbError::query(ENTITY, e))?;
        let mut result = result.check().map_err(|e| DbError::query(ENTITY, e))?;

        let rows: Vec<ServiceScopeRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: ENTITY.into(),
            id: id_str,
        })?;

        Ok(row.into_service_scope(id)?)
    }
}

impl<C: Connection> ServiceScopeRepository for SurrealServiceScopeRepository<C> {
    async fn create(&self, input: CreateServiceScope) -> ArchiveResult<ServiceScope> {
        let id = Uuid::new_v4();

        let result = self
            .db
            .query(
                "CREATE type::record('service_scope', $id) SET \
                 name = $name, code = $code, members = [], \
                 responsible = $responsible",
            )
            .bind(("id", id.to_string()))
            .bind(("name", input.name.trim().to_string()))
            .bind(("code", String::from(input.code)))
            .bind(("responsible", input.responsible.map(|r| r.to_string())))
            .await
            .map_err(|e| DbError::query(ENTITY, e))?;

        let mut result = result.check().map_err(|e| DbError::query(ENTITY, e))?;

        let rows: Vec<ServiceScopeRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: ENTITY.into(),
            id: id.to_string(),
        })?;

        Ok(row.into_service_scope(id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> ArchiveResult<ServiceScope> {
        self.single("SELECT * FROM type::record('service_scope', $id)", id, None)
            .await
    }

    async fn get_by_code(&self, code: &ServiceCode) -> ArchiveResult<ServiceScope> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM service_scope WHERE code = $code")
            .bind(("code", code.as_str().to_string()))
            .await
            .map_err(|e| DbError::query(ENTITY, e))?;

        let rows: Vec<ServiceScopeRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: ENTITY.into(),
            id: format!("code={code}"),
        })?;

        Ok(row.try_into_service_scope()?)
    }

    async fn exists(&self, code: &ServiceCode) -> ArchiveResult<bool> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM service_scope WHERE code = $code GROUP ALL")
            .bind(("code", code.as_str().to_string()))
            .await
            .map_err(|e| DbError::query(ENTITY, e))?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(CountRow::total(&rows) > 0)
    }

    async fn update(&self, id: Uuid, input: UpdateServiceScope) -> ArchiveResult<ServiceScope> {
        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.responsible.is_some() {
            sets.push("responsible = $responsible");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('service_scope', $id) SET {}",
            sets.join(", ")
        );

        let id_str = id.to_string();
        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));
        if let Some(name) = input.name {
            builder = builder.bind(("name", name.trim().to_string()));
        }
        if let Some(responsible) = input.responsible {
            builder = builder.bind(("responsible", responsible.map(|r| r.to_string())));
        }

        let result = builder.await.map_err(|e| DbError::query(ENTITY, e))?;
        let mut result = result.check().map_err(|e| DbError::query(ENTITY, e))?;

        let rows: Vec<ServiceScopeRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: ENTITY.into(),
            id: id_str,
        })?;

        Ok(row.into_service_scope(id)?)
    }

    async fn add_member(&self, id: Uuid, user_id: Uuid) -> ArchiveResult<ServiceScope> {
        self.single(
            "UPDATE type::record('service_scope', $id) SET \
             members = array::union(members, [$user_id]), \
             updated_at = time::now()",
            id,
            Some(user_id),
        )
        .await
    }

    async fn remove_member(&self, id: Uuid, user_id: Uuid) -> ArchiveResult<ServiceScope> {
        self.single(
            "UPDATE type::record('service_scope', $id) SET \
             members = array::complement(members, [$user_id]), \
             updated_at = time::now()",
            id,
            Some(user_id),
        )
        .await
    }

    async fn list(&self, pagination: Pagination) -> ArchiveResult<PaginatedResult<ServiceScope>> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM service_scope GROUP ALL; \
                 SELECT meta::id(id) AS record_id, * FROM service_scope \
                 ORDER BY code ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset()))
            .await
            .map_err(|e| DbError::query(ENTITY, e))?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<ServiceScopeRowWithId> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_service_scope())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult::new(
            items,
            pagination,
            CountRow::total(&count_rows),
        ))
    }
}
