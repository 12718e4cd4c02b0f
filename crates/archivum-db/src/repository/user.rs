//! SurrealDB implementation of [`UserRepository`].

use archivum_core::error::ArchiveResult;
use archivum_core::models::identity::{Role, ServiceCode};
use archivum_core::models::user::{CreateUser, UpdateUser, User};
use archivum_core::repository::{PaginatedResult, Pagination, UserRepository};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_uuid};
use crate::error::DbError;

const ENTITY: &str = "user";

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct UserRow {
    username: String,
    email: String,
    full_name: String,
    role: String,
    service: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct UserRowWithId {
    record_id: String,
    username: String,
    email: String,
    full_name: String,
    role: String,
    service: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self, id: Uuid) -> Result<User, DbError> {
        let role: Role = self
            .role
            .parse()
            .map_err(|_| DbError::decode(ENTITY, format!("unknown role: {}", self.role)))?;
        let service =
            ServiceCode::new(self.service).map_err(|e| DbError::decode(ENTITY, e.to_string()))?;
        Ok(User {
            id,
            username: self.username,
            email: self.email,
            full_name: self.full_name,
            role,
            service,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl UserRowWithId {
    fn try_into_user(self) -> Result<User, DbError> {
        let id = parse_uuid(ENTITY, &self.record_id)?;
        UserRow {
            username: self.username,
            email: self.email,
            full_name: self.full_name,
            role: self.role,
            service: self.service,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_user(id)
    }
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> ArchiveResult<User> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('user', $id) SET \
                 username = $username, email = $email, \
                 full_name = $full_name, role = $role, \
                 service = $service, is_active = true",
            )
            .bind(("id", id_str.clone()))
            .bind(("username", input.username.trim().to_string()))
            .bind(("email", input.email.trim().to_string()))
            .bind(("full_name", input.full_name))
            .bind(("role", input.role.as_str().to_string()))
            .bind(("service", String::from(input.service)))
            .await
            .map_err(|e| DbError::query(ENTITY, e))?;

        let mut result = result.check().map_err(|e| DbError::query(ENTITY, e))?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: ENTITY.into(),
            id: id_str,
        })?;

        Ok(row.into_user(id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> ArchiveResult<User> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('user', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(|e| DbError::query(ENTITY, e))?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: ENTITY.into(),
            id: id_str,
        })?;

        Ok(row.into_user(id)?)
    }

    async fn get_by_username(&self, username: &str) -> ArchiveResult<User> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM user WHERE username = $username")
            .bind(("username", username.to_string()))
            .await
            .map_err(|e| DbError::query(ENTITY, e))?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: ENTITY.into(),
            id: format!("username={username}"),
        })?;

        Ok(row.try_into_user()?)
    }

    async fn update(&self, id: Uuid, input: UpdateUser) -> ArchiveResult<User> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.email.is_some() {
            sets.push("email = $email");
        }
        if input.full_name.is_some() {
            sets.push("full_name = $full_name");
        }
        if input.role.is_some() {
            sets.push("role = $role");
        }
        if input.service.is_some() {
            sets.push("service = $service");
        }
        if input.is_active.is_some() {
            sets.push("is_active = $is_active");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('user', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(email) = input.email {
            builder = builder.bind(("email", email));
        }
        if let Some(full_name) = input.full_name {
            builder = builder.bind(("full_name", full_name));
        }
        if let Some(role) = input.role {
            builder = builder.bind(("role", role.as_str().to_string()));
        }
        if let Some(service) = input.service {
            builder = builder.bind(("service", String::from(service)));
        }
        if let Some(is_active) = input.is_active {
            builder = builder.bind(("is_active", is_active));
        }

        let result = builder.await.map_err(|e| DbError::query(ENTITY, e))?;
        let mut result = result.check().map_err(|e| DbError::query(ENTITY, e))?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: ENTITY.into(),
            id: id_str,
        })?;

        Ok(row.into_user(id)?)
    }

    async fn deactivate(&self, id: Uuid) -> ArchiveResult<()> {
        self.update(
            id,
            UpdateUser {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .map(|_| ())
    }

    async fn list_by_service(
        &self,
        service: &ServiceCode,
        pagination: Pagination,
    ) -> ArchiveResult<PaginatedResult<User>> {
        let service_str = service.as_str().to_string();

        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM user \
                 WHERE service = $service GROUP ALL; \
                 SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE service = $service \
                 ORDER BY username ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("service", service_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset()))
            .await
            .map_err(|e| DbError::query(ENTITY, e))?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<UserRowWithId> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_user())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult::new(
            items,
            pagination,
            CountRow::total(&count_rows),
        ))
    }
}
