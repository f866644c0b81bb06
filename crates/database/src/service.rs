//! Service CRUD operations.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::Service;

/// Create a new service.
pub async fn create_service(pool: &SqlitePool, service: &Service) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO services
            (id, state, twitchuser, client_id, client_secret, wallet,
             onchain, servicename, authenticated, token)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&service.id)
    .bind(&service.state)
    .bind(&service.twitchuser)
    .bind(&service.client_id)
    .bind(&service.client_secret)
    .bind(&service.wallet)
    .bind(&service.onchain)
    .bind(&service.servicename)
    .bind(service.authenticated)
    .bind(&service.token)
    .execute(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists {
                    entity: "Service",
                    id: service.id.clone(),
                };
            }
        }
        DatabaseError::Sqlx(e)
    })?;

    Ok(())
}

/// Get a service by ID.
pub async fn get_service(pool: &SqlitePool, id: &str) -> Result<Service> {
    sqlx::query_as::<_, Service>(
        r#"
        SELECT id, state, twitchuser, client_id, client_secret, wallet,
               servicename, authenticated, onchain, token
        FROM services
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Service",
        id: id.to_string(),
    })
}

/// Get a service by its public state hash.
pub async fn get_service_by_state(pool: &SqlitePool, state: &str) -> Result<Service> {
    sqlx::query_as::<_, Service>(
        r#"
        SELECT id, state, twitchuser, client_id, client_secret, wallet,
               servicename, authenticated, onchain, token
        FROM services
        WHERE state = ?
        "#,
    )
    .bind(state)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Service",
        id: state.to_string(),
    })
}

/// List all services assigned to a wallet.
pub async fn get_services_by_wallet(pool: &SqlitePool, wallet_id: &str) -> Result<Vec<Service>> {
    let services = sqlx::query_as::<_, Service>(
        r#"
        SELECT id, state, twitchuser, client_id, client_secret, wallet,
               servicename, authenticated, onchain, token
        FROM services
        WHERE wallet = ?
        "#,
    )
    .bind(wallet_id)
    .fetch_all(pool)
    .await?;

    Ok(services)
}

/// Update an existing service, replacing all mutable fields.
pub async fn update_service(pool: &SqlitePool, service: &Service) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE services
        SET state = ?, twitchuser = ?, client_id = ?, client_secret = ?,
            wallet = ?, onchain = ?, servicename = ?, authenticated = ?,
            token = ?
        WHERE id = ?
        "#,
    )
    .bind(&service.state)
    .bind(&service.twitchuser)
    .bind(&service.client_id)
    .bind(&service.client_secret)
    .bind(&service.wallet)
    .bind(&service.onchain)
    .bind(&service.servicename)
    .bind(service.authenticated)
    .bind(&service.token)
    .bind(&service.id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Service",
            id: service.id.clone(),
        });
    }

    Ok(())
}

/// Store an access token on a service, setting `authenticated`.
///
/// The write is conditional on `authenticated` still being false, so
/// the first successful authorization wins even under concurrent
/// callbacks. Returns whether this call performed the write.
pub async fn set_service_token(pool: &SqlitePool, id: &str, token: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE services
        SET authenticated = TRUE, token = ?
        WHERE id = ? AND authenticated = FALSE
        "#,
    )
    .bind(token)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a service and all its donations, returning the donation ids.
///
/// Runs in a single transaction so a partial failure rolls back rather
/// than orphaning donations. The caller is responsible for deleting
/// the external charges behind the returned ids.
pub async fn delete_service(pool: &SqlitePool, id: &str) -> Result<Vec<String>> {
    let mut tx = pool.begin().await?;

    let donation_ids: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT id FROM donations WHERE service = ?
        "#,
    )
    .bind(id)
    .fetch_all(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        DELETE FROM donations WHERE service = ?
        "#,
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let result = sqlx::query(
        r#"
        DELETE FROM services WHERE id = ?
        "#,
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Service",
            id: id.to_string(),
        });
    }

    tx.commit().await?;

    Ok(donation_ids)
}
