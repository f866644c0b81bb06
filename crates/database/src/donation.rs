//! Donation CRUD operations.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::Donation;

/// Create a new donation.
pub async fn create_donation(pool: &SqlitePool, donation: &Donation) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO donations
            (id, wallet, name, message, cur_code, sats, amount, service, posted)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&donation.id)
    .bind(&donation.wallet)
    .bind(&donation.name)
    .bind(&donation.message)
    .bind(&donation.cur_code)
    .bind(donation.sats)
    .bind(donation.amount)
    .bind(&donation.service)
    .bind(donation.posted)
    .execute(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists {
                    entity: "Donation",
                    id: donation.id.clone(),
                };
            }
        }
        DatabaseError::Sqlx(e)
    })?;

    Ok(())
}

/// Get a donation by ID (the external charge id).
pub async fn get_donation(pool: &SqlitePool, id: &str) -> Result<Donation> {
    sqlx::query_as::<_, Donation>(
        r#"
        SELECT id, wallet, name, message, cur_code, sats, amount, service, posted
        FROM donations
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Donation",
        id: id.to_string(),
    })
}

/// List all donations assigned to a wallet.
pub async fn get_donations_by_wallet(pool: &SqlitePool, wallet_id: &str) -> Result<Vec<Donation>> {
    let donations = sqlx::query_as::<_, Donation>(
        r#"
        SELECT id, wallet, name, message, cur_code, sats, amount, service, posted
        FROM donations
        WHERE wallet = ?
        "#,
    )
    .bind(wallet_id)
    .fetch_all(pool)
    .await?;

    Ok(donations)
}

/// Update an existing donation, replacing all mutable fields.
pub async fn update_donation(pool: &SqlitePool, donation: &Donation) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE donations
        SET wallet = ?, name = ?, message = ?, cur_code = ?, sats = ?,
            amount = ?, service = ?, posted = ?
        WHERE id = ?
        "#,
    )
    .bind(&donation.wallet)
    .bind(&donation.name)
    .bind(&donation.message)
    .bind(&donation.cur_code)
    .bind(donation.sats)
    .bind(donation.amount)
    .bind(&donation.service)
    .bind(donation.posted)
    .bind(&donation.id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Donation",
            id: donation.id.clone(),
        });
    }

    Ok(())
}

/// Mark a donation as posted to its provider.
///
/// The write is conditional on `posted` still being false, so two
/// concurrent webhook deliveries cannot both win. Returns whether this
/// call flipped the flag.
pub async fn mark_donation_posted(pool: &SqlitePool, id: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE donations
        SET posted = TRUE
        WHERE id = ? AND posted = FALSE
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a donation by ID.
pub async fn delete_donation(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM donations
        WHERE id = ?
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Donation",
            id: id.to_string(),
        });
    }

    Ok(())
}
