//! Exchange chat — an append-only log gated by participancy.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::errors::{ApiError, Result};
use crate::events::RoomEvent;
use crate::models::{MessageRow, NewMessage};
use crate::realtime::Rooms;
use crate::db;

async fn participant_exchange(
    pool: &SqlitePool,
    exchange_id: i64,
    user_id: i64,
) -> Result<crate::models::ExchangeRow> {
    let exchange = db::get_exchange(pool, exchange_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Intercambio no existe".to_string()))?;

    if !exchange.is_participant(user_id) {
        return Err(ApiError::Forbidden(
            "No participas en este intercambio".to_string(),
        ));
    }
    Ok(exchange)
}

/// Append one message and fan it out to the exchange's room.
pub async fn append(
    pool: &SqlitePool,
    rooms: &Rooms,
    exchange_id: i64,
    author: i64,
    message: NewMessage,
    now: DateTime<Utc>,
) -> Result<MessageRow> {
    participant_exchange(pool, exchange_id, author).await?;

    let message = message.validated()?;
    let saved = db::insert_message(pool, exchange_id, author, &message, now).await?;

    rooms.publish(exchange_id, RoomEvent::MessageReceived(saved.clone()));
    Ok(saved)
}

/// All messages of an exchange, oldest first.
pub async fn list(pool: &SqlitePool, exchange_id: i64, actor: i64) -> Result<Vec<MessageRow>> {
    participant_exchange(pool, exchange_id, actor).await?;
    db::list_messages(pool, exchange_id).await
}
