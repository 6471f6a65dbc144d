//! Database layer — migrations and queries.
//!
//! All state mutations in the core are single-row writes. Exchange rows
//! additionally carry a `version` counter: every state write is a
//! compare-and-swap (`... WHERE version = ?`), so concurrent confirm/cancel
//! races fail cleanly instead of silently last-write-wins.

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::info;

use trueque_protocol::Confirmation;

use crate::errors::Result;
use crate::models::{
    ExchangeRow, MessageRow, NewMessage, NotificationRow, ProductRow, RequestRow, UserRow,
};

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    // Make sure the file is created if it doesn't exist yet.
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

// ─────────────────────────────────────────────────────────
// Usuarios
// ─────────────────────────────────────────────────────────

pub async fn get_user(pool: &SqlitePool, id: i64) -> Result<Option<UserRow>> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id_usuario, nombre_completo, avatar_url, verificado
         FROM   usuarios
         WHERE  id_usuario = ?1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Revoke or restore the trust flag. Returns whether a row changed.
pub async fn set_user_verified(pool: &SqlitePool, id: i64, verified: bool) -> Result<bool> {
    let affected = sqlx::query("UPDATE usuarios SET verificado = ?2 WHERE id_usuario = ?1")
        .bind(id)
        .bind(verified)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(affected > 0)
}

/// Create a user record. Account issuance belongs to the external auth
/// service; this exists for seeding and tests.
pub async fn insert_user(
    pool: &SqlitePool,
    nombre_completo: &str,
    correo: &str,
    now: DateTime<Utc>,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO usuarios (nombre_completo, correo, verificado, fecha_registro)
         VALUES (?1, ?2, 1, ?3)",
    )
    .bind(nombre_completo)
    .bind(correo)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

// ─────────────────────────────────────────────────────────
// Productos
// ─────────────────────────────────────────────────────────

pub async fn get_product(pool: &SqlitePool, id: i64) -> Result<Option<ProductRow>> {
    let row = sqlx::query_as::<_, ProductRow>(
        "SELECT id_producto, id_usuario, titulo, valor_estimado, imagen_url, ubicacion, estado
         FROM   productos
         WHERE  id_producto = ?1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Whether `user_id` owns `product_id`. Missing products count as not owned.
pub async fn owns_product(pool: &SqlitePool, user_id: i64, product_id: i64) -> Result<bool> {
    Ok(get_product(pool, product_id)
        .await?
        .is_some_and(|p| p.id_usuario == user_id))
}

/// Create a product record. Catalog management belongs to the external
/// product registry; this exists for seeding and tests.
pub async fn insert_product(
    pool: &SqlitePool,
    owner: i64,
    titulo: &str,
    valor_estimado: &str,
    now: DateTime<Utc>,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO productos (id_usuario, titulo, valor_estimado, estado, fecha_publicacion)
         VALUES (?1, ?2, ?3, 'disponible', ?4)",
    )
    .bind(owner)
    .bind(titulo)
    .bind(valor_estimado)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

// ─────────────────────────────────────────────────────────
// Solicitudes
// ─────────────────────────────────────────────────────────

const REQUEST_COLUMNS: &str = "id_solicitud, id_solicitante, id_producto_objetivo, \
                               id_producto_ofrece, mensaje, diferencia_propuesta, estado, creado";

pub async fn get_request(pool: &SqlitePool, id: i64) -> Result<Option<RequestRow>> {
    let sql = format!("SELECT {REQUEST_COLUMNS} FROM solicitudes WHERE id_solicitud = ?1");
    let row = sqlx::query_as::<_, RequestRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn insert_request(
    pool: &SqlitePool,
    requester: i64,
    target_product: i64,
    offered_product: Option<i64>,
    mensaje: &str,
    diferencia_propuesta: Option<&str>,
    now: DateTime<Utc>,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO solicitudes
             (id_solicitante, id_producto_objetivo, id_producto_ofrece,
              mensaje, diferencia_propuesta, estado, creado)
         VALUES (?1, ?2, ?3, ?4, ?5, 'pendiente', ?6)",
    )
    .bind(requester)
    .bind(target_product)
    .bind(offered_product)
    .bind(mensaje)
    .bind(diferencia_propuesta)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Pending requests whose target product belongs to `owner`, newest first.
pub async fn list_received_requests(pool: &SqlitePool, owner: i64) -> Result<Vec<RequestRow>> {
    let rows = sqlx::query_as::<_, RequestRow>(
        "SELECT s.id_solicitud, s.id_solicitante, s.id_producto_objetivo,
                s.id_producto_ofrece, s.mensaje, s.diferencia_propuesta, s.estado, s.creado
         FROM   solicitudes s
         JOIN   productos p ON p.id_producto = s.id_producto_objetivo
         WHERE  p.id_usuario = ?1
           AND  s.estado = 'pendiente'
         ORDER  BY s.creado DESC",
    )
        .bind(owner)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Every request authored by `requester`, any state, newest first.
pub async fn list_sent_requests(pool: &SqlitePool, requester: i64) -> Result<Vec<RequestRow>> {
    let sql = format!(
        "SELECT {REQUEST_COLUMNS}
         FROM   solicitudes
         WHERE  id_solicitante = ?1
         ORDER  BY creado DESC"
    );
    let rows = sqlx::query_as::<_, RequestRow>(&sql)
        .bind(requester)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn update_request_status(pool: &SqlitePool, id: i64, estado: &str) -> Result<()> {
    sqlx::query("UPDATE solicitudes SET estado = ?2 WHERE id_solicitud = ?1")
        .bind(id)
        .bind(estado)
        .execute(pool)
        .await?;
    Ok(())
}

/// Rewrite a request in place as a fresh pending proposal.
pub async fn reoffer_request(
    pool: &SqlitePool,
    id: i64,
    offered_product: Option<i64>,
    diferencia_propuesta: Option<&str>,
    mensaje: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "UPDATE solicitudes
         SET    id_producto_ofrece = ?2,
                diferencia_propuesta = ?3,
                mensaje = ?4,
                estado = 'pendiente',
                creado = ?5
         WHERE  id_solicitud = ?1",
    )
    .bind(id)
    .bind(offered_product)
    .bind(diferencia_propuesta)
    .bind(mensaje)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Intercambios
// ─────────────────────────────────────────────────────────

const EXCHANGE_COLUMNS: &str = "id_intercambio, id_solicitud, id_producto_ofrecido, \
                                id_producto_solicitado, id_usuario_ofrece, id_usuario_recibe, \
                                diferencia_monetaria, estado, estado_solicitante, \
                                estado_receptor, fecha_solicitud, fecha_actualizacion, \
                                fecha_limite_confirmacion, version";

pub async fn get_exchange(pool: &SqlitePool, id: i64) -> Result<Option<ExchangeRow>> {
    let sql = format!("SELECT {EXCHANGE_COLUMNS} FROM intercambios WHERE id_intercambio = ?1");
    let row = sqlx::query_as::<_, ExchangeRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn exchange_for_request(
    pool: &SqlitePool,
    request_id: i64,
) -> Result<Option<ExchangeRow>> {
    let sql = format!("SELECT {EXCHANGE_COLUMNS} FROM intercambios WHERE id_solicitud = ?1");
    let row = sqlx::query_as::<_, ExchangeRow>(&sql)
        .bind(request_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Create the exchange for an accepted request. The unique index on
/// `id_solicitud` plus INSERT OR IGNORE make duplicate accepts a no-op;
/// returns whether a row was actually created.
pub async fn insert_exchange(
    pool: &SqlitePool,
    request_id: i64,
    offered_product: Option<i64>,
    target_product: i64,
    offering_user: i64,
    receiving_user: i64,
    diferencia_monetaria: &str,
    requested_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<bool> {
    let affected = sqlx::query(
        "INSERT OR IGNORE INTO intercambios
             (id_solicitud, id_producto_ofrecido, id_producto_solicitado,
              id_usuario_ofrece, id_usuario_recibe, diferencia_monetaria,
              estado, estado_solicitante, estado_receptor,
              fecha_solicitud, fecha_actualizacion, version)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pendiente', 'pendiente', 'pendiente', ?7, ?8, 0)",
    )
    .bind(request_id)
    .bind(offered_product)
    .bind(target_product)
    .bind(offering_user)
    .bind(receiving_user)
    .bind(diferencia_monetaria)
    .bind(requested_at)
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(affected > 0)
}

/// Caller's exchanges still waiting on confirmations, newest activity first.
pub async fn list_pending_exchanges(pool: &SqlitePool, user: i64) -> Result<Vec<ExchangeRow>> {
    let sql = format!(
        "SELECT {EXCHANGE_COLUMNS}
         FROM   intercambios
         WHERE  estado = 'pendiente'
           AND  (id_usuario_ofrece = ?1 OR id_usuario_recibe = ?1)
         ORDER  BY fecha_actualizacion DESC"
    );
    let rows = sqlx::query_as::<_, ExchangeRow>(&sql)
        .bind(user)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Caller's completed exchanges, newest activity first.
pub async fn list_accepted_exchanges(pool: &SqlitePool, user: i64) -> Result<Vec<ExchangeRow>> {
    let sql = format!(
        "SELECT {EXCHANGE_COLUMNS}
         FROM   intercambios
         WHERE  estado = 'aceptado'
           AND  (id_usuario_ofrece = ?1 OR id_usuario_recibe = ?1)
         ORDER  BY fecha_actualizacion DESC"
    );
    let rows = sqlx::query_as::<_, ExchangeRow>(&sql)
        .bind(user)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Exchanges whose confirmation deadline has already passed, for the
/// background sweeper.
pub async fn list_overdue_exchanges(
    pool: &SqlitePool,
    now: DateTime<Utc>,
) -> Result<Vec<ExchangeRow>> {
    let sql = format!(
        "SELECT {EXCHANGE_COLUMNS}
         FROM   intercambios
         WHERE  estado = 'pendiente'
           AND  fecha_limite_confirmacion IS NOT NULL
           AND  fecha_limite_confirmacion < ?1"
    );
    let rows = sqlx::query_as::<_, ExchangeRow>(&sql)
        .bind(now)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Compare-and-swap write of an exchange's confirmation state.
///
/// Returns `false` when `expected_version` lost the race (no write
/// happened); callers decide whether that is a conflict or a benign
/// already-handled case.
pub async fn update_exchange_state(
    pool: &SqlitePool,
    id: i64,
    confirmation: &Confirmation,
    now: DateTime<Utc>,
    expected_version: i64,
) -> Result<bool> {
    let affected = sqlx::query(
        "UPDATE intercambios
         SET    estado = ?2,
                estado_solicitante = ?3,
                estado_receptor = ?4,
                fecha_limite_confirmacion = ?5,
                fecha_actualizacion = ?6,
                version = version + 1
         WHERE  id_intercambio = ?1
           AND  version = ?7",
    )
    .bind(id)
    .bind(confirmation.aggregate().as_str())
    .bind(confirmation.offering.as_str())
    .bind(confirmation.receiving.as_str())
    .bind(confirmation.deadline)
    .bind(now)
    .bind(expected_version)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(affected > 0)
}

// ─────────────────────────────────────────────────────────
// Mensajes
// ─────────────────────────────────────────────────────────

pub async fn insert_message(
    pool: &SqlitePool,
    exchange_id: i64,
    author: i64,
    message: &NewMessage,
    now: DateTime<Utc>,
) -> Result<MessageRow> {
    let result = sqlx::query(
        "INSERT INTO intercambio_mensajes
             (id_intercambio, id_usuario, tipo, contenido, lat, lng, creado)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(exchange_id)
    .bind(author)
    .bind(message.tipo.as_str())
    .bind(message.contenido.as_deref())
    .bind(message.lat)
    .bind(message.lng)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(MessageRow {
        id_mensaje: result.last_insert_rowid(),
        id_intercambio: exchange_id,
        id_usuario: author,
        tipo: message.tipo.as_str().to_string(),
        contenido: message.contenido.clone(),
        lat: message.lat,
        lng: message.lng,
        creado: now,
    })
}

/// All messages of one exchange, oldest first.
pub async fn list_messages(pool: &SqlitePool, exchange_id: i64) -> Result<Vec<MessageRow>> {
    let rows = sqlx::query_as::<_, MessageRow>(
        "SELECT id_mensaje, id_intercambio, id_usuario, tipo, contenido, lat, lng, creado
         FROM   intercambio_mensajes
         WHERE  id_intercambio = ?1
         ORDER  BY creado ASC, id_mensaje ASC",
    )
    .bind(exchange_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

// ─────────────────────────────────────────────────────────
// Notificaciones
// ─────────────────────────────────────────────────────────

pub async fn insert_notification(
    pool: &SqlitePool,
    user: i64,
    exchange_id: Option<i64>,
    mensaje: &str,
    now: DateTime<Utc>,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO notificaciones (id_usuario, id_intercambio, mensaje, leido, fecha_envio)
         VALUES (?1, ?2, ?3, 0, ?4)",
    )
    .bind(user)
    .bind(exchange_id)
    .bind(mensaje)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn list_notifications(pool: &SqlitePool, user: i64) -> Result<Vec<NotificationRow>> {
    let rows = sqlx::query_as::<_, NotificationRow>(
        "SELECT id_notificacion, id_usuario, id_intercambio, mensaje, leido, fecha_envio
         FROM   notificaciones
         WHERE  id_usuario = ?1
         ORDER  BY fecha_envio DESC
         LIMIT  50",
    )
    .bind(user)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Mark one of `user`'s notifications read. Returns whether a row changed.
pub async fn mark_notification_read(pool: &SqlitePool, id: i64, user: i64) -> Result<bool> {
    let affected = sqlx::query(
        "UPDATE notificaciones SET leido = 1 WHERE id_notificacion = ?1 AND id_usuario = ?2",
    )
    .bind(id)
    .bind(user)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(affected > 0)
}
