use crate::server::controller::error::ApiError;
use crate::server::controller::DB_TIMEOUT_SECONDS;
use crate::server::domain::{status, totals};
use crate::server::model::extras::{CatalogItem, ExtraList, ExtraOption};
use crate::server::model::order::{
    GetOrderResponse, GetOrdersResponse, LineItem, Order, OrderStatus, OrderSummary,
    PatchOrderStatusRequest, PatchOrderStatusResponse, PostOrderRequest, PostOrderResponse,
    RawPrice, StatusHistoryEntry,
};
use crate::server::model::CommonRequestParams;
use crate::server::state::AppState;
use crate::server::util::time;
use actix_web::rt::time as actix_time;
use actix_web::{get, patch, post, web, HttpRequest, Responder};
use anyhow::Context;
use log::{error, info, warn};
use std::collections::HashMap;
use std::ops::DerefMut;
use std::str::FromStr;
use std::time::Duration;
use tokio_postgres::types::ToSql;

const INPUT_ERROR_CODE: &str = "ORD_INP_99";

fn parse_status_or_pending(raw: &str) -> OrderStatus {
    OrderStatus::from_str(raw).unwrap_or_else(|e| {
        warn!("unknown stored status, defaulting to pending, {}", e);
        OrderStatus::Pending
    })
}

#[post("/v1/orders")]
/// place an order; money fields are computed server-side
pub(crate) async fn post_order(
    body: web::Json<PostOrderRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, ApiError> {
    let req = body.into_inner();

    let (extra_lists, catalog) = {
        let Some(conn) = data.get_db_read_pool().acquire().await else {
            return Err(ApiError::ServerIsBusy);
        };

        let dish_ids = req
            .items
            .iter()
            .map(|item| item.dish_id.clone())
            .collect::<Vec<_>>();
        let extra_ids = req
            .items
            .iter()
            .flat_map(|item| item.selected_extras.keys().cloned())
            .collect::<Vec<_>>();

        let catalog = match conn
            .query(
                "SELECT id, name, price FROM item WHERE id = ANY($1)",
                &[&dish_ids as &(dyn ToSql + Sync)],
            )
            .await
        {
            Ok(rows) => rows
                .into_iter()
                .map(|r| {
                    let price: Option<f64> = r.get("price");
                    let entry = CatalogItem {
                        id: r.get("id"),
                        name: r.get("name"),
                        price: price.map(RawPrice::Number).unwrap_or_default(),
                    };
                    (entry.id.clone(), entry)
                })
                .collect::<HashMap<_, _>>(),
            Err(e) => {
                error!("catalog lookup failed, {}", e);
                return Err(ApiError::DbError);
            }
        };

        let extra_lists = match conn
            .query(
                "SELECT id, name, options FROM extra_list WHERE id = ANY($1)",
                &[&extra_ids as &(dyn ToSql + Sync)],
            )
            .await
        {
            Ok(rows) => rows
                .into_iter()
                .map(|r| {
                    let raw: serde_json::Value = r.get("options");
                    let options = serde_json::from_value::<Vec<ExtraOption>>(raw)
                        .unwrap_or_else(|e| {
                            warn!("unreadable options for an extra list, {}", e);
                            vec![]
                        });
                    let list = ExtraList {
                        id: r.get("id"),
                        name: r.get("name"),
                        options,
                    };
                    (list.id.clone(), list)
                })
                .collect::<HashMap<_, _>>(),
            Err(e) => {
                error!("extra list lookup failed, {}", e);
                return Err(ApiError::DbError);
            }
        };

        (extra_lists, catalog)
    };

    // fee: explicit value wins, then the delivery zone, then the default
    let delivery_fee = match (req.delivery_fee, &req.delivery_address) {
        (Some(fee), _) => Some(fee),
        (None, Some(addr)) => {
            let Some(conn) = data.get_db_read_pool().acquire().await else {
                return Err(ApiError::ServerIsBusy);
            };
            match conn
                .query_opt(
                    "SELECT delivery_fee FROM quartier WHERE name = $1",
                    &[&addr.quartier],
                )
                .await
            {
                Ok(row) => row.map(|r| r.get::<_, f64>("delivery_fee")),
                Err(e) => {
                    error!("quartier lookup failed, {}", e);
                    return Err(ApiError::DbError);
                }
            }
        }
        (None, None) => None,
    };

    let computed = totals::compute_totals(
        &req.items,
        &extra_lists,
        &catalog,
        delivery_fee,
        req.points_reduction,
    );

    let items_json = serde_json::to_value(&req.items).map_err(|e| {
        error!("failed to encode line items, {}", e);
        ApiError::DbError
    })?;
    let address_json = match &req.delivery_address {
        Some(addr) => Some(serde_json::to_value(addr).map_err(|e| {
            error!("failed to encode delivery address, {}", e);
            ApiError::DbError
        })?),
        None => None,
    };

    let Some(conn) = data.get_db_write_pool().acquire().await else {
        return Err(ApiError::ServerIsBusy);
    };
    let params: &[&(dyn ToSql + Sync); 12] = &[
        &req.user_id,
        &items_json,
        &address_json,
        &req.payment_method,
        &computed.subtotal,
        &computed.delivery_fee,
        &req.points_used.unwrap_or(0.0),
        &computed.points_reduction,
        &computed.total,
        &OrderStatus::Pending.as_str(),
        &false,
        &time::helper::get_utc_now(),
    ];
    match conn
        .query_one(
            r#"
            INSERT INTO orders(
                user_id, items, delivery_address, payment_method,
                subtotal, delivery_fee, points_used, points_reduction, total,
                status, is_paid, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id;
        "#,
            params,
        )
        .await
    {
        Ok(row) => Ok(web::Json(PostOrderResponse {
            id: row.get("id"),
            subtotal: computed.subtotal,
            delivery_fee: computed.delivery_fee,
            points_reduction: computed.points_reduction,
            total: computed.total,
            status: OrderStatus::Pending,
        })),
        Err(e) => {
            error!("post_order failed, {}", e);
            Err(ApiError::DbError)
        }
    }
}

#[get("/v1/order/{id}")]
/// get one order with its status history
pub(crate) async fn get_order(
    id: web::Path<i64>,
    data: web::Data<AppState>,
) -> Result<impl Responder, ApiError> {
    let Some(conn) = data.get_db_read_pool().acquire().await else {
        return Err(ApiError::ServerIsBusy);
    };
    let id = id.into_inner();
    let row = match conn
        .query_opt(
            r#"
            SELECT user_id, items, delivery_address, payment_method,
                   subtotal, delivery_fee, points_used, points_reduction, total,
                   status, is_paid, created_at
            FROM orders
            WHERE id = $1;
        "#,
            &[&id],
        )
        .await
    {
        Ok(Some(row)) => row,
        Ok(None) => return Ok(web::Json(GetOrderResponse { order: None })),
        Err(e) => {
            error!("get_order failed, {}", e);
            return Err(ApiError::DbError);
        }
    };

    let history = match conn
        .query(
            r#"
            SELECT status, reason, created_at
            FROM status_history
            WHERE order_id = $1
            ORDER BY id;
        "#,
            &[&id],
        )
        .await
    {
        Ok(rows) => rows
            .into_iter()
            .map(|r| StatusHistoryEntry {
                status: parse_status_or_pending(r.get("status")),
                reason: r.get("reason"),
                created_at: r.get("created_at"),
            })
            .collect::<Vec<_>>(),
        Err(e) => {
            error!("status history lookup failed, {}", e);
            return Err(ApiError::DbError);
        }
    };

    let items_raw: serde_json::Value = row.get("items");
    let items = serde_json::from_value::<Vec<LineItem>>(items_raw).unwrap_or_else(|e| {
        warn!("unreadable line items for order {}, {}", id, e);
        vec![]
    });
    let address_raw: Option<serde_json::Value> = row.get("delivery_address");
    let delivery_address = address_raw.and_then(|raw| match serde_json::from_value(raw) {
        Ok(addr) => Some(addr),
        Err(e) => {
            warn!("unreadable delivery address for order {}, {}", id, e);
            None
        }
    });

    Ok(web::Json(GetOrderResponse {
        order: Some(Order {
            id,
            user_id: row.get("user_id"),
            items,
            delivery_address,
            payment_method: row.get("payment_method"),
            subtotal: row.get("subtotal"),
            delivery_fee: row.get("delivery_fee"),
            points_used: row.get("points_used"),
            points_reduction: row.get("points_reduction"),
            total: row.get("total"),
            status: parse_status_or_pending(row.get("status")),
            is_paid: row.get("is_paid"),
            created_at: row.get("created_at"),
            history,
        }),
    }))
}

#[get("/v1/orders")]
/// paged order listing for the admin board
pub(crate) async fn get_orders(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<impl Responder, ApiError> {
    let maybe_queries = web::Query::<CommonRequestParams>::from_query(req.query_string())
        .context("failed to parse query string");
    if maybe_queries.is_err() {
        return Err(ApiError::Validation {
            code: INPUT_ERROR_CODE,
            message: "invalid paging parameters".to_string(),
        });
    }
    let CommonRequestParams {
        page: maybe_page,
        page_size: maybe_page_size,
    } = maybe_queries.unwrap().into_inner();
    let (page, page_size) = (maybe_page.unwrap_or(0), maybe_page_size.unwrap_or(20));
    let offset = i64::from(page) * i64::from(page_size);
    let limit = i64::from(page_size);

    let Some(conn) = data.get_db_read_pool().acquire().await else {
        return Err(ApiError::ServerIsBusy);
    };
    let sleep = actix_time::sleep(Duration::from_secs(DB_TIMEOUT_SECONDS));
    tokio::pin!(sleep);
    let params: [&(dyn tokio_postgres::types::ToSql + Sync); 2] = [&offset, &limit];
    tokio::select! {
        result = conn.query(r##"
            SELECT id, user_id, total, status, is_paid, created_at
            FROM orders
            ORDER BY id DESC
            OFFSET $1
            LIMIT $2;
        "##, &params) => {
            match result {
                Ok(rows) => {
                    let orders = rows
                        .into_iter()
                        .map(|r| OrderSummary {
                            id: r.get("id"),
                            user_id: r.get("user_id"),
                            total: r.get("total"),
                            status: parse_status_or_pending(r.get("status")),
                            is_paid: r.get("is_paid"),
                            created_at: r.get("created_at"),
                        })
                        .collect::<Vec<_>>();
                    Ok(web::Json(GetOrdersResponse { orders }))
                }
                Err(e) => {
                    error!("get_orders failed, {}", e);
                    Err(ApiError::DbError)
                }
            }
        },
        _ = &mut sleep => {
            warn!("timeout listing orders");
            Err(ApiError::Timeout)
        }
    }
}

#[patch("/v1/order/{id}/status")]
/// apply a manual workflow transition from the admin board
pub(crate) async fn patch_order_status(
    id: web::Path<i64>,
    body: web::Json<PatchOrderStatusRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, ApiError> {
    let order_id = id.into_inner();
    let req = body.into_inner();

    let Some(mut conn) = data.get_db_write_pool().acquire().await else {
        return Err(ApiError::ServerIsBusy);
    };
    let txn = match conn.deref_mut().transaction().await {
        Ok(txn) => txn,
        Err(e) => {
            error!("failed to open a transaction, {}", e);
            return Err(ApiError::DbError);
        }
    };

    let row = match txn
        .query_opt(
            "SELECT user_id, status, total FROM orders WHERE id = $1 FOR UPDATE",
            &[&order_id],
        )
        .await
    {
        Ok(Some(row)) => row,
        Ok(None) => return Err(ApiError::ResourceNotFound),
        Err(e) => {
            error!("order lookup failed, {}", e);
            return Err(ApiError::DbError);
        }
    };
    let user_id: String = row.get("user_id");
    let current = parse_status_or_pending(row.get("status"));
    let total: f64 = row.get("total");

    let transition = status::apply_transition(
        order_id,
        user_id.as_str(),
        current,
        total,
        req.status,
        req.reason,
        time::helper::get_utc_now(),
    )
    .map_err(|e| ApiError::Validation {
        code: INPUT_ERROR_CODE,
        message: e.to_string(),
    })?;

    let result = persist_transition(&txn, order_id, &transition, req.is_paid).await;
    if let Err(e) = result {
        error!("patch_order_status failed, {}", e);
        return Err(ApiError::DbError);
    }
    if let Err(e) = txn.commit().await {
        error!("failed to commit status transition, {}", e);
        return Err(ApiError::DbError);
    }

    if let Some(event) = &transition.purchase_completed {
        info!(
            target: "analytics",
            "purchase_completed order_id={} total={}",
            event.order_id, event.total
        );
    }

    Ok(web::Json(PatchOrderStatusResponse {
        status: transition.entry.status,
        entry: transition.entry,
    }))
}

/// One transaction covers the denormalized status, the history entry and
/// the owner notification, so a crash cannot leave them out of step.
async fn persist_transition(
    txn: &tokio_postgres::Transaction<'_>,
    order_id: i64,
    transition: &status::Transition,
    is_paid: Option<bool>,
) -> Result<(), tokio_postgres::Error> {
    txn.execute(
        "UPDATE orders SET status = $2, is_paid = COALESCE($3, is_paid) WHERE id = $1",
        &[&order_id, &transition.entry.status.as_str(), &is_paid],
    )
    .await?;
    txn.execute(
        r#"
        INSERT INTO status_history(order_id, status, reason, created_at)
        VALUES ($1, $2, $3, $4);
    "#,
        &[
            &order_id,
            &transition.entry.status.as_str(),
            &transition.entry.reason,
            &transition.entry.created_at,
        ],
    )
    .await?;
    let n = &transition.notification;
    txn.execute(
        r#"
        INSERT INTO notification(user_id, order_id, old_status, new_status, reason, read, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7);
    "#,
        &[
            &n.user_id,
            &order_id,
            &n.old_status.as_str(),
            &n.new_status.as_str(),
            &n.reason,
            &n.read,
            &transition.entry.created_at,
        ],
    )
    .await?;
    Ok(())
}
