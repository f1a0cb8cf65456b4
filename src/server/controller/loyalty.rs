use crate::server::controller::error::ApiError;
use crate::server::domain::loyalty::{self, CreditPlan};
use crate::server::model::loyalty::{
    CreditPointsResponse, PointsTransaction, TransactionStatus, GRANT_KIND,
};
use crate::server::state::AppState;
use crate::server::util::time;
use actix_web::{post, web, Responder};
use log::{error, info, warn};
use std::ops::DerefMut;
use std::str::FromStr;

const LOYALTY_ERROR_CODE: &str = "LOYALTY_INP_99";

#[post("/v1/order/{id}/points/credit")]
/// approve the order's points grant and credit the owner's balance;
/// re-invocation for an already-credited order is a no-op
pub(crate) async fn post_credit_points(
    id: web::Path<i64>,
    data: web::Data<AppState>,
) -> Result<impl Responder, ApiError> {
    let order_id = id.into_inner();

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
            "SELECT user_id, total, delivery_fee, created_at FROM orders WHERE id = $1 FOR UPDATE",
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
    let total: f64 = row.get("total");
    let delivery_fee: f64 = row.get("delivery_fee");
    let created_at = row.get("created_at");

    if !loyalty::is_eligible(total, created_at) {
        return Err(ApiError::Validation {
            code: LOYALTY_ERROR_CODE,
            message: "order is not eligible for points".to_string(),
        });
    }

    // every grant row for the order, locked for the duration of the credit
    let existing = match txn
        .query(
            r#"
            SELECT id, order_id, user_id, points_amount, status, created_at
            FROM points_transaction
            WHERE order_id = $1 AND kind = $2
            FOR UPDATE;
        "#,
            &[&order_id, &GRANT_KIND],
        )
        .await
    {
        Ok(rows) => rows
            .into_iter()
            .filter_map(|r| {
                let raw: String = r.get("status");
                match TransactionStatus::from_str(raw.as_str()) {
                    Ok(status) => Some(PointsTransaction {
                        id: r.get("id"),
                        order_id: r.get("order_id"),
                        user_id: r.get("user_id"),
                        points_amount: r.get("points_amount"),
                        status,
                        created_at: r.get("created_at"),
                    }),
                    Err(e) => {
                        warn!("skipping grant row with unknown status, {}", e);
                        None
                    }
                }
            })
            .collect::<Vec<_>>(),
        Err(e) => {
            error!("grant lookup failed, {}", e);
            return Err(ApiError::DbError);
        }
    };

    let first_qualifying = loyalty::is_first_qualifying(&existing);
    let points = loyalty::compute_points(total, delivery_fee, first_qualifying);

    let plan = loyalty::plan_credit(&existing);
    if plan == CreditPlan::AlreadyCredited {
        if let Err(e) = txn.commit().await {
            error!("failed to commit no-op credit, {}", e);
            return Err(ApiError::DbError);
        }
        return Ok(web::Json(CreditPointsResponse {
            credited: 0,
            already_credited: true,
        }));
    }

    let write = match plan {
        CreditPlan::ApprovePending { transaction_id } => {
            txn.execute(
                "UPDATE points_transaction SET status = 'approved', points_amount = $2 WHERE id = $1",
                &[&transaction_id, &points],
            )
            .await
        }
        CreditPlan::CreateApproved => {
            txn.execute(
                r#"
                INSERT INTO points_transaction(order_id, user_id, points_amount, kind, status, created_at)
                VALUES ($1, $2, $3, $4, 'approved', $5);
            "#,
                &[
                    &order_id,
                    &user_id,
                    &points,
                    &GRANT_KIND,
                    &time::helper::get_utc_now(),
                ],
            )
            .await
        }
        CreditPlan::AlreadyCredited => unreachable!("handled above"),
    };
    if let Err(e) = write {
        error!("grant write failed, {}", e);
        return Err(ApiError::DbError);
    }

    if let Err(e) = txn
        .execute(
            "UPDATE restaurant_user SET points = points + $1 WHERE id = $2",
            &[&points, &user_id],
        )
        .await
    {
        error!("balance increment failed, {}", e);
        return Err(ApiError::DbError);
    }
    if let Err(e) = txn.commit().await {
        error!("failed to commit points credit, {}", e);
        return Err(ApiError::DbError);
    }

    info!(
        "credited {} points to user={} for order={} (first_qualifying={})",
        points, user_id, order_id, first_qualifying
    );
    Ok(web::Json(CreditPointsResponse {
        credited: points,
        already_credited: false,
    }))
}
