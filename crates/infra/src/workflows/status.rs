//! Status changes: operator cancel/fail, executor assignment and the
//! marketplace status callback.

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use terminal_auth::{Permission, StaffProfile, authorize};
use terminal_core::OrderId;
use terminal_orders::{AssignExecutor, ChangeStatus, OrderCommand, OrderStatus};

use super::{AppServices, WorkflowError, WorkflowResult, can_access_order};
use crate::repository::Repository;

/// Status report pushed by the marketplace.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusCallback {
    #[serde(alias = "signedup_account_api_key")]
    pub api_key: String,
    pub order_id: OrderId,
    /// Marketplace task status code.
    #[serde(deserialize_with = "code_as_string")]
    pub status: String,
    #[serde(default)]
    pub agreement_link: Option<String>,
    #[serde(default)]
    pub executor_images: Vec<String>,
    #[serde(default)]
    pub executor_id: Option<u64>,
    #[serde(default)]
    pub executor_fio: Option<String>,
}

fn code_as_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("unexpected status {other}"))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutorAssignment {
    pub executor_id: Option<u64>,
    pub executor_fio: Option<String>,
}

impl AppServices {
    /// Close an order at the operator's request (cancel or not completed).
    ///
    /// The marketplace must accept the change before it is recorded here.
    #[tracing::instrument(skip(self, profile), fields(user_id = %profile.user_id), err)]
    pub async fn change_status(
        &self,
        profile: &StaffProfile,
        order_id: OrderId,
        status: OrderStatus,
        now: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        authorize(profile, &Permission::ORDERS_CHANGE_STATUS)?;
        let mut order = self.load_order(order_id).await?;
        if !can_access_order(profile, &order) {
            return Err(WorkflowError::Forbidden(format!("order {order_id}")));
        }

        let response = match self.marketplace.change_status(order_id, status).await {
            Ok(r) => r,
            Err(e) => {
                self.log_failure(
                    "change_status_in_signedup",
                    format!("order_id={order_id}, status_id={}", status.code()),
                    e.to_string(),
                )
                .await;
                return Err(WorkflowError::Upstream(e.to_string()));
            }
        };
        if response.status != 200 {
            return Err(WorkflowError::Upstream(response.error_message()));
        }

        self.execute(
            &mut order,
            OrderCommand::ChangeStatus(ChangeStatus {
                order_id,
                status,
                occurred_at: now,
            }),
        )
        .await?;
        tracing::info!(order_id = %order_id, status = %status, "order status changed");
        Ok(())
    }

    /// Hand a published order to the executor with this phone.
    #[tracing::instrument(skip(self, profile), fields(user_id = %profile.user_id), err)]
    pub async fn assign_executor(
        &self,
        profile: &StaffProfile,
        order_id: OrderId,
        executor_phone: &str,
        now: DateTime<Utc>,
    ) -> WorkflowResult<ExecutorAssignment> {
        authorize(profile, &Permission::EXECUTOR_ASSIGN)?;
        let mut order = self.load_order(order_id).await?;

        let response = match self.marketplace.assign_executor(order_id, executor_phone).await {
            Ok(r) => r,
            Err(e) => {
                self.log_failure(
                    "executor_assign_in_signedup",
                    format!("order_id={order_id}"),
                    e.to_string(),
                )
                .await;
                return Err(WorkflowError::Upstream(e.to_string()));
            }
        };
        if response.status != 200 {
            return Err(WorkflowError::Rejected(response.error_message()));
        }

        let assignment = ExecutorAssignment {
            executor_id: response.field_u64("executor_id"),
            executor_fio: response.field_str("executor_fio"),
        };
        let mut feedback = self.feedback_or_new(order_id).await?;
        if feedback.assign_executor(assignment.executor_id, assignment.executor_fio.clone()) {
            self.repos.feedback.upsert(feedback).await?;
        }
        self.execute(
            &mut order,
            OrderCommand::AssignExecutor(AssignExecutor {
                order_id,
                occurred_at: now,
            }),
        )
        .await?;
        tracing::info!(order_id = %order_id, executor_id = ?assignment.executor_id, "executor assigned");
        Ok(assignment)
    }

    /// Apply a status pushed by the marketplace.
    #[tracing::instrument(skip(self, callback), fields(order_id = %callback.order_id, status = %callback.status), err)]
    pub async fn marketplace_callback(&self, callback: StatusCallback, now: DateTime<Utc>) -> WorkflowResult<()> {
        if callback.api_key != self.config.terminal_api_key {
            return Err(WorkflowError::Forbidden("invalid api key".to_string()));
        }
        let mut order = self.load_order(callback.order_id).await?;
        let status = OrderStatus::from_marketplace_code(&callback.status).ok_or_else(|| {
            WorkflowError::Validation(format!("unknown marketplace status '{}'", callback.status))
        })?;

        let has_executor = callback.executor_id.is_some() || callback.executor_fio.is_some();
        if has_executor || status == OrderStatus::Completed {
            let mut feedback = self.feedback_or_new(callback.order_id).await?;
            let mut changed = false;
            if has_executor {
                changed |= feedback.assign_executor(callback.executor_id, callback.executor_fio.clone());
            }
            if status == OrderStatus::Completed {
                if let Some(link) = callback.agreement_link.filter(|l| !l.is_empty()) {
                    feedback.agreement_link = Some(link);
                    changed = true;
                }
                for image in callback.executor_images {
                    feedback.attach_image(image, true);
                    changed = true;
                }
            }
            if changed {
                self.repos.feedback.upsert(feedback).await?;
            }
        }

        if order.status() == status {
            tracing::debug!("status unchanged");
            return Ok(());
        }
        self.execute(
            &mut order,
            OrderCommand::ChangeStatus(ChangeStatus {
                order_id: callback.order_id,
                status,
                occurred_at: now,
            }),
        )
        .await?;
        Ok(())
    }
}
