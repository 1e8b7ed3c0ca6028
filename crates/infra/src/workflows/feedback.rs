//! Customer feedback page: read and submit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use terminal_catalog::FIO_FIELD;
use terminal_core::OrderId;
use terminal_orders::Ratings;

use super::listing::DepartmentRef;
use super::{AppServices, WorkflowError, WorkflowResult, format_time};
use crate::repository::Repository;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerFeedback {
    pub date: Option<DateTime<Utc>>,
    pub adequacy: Option<f64>,
    pub decency: Option<f64>,
    pub punctuality: Option<f64>,
    pub text: Option<String>,
    pub departments: Vec<DepartmentRef>,
    pub images: Vec<String>,
    pub fio: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutorFeedback {
    pub agreement_link: Option<String>,
    pub images: Vec<String>,
    pub fio: String,
    /// Completion time, empty until the order is completed.
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackView {
    pub customer: CustomerFeedback,
    pub executor: ExecutorFeedback,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FeedbackInput {
    #[serde(default)]
    pub adequacy: Option<f64>,
    #[serde(default)]
    pub decency: Option<f64>,
    #[serde(default)]
    pub punctuality: Option<f64>,
    #[serde(default)]
    pub text: Option<String>,
    /// Customer photo links.
    #[serde(default)]
    pub images: Vec<String>,
}

impl FeedbackInput {
    fn ratings(&self) -> Result<Ratings, String> {
        for (name, value) in [
            ("adequacy", self.adequacy),
            ("decency", self.decency),
            ("punctuality", self.punctuality),
        ] {
            if let Some(v) = value {
                if !(1.0..=5.0).contains(&v) {
                    return Err(format!("{name} must be between 1 and 5, got {v}"));
                }
            }
        }
        Ok(Ratings {
            adequacy: self.adequacy,
            decency: self.decency,
            punctuality: self.punctuality,
        })
    }
}

impl AppServices {
    pub async fn feedback_view(&self, order_id: OrderId) -> WorkflowResult<FeedbackView> {
        let feedback = self
            .feedback_for(order_id)
            .await?
            .ok_or_else(|| WorkflowError::Rejected("Object does not exist".to_string()))?;
        let order = self.load_order(order_id).await?;
        let departments = self.departments_by_id().await?;

        Ok(FeedbackView {
            customer: CustomerFeedback {
                date: feedback.completed_date,
                adequacy: feedback.ratings.adequacy,
                decency: feedback.ratings.decency,
                punctuality: feedback.ratings.punctuality,
                text: feedback.text.clone(),
                departments: DepartmentRef::list(order.departments(), &departments),
                images: feedback.image_urls(false),
                fio: order.text().field_value(FIO_FIELD).unwrap_or_default().to_string(),
            },
            executor: ExecutorFeedback {
                agreement_link: feedback.agreement_url().map(str::to_string),
                images: feedback.image_urls(true),
                fio: feedback.executor_fio.clone().unwrap_or_default(),
                date: format_time(order.date_completed()),
            },
        })
    }

    /// Store the customer's ratings. An unknown order is an error; ratings
    /// that cannot be stored are logged for operators and reported as `false`.
    pub async fn submit_feedback(
        &self,
        order_id: OrderId,
        input: FeedbackInput,
        now: DateTime<Utc>,
    ) -> WorkflowResult<bool> {
        let mut feedback = self
            .feedback_for(order_id)
            .await?
            .ok_or_else(|| WorkflowError::Rejected("Object does not exist".to_string()))?;
        let ratings = match input.ratings() {
            Ok(r) => r,
            Err(msg) => {
                self.log_failure("feedback", format!("order_id={order_id}"), msg).await;
                return Ok(false);
            }
        };

        feedback.submit(ratings, input.text.filter(|t| !t.trim().is_empty()), now);
        for link in input.images.into_iter().filter(|l| !l.is_empty()) {
            feedback.attach_image(link, false);
        }
        if let Err(e) = self.repos.feedback.upsert(feedback).await {
            self.log_failure("feedback", format!("order_id={order_id}"), e.to_string()).await;
            return Ok(false);
        }
        tracing::info!(order_id = %order_id, "feedback submitted");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::testing::Fixture;
    use crate::workflows::StatusCallback;

    async fn completed_order(fx: &Fixture, now: DateTime<Utc>) -> OrderId {
        let id = fx.place_order(now).await;
        fx.publish(id, now).await;
        fx.services
            .marketplace_callback(
                StatusCallback {
                    api_key: fx.services.config.terminal_api_key.clone(),
                    order_id: id,
                    status: "3".into(),
                    agreement_link: Some("https://files.example/a.pdf?token=x".into()),
                    executor_images: vec!["https://files.example/1.jpg?s=2".into()],
                    executor_id: Some(8),
                    executor_fio: Some("Serik B.".into()),
                },
                now,
            )
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn missing_feedback_is_reported() {
        let fx = Fixture::new().await;
        let err = fx.services.feedback_view(OrderId(77)).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Rejected(msg) if msg == "Object does not exist"));
    }

    #[tokio::test]
    async fn view_splits_customer_and_executor_parts() {
        let fx = Fixture::new().await;
        let now = Utc::now();
        let id = completed_order(&fx, now).await;

        let view = fx.services.feedback_view(id).await.unwrap();
        assert_eq!(view.executor.fio, "Serik B.");
        assert_eq!(view.executor.agreement_link.as_deref(), Some("https://files.example/a.pdf"));
        assert_eq!(view.executor.images, vec!["https://files.example/1.jpg"]);
        assert_eq!(view.executor.date, format_time(Some(now)));
        assert_eq!(view.customer.fio, "Aliya K.");
        assert_eq!(view.customer.departments[0].title, "Furniture");
        assert!(view.customer.images.is_empty());
        assert_eq!(view.customer.date, None);
    }

    #[tokio::test]
    async fn submit_records_ratings_and_rejects_out_of_range() {
        let fx = Fixture::new().await;
        let now = Utc::now();
        let id = completed_order(&fx, now).await;

        let ok = fx
            .services
            .submit_feedback(
                id,
                FeedbackInput {
                    adequacy: Some(5.0),
                    decency: Some(4.0),
                    punctuality: Some(4.0),
                    text: Some("quick and tidy".into()),
                    images: vec!["https://files.example/sofa.jpg?size=m".into()],
                },
                now,
            )
            .await
            .unwrap();
        assert!(ok);
        let feedback = fx.services.feedback_for(id).await.unwrap().unwrap();
        assert!(feedback.completed);
        assert_eq!(feedback.rate(), Some(4.3));
        assert_eq!(feedback.image_urls(false), vec!["https://files.example/sofa.jpg"]);

        let bad = fx
            .services
            .submit_feedback(
                id,
                FeedbackInput {
                    adequacy: Some(9.0),
                    ..Default::default()
                },
                now,
            )
            .await
            .unwrap();
        assert!(!bad);
        assert_eq!(fx.services.repos.logs.list().await.unwrap().len(), 1);

    }

    #[tokio::test]
    async fn feedback_for_an_unknown_order_is_rejected() {
        let fx = Fixture::new().await;
        let err = fx
            .services
            .submit_feedback(OrderId(404), FeedbackInput::default(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Rejected(ref msg) if msg == "Object does not exist"));
        assert!(fx.services.repos.logs.list().await.unwrap().is_empty());
    }
}
