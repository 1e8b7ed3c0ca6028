use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use terminal_core::{FeedbackId, OrderId, round_half_even};

/// Customer ratings, each on a 1–5 scale. Any of them may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Ratings {
    pub adequacy: Option<f64>,
    pub decency: Option<f64>,
    pub punctuality: Option<f64>,
}

impl Ratings {
    /// Mean of the three ratings rounded to one place; `None` unless all
    /// three are present.
    pub fn rate(&self) -> Option<f64> {
        let (a, d, p) = (self.adequacy?, self.decency?, self.punctuality?);
        Some(round_half_even((a + d + p) / 3.0, 1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackImage {
    pub link: String,
    /// Uploaded by the executor (work photos) rather than the customer.
    #[serde(default)]
    pub from_executor: bool,
}

impl FeedbackImage {
    pub fn url(&self) -> &str {
        strip_query(&self.link)
    }
}

fn strip_query(link: &str) -> &str {
    link.split('?').next().unwrap_or(link)
}

/// Post-completion feedback of an order, shared with the customer by link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: FeedbackId,
    /// Short public token (8 hex characters).
    pub uid: String,
    pub order_id: OrderId,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub ratings: Ratings,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub completed_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub agreement_link: Option<String>,
    #[serde(default)]
    pub executor_fio: Option<String>,
    #[serde(default)]
    pub executor_id: Option<u64>,
    #[serde(default)]
    pub images: Vec<FeedbackImage>,
}

impl Feedback {
    pub fn new(id: FeedbackId, order_id: OrderId) -> Self {
        let uid = format!("{:08x}", rand::thread_rng().r#gen::<u32>());
        Self {
            id,
            uid,
            order_id,
            completed: false,
            ratings: Ratings::default(),
            text: None,
            completed_date: None,
            agreement_link: None,
            executor_fio: None,
            executor_id: None,
            images: Vec::new(),
        }
    }

    pub fn rate(&self) -> Option<f64> {
        self.ratings.rate()
    }

    /// Record the customer's answer.
    pub fn submit(&mut self, ratings: Ratings, text: Option<String>, at: DateTime<Utc>) {
        self.ratings = ratings;
        self.text = text;
        self.completed = true;
        self.completed_date = Some(at);
    }

    pub fn attach_image(&mut self, link: impl Into<String>, from_executor: bool) {
        self.images.push(FeedbackImage {
            link: link.into(),
            from_executor,
        });
    }

    pub fn image_urls(&self, from_executor: bool) -> Vec<String> {
        self.images
            .iter()
            .filter(|i| i.from_executor == from_executor)
            .map(|i| i.url().to_string())
            .collect()
    }

    /// Set the executor unless the same executor is already recorded.
    /// Returns whether anything changed.
    pub fn assign_executor(&mut self, executor_id: Option<u64>, executor_fio: Option<String>) -> bool {
        let unchanged = self.executor_id.is_some() && self.executor_id == executor_id;
        if unchanged {
            return false;
        }
        self.executor_id = executor_id;
        self.executor_fio = executor_fio;
        true
    }

    pub fn agreement_url(&self) -> Option<&str> {
        self.agreement_link.as_deref().map(strip_query)
    }

    /// The executor uploaded the signed agreement.
    pub fn documents_uploaded(&self) -> bool {
        self.agreement_link.as_deref().is_some_and(|l| !l.is_empty())
    }
}
