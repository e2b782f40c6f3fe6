// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Delivery of payment triggers.
//!
//! Lifecycle transitions never talk to the payment gateway themselves. They
//! enqueue a [`PaymentTrigger`] naming the document that was just written,
//! and the payment processor picks it up later:
//! - in production through Cloud Tasks, calling back into `/tasks/payments`
//! - in local development by spawning the processor in-process
//!
//! Uses the official google-cloud-tasks-v2 SDK.

use crate::db::Partition;
use crate::error::{AppError, Result};
use crate::services::google_oidc::tasks_service_account;
use crate::services::payments::PaymentProcessor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Which payment document a trigger refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TriggerKind {
    /// `users/{payer}/sentPayments/{id}` was written.
    SentPayment,
    /// The authorization stored at `stripeCustomers/{payer}/authPayments/{id}`
    /// must be refunded.
    AuthorizationCanceled,
    /// `users/{payer}/approvedPayments/{id}` was written.
    ApprovedPayment,
    /// `users/{tutor}/requestedPayouts/{id}` was written.
    RequestedPayout,
    /// `stripeCustomers/{payer}/methods/{id}` was written.
    PaymentMethod,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TriggerKind::SentPayment => "sentPayment",
            TriggerKind::AuthorizationCanceled => "authorizationCanceled",
            TriggerKind::ApprovedPayment => "approvedPayment",
            TriggerKind::RequestedPayout => "requestedPayout",
            TriggerKind::PaymentMethod => "paymentMethod",
        };
        f.write_str(name)
    }
}

/// Payload sent to the payment processing task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTrigger {
    pub kind: TriggerKind,
    pub partition: Partition,
    /// Owner of the triggering document
    pub user: String,
    /// Triggering document id
    pub id: String,
}

impl PaymentTrigger {
    pub fn new(kind: TriggerKind, partition: Partition, user: &str, id: &str) -> Self {
        Self {
            kind,
            partition,
            user: user.to_string(),
            id: id.to_string(),
        }
    }
}

/// Sink for payment triggers.
#[async_trait]
pub trait TriggerQueue: Send + Sync {
    async fn enqueue(&self, trigger: PaymentTrigger) -> Result<()>;
}

/// Cloud Tasks client wrapper.
pub struct TasksService {
    project_id: String,
    location: String,
    queue_name: String,
    service_url: String,
}

impl TasksService {
    pub fn new(project_id: &str, region: &str, service_url: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            location: region.to_string(),
            queue_name: crate::config::PAYMENTS_QUEUE_NAME.to_string(),
            service_url: service_url.trim_end_matches('/').to_string(),
        }
    }

    /// Generic task queuing helper.
    async fn queue_task<T: Serialize>(&self, endpoint: &str, payload: &T) -> Result<()> {
        use google_cloud_tasks_v2::client::CloudTasks;
        use google_cloud_tasks_v2::model::{HttpRequest, OidcToken, Task};

        let client = CloudTasks::builder()
            .build()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Cloud Tasks client error: {}", e)))?;

        let queue_path = format!(
            "projects/{}/locations/{}/queues/{}",
            self.project_id, self.location, self.queue_name
        );

        let body = serde_json::to_vec(payload)?;

        let http_request = HttpRequest::default()
            .set_url(format!("{}{}", self.service_url, endpoint))
            .set_http_method("POST")
            .set_body(axum::body::Bytes::from(body))
            .set_headers(std::collections::HashMap::from([(
                "Content-Type".to_string(),
                "application/json".to_string(),
            )]))
            .set_oidc_token(
                OidcToken::default()
                    .set_service_account_email(tasks_service_account(&self.project_id))
                    .set_audience(self.service_url.clone()),
            );

        let task = Task::default().set_http_request(http_request);

        client
            .create_task()
            .set_parent(queue_path)
            .set_task(task)
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Cloud Tasks create error: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl TriggerQueue for TasksService {
    async fn enqueue(&self, trigger: PaymentTrigger) -> Result<()> {
        tracing::info!(
            kind = %trigger.kind,
            partition = %trigger.partition,
            user = %trigger.user,
            id = %trigger.id,
            "Queuing payment trigger"
        );
        self.queue_task("/tasks/payments", &trigger).await
    }
}

/// Runs triggers on a spawned task in this process.
pub struct InlineQueue {
    processor: Arc<PaymentProcessor>,
}

impl InlineQueue {
    pub fn new(processor: Arc<PaymentProcessor>) -> Self {
        Self { processor }
    }
}

#[async_trait]
impl TriggerQueue for InlineQueue {
    async fn enqueue(&self, trigger: PaymentTrigger) -> Result<()> {
        let processor = Arc::clone(&self.processor);
        tokio::spawn(async move {
            if let Err(e) = processor.handle(&trigger).await {
                tracing::error!(
                    kind = %trigger.kind,
                    user = %trigger.user,
                    id = %trigger.id,
                    error = %e,
                    "Inline payment trigger failed"
                );
            }
        });
        Ok(())
    }
}
