// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payment processor.
//!
//! Reacts to payment documents written by the lifecycle engine: authorizes
//! sent payments, refunds canceled authorizations, captures approved
//! payments and pays out tutors. Cards filed on their own are stored too. Each handler re-reads its source document
//! and treats a missing one as already handled, so redelivery is harmless.

pub mod gateway;
pub mod stripe;

pub use gateway::{ChargeRequest, GatewayRecord, PaymentGateway, PayoutRequest};
pub use stripe::StripeClient;

use crate::db::{collections, new_document_id, DocumentStore, Partition, WriteBatch};
use crate::error::{AppError, Result};
use crate::models::payment::{fee_cents, from_cents, to_cents};
use crate::models::{
    ApprovedPayment, AuthPayment, ConciseUser, PastPayment, PastPayout, SentPayment, Transaction,
    User,
};
use crate::services::fanout::{appointment_docs, user_doc};
use crate::services::notify::{first_name, Notifier};
use crate::services::tasks::{PaymentTrigger, TriggerKind};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

/// Largest amount paid out in one payout, in cents.
pub const MAX_PAYOUT_CENTS: i64 = 400_00;

pub struct PaymentProcessor {
    store: Arc<dyn DocumentStore>,
    live: Arc<dyn PaymentGateway>,
    test: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    fee_percent: u32,
}

impl PaymentProcessor {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        live: Arc<dyn PaymentGateway>,
        test: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        fee_percent: u32,
    ) -> Self {
        Self {
            store,
            live,
            test,
            notifier,
            fee_percent,
        }
    }

    fn gateway(&self, partition: Partition) -> &dyn PaymentGateway {
        if partition.is_test() {
            self.test.as_ref()
        } else {
            self.live.as_ref()
        }
    }

    /// Run the handler for one trigger.
    pub async fn handle(&self, trigger: &PaymentTrigger) -> Result<()> {
        let PaymentTrigger {
            kind,
            partition,
            user,
            id,
        } = trigger;
        tracing::info!(kind = %kind, partition = %partition, user = %user, id = %id, "Processing payment trigger");

        match kind {
            TriggerKind::SentPayment => self.process_sent_payment(*partition, user, id).await,
            TriggerKind::AuthorizationCanceled => {
                self.cancel_authorization(*partition, user, id).await
            }
            TriggerKind::ApprovedPayment => {
                self.process_approved_payment(*partition, user, id).await
            }
            TriggerKind::RequestedPayout => {
                self.process_requested_payout(*partition, user, id).await
            }
            TriggerKind::PaymentMethod => self.process_payment_method(*partition, user, id).await,
        }
    }

    // ─── Authorization ───────────────────────────────────────────

    async fn process_sent_payment(&self, partition: Partition, payer: &str, id: &str) -> Result<()> {
        let sent_path = user_doc(partition, payer, collections::SENT_PAYMENTS, id);
        let Some(payment) = self.store.get_as::<SentPayment>(&sent_path).await? else {
            tracing::info!(user = payer, id, "Sent payment already processed");
            return Ok(());
        };

        if !self.engagement_live(partition, payer, id).await? {
            tracing::info!(user = payer, id, "Request was withdrawn, dropping its sent payment");
            let mut batch = WriteBatch::new();
            batch.delete_if_exists(sent_path);
            return self.store.commit(batch).await;
        }

        let gateway = self.gateway(partition);
        let charge = match self.authorize(partition, gateway, &payment, id).await {
            Ok(charge) => charge,
            Err(AppError::Gateway(reason)) => {
                tracing::error!(user = payer, id, reason = %reason, "Payment authorization failed");
                self.reject_sent_payment(partition, &payment, id).await?;
                return Err(AppError::Gateway(reason));
            }
            Err(other) => return Err(other),
        };

        let auth = AuthPayment {
            id: charge.id.clone(),
            from: payment.from.clone(),
            to: payment.to.clone(),
            amount: payment.amount,
            request: payment.request.clone(),
            timestamp: Utc::now(),
        };

        let mut batch = WriteBatch::new();
        batch
            .set(
                partition
                    .gateway_customer(payer)
                    .child(collections::AUTH_PAYMENTS, id),
                &charge.data,
            )?
            .set_all(
                [
                    user_doc(partition, &payment.to.uid, collections::AUTH_PAYMENTS, id),
                    user_doc(partition, &payment.from.uid, collections::AUTH_PAYMENTS, id),
                ],
                &auth,
            )?
            .delete_if_exists(sent_path);
        self.store.commit(batch).await?;

        tracing::info!(user = payer, id, charge = %charge.id, amount = payment.amount, "Authorized payment");
        Ok(())
    }

    /// Whether the paid request is still pending or has become an
    /// appointment. Rejected and canceled requests leave neither behind.
    async fn engagement_live(&self, partition: Partition, payer: &str, id: &str) -> Result<bool> {
        for collection in [
            collections::REQUESTS_OUT,
            collections::APPROVED_REQUESTS_OUT,
            collections::APPOINTMENTS,
        ] {
            if self.store.exists(&user_doc(partition, payer, collection, id)).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Make sure the payer's card is on file and authorize the charge.
    async fn authorize(
        &self,
        partition: Partition,
        gateway: &dyn PaymentGateway,
        payment: &SentPayment,
        id: &str,
    ) -> Result<GatewayRecord> {
        let customer_id = self
            .add_method(partition, gateway, &payment.from, &payment.transaction)
            .await?;
        let account_id = self.payout_account(partition, &payment.to.uid).await?;

        let amount_cents = to_cents(payment.amount);
        gateway
            .create_charge(&ChargeRequest {
                amount_cents,
                application_fee_cents: fee_cents(amount_cents, self.fee_percent),
                customer_id,
                destination_account: account_id,
                capture: false,
                description: lesson_description(&payment.to, &payment.request.subject),
                idempotency_key: idempotency_key(partition, TriggerKind::SentPayment, &payment.from.uid, id),
            })
            .await
    }

    /// Record the payer's card, creating the gateway customer on first use.
    ///
    /// Returns the customer id.
    async fn add_method(
        &self,
        partition: Partition,
        gateway: &dyn PaymentGateway,
        payer: &ConciseUser,
        transaction: &Transaction,
    ) -> Result<String> {
        if transaction.id.is_empty() {
            return Err(AppError::Gateway("payment has no card token".to_string()));
        }

        let customer_path = partition.gateway_customer(&payer.uid);
        let mut batch = WriteBatch::new();

        let customer_id = match self.store.get(&customer_path).await? {
            None => {
                let customer = gateway.create_customer(&payer.email, &transaction.id).await?;
                if let Some(card) = first_source(&customer.data) {
                    if let Some(card_id) = record_id(card) {
                        batch.set(customer_path.child(collections::CARDS, card_id), card)?;
                    }
                }
                batch.set(customer_path, &customer.data)?;
                tracing::info!(user = %payer.uid, customer = %customer.id, "Created gateway customer");
                customer.id
            }
            Some(existing) => {
                let customer_id = record_id(&existing)
                    .ok_or_else(|| AppError::Gateway("stored customer has no id".to_string()))?
                    .to_string();
                let card = gateway.attach_source(&customer_id, &transaction.id).await?;
                let refreshed = gateway.retrieve_customer(&customer_id).await?;
                batch
                    .set(customer_path.child(collections::CARDS, &card.id), &card.data)?
                    .set(customer_path, &refreshed.data)?;
                customer_id
            }
        };

        self.store.commit(batch).await?;
        Ok(customer_id)
    }

    /// File a card token for `uid`. The `PaymentMethod` trigger stores it
    /// with the gateway. Returns the method doc id.
    pub async fn file_method(&self, partition: Partition, uid: &str, method: &Transaction) -> Result<String> {
        if method.id.trim().is_empty() {
            return Err(AppError::BadRequest("payment method needs a card token id".to_string()));
        }
        let id = new_document_id();
        let mut batch = WriteBatch::new();
        batch.set(
            partition.gateway_customer(uid).child(collections::METHODS, &id),
            method,
        )?;
        self.store.commit(batch).await?;
        Ok(id)
    }

    async fn process_payment_method(&self, partition: Partition, uid: &str, id: &str) -> Result<()> {
        let method_path = partition.gateway_customer(uid).child(collections::METHODS, id);
        let Some(method) = self.store.get_as::<Transaction>(&method_path).await? else {
            tracing::info!(user = uid, id, "Payment method already processed");
            return Ok(());
        };

        let outcome = match self.store.get_as::<User>(&partition.user(uid)).await? {
            Some(user) => {
                let payer = ConciseUser::from(&user);
                self.add_method(partition, self.gateway(partition), &payer, &method)
                    .await
                    .map(|customer| {
                        tracing::info!(user = uid, id, customer = %customer, "Stored payment method");
                    })
            }
            None => Err(AppError::NotFound(format!("user ({uid})"))),
        };

        // The method doc is consumed either way; a retry has nothing to redo.
        let mut batch = WriteBatch::new();
        batch.delete_if_exists(method_path);
        self.store.commit(batch).await?;

        if let Err(e) = &outcome {
            tracing::error!(user = uid, id, error = %e, "Could not store payment method");
        }
        outcome
    }

    /// Undo a paid request whose payment could not be authorized.
    async fn reject_sent_payment(&self, partition: Partition, payment: &SentPayment, id: &str) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch
            .delete_if_exists(user_doc(partition, &payment.to.uid, collections::REQUESTS_IN, id))
            .delete_if_exists(user_doc(partition, &payment.from.uid, collections::REQUESTS_OUT, id))
            .delete_if_exists(user_doc(partition, &payment.from.uid, collections::SENT_PAYMENTS, id));
        self.store.commit(batch).await?;

        let tutor = &payment.request.to_user;
        self.notifier
            .send_email(
                &payment.from,
                "[Invalid Payment] We couldn't process your payment method",
                &format!(
                    "We could not process payment for your request to {}, so we've canceled that request. \
                     To try again, send {} the same request using a different payment method.",
                    tutor.name,
                    first_name(tutor)
                ),
            )
            .await
    }

    async fn cancel_authorization(&self, partition: Partition, payer: &str, id: &str) -> Result<()> {
        let customer = partition.gateway_customer(payer);
        let auth_path = customer.child(collections::AUTH_PAYMENTS, id);
        let Some(auth) = self.store.get(&auth_path).await? else {
            tracing::warn!(user = payer, id, "Authorized charge does not exist, nothing to refund");
            return Ok(());
        };
        let charge_id = record_id(&auth)
            .ok_or_else(|| AppError::Gateway(format!("authorized charge {id} has no id")))?;

        let refund = self
            .gateway(partition)
            .refund_charge(
                charge_id,
                &idempotency_key(partition, TriggerKind::AuthorizationCanceled, payer, id),
            )
            .await?;

        let mut batch = WriteBatch::new();
        batch
            .delete_if_exists(auth_path)
            .set(customer.child(collections::REFUNDS, &refund.id), &refund.data)?;
        self.store.commit(batch).await?;

        tracing::info!(user = payer, id, refund = %refund.id, "Refunded authorized charge");
        Ok(())
    }

    // ─── Capture ─────────────────────────────────────────────────

    async fn process_approved_payment(&self, partition: Partition, payer: &str, id: &str) -> Result<()> {
        let approved_path = user_doc(partition, payer, collections::APPROVED_PAYMENTS, id);
        let Some(approved) = self.store.get_as::<ApprovedPayment>(&approved_path).await? else {
            tracing::info!(user = payer, id, "Approved payment already processed");
            return Ok(());
        };
        let payment = approved.payment;
        if payment.from.uid != payer {
            tracing::info!(user = payer, id, "Skipping payee copy of approved payment");
            return Ok(());
        }

        let gateway = self.gateway(partition);
        let auth_path = partition
            .gateway_customer(payer)
            .child(collections::AUTH_PAYMENTS, id);
        let amount_cents = to_cents(payment.amount);
        let fee = fee_cents(amount_cents, self.fee_percent);
        let key = idempotency_key(partition, TriggerKind::ApprovedPayment, payer, id);

        let charge = match self.store.get(&auth_path).await? {
            Some(auth) => {
                let charge_id = record_id(&auth)
                    .ok_or_else(|| AppError::Gateway(format!("authorized charge {id} has no id")))?;
                tracing::info!(id, charge = charge_id, amount_cents, "Capturing authorized charge");
                gateway.capture_charge(charge_id, amount_cents, &key).await
            }
            None => {
                tracing::info!(id, amount_cents, "No authorization on file, charging directly");
                self.direct_charge(
                    partition,
                    gateway,
                    &payment.from,
                    &payment.to,
                    amount_cents,
                    fee,
                    &payment.appointment.request.subject,
                    key,
                )
                .await
            }
        };

        let charge = match charge {
            Ok(charge) => charge,
            Err(AppError::Gateway(reason)) => {
                tracing::error!(user = payer, id, reason = %reason, "Payment capture failed");
                let mut batch = WriteBatch::new();
                for path in appointment_docs(partition, &payment.appointment, collections::APPOINTMENTS, id) {
                    batch.delete_if_exists(path);
                }
                self.store.commit(batch).await?;
                self.notifier
                    .send_email(
                        &payment.from,
                        "[Invalid Payment] We couldn't process your payment method",
                        &format!(
                            "We could not process payment for your lesson with {}, so we've canceled that appointment. \
                             To try again, send {} the same request using a different payment method.",
                            payment.to.name,
                            first_name(&payment.to)
                        ),
                    )
                    .await?;
                return Err(AppError::Gateway(reason));
            }
            Err(other) => return Err(other),
        };

        let past_id = new_document_id();
        let past = PastPayment {
            id: charge.id.clone(),
            from: payment.from.clone(),
            to: payment.to.clone(),
            amount: payment.amount,
            fee: from_cents(fee),
            appointment: payment.appointment.clone(),
            timestamp: Utc::now(),
            payout_id: None,
        };

        let mut batch = WriteBatch::new();
        batch.set_all(
            [
                user_doc(partition, &payment.from.uid, collections::PAST_PAYMENTS, &past_id),
                user_doc(partition, &payment.to.uid, collections::PAST_PAYMENTS, &past_id),
            ],
            &past,
        )?;
        for uid in [&payment.from.uid, &payment.to.uid] {
            batch
                .delete_if_exists(user_doc(partition, uid, collections::APPROVED_PAYMENTS, id))
                .delete_if_exists(user_doc(partition, uid, collections::AUTH_PAYMENTS, id));
        }
        batch.delete_if_exists(auth_path);
        self.store.commit(batch).await?;

        tracing::info!(user = payer, id, past_id = %past_id, charge = %charge.id, "Captured payment");
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn direct_charge(
        &self,
        partition: Partition,
        gateway: &dyn PaymentGateway,
        payer: &ConciseUser,
        tutor: &ConciseUser,
        amount_cents: i64,
        fee: i64,
        subject: &str,
        idempotency_key: String,
    ) -> Result<GatewayRecord> {
        let customer = self
            .store
            .get(&partition.gateway_customer(&payer.uid))
            .await?
            .ok_or_else(|| AppError::Gateway(format!("no payment method on file for {}", payer.uid)))?;
        let customer_id = record_id(&customer)
            .ok_or_else(|| AppError::Gateway("stored customer has no id".to_string()))?;
        let account_id = self.payout_account(partition, &tutor.uid).await?;

        gateway
            .create_charge(&ChargeRequest {
                amount_cents,
                application_fee_cents: fee,
                customer_id: customer_id.to_string(),
                destination_account: account_id,
                capture: true,
                description: lesson_description(tutor, subject),
                idempotency_key,
            })
            .await
    }

    // ─── Payouts ─────────────────────────────────────────────────

    async fn process_requested_payout(&self, partition: Partition, tutor: &str, id: &str) -> Result<()> {
        let request_path = user_doc(partition, tutor, collections::REQUESTED_PAYOUTS, id);
        if !self.store.exists(&request_path).await? {
            tracing::info!(user = tutor, id, "Payout request already processed");
            return Ok(());
        }

        let payments = self
            .store
            .list_as::<PastPayment>(&partition.user(tutor).collection(collections::PAST_PAYMENTS))
            .await?;
        let (included, amount_cents) = select_for_payout(tutor, &payments, MAX_PAYOUT_CENTS);

        if included.is_empty() {
            tracing::info!(user = tutor, id, "Nothing to pay out");
            let mut batch = WriteBatch::new();
            batch.delete_if_exists(request_path);
            return self.store.commit(batch).await;
        }

        let account_id = self.payout_account(partition, tutor).await?;
        // Keyed by the request so a redelivery reuses the payout doc and key.
        let payout_id = id.to_string();
        let payout = self
            .gateway(partition)
            .create_payout(&PayoutRequest {
                account_id,
                amount_cents,
                metadata: vec![
                    ("partition".to_string(), partition.as_str().to_string()),
                    ("user".to_string(), tutor.to_string()),
                    ("payoutDoc".to_string(), payout_id.clone()),
                ],
                idempotency_key: idempotency_key(partition, TriggerKind::RequestedPayout, tutor, id),
            })
            .await?;

        let record = PastPayout {
            id: payout.id.clone(),
            amount: from_cents(amount_cents),
            status: payout.status().unwrap_or("pending").to_string(),
            payments: included.iter().map(|(pid, _)| pid.to_string()).collect(),
            timestamp: Utc::now(),
        };

        let mut batch = WriteBatch::new();
        batch
            .delete_if_exists(request_path)
            .set(user_doc(partition, tutor, collections::PAST_PAYOUTS, &payout_id), &record)?;
        for (pid, payment) in &included {
            let mut stamped = (*payment).clone();
            stamped.payout_id = Some(payout_id.clone());
            batch.set_all(
                [
                    user_doc(partition, &payment.from.uid, collections::PAST_PAYMENTS, pid),
                    user_doc(partition, &payment.to.uid, collections::PAST_PAYMENTS, pid),
                ],
                &stamped,
            )?;
        }
        self.store.commit(batch).await?;

        tracing::info!(
            user = tutor,
            id,
            payout = %payout.id,
            amount_cents,
            payments = included.len(),
            "Paid out tutor"
        );
        Ok(())
    }

    /// Apply a payout status reported by the gateway.
    ///
    /// Returns false when the payout document does not exist.
    pub async fn record_payout_status(
        &self,
        partition: Partition,
        user: &str,
        payout_doc: &str,
        status: &str,
    ) -> Result<bool> {
        let path = user_doc(partition, user, collections::PAST_PAYOUTS, payout_doc);
        let Some(mut payout) = self.store.get_as::<PastPayout>(&path).await? else {
            return Ok(false);
        };
        payout.status = status.to_string();

        let mut batch = WriteBatch::new();
        batch.set(path, &payout)?;
        self.store.commit(batch).await?;

        tracing::info!(user, payout_doc, status, "Updated payout status");
        Ok(true)
    }

    // ─── Connected accounts ──────────────────────────────────────

    /// Finish connecting a tutor's payout account and return a login link.
    pub async fn init_account(&self, partition: Partition, uid: &str, code: &str) -> Result<String> {
        let gateway = self.gateway(partition);
        let account = gateway.connect_account(code).await?;

        let mut batch = WriteBatch::new();
        batch.set(partition.gateway_account(uid), &account.data)?;
        self.store.commit(batch).await?;

        tracing::info!(user = uid, account = %account.id, "Connected payout account");
        gateway.login_link(&account.id).await
    }

    pub async fn account_login_link(&self, partition: Partition, uid: &str) -> Result<String> {
        let account_id = self
            .store
            .get(&partition.gateway_account(uid))
            .await?
            .as_ref()
            .and_then(record_id)
            .map(str::to_string)
            .ok_or_else(|| AppError::NotFound(format!("payout account ({uid})")))?;
        self.gateway(partition).login_link(&account_id).await
    }

    async fn payout_account(&self, partition: Partition, uid: &str) -> Result<String> {
        let account = self.store.get(&partition.gateway_account(uid)).await?;
        account
            .as_ref()
            .and_then(record_id)
            .map(str::to_string)
            .ok_or_else(|| AppError::Gateway(format!("no connected payout account for {uid}")))
    }
}

/// Unpaid payments to `tutor`, oldest first, while the net total fits
/// under `cap_cents`. A single payment larger than the cap is paid out
/// alone.
pub fn select_for_payout<'a>(
    tutor: &str,
    payments: &'a [(String, PastPayment)],
    cap_cents: i64,
) -> (Vec<(&'a str, &'a PastPayment)>, i64) {
    let mut unpaid: Vec<_> = payments
        .iter()
        .filter(|(_, p)| p.payout_id.is_none() && p.to.uid == tutor && p.net_cents() > 0)
        .collect();
    unpaid.sort_by_key(|(_, p)| p.timestamp);

    let mut included = Vec::new();
    let mut total = 0;
    for (id, payment) in unpaid {
        let net = payment.net_cents();
        if total + net > cap_cents && !included.is_empty() {
            continue;
        }
        included.push((id.as_str(), payment));
        total += net;
        if total >= cap_cents {
            break;
        }
    }
    (included, total)
}

/// Stable per trigger, so retries of the same trigger share a key.
fn idempotency_key(partition: Partition, kind: TriggerKind, user: &str, id: &str) -> String {
    format!("{partition}/{kind}/{user}/{id}")
}

fn lesson_description(tutor: &ConciseUser, subject: &str) -> String {
    format!("Payment for tutoring lesson with {} for {}", tutor.name, subject)
}

fn record_id(value: &Value) -> Option<&str> {
    value.get("id").and_then(Value::as_str).filter(|id| !id.is_empty())
}

fn first_source(customer: &Value) -> Option<&Value> {
    customer.pointer("/sources/data/0")
}
