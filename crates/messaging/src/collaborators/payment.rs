//! Simulated payment service.

use std::collections::HashMap;
use std::sync::Arc;

use common::OrderId;
use common::contract::{PaymentEventMessage, PaymentEventStatus, PaymentRequestDto, topics};
use domain::Money;
use tokio::sync::{RwLock, watch};

use crate::bus::{Message, MessageBus};
use crate::error::Result;
use crate::listener::ListenerHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Approved,
    Rejected,
    Refunded,
}

#[derive(Debug, Clone, Copy)]
struct Transaction {
    user_id: i64,
    amount: Money,
    status: TransactionStatus,
}

#[derive(Debug, Default)]
struct PaymentBook {
    balances: HashMap<i64, Money>,
    transactions: HashMap<OrderId, Transaction>,
}

/// Keeps a balance per user and one transaction per order.
///
/// Users start with the configured balance the first time they are charged.
/// A charge for an order that already has a transaction replays the earlier
/// outcome instead of charging again.
#[derive(Debug, Clone)]
pub struct PaymentSimulator<B: MessageBus> {
    bus: B,
    initial_balance: Money,
    book: Arc<RwLock<PaymentBook>>,
}

impl<B: MessageBus + Clone + 'static> PaymentSimulator<B> {
    pub fn new(bus: B, initial_balance: Money) -> Self {
        Self {
            bus,
            initial_balance,
            book: Arc::new(RwLock::new(PaymentBook::default())),
        }
    }

    pub async fn balance(&self, user_id: i64) -> Money {
        self.book
            .read()
            .await
            .balances
            .get(&user_id)
            .copied()
            .unwrap_or(self.initial_balance)
    }

    /// Balance of a user that has been charged or given a balance, `None`
    /// for anyone else.
    pub async fn known_balance(&self, user_id: i64) -> Option<Money> {
        self.book.read().await.balances.get(&user_id).copied()
    }

    pub async fn set_balance(&self, user_id: i64, balance: Money) {
        self.book.write().await.balances.insert(user_id, balance);
    }

    pub async fn transaction_status(&self, order_id: OrderId) -> Option<TransactionStatus> {
        self.book
            .read()
            .await
            .transactions
            .get(&order_id)
            .map(|t| t.status)
    }

    /// Applies one payment command and returns the reply to publish, if any.
    /// Refunds are never answered.
    pub async fn handle(&self, request: &PaymentRequestDto) -> Option<PaymentEventMessage> {
        let Some(order_id) = request.order_id else {
            tracing::warn!("Payment command without order id ignored");
            return None;
        };

        if request.is_refund() {
            self.refund(order_id, request.user_id).await;
            return None;
        }

        let status = self.charge(order_id, request).await;
        Some(PaymentEventMessage {
            payment_request: Some(request.clone()),
            status,
        })
    }

    async fn charge(&self, order_id: OrderId, request: &PaymentRequestDto) -> PaymentEventStatus {
        let Ok(amount) = Money::from_decimal(request.amount) else {
            tracing::warn!(%order_id, amount = request.amount, "Payment amount rejected");
            return PaymentEventStatus::PaymentFailed;
        };

        let mut book = self.book.write().await;
        if let Some(existing) = book.transactions.get(&order_id) {
            tracing::debug!(%order_id, status = ?existing.status, "Repeated charge, replaying outcome");
            return match existing.status {
                TransactionStatus::Approved => PaymentEventStatus::PaymentCompleted,
                TransactionStatus::Rejected | TransactionStatus::Refunded => {
                    PaymentEventStatus::PaymentFailed
                }
            };
        }

        let initial = self.initial_balance;
        let balance = book.balances.entry(request.user_id).or_insert(initial);
        let status = match balance.cents().checked_sub(amount.cents()) {
            Some(remaining) if remaining >= 0 => {
                *balance = Money::from_cents(remaining).unwrap_or(*balance);
                TransactionStatus::Approved
            }
            _ => TransactionStatus::Rejected,
        };
        book.transactions.insert(
            order_id,
            Transaction {
                user_id: request.user_id,
                amount,
                status,
            },
        );

        tracing::info!(%order_id, user_id = request.user_id, %amount, ?status, "Payment processed");
        if status == TransactionStatus::Approved {
            PaymentEventStatus::PaymentCompleted
        } else {
            PaymentEventStatus::PaymentFailed
        }
    }

    async fn refund(&self, order_id: OrderId, user_id: i64) {
        let mut book = self.book.write().await;
        let Some(txn) = book
            .transactions
            .get_mut(&order_id)
            .filter(|t| t.status == TransactionStatus::Approved)
            .map(|t| {
                t.status = TransactionStatus::Refunded;
                *t
            })
        else {
            tracing::debug!(%order_id, "Nothing to refund");
            return;
        };

        if txn.user_id != user_id {
            tracing::warn!(%order_id, charged = txn.user_id, requested = user_id, "Refund user differs from charged user");
        }
        let initial = self.initial_balance;
        let balance = book.balances.entry(txn.user_id).or_insert(initial);
        *balance = Money::from_cents(balance.cents().saturating_add(txn.amount.cents()))
            .unwrap_or(*balance);
        tracing::info!(%order_id, user_id = txn.user_id, amount = %txn.amount, "Payment refunded");
    }

    /// Decodes a command from the bus, applies it, and publishes the reply.
    pub async fn process(&self, message: &Message) -> Result<()> {
        let request: PaymentRequestDto = message.decode()?;
        if let Some(reply) = self.handle(&request).await {
            let key = request.order_id.map(|id| id.to_string());
            self.bus
                .publish(Message::json(topics::PAYMENT_EVENTS, key, &reply)?)
                .await?;
        }
        Ok(())
    }

    /// Consumes `payment-commands-out` on a background task.
    pub async fn spawn(self) -> Result<ListenerHandle> {
        let mut commands = self.bus.subscribe(topics::PAYMENT_COMMANDS).await?;
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    Some(m) = commands.recv() => m,
                    else => break,
                };
                if let Err(e) = self.process(&message).await {
                    tracing::error!(error = %e, "Payment simulator failed to handle command");
                }
            }
        });

        Ok(ListenerHandle::new("payment-simulator", shutdown_tx, task))
    }
}
