//! Command gateway - the single entry point for mutations
//!
//! `CommandEnvelope` → `assert_role` → idempotency → domain operation, the
//! last two inside one `WriteTransaction`. A replayed request id re-checks the
//! caller's role, then returns the stored outcome without re-running any
//! state check.

use std::sync::Arc;

use redb::WriteTransaction;
use shared::command::{CommandEnvelope, CommandOutcome, ServerCommand};
use shared::error::{AppError, AppResult};
use shared::models::{Role, Staff};

use crate::auth::RoleService;
use crate::idempotency::CommandProcessor;
use crate::message::Effects;
use crate::orders::OrdersManager;

// ========== Allowed role sets ==========

const ORDER_TAKING: &[Role] = &[Role::Cashier, Role::Waiter, Role::Manager, Role::Admin];
const KITCHEN: &[Role] = &[Role::Kitchen, Role::Bar, Role::Manager, Role::Admin];
const HANDOFF: &[Role] = &[Role::Kitchen, Role::Bar, Role::Cashier, Role::Manager, Role::Admin];
const PAYMENT: &[Role] = &[Role::Cashier, Role::Waiter, Role::Manager, Role::Admin];
const CASH_HANDLING: &[Role] = &[Role::Cashier, Role::Manager, Role::Admin];
const ELEVATED: &[Role] = &[Role::Manager, Role::Admin];
const ANY_STAFF: &[Role] = &Role::ALL;

/// Roles admitted for a command
pub fn allowed_roles(cmd: &ServerCommand) -> &'static [Role] {
    match cmd {
        ServerCommand::CreateOrder { .. }
        | ServerCommand::AddItem { .. }
        | ServerCommand::RemoveItem { .. }
        | ServerCommand::UpdateQuantity { .. }
        | ServerCommand::SubmitToKitchen => ORDER_TAKING,
        ServerCommand::MarkReady => KITCHEN,
        ServerCommand::RequestPayment => HANDOFF,
        ServerCommand::Checkout
        | ServerCommand::RecordPayment { .. }
        | ServerCommand::GatewayReport { .. } => PAYMENT,
        ServerCommand::Cancel { .. } => ANY_STAFF,
        ServerCommand::VoidOrder { .. } => ELEVATED,
        ServerCommand::StartShift { .. } | ServerCommand::CloseShift { .. } => ANY_STAFF,
        ServerCommand::RecordCashDrop { .. } => CASH_HANDLING,
        ServerCommand::RecordCashAdjustment { .. } => ELEVATED,
    }
}

#[derive(Clone)]
pub struct CommandGateway {
    processor: CommandProcessor,
    orders: OrdersManager,
    roles: Arc<dyn RoleService>,
}

impl std::fmt::Debug for CommandGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandGateway")
            .field("orders", &self.orders)
            .finish_non_exhaustive()
    }
}

impl CommandGateway {
    pub fn new(processor: CommandProcessor, orders: OrdersManager, roles: Arc<dyn RoleService>) -> Self {
        Self {
            processor,
            orders,
            roles,
        }
    }

    pub fn processor(&self) -> &CommandProcessor {
        &self.processor
    }

    pub fn orders(&self) -> &OrdersManager {
        &self.orders
    }

    /// Execute one envelope. Blocking: call from `spawn_blocking` in async code.
    pub fn execute(&self, envelope: CommandEnvelope) -> AppResult<CommandOutcome> {
        let CommandEnvelope {
            resource_id,
            actor_id,
            payload,
            client_request_id,
        } = envelope;

        let resource_id = match (payload.targets_resource(), resource_id) {
            (true, Some(id)) if !id.trim().is_empty() => Some(id),
            (true, _) => {
                return Err(AppError::validation(format!(
                    "{} requires a resource_id",
                    payload.name()
                )));
            }
            (false, _) => None,
        };

        tracing::debug!(
            command = payload.name(),
            actor_id = %actor_id,
            resource_id = ?resource_id,
            client_request_id = ?client_request_id,
            "Executing command"
        );

        // Checked before the idempotency lookup so a replay is gated too
        let result = self
            .roles
            .assert_role(&actor_id, allowed_roles(&payload))
            .and_then(|actor| {
                self.processor.execute(
                    client_request_id.as_deref(),
                    payload.resource_type(),
                    |txn, fx| self.apply(txn, fx, &actor, resource_id.as_deref().unwrap_or_default(), payload.clone()),
                )
            });

        if let Err(e) = &result {
            tracing::info!(
                command = payload.name(),
                actor_id = %actor_id,
                client_request_id = ?client_request_id,
                error = %e,
                "Command rejected"
            );
        }
        result
    }

    fn apply(
        &self,
        txn: &WriteTransaction,
        fx: &mut Effects,
        actor: &Staff,
        resource_id: &str,
        cmd: ServerCommand,
    ) -> AppResult<CommandOutcome> {
        let orders = &self.orders;
        let shifts = orders.shifts();

        let outcome = match cmd {
            // ===== Orders =====
            ServerCommand::CreateOrder { order_type, table_id } => {
                CommandOutcome::Order(orders.create(txn, fx, actor, order_type, table_id.as_deref())?)
            }
            ServerCommand::AddItem { item } => {
                CommandOutcome::Order(orders.add_item(txn, fx, resource_id, &item)?)
            }
            ServerCommand::RemoveItem { item_id } => {
                CommandOutcome::Order(orders.remove_item(txn, fx, resource_id, &item_id)?)
            }
            ServerCommand::UpdateQuantity { item_id, quantity } => {
                CommandOutcome::Order(orders.update_quantity(txn, fx, resource_id, &item_id, quantity)?)
            }
            ServerCommand::SubmitToKitchen => {
                CommandOutcome::Order(orders.submit_to_kitchen(txn, fx, actor, resource_id)?)
            }
            ServerCommand::MarkReady => CommandOutcome::Order(orders.mark_ready(txn, fx, actor, resource_id)?),
            ServerCommand::RequestPayment => {
                CommandOutcome::Order(orders.request_payment(txn, fx, actor, resource_id)?)
            }
            ServerCommand::Checkout => CommandOutcome::Order(orders.checkout(txn, fx, actor, resource_id)?),
            ServerCommand::Cancel { reason } => {
                CommandOutcome::Order(orders.cancel(txn, fx, actor, resource_id, reason.as_deref())?)
            }
            ServerCommand::VoidOrder { reason } => {
                CommandOutcome::Order(orders.void(txn, fx, actor, resource_id, &reason)?)
            }

            // ===== Payments =====
            ServerCommand::RecordPayment { amount, method } => {
                CommandOutcome::Payment(orders.record_payment(txn, fx, actor, resource_id, amount, method)?)
            }
            ServerCommand::GatewayReport {
                amount,
                method,
                reference,
                outcome,
            } => {
                let reference = reference
                    .ok_or_else(|| AppError::validation("gateway report requires a reference"))?;
                CommandOutcome::Payment(orders.apply_gateway_report(
                    txn,
                    fx,
                    actor,
                    resource_id,
                    amount,
                    method,
                    &reference,
                    outcome,
                )?)
            }

            // ===== Shifts =====
            ServerCommand::StartShift { terminal_id } => {
                CommandOutcome::Shift(shifts.start(txn, fx, actor, &terminal_id)?)
            }
            ServerCommand::CloseShift {
                counted_cash,
                approver_id,
            } => CommandOutcome::Shift(shifts.close(
                txn,
                fx,
                self.roles.as_ref(),
                actor,
                resource_id,
                counted_cash,
                approver_id.as_deref(),
            )?),
            ServerCommand::RecordCashDrop { amount } => {
                CommandOutcome::Ledger(shifts.record_cash_drop(txn, fx, actor, resource_id, amount)?)
            }
            ServerCommand::RecordCashAdjustment { amount, reason } => CommandOutcome::Ledger(
                shifts.record_cash_adjustment(txn, fx, actor, resource_id, amount, &reason)?,
            ),
        };
        Ok(outcome)
    }
}
