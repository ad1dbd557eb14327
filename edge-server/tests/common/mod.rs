//! Shared helpers for edge-server integration tests
#![allow(dead_code)]

use edge_server::{AppResult, Config, ServerState};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use shared::command::{CommandEnvelope, CommandOutcome, ServerCommand};
use shared::models::{
    AuditAction, Order, OrderItemInput, OrderType, Product, Role, Shift, Staff, StaffCreate,
};

pub fn edge() -> ServerState {
    let state = ServerState::in_memory(Config::for_work_dir("unused")).unwrap();
    seed_catalog(&state);
    state
}

pub fn seed_catalog(state: &ServerState) {
    for (id, name, price) in [
        ("burger", "Burger", dec!(12.50)),
        ("fries", "Fries", dec!(4.00)),
        ("cola", "Cola", dec!(2.50)),
    ] {
        edge_server::orders::Catalog::upsert(
            &state.storage,
            &Product {
                id: id.into(),
                name: name.into(),
                price,
                sizes: vec![],
                modifiers: vec![],
            },
        )
        .unwrap();
    }
}

pub fn staff(state: &ServerState, username: &str, role: Role) -> Staff {
    state
        .staff
        .create(StaffCreate {
            username: username.into(),
            display_name: username.into(),
            role,
            password: None,
        })
        .unwrap()
}

pub fn exec(state: &ServerState, env: CommandEnvelope) -> AppResult<CommandOutcome> {
    state.gateway.execute(env)
}

pub fn order_of(outcome: CommandOutcome) -> Order {
    match outcome {
        CommandOutcome::Order(o) => o,
        other => panic!("expected order outcome, got {other:?}"),
    }
}

/// Register a terminal and open a shift for `staff` on it
pub fn open_shift(state: &ServerState, staff: &Staff, terminal_code: &str) -> Shift {
    let terminal = state.terminals.register(terminal_code).unwrap();
    let outcome = exec(
        state,
        CommandEnvelope::new(
            &staff.id,
            ServerCommand::StartShift {
                terminal_id: terminal.id,
            },
        ),
    )
    .unwrap();
    match outcome {
        CommandOutcome::Shift(s) => s,
        other => panic!("expected shift outcome, got {other:?}"),
    }
}

pub fn create_dine_in(state: &ServerState, actor: &Staff, table: &str) -> AppResult<Order> {
    exec(
        state,
        CommandEnvelope::new(
            &actor.id,
            ServerCommand::CreateOrder {
                order_type: OrderType::DineIn,
                table_id: Some(table.into()),
            },
        ),
    )
    .map(order_of)
}

pub fn add_item(state: &ServerState, actor: &Staff, order_id: &str, product: &str, quantity: u32) -> Order {
    order_of(
        exec(
            state,
            CommandEnvelope::new(
                &actor.id,
                ServerCommand::AddItem {
                    item: OrderItemInput {
                        product_id: product.into(),
                        quantity,
                        size: None,
                        modifiers: vec![],
                        notes: None,
                    },
                },
            )
            .on(order_id),
        )
        .unwrap(),
    )
}

pub fn on_order(state: &ServerState, actor: &Staff, order_id: &str, cmd: ServerCommand) -> AppResult<CommandOutcome> {
    exec(state, CommandEnvelope::new(&actor.id, cmd).on(order_id))
}

pub fn pay_cash(state: &ServerState, actor: &Staff, order_id: &str, amount: Decimal) -> AppResult<CommandOutcome> {
    on_order(
        state,
        actor,
        order_id,
        ServerCommand::RecordPayment {
            amount,
            method: shared::models::PaymentMethod::Cash,
        },
    )
}

/// Chain every pending outbox row (no worker runs in sync tests)
pub fn flush_audit(state: &ServerState) {
    state.audit().storage().drain_outbox().unwrap();
}

pub fn order_audit(state: &ServerState, order_id: &str) -> Vec<AuditAction> {
    flush_audit(state);
    state
        .audit()
        .storage()
        .entries_for("order", order_id)
        .unwrap()
        .into_iter()
        .map(|e| e.action)
        .collect()
}
