use super::*;

#[test]
fn test_takeaway_full_lifecycle() {
    let h = Harness::new();
    let order = h.takeaway();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.shift_id, h.shift.id);
    assert_eq!(order.display_number, 1);

    h.add(&order.id, "latte", 2).unwrap();
    let order = h.add(&order.id, "bagel", 1).unwrap();
    assert_eq!(order.total, dec!(12.00));

    h.submit(&order.id).unwrap();
    h.ready(&order.id).unwrap();
    h.pay(&order.id, dec!(12.00)).unwrap();
    let served = h.checkout(&order.id).unwrap();

    assert_eq!(served.status, OrderStatus::Served);
    assert_eq!(served.paid, dec!(12.00));
    let path: Vec<_> = served.status_history.iter().map(|c| c.to).collect();
    assert_eq!(
        path,
        vec![
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::AwaitingPayment,
            OrderStatus::Served
        ]
    );
}

#[test]
fn test_checkout_scenario_audit_trail() {
    let h = Harness::new();
    let order = h.ready_order();
    h.pay(&order.id, dec!(3.00)).unwrap();
    h.checkout(&order.id).unwrap();

    assert_eq!(
        h.order_actions(&order.id),
        vec![
            AuditAction::OrderCreated,
            AuditAction::OrderSubmitted,
            AuditAction::OrderReady,
            AuditAction::PaymentRecorded,
            AuditAction::OrderCheckedOut,
        ]
    );
    assert!(h.audit().verify_chain().unwrap().chain_intact);
}

#[test]
fn test_checkout_audit_before_snapshot_is_pre_checkout() {
    let h = Harness::new();
    let order = h.ready_order();
    h.pay(&order.id, dec!(3.00)).unwrap();
    h.checkout(&order.id).unwrap();

    let entries = h.audit().entries_for("order", &order.id).unwrap();
    let checkout = entries.last().unwrap();
    assert_eq!(checkout.before["status"], "ready");
    assert_eq!(checkout.after["status"], "served");
}

#[test]
fn test_item_pricing_with_size_and_modifier() {
    let h = Harness::new();
    let order = h.takeaway();
    let input = OrderItemInput {
        product_id: "latte".into(),
        quantity: 2,
        size: Some("large".into()),
        modifiers: vec!["oat".into()],
        notes: Some("extra hot".into()),
    };
    let order = h
        .run(|txn, fx, h| h.orders.add_item(txn, fx, &order.id, &input))
        .unwrap();

    let line = &order.items[0];
    assert_eq!(line.unit_price, dec!(5.60));
    assert_eq!(line.product_name, "Latte");
    assert_eq!(order.total, dec!(11.20));
}

#[test]
fn test_update_and_remove_items_recalculate_total() {
    let h = Harness::new();
    let order = h.takeaway();
    let order = h.add(&order.id, "bagel", 1).unwrap();
    let bagel = order.items[0].id.clone();
    let order = h.add(&order.id, "latte", 1).unwrap();
    assert_eq!(order.total, dec!(7.50));

    let order = h
        .run(|txn, fx, h| h.orders.update_quantity(txn, fx, &order.id, &bagel, 3))
        .unwrap();
    assert_eq!(order.total, dec!(13.50));

    let order = h
        .run(|txn, fx, h| h.orders.remove_item(txn, fx, &order.id, &bagel))
        .unwrap();
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.total, dec!(4.50));
}

#[test]
fn test_dine_in_holds_table_until_served() {
    let h = Harness::new();
    let order = h.dine_in("T1").unwrap();
    let lock = TableLock::get(&h.fixture.storage, "T1").unwrap().unwrap();
    assert_eq!(lock.order_id, order.id);
    assert_eq!(lock.terminal_id, order.terminal_id);

    h.add(&order.id, "bagel", 1).unwrap();
    h.submit(&order.id).unwrap();
    h.ready(&order.id).unwrap();
    assert!(TableLock::get(&h.fixture.storage, "T1").unwrap().is_some());

    h.pay(&order.id, dec!(3.00)).unwrap();
    h.checkout(&order.id).unwrap();
    assert!(TableLock::get(&h.fixture.storage, "T1").unwrap().is_none());

    // Freed table accepts a new order
    h.dine_in("T1").unwrap();
}

#[test]
fn test_cancel_pending_releases_table() {
    let h = Harness::new();
    let order = h.dine_in("T2").unwrap();
    let (result, fx) = h.run_fx(|txn, fx, h| h.orders.cancel(txn, fx, &h.cashier, &order.id, Some("changed mind")));
    let cancelled = result.unwrap();

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert!(TableLock::get(&h.fixture.storage, "T2").unwrap().is_none());
    assert!(fx.events().iter().any(|e| matches!(
        &e.event,
        EdgeEvent::OrderCancelled { voided: false, .. }
    )));
    assert!(fx.events().iter().any(|e| matches!(e.event, EdgeEvent::TableReleased { .. })));
}

#[test]
fn test_manager_voids_preparing_order() {
    let h = Harness::new();
    let order = h.dine_in("T3").unwrap();
    h.add(&order.id, "bagel", 1).unwrap();
    h.submit(&order.id).unwrap();

    let voided = h
        .run(|txn, fx, h| h.orders.void(txn, fx, &h.manager, &order.id, "customer left"))
        .unwrap();
    assert_eq!(voided.status, OrderStatus::Cancelled);
    assert!(TableLock::get(&h.fixture.storage, "T3").unwrap().is_none());

    let entries = h.audit().entries_for("order", &order.id).unwrap();
    let last = entries.last().unwrap();
    assert_eq!(last.action, AuditAction::OrderVoided);
    assert_eq!(last.actor_id.as_deref(), Some(h.manager.id.as_str()));
    assert_eq!(last.after["void_reason"], "customer left");
}

#[test]
fn test_request_payment_then_checkout() {
    let h = Harness::new();
    let order = h.ready_order();
    let awaiting = h
        .run(|txn, fx, h| h.orders.request_payment(txn, fx, &h.cashier, &order.id))
        .unwrap();
    assert_eq!(awaiting.status, OrderStatus::AwaitingPayment);

    h.pay(&order.id, dec!(3.00)).unwrap();
    let served = h.checkout(&order.id).unwrap();
    assert_eq!(served.status, OrderStatus::Served);
    // No duplicate awaiting_payment hop
    assert_eq!(served.status_history.len(), 4);
}

#[test]
fn test_split_payments_and_ledger() {
    let h = Harness::new();
    let order = h.ready_order();
    h.pay(&order.id, dec!(1.00)).unwrap();
    h.run(|txn, fx, h| {
        h.orders
            .record_payment(txn, fx, &h.cashier, &order.id, dec!(2.00), PaymentMethod::Card)
    })
    .unwrap();
    h.checkout(&order.id).unwrap();

    let ledger = ShiftManager::get_ledger(&h.fixture.storage, &h.shift.id).unwrap();
    assert_eq!(ledger.cash_total, dec!(1.00));
    assert_eq!(ledger.card_total, dec!(2.00));
    assert_eq!(ledger.payment_count, 2);
    assert_eq!(ledger.served_orders, 1);
    assert_eq!(ledger.sales_total, dec!(3.00));

    let payments = OrdersManager::payments_for(&h.fixture.storage, &order.id).unwrap();
    assert_eq!(payments.len(), 2);
    assert!(payments.iter().all(Payment::is_completed));
}

#[test]
fn test_gateway_report_is_applied_once() {
    let h = Harness::new();
    let order = h.ready_order();
    let report = |h: &Harness| {
        h.run(|txn, fx, h| {
            h.orders.apply_gateway_report(
                txn,
                fx,
                &h.cashier,
                &order.id,
                dec!(3.00),
                PaymentMethod::Card,
                "gw-123",
                GatewayOutcome::Completed,
            )
        })
        .unwrap()
    };
    let first = report(&h);
    let second = report(&h);

    assert_eq!(first.id, second.id);
    let order = OrdersManager::get(&h.fixture.storage, &order.id).unwrap();
    assert_eq!(order.paid, dec!(3.00));
    let ledger = ShiftManager::get_ledger(&h.fixture.storage, &h.shift.id).unwrap();
    assert_eq!(ledger.card_total, dec!(3.00));
}

#[test]
fn test_failed_gateway_report_changes_nothing() {
    let h = Harness::new();
    let order = h.ready_order();
    let payment = h
        .run(|txn, fx, h| {
            h.orders.apply_gateway_report(
                txn,
                fx,
                &h.cashier,
                &order.id,
                dec!(3.00),
                PaymentMethod::Card,
                "gw-9",
                GatewayOutcome::Failed,
            )
        })
        .unwrap();

    assert_eq!(payment.status, PaymentStatus::Failed);
    let order = OrdersManager::get(&h.fixture.storage, &order.id).unwrap();
    assert_eq!(order.paid, Decimal::ZERO);
    let ledger = ShiftManager::get_ledger(&h.fixture.storage, &h.shift.id).unwrap();
    assert_eq!(ledger.card_total, Decimal::ZERO);
    assert!(h.order_actions(&order.id).contains(&AuditAction::PaymentFailed));
    assert!(matches!(h.checkout(&order.id), Err(AppError::InvalidState(_))));
}

#[test]
fn test_gateway_success_after_failed_attempt_is_applied() {
    let h = Harness::new();
    let order = h.ready_order();
    let report = |h: &Harness, outcome: GatewayOutcome| {
        h.run(|txn, fx, h| {
            h.orders.apply_gateway_report(
                txn,
                fx,
                &h.cashier,
                &order.id,
                dec!(3.00),
                PaymentMethod::Card,
                "gw-retry",
                outcome,
            )
        })
        .unwrap()
    };

    let failed = report(&h, GatewayOutcome::Failed);
    assert_eq!(failed.status, PaymentStatus::Failed);
    assert_eq!(report(&h, GatewayOutcome::Failed).id, failed.id);

    let completed = report(&h, GatewayOutcome::Completed);
    assert_eq!(completed.status, PaymentStatus::Completed);
    assert_ne!(completed.id, failed.id);

    // Late duplicates of either kind resolve to the completed payment
    assert_eq!(report(&h, GatewayOutcome::Completed).id, completed.id);
    assert_eq!(report(&h, GatewayOutcome::Failed).id, completed.id);

    let stored = OrdersManager::get(&h.fixture.storage, &order.id).unwrap();
    assert_eq!(stored.paid, dec!(3.00));
    let ledger = ShiftManager::get_ledger(&h.fixture.storage, &h.shift.id).unwrap();
    assert_eq!(ledger.card_total, dec!(3.00));
    assert_eq!(OrdersManager::payments_for(&h.fixture.storage, &order.id).unwrap().len(), 2);
    h.checkout(&order.id).unwrap();
}

#[test]
fn test_events_carry_shift_and_table_scopes() {
    let h = Harness::new();
    let (result, fx) =
        h.run_fx(|txn, fx, h| h.orders.create(txn, fx, &h.cashier, OrderType::DineIn, Some("T9")));
    let order = result.unwrap();

    let created = fx
        .events()
        .iter()
        .find(|e| matches!(e.event, EdgeEvent::OrderCreated { .. }))
        .unwrap();
    assert!(created.matches(&EventScope::Shift(h.shift.id.clone())));
    assert!(created.matches(&EventScope::Table("T9".into())));
    assert_eq!(fx.audit_count(), 1);
    assert_eq!(order.table_id.as_deref(), Some("T9"));
}

#[test]
fn test_display_numbers_increase() {
    let h = Harness::new();
    let a = h.takeaway();
    let b = h.takeaway();
    assert_eq!(b.display_number, a.display_number + 1);
}
