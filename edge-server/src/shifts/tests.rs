use super::*;
use crate::testing::Fixture;
use rust_decimal_macros::dec;

fn manager() -> ShiftManager {
    ShiftManager::new(dec!(5.00))
}

fn start(fixture: &Fixture, staff: &Staff, terminal_id: &str) -> Shift {
    let txn = fixture.storage.begin_write().unwrap();
    let mut fx = Effects::new();
    let shift = manager().start(&txn, &mut fx, staff, terminal_id).unwrap();
    txn.commit().unwrap();
    shift
}

fn close(
    fixture: &Fixture,
    actor: &Staff,
    shift_id: &str,
    counted: Decimal,
    approver: Option<&str>,
) -> AppResult<Shift> {
    let txn = fixture.storage.begin_write().unwrap();
    let mut fx = Effects::new();
    let result = manager().close(&txn, &mut fx, &fixture.staff, actor, shift_id, counted, approver);
    if result.is_ok() {
        txn.commit().unwrap();
    }
    result
}

fn in_txn(fixture: &Fixture, f: impl FnOnce(&WriteTransaction, &mut Effects)) {
    let txn = fixture.storage.begin_write().unwrap();
    let mut fx = Effects::new();
    f(&txn, &mut fx);
    txn.commit().unwrap();
}

#[test]
fn test_one_active_shift_per_staff() {
    let fixture = Fixture::new();
    let cashier = fixture.staff("cash", Role::Cashier);
    let t1 = fixture.terminal("POS-1");
    let t2 = fixture.terminal("POS-2");
    start(&fixture, &cashier, &t1.id);

    let txn = fixture.storage.begin_write().unwrap();
    let mut fx = Effects::new();
    let err = manager().start(&txn, &mut fx, &cashier, &t2.id).unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[test]
fn test_start_requires_registered_terminal() {
    let fixture = Fixture::new();
    let cashier = fixture.staff("cash", Role::Cashier);
    let txn = fixture.storage.begin_write().unwrap();
    let mut fx = Effects::new();
    let err = manager().start(&txn, &mut fx, &cashier, "unknown").unwrap_err();
    assert!(matches!(err, AppError::NotFound { entity: "terminal", .. }));
}

#[test]
fn test_close_arithmetic_within_threshold() {
    let fixture = Fixture::new();
    let cashier = fixture.staff("cash", Role::Cashier);
    let t = fixture.terminal("POS-1");
    let shift = start(&fixture, &cashier, &t.id);

    in_txn(&fixture, |txn, fx| {
        let m = manager();
        m.record_payment(txn, fx, &shift.id, PaymentMethod::Cash, dec!(40.00)).unwrap();
        m.record_payment(txn, fx, &shift.id, PaymentMethod::Card, dec!(99.00)).unwrap();
        m.record_cash_drop(txn, fx, &cashier, &shift.id, dec!(15.00)).unwrap();
        m.record_cash_adjustment(txn, fx, &cashier, &shift.id, dec!(-2.50), "coin miscount").unwrap();
    });

    // expected = 40 - 15 - 2.50 = 22.50; counted 20.00 → variance -2.50
    let closed = close(&fixture, &cashier, &shift.id, dec!(20.00), None).unwrap();
    assert_eq!(closed.expected_cash, Some(dec!(22.50)));
    assert_eq!(closed.variance, Some(dec!(-2.50)));
    assert!(closed.ended_at.is_some());
    assert_eq!(closed.approved_by, None);

    // staff may start a new shift afterwards
    start(&fixture, &cashier, &t.id);
}

#[test]
fn test_variance_over_threshold_requires_manager() {
    let fixture = Fixture::new();
    let cashier = fixture.staff("cash", Role::Cashier);
    let waiter = fixture.staff("wait", Role::Waiter);
    let boss = fixture.staff("boss", Role::Manager);
    let t = fixture.terminal("POS-1");
    let shift = start(&fixture, &cashier, &t.id);

    // expected 0, counted 10 → variance 10 > 5
    let err = close(&fixture, &cashier, &shift.id, dec!(10.00), None).unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = close(&fixture, &cashier, &shift.id, dec!(10.00), Some(&waiter.id)).unwrap_err();
    assert!(matches!(err, AppError::Unauthorized { .. }));

    let err = close(&fixture, &cashier, &shift.id, dec!(10.00), Some("ghost")).unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));

    // shift still open after rejected closes
    assert!(ShiftManager::get_shift(&fixture.storage, &shift.id).unwrap().is_active());

    let closed = close(&fixture, &cashier, &shift.id, dec!(10.00), Some(&boss.id)).unwrap();
    assert_eq!(closed.approved_by, Some(boss.id.clone()));
    assert_eq!(closed.variance, Some(dec!(10.00)));
}

#[test]
fn test_variance_exactly_at_threshold_needs_no_approver() {
    let fixture = Fixture::new();
    let cashier = fixture.staff("cash", Role::Cashier);
    let t = fixture.terminal("POS-1");
    let shift = start(&fixture, &cashier, &t.id);
    assert!(close(&fixture, &cashier, &shift.id, dec!(5.00), None).is_ok());
}

#[test]
fn test_approver_ignored_when_variance_within_threshold() {
    let fixture = Fixture::new();
    let cashier = fixture.staff("cash", Role::Cashier);
    let waiter = fixture.staff("wait", Role::Waiter);
    let t = fixture.terminal("POS-1");
    let shift = start(&fixture, &cashier, &t.id);

    // variance 1 needs no approval, so a non-manager or unknown approver is not consulted
    let closed = close(&fixture, &cashier, &shift.id, dec!(1.00), Some(&waiter.id)).unwrap();
    assert_eq!(closed.approved_by, None);
    assert_eq!(closed.variance, Some(dec!(1.00)));

    let other = fixture.staff("other", Role::Cashier);
    let shift = start(&fixture, &other, &t.id);
    assert!(close(&fixture, &other, &shift.id, dec!(0), Some("ghost")).is_ok());
}

#[test]
fn test_cash_amounts_bounded() {
    use crate::utils::validation::MAX_AMOUNT;

    let fixture = Fixture::new();
    let cashier = fixture.staff("cash", Role::Cashier);
    let t = fixture.terminal("POS-1");
    let shift = start(&fixture, &cashier, &t.id);

    let txn = fixture.storage.begin_write().unwrap();
    let mut fx = Effects::new();
    let m = manager();
    assert!(matches!(
        m.record_cash_drop(&txn, &mut fx, &cashier, &shift.id, Decimal::MAX),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        m.record_cash_adjustment(&txn, &mut fx, &cashier, &shift.id, -MAX_AMOUNT - dec!(1), "x"),
        Err(AppError::Validation(_))
    ));
    m.record_cash_adjustment(&txn, &mut fx, &cashier, &shift.id, -MAX_AMOUNT, "float counted twice")
        .unwrap();
    drop(txn);

    let err = close(&fixture, &cashier, &shift.id, Decimal::MAX, None).unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(ShiftManager::get_shift(&fixture.storage, &shift.id).unwrap().is_active());
}

#[test]
fn test_close_blocked_by_open_orders() {
    let fixture = Fixture::new();
    let cashier = fixture.staff("cash", Role::Cashier);
    let t = fixture.terminal("POS-1");
    let shift = start(&fixture, &cashier, &t.id);

    let txn = fixture.storage.begin_write().unwrap();
    ShiftManager::track_open_order(&txn, &shift.id, "o1").unwrap();
    txn.commit().unwrap();

    let err = close(&fixture, &cashier, &shift.id, dec!(0), None).unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let txn = fixture.storage.begin_write().unwrap();
    ShiftManager::untrack_open_order(&txn, &shift.id, "o1").unwrap();
    txn.commit().unwrap();
    assert!(close(&fixture, &cashier, &shift.id, dec!(0), None).is_ok());
}

#[test]
fn test_only_owner_or_manager_closes() {
    let fixture = Fixture::new();
    let cashier = fixture.staff("cash", Role::Cashier);
    let other = fixture.staff("other", Role::Cashier);
    let admin = fixture.staff("root", Role::Admin);
    let t = fixture.terminal("POS-1");
    let shift = start(&fixture, &cashier, &t.id);

    let err = close(&fixture, &other, &shift.id, dec!(0), None).unwrap_err();
    assert!(matches!(err, AppError::Unauthorized { .. }));
    let closed = close(&fixture, &admin, &shift.id, dec!(0), None).unwrap();
    assert_eq!(closed.closed_by, Some(admin.id));
}

#[test]
fn test_ledger_writes_rejected_on_closed_shift() {
    let fixture = Fixture::new();
    let cashier = fixture.staff("cash", Role::Cashier);
    let t = fixture.terminal("POS-1");
    let shift = start(&fixture, &cashier, &t.id);
    close(&fixture, &cashier, &shift.id, dec!(0), None).unwrap();

    let txn = fixture.storage.begin_write().unwrap();
    let mut fx = Effects::new();
    let m = manager();
    assert!(matches!(
        m.record_cash_drop(&txn, &mut fx, &cashier, &shift.id, dec!(1)),
        Err(AppError::InvalidState(_))
    ));
    assert!(matches!(
        m.record_cash_adjustment(&txn, &mut fx, &cashier, &shift.id, dec!(0), "x"),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        m.record_cash_drop(&txn, &mut fx, &cashier, &shift.id, dec!(-1)),
        Err(AppError::Validation(_))
    ));
}
