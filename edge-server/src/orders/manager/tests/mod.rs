use super::*;
use crate::audit::AuditStorage;
use shared::command::GatewayOutcome;
use crate::testing::Fixture;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use shared::models::{Payment, PaymentMethod, PaymentStatus, Product, ProductModifier, ProductSize, Role, Shift};

mod test_flows;

/// One open shift, one seeded catalog
struct Harness {
    fixture: Fixture,
    orders: OrdersManager,
    cashier: Staff,
    manager: Staff,
    shift: Shift,
}

impl Harness {
    fn new() -> Self {
        let fixture = Fixture::new();
        let cashier = fixture.staff("cash", Role::Cashier);
        let manager = fixture.staff("boss", Role::Manager);
        let terminal = fixture.terminal("POS-1");
        let orders = OrdersManager::new(ShiftManager::new(dec!(5.00)));

        Catalog::upsert(
            &fixture.storage,
            &Product {
                id: "latte".into(),
                name: "Latte".into(),
                price: dec!(4.50),
                sizes: vec![ProductSize {
                    name: "large".into(),
                    price_delta: dec!(0.50),
                }],
                modifiers: vec![ProductModifier {
                    name: "oat".into(),
                    price: dec!(0.60),
                }],
            },
        )
        .unwrap();
        Catalog::upsert(
            &fixture.storage,
            &Product {
                id: "bagel".into(),
                name: "Bagel".into(),
                price: dec!(3.00),
                sizes: vec![],
                modifiers: vec![],
            },
        )
        .unwrap();

        let txn = fixture.storage.begin_write().unwrap();
        let shift = orders
            .shifts()
            .start(&txn, &mut Effects::new(), &cashier, &terminal.id)
            .unwrap();
        txn.commit().unwrap();

        Self {
            fixture,
            orders,
            cashier,
            manager,
            shift,
        }
    }

    /// Run one command in its own transaction; commit only on success
    fn run<T>(
        &self,
        op: impl FnOnce(&WriteTransaction, &mut Effects, &Self) -> AppResult<T>,
    ) -> AppResult<T> {
        self.run_fx(op).0
    }

    fn run_fx<T>(
        &self,
        op: impl FnOnce(&WriteTransaction, &mut Effects, &Self) -> AppResult<T>,
    ) -> (AppResult<T>, Effects) {
        let txn = self.fixture.storage.begin_write().unwrap();
        let mut fx = Effects::new();
        let result = op(&txn, &mut fx, self);
        if result.is_ok() {
            txn.commit().unwrap();
        }
        (result, fx)
    }

    fn takeaway(&self) -> Order {
        self.run(|txn, fx, h| h.orders.create(txn, fx, &h.cashier, OrderType::Takeaway, None))
            .unwrap()
    }

    fn dine_in(&self, table_id: &str) -> AppResult<Order> {
        self.run(|txn, fx, h| h.orders.create(txn, fx, &h.cashier, OrderType::DineIn, Some(table_id)))
    }

    fn add(&self, order_id: &str, product_id: &str, quantity: u32) -> AppResult<Order> {
        let input = item(product_id, quantity);
        self.run(|txn, fx, h| h.orders.add_item(txn, fx, order_id, &input))
    }

    fn submit(&self, order_id: &str) -> AppResult<Order> {
        self.run(|txn, fx, h| h.orders.submit_to_kitchen(txn, fx, &h.cashier, order_id))
    }

    fn ready(&self, order_id: &str) -> AppResult<Order> {
        self.run(|txn, fx, h| h.orders.mark_ready(txn, fx, &h.cashier, order_id))
    }

    fn pay(&self, order_id: &str, amount: Decimal) -> AppResult<Payment> {
        self.run(|txn, fx, h| {
            h.orders
                .record_payment(txn, fx, &h.cashier, order_id, amount, PaymentMethod::Cash)
        })
    }

    fn checkout(&self, order_id: &str) -> AppResult<Order> {
        self.run(|txn, fx, h| h.orders.checkout(txn, fx, &h.cashier, order_id))
    }

    /// Order with one bagel, submitted and ready
    fn ready_order(&self) -> Order {
        let order = self.takeaway();
        self.add(&order.id, "bagel", 1).unwrap();
        self.submit(&order.id).unwrap();
        self.ready(&order.id).unwrap()
    }

    fn audit(&self) -> AuditStorage {
        let audit = AuditStorage::new(self.fixture.storage.clone());
        audit.drain_outbox().unwrap();
        audit
    }

    fn order_actions(&self, order_id: &str) -> Vec<AuditAction> {
        self.audit()
            .entries_for("order", order_id)
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect()
    }
}

fn item(product_id: &str, quantity: u32) -> OrderItemInput {
    OrderItemInput {
        product_id: product_id.into(),
        quantity,
        size: None,
        modifiers: vec![],
        notes: None,
    }
}
