//! A real edge-server core behind an in-process transport, with failure knobs
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use edge_client::{CommandTransport, OneshotTransport, SyncConfig, SyncEngine, TransportError};
use edge_server::{Config, ServerState};
use rust_decimal_macros::dec;
use shared::command::{CommandEnvelope, CommandOutcome, ServerCommand};
use rust_decimal::Decimal;
use shared::models::{Order, OrderItemInput, OrderType, PaymentMethod, Product, Role, Staff, StaffCreate, Terminal};
use tokio::sync::Semaphore;

pub const TERMINAL: &str = "POS-7";

pub struct Edge {
    pub state: ServerState,
    pub cashier: Staff,
}

/// In-memory edge node with a catalog and an open shift for the cashier
pub fn edge() -> Edge {
    let state = ServerState::in_memory(Config::for_work_dir("unused")).unwrap();
    for (id, price) in [("burger", dec!(12.50)), ("fries", dec!(4.00))] {
        edge_server::orders::Catalog::upsert(
            &state.storage,
            &Product {
                id: id.into(),
                name: id.into(),
                price,
                sizes: vec![],
                modifiers: vec![],
            },
        )
        .unwrap();
    }
    let cashier = state
        .staff
        .create(StaffCreate {
            username: "cash".into(),
            display_name: "Cash".into(),
            role: Role::Cashier,
            password: None,
        })
        .unwrap();
    let terminal = state.terminals.register(TERMINAL).unwrap();
    state
        .gateway
        .execute(CommandEnvelope::new(
            &cashier.id,
            ServerCommand::StartShift {
                terminal_id: terminal.id,
            },
        ))
        .unwrap();
    Edge { state, cashier }
}

impl Edge {
    pub fn order(&self, id: &str) -> Order {
        edge_server::OrdersManager::get(&self.state.storage, id).unwrap()
    }

    pub fn order_count(&self) -> usize {
        edge_server::OrdersManager::all(&self.state.storage).unwrap().len()
    }

    pub fn create_takeaway(&self) -> CommandEnvelope {
        CommandEnvelope::new(
            &self.cashier.id,
            ServerCommand::CreateOrder {
                order_type: OrderType::Takeaway,
                table_id: None,
            },
        )
    }

    pub fn add(&self, order_id: &str, product: &str) -> CommandEnvelope {
        CommandEnvelope::new(
            &self.cashier.id,
            ServerCommand::AddItem {
                item: OrderItemInput {
                    product_id: product.into(),
                    quantity: 1,
                    size: None,
                    modifiers: vec![],
                    notes: None,
                },
            },
        )
        .on(order_id)
    }

    pub fn pay(&self, order_id: &str, amount: Decimal) -> CommandEnvelope {
        CommandEnvelope::new(
            &self.cashier.id,
            ServerCommand::RecordPayment {
                amount,
                method: PaymentMethod::Cash,
            },
        )
        .on(order_id)
    }

    pub fn submit(&self, order_id: &str) -> CommandEnvelope {
        CommandEnvelope::new(&self.cashier.id, ServerCommand::SubmitToKitchen).on(order_id)
    }

    /// Create an order directly on the server
    pub fn seed_order(&self) -> Order {
        match self.state.gateway.execute(self.create_takeaway()).unwrap() {
            CommandOutcome::Order(o) => o,
            other => panic!("expected order, got {other:?}"),
        }
    }
}

/// Oneshot transport with switches for outages, lost responses and pauses
#[derive(Debug, Clone)]
pub struct TestTransport {
    inner: OneshotTransport,
    /// Every call fails before reaching the server
    pub down: Arc<AtomicBool>,
    /// The next submit reaches the server but its response is lost
    pub lose_next_response: Arc<AtomicBool>,
    /// Submits started so far
    pub submits: Arc<AtomicUsize>,
    /// When set, each submit takes one permit first
    pub gate: Option<Arc<Semaphore>>,
    /// Request ids the server answers with a 500
    pub failing: Arc<Mutex<Vec<String>>>,
}

impl TestTransport {
    pub fn new(state: &ServerState) -> Self {
        Self {
            inner: OneshotTransport::new(edge_server::api::router(state.clone())),
            down: Arc::new(AtomicBool::new(false)),
            lose_next_response: Arc::new(AtomicBool::new(false)),
            submits: Arc::new(AtomicUsize::new(0)),
            gate: None,
            failing: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn fail_with_500(&self, client_request_id: &str) {
        self.failing.lock().unwrap().push(client_request_id.to_string());
    }

    pub fn gated(mut self, permits: usize) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(permits)));
        self
    }
}

#[async_trait]
impl CommandTransport for TestTransport {
    async fn register_terminal(&self, code: &str) -> Result<Terminal, TransportError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(TransportError::Transient("connection refused".into()));
        }
        self.inner.register_terminal(code).await
    }

    async fn submit(&self, envelope: &CommandEnvelope) -> Result<CommandOutcome, TransportError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| TransportError::Transient(e.to_string()))?
                .forget();
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(TransportError::Transient("connection refused".into()));
        }
        let failing = envelope
            .client_request_id
            .as_ref()
            .is_some_and(|id| self.failing.lock().unwrap().contains(id));
        if failing {
            return Err(TransportError::Server {
                status: 500,
                message: "Blocking task failed".into(),
            });
        }
        let result = self.inner.submit(envelope).await;
        if self.lose_next_response.swap(false, Ordering::SeqCst) {
            return Err(TransportError::Transient("connection reset before response".into()));
        }
        result
    }
}

pub fn config(queue_path: impl Into<std::path::PathBuf>) -> SyncConfig {
    SyncConfig::new("http://edge.local", TERMINAL, queue_path)
}

pub fn engine(edge: &Edge) -> (SyncEngine<TestTransport>, TestTransport) {
    let transport = TestTransport::new(&edge.state);
    let engine = SyncEngine::with_queue(
        config("unused.redb"),
        edge_client::OfflineQueue::open_in_memory().unwrap(),
        transport.clone(),
    );
    (engine, transport)
}
