//! HTTP API server with observability for the order purchase saga.
//!
//! Provides REST endpoints for placing, reading, and cancelling orders, with
//! structured logging (tracing) and Prometheus metrics. [`Runtime`] wires the
//! saga listener and the simulated collaborators onto an in-process bus and
//! adds the payment balance lookup to the router.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::{DomainEventPublisher, Money, OrderService};
use messaging::{
    BusDomainEventPublisher, BusInventoryCommandSender, BusPaymentCommandSender,
    InMemoryMessageBus, InventorySimulator, ListenerHandle, PaymentSimulator, SagaListener,
};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::OrderStore;
use saga::{SagaEventConsumer, SagaOrchestrator};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use error::StartupError;
use routes::orders::AppState;

/// Publisher used by the running service: `ORDER_CREATED` goes to the bus.
pub type BusPublisher = BusDomainEventPublisher<InMemoryMessageBus>;

/// Orchestrator wired to the bus adapters.
pub type BusOrchestrator<S> = SagaOrchestrator<
    S,
    BusPublisher,
    BusPaymentCommandSender<InMemoryMessageBus>,
    BusInventoryCommandSender<InMemoryMessageBus>,
>;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, P>(state: Arc<AppState<S, P>>, metrics_handle: PrometheusHandle) -> Router
where
    S: OrderStore + 'static,
    P: DomainEventPublisher + 'static,
{
    with_layers(order_routes(state, metrics_handle))
}

fn order_routes<S, P>(state: Arc<AppState<S, P>>, metrics_handle: PrometheusHandle) -> Router
where
    S: OrderStore + 'static,
    P: DomainEventPublisher + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::ops::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::ops::health))
        .route(
            "/orders",
            post(routes::orders::create::<S, P>).get(routes::orders::list::<S, P>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S, P>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S, P>))
        .with_state(state)
        .merge(metrics_router)
}

fn with_layers(router: Router) -> Router {
    router
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// The order service with its saga running in the background.
pub struct Runtime<S: OrderStore + Clone + 'static> {
    pub state: Arc<AppState<S, BusPublisher>>,
    pub bus: InMemoryMessageBus,
    pub payment: Option<PaymentSimulator<InMemoryMessageBus>>,
    pub inventory: Option<InventorySimulator<InMemoryMessageBus>>,
    handles: Vec<ListenerHandle>,
}

impl<S: OrderStore + Clone + 'static> Runtime<S> {
    /// Starts the saga listener and, when configured, the collaborator
    /// simulators. Every subscription is in place before this returns.
    pub async fn start(store: S, config: &Config) -> Result<Self, StartupError> {
        let bus = InMemoryMessageBus::new();

        let orchestrator: BusOrchestrator<S> = SagaOrchestrator::new(
            store.clone(),
            BusDomainEventPublisher::new(bus.clone()),
            BusPaymentCommandSender::new(bus.clone()),
            BusInventoryCommandSender::new(bus.clone()),
        );
        let listener = SagaListener::new(SagaEventConsumer::new(orchestrator));
        let mut handles = vec![listener.spawn(&bus).await?];

        let (payment, inventory) = if config.simulate_collaborators {
            let balance = Money::from_decimal(config.simulator_initial_balance)
                .map_err(|e| StartupError::Config(e.to_string()))?;
            let payment = PaymentSimulator::new(bus.clone(), balance);
            let inventory = InventorySimulator::new(bus.clone(), config.simulator_initial_stock);
            handles.push(payment.clone().spawn().await?);
            handles.push(inventory.clone().spawn().await?);
            tracing::info!(
                %balance,
                stock = config.simulator_initial_stock,
                "Collaborator simulators started"
            );
            (Some(payment), Some(inventory))
        } else {
            tracing::warn!("Collaborator simulators disabled, saga commands will go unanswered");
            (None, None)
        };

        let state = Arc::new(AppState {
            orders: OrderService::new(store, BusDomainEventPublisher::new(bus.clone())),
        });

        Ok(Self {
            state,
            bus,
            payment,
            inventory,
            handles,
        })
    }

    /// The full router: order routes plus the payment balance lookup.
    pub fn router(&self, metrics_handle: PrometheusHandle) -> Router {
        let payments = Router::new()
            .route(
                "/payments/balance/{user_id}",
                get(routes::payments::balance),
            )
            .with_state(self.payment.clone());

        with_layers(order_routes(self.state.clone(), metrics_handle).merge(payments))
    }

    /// Stops background tasks after their in-flight message.
    pub async fn shutdown(self) {
        for handle in self.handles {
            handle.shutdown().await;
        }
    }
}
