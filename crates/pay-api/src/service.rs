//! # Payment Service
//!
//! Lazily wires the orchestrator to Postgres and Stripe on first use and
//! exposes it to handlers through [`PaymentService`], which owns logging.
//!
//! Missing configuration does not stop the server from starting. The accessor
//! installs [`UnconfiguredPayments`] instead, and every operation then fails
//! with `NotConfigured`. Only configuration is checked while building; an
//! unreachable database surfaces per request as `DatabaseError`, and
//! migrations run separately through [`PaymentService::migrate`].

use crate::errors::{error_policy, StatusClass};
use async_trait::async_trait;
use pay_core::{
    CreatePaymentRequest, CreatedPayment, ErrorCode, Payment, PaymentError, PaymentFilter,
    PaymentOperations, PaymentOrchestrator, PaymentResult, PaymentStatus, SharedOperations,
    WebhookOutcome,
};
use pay_postgres::PgPaymentStore;
use pay_stripe::{StripeConfig, StripeGateway};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

/// Settings the payment service needs
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub database_url: Option<String>,
    pub stripe: Option<StripeConfig>,
    pub run_migrations: bool,
}

impl ServiceConfig {
    /// Load from environment variables. Anything missing stays `None`.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.is_empty());

        let stripe = match StripeConfig::from_env() {
            Ok(config) => Some(config),
            Err(e) => {
                warn!("Stripe is not configured: {}", e);
                None
            }
        };

        let run_migrations = std::env::var("RUN_MIGRATIONS")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            database_url,
            stripe,
            run_migrations,
        }
    }

    /// Signing secret for incoming webhooks, empty when Stripe is absent
    pub fn webhook_secret(&self) -> &str {
        self.stripe
            .as_ref()
            .map(|s| s.webhook_secret.as_str())
            .unwrap_or_default()
    }
}

/// Stand-in used when the service cannot be built
#[derive(Debug, Clone)]
pub struct UnconfiguredPayments {
    reason: String,
}

impl UnconfiguredPayments {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> PaymentError {
        PaymentError::new(
            ErrorCode::NotConfigured,
            format!("payment service not configured: {}", self.reason),
        )
    }
}

#[async_trait]
impl PaymentOperations for UnconfiguredPayments {
    async fn create_payment(&self, _request: CreatePaymentRequest) -> PaymentResult<CreatedPayment> {
        Err(self.error())
    }

    async fn confirm_payment(&self, _order_id: &str, _user_id: &str) -> PaymentResult<PaymentStatus> {
        Err(self.error())
    }

    async fn refund_payment(&self, _order_id: &str, _user_id: &str) -> PaymentResult<()> {
        Err(self.error())
    }

    async fn handle_webhook(
        &self,
        _payload: &[u8],
        _signature: &str,
        _secret: &str,
    ) -> PaymentResult<WebhookOutcome> {
        Err(self.error())
    }

    async fn list_payments(&self, _filter: &PaymentFilter) -> PaymentResult<Vec<Payment>> {
        Err(self.error())
    }
}

/// Builds the orchestrator once, on first use
pub struct PaymentServiceAccessor {
    config: ServiceConfig,
    cell: OnceCell<SharedOperations>,
}

impl PaymentServiceAccessor {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            cell: OnceCell::new(),
        }
    }

    /// Accessor that hands out `operations` without building anything
    pub fn with_operations(operations: SharedOperations, config: ServiceConfig) -> Self {
        Self {
            config,
            cell: OnceCell::new_with(Some(operations)),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Returns the shared operations handle, building it on the first call.
    /// Concurrent first callers wait for the same build.
    pub async fn get(&self) -> SharedOperations {
        self.cell
            .get_or_init(|| async {
                match self.try_build().await {
                    Ok(operations) => {
                        info!("Payment service initialized");
                        operations
                    }
                    Err(reason) => {
                        error!(%reason, "Payment service unavailable");
                        Arc::new(UnconfiguredPayments::new(reason)) as SharedOperations
                    }
                }
            })
            .await
            .clone()
    }

    /// Apply pending migrations when `run_migrations` is set and a database
    /// is configured. Safe to call again after a failure.
    pub async fn migrate(&self) -> PaymentResult<()> {
        if !self.config.run_migrations {
            return Ok(());
        }
        let Some(database_url) = self.config.database_url.as_deref() else {
            return Ok(());
        };

        let store = PgPaymentStore::connect_lazy(database_url).map_err(PaymentError::database)?;
        store.migrate().await.map_err(PaymentError::database)
    }

    async fn try_build(&self) -> Result<SharedOperations, String> {
        let database_url = self
            .config
            .database_url
            .as_deref()
            .ok_or_else(|| "DATABASE_URL not set".to_string())?;
        let stripe = self
            .config
            .stripe
            .clone()
            .ok_or_else(|| "Stripe credentials not set".to_string())?;

        let store = PgPaymentStore::connect_lazy(database_url)
            .map_err(|e| format!("invalid database url: {}", e))?;
        let gateway =
            StripeGateway::new(stripe).map_err(|e| format!("stripe client: {}", e))?;

        Ok(Arc::new(PaymentOrchestrator::new(
            Arc::new(store),
            Arc::new(gateway),
        )))
    }
}

/// What handlers call. Logs every failure once, with its cause chain.
#[derive(Clone)]
pub struct PaymentService {
    accessor: Arc<PaymentServiceAccessor>,
}

impl PaymentService {
    pub fn new(accessor: PaymentServiceAccessor) -> Self {
        Self {
            accessor: Arc::new(accessor),
        }
    }

    pub fn from_env() -> Self {
        Self::new(PaymentServiceAccessor::new(ServiceConfig::from_env()))
    }

    /// Run database migrations if enabled. Called once at startup, before
    /// the server accepts requests.
    pub async fn migrate(&self) -> PaymentResult<()> {
        self.accessor.migrate().await
    }

    /// Build the underlying service now instead of on the first request.
    pub async fn warm_up(&self) {
        self.accessor.get().await;
    }

    pub async fn create_payment(
        &self,
        request: CreatePaymentRequest,
    ) -> PaymentResult<CreatedPayment> {
        let order_id = request.order_id.clone();
        let created = self
            .accessor
            .get()
            .await
            .create_payment(request)
            .await
            .map_err(|e| log_failure("create_payment", e))?;

        info!(
            order_id = %order_id,
            payment_id = %created.payment_id,
            reference = %created.provider_reference,
            "Payment created"
        );
        Ok(created)
    }

    pub async fn confirm_payment(&self, order_id: &str, user_id: &str) -> PaymentResult<PaymentStatus> {
        let status = self
            .accessor
            .get()
            .await
            .confirm_payment(order_id, user_id)
            .await
            .map_err(|e| log_failure("confirm_payment", e))?;

        info!(order_id, %status, "Payment confirmed");
        Ok(status)
    }

    pub async fn refund_payment(&self, order_id: &str, user_id: &str) -> PaymentResult<()> {
        self.accessor
            .get()
            .await
            .refund_payment(order_id, user_id)
            .await
            .map_err(|e| log_failure("refund_payment", e))?;

        info!(order_id, "Payment refunded");
        Ok(())
    }

    pub async fn handle_webhook(&self, payload: &[u8], signature: &str) -> PaymentResult<WebhookOutcome> {
        let secret = self.accessor.config().webhook_secret();
        let outcome = self
            .accessor
            .get()
            .await
            .handle_webhook(payload, signature, secret)
            .await
            .map_err(|e| log_failure("handle_webhook", e))?;

        match &outcome {
            WebhookOutcome::Applied { reference, status } => {
                info!(%reference, %status, "Webhook applied")
            }
            WebhookOutcome::Unmatched { reference } => {
                warn!(%reference, "Webhook for unknown payment")
            }
            other => info!(?other, "Webhook received"),
        }
        Ok(outcome)
    }

    pub async fn list_payments(&self, filter: &PaymentFilter) -> PaymentResult<Vec<Payment>> {
        self.accessor
            .get()
            .await
            .list_payments(filter)
            .await
            .map_err(|e| log_failure("list_payments", e))
    }
}

fn log_failure(operation: &'static str, err: PaymentError) -> PaymentError {
    let code = err.code();
    match error_policy(code).class {
        StatusClass::Internal => error!(operation, error_code = %code, "{}", err.detailed()),
        _ => warn!(operation, error_code = %code, "{}", err.detailed()),
    }
    err
}
