// Nomad context: the fully-initialized collaborators and configuration,
// created once at startup and shared across request handlers as `Arc<NomadContext>`.

use std::sync::Arc;

use nomad_core::db::adapter::Adapter;
use nomad_core::db::schema::NomadSchema;
use nomad_core::error::Result;
use nomad_core::notify::{NotificationDispatcher, Notifier};
use nomad_core::options::NomadOptions;
use nomad_core::utils::time::{Clock, SystemClock};
use nomad_paystack::{PaymentGateway, PaystackOptions};

use crate::checkin::code::{CodeSource, RandomCodeSource};
use crate::internal_adapter::InternalAdapter;

pub struct NomadContext {
    pub options: NomadOptions,

    /// Gateway configuration, passed to reconciliation explicitly.
    pub paystack: PaystackOptions,

    pub adapter: Arc<dyn Adapter>,

    pub gateway: Arc<dyn PaymentGateway>,

    pub notifications: NotificationDispatcher,

    pub clock: Arc<dyn Clock>,

    /// Candidate check-in codes.
    pub codes: Arc<dyn CodeSource>,
}

// Manual Debug impl because the collaborator trait objects are not Debug
impl std::fmt::Debug for NomadContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NomadContext")
            .field("options", &self.options)
            .field("paystack", &self.paystack)
            .field("adapter", &self.adapter)
            .field("notifications", &self.notifications)
            .field("clock", &self.clock)
            .finish()
    }
}

impl NomadContext {
    pub fn builder(adapter: Arc<dyn Adapter>, gateway: Arc<dyn PaymentGateway>) -> NomadContextBuilder {
        NomadContextBuilder {
            options: NomadOptions::default(),
            paystack: PaystackOptions::new(""),
            adapter,
            gateway,
            notifier: None,
            clock: None,
            codes: None,
        }
    }

    /// Typed storage over the base adapter (no transaction).
    pub fn store(&self) -> InternalAdapter<'_> {
        InternalAdapter::new(self.adapter.as_ref())
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    pub fn today(&self) -> chrono::NaiveDate {
        self.options.calendar.today(self.clock.as_ref())
    }
}

pub struct NomadContextBuilder {
    options: NomadOptions,
    paystack: PaystackOptions,
    adapter: Arc<dyn Adapter>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Option<Arc<dyn Notifier>>,
    clock: Option<Arc<dyn Clock>>,
    codes: Option<Arc<dyn CodeSource>>,
}

impl NomadContextBuilder {
    pub fn options(mut self, options: NomadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn paystack(mut self, paystack: PaystackOptions) -> Self {
        self.paystack = paystack;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn code_source(mut self, codes: Arc<dyn CodeSource>) -> Self {
        self.codes = Some(codes);
        self
    }

    /// Validate options, register the schema with the adapter, and freeze
    /// everything into a shared context.
    pub async fn build(self) -> Result<Arc<NomadContext>> {
        self.options.validate()?;
        let status = self.adapter.create_schema(&NomadSchema::default()).await?;
        tracing::debug!(?status, "schema registered");

        let notifications = match self.notifier {
            Some(n) => NotificationDispatcher::new(n, self.options.notifications.clone()),
            None => NotificationDispatcher::disabled(),
        };
        let codes = self.codes.unwrap_or_else(|| {
            Arc::new(RandomCodeSource::new(self.options.token.code_min, self.options.token.code_max))
        });

        Ok(Arc::new(NomadContext {
            options: self.options,
            paystack: self.paystack,
            adapter: self.adapter,
            gateway: self.gateway,
            notifications,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            codes,
        }))
    }
}
