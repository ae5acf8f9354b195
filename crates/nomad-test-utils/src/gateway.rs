// Scripted payment gateway.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use nomad_paystack::{
    GatewayTransaction, InitializeTransactionRequest, InitializedTransaction, PaymentGateway,
    PaystackError, TransactionMetadata, TransactionStatus,
};

/// A unique, gateway-shaped reference.
pub fn random_reference() -> String {
    format!("T{}", uuid::Uuid::new_v4().simple())
}

/// A successful transaction paid by `email`, tagged with `plan_id` in metadata.
pub fn success_transaction(reference: &str, email: &str, plan_id: Option<&str>) -> GatewayTransaction {
    GatewayTransaction {
        reference: reference.to_string(),
        status: TransactionStatus::Success,
        customer_email: email.to_lowercase(),
        amount: None,
        metadata: TransactionMetadata {
            plan_id: plan_id.map(str::to_string),
            principal_email: Some(email.to_lowercase()),
            ..Default::default()
        },
        plan_code: None,
        paid_at: None,
    }
}

/// In-memory gateway. Unknown references answer like Paystack does: a 404.
#[derive(Debug, Default)]
pub struct FakeGateway {
    transactions: Mutex<HashMap<String, Result<GatewayTransaction, PaystackError>>>,
    initialize_failure: Mutex<Option<PaystackError>>,
    initialized: Mutex<Vec<InitializeTransactionRequest>>,
    verify_calls: AtomicUsize,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer lookups of `transaction.reference` with `transaction`.
    pub fn with_transaction(&self, transaction: GatewayTransaction) {
        self.transactions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(transaction.reference.clone(), Ok(transaction));
    }

    /// Answer lookups of `reference` with `error`.
    pub fn fail_reference(&self, reference: &str, error: PaystackError) {
        self.transactions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(reference.to_string(), Err(error));
    }

    pub fn fail_initialize(&self, error: PaystackError) {
        *self.initialize_failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(error);
    }

    /// Every initialize request received, in order.
    pub fn initialized(&self) -> Vec<InitializeTransactionRequest> {
        self.initialized.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn initialize_transaction(
        &self,
        request: &InitializeTransactionRequest,
    ) -> Result<InitializedTransaction, PaystackError> {
        if let Some(err) = self.initialize_failure.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            return Err(err);
        }
        let mut initialized = self.initialized.lock().unwrap_or_else(|e| e.into_inner());
        initialized.push(request.clone());
        let reference = format!("ref-{}", initialized.len());
        Ok(InitializedTransaction {
            authorization_url: format!("https://checkout.paystack.com/{reference}"),
            access_code: Some(format!("access-{reference}")),
            reference,
        })
    }

    async fn get_transaction(&self, reference: &str) -> Result<GatewayTransaction, PaystackError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.transactions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(reference)
            .cloned()
            .unwrap_or_else(|| {
                Err(PaystackError::Status {
                    status: 404,
                    message: "Transaction reference not found".to_string(),
                })
            })
    }
}
