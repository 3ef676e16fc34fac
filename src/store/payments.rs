use crate::error::Result;
use crate::models::{
    CheckoutRequest, CheckoutSession, PageMeta, Payment, PaymentStatus, VerifyPaymentRequest,
};
use super::{Feedback, Store};

pub const PAYMENT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentsState {
    pub checkout: Option<CheckoutSession>,
    pub history: Vec<Payment>,
    pub meta: Option<PageMeta>,
    pub last_verified: Option<Payment>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaymentsAction {
    Pending,
    CheckoutCreated(CheckoutSession),
    Verified(Payment),
    HistoryLoaded {
        payments: Vec<Payment>,
        meta: Option<PageMeta>,
    },
    Rejected(String),
}

impl PaymentsState {
    pub fn reduce(&mut self, action: PaymentsAction) {
        match action {
            PaymentsAction::Pending => {
                self.loading = true;
                self.error = None;
            }
            PaymentsAction::CheckoutCreated(session) => {
                self.loading = false;
                self.checkout = Some(session);
            }
            PaymentsAction::Verified(payment) => {
                self.loading = false;
                self.checkout = None;
                match self.history.iter_mut().find(|p| p.id == payment.id) {
                    Some(existing) => *existing = payment.clone(),
                    None => self.history.insert(0, payment.clone()),
                }
                self.last_verified = Some(payment);
            }
            PaymentsAction::HistoryLoaded { payments, meta } => {
                self.loading = false;
                self.history = payments;
                self.meta = meta;
            }
            PaymentsAction::Rejected(message) => {
                self.loading = false;
                self.error = Some(message);
            }
        }
    }
}

impl Store {
    /// Returns the hosted checkout page the user must be sent to.
    pub async fn create_checkout_session(&self, package_id: &str) -> Result<CheckoutSession> {
        let request = CheckoutRequest {
            package_id: package_id.to_string(),
        };
        self.run(
            "payments/checkout",
            Feedback::Read,
            |s| s.payments.reduce(PaymentsAction::Pending),
            async { self.api().create_checkout_session(&request).await?.into_data() },
            |s, session: &CheckoutSession| s.payments.reduce(PaymentsAction::CheckoutCreated(session.clone())),
            |s, message| s.payments.reduce(PaymentsAction::Rejected(message)),
        )
        .await
    }

    /// Confirm a completed checkout and pick up the new credit balance.
    pub async fn verify_payment(&self, session_id: &str) -> Result<Payment> {
        let request = VerifyPaymentRequest {
            session_id: session_id.to_string(),
        };
        let payment = self
            .run(
                "payments/verify",
                Feedback::Mutation("Payment confirmed"),
                |s| s.payments.reduce(PaymentsAction::Pending),
                async { self.api().verify_payment(&request).await?.into_data() },
                |s, payment: &Payment| s.payments.reduce(PaymentsAction::Verified(payment.clone())),
                |s, message| s.payments.reduce(PaymentsAction::Rejected(message)),
            )
            .await?;
        if payment.status == PaymentStatus::Succeeded {
            let _ = self.fetch_credit_balance().await;
        }
        Ok(payment)
    }

    pub async fn fetch_payment_history(&self, page: u32) -> Result<()> {
        let Some(_in_flight) = self.begin_request(format!("payments/history/{}", page)) else {
            return Ok(());
        };
        self.run(
            "payments/history",
            Feedback::Read,
            |s| s.payments.reduce(PaymentsAction::Pending),
            async { self.api().get_payment_history(page, PAYMENT_PAGE_SIZE).await?.into_page() },
            |s, (payments, meta): &(Vec<Payment>, Option<PageMeta>)| {
                s.payments.reduce(PaymentsAction::HistoryLoaded {
                    payments: payments.clone(),
                    meta: *meta,
                })
            },
            |s, message| s.payments.reduce(PaymentsAction::Rejected(message)),
        )
        .await
        .map(|_| ())
    }
}
