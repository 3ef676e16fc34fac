use crate::error::Result;
use crate::models::{
    BookConsultationRequest, Consultation, ConsultationStatus, UpdateConsultationStatusRequest,
};
use super::{Feedback, Store};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsultationsState {
    pub consultations: Vec<Consultation>,
    pub filter: Option<ConsultationStatus>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConsultationsAction {
    Pending,
    Loaded {
        consultations: Vec<Consultation>,
        filter: Option<ConsultationStatus>,
    },
    /// Booked or changed; replaces any entry with the same id.
    Upserted(Consultation),
    Rejected(String),
}

impl ConsultationsState {
    pub fn reduce(&mut self, action: ConsultationsAction) {
        match action {
            ConsultationsAction::Pending => {
                self.loading = true;
                self.error = None;
            }
            ConsultationsAction::Loaded { consultations, filter } => {
                self.loading = false;
                self.consultations = consultations;
                self.filter = filter;
            }
            ConsultationsAction::Upserted(consultation) => {
                self.loading = false;
                match self.consultations.iter_mut().find(|c| c.id == consultation.id) {
                    Some(existing) => *existing = consultation,
                    None => self.consultations.insert(0, consultation),
                }
            }
            ConsultationsAction::Rejected(message) => {
                self.loading = false;
                self.error = Some(message);
            }
        }
    }

    pub fn upcoming(&self) -> impl Iterator<Item = &Consultation> {
        self.consultations.iter().filter(|c| {
            matches!(c.status, ConsultationStatus::Pending | ConsultationStatus::Confirmed)
        })
    }
}

impl Store {
    pub async fn fetch_consultations(&self, status: Option<ConsultationStatus>) -> Result<()> {
        let key = format!("consultations/list/{:?}", status);
        let Some(_in_flight) = self.begin_request(key) else {
            return Ok(());
        };
        self.run(
            "consultations/list",
            Feedback::Read,
            |s| s.consultations.reduce(ConsultationsAction::Pending),
            async { self.api().get_consultations(status).await?.into_data_or_default() },
            |s, consultations: &Vec<Consultation>| {
                s.consultations.reduce(ConsultationsAction::Loaded {
                    consultations: consultations.clone(),
                    filter: status,
                })
            },
            |s, message| s.consultations.reduce(ConsultationsAction::Rejected(message)),
        )
        .await
        .map(|_| ())
    }

    /// Booking spends credits, so the balance is reloaded afterwards.
    pub async fn book_consultation(&self, request: BookConsultationRequest) -> Result<Consultation> {
        let consultation = self
            .run(
                "consultations/book",
                Feedback::Mutation("Consultation booked"),
                |s| s.consultations.reduce(ConsultationsAction::Pending),
                async { self.api().book_consultation(&request).await?.into_data() },
                |s, consultation: &Consultation| {
                    s.consultations.reduce(ConsultationsAction::Upserted(consultation.clone()))
                },
                |s, message| s.consultations.reduce(ConsultationsAction::Rejected(message)),
            )
            .await?;
        let _ = self.fetch_credit_balance().await;
        Ok(consultation)
    }

    pub async fn cancel_consultation(&self, consultation_id: &str) -> Result<Consultation> {
        self.run(
            "consultations/cancel",
            Feedback::Mutation("Consultation cancelled"),
            |s| s.consultations.reduce(ConsultationsAction::Pending),
            async { self.api().cancel_consultation(consultation_id).await?.into_data() },
            |s, consultation: &Consultation| {
                s.consultations.reduce(ConsultationsAction::Upserted(consultation.clone()))
            },
            |s, message| s.consultations.reduce(ConsultationsAction::Rejected(message)),
        )
        .await
    }

    pub async fn update_consultation_status(
        &self,
        consultation_id: &str,
        status: ConsultationStatus,
        reason: Option<String>,
    ) -> Result<Consultation> {
        let request = UpdateConsultationStatusRequest { status, reason };
        self.run(
            "consultations/update-status",
            Feedback::Mutation("Consultation updated"),
            |s| s.consultations.reduce(ConsultationsAction::Pending),
            async {
                self.api()
                    .update_consultation_status(consultation_id, &request)
                    .await?
                    .into_data()
            },
            |s, consultation: &Consultation| {
                s.consultations.reduce(ConsultationsAction::Upserted(consultation.clone()))
            },
            |s, message| s.consultations.reduce(ConsultationsAction::Rejected(message)),
        )
        .await
    }
}
