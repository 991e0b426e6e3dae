//! Customer DTOs

use serde::{Deserialize, Serialize};

use domain_registry::{
    city_code, BatchReport, CustomerAttributes, CustomerType, MistryDraft, PhoneCheckState,
    RegisteredCustomer,
};

/// Attributes as currently typed into the customer form
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CustomerIdPreviewRequest {
    pub phone: String,
    /// City name; the code is derived from it
    pub city: Option<String>,
    pub name: String,
    pub customer_type: String,
    pub nickname: Option<String>,
    pub mistry_name: Option<String>,
}

impl CustomerIdPreviewRequest {
    pub fn attributes(&self) -> CustomerAttributes {
        CustomerAttributes {
            phone: self.phone.clone(),
            city_code: city_code(self.city.as_deref()).to_string(),
            contractor_name: self.name.clone(),
            customer_type: CustomerType::parse(&self.customer_type),
            nickname: self.nickname.clone(),
            mistry_name: self.mistry_name.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CustomerIdPreviewResponse {
    pub customer_id: String,
    pub city_code: String,
}

#[derive(Debug, Deserialize)]
pub struct PhoneCheckQuery {
    pub phone: String,
    /// Row id of the customer being edited
    pub exclude_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PhoneCheckResponse {
    /// `state` plus the checked `phone` (and `reason` when inconclusive)
    #[serde(flatten)]
    pub check: PhoneCheckState,
    pub exists: bool,
    pub can_submit: bool,
    /// Why the number was not looked up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePhoneRequest {
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterMistriesRequest {
    pub mistries: Vec<MistryDraft>,
}

#[derive(Debug, Serialize)]
pub struct BatchFailure {
    pub index: usize,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct BatchReportResponse {
    pub succeeded: Vec<RegisteredCustomer>,
    pub failed: Vec<BatchFailure>,
    pub summary: String,
}

impl From<&BatchReport> for BatchReportResponse {
    fn from(report: &BatchReport) -> Self {
        Self {
            succeeded: report.succeeded().cloned().collect(),
            failed: report
                .failed()
                .map(|(outcome, error)| BatchFailure {
                    index: outcome.index,
                    phone: outcome.phone.clone(),
                    field: error.field().map(str::to_string),
                    message: error.user_message(),
                })
                .collect(),
            summary: report.summary(),
        }
    }
}
