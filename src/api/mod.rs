//! REST gateway to the clinical backend
//!
//! Resource-oriented calls (auth, reports, images, patients, analytics)
//! with bearer-token attachment and one-shot refresh-and-replay recovery
//! on unauthenticated responses.

mod client;
mod error;
pub mod types;

pub use client::ApiClient;
pub use error::{extract_detail, ApiError};
pub use types::{
    ActivityItem, AnalyticsSummary, Credentials, ImageAnalysisPage, ImageAnalysisRecord,
    ImageAnalysisRequest, ImageAnalysisResponse, ListQuery, LoginResponse, MessageResponse,
    Patient, PatientCreate, PatientCreated, PatientPage, PatientQuery, PatientUpdate,
    RefreshResponse, RegisterRequest, RegisterResponse, Report, ReportCreated, ReportPage,
    ReportRequest, SystemStats, UserProfile,
};
