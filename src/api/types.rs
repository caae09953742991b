use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: String,
    pub username: String,
    pub role: String,
}

/// Minimal profile of the authenticated principal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user_info: UserProfile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

// ============================================================================
// Reports
// ============================================================================

/// Input for report generation: the backend summarizes the transcript
#[derive(Debug, Clone, Serialize)]
pub struct ReportRequest {
    pub transcript: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    pub conversation_type: String,
}

impl ReportRequest {
    pub fn new(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            patient_id: None,
            conversation_type: "consultation".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportCreated {
    pub success: bool,
    pub report_id: String,
    pub summary: Value,
    #[serde(default)]
    pub pdf_path: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Report {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub present_complaints: String,
    #[serde(default)]
    pub clinical_details: String,
    #[serde(default)]
    pub physical_examination: String,
    #[serde(default)]
    pub impression: String,
    #[serde(default)]
    pub management_plan: String,
    #[serde(default)]
    pub additional_notes: Option<String>,
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub doctor_id: String,
    #[serde(default)]
    pub conversation_type: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportPage {
    pub reports: Vec<Report>,
    pub total: u64,
    pub skip: u64,
    pub limit: u64,
}

/// Pagination + patient filter for report and image listings
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub skip: u64,
    pub limit: u64,
    pub patient_id: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: 20,
            patient_id: None,
        }
    }
}

// ============================================================================
// Image analysis
// ============================================================================

#[derive(Debug, Clone)]
pub struct ImageAnalysisRequest {
    /// One of CT, MRI, XRAY, USG, X-RAY, ULTRASOUND
    pub image_type: String,
    pub patient_id: Option<String>,
    pub clinical_context: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageAnalysisResponse {
    pub success: bool,
    pub analysis_id: String,
    pub analysis: Value,
    #[serde(default)]
    pub metadata: Value,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageAnalysisRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub image_type: String,
    #[serde(default)]
    pub created_at: Option<String>,
    /// Analysis payload fields (findings, diagnosis, severity, ...) vary by
    /// image type; keep them unshaped
    #[serde(flatten)]
    pub details: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageAnalysisPage {
    pub analyses: Vec<ImageAnalysisRecord>,
    pub total: u64,
    pub skip: u64,
    pub limit: u64,
}

// ============================================================================
// Patients
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: String,
    pub full_name: String,
    pub date_of_birth: String,
    pub gender: String,
    #[serde(default)]
    pub contact_info: Option<String>,
    #[serde(default)]
    pub medical_history: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientCreate {
    pub patient_id: String,
    pub full_name: String,
    pub date_of_birth: String,
    pub gender: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medical_history: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PatientUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medical_history: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatientCreated {
    pub message: String,
    pub patient_id: String,
    pub record_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatientPage {
    pub patients: Vec<Patient>,
    pub total: u64,
    pub skip: u64,
    pub limit: u64,
}

/// Pagination + free-text search for the patient listing
#[derive(Debug, Clone)]
pub struct PatientQuery {
    pub skip: u64,
    pub limit: u64,
    pub search: Option<String>,
}

impl Default for PatientQuery {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: 50,
            search: None,
        }
    }
}

// ============================================================================
// Analytics
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub status: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub details: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsSummary {
    pub total_reports: u64,
    pub total_images: u64,
    pub username: String,
    #[serde(default)]
    pub recent_activity: Vec<ActivityItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemStats {
    pub user_stats: Value,
    pub system_stats: Value,
    pub user_info: Value,
}

// ============================================================================
// Shared
// ============================================================================

/// Plain acknowledgment body (`{"message": "..."}`)
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
