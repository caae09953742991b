use anyhow::{Context, Result};
use reqwest::multipart;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::error::ApiError;
use super::types::*;
use crate::auth::CredentialStore;
use crate::config::ApiConfig;

/// Client for the clinical backend's REST surface.
///
/// Every call re-reads the persisted bearer token and attaches it when
/// present. An unauthenticated response triggers exactly one token refresh
/// and one replay of the original call; if the refresh fails, the persisted
/// session is cleared and the error propagates. Requests are rebuilt rather
/// than byte-cloned for the replay, so multipart uploads replay too.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<CredentialStore>,

    /// Serializes refresh attempts so concurrent 401s produce one refresh
    refresh_gate: Mutex<()>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, credentials: Arc<CredentialStore>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            // The refresh token rides an HTTP-only cookie set at login
            .cookie_store(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
            refresh_gate: Mutex::new(()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ========================================================================
    // Auth
    // ========================================================================

    /// Exchange credentials for a bearer token and profile. Persisting them
    /// is the auth session's job, not this client's.
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        let response = self
            .execute(|http| {
                http.post(self.url("/auth/login")).form(&[
                    ("username", credentials.username.as_str()),
                    ("password", credentials.password.as_str()),
                ])
            })
            .await?;

        Ok(response.json().await?)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse, ApiError> {
        let response = self
            .execute(|http| http.post(self.url("/auth/register")).json(request))
            .await?;

        Ok(response.json().await?)
    }

    pub async fn logout(&self) -> Result<MessageResponse, ApiError> {
        let response = self
            .execute(|http| http.post(self.url("/auth/logout")))
            .await?;

        Ok(response.json().await?)
    }

    // ========================================================================
    // Reports
    // ========================================================================

    /// Generate a medical report from a transcript
    pub async fn create_report(&self, request: &ReportRequest) -> Result<ReportCreated, ApiError> {
        let response = self
            .execute(|http| http.post(self.url("/reports")).json(request))
            .await?;

        Ok(response.json().await?)
    }

    pub async fn list_reports(&self, query: &ListQuery) -> Result<ReportPage, ApiError> {
        let response = self
            .execute(|http| {
                let mut request = http
                    .get(self.url("/reports"))
                    .query(&[("skip", query.skip), ("limit", query.limit)]);
                if let Some(patient_id) = &query.patient_id {
                    request = request.query(&[("patient_id", patient_id)]);
                }
                request
            })
            .await?;

        Ok(response.json().await?)
    }

    pub async fn get_report(&self, report_id: &str) -> Result<Report, ApiError> {
        let response = self
            .execute(|http| http.get(self.url(&format!("/reports/{}", report_id))))
            .await?;

        Ok(response.json().await?)
    }

    pub async fn delete_report(&self, report_id: &str) -> Result<MessageResponse, ApiError> {
        let response = self
            .execute(|http| http.delete(self.url(&format!("/reports/{}", report_id))))
            .await?;

        Ok(response.json().await?)
    }

    /// Download the rendered report PDF
    pub async fn download_report_pdf(&self, report_id: &str) -> Result<Vec<u8>, ApiError> {
        let response = self
            .execute(|http| http.get(self.url(&format!("/reports/{}/pdf", report_id))))
            .await?;

        Ok(response.bytes().await?.to_vec())
    }

    // ========================================================================
    // Image analysis
    // ========================================================================

    pub async fn analyze_image(
        &self,
        request: &ImageAnalysisRequest,
        file_name: &str,
        file_bytes: Vec<u8>,
    ) -> Result<ImageAnalysisResponse, ApiError> {
        let response = self
            .execute(|http| {
                let file_part = multipart::Part::bytes(file_bytes.clone())
                    .file_name(file_name.to_string());

                let mut form = multipart::Form::new()
                    .part("file", file_part)
                    .text("image_type", request.image_type.clone());

                if let Some(patient_id) = &request.patient_id {
                    form = form.text("patient_id", patient_id.clone());
                }
                if let Some(context) = &request.clinical_context {
                    form = form.text("clinical_context", context.clone());
                }

                http.post(self.url("/images/analyze")).multipart(form)
            })
            .await?;

        Ok(response.json().await?)
    }

    pub async fn list_image_analyses(
        &self,
        query: &ListQuery,
    ) -> Result<ImageAnalysisPage, ApiError> {
        let response = self
            .execute(|http| {
                let mut request = http
                    .get(self.url("/images"))
                    .query(&[("skip", query.skip), ("limit", query.limit)]);
                if let Some(patient_id) = &query.patient_id {
                    request = request.query(&[("patient_id", patient_id)]);
                }
                request
            })
            .await?;

        Ok(response.json().await?)
    }

    pub async fn get_image_analysis(
        &self,
        analysis_id: &str,
    ) -> Result<ImageAnalysisRecord, ApiError> {
        let response = self
            .execute(|http| http.get(self.url(&format!("/images/{}", analysis_id))))
            .await?;

        Ok(response.json().await?)
    }

    pub async fn delete_image_analysis(
        &self,
        analysis_id: &str,
    ) -> Result<MessageResponse, ApiError> {
        let response = self
            .execute(|http| http.delete(self.url(&format!("/images/{}", analysis_id))))
            .await?;

        Ok(response.json().await?)
    }

    // ========================================================================
    // Patients
    // ========================================================================

    pub async fn list_patients(&self, query: &PatientQuery) -> Result<PatientPage, ApiError> {
        let response = self
            .execute(|http| {
                let mut request = http
                    .get(self.url("/patients"))
                    .query(&[("skip", query.skip), ("limit", query.limit)]);
                if let Some(search) = &query.search {
                    request = request.query(&[("search", search)]);
                }
                request
            })
            .await?;

        Ok(response.json().await?)
    }

    pub async fn get_patient(&self, patient_id: &str) -> Result<Patient, ApiError> {
        let response = self
            .execute(|http| http.get(self.url(&format!("/patients/{}", patient_id))))
            .await?;

        Ok(response.json().await?)
    }

    pub async fn create_patient(&self, patient: &PatientCreate) -> Result<PatientCreated, ApiError> {
        let response = self
            .execute(|http| http.post(self.url("/patients")).json(patient))
            .await?;

        Ok(response.json().await?)
    }

    pub async fn update_patient(
        &self,
        patient_id: &str,
        update: &PatientUpdate,
    ) -> Result<MessageResponse, ApiError> {
        let response = self
            .execute(|http| {
                http.put(self.url(&format!("/patients/{}", patient_id)))
                    .json(update)
            })
            .await?;

        Ok(response.json().await?)
    }

    pub async fn delete_patient(&self, patient_id: &str) -> Result<MessageResponse, ApiError> {
        let response = self
            .execute(|http| http.delete(self.url(&format!("/patients/{}", patient_id))))
            .await?;

        Ok(response.json().await?)
    }

    // ========================================================================
    // Analytics
    // ========================================================================

    pub async fn analytics_summary(&self) -> Result<AnalyticsSummary, ApiError> {
        let response = self
            .execute(|http| http.get(self.url("/analytics")))
            .await?;

        Ok(response.json().await?)
    }

    pub async fn system_stats(&self) -> Result<SystemStats, ApiError> {
        let response = self
            .execute(|http| http.get(self.url("/analytics/stats")))
            .await?;

        Ok(response.json().await?)
    }

    pub async fn health(&self) -> Result<serde_json::Value, ApiError> {
        let response = self
            .execute(|http| http.get(self.url("/analytics/health")))
            .await?;

        Ok(response.json().await?)
    }

    // ========================================================================
    // Cross-cutting request path
    // ========================================================================

    /// Run one request with bearer attachment and the one-shot
    /// refresh-and-replay recovery. `build` is called again for the replay,
    /// producing a fresh request against the same closure state.
    async fn execute<F>(&self, build: F) -> Result<reqwest::Response, ApiError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let token = self.credentials.access_token();

        let response = Self::authorize(build(&self.http), token.as_deref())
            .send()
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::require_success(response).await;
        }

        if !self.refresh_access_token(token.as_deref()).await {
            return Err(ApiError::from_response(response).await);
        }

        let token = self.credentials.access_token();
        let replay = Self::authorize(build(&self.http), token.as_deref())
            .send()
            .await?;

        Self::require_success(replay).await
    }

    fn authorize(
        request: reqwest::RequestBuilder,
        token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn require_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(ApiError::from_response(response).await)
        }
    }

    /// Try to refresh the access token. Returns whether a usable token is
    /// now stored.
    ///
    /// Refreshes are single-flight: concurrent unauthenticated calls queue
    /// on the gate, and a caller whose stale token was already replaced
    /// while it waited skips the network round trip.
    async fn refresh_access_token(&self, stale_token: Option<&str>) -> bool {
        let _gate = self.refresh_gate.lock().await;

        let current = self.credentials.access_token();
        if current.as_deref() != stale_token {
            return current.is_some();
        }

        debug!("Access token rejected, attempting refresh");

        let result = self.http.post(self.url("/auth/refresh-token")).send().await;

        match result {
            Ok(response) if response.status().is_success() => {
                match response.json::<RefreshResponse>().await {
                    Ok(body) => {
                        if let Err(e) = self.credentials.set_access_token(&body.access_token) {
                            warn!("Failed to persist refreshed token: {:#}", e);
                        }
                        info!("Access token refreshed");
                        true
                    }
                    Err(e) => {
                        warn!("Token refresh returned an unreadable body: {}", e);
                        self.clear_session();
                        false
                    }
                }
            }
            Ok(response) => {
                warn!("Token refresh rejected: {}", response.status());
                self.clear_session();
                false
            }
            Err(e) => {
                warn!("Token refresh failed: {}", e);
                self.clear_session();
                false
            }
        }
    }

    fn clear_session(&self) {
        if let Err(e) = self.credentials.clear() {
            warn!("Failed to clear stored session: {:#}", e);
        }
    }
}
