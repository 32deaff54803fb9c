//! HTTP client for the tracker API.

use crate::remote::Remote;
use crate::{
    ClearDoseRequest, DayEntry, EntryResponse, Error, ErrorResponse, Medication,
    MedicationsResponse, RecordDoseRequest, Result, SaveMedicationsRequest, SuccessResponse,
    UpdateDoseRequest, UserData, USER_ID_HEADER,
};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{StatusCode, Url};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Blocking client for `/api`, sending the user id on every request
pub struct HttpRemote {
    client: Client,
    base_url: Url,
    user_id: String,
}

impl HttpRemote {
    /// `base_url` points at the API root, e.g. `http://127.0.0.1:8787/api`
    pub fn new(base_url: &str, user_id: impl Into<String>) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid API url {:?}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!("API url {} cannot be a base", base_url)));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url,
            user_id: user_id.into(),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| Error::Config(format!("API url {} cannot be a base", self.base_url)))?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.header(USER_ID_HEADER, &self.user_id).send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<ErrorResponse>()
            .map(|body| body.error)
            .unwrap_or_else(|_| status.to_string());
        tracing::debug!("API responded {}: {}", status, message);

        Err(match status {
            StatusCode::BAD_REQUEST => Error::InvalidInput(message),
            StatusCode::NOT_FOUND => Error::NotFound(message),
            _ => Error::Store(message),
        })
    }
}

impl Remote for HttpRemote {
    fn fetch_data(&self) -> Result<UserData> {
        let response = self.send(self.client.get(self.url(&["data"])?))?;
        Ok(response.json()?)
    }

    fn save_medications(&self, medications: &[Medication]) -> Result<()> {
        let body = SaveMedicationsRequest {
            medications: medications.to_vec(),
        };
        let response = self.send(self.client.post(self.url(&["medications"])?).json(&body))?;
        let _: MedicationsResponse = response.json()?;
        Ok(())
    }

    fn delete_medication(&self, medication_id: &str) -> Result<()> {
        let response = self.send(self.client.delete(self.url(&["medication", medication_id])?))?;
        let _: SuccessResponse = response.json()?;
        Ok(())
    }

    fn record_dose(&self, req: &RecordDoseRequest) -> Result<DayEntry> {
        let response = self.send(self.client.post(self.url(&["entry"])?).json(req))?;
        let body: EntryResponse = response.json()?;
        Ok(body.entry)
    }

    fn update_dose(&self, req: &UpdateDoseRequest) -> Result<DayEntry> {
        let response = self.send(self.client.put(self.url(&["entry"])?).json(req))?;
        let body: EntryResponse = response.json()?;
        Ok(body.entry)
    }

    fn clear_dose(&self, req: &ClearDoseRequest) -> Result<()> {
        let response = self.send(self.client.delete(self.url(&["entry"])?).json(req))?;
        let _: SuccessResponse = response.json()?;
        Ok(())
    }
}
