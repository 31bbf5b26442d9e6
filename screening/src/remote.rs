//! HTTPS list provider
//!
//! Two endpoints are used:
//!
//! - `POST {base}{search_path}` with `{"name": ..}` returns `{"results": [..]}`
//! - `{base}{address_path}` registers an address (`POST`) and then lists its
//!   identifications (`GET {base}{address_path}/{address}`)
//!
//! Records are normalised one by one. A record without a usable name is
//! skipped without affecting the rest of the batch.

use crate::error::{Error, Result};
use crate::provider::ScreeningProvider;
use crate::types::{ScreeningMatch, ScreeningSubject, SubjectKind, ATTR_COUNTRY, ATTR_DATE_OF_BIRTH};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Connection settings for a remote list provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteListSettings {
    pub base_url: String,
    pub api_token: String,
    /// Name search path; `None` disables individual screening
    pub search_path: Option<String>,
    /// Address registration/lookup path; `None` disables address screening
    pub address_path: Option<String>,
    /// Registration attempts before falling through to the lookup
    #[serde(default = "default_registration_attempts")]
    pub registration_attempts: u32,
    /// Initial delay between registration attempts, doubled each time
    #[serde(default = "default_registration_backoff_ms")]
    pub registration_backoff_ms: u64,
    /// Share of the call timeout registration may use; `None` means half.
    /// The rest is kept for the lookup.
    #[serde(default)]
    pub registration_budget_ms: Option<u64>,
    /// How the source reports name-search scores
    #[serde(default)]
    pub score_scale: ScoreScale,
}

/// Unit of a source's match scores
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScoreScale {
    /// 0-100, kept as is
    #[default]
    Percent,
    /// 0.0-1.0, multiplied by 100
    Fraction,
}

impl ScoreScale {
    fn to_percent(self, raw: f64) -> f64 {
        match self {
            ScoreScale::Percent => raw,
            ScoreScale::Fraction => raw * 100.0,
        }
    }
}

fn default_registration_attempts() -> u32 {
    3
}

fn default_registration_backoff_ms() -> u64 {
    200
}

pub struct RemoteListProvider {
    name: String,
    client: reqwest::Client,
    settings: RemoteListSettings,
    timeout: Duration,
}

impl RemoteListProvider {
    pub fn new(name: &str, settings: RemoteListSettings, timeout: Duration) -> Result<Self> {
        if settings.base_url.trim().is_empty() {
            return Err(Error::Config(format!("Provider {} has no base_url", name)));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            name: name.to_string(),
            client,
            settings,
            timeout,
        })
    }

    fn registration_budget(&self) -> Duration {
        match self.settings.registration_budget_ms {
            Some(ms) => Duration::from_millis(ms).min(self.timeout),
            None => self.timeout / 2,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    async fn register_address(
        &self,
        path: &str,
        address: &str,
        chain: &str,
        attempt_timeout: Duration,
    ) -> Result<()> {
        let response = self
            .client
            .post(self.url(path))
            .timeout(attempt_timeout)
            .bearer_auth(&self.settings.api_token)
            .json(&json!({ "address": address, "chain": chain }))
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::CONFLICT => {
                debug!(provider = %self.name, "Address already registered");
                Ok(())
            }
            s => Err(Error::unavailable(
                &self.name,
                format!("registration returned HTTP {}", s.as_u16()),
            )),
        }
    }

    /// Bounded retry within the registration budget; exhausting either the
    /// attempts or the budget is not fatal.
    async fn register_with_retry(&self, path: &str, address: &str, chain: &str) {
        let budget = self.registration_budget();
        if tokio::time::timeout(budget, self.register_attempts(path, address, chain, budget))
            .await
            .is_err()
        {
            warn!(
                provider = %self.name,
                budget_ms = budget.as_millis() as u64,
                "Address registration budget exhausted, attempting lookup anyway"
            );
        }
    }

    async fn register_attempts(&self, path: &str, address: &str, chain: &str, budget: Duration) {
        let attempts = self.settings.registration_attempts.max(1);
        let attempt_timeout = (budget / attempts).max(Duration::from_millis(1));
        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(self.backoff_delay(attempt - 1)).await;
            }
            match self.register_address(path, address, chain, attempt_timeout).await {
                Ok(()) => {
                    if attempt > 0 {
                        info!(
                            provider = %self.name,
                            "Address registration succeeded on attempt {}/{}",
                            attempt + 1,
                            attempts
                        );
                    }
                    return;
                }
                Err(e) => {
                    warn!(
                        provider = %self.name,
                        "Address registration attempt {}/{} failed: {}",
                        attempt + 1,
                        attempts,
                        e
                    );
                }
            }
        }
        warn!(provider = %self.name, "Address registration exhausted, attempting lookup anyway");
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.settings.registration_backoff_ms as f64 * 2f64.powi(attempt as i32);
        let jitter = (rand::random::<f64>() - 0.5) * base * 0.2;
        Duration::from_millis((base + jitter).max(0.0) as u64)
    }

    async fn fetch_json(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request
            .bearer_auth(&self.settings.api_token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::unavailable(
                &self.name,
                format!("HTTP {}", status.as_u16()),
            ));
        }
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl ScreeningProvider for RemoteListProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, kind: SubjectKind) -> bool {
        match kind {
            SubjectKind::Individual => self.settings.search_path.is_some(),
            SubjectKind::Address => self.settings.address_path.is_some(),
        }
    }

    async fn search_individual(
        &self,
        name: &str,
        subject: &ScreeningSubject,
    ) -> Result<Vec<ScreeningMatch>> {
        let path = self
            .settings
            .search_path
            .as_deref()
            .ok_or_else(|| Error::Config(format!("{} has no search_path", self.name)))?;

        let mut body = json!({ "name": name });
        if let Some(country) = subject.attribute(ATTR_COUNTRY) {
            body["country"] = json!(country);
        }
        if let Some(dob) = subject.attribute(ATTR_DATE_OF_BIRTH) {
            body["date_of_birth"] = json!(dob);
        }

        let payload = self
            .fetch_json(self.client.post(self.url(path)).json(&body))
            .await?;
        Ok(normalize_search_results(&self.name, self.settings.score_scale, &payload))
    }

    async fn search_address(&self, address: &str, chain: &str) -> Result<Vec<ScreeningMatch>> {
        let path = self
            .settings
            .address_path
            .as_deref()
            .ok_or_else(|| Error::Config(format!("{} has no address_path", self.name)))?;

        self.register_with_retry(path, address, chain).await;

        let lookup = format!("{}/{}", path.trim_end_matches('/'), address);
        let payload = self.fetch_json(self.client.get(self.url(&lookup))).await?;
        Ok(normalize_identifications(&self.name, address, &payload))
    }
}

fn records<'a>(payload: &'a Value, key: &str) -> &'a [Value] {
    payload
        .get(key)
        .and_then(Value::as_array)
        .or_else(|| payload.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn text(record: &Value, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn score(record: &Value, scale: ScoreScale) -> f64 {
    let raw = record
        .get("score")
        .or_else(|| record.get("match_score"))
        .and_then(|v| v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
        .unwrap_or(0.0);
    scale.to_percent(raw)
}

fn program(record: &Value) -> String {
    if let Some(p) = text(record, "program") {
        return p;
    }
    record
        .get("programs")
        .and_then(Value::as_array)
        .map(|ps| {
            ps.iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(",")
        })
        .unwrap_or_default()
}

pub(crate) fn normalize_search_results(
    provider: &str,
    scale: ScoreScale,
    payload: &Value,
) -> Vec<ScreeningMatch> {
    let rows = records(payload, "results");
    let matches: Vec<ScreeningMatch> = rows
        .iter()
        .filter_map(|record| {
            let name = text(record, "name")?;
            ScreeningMatch::new(
                provider,
                text(record, "id").unwrap_or_default(),
                &name,
                score(record, scale),
                SubjectKind::Individual,
                program(record),
                text(record, "description")
                    .or_else(|| text(record, "remarks"))
                    .unwrap_or_default(),
            )
        })
        .collect();

    if matches.len() < rows.len() {
        debug!(
            provider,
            skipped = rows.len() - matches.len(),
            "Skipped records without a usable name"
        );
    }
    matches
}

pub(crate) fn normalize_identifications(
    provider: &str,
    address: &str,
    payload: &Value,
) -> Vec<ScreeningMatch> {
    records(payload, "identifications")
        .iter()
        .filter_map(|record| {
            let name = text(record, "name")?;
            ScreeningMatch::new(
                provider,
                text(record, "url").unwrap_or_else(|| address.to_string()),
                &name,
                100.0,
                SubjectKind::Address,
                text(record, "category").unwrap_or_else(|| "sanctions".to_string()),
                text(record, "description").unwrap_or_default(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_normalization_skips_bad_records() {
        let payload = json!({
            "results": [
                { "id": 42, "name": "Ivan Petrov", "score": 92, "programs": ["UKRAINE-EO13661", "RUSSIA-EO14024"] },
                { "id": "x", "score": 99 },
                { "id": "y", "name": "", "score": 99 },
                { "id": "z", "name": 17 },
                { "id": "w", "name": "Petr Ivanov", "score": 88, "program": "PEP", "remarks": "Deputy minister" }
            ]
        });

        let matches = normalize_search_results("list", ScoreScale::Percent, &payload);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].external_id, "42");
        assert_eq!(matches[0].program, "UKRAINE-EO13661,RUSSIA-EO14024");
        assert_eq!(matches[1].match_score(), 88);
        assert_eq!(matches[1].description, "Deputy minister");
    }

    #[test]
    fn test_identifications_default_full_score() {
        let payload = json!({
            "identifications": [
                { "category": "sanctions", "name": "SANCTIONS: OFAC SDN Lazarus", "description": "", "url": "https://home.treasury.gov" },
                { "category": "sanctions" }
            ]
        });

        let matches = normalize_identifications("chain", "0xabc", &payload);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].match_score(), 100);
        assert_eq!(matches[0].subject_type, SubjectKind::Address);
    }

    #[test]
    fn test_score_out_of_range_clamped() {
        let payload = json!([{ "name": "A", "score": 250 }]);
        let matches = normalize_search_results("list", ScoreScale::Percent, &payload);
        assert_eq!(matches[0].match_score(), 100);
    }

    #[test]
    fn test_low_percent_score_kept_native() {
        let payload = json!({ "results": [{ "name": "Weak Hit", "score": 1 }] });
        let matches = normalize_search_results("list", ScoreScale::Percent, &payload);
        assert_eq!(matches[0].match_score(), 1);
    }

    #[test]
    fn test_fraction_scale_converted() {
        let payload = json!({ "results": [
            { "name": "Petr Ivanov", "score": 0.88 },
            { "name": "Ivan Petrov", "score": 1 }
        ] });
        let matches = normalize_search_results("list", ScoreScale::Fraction, &payload);
        assert_eq!(matches[0].match_score(), 88);
        assert_eq!(matches[1].match_score(), 100);
    }

    #[test]
    fn test_registration_budget_defaults_to_half() {
        let mut settings = settings();
        let provider =
            RemoteListProvider::new("list", settings.clone(), Duration::from_secs(2)).unwrap();
        assert_eq!(provider.registration_budget(), Duration::from_secs(1));

        settings.registration_budget_ms = Some(5_000);
        let provider = RemoteListProvider::new("list", settings, Duration::from_secs(2)).unwrap();
        assert_eq!(provider.registration_budget(), Duration::from_secs(2));
    }

    fn settings() -> RemoteListSettings {
        RemoteListSettings {
            base_url: "https://lists.example.com".to_string(),
            api_token: "t".to_string(),
            search_path: Some("/search".to_string()),
            address_path: None,
            registration_attempts: 3,
            registration_backoff_ms: 10,
            registration_budget_ms: None,
            score_scale: ScoreScale::Percent,
        }
    }

    #[test]
    fn test_missing_base_url_rejected() {
        let mut settings = settings();
        settings.base_url = " ".to_string();
        assert!(RemoteListProvider::new("list", settings, Duration::from_secs(1)).is_err());
    }
}
