//! Current temperature from OpenWeatherMap

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{instrument, trace};

use super::{MetricSource, REQUEST_TIMEOUT, Reading, http_client};
use crate::models::Labels;

pub const SOURCE: &str = "OpenWeatherMap";
pub const NAME: &str = "temperature_celsius";
pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

#[derive(Debug, Deserialize)]
struct WeatherData {
    main: MainReadings,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
}

#[derive(Debug, Clone)]
pub struct OpenWeatherSource {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    city: String,
}

impl OpenWeatherSource {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        city: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(REQUEST_TIMEOUT)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            city: city.into(),
        })
    }
}

#[async_trait]
impl MetricSource for OpenWeatherSource {
    fn source(&self) -> &str {
        SOURCE
    }

    fn name(&self) -> &str {
        NAME
    }

    #[instrument(skip(self), fields(city = %self.city))]
    async fn fetch(&self) -> Result<Reading> {
        let url = format!("{}/data/2.5/weather", self.base_url);
        trace!("requesting current weather from {url}");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", self.city.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await
            .context("failed to execute request")?;

        if !response.status().is_success() {
            bail!("unexpected status code: {}", response.status());
        }

        let data: WeatherData = response
            .json()
            .await
            .context("failed to decode response body")?;

        let mut labels = Labels::new();
        labels.insert("city".to_string(), self.city.as_str().into());

        Ok(Reading {
            value: data.main.temp,
            labels,
        })
    }
}
