//! Live simulator session over an HTTP bridge.
//!
//! The bridge process owns the actual simulator connection and exposes the
//! handful of scenario/vehicle/sensor calls the environment needs as JSON
//! endpoints. The session is single-vehicle and strictly request/response.

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use super::traits::{Controls, SensorFrame, Simulator};
use crate::config::SimulatorConfig;

/// A simulator session that talks to a bridge server via HTTP.
///
/// Expected endpoints:
/// - `POST {base_url}/scenario/restart`
/// - `POST {base_url}/vehicles/{id}/control` -- body: [`Controls`]
/// - `POST {base_url}/step`                  -- body: `{"ticks": <n>}`
/// - `GET  {base_url}/vehicles/{id}/sensors` -- returns electrics + damage JSON
/// - `POST {base_url}/disconnect`
#[derive(Debug)]
pub struct BridgeSimulator {
    base_url: String,
    vehicle_id: String,
    http: reqwest::Client,
}

/// JSON sensor payload: the electrics and damage sensors of one vehicle.
#[derive(Debug, Deserialize)]
struct SensorsResponse {
    electrics: Electrics,
    damage: DamageReading,
}

#[derive(Debug, Deserialize)]
struct Electrics {
    airspeed: f64,
    #[serde(default)]
    rpm: Option<f64>,
    #[serde(default)]
    gear: Option<f64>,
    #[serde(default)]
    clutch_input: Option<f64>,
    #[serde(default)]
    throttle_input: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DamageReading {
    damage: f64,
}

impl SensorsResponse {
    fn into_frame(self) -> Result<SensorFrame> {
        let gear = match self.electrics.gear {
            Some(g) if g.is_finite() => Some(g.round() as i32),
            Some(g) => bail!("gear reading is not a number: {g}"),
            None => None,
        };
        Ok(SensorFrame {
            speed: self.electrics.airspeed,
            rpm: self.electrics.rpm,
            gear,
            clutch_input: self.electrics.clutch_input,
            throttle_input: self.electrics.throttle_input,
            damage: self.damage.damage,
        })
    }
}

impl BridgeSimulator {
    /// Create a session for the bridge and vehicle named in `config`.
    pub fn new(config: &SimulatorConfig) -> Self {
        Self {
            base_url: config.bridge_url.trim_end_matches('/').to_string(),
            vehicle_id: config.vehicle_id.clone(),
            http: reqwest::Client::new(),
        }
    }

    async fn post(&self, path: &str, body: &serde_json::Value, what: &str) -> Result<()> {
        self.http
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("failed to reach simulator bridge on {what}"))?
            .error_for_status()
            .with_context(|| format!("simulator bridge rejected {what}"))?;
        Ok(())
    }
}

impl Simulator for BridgeSimulator {
    async fn restart_episode(&mut self) -> Result<()> {
        self.post("/scenario/restart", &serde_json::json!({}), "scenario restart")
            .await?;
        tracing::info!(vehicle = %self.vehicle_id, "scenario restarted");
        Ok(())
    }

    async fn apply_controls(&mut self, controls: Controls) -> Result<()> {
        let body = serde_json::to_value(controls).context("failed to encode controls")?;
        let path = format!("/vehicles/{}/control", self.vehicle_id);
        self.post(&path, &body, "vehicle control").await
    }

    async fn advance(&mut self, ticks: u32) -> Result<()> {
        self.post("/step", &serde_json::json!({ "ticks": ticks }), "simulation step")
            .await
    }

    async fn read_sensors(&mut self) -> Result<SensorFrame> {
        let resp: SensorsResponse = self
            .http
            .get(format!(
                "{}/vehicles/{}/sensors",
                self.base_url, self.vehicle_id
            ))
            .send()
            .await
            .context("failed to reach simulator bridge on sensor poll")?
            .error_for_status()
            .context("simulator bridge rejected sensor poll")?
            .json()
            .await
            .context("failed to parse sensor response")?;
        resp.into_frame()
    }

    async fn close(&mut self) -> Result<()> {
        self.post("/disconnect", &serde_json::json!({}), "disconnect")
            .await?;
        tracing::debug!(vehicle = %self.vehicle_id, "bridge session closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::{GET, POST};
    use httpmock::MockServer;

    fn session(server: &MockServer) -> BridgeSimulator {
        BridgeSimulator::new(&SimulatorConfig {
            bridge_url: format!("{}/", server.base_url()),
            vehicle_id: "main_car".into(),
            ticks_per_step: 1,
        })
    }

    #[tokio::test]
    async fn control_payload_fixes_steering_and_brake() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/vehicles/main_car/control")
                    .json_body(serde_json::json!({
                        "throttle": 0.75,
                        "clutch": 0.0,
                        "gear": 2,
                        "steering": 0.0,
                        "brake": 0.0,
                    }));
                then.status(200).body("{}");
            })
            .await;

        let mut sim = session(&server);
        sim.apply_controls(Controls::longitudinal(0.75, 0.0, 2))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn advance_sends_tick_count() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/step")
                    .json_body(serde_json::json!({ "ticks": 1 }));
                then.status(200).body("{}");
            })
            .await;

        let mut sim = session(&server);
        sim.advance(1).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn parses_sensor_payload_with_missing_optionals() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/vehicles/main_car/sensors");
                then.status(200).json_body(serde_json::json!({
                    "electrics": { "airspeed": 12.5, "rpm": 3200.0, "gear": 2.0 },
                    "damage": { "damage": 4.0 },
                }));
            })
            .await;

        let mut sim = session(&server);
        let frame = sim.read_sensors().await.unwrap();
        assert_eq!(frame.speed, 12.5);
        assert_eq!(frame.rpm, Some(3200.0));
        assert_eq!(frame.gear, Some(2));
        assert_eq!(frame.clutch_input, None);
        assert_eq!(frame.throttle_input, None);
        assert_eq!(frame.damage, 4.0);
    }

    #[tokio::test]
    async fn missing_airspeed_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/vehicles/main_car/sensors");
                then.status(200).json_body(serde_json::json!({
                    "electrics": { "rpm": 3200.0 },
                    "damage": { "damage": 0.0 },
                }));
            })
            .await;

        let mut sim = session(&server);
        let err = sim.read_sensors().await.unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse sensor response"));
    }

    #[tokio::test]
    async fn server_error_on_restart_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/scenario/restart");
                then.status(500);
            })
            .await;

        let mut sim = session(&server);
        let err = sim.restart_episode().await.unwrap_err();
        assert!(err.to_string().contains("scenario restart"));
    }
}
