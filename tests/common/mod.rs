#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use parking_lot::Mutex;
use quickchart::AppState;
use quickchart::core::translate::GoogleChartsTranslator;
use quickchart::core::{ChartRenderer, Engines, GraphRenderer, QrRenderer};
use quickchart::schemas::chart::ChartJob;
use quickchart::schemas::legacy::GraphJob;
use quickchart::schemas::qr::QrJob;
use quickchart::settings::Config;
use quickchart::telemetry::Telemetry;

/// Deterministic stand-in for an external renderer: answers with fixed
/// bytes or a fixed failure and records every job it was asked for.
pub struct StubRenderer<J> {
    response: Result<Vec<u8>, String>,
    pub calls: Mutex<Vec<J>>,
}

impl<J> StubRenderer<J> {
    pub fn ok(bytes: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            response: Ok(bytes.to_vec()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            response: Err(message.to_string()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn respond(&self, job: J) -> Result<Vec<u8>> {
        self.calls.lock().push(job);
        match &self.response {
            Ok(bytes) => Ok(bytes.clone()),
            Err(message) => Err(anyhow!("{message}")),
        }
    }

    pub fn last_call(&self) -> Option<J>
    where
        J: Clone,
    {
        self.calls.lock().last().cloned()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl ChartRenderer for StubRenderer<ChartJob> {
    async fn render(&self, job: &ChartJob) -> Result<Vec<u8>> {
        self.respond(job.clone())
    }
}

#[async_trait]
impl GraphRenderer for StubRenderer<GraphJob> {
    async fn render(&self, job: &GraphJob) -> Result<Vec<u8>> {
        self.respond(job.clone())
    }
}

#[async_trait]
impl QrRenderer for StubRenderer<QrJob> {
    async fn render(&self, job: &QrJob) -> Result<Vec<u8>> {
        self.respond(job.clone())
    }
}

pub fn stub_charts() -> Arc<StubRenderer<ChartJob>> {
    StubRenderer::ok(b"chart-bytes")
}

pub fn stub_graphs() -> Arc<StubRenderer<GraphJob>> {
    StubRenderer::ok(b"graph-bytes")
}

pub fn stub_qr() -> Arc<StubRenderer<QrJob>> {
    StubRenderer::ok(b"qr-bytes")
}

pub fn engines(
    charts: Arc<StubRenderer<ChartJob>>,
    graphs: Arc<StubRenderer<GraphJob>>,
    qr: Arc<StubRenderer<QrJob>>,
) -> Engines {
    Engines {
        charts,
        graphs,
        qr,
        translator: Arc::new(GoogleChartsTranslator),
    }
}

pub fn app_state(engines: Engines) -> Arc<AppState> {
    app_state_with_config(engines, Config::default())
}

pub fn app_state_with_config(engines: Engines, config: Config) -> Arc<AppState> {
    Arc::new(AppState {
        engines,
        telemetry: Telemetry::default(),
        config,
    })
}

/// A small real PNG plus its raw RGB pixels, for round-trip assertions.
pub fn sample_png() -> (Vec<u8>, Vec<u8>) {
    let mut img = image::RgbImage::new(3, 2);
    for (i, pixel) in img.pixels_mut().enumerate() {
        *pixel = image::Rgb([i as u8 + 10, i as u8 * 7, i as u8 * 13]);
    }
    let raw = img.as_raw().clone();
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    (out.into_inner(), raw)
}

pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

pub fn encode_query(pairs: &[(&str, &str)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}
