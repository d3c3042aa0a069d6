pub mod chartjs;
pub mod graphviz;
pub mod pdf;
pub mod qr;
pub mod translate;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use poem::http::StatusCode;

use crate::schemas::chart::{ChartJob, Params, TranslatedChart};
use crate::schemas::legacy::GraphJob;
use crate::schemas::qr::QrJob;

#[async_trait]
pub trait ChartRenderer: Send + Sync {
    async fn render(&self, job: &ChartJob) -> Result<Vec<u8>>;
}

#[async_trait]
pub trait GraphRenderer: Send + Sync {
    async fn render(&self, job: &GraphJob) -> Result<Vec<u8>>;
}

#[async_trait]
pub trait QrRenderer: Send + Sync {
    async fn render(&self, job: &QrJob) -> Result<Vec<u8>>;
}

pub trait LegacyTranslator: Send + Sync {
    fn translate(&self, params: &Params) -> Result<TranslatedChart>;
}

/// A failure normalized out of any external renderer.
#[derive(Debug)]
pub struct RenderFailure {
    pub message: String,
    pub status: StatusCode,
}

pub type RenderOutcome = Result<Vec<u8>, RenderFailure>;

/// Uniform call contract to the external renderers. Each call either
/// yields the rendered buffer or a normalized failure; there are no
/// retries, and how a failure is presented is the caller's decision.
#[derive(Clone)]
pub struct Engines {
    pub charts: Arc<dyn ChartRenderer>,
    pub graphs: Arc<dyn GraphRenderer>,
    pub qr: Arc<dyn QrRenderer>,
    pub translator: Arc<dyn LegacyTranslator>,
}

impl Engines {
    pub fn production() -> Result<Self> {
        Ok(Self {
            charts: Arc::new(chartjs::BrowserChartRenderer::new()?),
            graphs: Arc::new(graphviz::GraphvizCli),
            qr: Arc::new(qr::QrEncoder),
            translator: Arc::new(translate::GoogleChartsTranslator),
        })
    }

    pub async fn chart(&self, job: &ChartJob) -> RenderOutcome {
        normalize(self.charts.render(job).await, "chart")
    }

    pub async fn graph(&self, job: &GraphJob) -> RenderOutcome {
        normalize(self.graphs.render(job).await, "graph")
    }

    pub async fn qr(&self, job: &QrJob) -> RenderOutcome {
        normalize(self.qr.render(job).await, "qr")
    }
}

fn normalize(result: Result<Vec<u8>>, engine: &str) -> RenderOutcome {
    result.map_err(|err| {
        tracing::warn!("{} render failed: {:#}", engine, err);
        RenderFailure {
            message: err.to_string(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    })
}
