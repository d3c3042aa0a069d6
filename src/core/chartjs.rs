use std::ffi::OsStr;
use std::sync::{Arc, Mutex};
use std::thread::sleep;
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use headless_chrome::{Browser, LaunchOptions, Tab, protocol::cdp::Page};

use crate::core::ChartRenderer;
use crate::schemas::chart::{ChartJob, ImageKind};

struct TabGuard {
    tab: Arc<Tab>,
}

impl TabGuard {
    fn new(tab: Arc<Tab>) -> Self {
        Self { tab }
    }

    fn as_ref(&self) -> &Arc<Tab> {
        &self.tab
    }
}

impl Drop for TabGuard {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(true) {
            tracing::warn!("Failed to close tab during cleanup: {}", e);
        }
    }
}

/// Renders chart documents with Chart.js inside headless Chrome. The
/// browser is created on first use and recreated when it crashes.
#[derive(Clone)]
pub struct BrowserChartRenderer {
    browser: Arc<Mutex<Option<Browser>>>,
    launch_options: LaunchOptions<'static>,
}

impl BrowserChartRenderer {
    pub fn new() -> Result<Self> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .args(vec![
                OsStr::new("--no-sandbox"),
                OsStr::new("--disable-setuid-sandbox"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-software-rasterizer"),
                OsStr::new("--disable-extensions"),
                OsStr::new("--disable-background-networking"),
                OsStr::new("--disable-sync"),
                OsStr::new("--metrics-recording-only"),
                OsStr::new("--mute-audio"),
                OsStr::new("--no-first-run"),
                OsStr::new("--disable-default-apps"),
            ])
            .build()
            .map_err(|_| anyhow!("Could not find Chrome/Chromium binary"))?;

        Ok(Self {
            browser: Arc::new(Mutex::new(None)),
            launch_options,
        })
    }

    fn get_or_create_browser(&self) -> Result<Browser> {
        let mut browser_lock = self.browser.lock().unwrap();

        // Check if browser exists and is alive
        if let Some(ref browser) = *browser_lock {
            match browser.new_tab() {
                Ok(tab) => {
                    let _ = tab.close(true);
                    return Ok(browser.clone());
                }
                Err(_) => {
                    tracing::warn!("Browser health check failed, recreating");
                    *browser_lock = None;
                }
            }
        }

        let new_browser = Browser::new(self.launch_options.clone())?;
        *browser_lock = Some(new_browser.clone());

        Ok(new_browser)
    }

    fn render_sync(&self, job: &ChartJob) -> Result<Vec<u8>> {
        let html = page_html(job);

        let browser = self.get_or_create_browser().or_else(|e| {
            tracing::warn!("First browser creation failed: {}, retrying...", e);
            *self.browser.lock().unwrap() = None;
            self.get_or_create_browser()
        })?;
        let tab = browser.new_tab()?;
        let tab_guard = TabGuard::new(tab);
        let tab = tab_guard.as_ref();

        tab.set_bounds(headless_chrome::types::Bounds::Normal {
            left: Some(0),
            top: Some(0),
            width: Some(job.width as f64),
            height: Some(job.height as f64),
        })?;

        let scale_factor = job.device_pixel_ratio.unwrap_or(1.0);
        if scale_factor != 1.0 {
            tab.call_method(
                headless_chrome::protocol::cdp::Emulation::SetDeviceMetricsOverride {
                    width: job.width,
                    height: job.height,
                    device_scale_factor: scale_factor,
                    mobile: false,
                    scale: Some(scale_factor),
                    screen_width: Some(job.width),
                    screen_height: Some(job.height),
                    position_x: Some(0),
                    position_y: Some(0),
                    dont_set_visible_size: None,
                    screen_orientation: None,
                    viewport: None,
                    display_feature: None,
                    device_posture: None,
                },
            )?;
        }

        let data_url = format!(
            "data:text/html;base64,{}",
            general_purpose::STANDARD.encode(&html)
        );
        tab.navigate_to(&data_url)?;

        tab.wait_for_element_with_custom_timeout("#chart-canvas", Duration::from_secs(10))?;
        wait_for_render_ready(tab)?;

        match job.format {
            ImageKind::Png => Ok(tab.capture_screenshot(
                Page::CaptureScreenshotFormatOption::Png,
                None,
                None,
                true,
            )?),
            ImageKind::Svg => {
                let svg = tab
                    .evaluate(SVG_SNAPSHOT, false)?
                    .value
                    .and_then(|v| v.as_str().map(String::from))
                    .ok_or_else(|| anyhow!("Chart did not produce a vector snapshot"))?;
                Ok(svg.into_bytes())
            }
        }
    }
}

#[async_trait]
impl ChartRenderer for BrowserChartRenderer {
    async fn render(&self, job: &ChartJob) -> Result<Vec<u8>> {
        let renderer = self.clone();
        let job = job.clone();

        tokio::task::spawn_blocking(move || renderer.render_sync(&job))
            .await
            .map_err(|e| anyhow!("Task join error: {}", e))?
    }
}

fn wait_for_render_ready(tab: &Arc<Tab>) -> Result<()> {
    const MAX_ATTEMPTS: u32 = 50;
    const POLL_INTERVAL_MS: u64 = 100;
    let poll_interval = Duration::from_millis(POLL_INTERVAL_MS);
    let mut attempts = 0;

    while attempts < MAX_ATTEMPTS {
        let ready: bool = tab
            .evaluate("window.renderReady === true", false)?
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        if ready {
            // Let the current animation frame settle before capture.
            sleep(poll_interval);
            return Ok(());
        }

        let error: Option<String> = tab
            .evaluate("window.renderError", false)?
            .value
            .and_then(|v| v.as_str().map(String::from));

        if let Some(err) = error {
            return Err(anyhow!("Chart initialization failed: {}", err));
        }

        sleep(poll_interval);
        attempts += 1;
    }

    Err(anyhow!(
        "Timeout waiting for chart to render after {} attempts",
        MAX_ATTEMPTS
    ))
}

/// The chart document is inserted verbatim: it is a JavaScript expression
/// in the chart-description language, evaluated inside the sandboxed page.
fn page_html(job: &ChartJob) -> String {
    PAGE_TEMPLATE
        .replace("__WIDTH__", &job.width.to_string())
        .replace("__HEIGHT__", &job.height.to_string())
        .replace(
            "__BACKGROUND__",
            job.background_color.as_deref().unwrap_or("transparent"),
        )
        .replace("__CDN__", &cdn_url(&job.version))
        .replace("__CHART__", &job.chart)
}

/// The CDN file layout changed across engine major versions.
fn cdn_url(version: &str) -> String {
    match version.split('.').next() {
        Some("2") => format!("https://cdn.jsdelivr.net/npm/chart.js@{version}/dist/Chart.min.js"),
        Some("3") => format!("https://cdn.jsdelivr.net/npm/chart.js@{version}/dist/chart.min.js"),
        _ => format!("https://cdn.jsdelivr.net/npm/chart.js@{version}/dist/chart.umd.js"),
    }
}

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Chart</title>
    <style>
        * {
            margin: 0;
            padding: 0;
            box-sizing: border-box;
        }
        body {
            background: __BACKGROUND__;
            overflow: hidden;
        }
        #chart-container {
            width: __WIDTH__px;
            height: __HEIGHT__px;
        }
        #chart-canvas {
            display: block;
        }
    </style>
</head>
<body>
    <div id="chart-container">
        <canvas id="chart-canvas"></canvas>
    </div>

    <script src="__CDN__"></script>

    <script>
        window.renderReady = false;
        window.renderError = null;

        window.addEventListener('DOMContentLoaded', () => {
            try {
                const ctx = document.getElementById('chart-canvas').getContext('2d');
                window.chartInstance = new Chart(ctx, __CHART__);
                window.renderReady = true;
            } catch (error) {
                window.renderError = error.message;
            }
        });
    </script>
</body>
</html>"#;

const SVG_SNAPSHOT: &str = r#"(() => {
    const canvas = document.getElementById('chart-canvas');
    const data = canvas.toDataURL('image/png');
    const w = canvas.width;
    const h = canvas.height;
    return '<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="' + w + '" height="' + h + '">'
        + '<image width="' + w + '" height="' + h + '" xlink:href="' + data + '"/></svg>';
})()"#;
