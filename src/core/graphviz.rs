use std::process::Stdio;

use anyhow::{Context, Result, anyhow, bail, ensure};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::core::GraphRenderer;
use crate::schemas::chart::ImageKind;
use crate::schemas::legacy::GraphJob;

const LAYOUT_ENGINES: &[&str] = &[
    "dot",
    "neato",
    "fdp",
    "sfdp",
    "circo",
    "twopi",
    "osage",
    "patchwork",
];

const RENDER_DPI: f64 = 96.0;

/// Graph layout via the graphviz `dot` binary. The document is piped
/// over stdin; the engine name is untrusted input and must be one of the
/// known layout engines.
pub struct GraphvizCli;

#[async_trait]
impl GraphRenderer for GraphvizCli {
    async fn render(&self, job: &GraphJob) -> Result<Vec<u8>> {
        ensure!(
            LAYOUT_ENGINES.contains(&job.engine.as_str()),
            "Unknown layout engine `{}`",
            job.engine
        );

        let mut cmd = Command::new("dot");
        cmd.arg(format!("-K{}", job.engine));
        cmd.arg(format!(
            "-T{}",
            match job.format {
                ImageKind::Png => "png",
                ImageKind::Svg => "svg",
            }
        ));
        if let (Some(width), Some(height)) = (job.width, job.height) {
            cmd.arg(format!(
                "-Gsize={:.2},{:.2}!",
                width as f64 / RENDER_DPI,
                height as f64 / RENDER_DPI
            ));
            cmd.arg(format!("-Gdpi={RENDER_DPI}"));
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().context("failed to launch graphviz")?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("graphviz stdin unavailable"))?;
        stdin.write_all(job.document.as_bytes()).await?;
        drop(stdin);

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            bail!(
                "graphviz failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(output.stdout)
    }
}
