use anyhow::{Result, anyhow, bail};
use serde_json::{Value, json};

use crate::core::LegacyTranslator;
use crate::schemas::chart::{DEFAULT_HEIGHT, DEFAULT_WIDTH, Params, TranslatedChart};
use crate::schemas::legacy::parse_size;

/// Translates the legacy image-chart parameter family into a canonical
/// chart document. Type codes and data encodings outside the supported
/// set fail translation; the caller reports those as unsupported
/// configurations.
pub struct GoogleChartsTranslator;

impl LegacyTranslator for GoogleChartsTranslator {
    fn translate(&self, params: &Params) -> Result<TranslatedChart> {
        let cht = params.get("cht").ok_or_else(|| anyhow!("missing `cht`"))?;
        let (kind, stacked) = chart_kind(cht)?;
        let series = parse_series(params.get("chd").ok_or_else(|| anyhow!("missing `chd`"))?)?;
        let (width, height) = params
            .get("chs")
            .and_then(parse_size)
            .unwrap_or((DEFAULT_WIDTH, DEFAULT_HEIGHT));

        let labels = split_list(params.get("chl"));
        let legends = split_list(params.get("chdl"));
        let colors: Vec<String> = params
            .get("chco")
            .map(|v| v.split([',', '|']).map(hex_color).collect())
            .unwrap_or_default();
        let background_color = params.get("chf").and_then(parse_fill);

        let pie_like = matches!(kind, "pie" | "doughnut");
        let datasets: Vec<Value> = series
            .iter()
            .enumerate()
            .map(|(i, data)| {
                let mut dataset = json!({ "data": data });
                if let Some(label) = legends.get(i) {
                    dataset["label"] = json!(label);
                }
                if pie_like {
                    if !colors.is_empty() {
                        dataset["backgroundColor"] = json!(colors);
                    }
                } else if let Some(color) = colors.get(i) {
                    dataset["backgroundColor"] = json!(color);
                    dataset["borderColor"] = json!(color);
                }
                dataset
            })
            .collect();

        let chart_labels = if labels.is_empty() {
            index_labels(&series)
        } else {
            labels
        };

        let mut config = json!({
            "type": kind,
            "data": { "labels": chart_labels, "datasets": datasets },
            "options": { "legend": { "display": !legends.is_empty() } }
        });
        if stacked {
            config["options"]["scales"] = json!({
                "xAxes": [{ "stacked": true }],
                "yAxes": [{ "stacked": true }]
            });
        }
        if let Some(title) = params.get("chtt") {
            config["options"]["title"] = json!({ "display": true, "text": title });
        }

        Ok(TranslatedChart {
            chart: config.to_string(),
            width,
            height,
            background_color,
        })
    }
}

fn chart_kind(cht: &str) -> Result<(&'static str, bool)> {
    Ok(match cht {
        "p" | "p3" => ("pie", false),
        "pc" => ("doughnut", false),
        "lc" | "ls" => ("line", false),
        "bvs" => ("bar", true),
        "bvg" => ("bar", false),
        "bhs" => ("horizontalBar", true),
        "bhg" => ("horizontalBar", false),
        other => bail!("Unsupported chart type `{other}`"),
    })
}

fn parse_series(chd: &str) -> Result<Vec<Vec<Value>>> {
    let (scheme, payload) = chd
        .split_once(':')
        .ok_or_else(|| anyhow!("unparseable `chd` value `{chd}`"))?;
    match scheme {
        "t" => payload
            .split('|')
            .map(|series| {
                series
                    .split(',')
                    .map(|v| {
                        if v == "_" || v.is_empty() {
                            Ok(Value::Null)
                        } else {
                            v.parse::<f64>()
                                .map(|n| json!(n))
                                .map_err(|_| anyhow!("invalid data point `{v}`"))
                        }
                    })
                    .collect::<Result<Vec<Value>>>()
            })
            .collect(),
        "s" => payload
            .split(',')
            .map(|series| series.chars().map(simple_value).collect::<Result<Vec<Value>>>())
            .collect(),
        other => bail!("Unsupported data encoding `{other}`"),
    }
}

/// Simple encoding maps `A-Za-z0-9` to 0..=61; `_` is a gap.
fn simple_value(c: char) -> Result<Value> {
    let index = match c {
        'A'..='Z' => (c as u32) - ('A' as u32),
        'a'..='z' => (c as u32) - ('a' as u32) + 26,
        '0'..='9' => (c as u32) - ('0' as u32) + 52,
        '_' => return Ok(Value::Null),
        other => bail!("invalid simple-encoded data point `{other}`"),
    };
    Ok(json!(index))
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|v| v.split('|').map(str::to_string).collect())
        .unwrap_or_default()
}

fn index_labels(series: &[Vec<Value>]) -> Vec<String> {
    let n = series.iter().map(Vec::len).max().unwrap_or(0);
    (0..n).map(|i| i.to_string()).collect()
}

fn hex_color(raw: &str) -> String {
    format!("#{}", raw.trim_start_matches('#'))
}

/// Background fills come in as `bg,s,RRGGBB`; gradients are unsupported.
fn parse_fill(chf: &str) -> Option<String> {
    let mut parts = chf.split(',');
    if parts.next()? != "bg" || parts.next()? != "s" {
        return None;
    }
    Some(hex_color(parts.next()?))
}
