//! Output formatting and table rendering
//!
//! Results print as box-drawn tables for humans, or as JSON/YAML for
//! tools that consume the mapping downstream.

use crate::config::OutputFormat;
use crate::error::{Error, Result};
use crate::quant::{CalibrationReport, OperatorMapping, PolicyId, QParams, QuantizationConfig};
use serde::Serialize;

/// A formatted table for terminal output.
#[derive(Debug, Clone)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    column_widths: Vec<usize>,
}

impl Table {
    /// Get the table headers.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Get the table rows.
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Render the table as a string.
    pub fn render(&self) -> String {
        if self.headers.is_empty() {
            return String::new();
        }

        let mut output = String::new();
        output.push_str(&self.render_border('┌', '┬', '┐'));
        output.push_str(&self.render_row(&self.headers));
        output.push_str(&self.render_border('├', '┼', '┤'));
        for row in &self.rows {
            output.push_str(&self.render_row(row));
        }
        output.push_str(&self.render_border('└', '┴', '┘'));
        output
    }

    fn render_border(&self, left: char, mid: char, right: char) -> String {
        let mut line = String::new();
        line.push(left);
        for (i, width) in self.column_widths.iter().enumerate() {
            line.push_str(&"─".repeat(*width + 2));
            if i < self.column_widths.len() - 1 {
                line.push(mid);
            }
        }
        line.push(right);
        line.push('\n');
        line
    }

    fn render_row(&self, values: &[String]) -> String {
        let mut line = String::new();
        line.push('│');
        for (i, width) in self.column_widths.iter().enumerate() {
            let value = values.get(i).map_or("", String::as_str);
            line.push(' ');
            line.push_str(&format!("{:width$}", value, width = *width));
            line.push(' ');
            if i < self.column_widths.len() - 1 {
                line.push('│');
            }
        }
        line.push('│');
        line.push('\n');
        line
    }
}

/// Builder for creating tables.
#[derive(Debug, Default)]
pub struct TableBuilder {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the table headers.
    pub fn headers(mut self, headers: Vec<impl Into<String>>) -> Self {
        self.headers = headers.into_iter().map(Into::into).collect();
        self
    }

    /// Add a row to the table.
    pub fn row(mut self, row: Vec<impl Into<String>>) -> Self {
        self.rows.push(row.into_iter().map(Into::into).collect());
        self
    }

    /// Build the table.
    pub fn build(self) -> Table {
        let mut column_widths: Vec<usize> =
            self.headers.iter().map(|h| h.chars().count()).collect();

        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if i < column_widths.len() {
                    column_widths[i] = column_widths[i].max(cell.chars().count());
                }
            }
        }

        Table {
            headers: self.headers,
            rows: self.rows,
            column_widths,
        }
    }
}

/// Serialize a value as pretty JSON or YAML
///
/// `OutputFormat::Text` falls back to JSON; callers render tables themselves.
pub fn to_structured<T: Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Yaml => {
            serde_yaml::to_string(value).map_err(|e| Error::Serialization(e.to_string()))
        }
        OutputFormat::Json | OutputFormat::Text => {
            serde_json::to_string_pretty(value).map_err(|e| Error::Serialization(e.to_string()))
        }
    }
}

/// Catalog listing
pub fn policy_table(policies: &[PolicyId]) -> Table {
    policies
        .iter()
        .fold(
            TableBuilder::new().headers(vec!["Policy", "Alias", "Description"]),
            |builder, policy| {
                builder.row(vec![policy.as_str(), policy.alias(), policy.description()])
            },
        )
        .build()
}

/// One resolved config, activation and weight side by side
pub fn config_table(config: &QuantizationConfig) -> Table {
    let a = &config.activation;
    let w = &config.weight;
    TableBuilder::new()
        .headers(vec!["Field", "Activation", "Weight"])
        .row(vec!["range".to_string(), a.range.to_string(), w.range.to_string()])
        .row(vec!["symmetry".to_string(), a.symmetry.to_string(), w.symmetry.to_string()])
        .row(vec![
            "granularity".to_string(),
            "per-tensor".to_string(),
            w.granularity.to_string(),
        ])
        .row(vec![
            "scale".to_string(),
            a.scale_quantization.to_string(),
            w.scale_quantization.to_string(),
        ])
        .row(vec!["observer".to_string(), a.observer.to_string(), w.observer.to_string()])
        .row(vec![
            "fake-quantize".to_string(),
            apply_or_bypass(a.bypass).to_string(),
            apply_or_bypass(w.bypass).to_string(),
        ])
        .build()
}

fn apply_or_bypass(bypass: bool) -> &'static str {
    if bypass {
        "bypass"
    } else {
        "apply"
    }
}

/// Operator mapping, one row per operator type
pub fn mapping_table(mapping: &OperatorMapping) -> Table {
    let mut builder = TableBuilder::new().headers(vec![
        "Operator",
        "Policy",
        "Activation",
        "Weight",
        "Granularity",
        "Observer",
    ]);
    let global = mapping.global.as_ref().map(|config| ("*".to_string(), config));
    for (op, config) in mapping
        .operators
        .iter()
        .map(|(op, config)| (op.to_string(), config))
        .chain(global)
    {
        builder = builder.row(vec![
            op,
            config.policy.to_string(),
            config.activation.range.to_string(),
            config.weight.range.to_string(),
            config.weight.granularity.to_string(),
            config.activation.observer.to_string(),
        ]);
    }
    builder.build()
}

/// Calibrated quantization parameters, one row per group
pub fn calibration_table(report: &CalibrationReport) -> Table {
    let mut builder =
        TableBuilder::new().headers(vec!["Tensor", "Group", "Scale", "Zero point"]);
    builder = qparams_rows(builder, "activation", &report.activation);
    builder = qparams_rows(builder, "weight", &report.weight);
    builder.build()
}

fn qparams_rows(mut builder: TableBuilder, tensor: &str, qparams: &QParams) -> TableBuilder {
    for group in 0..qparams.num_groups() {
        let (scale, zero_point) = qparams.group(group);
        builder = builder.row(vec![
            tensor.to_string(),
            group.to_string(),
            format!("{scale:.6e}"),
            zero_point.to_string(),
        ]);
    }
    builder
}
