//! Coeffects Tools
//!
//! CLI tools for checking coeffect manifests.

use std::path::Path;

use anyhow::Context;
use clap::ValueEnum;
use coeffects_ast::{DeclId, Program};
use coeffects_check::{CheckError, CheckedProgram, DiagnosticFormatter, ResolvedContext};
use coeffects_foundation::CapabilityTag;
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize logging with a default filter.
///
/// Use `RUST_LOG` environment variable to override the default filter.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,coeffects_check=debug,coeffects_tools=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Read a JSON program manifest.
pub fn load_program(path: &Path) -> anyhow::Result<Program> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest '{}'", path.display()))?;
    serde_json::from_str(&source)
        .with_context(|| format!("failed to parse manifest '{}'", path.display()))
}

/// Report output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Reflection entry for one declaration.
#[derive(Debug, Clone, Serialize)]
pub struct DeclarationReport {
    pub id: DeclId,
    pub declared: Vec<String>,
    pub resolved: Option<ResolvedContext>,
    pub params: Vec<(String, CapabilityTag)>,
}

/// Outcome of checking one manifest.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub ok: bool,
    pub diagnostics: Vec<CheckError>,
    /// Only filled for programs that checked
    pub declarations: Vec<DeclarationReport>,
}

impl Report {
    pub fn new(result: &Result<CheckedProgram, Vec<CheckError>>) -> Self {
        match result {
            Ok(checked) => {
                let reflection = checked.reflection();
                let declarations = checked
                    .table()
                    .iter()
                    .map(|decl| DeclarationReport {
                        id: decl.id.clone(),
                        declared: reflection.declared_coeffects_of(&decl.id).unwrap_or_default(),
                        resolved: reflection.coeffects_of(&decl.id),
                        params: reflection.param_capabilities_of(&decl.id).unwrap_or_default(),
                    })
                    .collect();
                Self {
                    ok: true,
                    diagnostics: checked.warnings().to_vec(),
                    declarations,
                }
            }
            Err(errors) => Self {
                ok: false,
                diagnostics: errors.clone(),
                declarations: Vec::new(),
            },
        }
    }

    /// Render the report.
    pub fn render(&self, program: &Program, format: OutputFormat) -> anyhow::Result<String> {
        match format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(self).context("failed to serialize report")
            }
            OutputFormat::Text => Ok(self.render_text(program)),
        }
    }

    fn render_text(&self, program: &Program) -> String {
        let sources = program.source_map();
        let mut out = DiagnosticFormatter::new(&sources).format_all(&self.diagnostics);

        for decl in &self.declarations {
            let resolved = match &decl.resolved {
                Some(ctx) if ctx.is_upper_bound => format!("<= {}", ctx.tags),
                Some(ctx) => ctx.tags.to_string(),
                None => "?".to_string(),
            };
            out.push_str(&format!("{}: {}\n", decl.id, resolved));
            for (name, capability) in &decl.params {
                out.push_str(&format!("  ${}: {}\n", name, capability));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coeffects_check::{check, CheckOptions};

    #[test]
    fn test_report_lists_declarations_of_checked_program() {
        let program: Program = serde_json::from_str(
            r#"{ "functions": [
                { "name": "f", "contexts": ["rx"],
                  "params": [{ "name": "a", "capability": "mutable" }] }
            ] }"#,
        )
        .unwrap();
        let report = Report::new(&check(&program, &CheckOptions::default()));
        assert!(report.ok);
        assert_eq!(report.declarations.len(), 1);
        assert_eq!(
            report.declarations[0].params,
            vec![("a".to_string(), CapabilityTag::Mutable)]
        );

        let text = report.render(&program, OutputFormat::Text).unwrap();
        assert!(text.contains("f: "), "{}", text);
        assert!(text.contains("$a: mutable"), "{}", text);
    }
}
