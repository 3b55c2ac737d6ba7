//! JSON rendering of check results.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use zone_harvest_toolbox::CheckReport;

/// Serialize `reports` as one JSON array, pretty-printed unless `compact`.
pub fn render(reports: &[CheckReport], compact: bool) -> serde_json::Result<String> {
    if compact {
        serde_json::to_string(reports)
    } else {
        serde_json::to_string_pretty(reports)
    }
}

/// Write the rendered document to `output`, or to stdout.
pub fn emit(reports: &[CheckReport], compact: bool, output: Option<&Path>) -> anyhow::Result<()> {
    let document = render(reports, compact).context("Failed to serialize results")?;
    match output {
        Some(path) => {
            fs::write(path, format!("{document}\n"))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Results written to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{document}").context("Failed to write to stdout")?;
        }
    }
    Ok(())
}
