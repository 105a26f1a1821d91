//! External tool availability checking.

use std::path::PathBuf;

use crate::error::CliError;

/// Locate `tool` on PATH.
///
/// Checked before a build starts so a missing Xcode installation is reported
/// up front instead of halfway through the pipeline.
pub fn require_tool(tool: &str) -> Result<PathBuf, CliError> {
    match which::which(tool) {
        Ok(path) => {
            log::debug!("Found {} at: {}", tool, path.display());
            Ok(path)
        }
        Err(e) => {
            log::debug!("{} not found in PATH: {}", tool, e);
            Err(CliError::ToolNotFound {
                tool: tool.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tool_is_reported_by_name() {
        let err = require_tool("definitely-not-an-installed-tool-7f3a").unwrap_err();
        assert!(matches!(err, CliError::ToolNotFound { ref tool } if tool == "definitely-not-an-installed-tool-7f3a"));
    }
}
