use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use deckgen_core::JsonMap;

use crate::contract::RenderError;
use crate::node::NodeRunner;

/// How a spreadsheet is mapped into nested JSON: header rows to skip and a
/// column→field mapping. The defaults mirror the conversion scripts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReadOptions {
    pub header_rows: u32,
    /// Column letter (or "*") to field-name template.
    pub column_to_key: JsonMap,
    /// Whether empty cells produce stub entries.
    pub sheet_stubs: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        let mut column_to_key = JsonMap::new();
        let _ = column_to_key.insert(
            "*".into(),
            serde_json::Value::String("{{columnHeader}}".into()),
        );
        Self {
            header_rows: 1,
            column_to_key,
            sheet_stubs: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExcelReply {
    success: bool,
    #[serde(default)]
    data: Option<JsonMap>,
    #[serde(default)]
    error: Option<String>,
}

/// Spreadsheet interop over the same node-script discipline as the renderer.
pub struct ExcelBridge {
    runner: NodeRunner,
    cancel: CancellationToken,
}

impl ExcelBridge {
    pub fn new(runner: NodeRunner) -> Self {
        Self {
            runner,
            cancel: CancellationToken::new(),
        }
    }

    /// Read a workbook into sheet → row-key → fields.
    pub async fn read_workbook(
        &self,
        path: &Path,
        options: &ReadOptions,
    ) -> Result<JsonMap, RenderError> {
        let params = serde_json::json!({
            "path": path.display().to_string(),
            "header": { "rows": options.header_rows },
            "columnToKey": options.column_to_key,
            "sheetStubs": options.sheet_stubs,
        });

        let stdout = self
            .runner
            .run_script("readExcel", &params, &self.cancel)
            .await?;
        let reply = parse_reply(&stdout)?;
        Ok(reply.data.unwrap_or_default())
    }

    /// Write rows out as a workbook; `extra_length` pads column widths.
    pub async fn write_workbook(
        &self,
        file_name: &str,
        sheets: &serde_json::Value,
        extra_length: u32,
    ) -> Result<(), RenderError> {
        let params = serde_json::json!({
            "fileName": file_name,
            "data": sheets,
            "extraLength": extra_length,
        });

        let stdout = self
            .runner
            .run_script("writeExcel", &params, &self.cancel)
            .await?;
        let _ = parse_reply(&stdout)?;
        Ok(())
    }
}

fn parse_reply(stdout: &str) -> Result<ExcelReply, RenderError> {
    let line = stdout
        .lines()
        .find(|l| l.trim_start().starts_with('{'))
        .ok_or_else(|| RenderError::InvalidReply(stdout.to_string()))?;
    let reply: ExcelReply =
        serde_json::from_str(line).map_err(|_| RenderError::InvalidReply(line.to_string()))?;
    if !reply.success {
        return Err(RenderError::Failed {
            diagnostics: reply.error.unwrap_or_else(|| "excel bridge failure".into()),
        });
    }
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_read_options_match_script_defaults() {
        let opts = ReadOptions::default();
        assert_eq!(opts.header_rows, 1);
        assert!(opts.sheet_stubs);
        assert_eq!(opts.column_to_key["*"], "{{columnHeader}}");
    }

    #[test]
    fn parse_reply_success_with_data() {
        let reply =
            parse_reply(r#"{"success": true, "data": {"Sheet1": {"内科": {"Y2021": 3}}}}"#)
                .unwrap();
        let data = reply.data.unwrap();
        assert!(data.contains_key("Sheet1"));
    }

    #[test]
    fn parse_reply_failure_carries_diagnostics() {
        let err = parse_reply(r#"{"success": false, "error": "no such sheet"}"#).unwrap_err();
        assert!(err.to_string().contains("no such sheet"));
    }

    #[test]
    fn parse_reply_garbage_is_invalid() {
        let err = parse_reply("node: something exploded").unwrap_err();
        assert!(matches!(err, RenderError::InvalidReply(_)));
    }
}
