use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use deckgen_core::JsonMap;
use deckgen_render::{ExcelBridge, ReadOptions};
use deckgen_store::{DocLocation, ValueStore};

use crate::alias::{AliasResolver, SELF_BUILT_ALIAS_LIBRARY};
use crate::error::EngineError;

/// Pulls a spreadsheet into the JSON data folder: workbook rows in, alias
/// normalization applied to the raw row names, one JSON document out.
/// Free-form names only ever enter the system through here.
pub struct ExcelImporter {
    store: Arc<ValueStore>,
    bridge: ExcelBridge,
    aliases: Arc<AliasResolver>,
}

impl ExcelImporter {
    pub fn new(store: Arc<ValueStore>, bridge: ExcelBridge, aliases: Arc<AliasResolver>) -> Self {
        Self {
            store,
            bridge,
            aliases,
        }
    }

    /// Import `data/Excel/<basename>.xlsx` into `data/JSON/<basename>.json`.
    /// Row keys are normalized through the self-built alias library; sheets
    /// are merged in workbook order. Returns the number of rows written.
    pub async fn import_workbook(
        &self,
        basename: &str,
        options: &ReadOptions,
    ) -> Result<usize, EngineError> {
        let loc = DocLocation::new(basename);
        let path = self.store.layout().excel_path(&loc, false);
        let sheets = self.bridge.read_workbook(&path, options).await?;

        let mut document = JsonMap::new();
        for rows in sheets.values() {
            let Some(rows) = rows.as_object() else {
                continue;
            };
            for (raw_name, fields) in rows {
                let canonical = self.aliases.normalize(raw_name, SELF_BUILT_ALIAS_LIBRARY)?;
                let _ = document.insert(canonical, fields.clone());
            }
        }

        self.store.store(&loc, &document)?;
        info!(
            basename,
            rows = document.len(),
            path = %path.display(),
            "workbook imported"
        );
        Ok(document.len())
    }

    /// Export a document back out as a workbook, for hand-editing round
    /// trips. `sheets` is passed to the writer script untouched.
    pub async fn export_workbook(
        &self,
        file_name: &str,
        sheets: &Value,
    ) -> Result<(), EngineError> {
        self.bridge.write_workbook(file_name, sheets, 5).await?;
        Ok(())
    }
}
