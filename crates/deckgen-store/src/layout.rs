use std::path::{Path, PathBuf};

/// Where a named document lives: an explicit directory, or the layout's
/// per-format default folder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocLocation {
    pub dirname: Option<PathBuf>,
    pub basename: String,
}

impl DocLocation {
    pub fn new(basename: impl Into<String>) -> Self {
        Self {
            dirname: None,
            basename: basename.into(),
        }
    }

    pub fn in_dir(dir: impl Into<PathBuf>, basename: impl Into<String>) -> Self {
        Self {
            dirname: Some(dir.into()),
            basename: basename.into(),
        }
    }
}

/// Path derivation for the three interop formats. Must stay bit-compatible
/// with the existing on-disk layout: `data/JSON/`, `data/Excel/`,
/// `outputs/PPT/` unless the location carries its own directory.
#[derive(Clone, Debug)]
pub struct FileLayout {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for FileLayout {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("outputs"),
        }
    }
}

impl FileLayout {
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            data_dir: root.join("data"),
            output_dir: root.join("outputs"),
        }
    }

    pub fn json_path(&self, loc: &DocLocation) -> PathBuf {
        let file = format!("{}.json", loc.basename);
        match &loc.dirname {
            Some(dir) => dir.join(file),
            None => self.data_dir.join("JSON").join(file),
        }
    }

    /// `save_as_backup` appends the `_bu` suffix used when a rebuild keeps the
    /// previous spreadsheet around.
    pub fn excel_path(&self, loc: &DocLocation, save_as_backup: bool) -> PathBuf {
        let name = if save_as_backup {
            format!("{}_bu", loc.basename)
        } else {
            loc.basename.clone()
        };
        let file = format!("{name}.xlsx");
        match &loc.dirname {
            Some(dir) => dir.join(file),
            None => self.data_dir.join("Excel").join(file),
        }
    }

    /// The generator tag distinguishes which rendering backend produced the
    /// deck, e.g. `report.pg.pptx`.
    pub fn ppt_path(&self, loc: &DocLocation, generator_tag: &str) -> PathBuf {
        let file = format!("{}.{}.pptx", loc.basename, generator_tag);
        match &loc.dirname {
            Some(dir) => dir.join(file),
            None => self.output_dir.join("PPT").join(file),
        }
    }
}
