use serde::Serialize;

/// A page (or file) that failed or was skipped, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageOutcome {
    pub target: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenAsset {
    pub file: String,
    pub asset: String,
}

/// Run summary written as JSON once a command finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub total_pages: usize,
    pub succeeded: usize,
    pub images_downloaded: usize,
    pub links_rewritten: usize,
    pub images_removed_as_duplicate: usize,
    pub cover_duplicates_removed: usize,
    pub failures: Vec<PageOutcome>,
    pub skipped: Vec<PageOutcome>,
    pub warnings: Vec<String>,
    pub broken_asset_paths_suspected: Vec<BrokenAsset>,
    pub missing_css_after_fix: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_used: Option<String>,
}

impl MigrationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, target: impl Into<String>, reason: impl Into<String>) {
        self.failures.push(PageOutcome {
            target: target.into(),
            reason: reason.into(),
        });
    }

    pub fn record_skip(&mut self, target: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push(PageOutcome {
            target: target.into(),
            reason: reason.into(),
        });
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn record_broken_asset(&mut self, file: impl Into<String>, asset: impl Into<String>) {
        self.broken_asset_paths_suspected.push(BrokenAsset {
            file: file.into(),
            asset: asset.into(),
        });
    }

    /// Pretty JSON with a trailing newline.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }
}
