//! Spreadsheet sync engine
//!
//! Keeps every registered spreadsheet's header and body rows in agreement
//! with the record store. Mirroring is strictly best-effort: a failure on one
//! spreadsheet is logged and never blocks the others, and nothing on this
//! path propagates to a user-facing request.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::schemas::{SheetRegistration, SubmissionDoc, SHEETS_COLLECTION};
use crate::db::MongoClient;
use crate::sheets::client::SheetsApi;
use crate::sheets::codec::{encode_row, HEADER};
use crate::types::Result;

/// Source of sheet registrations (the set of sync destinations)
#[async_trait]
pub trait RegistrationSource: Send + Sync {
    async fn list_registrations(&self) -> Result<Vec<SheetRegistration>>;
}

/// Registrations read from the record store's `sheets` collection
pub struct MongoRegistrations {
    mongo: MongoClient,
}

impl MongoRegistrations {
    pub fn new(mongo: MongoClient) -> Self {
        Self { mongo }
    }
}

#[async_trait]
impl RegistrationSource for MongoRegistrations {
    async fn list_registrations(&self) -> Result<Vec<SheetRegistration>> {
        let collection = self
            .mongo
            .collection::<SheetRegistration>(SHEETS_COLLECTION)
            .await?;
        collection.find_many(bson::doc! {}).await
    }
}

/// Mirrors submissions into every registered spreadsheet
pub struct SheetSyncEngine {
    registrations: Arc<dyn RegistrationSource>,
    api: Arc<dyn SheetsApi>,
}

impl SheetSyncEngine {
    pub fn new(registrations: Arc<dyn RegistrationSource>, api: Arc<dyn SheetsApi>) -> Self {
        Self { registrations, api }
    }

    /// Ensure the header row exists in every registered spreadsheet.
    ///
    /// Called at startup. Idempotent; a failure on one spreadsheet is logged
    /// and does not abort the others.
    pub async fn ensure_all_headers(&self) {
        let registrations = match self.registrations.list_registrations().await {
            Ok(r) => r,
            Err(e) => {
                warn!("Failed to fetch sheet registrations: {}", e);
                return;
            }
        };

        for sheet in &registrations {
            if let Err(e) = self
                .ensure_headers(&sheet.spreadsheet_id, &sheet.spreadsheet_name)
                .await
            {
                warn!(
                    sheet = %sheet.spreadsheet_name,
                    "Failed to ensure headers: {}", e
                );
            }
        }
    }

    /// Ensure the header row exists in one spreadsheet (no-op when present)
    pub async fn ensure_headers(&self, spreadsheet_id: &str, sheet_name: &str) -> Result<()> {
        let read_range = format!("'{}'!A1:A1", sheet_name);
        let rows = self.api.read_range(spreadsheet_id, &read_range).await?;

        let header_present = rows
            .first()
            .and_then(|row| row.first())
            .map(|cell| !cell.is_empty())
            .unwrap_or(false);

        if header_present {
            info!(sheet = %sheet_name, "Spreadsheet headers already exist");
            return Ok(());
        }

        let header: Vec<String> = HEADER.iter().map(|h| h.to_string()).collect();
        self.api
            .update_range(spreadsheet_id, &format!("'{}'!A1", sheet_name), vec![header])
            .await?;
        info!(sheet = %sheet_name, "Spreadsheet headers written");
        Ok(())
    }

    /// Append a freshly created submission to every registered spreadsheet
    pub async fn append_submission(&self, submission: &SubmissionDoc, field_name: &str) -> Result<()> {
        let registrations = self.registrations.list_registrations().await?;
        let row = encode_row(submission, field_name);

        for sheet in &registrations {
            let range = format!("'{}'!A:A", sheet.spreadsheet_name);
            match self
                .api
                .append_row(&sheet.spreadsheet_id, &range, row.clone())
                .await
            {
                Ok(()) => info!(
                    submission = %submission.id,
                    sheet = %sheet.spreadsheet_name,
                    "Appended submission to spreadsheet"
                ),
                Err(e) => warn!(
                    submission = %submission.id,
                    sheet = %sheet.spreadsheet_name,
                    "Failed to append submission: {}", e
                ),
            }
        }
        Ok(())
    }

    /// Overwrite an updated submission's row in every registered spreadsheet.
    ///
    /// Column A is scanned for the submission id; when the row was never
    /// written (a sheet registered later, or an earlier failed append) the
    /// update falls back to appending, so the sheet heals itself.
    pub async fn update_submission(&self, submission: &SubmissionDoc, field_name: &str) -> Result<()> {
        let registrations = self.registrations.list_registrations().await?;
        let row = encode_row(submission, field_name);

        for sheet in &registrations {
            let column_range = format!("'{}'!A:A", sheet.spreadsheet_name);
            let column = match self.api.read_range(&sheet.spreadsheet_id, &column_range).await {
                Ok(c) => c,
                Err(e) => {
                    warn!(
                        sheet = %sheet.spreadsheet_name,
                        "Failed to read spreadsheet for update: {}", e
                    );
                    continue;
                }
            };

            let row_index = column
                .iter()
                .position(|r| r.first().map(|cell| cell == &submission.id).unwrap_or(false));

            match row_index {
                None => {
                    info!(
                        submission = %submission.id,
                        sheet = %sheet.spreadsheet_name,
                        "Submission not found in spreadsheet, appending instead"
                    );
                    if let Err(e) = self
                        .api
                        .append_row(&sheet.spreadsheet_id, &column_range, row.clone())
                        .await
                    {
                        warn!(
                            sheet = %sheet.spreadsheet_name,
                            "Failed to append fallback row: {}", e
                        );
                    }
                }
                Some(index) => {
                    // Sheets rows are 1-based
                    let target = format!("'{}'!A{}", sheet.spreadsheet_name, index + 1);
                    match self
                        .api
                        .update_range(&sheet.spreadsheet_id, &target, vec![row.clone()])
                        .await
                    {
                        Ok(()) => info!(
                            submission = %submission.id,
                            sheet = %sheet.spreadsheet_name,
                            row = index + 1,
                            "Updated submission in spreadsheet"
                        ),
                        Err(e) => warn!(
                            sheet = %sheet.spreadsheet_name,
                            "Failed to update spreadsheet row: {}", e
                        ),
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::submission::{GeoPoint, PlantConditions, TraitMeasurements};
    use crate::types::Error;
    use chrono::TimeZone;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct StaticRegistrations(Vec<SheetRegistration>);

    #[async_trait]
    impl RegistrationSource for StaticRegistrations {
        async fn list_registrations(&self) -> Result<Vec<SheetRegistration>> {
            Ok(self.0.clone())
        }
    }

    /// In-memory spreadsheet backend keyed by spreadsheet id
    #[derive(Default)]
    struct MockSheets {
        grids: Mutex<HashMap<String, Vec<Vec<String>>>>,
        failing: HashSet<String>,
        update_calls: AtomicUsize,
    }

    impl MockSheets {
        fn grid(&self, spreadsheet_id: &str) -> Vec<Vec<String>> {
            self.grids
                .lock()
                .unwrap()
                .get(spreadsheet_id)
                .cloned()
                .unwrap_or_default()
        }

        fn check_failing(&self, spreadsheet_id: &str) -> Result<()> {
            if self.failing.contains(spreadsheet_id) {
                Err(Error::Sheets("backend unavailable".to_string()))
            } else {
                Ok(())
            }
        }
    }

    /// Extract the 1-based row number from a range like `'Log'!A3`
    fn target_row(range: &str) -> usize {
        let after_bang = range.rsplit('!').next().unwrap_or(range);
        after_bang
            .trim_start_matches('A')
            .parse::<usize>()
            .expect("range should target a single row")
    }

    #[async_trait]
    impl SheetsApi for MockSheets {
        async fn read_range(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<String>>> {
            self.check_failing(spreadsheet_id)?;
            let grid = self.grid(spreadsheet_id);

            if range.ends_with("A1:A1") {
                Ok(grid
                    .first()
                    .map(|row| vec![vec![row.first().cloned().unwrap_or_default()]])
                    .unwrap_or_default())
            } else {
                // Column A read
                Ok(grid
                    .iter()
                    .map(|row| vec![row.first().cloned().unwrap_or_default()])
                    .collect())
            }
        }

        async fn update_range(
            &self,
            spreadsheet_id: &str,
            range: &str,
            rows: Vec<Vec<String>>,
        ) -> Result<()> {
            self.check_failing(spreadsheet_id)?;
            self.update_calls.fetch_add(1, Ordering::Relaxed);

            let index = target_row(range) - 1;
            let mut grids = self.grids.lock().unwrap();
            let grid = grids.entry(spreadsheet_id.to_string()).or_default();
            while grid.len() <= index {
                grid.push(Vec::new());
            }
            grid[index] = rows.into_iter().next().unwrap_or_default();
            Ok(())
        }

        async fn append_row(
            &self,
            spreadsheet_id: &str,
            _range: &str,
            row: Vec<String>,
        ) -> Result<()> {
            self.check_failing(spreadsheet_id)?;
            self.grids
                .lock()
                .unwrap()
                .entry(spreadsheet_id.to_string())
                .or_default()
                .push(row);
            Ok(())
        }
    }

    fn registration(id: &str, name: &str) -> SheetRegistration {
        SheetRegistration {
            spreadsheet_id: id.to_string(),
            spreadsheet_name: name.to_string(),
        }
    }

    fn sample_submission(id: &str) -> SubmissionDoc {
        let date = chrono::Utc.with_ymd_and_hms(2024, 3, 1, 6, 30, 0).unwrap();
        SubmissionDoc {
            id: id.to_string(),
            user_id: "user-1".to_string(),
            field_id: "field-1".to_string(),
            other_field_name: String::new(),
            coordinates: GeoPoint::default(),
            date,
            growth_stage: "Tillering".to_string(),
            plant_conditions: PlantConditions::default(),
            trait_measurements: TraitMeasurements::default(),
            notes: String::new(),
            observer_name: "Alice".to_string(),
            images: vec![],
            videos: vec![],
            audio: vec![],
            status: "submitted".to_string(),
            created_at: date,
            updated_at: date,
        }
    }

    fn engine_with(
        registrations: Vec<SheetRegistration>,
        api: Arc<MockSheets>,
    ) -> SheetSyncEngine {
        SheetSyncEngine::new(Arc::new(StaticRegistrations(registrations)), api)
    }

    #[tokio::test]
    async fn test_ensure_headers_is_idempotent() {
        let api = Arc::new(MockSheets::default());
        let engine = engine_with(vec![registration("ss-1", "Log")], Arc::clone(&api));

        engine.ensure_headers("ss-1", "Log").await.unwrap();
        engine.ensure_headers("ss-1", "Log").await.unwrap();

        let grid = api.grid("ss-1");
        assert_eq!(grid.len(), 1);
        assert_eq!(grid[0][0], "ID");
        assert_eq!(grid[0].len(), HEADER.len());
        assert_eq!(api.update_calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_append_then_update_leaves_one_row() {
        let api = Arc::new(MockSheets::default());
        let engine = engine_with(vec![registration("ss-1", "Log")], Arc::clone(&api));
        engine.ensure_headers("ss-1", "Log").await.unwrap();

        let mut submission = sample_submission("sub-1");
        engine.append_submission(&submission, "North paddy").await.unwrap();

        submission.growth_stage = "Booting".to_string();
        engine.update_submission(&submission, "North paddy").await.unwrap();

        let grid = api.grid("ss-1");
        let matching: Vec<_> = grid.iter().filter(|row| row.first().map(String::as_str) == Some("sub-1")).collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0][5], "Booting");
    }

    #[tokio::test]
    async fn test_update_missing_submission_falls_back_to_append() {
        let api = Arc::new(MockSheets::default());
        let engine = engine_with(vec![registration("ss-1", "Log")], Arc::clone(&api));
        engine.ensure_headers("ss-1", "Log").await.unwrap();

        let submission = sample_submission("sub-9");
        engine.update_submission(&submission, "North paddy").await.unwrap();

        let grid = api.grid("ss-1");
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[1][0], "sub-9");
    }

    #[tokio::test]
    async fn test_one_failing_sheet_does_not_block_the_rest() {
        let mut api = MockSheets::default();
        api.failing.insert("ss-bad".to_string());
        let api = Arc::new(api);

        let engine = engine_with(
            vec![registration("ss-bad", "Broken"), registration("ss-ok", "Log")],
            Arc::clone(&api),
        );

        let submission = sample_submission("sub-1");
        engine.append_submission(&submission, "North paddy").await.unwrap();

        assert!(api.grid("ss-bad").is_empty());
        let ok_grid = api.grid("ss-ok");
        assert_eq!(ok_grid.len(), 1);
        assert_eq!(ok_grid[0][0], "sub-1");
    }

    #[tokio::test]
    async fn test_ensure_all_headers_survives_per_sheet_failure() {
        let mut api = MockSheets::default();
        api.failing.insert("ss-bad".to_string());
        let api = Arc::new(api);

        let engine = engine_with(
            vec![registration("ss-bad", "Broken"), registration("ss-ok", "Log")],
            Arc::clone(&api),
        );

        engine.ensure_all_headers().await;

        let ok_grid = api.grid("ss-ok");
        assert_eq!(ok_grid[0][0], "ID");
    }
}
