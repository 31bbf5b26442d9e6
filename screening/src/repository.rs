use crate::error::Result;
use crate::types::ScreeningRecord;
use dashmap::DashMap;

/// Persistence for screening runs.
pub trait ScreeningRepository: Send + Sync {
    fn save_screening(&self, record: &ScreeningRecord) -> Result<()>;

    /// All screenings for an entity, newest first
    fn find_screenings(&self, entity_id: &str) -> Result<Vec<ScreeningRecord>>;
}

#[derive(Debug, Default)]
pub struct InMemoryScreeningRepository {
    // entity_id -> records in insertion order
    records: DashMap<String, Vec<ScreeningRecord>>,
}

impl InMemoryScreeningRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScreeningRepository for InMemoryScreeningRepository {
    fn save_screening(&self, record: &ScreeningRecord) -> Result<()> {
        self.records
            .entry(record.entity_id.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    fn find_screenings(&self, entity_id: &str) -> Result<Vec<ScreeningRecord>> {
        let mut records = self
            .records
            .get(entity_id)
            .map(|r| r.value().clone())
            .unwrap_or_default();
        records.sort_by(|a, b| b.screened_at.cmp(&a.screened_at));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ScreeningResult, ScreeningSubject};
    use chrono::Duration;

    #[test]
    fn test_newest_first() {
        let repo = InMemoryScreeningRepository::new();
        let mut older = ScreeningRecord::new(
            "user-1",
            ScreeningSubject::individual("A"),
            ScreeningResult::empty(),
        );
        older.screened_at = older.screened_at - Duration::hours(1);
        let newer = ScreeningRecord::new(
            "user-1",
            ScreeningSubject::individual("A"),
            ScreeningResult::checked("alpha"),
        );

        repo.save_screening(&newer).unwrap();
        repo.save_screening(&older).unwrap();

        let found = repo.find_screenings("user-1").unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].screening_id, newer.screening_id);
        assert!(repo.find_screenings("user-2").unwrap().is_empty());
    }
}
