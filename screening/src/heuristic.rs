use crate::error::{Error, Result};
use crate::provider::ScreeningProvider;
use crate::types::{ScreeningMatch, ScreeningSubject, SubjectKind};
use async_trait::async_trait;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use strsim::jaro_winkler;
use tracing::{debug, info};

lazy_static::lazy_static! {
    static ref NON_WORD: Regex = Regex::new(r"[^\w\s]").unwrap();
}

/// One watch-list entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchlistEntry {
    pub id: String,
    pub list: String,
    pub program: String,
    pub names: Vec<String>,
    pub aliases: Vec<String>,
    pub addresses: Vec<String>,
    pub remarks: String,
}

/// CSV row layout: multi-valued columns are `;`-separated.
#[derive(Debug, Deserialize)]
struct WatchlistRow {
    id: String,
    list: String,
    program: String,
    name: String,
    #[serde(default)]
    aliases: String,
    #[serde(default)]
    addresses: String,
    #[serde(default)]
    remarks: String,
}

impl From<WatchlistRow> for WatchlistEntry {
    fn from(row: WatchlistRow) -> Self {
        let split = |s: &str| {
            s.split(';')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        };
        Self {
            id: row.id,
            list: row.list,
            program: row.program,
            names: split(&row.name),
            aliases: split(&row.aliases),
            addresses: split(&row.addresses),
            remarks: row.remarks,
        }
    }
}

/// In-process watch-list screening with normalised fuzzy name matching.
///
/// Scores are native Jaro-Winkler similarity scaled to 0-100; anything
/// below `min_score` is dropped. Address membership is exact and scores 100.
pub struct HeuristicProvider {
    name: String,
    entries: RwLock<Vec<WatchlistEntry>>,
    min_score: f64,
}

impl HeuristicProvider {
    pub fn new(name: &str, min_score: f64) -> Self {
        Self {
            name: name.to_string(),
            entries: RwLock::new(Vec::new()),
            min_score,
        }
    }

    /// Replace every entry belonging to `list`.
    pub fn load_list(&self, list: &str, entries: Vec<WatchlistEntry>) {
        let mut guard = self.entries.write();
        guard.retain(|e| e.list != list);
        let count = entries.len();
        guard.extend(entries.into_iter().map(|mut e| {
            e.list = list.to_string();
            e
        }));
        info!(provider = %self.name, "Loaded {} watch-list with {} entries", list, count);
    }

    pub fn load_csv<R: Read>(&self, list: &str, reader: R) -> Result<usize> {
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut entries = Vec::new();
        for row in csv_reader.deserialize::<WatchlistRow>() {
            entries.push(WatchlistEntry::from(row?));
        }
        let count = entries.len();
        self.load_list(list, entries);
        Ok(count)
    }

    pub fn load_csv_file(&self, list: &str, path: &Path) -> Result<usize> {
        let file = std::fs::File::open(path).map_err(|e| {
            Error::Config(format!("Cannot open watch-list {}: {}", path.display(), e))
        })?;
        self.load_csv(list, file)
    }

    pub fn total_entries(&self) -> usize {
        self.entries.read().len()
    }

    fn best_name_score(query: &str, entry: &WatchlistEntry) -> f64 {
        entry
            .names
            .iter()
            .chain(entry.aliases.iter())
            .map(|candidate| similarity(query, &normalize_name(candidate)))
            .fold(0.0, f64::max)
    }
}

#[async_trait]
impl ScreeningProvider for HeuristicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search_individual(
        &self,
        name: &str,
        _subject: &ScreeningSubject,
    ) -> Result<Vec<ScreeningMatch>> {
        let query = normalize_name(name);
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let entries = self.entries.read();
        let matches = entries
            .iter()
            .filter_map(|entry| {
                let score = Self::best_name_score(&query, entry);
                if score < self.min_score {
                    return None;
                }
                debug!(provider = %self.name, entry = %entry.id, score, "Watch-list name match");
                let primary = entry.names.first()?;
                ScreeningMatch::new(
                    &self.name,
                    entry.id.clone(),
                    primary,
                    score,
                    SubjectKind::Individual,
                    entry.program.clone(),
                    entry.remarks.clone(),
                )
            })
            .collect();
        Ok(matches)
    }

    async fn search_address(&self, address: &str, _chain: &str) -> Result<Vec<ScreeningMatch>> {
        let entries = self.entries.read();
        let matches = entries
            .iter()
            .filter(|entry| {
                entry
                    .addresses
                    .iter()
                    .any(|a| a.trim().eq_ignore_ascii_case(address))
            })
            .filter_map(|entry| {
                let label = entry.names.first().map(String::as_str).unwrap_or(address);
                ScreeningMatch::new(
                    &self.name,
                    entry.id.clone(),
                    label,
                    100.0,
                    SubjectKind::Address,
                    entry.program.clone(),
                    entry.remarks.clone(),
                )
            })
            .collect();
        Ok(matches)
    }
}

// Lowercase, strip punctuation, collapse whitespace
fn normalize_name(name: &str) -> String {
    let cleaned = NON_WORD.replace_all(name, "");
    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// Jaro-Winkler on the full string and on sorted tokens, whichever is higher
fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 100.0;
    }
    let direct = jaro_winkler(a, b);
    let sorted = |s: &str| {
        let mut tokens: Vec<&str> = s.split_whitespace().collect();
        tokens.sort_unstable();
        tokens.join(" ")
    };
    let reordered = jaro_winkler(&sorted(a), &sorted(b));
    direct.max(reordered) * 100.0
}
