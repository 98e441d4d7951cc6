use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use derive_builder::Builder;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{info, warn};

use crate::encode::{self, DEFAULT_PREFIX};
use crate::fetch::NameFetcher;
use crate::store;

/// Outcome of one name lookup. Exactly one applies per identifier and
/// downstream consumers can match on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LookupStatus {
    /// Name extracted; the value is non-empty after trimming.
    Found,
    /// Page fetched (or budget exhausted) with no extractable name.
    NotFound,
    /// Identifier outside the supported alphabet. Never retried later.
    EncodeFailed,
}

/// One persisted record per id-card number. Field names follow the data
/// files the dashboard already consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameRecord {
    pub idcard: String,
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LookupStatus>,
}

impl NameRecord {
    fn new(idcard: String) -> Self {
        Self {
            idcard,
            name: None,
            status: None,
        }
    }

    /// A record still needs a fetch when it has no name and was not already
    /// ruled out by an encode failure.
    fn needs_fetch(&self) -> bool {
        self.name.is_none() && self.status != Some(LookupStatus::EncodeFailed)
    }
}

/// Worklist generator for a fresh run: a fixed id-card stem plus a
/// zero-padded numeric suffix range.
#[derive(Debug, Clone)]
pub struct SeedRange {
    pub base: String,
    pub start: u32,
    pub end: u32,
    pub width: usize,
}

impl SeedRange {
    fn idcards(&self) -> impl Iterator<Item = String> + '_ {
        (self.start..=self.end).map(|n| format!("{}{:0width$}", self.base, n, width = self.width))
    }
}

/// Batch job that fills in candidate names for a worklist of id-card
/// numbers, resuming from an earlier output file when one exists.
#[derive(Debug, Builder)]
pub struct NameJob {
    #[builder(setter(into), default = "PathBuf::from(\"aimcat_names.json\")")]
    out_file: PathBuf,
    #[builder(setter(into), default = "DEFAULT_PREFIX.to_string()")]
    prefix: String,
    /// Polite pause between successive requests. Caller-level policy, not
    /// part of the fetcher's retry contract.
    #[builder(default = "Duration::from_millis(100)")]
    delay: Duration,
    /// Used to seed the worklist when the record file does not exist yet.
    #[builder(default)]
    seed: Option<SeedRange>,
    fetcher: NameFetcher,
}

impl NameJob {
    pub async fn run(&self) -> Result<()> {
        let mut records = match store::load_json::<Vec<NameRecord>>(&self.out_file) {
            Some(records) => {
                info!("loaded {} records from {}", records.len(), self.out_file.display());
                records
            }
            None => match &self.seed {
                Some(range) => {
                    let seeded: Vec<_> = range.idcards().map(NameRecord::new).collect();
                    info!("no record file; seeded {} id-cards from range", seeded.len());
                    seeded
                }
                None => {
                    warn!(
                        "no record file at {} and no seed range given, nothing to do",
                        self.out_file.display()
                    );
                    return Ok(());
                }
            },
        };

        let todo: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.needs_fetch())
            .map(|(i, _)| i)
            .collect();
        let total = todo.len();
        info!("{total} records still need a name");
        if total == 0 {
            return Ok(());
        }

        let client = Client::new();
        for (done, &i) in todo.iter().enumerate() {
            let idcard = records[i].idcard.clone();
            let (name, status) = self.lookup(&client, &idcard).await;

            let pct = (done + 1) as f64 * 100.0 / total as f64;
            match &name {
                Some(name) => {
                    info!("[{}/{total}] {idcard} - {status} - name: {name} - {pct:.1}%", done + 1)
                }
                None => info!("[{}/{total}] {idcard} - {status} - {pct:.1}%", done + 1),
            }

            records[i].name = name;
            records[i].status = Some(status);
            tokio::time::sleep(self.delay).await;
        }

        let found = count(&records, LookupStatus::Found);
        let not_found = count(&records, LookupStatus::NotFound);
        let encode_failed = count(&records, LookupStatus::EncodeFailed);
        info!("done. found={found}, not_found={not_found}, encode_failed={encode_failed}");

        store::write_json(&self.out_file, &records)?;
        info!("updated results saved to {}", self.out_file.display());
        Ok(())
    }

    /// Encode one id-card number and fetch its name. Every failure kind
    /// folds into a `(value, status)` pair; a bad identifier never aborts
    /// the batch.
    pub async fn lookup(&self, client: &Client, idcard: &str) -> (Option<String>, LookupStatus) {
        let encoded = match encode::encode(idcard, &self.prefix) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("{idcard}: {e}");
                return (None, LookupStatus::EncodeFailed);
            }
        };
        match self.fetcher.fetch_name(client, &encoded).await {
            Some(name) => (Some(name), LookupStatus::Found),
            None => (None, LookupStatus::NotFound),
        }
    }
}

fn count(records: &[NameRecord], status: LookupStatus) -> usize {
    records.iter().filter(|r| r.status == Some(status)).count()
}
