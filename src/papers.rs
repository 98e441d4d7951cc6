use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use derive_builder::Builder;
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::section::Section;
use crate::store;

/// Directory of per-test, per-section paper documents (JSON with a `.txt`
/// extension).
pub const PAPER_JSON_URL: &str = "https://www.time4education.com/moodle/aimcatsolutions/json";

/// Batch job that mirrors raw paper documents and derives per-section
/// answer keys from them, writing two files per section.
///
/// One short-timeout request per cell, no retry; a failed cell is logged
/// and skipped.
#[derive(Debug, Builder)]
pub struct PaperJob {
    #[builder(setter(into), default = "PAPER_JSON_URL.to_string()")]
    base_url: String,
    /// Scanned from `start` down to `end`, both inclusive.
    #[builder(default = "2625")]
    start: u32,
    #[builder(default = "2603")]
    end: u32,
    #[builder(default = "Duration::from_secs(5)")]
    timeout: Duration,
    #[builder(default = "Duration::from_millis(100)")]
    delay: Duration,
    #[builder(setter(into), default = "PathBuf::from(\".\")")]
    out_dir: PathBuf,
}

impl PaperJob {
    pub async fn run(&self) -> Result<()> {
        let client = Client::new();
        let mut papers: HashMap<Section, Map<String, Value>> =
            Section::ALL.iter().map(|s| (*s, Map::new())).collect();
        let mut keys: HashMap<Section, Map<String, Value>> =
            Section::ALL.iter().map(|s| (*s, Map::new())).collect();
        let mut answers_extracted = 0usize;

        for tno in (self.end..=self.start).rev() {
            for section in Section::ALL {
                let paper_id = format!("{tno}_{section}");
                let url = format!("{}/{}_{}.txt", self.base_url, tno, section);
                match self.fetch_paper(&client, &url).await {
                    Ok(doc) => {
                        let key = extract_answer_key(&doc, &paper_id);
                        info!("{paper_id}: {} answers extracted", key.len());
                        answers_extracted += key.len();
                        keys.get_mut(&section).unwrap().insert(paper_id.clone(), Value::Object(key));
                        papers.get_mut(&section).unwrap().insert(paper_id, doc);
                    }
                    Err(e) => warn!("{paper_id}: {e:#}"),
                }
                tokio::time::sleep(self.delay).await;
            }
        }

        for section in Section::ALL {
            let slug = section.slug();
            let papers_file = self.out_dir.join(format!("{slug}_papers.json"));
            let answers_file = self.out_dir.join(format!("{slug}_answers.json"));
            store::write_json(&papers_file, &papers[&section])?;
            store::write_json(&answers_file, &keys[&section])?;
            info!(
                "{}: {} papers, keys in {}",
                papers_file.display(),
                papers[&section].len(),
                answers_file.display()
            );
        }
        info!("{answers_extracted} individual answers extracted in total");
        Ok(())
    }

    async fn fetch_paper(&self, client: &Client, url: &str) -> Result<Value> {
        let resp = client.get(url).timeout(self.timeout).send().await?;
        if resp.status() != StatusCode::OK {
            anyhow::bail!("status {}", resp.status());
        }
        resp.json().await.context("paper file is not valid JSON")
    }
}

/// Pull `qu* -> ENGLISH.CORRECT_ANSWER` out of a raw paper document, in
/// question-number order. Questions missing that structure are logged and
/// skipped; non-string answers are stringified.
pub fn extract_answer_key(doc: &Value, paper_id: &str) -> Map<String, Value> {
    let mut key = Map::new();
    let Some(obj) = doc.as_object() else {
        warn!("{paper_id}: paper document is not an object");
        return key;
    };

    let mut questions: Vec<&String> = obj.keys().filter(|k| k.starts_with("qu")).collect();
    questions.sort_by_key(|k| {
        k.strip_prefix("qu")
            .and_then(|n| n.parse::<u32>().ok())
            .unwrap_or(u32::MAX)
    });

    for q in questions {
        match obj[q.as_str()].pointer("/ENGLISH/CORRECT_ANSWER") {
            Some(Value::String(answer)) => {
                key.insert(q.clone(), Value::String(answer.clone()));
            }
            Some(answer) => {
                key.insert(q.clone(), Value::String(answer.to_string()));
            }
            None => warn!("{paper_id}: {q} is missing ENGLISH.CORRECT_ANSWER, skipped"),
        }
    }
    key
}
