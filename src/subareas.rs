use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use derive_builder::Builder;
use regex::Regex;
use reqwest::{Client, StatusCode};
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use serde_json::{json, Map, Value};
use strum::{Display, EnumString};
use tracing::{debug, info};

use crate::section::Section;
use crate::store;

/// Subarea-wise performance page. The idcardno/testno query values are
/// already encoded; the page serves the whole test either way.
pub const SUBAREA_URL: &str = "https://www.time4education.com/moodle/aimcatresults/subareawise_performance.asp?idcardno=565B482B565B483D565B482C565B482E565B482D565B485A565B482E565B485C565B485D565B4856565B48&testno=565B485D565B4859565B485F565B485B565B48";

/// Question links read `"{number}/{difficulty-code}"`, with or without
/// spaces around the slash.
static QUESTION_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*/\s*(VD|D|M|E)").unwrap());

/// Difficulty grade as shown on the performance page. Parses from the
/// short code in the link text; serializes and displays as the long form
/// the dashboard expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
pub enum Difficulty {
    #[strum(serialize = "VD", to_string = "Very Difficult")]
    #[serde(rename = "Very Difficult")]
    VeryDifficult,
    #[strum(serialize = "D", to_string = "Difficult")]
    #[serde(rename = "Difficult")]
    Difficult,
    #[strum(serialize = "M", to_string = "Moderately Easy")]
    #[serde(rename = "Moderately Easy")]
    ModeratelyEasy,
    #[strum(serialize = "E", to_string = "Easy")]
    #[serde(rename = "Easy")]
    Easy,
}

/// Batch job that tags every question of one test with its subarea and
/// difficulty, keyed `"{test}_{section-slug}"` in the output file.
///
/// Single request, no retry.
#[derive(Debug, Builder)]
pub struct SubareaJob {
    #[builder(setter(into), default = "SUBAREA_URL.to_string()")]
    url: String,
    /// Only used to key the output; the page itself fixes the test.
    #[builder(default = "2625")]
    test_number: u32,
    #[builder(default = "Duration::from_secs(10)")]
    timeout: Duration,
    #[builder(setter(into), default = "PathBuf::from(\"aimcat_data.json\")")]
    out_file: PathBuf,
}

impl SubareaJob {
    pub async fn run(&self) -> Result<()> {
        let client = Client::new();
        info!("fetching subarea data for AIMCAT {}", self.test_number);
        let resp = client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .context("subarea page request failed")?;
        if resp.status() != StatusCode::OK {
            anyhow::bail!("subarea page returned status {}", resp.status());
        }
        let html = resp.text().await?;

        let mut tags = extract_question_tags(&html);
        let mut all = Map::new();
        for section in Section::ALL {
            let questions = tags.remove(&section).unwrap_or_default();
            info!("{}: {}", section, section_stats(&questions));
            all.insert(
                format!("{}_{}", self.test_number, section.slug()),
                Value::Object(questions),
            );
        }

        store::write_json(&self.out_file, &Value::Object(all))?;
        info!("data saved to {}", self.out_file.display());
        Ok(())
    }
}

/// Walk the performance page in document order: `div.sub-area-heading`
/// switches the current section, and each `th.aim-left` subarea row carries
/// its questions as green/red boxed links. Tags outside any recognized
/// section heading are ignored.
pub fn extract_question_tags(html: &str) -> HashMap<Section, Map<String, Value>> {
    let doc = Html::parse_document(html);
    let walk = Selector::parse("div.sub-area-heading, th.aim-left").unwrap();
    let links = Selector::parse("span.box-green a, span.box-red a").unwrap();

    let mut result: HashMap<Section, Map<String, Value>> =
        Section::ALL.iter().map(|s| (*s, Map::new())).collect();
    let mut current: Option<Section> = None;

    for element in doc.select(&walk) {
        if element.value().name() == "div" {
            let heading = element.text().collect::<String>().trim().to_string();
            if let Some(section) = Section::from_heading(&heading) {
                debug!("found section {heading}");
                current = Some(section);
            }
            continue;
        }

        let Some(section) = current else { continue };
        let subarea = element.text().collect::<String>().trim().to_string();
        let Some(row) = element.parent().and_then(ElementRef::wrap) else {
            continue;
        };

        for link in row.select(&links) {
            let text = link.text().collect::<String>();
            let Some(caps) = QUESTION_TAG.captures(&text) else {
                continue;
            };
            let Ok(number) = caps[1].parse::<u32>() else {
                continue;
            };
            // the alternation only admits the four known codes
            let difficulty = Difficulty::from_str(&caps[2]).unwrap();
            result
                .get_mut(&section)
                .unwrap()
                .insert(format!("qu{number}"), json!([subarea, difficulty]));
        }
    }
    result
}

fn section_stats(questions: &Map<String, Value>) -> String {
    let numbers: Vec<u32> = questions
        .keys()
        .filter_map(|k| k.strip_prefix("qu")?.parse().ok())
        .collect();
    match (numbers.iter().min(), numbers.iter().max()) {
        (Some(min), Some(max)) => format!("{} questions (Q{min}-Q{max})", questions.len()),
        _ => "no questions".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn difficulty_parses_codes_and_displays_long_form() {
        assert_eq!(Difficulty::from_str("VD").unwrap(), Difficulty::VeryDifficult);
        assert_eq!(Difficulty::from_str("M").unwrap(), Difficulty::ModeratelyEasy);
        assert_eq!(Difficulty::Easy.to_string(), "Easy");
        assert_eq!(
            serde_json::to_value(Difficulty::VeryDifficult).unwrap(),
            json!("Very Difficult")
        );
    }

    #[test]
    fn tags_questions_with_subarea_and_difficulty() {
        let html = fs::read_to_string("fixtures/subareas.html").unwrap();
        let tags = extract_question_tags(&html);

        let varc = &tags[&Section::Varc];
        assert_eq!(varc["qu1"], json!(["Reading Comprehension", "Very Difficult"]));
        assert_eq!(varc["qu4"], json!(["Reading Comprehension", "Difficult"]));
        assert_eq!(varc["qu11"], json!(["Para Jumbles", "Moderately Easy"]));

        let qa = &tags[&Section::Qa];
        assert_eq!(qa["qu2"], json!(["Geometry", "Easy"]));
        // the dangling row before any heading is ignored
        assert_eq!(tags[&Section::Dilr].len(), 0);
    }

    #[test]
    fn walks_sections_in_document_order() {
        let html = fs::read_to_string("fixtures/subareas.html").unwrap();
        let tags = extract_question_tags(&html);
        let keys: Vec<&String> = tags[&Section::Varc].keys().collect();
        insta::assert_yaml_snapshot!(keys, @r###"
        - qu1
        - qu4
        - qu11
        "###);
    }

    #[test]
    fn no_tags_in_unrelated_markup() {
        let tags = extract_question_tags("<html><body><h1>maintenance</h1></body></html>");
        assert!(tags.values().all(|m| m.is_empty()));
    }

    #[test]
    fn stats_cover_question_span() {
        let mut questions = Map::new();
        questions.insert("qu1".into(), json!(["RC", "Easy"]));
        questions.insert("qu11".into(), json!(["RC", "Easy"]));
        assert_eq!(section_stats(&questions), "2 questions (Q1-Q11)");
        assert_eq!(section_stats(&Map::new()), "no questions");
    }
}
