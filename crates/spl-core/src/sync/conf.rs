//! Stanza comparison of `.conf` files between instances

use serde::Serialize;
use serde_json::{Map, Value};
use similar::TextDiff;
use tracing::info;

use super::engine::SyncEngine;
use crate::Result;

/// How a source stanza relates to the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StanzaStatus {
    Missing,
    Identical,
    Differs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StanzaReport {
    pub name: String,
    pub status: StanzaStatus,
    /// Unified diff `dest -> src` of the stanza settings
    pub diff: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfReport {
    pub conf: String,
    pub stanzas: Vec<StanzaReport>,
}

impl ConfReport {
    pub fn count(&self, status: StanzaStatus) -> usize {
        self.stanzas.iter().filter(|s| s.status == status).count()
    }
}

impl SyncEngine<'_> {
    /// Compare every stanza of `conf` on the source with the destination.
    pub async fn conf_stanzas(&self, conf: &str) -> Result<ConfReport> {
        let endpoint = format!("configs/conf-{conf}");
        let src = self.src.service().list(&endpoint).await?;
        let dest = self.dest.service().list(&endpoint).await?;
        info!(
            "Comparing {} stanzas of '{}.conf' from '{}' with '{}'",
            src.len(),
            conf,
            self.src.name(),
            self.dest.name()
        );

        let stanzas = src
            .iter()
            .map(|stanza| match dest.iter().find(|d| d.name == stanza.name) {
                None => StanzaReport {
                    name: stanza.name.clone(),
                    status: StanzaStatus::Missing,
                    diff: None,
                },
                Some(other) => {
                    let (theirs, ours) = (render(&other.content), render(&stanza.content));
                    if theirs == ours {
                        StanzaReport {
                            name: stanza.name.clone(),
                            status: StanzaStatus::Identical,
                            diff: None,
                        }
                    } else {
                        let diff = TextDiff::from_lines(&theirs, &ours)
                            .unified_diff()
                            .header(self.dest.name(), self.src.name())
                            .to_string();
                        StanzaReport {
                            name: stanza.name.clone(),
                            status: StanzaStatus::Differs,
                            diff: Some(diff),
                        }
                    }
                }
            })
            .collect();

        Ok(ConfReport {
            conf: conf.to_string(),
            stanzas,
        })
    }
}

/// `key = value` lines in key order.
fn render(content: &Map<String, Value>) -> String {
    let mut lines: Vec<String> = content
        .iter()
        .map(|(key, value)| match value {
            Value::String(s) => format!("{key} = {s}"),
            other => format!("{key} = {other}"),
        })
        .collect();
    lines.sort();
    lines.iter().map(|l| format!("{l}\n")).collect()
}
