//! Input records: one per card.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A person to issue a card for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub identifier: String,
    pub given_names: String,
    #[serde(default)]
    pub family_names: String,
    pub category: String,
    /// Branch, venue or group the person belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_label: Option<String>,
    /// QR contents. Falls back to the identifier when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_payload: Option<String>,
    /// Logo URL. The built-in mark is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    pub issue_date: NaiveDate,
}

impl Record {
    pub fn new(
        identifier: impl Into<String>,
        given_names: impl Into<String>,
        family_names: impl Into<String>,
        category: impl Into<String>,
        issue_date: NaiveDate,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            given_names: given_names.into(),
            family_names: family_names.into(),
            category: category.into(),
            group_label: None,
            qr_payload: None,
            logo: None,
            issue_date,
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group_label = Some(group.into());
        self
    }

    pub fn with_qr_payload(mut self, payload: impl Into<String>) -> Self {
        self.qr_payload = Some(payload.into());
        self
    }

    pub fn with_logo(mut self, url: impl Into<String>) -> Self {
        self.logo = Some(url.into());
        self
    }

    pub fn qr_payload(&self) -> &str {
        self.qr_payload.as_deref().unwrap_or(&self.identifier)
    }

    /// Given and family names joined by a space.
    pub fn display_name(&self) -> String {
        match (self.given_names.trim(), self.family_names.trim()) {
            (given, "") => given.to_string(),
            ("", family) => family.to_string(),
            (given, family) => format!("{given} {family}"),
        }
    }

    /// Parses a JSON array of records.
    pub fn list_from_json(json: &str) -> Result<Vec<Record>, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    #[test]
    fn qr_payload_defaults_to_identifier() {
        let record = Record::new("M-001", "Ana", "Silva", "Senior", date());
        assert_eq!(record.qr_payload(), "M-001");
        let record = record.with_qr_payload("https://club.example/m/M-001");
        assert_eq!(record.qr_payload(), "https://club.example/m/M-001");
    }

    #[test]
    fn display_name_joins_parts() {
        assert_eq!(Record::new("1", "Ana", "Silva", "x", date()).display_name(), "Ana Silva");
        assert_eq!(Record::new("1", " Ana ", "", "x", date()).display_name(), "Ana");
        assert_eq!(Record::new("1", "", "Silva", "x", date()).display_name(), "Silva");
    }

    #[test]
    fn list_from_json_uses_camel_case() {
        let json = r#"[
            {"identifier":"M-001","givenNames":"Ana","familyNames":"Silva",
             "category":"Senior","groupLabel":"North","issueDate":"2026-03-01"},
            {"identifier":"M-002","givenNames":"Rui","category":"Junior",
             "qrPayload":"X-2","issueDate":"2026-03-02"}
        ]"#;
        let records = Record::list_from_json(json).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].group_label.as_deref(), Some("North"));
        assert_eq!(records[0].issue_date, date());
        assert_eq!(records[1].family_names, "");
        assert_eq!(records[1].qr_payload(), "X-2");
    }
}
