//! Record types persisted or exchanged by the tracker

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::record::{Column, FieldValue, Record};

/// One tracked unit of work, as entered by the user and enriched by the tracker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Assigned at creation, immutable
    pub activity_id: String,
    /// Vector backend id of the nearest rule
    pub weaviate_id: String,
    pub project: String,
    pub task: String,
    pub jira: String,
    /// Free text as submitted, immutable
    pub input_description: String,
    /// Description of the nearest rule, set whenever a search ran
    pub rule_description: String,
    /// 0 = identical, larger = more distant
    pub categorization_distance: f64,
    /// Letter grade, or `N/A` when no rule matched
    pub categorization_grade: String,
    /// Tempo-style duration, e.g. `1h 15m`
    pub duration: String,
    /// True only when the match was auto-committed
    pub categorized: bool,
    /// Only ever moves false -> true
    #[serde(alias = "posted_to_jira_tempo")]
    pub posted_to_tracker: bool,
    /// Local wall-clock creation time
    pub created_at: NaiveDateTime,
}

impl Activity {
    /// New activity for a user submission, stamped with `id` and `created_at`
    pub fn new(
        activity_id: impl Into<String>,
        input_description: impl Into<String>,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            activity_id: activity_id.into(),
            input_description: input_description.into(),
            created_at,
            ..Default::default()
        }
    }
}

impl Record for Activity {
    const COLUMNS: &'static [Column] = &[
        Column::text("ActivityId"),
        Column::text("WeaviateId"),
        Column::text("Project"),
        Column::text("Task"),
        Column::text("Jira"),
        Column::text("InputDescription"),
        Column::text("RuleDescription"),
        Column::float("CategorizationDistance"),
        Column::text("CategorizationGrade"),
        Column::text("Duration"),
        Column::bool("Categorized"),
        Column::bool("PostedToJiraTempo"),
        Column::timestamp("CreatedAt"),
    ];

    const ID_COLUMN: &'static str = "ActivityId";

    fn record_id(&self) -> &str {
        &self.activity_id
    }

    fn field(&self, column: &str) -> Option<FieldValue> {
        Some(match column {
            "ActivityId" => FieldValue::Text(self.activity_id.clone()),
            "WeaviateId" => FieldValue::Text(self.weaviate_id.clone()),
            "Project" => FieldValue::Text(self.project.clone()),
            "Task" => FieldValue::Text(self.task.clone()),
            "Jira" => FieldValue::Text(self.jira.clone()),
            "InputDescription" => FieldValue::Text(self.input_description.clone()),
            "RuleDescription" => FieldValue::Text(self.rule_description.clone()),
            "CategorizationDistance" => FieldValue::Float(self.categorization_distance),
            "CategorizationGrade" => FieldValue::Text(self.categorization_grade.clone()),
            "Duration" => FieldValue::Text(self.duration.clone()),
            "Categorized" => FieldValue::Bool(self.categorized),
            "PostedToJiraTempo" => FieldValue::Bool(self.posted_to_tracker),
            "CreatedAt" => FieldValue::Timestamp(self.created_at),
            _ => return None,
        })
    }

    fn set_field(&mut self, column: &str, value: FieldValue) -> bool {
        match (column, value) {
            ("ActivityId", FieldValue::Text(v)) => self.activity_id = v,
            ("WeaviateId", FieldValue::Text(v)) => self.weaviate_id = v,
            ("Project", FieldValue::Text(v)) => self.project = v,
            ("Task", FieldValue::Text(v)) => self.task = v,
            ("Jira", FieldValue::Text(v)) => self.jira = v,
            ("InputDescription", FieldValue::Text(v)) => self.input_description = v,
            ("RuleDescription", FieldValue::Text(v)) => self.rule_description = v,
            ("CategorizationDistance", FieldValue::Float(v)) => self.categorization_distance = v,
            ("CategorizationGrade", FieldValue::Text(v)) => self.categorization_grade = v,
            ("Duration", FieldValue::Text(v)) => self.duration = v,
            ("Categorized", FieldValue::Bool(v)) => self.categorized = v,
            ("PostedToJiraTempo", FieldValue::Bool(v)) => self.posted_to_tracker = v,
            ("CreatedAt", FieldValue::Timestamp(v)) => self.created_at = v,
            _ => return false,
        }
        true
    }
}

/// Categorization target held by the vector backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Generated when absent
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub jira: String,
    #[serde(default)]
    pub description: String,
}

impl Record for Rule {
    const COLUMNS: &'static [Column] = &[
        Column::text("Id"),
        Column::text("Project"),
        Column::text("Task"),
        Column::text("Jira"),
        Column::text("Description"),
    ];

    const ID_COLUMN: &'static str = "Id";

    fn record_id(&self) -> &str {
        &self.id
    }

    fn field(&self, column: &str) -> Option<FieldValue> {
        let value = match column {
            "Id" => &self.id,
            "Project" => &self.project,
            "Task" => &self.task,
            "Jira" => &self.jira,
            "Description" => &self.description,
            _ => return None,
        };
        Some(FieldValue::Text(value.clone()))
    }

    fn set_field(&mut self, column: &str, value: FieldValue) -> bool {
        let FieldValue::Text(v) = value else {
            return false;
        };
        match column {
            "Id" => self.id = v,
            "Project" => self.project = v,
            "Task" => self.task = v,
            "Jira" => self.jira = v,
            "Description" => self.description = v,
            _ => return false,
        }
        true
    }
}

/// Project / task / Jira combination offered to clients building rules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    #[serde(rename = "project")]
    pub project_name: String,
    pub task: String,
    pub jira: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{columns, decode, encode, HeaderIndex};
    use chrono::NaiveDate;

    fn activity() -> Activity {
        let created = NaiveDate::from_ymd_opt(2025, 5, 13)
            .unwrap()
            .and_hms_opt(14, 2, 9)
            .unwrap();
        Activity {
            weaviate_id: "0b1c6b9e-1f7e-4a4e-9d7e-2f0c5d3a8b11".to_string(),
            project: "IZ Gateway".to_string(),
            task: "Development".to_string(),
            jira: "FEDS-148".to_string(),
            rule_description: "Coding on Xform Service".to_string(),
            categorization_distance: 0.123456,
            categorization_grade: "A".to_string(),
            duration: "1h 15m".to_string(),
            categorized: true,
            ..Activity::new("5d7f", "Coding, on the \"Xform\" service\nfor 75 minutes", created)
        }
    }

    #[test]
    fn test_activity_header_order() {
        assert_eq!(
            columns::<Activity>(),
            vec![
                "ActivityId",
                "WeaviateId",
                "Project",
                "Task",
                "Jira",
                "InputDescription",
                "RuleDescription",
                "CategorizationDistance",
                "CategorizationGrade",
                "Duration",
                "Categorized",
                "PostedToJiraTempo",
                "CreatedAt",
            ]
        );
    }

    #[test]
    fn test_activity_encode_decode_preserves_fields() {
        let original = activity();
        let row = encode(&original);
        assert_eq!(row[7], "0.123456");
        assert_eq!(row[10], "true");
        assert_eq!(row[11], "false");
        assert_eq!(row[12], "2025-05-13 14:02:09");

        let decoded = decode::<Activity, _>(&row, &HeaderIndex::positional::<Activity>());
        assert!(!decoded.partial);
        assert_eq!(decoded.record, original);
    }

    #[test]
    fn test_activity_without_posted_column_decodes_partial() {
        // Files written before export tracking existed lack PostedToJiraTempo
        let headers: Vec<&str> = columns::<Activity>()
            .into_iter()
            .filter(|c| *c != "PostedToJiraTempo")
            .collect();
        let mut row = encode(&activity());
        row.remove(11);

        let decoded = decode::<Activity, _>(&row, &HeaderIndex::new(&headers));
        assert!(decoded.partial);
        assert!(!decoded.record.posted_to_tracker);
        assert_eq!(decoded.record.jira, "FEDS-148");
    }

    #[test]
    fn test_set_field_rejects_kind_mismatch() {
        let mut a = Activity::default();
        assert!(!a.set_field("Categorized", FieldValue::Text("true".into())));
        assert!(!a.set_field("Nope", FieldValue::Bool(true)));
    }

    #[test]
    fn test_rule_round_trip() {
        let rule = Rule {
            id: "r-1".into(),
            project: "AIdea".into(),
            task: "Research".into(),
            jira: "AIDEA-7".into(),
            description: "Reading about embeddings".into(),
        };
        let decoded = decode::<Rule, _>(&encode(&rule), &HeaderIndex::positional::<Rule>());
        assert_eq!(decoded.record, rule);
    }

    #[test]
    fn test_rule_json_id_optional() {
        let rule: Rule =
            serde_json::from_str(r#"{"project":"P","task":"T","jira":"J-1","description":"d"}"#)
                .unwrap();
        assert!(rule.id.is_empty());
    }

    #[test]
    fn test_project_serializes_project_key() {
        let p = Project {
            project_name: "IZG".into(),
            task: "Ops".into(),
            jira: "IZG-1".into(),
        };
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["project"], "IZG");
    }
}
