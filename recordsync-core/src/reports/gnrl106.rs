//! GNRL-106 program roster report: one row per client enrollment.

use super::{CONTACT_EXTERNAL_ID, contacts_step};
use crate::error::{PipelineError, TransformError};
use crate::pipeline::{IdentifierMap, Pipeline, PipelineStep, StepKind};
use crate::transform::coerce::{Coercion, format_date_only, parse_date, trimmed_text};
use crate::transform::{Transformer, require_ids};
use crate::types::{CandidateRecord, CellValue, Dataset, WriteTarget};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

pub const ROSTER_OBJECT: &str = "GNRL_106_Program_Roster__c";
pub const ROSTER_EXTERNAL_ID: &str = "GNRL_106_Roster_ID__c";

mod col {
    pub const PROGRAM_NAME: usize = 0;
    pub const CLIENT_NAME: usize = 1;
    pub const UNIQUE_ID: usize = 2;
    pub const BIRTH_DATE: usize = 3;
    pub const ENROLL_DATE: usize = 6;
    pub const EXIT_DATE: usize = 7;
    pub const LOS: usize = 8;
    pub const ASSESSMENTS: usize = 11;
    pub const SERVICES: usize = 12;
    pub const CASE_NOTES: usize = 13;
    pub const ASSIGNED_STAFF: usize = 15;
    pub const UNIT_ASSIGNMENT: usize = 17;
    pub const BED_ASSIGNMENT: usize = 18;
    pub const OCCUPANCY_START: usize = 19;
    pub const OCCUPANCY_END: usize = 20;
}

pub fn pipeline() -> Result<Pipeline, PipelineError> {
    Pipeline::new(
        "gnrl106",
        vec![
            contacts_step(Arc::new(Contacts)),
            PipelineStep::new(
                "syncRosters",
                WriteTarget::new(ROSTER_OBJECT, ROSTER_EXTERNAL_ID),
                StepKind::Consuming,
                Arc::new(Rosters),
            ),
        ],
    )
}

/// Unique clients, keyed by their ONE system id.
pub struct Contacts;

/// "Last, First" -> (last, first). Missing parts are empty.
fn split_client_name(name: &str) -> (String, String) {
    let mut parts = name.split(',').map(str::trim);
    let last = parts.next().unwrap_or_default().to_string();
    let first = parts.next().unwrap_or_default().to_string();
    (last, first)
}

impl Transformer for Contacts {
    fn name(&self) -> &str {
        "gnrl106.contacts"
    }

    fn transform(
        &self,
        dataset: &Dataset,
        _ids: Option<&IdentifierMap>,
    ) -> Result<Vec<CandidateRecord>, TransformError> {
        let mut seen = HashSet::new();
        let mut contacts = Vec::new();

        for row in dataset.rows() {
            let Some(key) = row.get(col::UNIQUE_ID).to_key() else {
                continue;
            };
            if seen.contains(&key) {
                continue;
            }
            let Some(client_name) = trimmed_text(row.get(col::CLIENT_NAME)) else {
                continue;
            };
            let (last, first) = split_client_name(&client_name);
            if last.is_empty() {
                continue;
            }

            contacts.push(
                CandidateRecord::new()
                    .with("FirstName", first)
                    .with("LastName", last)
                    .with("Birthdate", Coercion::Date.apply(row.get(col::BIRTH_DATE)))
                    .with(CONTACT_EXTERNAL_ID, key.clone()),
            );
            seen.insert(key);
        }

        info!("Extracted {} unique contacts", contacts.len());
        Ok(contacts)
    }
}

/// One roster record per enrollment whose client made it into the map.
pub struct Rosters;

fn assigned_staff(cell: &CellValue) -> Value {
    match cell {
        CellValue::Text(s) => Value::String(s.replace('\n', "; ")),
        other => other.to_json(),
    }
}

impl Transformer for Rosters {
    fn name(&self) -> &str {
        "gnrl106.rosters"
    }

    fn transform(
        &self,
        dataset: &Dataset,
        ids: Option<&IdentifierMap>,
    ) -> Result<Vec<CandidateRecord>, TransformError> {
        let ids = require_ids(self.name(), ids)?;
        let mut records = Vec::new();

        for row in dataset.rows() {
            let Some(key) = row.get(col::UNIQUE_ID).to_key() else {
                continue;
            };
            let Some(contact_id) = ids.get(&key) else {
                continue;
            };
            let Some(enroll_date) = parse_date(row.get(col::ENROLL_DATE)) else {
                continue;
            };
            let program_name = row.get(col::PROGRAM_NAME);
            if trimmed_text(program_name).is_none() {
                continue;
            }

            let number = |idx| Coercion::Number.apply(row.get(idx));
            let date_time = |idx| Coercion::DateTime.apply(row.get(idx));
            records.push(
                CandidateRecord::new()
                    .with("Name", program_name.to_json())
                    .with("Contact__c", contact_id)
                    .with(
                        ROSTER_EXTERNAL_ID,
                        format!("GNRL106-{key}-{}", format_date_only(&enroll_date)),
                    )
                    .with("Enroll_Date__c", date_time(col::ENROLL_DATE))
                    .with("Exit_Date__c", date_time(col::EXIT_DATE))
                    .with("LOS__c", number(col::LOS))
                    .with("Assesments__c", number(col::ASSESSMENTS))
                    .with("Services__c", number(col::SERVICES))
                    .with("Case_Notes__c", number(col::CASE_NOTES))
                    .with("Assigned_Staff__c", assigned_staff(row.get(col::ASSIGNED_STAFF)))
                    .with("Unit_assignment__c", row.get(col::UNIT_ASSIGNMENT).to_json())
                    .with("Bed_Assignment__c", row.get(col::BED_ASSIGNMENT).to_json())
                    .with("Occupancy_Start__c", date_time(col::OCCUPANCY_START))
                    .with("Occupancy_End_Date__c", date_time(col::OCCUPANCY_END)),
            );
        }

        info!("Prepared {} total roster records", records.len());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Row;
    use serde_json::json;

    fn row(cells: &[(usize, CellValue)]) -> Row {
        let mut out = vec![CellValue::Null; 21];
        for (idx, cell) in cells {
            out[*idx] = cell.clone();
        }
        Row::new(out)
    }

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn enrollment(id: &str, name: &str, program: &str, enroll: f64) -> Row {
        row(&[
            (col::PROGRAM_NAME, text(program)),
            (col::CLIENT_NAME, text(name)),
            (col::UNIQUE_ID, text(id)),
            (col::BIRTH_DATE, text("1980-05-17")),
            (col::ENROLL_DATE, CellValue::Number(enroll)),
            (col::LOS, text("1,200")),
            (col::ASSIGNED_STAFF, text("Kim\nLee")),
        ])
    }

    #[test]
    fn test_split_client_name() {
        assert_eq!(
            split_client_name("Doe, Jane"),
            ("Doe".to_string(), "Jane".to_string())
        );
        assert_eq!(split_client_name("Cher"), ("Cher".to_string(), String::new()));
        assert_eq!(split_client_name(", Nobody").0, "");
    }

    #[test]
    fn test_contacts_dedupe_and_skip_nameless() {
        let dataset = Dataset::new(vec![
            enrollment("C1", "Doe, Jane", "Shelter", 45292.0),
            enrollment("C1", "Doe, Janet", "Navigation", 45300.0),
            enrollment("C2", ", Ghost", "Shelter", 45292.0),
            enrollment("C2", "Roe, Rick", "Shelter", 45292.0),
            row(&[(col::CLIENT_NAME, text("No, Id"))]),
        ]);
        let contacts = Contacts.transform(&dataset, None).unwrap();
        assert_eq!(contacts.len(), 2);
        assert_eq!(
            serde_json::to_value(&contacts[0]).unwrap(),
            json!({
                "FirstName": "Jane",
                "LastName": "Doe",
                "Birthdate": "1980-05-17",
                "ONE_Systems_ID__c": "C1"
            })
        );
        assert_eq!(contacts[1].get("LastName"), Some(&json!("Roe")));
    }

    #[test]
    fn test_rosters_require_map() {
        let err = Rosters.transform(&Dataset::default(), None).unwrap_err();
        assert!(matches!(err, TransformError::MissingIdentifierMap { .. }));
    }

    #[test]
    fn test_rosters_only_for_mapped_clients_with_enrollment() {
        let mut cells = enrollment("C1", "Doe, Jane", "Navigation", 45292.0)
            .cells()
            .to_vec();
        cells[col::ENROLL_DATE] = CellValue::Null;
        let no_enroll = Row::new(cells);
        let dataset = Dataset::new(vec![
            enrollment("C1", "Doe, Jane", "Shelter", 45292.0),
            enrollment("C9", "Unmapped, Ann", "Shelter", 45292.0),
            no_enroll,
        ]);
        let ids: IdentifierMap = [("C1", "003AAA")].into_iter().collect();

        let rosters = Rosters.transform(&dataset, Some(&ids)).unwrap();
        assert_eq!(rosters.len(), 1);
        let roster = &rosters[0];
        assert_eq!(roster.get("Contact__c"), Some(&json!("003AAA")));
        assert_eq!(
            roster.external_id(ROSTER_EXTERNAL_ID).as_deref(),
            Some("GNRL106-C1-2024-01-01")
        );
        assert_eq!(roster.get("Name"), Some(&json!("Shelter")));
        assert_eq!(
            roster.get("Enroll_Date__c"),
            Some(&json!("2024-01-01T00:00:00.000Z"))
        );
        assert_eq!(roster.get("LOS__c"), Some(&json!(1200.0)));
        assert_eq!(roster.get("Assigned_Staff__c"), Some(&json!("Kim; Lee")));
        assert_eq!(roster.get("Exit_Date__c"), Some(&Value::Null));
    }
}
