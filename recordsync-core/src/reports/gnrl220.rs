//! GNRL-220 program enrollment detail report. One row per client with a
//! wide intake questionnaire.

use super::{CONTACT_EXTERNAL_ID, contacts_step};
use crate::error::{PipelineError, TransformError};
use crate::pipeline::{IdentifierMap, Pipeline, PipelineStep, StepKind};
use crate::transform::coerce::Coercion::{self, Bool, Date, DateTime, Number, Raw, Text};
use crate::transform::{Transformer, require_ids};
use crate::types::{CandidateRecord, Dataset, WriteTarget};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

pub const PROGRAM_OBJECT: &str = "GNRL220Program__c";
pub const PROGRAM_EXTERNAL_ID: &str = "Unique_ID__c";

const UNIQUE_ID: usize = 0;
const FIRST_NAME: usize = 1;
const LAST_NAME: usize = 2;
const DOB: usize = 12;

/// Program detail fields: (field, source column, coercion).
const PROGRAM_FIELDS: &[(&str, usize, Coercion)] = &[
    // Identity
    ("Name__c", FIRST_NAME, Raw),
    ("Last_Name__c", LAST_NAME, Raw),
    ("DOB__c", DOB, Date),
    ("SSN__c", 13, Raw),
    ("Personal_ID__c", 14, Raw),
    ("Household_ID__c", 15, Raw),
    ("Agency__c", 3, Raw),
    ("Assigned_Staff_denotes_Inactive__c", 4, Raw),
    ("Staff_Created__c", 5, Raw),
    // Enrollment
    ("Enrollment_Start_Date__c", 6, DateTime),
    ("Enrollment_Exit_Date__c", 7, DateTime),
    ("Chronic_Homeless__c", 8, Text),
    ("Bed_Night_Service__c", 9, Raw),
    ("Bed_Night_First_Date__c", 10, Date),
    ("Bed_Night_Last_Date__c", 11, Date),
    ("Gender__c", 16, Text),
    ("Ethnicity__c", 17, Text),
    ("Veteran_Status__c", 18, Text),
    ("Translation_Assistance_Needed__c", 19, Raw),
    ("Preferred_Language__c", 20, Raw),
    ("Preferred_Language_Other__c", 21, Raw),
    ("Interested_in_Relocation__c", 22, Raw),
    ("Relationship_to_HoH__c", 23, Text),
    ("Enrollment_CoC__c", 24, Raw),
    ("Is_Adult_or_HoH__c", 25, Bool),
    ("Is_ES_SH_or_SO__c", 26, Bool),
    ("Is_SO_or_NBN_ES__c", 27, Bool),
    ("Is_Permanent_Housing__c", 28, Bool),
    ("Date_of_Engagement__c", 29, Date),
    ("Housing_Move_In_Date__c", 30, Date),
    ("Staff_Completing_Enrollment__c", 31, Raw),
    ("Agency_First_Contact__c", 32, Raw),
    // Intake
    ("Locker__c", 33, Raw),
    ("Arriving_from_an_Encampment__c", 34, Raw),
    ("Arriving_with_any_Pets__c", 35, Raw),
    ("Pet_Type__c", 36, Raw),
    ("Pet_Name__c", 37, Raw),
    ("Do_you_have_a_Partner_or_Spouse__c", 38, Raw),
    ("Is_your_Partner_or_Spouse_Staying_at_the__c", 39, Raw),
    ("Partner_Spouse_Name__c", 40, Raw),
    ("Do_you_have_More_than_2_Bags__c", 41, Raw),
    ("Do_you_have_any_Special_Accommodations__c", 42, Text),
    ("Please_list_the_Accommodation_Needed__c", 43, Raw),
    ("Guest_Referral_Source__c", 44, Raw),
    ("Community_Referral_Source__c", 45, Raw),
    ("Referral_Source_Other__c", 46, Raw),
    ("Community_Referral_Other__c", 47, Raw),
    // Prior living situation
    ("Usual_Sleep_Location__c", 48, Raw),
    ("Other_Sleep_Locations__c", 49, Raw),
    ("Same_as_Usual_Sleep__c", 51, Raw),
    ("Usual_Sleep_Location_2__c", 52, Raw),
    ("Type_of_Residence__c", 53, Raw),
    ("Rental_Subsidy_Type__c", 54, Raw),
    ("Length_of_Stay_in_Prior_Situation__c", 55, Raw),
    ("Length_of_Stay_Less_Than_7_Nights__c", 56, Raw),
    ("Length_of_Stay_Less_Than_90_Days__c", 57, Raw),
    ("Night_Before_Situation__c", 58, Raw),
    ("Ever_Homeless_in_SF__c", 62, Raw),
    ("Years_Homeless_in_SF__c", 63, Number),
    ("Months_Homeless_in_SF__c", 64, Number),
    ("Ever_Homeless_Outside_SF__c", 65, Raw),
    ("Years_Homeless_Outside_SF__c", 66, Number),
    ("Months_Homeless_Outside_SF__c", 67, Number),
    // Health
    ("Disabling_Condition__c", 68, Raw),
    ("Physical_Disability__c", 69, Text),
    ("Long_Term_Physical_Disability__c", 70, Bool),
    ("Developmental_Disability__c", 71, Text),
    ("Chronic_Health_Condition__c", 72, Text),
    ("Long_Term_Chronic_Health__c", 73, Bool),
    ("HIV_AIDS__c", 74, Text),
    ("Mental_Health_Disorder__c", 75, Text),
    ("Long_Term_Mental_Health__c", 76, Bool),
    ("Substance_Use_Disorder__c", 77, Text),
    ("Long_Term_Substance_Use__c", 78, Bool),
    ("Survivor_of_Domestic_Violence__c", 79, Text),
    ("When_experience_occurred__c", 80, Text),
    ("Are_you_currently_fleeing__c", 81, Text),
    // Income
    ("Income_from_Any_Source__c", 82, Text),
    ("Earned_Income__c", 83, Bool),
    ("Amount_Earned_Income__c", 84, Number),
    ("Unemployment_Insurance__c", 85, Bool),
    ("Amount_Unemployment__c", 86, Number),
    ("Supplemental_Security_Income_SSI__c", 87, Bool),
    ("Amount_SSI__c", 88, Number),
    ("Social_Security_Disability_Insurance_SS__c", 89, Bool),
    ("Amount_SSDI__c", 90, Number),
    ("VA_Service_Connected_Disability_Compensa__c", 91, Bool),
    ("Amount_VA_Service_Connected__c", 92, Number),
    ("VA_Non_Service_Connected_Disability_Pens__c", 93, Bool),
    ("Amount_VA_Non_Service_Connected__c", 94, Number),
    ("Private_Disability_Insurance__c", 95, Bool),
    ("Amount_Private_Disability__c", 96, Number),
    ("Worker_s_Compensation__c", 97, Bool),
    ("Amount_Worker_s_Comp__c", 98, Number),
    ("CalWORKs__c", 99, Bool),
    ("Amount_CalWORKs__c", 100, Number),
    ("CAAP__c", 101, Bool),
    ("Amount_CAAP__c", 102, Number),
    ("RetiremRent_Income_from_Social_Security__c", 103, Bool),
    ("Amount_Retirement_Social_Security__c", 104, Number),
    ("Pension_or_Retirement_Income_from_a_Form__c", 105, Bool),
    ("Amount_Pension__c", 106, Number),
    ("Child_Support__c", 107, Bool),
    ("Amount_Child_Support__c", 108, Number),
    ("Alimony_and_Other_Spousal_Support__c", 109, Bool),
    ("Amount_Alimony__c", 110, Number),
    ("Other_Income_Source_1__c", 111, Bool),
    ("Amount_Other_Income_1__c", 112, Number),
    ("Other_Income_Source_2__c", 113, Bool),
    // The export has no separate amount column for the second other-income
    // source; it shares the monthly total.
    ("Amount_Other_Income_2__c", 114, Number),
    ("Total_Monthly_Income_for_Individual__c", 114, Number),
    // Non-cash benefits
    ("Receiving_Non_Cash_Benefits__c", 115, Text),
    ("CalFresh_Food_Stamps__c", 116, Bool),
    ("WIC__c", 117, Bool),
    ("CalWORKS_Childcare_Services__c", 118, Bool),
    ("CalWORKS_Transportation__c", 119, Bool),
    ("Other_CalWORKS_Funded__c", 120, Bool),
    ("Other_Non_Cash_Benefit__c", 121, Bool),
    ("Source_Other_Non_Cash__c", 122, Raw),
    // Health insurance
    ("Covered_by_Health_Insurance__c", 123, Text),
    ("Medi_Cal__c", 124, Bool),
    ("MEDICARE__c", 125, Bool),
    ("State_Children_s_Health_Ins__c", 126, Bool),
    ("Veteran_s_Health_Admin_VHA__c", 127, Bool),
    ("Employer_Provided_Health_Ins__c", 128, Bool),
    ("COBRA__c", 129, Bool),
    ("Private_Pay_Health_Insurance__c", 130, Bool),
    ("State_Health_Insurance_for_Adults__c", 131, Bool),
    ("Indian_Health_Services_Prog__c", 132, Bool),
    ("Other_Health_Insurance__c", 133, Bool),
    ("Source_Other_Health_Ins__c", 134, Raw),
    ("Sexual_Orientation__c", 135, Raw),
    ("Other_Sexual_Orientation__c", 136, Raw),
    // Occupancy
    ("Unit_Assignment__c", 137, Raw),
    ("Bed_Assignment__c", 138, Raw),
    ("Occupancy_Start_Date__c", 139, DateTime),
    ("Occupancy_End_Date__c", 140, DateTime),
];

pub fn pipeline() -> Result<Pipeline, PipelineError> {
    Pipeline::new(
        "gnrl220",
        vec![
            contacts_step(Arc::new(Contacts)),
            PipelineStep::new(
                "syncProgramDetails",
                WriteTarget::new(PROGRAM_OBJECT, PROGRAM_EXTERNAL_ID),
                StepKind::Consuming,
                Arc::new(ProgramDetails),
            ),
        ],
    )
}

pub struct Contacts;

impl Transformer for Contacts {
    fn name(&self) -> &str {
        "gnrl220.contacts"
    }

    fn transform(
        &self,
        dataset: &Dataset,
        _ids: Option<&IdentifierMap>,
    ) -> Result<Vec<CandidateRecord>, TransformError> {
        let mut seen = HashSet::new();
        let mut contacts = Vec::new();

        for row in dataset.rows() {
            let Some(key) = row.get(UNIQUE_ID).to_key() else {
                continue;
            };
            if !seen.insert(key.clone()) {
                continue;
            }
            contacts.push(
                CandidateRecord::new()
                    .with("FirstName", row.get(FIRST_NAME).to_json())
                    .with("LastName", row.get(LAST_NAME).to_json())
                    .with("Birthdate", Date.apply(row.get(DOB)))
                    .with(CONTACT_EXTERNAL_ID, key),
            );
        }

        info!(
            "Extracted {} unique contacts from GNRL-220 data",
            contacts.len()
        );
        Ok(contacts)
    }
}

pub struct ProgramDetails;

impl Transformer for ProgramDetails {
    fn name(&self) -> &str {
        "gnrl220.program_details"
    }

    fn transform(
        &self,
        dataset: &Dataset,
        ids: Option<&IdentifierMap>,
    ) -> Result<Vec<CandidateRecord>, TransformError> {
        let ids = require_ids(self.name(), ids)?;
        let mut records = Vec::new();

        for row in dataset.rows() {
            let Some(key) = row.get(UNIQUE_ID).to_key() else {
                continue;
            };
            let Some(contact_id) = ids.get(&key) else {
                continue;
            };

            let mut record = CandidateRecord::new()
                .with("Contact__c", contact_id)
                .with("Name", key.clone())
                .with(PROGRAM_EXTERNAL_ID, key);
            for (field, column, coercion) in PROGRAM_FIELDS {
                record.insert(*field, coercion.apply(row.get(*column)));
            }
            records.push(record);
        }

        info!(
            "Prepared {} total program detail records for GNRL-220",
            records.len()
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CellValue, Row};
    use serde_json::{Value, json};

    fn wide_row(cells: &[(usize, CellValue)]) -> Row {
        let mut out = vec![CellValue::Null; 141];
        for (idx, cell) in cells {
            out[*idx] = cell.clone();
        }
        Row::new(out)
    }

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_field_table_has_unique_fields_within_row_width() {
        let mut seen = HashSet::new();
        for (field, column, _) in PROGRAM_FIELDS {
            assert!(seen.insert(*field), "duplicate field {field}");
            assert!(*column <= 140, "{field} reads column {column}");
            assert_ne!(*field, PROGRAM_EXTERNAL_ID);
        }
    }

    #[test]
    fn test_contacts_keep_first_row_per_id() {
        let dataset = Dataset::new(vec![
            wide_row(&[
                (0, text("U1")),
                (1, text("Ann")),
                (2, text("Lee")),
                (12, text("03/04/1990")),
            ]),
            wide_row(&[(0, text("U1")), (1, text("Annie")), (2, text("Lee"))]),
            wide_row(&[(0, CellValue::Number(1042.0)), (2, text("Kay"))]),
            wide_row(&[(0, text("  ")), (1, text("Blank"))]),
        ]);
        let contacts = Contacts.transform(&dataset, None).unwrap();
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0].get("FirstName"), Some(&json!("Ann")));
        assert_eq!(contacts[0].get("Birthdate"), Some(&json!("1990-03-04")));
        assert_eq!(
            contacts[1].external_id(CONTACT_EXTERNAL_ID).as_deref(),
            Some("1042")
        );
        assert_eq!(contacts[1].get("FirstName"), Some(&Value::Null));
    }

    #[test]
    fn test_program_details_coerce_columns() {
        let dataset = Dataset::new(vec![
            wide_row(&[
                (0, text("U1")),
                (1, text("Ann")),
                (6, CellValue::Number(45292.25)),
                (16, text(" Female ")),
                (70, text("Yes")),
                (84, text("1,250.50")),
                (114, CellValue::Number(900.0)),
                (138, text("Bed 4")),
            ]),
            wide_row(&[(0, text("U2"))]),
        ]);
        let ids: IdentifierMap = [("U1", "003X")].into_iter().collect();

        let records = ProgramDetails.transform(&dataset, Some(&ids)).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.get("Contact__c"), Some(&json!("003X")));
        assert_eq!(r.get("Name"), Some(&json!("U1")));
        assert_eq!(r.external_id(PROGRAM_EXTERNAL_ID).as_deref(), Some("U1"));
        assert_eq!(r.get("Name__c"), Some(&json!("Ann")));
        assert_eq!(
            r.get("Enrollment_Start_Date__c"),
            Some(&json!("2024-01-01T06:00:00.000Z"))
        );
        assert_eq!(r.get("Gender__c"), Some(&json!("Female")));
        assert_eq!(r.get("Long_Term_Physical_Disability__c"), Some(&json!(true)));
        assert_eq!(r.get("Earned_Income__c"), Some(&json!(false)));
        assert_eq!(r.get("Amount_Earned_Income__c"), Some(&json!(1250.5)));
        assert_eq!(r.get("Amount_Other_Income_2__c"), Some(&json!(900.0)));
        assert_eq!(r.get("Bed_Assignment__c"), Some(&json!("Bed 4")));
        assert_eq!(r.get("Veteran_Status__c"), Some(&Value::Null));
        assert_eq!(r.fields().len(), PROGRAM_FIELDS.len() + 3);
    }

    #[test]
    fn test_program_details_require_map() {
        assert!(ProgramDetails.transform(&Dataset::default(), None).is_err());
    }
}
