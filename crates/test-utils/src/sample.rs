use chrono::{Duration, Utc};
use serde_json::{Map, Value};
use vercre_mdoc::ValidityInfo;

use crate::issuer::{AAMVA_NAME_SPACE, NAME_SPACE};

/// A credential dataset keyed by name space.
///
/// # Panics
///
/// Panics if the JSON is not an object.
#[must_use]
pub fn dataset() -> Map<String, Value> {
    let dataset = serde_json::json!({
        NAME_SPACE: {
            "given_name": "Normal",
            "family_name": "Person",
            "birth_date": "1985-04-12",
            "document_number": "DL-1234567",
            "age_over_18": true,
            "driving_privileges": [
                { "vehicle_category_code": "B", "issue_date": "2020-01-01" }
            ]
        },
        AAMVA_NAME_SPACE: {
            "DHS_compliance": "F",
            "sex": 1
        }
    });

    let Value::Object(dataset) = dataset else {
        panic!("dataset should be an object");
    };
    dataset
}

/// A validity window starting now and lasting a year.
#[must_use]
pub fn validity_info() -> ValidityInfo {
    let signed = Utc::now();
    ValidityInfo::new(signed, signed + Duration::days(365))
}
