#[allow(dead_code)]
#[path = "../src/classify.rs"]
mod classify;

use classify::{classify, ActivityType};

#[test]
fn classification_ignores_extension_and_folder_text() {
    assert_eq!(classify("3학년 진로활동(최종).xlsx"), ActivityType::Career);
    assert_eq!(classify("~$봉사활동.xlsx"), ActivityType::Volunteer);
    assert_eq!(classify("activities.ods"), ActivityType::Unknown);
}

#[test]
fn activity_type_wire_names() {
    assert_eq!(
        serde_json::to_value(ActivityType::Autonomy).expect("serialize"),
        serde_json::json!("autonomy")
    );
    let parsed: ActivityType = serde_json::from_str("\"club\"").expect("deserialize");
    assert_eq!(parsed, ActivityType::Unknown);
    let parsed: ActivityType = serde_json::from_str("\"volunteer\"").expect("deserialize");
    assert_eq!(parsed.as_str(), "volunteer");
}
