use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeEntryForm {
    pub id: String,
    pub short_identifier: String,
    pub description: String,
    pub message: String,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeEntryItem {
    pub id: String,
    pub name: String,
    pub out_of: f64,
    pub position: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub user_name: String,
    pub last_name: String,
    pub first_name: String,
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeEntryStudent {
    pub id: String,
    pub form_id: String,
    pub student_id: String,
    pub released: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: String,
    pub grade_entry_student_id: String,
    pub grade_entry_item_id: String,
    pub grade: Option<f64>,
}

/// One roster row as seen through a form: the student plus its release state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRow {
    pub student_id: String,
    pub user_name: String,
    pub last_name: String,
    pub first_name: String,
    pub released: bool,
}
