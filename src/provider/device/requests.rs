//! # Request Types
//!
//! ISAPI access-control request bodies. Field names follow the device's
//! JSON schema, which mixes camelCase and PascalCase.

use crate::config::EnrollmentDefaults;
use crate::model::CanonicalUser;
use serde::Serialize;

/// `POST /ISAPI/AccessControl/UserInfo/Search`
#[derive(Debug, Serialize)]
pub struct SearchRequest {
    #[serde(rename = "UserInfoSearchCond")]
    pub cond: SearchCondition,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCondition {
    #[serde(rename = "searchID")]
    pub search_id: String,
    pub search_result_position: u32,
    pub max_results: u32,
}

impl SearchRequest {
    pub fn page(search_id: &str, position: u32, max_results: u32) -> Self {
        Self {
            cond: SearchCondition {
                search_id: search_id.to_string(),
                search_result_position: position,
                max_results,
            },
        }
    }
}

/// `POST /ISAPI/AccessControl/UserInfo/Record`
#[derive(Debug, Serialize)]
pub struct RecordRequest {
    #[serde(rename = "UserInfo")]
    pub user_info: Vec<RecordUserInfo>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordUserInfo {
    pub employee_no: String,
    pub name: String,
    pub user_type: String,
    pub gender: String,
    #[serde(rename = "localUIRight")]
    pub local_ui_right: bool,
    #[serde(rename = "Valid")]
    pub valid: RecordValidity,
    pub door_right: String,
    #[serde(rename = "RightPlan")]
    pub right_plan: Vec<RightPlan>,
    pub user_verify_mode: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub belong_group: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordValidity {
    pub enable: bool,
    pub begin_time: String,
    pub end_time: String,
    pub time_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RightPlan {
    pub door_no: u32,
    pub plan_template_no: String,
}

impl RecordRequest {
    pub fn enroll(user: &CanonicalUser, defaults: &EnrollmentDefaults) -> Self {
        Self {
            user_info: vec![RecordUserInfo {
                employee_no: user.id.clone(),
                name: user.display_name.clone(),
                user_type: defaults.user_type.clone(),
                gender: defaults.gender.clone(),
                local_ui_right: defaults.local_ui_right,
                valid: RecordValidity {
                    enable: user.enabled,
                    begin_time: defaults.begin_time.clone(),
                    end_time: defaults.end_time.clone(),
                    time_type: defaults.time_type.clone(),
                },
                door_right: defaults.door_right.clone(),
                right_plan: vec![RightPlan {
                    door_no: defaults.door_no,
                    plan_template_no: defaults.plan_template_no.clone(),
                }],
                user_verify_mode: defaults.user_verify_mode.clone(),
                password: user.pin.clone(),
                belong_group: user.group.clone(),
            }],
        }
    }
}

/// `PUT /ISAPI/AccessControl/UserInfo/Modify`
#[derive(Debug, Serialize)]
pub struct ModifyRequest {
    #[serde(rename = "UserInfo")]
    pub user_info: ModifyUserInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyUserInfo {
    pub employee_no: String,
    pub name: String,
    #[serde(rename = "Valid")]
    pub valid: ModifyValidity,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct ModifyValidity {
    pub enable: bool,
}

impl ModifyRequest {
    pub fn from_user(user: &CanonicalUser) -> Self {
        Self {
            user_info: ModifyUserInfo {
                employee_no: user.id.clone(),
                name: user.display_name.clone(),
                valid: ModifyValidity {
                    enable: user.enabled,
                },
                password: user.pin.clone(),
            },
        }
    }
}

/// `PUT /ISAPI/AccessControl/UserInfoDetail/Delete`
#[derive(Debug, Serialize)]
pub struct DeleteRequest {
    #[serde(rename = "UserInfoDetail")]
    pub detail: DeleteDetail,
}

#[derive(Debug, Serialize)]
pub struct DeleteDetail {
    pub mode: &'static str,
    #[serde(rename = "EmployeeNoList")]
    pub employee_no_list: Vec<EmployeeNo>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeNo {
    pub employee_no: String,
}

impl DeleteRequest {
    pub fn by_employee_no(user_id: &str) -> Self {
        Self {
            detail: DeleteDetail {
                mode: "byEmployeeNo",
                employee_no_list: vec![EmployeeNo {
                    employee_no: user_id.to_string(),
                }],
            },
        }
    }
}
