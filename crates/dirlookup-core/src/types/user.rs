//! User profile types

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Profile of an authenticated directory user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Account name in `domain\user` form
    pub user_name: String,
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    /// Direct and nested group memberships
    #[serde(default)]
    pub group_names: BTreeSet<String>,
}

impl UserProfile {
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            ..Default::default()
        }
    }

    /// Check membership in a group, directly or through nesting
    pub fn is_member_of(&self, group: &str) -> bool {
        self.group_names.contains(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_serialization() {
        let mut profile = UserProfile::new("corp.example.com\\jdoe");
        profile.email = Some("jdoe@corp.example.com".to_string());
        profile.group_names.insert("Sales".to_string());
        profile.group_names.insert("Employees".to_string());

        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["user_name"], "corp.example.com\\jdoe");
        assert_eq!(json["company_name"], serde_json::Value::Null);
        assert_eq!(json["group_names"], serde_json::json!(["Employees", "Sales"]));

        assert!(profile.is_member_of("Sales"));
        assert!(!profile.is_member_of("sales"));
    }
}
