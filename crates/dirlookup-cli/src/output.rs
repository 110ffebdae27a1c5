//! Profile rendering for the terminal

use colored::Colorize;
use dirlookup_core::types::UserProfile;
use std::fmt::Write;

pub fn render_json(profile: &UserProfile) -> serde_json::Result<String> {
    serde_json::to_string_pretty(profile)
}

pub fn render_text(profile: &UserProfile) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", profile.user_name.blue().bold());
    field(&mut out, "Display Name", profile.display_name.as_deref());
    field(&mut out, "Email", profile.email.as_deref());
    field(&mut out, "Company", profile.company_name.as_deref());

    let _ = writeln!(
        out,
        "  {} ({}):",
        "Groups".cyan(),
        profile.group_names.len()
    );
    for group in &profile.group_names {
        let _ = writeln!(out, "    {}", group);
    }

    out
}

fn field(out: &mut String, label: &str, value: Option<&str>) {
    let _ = writeln!(out, "  {}: {}", label.cyan(), value.unwrap_or("-"));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> UserProfile {
        let mut profile = UserProfile::new("corp.example.com\\jdoe");
        profile.email = Some("a@x.com;b@x.com".to_string());
        profile.display_name = Some("John Doe".to_string());
        profile.group_names.insert("Sales".to_string());
        profile.group_names.insert("Employees".to_string());
        profile
    }

    #[test]
    fn test_render_text() {
        colored::control::set_override(false);

        let text = render_text(&profile());
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "corp.example.com\\jdoe");
        assert_eq!(lines[1], "  Display Name: John Doe");
        assert_eq!(lines[2], "  Email: a@x.com;b@x.com");
        assert_eq!(lines[3], "  Company: -");
        assert_eq!(lines[4], "  Groups (2):");
        // sorted
        assert_eq!(lines[5], "    Employees");
        assert_eq!(lines[6], "    Sales");
    }

    #[test]
    fn test_render_json() {
        let json = render_json(&profile()).unwrap();
        let parsed: UserProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, profile());
    }
}
