//! Search filter construction
//!
//! Every value interpolated into a filter passes through [`escape`], whether
//! it comes from the caller (the account name) or from an earlier directory
//! response (group names found while expanding nested groups).

/// Neutralize filter metacharacters in an untrusted value.
///
/// Backslashes are dropped, then `(`, `)`, `&`, `|` and `=` are each
/// prefixed with a backslash.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 4);
    for c in raw.chars() {
        match c {
            '\\' => {}
            '(' | ')' | '&' | '|' | '=' => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

/// Filter matching a user account by `sAMAccountName`
pub fn user_filter(username: &str) -> String {
    format!(
        "(&(objectClass=person)(objectCategory=user)(sAMAccountName={}))",
        escape(username)
    )
}

/// Filter matching a group by common name
pub fn group_filter(group_name: &str) -> String {
    format!("(&(objectClass=group)(cn={}))", escape(group_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_metacharacters() {
        assert_eq!(escape("A(B)"), r"A\(B\)");
        assert_eq!(escape("R&D"), r"R\&D");
        assert_eq!(escape("a|b"), r"a\|b");
        assert_eq!(escape("x=y"), r"x\=y");
        assert_eq!(escape("*)(cn=*"), r"*\)\(cn\=*");
    }

    #[test]
    fn test_escape_drops_backslashes() {
        assert_eq!(escape(r"x\y"), "xy");
        // the backslash of an escaped comma goes, the comma stays
        assert_eq!(escape(r"Smith\, John"), "Smith, John");
        assert_eq!(escape(r"\("), r"\(");
    }

    #[test]
    fn test_escape_passthrough() {
        assert_eq!(escape(""), "");
        assert_eq!(escape("Domain Users"), "Domain Users");
        assert_eq!(escape("Ünïcödé-Grüppe"), "Ünïcödé-Grüppe");
    }

    #[test]
    fn test_filters() {
        assert_eq!(
            user_filter("jdoe"),
            "(&(objectClass=person)(objectCategory=user)(sAMAccountName=jdoe))"
        );
        assert_eq!(
            group_filter("Sales (EMEA)"),
            r"(&(objectClass=group)(cn=Sales \(EMEA\)))"
        );
        assert_eq!(
            user_filter("x)(objectClass=*"),
            r"(&(objectClass=person)(objectCategory=user)(sAMAccountName=x\)\(objectClass\=*))"
        );
    }
}
