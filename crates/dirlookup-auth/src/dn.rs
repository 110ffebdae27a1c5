//! Distinguished name helpers

const CN_PREFIX: &str = "CN=";

/// Extract the common name from a distinguished name.
///
/// Returns the text after the first `CN=` up to the next comma that is not
/// escaped with a backslash. Escaped commas are kept as-is, backslash
/// included. Returns `None` when the DN has no `CN=` component or the
/// component is empty.
pub fn extract_common_name(dn: &str) -> Option<String> {
    let start = dn.find(CN_PREFIX)? + CN_PREFIX.len();
    let rest = &dn[start..];
    let bytes = rest.as_bytes();

    // ',' is ASCII, so any byte match is also a char boundary
    let end = bytes
        .iter()
        .enumerate()
        .find(|&(i, &b)| b == b',' && (i == 0 || bytes[i - 1] != b'\\'))
        .map_or(rest.len(), |(i, _)| i);

    let name = &rest[..end];
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Search base for a DNS domain, e.g. `corp.example.com` becomes
/// `dc=corp,dc=example,dc=com`
pub fn base_dn_from_domain(domain: &str) -> String {
    domain
        .split('.')
        .map(|label| format!("dc={}", label))
        .collect::<Vec<_>>()
        .join(",")
}
