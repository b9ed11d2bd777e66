//! Pure string transforms used to derive equivalent-but-distinct spellings of
//! domains and paths. Every function is total over its input; composition
//! order is fixed by `domain_variants` and `path_variants`.

use crate::utils::unique;

// Look-alike substitutions: modifier capital letters plus circled digits.
// Letters without a convincing confusable (c, f, q, s, v, x, y, z) and the
// digit zero are left alone.
const CONFUSABLES: &[(char, char)] = &[
    ('a', '\u{1d2c}'),
    ('b', '\u{1d2e}'),
    ('d', '\u{1d30}'),
    ('e', '\u{1d31}'),
    ('g', '\u{1d33}'),
    ('h', '\u{1d34}'),
    ('i', '\u{1d35}'),
    ('j', '\u{1d36}'),
    ('k', '\u{1d37}'),
    ('l', '\u{1d38}'),
    ('m', '\u{1d39}'),
    ('n', '\u{1d3a}'),
    ('o', '\u{1d3c}'),
    ('p', '\u{1d3e}'),
    ('r', '\u{1d3f}'),
    ('t', '\u{1d40}'),
    ('u', '\u{1d41}'),
    ('w', '\u{1d42}'),
    ('1', '\u{2460}'),
    ('2', '\u{2461}'),
    ('3', '\u{2462}'),
    ('4', '\u{2463}'),
    ('5', '\u{2464}'),
    ('6', '\u{2465}'),
    ('7', '\u{2466}'),
    ('8', '\u{2467}'),
    ('9', '\u{2468}'),
];

/// Alternates the case of alphabetic characters, starting with the inverse of
/// the first letter's case. Strings without letters come back unchanged.
pub fn mix_case(input: &str) -> String {
    let mut upper = input
        .chars()
        .find(|c| c.is_alphabetic())
        .map(|c| c.is_uppercase())
        .unwrap_or(false);
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        if ch.is_alphabetic() {
            if upper {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            upper = !upper;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Substitutes table characters with their look-alike code points,
/// case-insensitively.
pub fn unicode_confusable(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        let key = ch.to_ascii_lowercase();
        match CONFUSABLES.iter().find(|(k, _)| *k == key) {
            Some((_, repl)) => out.push(*repl),
            None => out.push(ch),
        }
    }
    out
}

/// Lowercases the whole string and uppercases the first letter.
pub fn capitalize_first(input: &str) -> String {
    let mut changed = false;
    let mut out = String::with_capacity(input.len());
    for ch in input.chars().flat_map(|c| c.to_lowercase()) {
        if !changed && ch.is_alphabetic() {
            out.extend(ch.to_uppercase());
            changed = true;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Percent-encodes every alphanumeric character to the hex form of its code
/// point; everything else passes through unchanged.
pub fn percent_hex(input: &str) -> String {
    let mut out = String::new();
    for ch in input.chars() {
        if ch.is_alphanumeric() {
            out.push_str(&format!("%{:x}", ch as u32));
        } else {
            out.push(ch);
        }
    }
    out
}

/// RFC 3986 percent-quoting of the UTF-8 bytes; unreserved characters and the
/// path separator stay literal.
pub fn percent_quote(input: &str) -> String {
    let mut out = String::new();
    for b in input.as_bytes() {
        match *b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(*b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

/// Derives every spelling of `host` used by the encoding bypass: plain, lower,
/// upper, mixed-case, confusable-unicode, percent-quoted unicode, then the
/// hex-encoded form of each prior variant. Hex on top of the percent-quoted
/// unicode spelling produces a non-functional combination and is skipped.
/// The port is appended to every entry.
pub fn domain_variants(host: &str, port: u16) -> Vec<String> {
    let mut tmp = vec![
        host.to_string(),
        host.to_lowercase(),
        host.to_uppercase(),
        mix_case(host),
        percent_quote(&unicode_confusable(host)),
    ];
    for entry in tmp[..tmp.len() - 1].to_vec() {
        tmp.push(percent_hex(&entry));
    }
    for entry in tmp.iter_mut() {
        *entry = format!("{entry}:{port}");
    }
    unique(tmp)
}

/// Same variant families applied to the final path segment only, with the
/// directory prefix and any trailing slash re-attached.
pub fn path_variants(path: &str) -> Vec<String> {
    if path.is_empty() {
        return Vec::new();
    }
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return vec!["/".to_string()];
    }
    let (dir, last) = match trimmed.rsplit_once('/') {
        Some((dir, last)) => (Some(dir), last),
        None => (None, trimmed),
    };
    let mut tmp = vec![
        last.to_string(),
        last.to_lowercase(),
        last.to_uppercase(),
        mix_case(last),
        capitalize_first(last),
        percent_quote(&unicode_confusable(last)),
    ];
    for entry in tmp[..tmp.len() - 1].to_vec() {
        tmp.push(percent_hex(&entry));
    }
    let prepend = match dir {
        Some(dir) => format!("/{dir}/"),
        None => "/".to_string(),
    };
    let append = if path.ends_with('/') { "/" } else { "" };
    unique(
        tmp.into_iter()
            .map(|entry| format!("{prepend}{entry}{append}"))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mix_case_starts_with_inverse_of_first_letter() {
        assert_eq!(mix_case("admin"), "AdMiN");
        assert_eq!(mix_case("Admin"), "aDmIn");
        assert_eq!(mix_case("127.0.0.1"), "127.0.0.1");
    }

    #[test]
    fn unicode_confusable_is_case_insensitive() {
        assert_eq!(unicode_confusable("ab"), "\u{1d2c}\u{1d2e}");
        assert_eq!(unicode_confusable("AB"), "\u{1d2c}\u{1d2e}");
        // zero has no confusable
        assert_eq!(unicode_confusable("127.0.0.1"), "\u{2460}\u{2461}\u{2466}.0.0.\u{2460}");
    }

    #[test]
    fn capitalize_first_lowercases_the_rest() {
        assert_eq!(capitalize_first("aDMIN"), "Admin");
        assert_eq!(capitalize_first("1admin"), "1Admin");
        assert_eq!(capitalize_first(""), "");
    }

    #[test]
    fn percent_hex_encodes_alphanumerics_only() {
        assert_eq!(percent_hex("a1/b"), "%61%31/%62");
        assert_eq!(percent_hex("../"), "../");
    }

    #[test]
    fn percent_quote_keeps_unreserved_and_slash() {
        assert_eq!(percent_quote("a-b_c.d~/e"), "a-b_c.d~/e");
        assert_eq!(percent_quote("\u{2460}"), "%E2%91%A0");
    }

    #[test]
    fn domain_variants_dedupe_and_carry_port() {
        let out = domain_variants("example.com", 443);
        assert!(out.iter().all(|d| d.ends_with(":443")));
        assert!(out.contains(&"EXAMPLE.COM:443".to_string()));
        assert!(out.contains(&"%65%78%61%6d%70%6c%65.%63%6f%6d:443".to_string()));
        let uniques: std::collections::HashSet<_> = out.iter().collect();
        assert_eq!(uniques.len(), out.len());
    }

    #[test]
    fn domain_variants_skip_hex_of_quoted_unicode() {
        let out = domain_variants("ab.com", 80);
        // hex of the percent-quoted confusable form would start with "%25"
        assert!(!out.iter().any(|d| d.contains("%25")));
    }

    #[test]
    fn path_variants_reattach_directory_and_trailing_slash() {
        let out = path_variants("/app/admin/");
        assert!(out.iter().all(|p| p.starts_with("/app/")));
        assert!(out.iter().all(|p| p.ends_with('/')));
        assert!(out.contains(&"/app/ADMIN/".to_string()));

        assert_eq!(path_variants("/"), vec!["/".to_string()]);
        assert!(path_variants("/admin")
            .iter()
            .all(|p| !p.ends_with('/')));
    }

    #[test]
    fn variant_derivation_is_idempotent() {
        assert_eq!(
            domain_variants("example.com", 443),
            domain_variants("example.com", 443)
        );
        assert_eq!(path_variants("/admin"), path_variants("/admin"));
    }
}
