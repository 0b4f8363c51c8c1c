// infostring.rs -- "\key\value\..." encoding used for userinfo, serverinfo
// and the getinfo/getstatus discovery replies, plus the cvar flag bits that
// decide which cvars get mirrored into those strings.

// ============================================================
// Cvar flags
// ============================================================

pub const CVAR_ZERO: i32 = 0;
pub const CVAR_ARCHIVE: i32 = 1;
pub const CVAR_USERINFO: i32 = 2;
pub const CVAR_SERVERINFO: i32 = 4;
pub const CVAR_NOSET: i32 = 8;
pub const CVAR_LATCH: i32 = 16;

// ============================================================
// Info string limits
// ============================================================

pub const MAX_INFO_KEY: usize = 64;
pub const MAX_INFO_VALUE: usize = 64;
pub const MAX_INFO_STRING: usize = 512;

// ============================================================
// Info string functions
// ============================================================

/// Search info string `s` for `key`, return value or empty string.
pub fn info_value_for_key(s: &str, key: &str) -> String {
    let mut chars = s;
    if chars.starts_with('\\') {
        chars = &chars[1..];
    }

    loop {
        // parse key
        let sep = chars.find('\\');
        let pkey = match sep {
            Some(pos) => {
                let k = &chars[..pos];
                chars = &chars[pos + 1..];
                k
            }
            None => return String::new(),
        };

        // parse value
        let sep = chars.find('\\');
        let value = match sep {
            Some(pos) => {
                let v = &chars[..pos];
                chars = &chars[pos + 1..];
                v
            }
            None => {
                // value runs to end of string
                let v = chars;
                if pkey == key {
                    return v.to_string();
                }
                return String::new();
            }
        };

        if pkey == key {
            return value.to_string();
        }
    }
}

/// Remove a key (and its value) from an info string.
pub fn info_remove_key(s: &mut String, key: &str) {
    if key.contains('\\') {
        return;
    }

    let mut result = String::new();
    let mut chars = s.as_str();
    if chars.starts_with('\\') {
        chars = &chars[1..];
    }

    loop {
        if chars.is_empty() {
            break;
        }

        let sep = chars.find('\\');
        let pkey = match sep {
            Some(pos) => {
                let k = &chars[..pos];
                chars = &chars[pos + 1..];
                k
            }
            None => break,
        };

        let sep = chars.find('\\');
        let value = match sep {
            Some(pos) => {
                let v = &chars[..pos];
                chars = &chars[pos + 1..];
                v
            }
            None => {
                let v = chars;
                chars = "";
                v
            }
        };

        if pkey != key {
            result.push('\\');
            result.push_str(pkey);
            result.push('\\');
            result.push_str(value);
        }
    }

    *s = result;
}

/// Check that an info string contains no illegal characters.
pub fn info_validate(s: &str) -> bool {
    !s.contains('"') && !s.contains(';')
}

/// Set a key/value pair in an info string.
pub fn info_set_value_for_key(s: &mut String, key: &str, value: &str) {
    if key.contains('\\') || value.contains('\\') {
        return;
    }
    if key.contains(';') {
        return;
    }
    if key.contains('"') || value.contains('"') {
        return;
    }
    if key.len() >= MAX_INFO_KEY || value.len() >= MAX_INFO_KEY {
        return;
    }

    info_remove_key(s, key);

    if value.is_empty() {
        return;
    }

    let newi = format!("\\{}\\{}", key, value);
    if newi.len() + s.len() > MAX_INFO_STRING {
        return;
    }

    // only append printable ASCII (32..127)
    for c in newi.bytes() {
        let c = c & 127;
        if (32..127).contains(&c) {
            s.push(c as char);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_for_key_found() {
        let s = "\\name\\player\\skin\\male";
        assert_eq!(info_value_for_key(s, "name"), "player");
        assert_eq!(info_value_for_key(s, "skin"), "male");
    }

    #[test]
    fn value_for_key_missing() {
        let s = "\\name\\player";
        assert_eq!(info_value_for_key(s, "nope"), "");
    }

    #[test]
    fn set_then_get_roundtrip() {
        let mut s = String::new();
        info_set_value_for_key(&mut s, "name", "player");
        info_set_value_for_key(&mut s, "rate", "25000");
        assert_eq!(info_value_for_key(&s, "name"), "player");
        assert_eq!(info_value_for_key(&s, "rate"), "25000");
    }

    #[test]
    fn set_empty_value_removes_key() {
        let mut s = String::new();
        info_set_value_for_key(&mut s, "name", "player");
        info_set_value_for_key(&mut s, "name", "");
        assert_eq!(info_value_for_key(&s, "name"), "");
    }

    #[test]
    fn set_rejects_illegal_characters() {
        let mut s = String::new();
        info_set_value_for_key(&mut s, "na\\me", "x");
        assert_eq!(s, "");
        info_set_value_for_key(&mut s, "name", "x\"y");
        assert_eq!(s, "");
    }

    #[test]
    fn remove_key_preserves_others() {
        let mut s = "\\a\\1\\b\\2\\c\\3".to_string();
        info_remove_key(&mut s, "b");
        assert_eq!(info_value_for_key(&s, "a"), "1");
        assert_eq!(info_value_for_key(&s, "b"), "");
        assert_eq!(info_value_for_key(&s, "c"), "3");
    }

    #[test]
    fn validate_rejects_quote_and_semicolon() {
        assert!(info_validate("clean string"));
        assert!(!info_validate("has\"quote"));
        assert!(!info_validate("has;semicolon"));
    }
}
