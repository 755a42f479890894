//! XML name validation and naming policies
//!
//! Validation of the names a schema declares (element, attribute and
//! container names must be NCNames), and the naming policies that derive XML
//! names from declared field names.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;

use regex::Regex;

static NCNAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Z_a-z\u{C0}-\u{D6}\u{D8}-\u{F6}\u{F8}-\u{2FF}\u{370}-\u{37D}\u{37F}-\u{1FFF}][A-Z_a-z\u{C0}-\u{D6}\u{D8}-\u{F6}\u{F8}-\u{2FF}\u{370}-\u{37D}\u{37F}-\u{1FFF}\-\.0-9\u{B7}]*$",
    )
    .expect("NCName pattern is valid")
});

/// Check if a string is a valid NCName (non-colonized name)
pub fn is_valid_ncname(name: &str) -> bool {
    !name.is_empty() && NCNAME.is_match(name)
}

/// Validate an NCName and return an error if invalid
pub fn validate_ncname(name: &str) -> Result<()> {
    if is_valid_ncname(name) {
        Ok(())
    } else {
        Err(Error::Name(format!("Invalid NCName: '{}'", name)))
    }
}

/// Custom naming function
pub type NamingFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Policy converting declared field names into XML names
#[derive(Clone)]
pub enum NamingPolicy {
    /// `HTTPServer` → `httpServer`
    CamelCase,
    /// `PascalCase` → `pascal_case`
    SnakeCase,
    /// Caller-supplied pure function
    Custom(NamingFn),
}

impl NamingPolicy {
    /// Wrap a custom naming function
    pub fn custom(f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        NamingPolicy::Custom(Arc::new(f))
    }

    /// Parse a policy by name (`camelCase` or `snake_case`)
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "camelCase" | "camel_case" => Ok(NamingPolicy::CamelCase),
            "snake_case" | "snakeCase" => Ok(NamingPolicy::SnakeCase),
            _ => Err(Error::Config(format!(
                "Unknown naming policy: '{}'. Must be 'camelCase' or 'snake_case'",
                name
            ))),
        }
    }

    /// Convert a name according to the policy
    pub fn convert_name(&self, name: &str) -> String {
        match self {
            NamingPolicy::CamelCase => camel_case(name),
            NamingPolicy::SnakeCase => snake_case(name),
            NamingPolicy::Custom(f) => f(name),
        }
    }

    /// Convert an optional name; absent stays absent
    pub fn convert_optional(&self, name: Option<&str>) -> Option<String> {
        name.map(|n| self.convert_name(n))
    }
}

impl fmt::Debug for NamingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamingPolicy::CamelCase => write!(f, "CamelCase"),
            NamingPolicy::SnakeCase => write!(f, "SnakeCase"),
            NamingPolicy::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Lowercase the leading run of uppercase letters, stopping one letter before
/// a lowercase letter begins.
pub fn camel_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    match chars.first() {
        Some(c) if c.is_uppercase() => {}
        _ => return name.to_string(),
    }

    let mut lower_until = 0;
    for i in 0..chars.len() {
        if i == 1 && !chars[i].is_uppercase() {
            break;
        }

        let has_next = i + 1 < chars.len();
        if i > 0 && has_next && !chars[i + 1].is_uppercase() {
            // "FOO Bar": the run ends at a separator, so its last letter is still lowered
            if is_separator(chars[i + 1]) {
                lower_until = i + 1;
            }
            break;
        }

        lower_until = i + 1;
    }

    let mut out = String::with_capacity(name.len());
    for (i, c) in chars.iter().enumerate() {
        if i < lower_until {
            out.extend(c.to_lowercase());
        } else {
            out.push(*c);
        }
    }
    out
}

/// Insert `_` before every uppercase letter except the first character, then
/// lowercase every letter.
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn is_separator(c: char) -> bool {
    matches!(c, ' ' | '\u{a0}' | '\u{2028}' | '\u{2029}' | '\u{3000}' | '\u{1680}' | '\u{202f}' | '\u{205f}')
        || ('\u{2000}'..='\u{200a}').contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_ncname() {
        assert!(is_valid_ncname("element"));
        assert!(is_valid_ncname("my-element"));
        assert!(is_valid_ncname("_element.v2"));

        assert!(!is_valid_ncname(""));
        assert!(!is_valid_ncname("prefix:element"));
        assert!(!is_valid_ncname("123element"));
        assert!(!is_valid_ncname("-element"));

        assert!(validate_ncname("Order").is_ok());
        assert!(matches!(validate_ncname("a b"), Err(Error::Name(_))));
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(camel_case("HTTPServer"), "httpServer");
        assert_eq!(camel_case("XMLParser"), "xmlParser");
        assert_eq!(camel_case("Name"), "name");
        assert_eq!(camel_case("ID"), "id");
        assert_eq!(camel_case("alreadyCamel"), "alreadyCamel");
        assert_eq!(camel_case("FOO Bar"), "foo Bar");
        assert_eq!(camel_case(""), "");
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("PascalCase"), "pascal_case");
        assert_eq!(snake_case("HTTPServer"), "h_t_t_p_server");
        assert_eq!(snake_case("lower"), "lower");
        assert_eq!(snake_case(""), "");
    }

    #[test]
    fn test_policy_absent_input() {
        assert_eq!(NamingPolicy::CamelCase.convert_optional(None), None);
        assert_eq!(NamingPolicy::SnakeCase.convert_optional(None), None);
        assert_eq!(
            NamingPolicy::SnakeCase.convert_optional(Some("OrderId")),
            Some("order_id".to_string())
        );
    }

    #[test]
    fn test_custom_policy() {
        let policy = NamingPolicy::custom(|n| n.to_uppercase());
        assert_eq!(policy.convert_name("name"), "NAME");
    }

    #[test]
    fn test_from_name() {
        assert!(matches!(NamingPolicy::from_name("camelCase"), Ok(NamingPolicy::CamelCase)));
        assert!(matches!(NamingPolicy::from_name("snake_case"), Ok(NamingPolicy::SnakeCase)));
        assert!(NamingPolicy::from_name("kebab").is_err());
    }
}
