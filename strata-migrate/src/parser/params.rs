//! `${name}` parameter substitution.

use std::borrow::Cow;
use std::collections::BTreeMap;

/// Replace every `${name}` whose name is a known parameter.
///
/// Unknown names and an unterminated `${` are left as they are.
pub fn substitute_parameters<'a>(text: &'a str, parameters: &BTreeMap<String, String>) -> Cow<'a, str> {
    if parameters.is_empty() || !text.contains("${") {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match parameters.get(name) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 1]),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);

    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_known_parameter_replaced() {
        let p = params(&[("schema", "app")]);
        assert_eq!(
            substitute_parameters("CREATE TABLE ${schema}.users();", &p),
            "CREATE TABLE app.users();"
        );
    }

    #[test]
    fn test_unknown_parameter_kept() {
        let p = params(&[("schema", "app")]);
        assert_eq!(
            substitute_parameters("SELECT '${other}', ${schema};", &p),
            "SELECT '${other}', app;"
        );
    }

    #[test]
    fn test_unterminated_kept() {
        let p = params(&[("schema", "app")]);
        assert_eq!(substitute_parameters("SELECT ${schema", &p), "SELECT ${schema");
    }

    #[test]
    fn test_multiple_occurrences() {
        let p = params(&[("a", "1"), ("b", "2")]);
        assert_eq!(substitute_parameters("${a}${b}${a}", &p), "121");
    }

    #[test]
    fn test_no_parameters_borrows() {
        let text = "SELECT ${x};";
        assert!(matches!(
            substitute_parameters(text, &BTreeMap::new()),
            Cow::Borrowed(_)
        ));
    }
}
