/// Expand `${NAME}` and `${NAME:-fallback}` placeholders from the process
/// environment.
///
/// Unset variables without a fallback are left verbatim so the parse error
/// (or the literal value) points at the missing variable.
pub fn substitute_env(input: &str) -> String {
    expand_with(input, |name| std::env::var(name).ok())
}

fn expand_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated: keep the remainder untouched.
            out.push_str(&rest[start..]);
            return out;
        };

        let expr = &after[..end];
        let (name, fallback) = match expr.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (expr, None),
        };

        match (lookup(name), fallback) {
            (Some(value), _) if !name.is_empty() => out.push_str(&value),
            (_, Some(fallback)) => out.push_str(fallback),
            _ => {
                out.push_str("${");
                out.push_str(expr);
                out.push('}');
            },
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "COURIER_GATEWAY" => Some("http://gw.local:8080".into()),
            _ => None,
        }
    }

    #[test]
    fn expands_known_variable() {
        assert_eq!(
            expand_with("base_url = \"${COURIER_GATEWAY}/api\"", lookup),
            "base_url = \"http://gw.local:8080/api\""
        );
    }

    #[test]
    fn uses_fallback_for_unset_variable() {
        assert_eq!(expand_with("${COURIER_UNSET:-30}", lookup), "30");
        assert_eq!(
            expand_with("${COURIER_GATEWAY:-ignored}", lookup),
            "http://gw.local:8080"
        );
    }

    #[test]
    fn keeps_unknown_and_unterminated_placeholders() {
        assert_eq!(expand_with("${COURIER_UNSET}", lookup), "${COURIER_UNSET}");
        assert_eq!(expand_with("tail ${OPEN", lookup), "tail ${OPEN");
        assert_eq!(substitute_env("plain"), "plain");
    }
}
