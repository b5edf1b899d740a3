/// Build the data-check-string Telegram signs: pairs sorted by key (byte-wise),
/// rendered as `key=value`, joined with `\n`, no trailing newline.
///
/// Callers pass the fields without `hash` and with unique keys. Values are not
/// escaped, so a value holding `\n` or `=` can collide with a different split
/// of the same text; the platform format has no way to express the difference.
pub fn data_check_string<'a, I>(fields: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut pairs: Vec<(&str, &str)> = fields.into_iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));

    let mut out = String::new();
    for (idx, (key, value)) in pairs.into_iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        out.push_str(key);
        out.push('=');
        out.push_str(value);
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn sorts_and_joins_without_trailing_newline() {
        let s = data_check_string([("user", "{\"id\":1}"), ("auth_date", "1698000000")]);
        assert_eq!(s, "auth_date=1698000000\nuser={\"id\":1}");
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let ab = data_check_string([("a", "1"), ("b", "2")]);
        let ba = data_check_string([("b", "2"), ("a", "1")]);
        assert_eq!(ab, ba);

        let mut map = HashMap::new();
        map.insert("b".to_string(), "2".to_string());
        map.insert("a".to_string(), "1".to_string());
        let from_map = data_check_string(map.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        assert_eq!(from_map, ab);
    }

    #[test]
    fn ordering_is_bytewise_not_locale_aware() {
        // 'B' (0x42) sorts before 'a' (0x61) and '_' (0x5f) sits between them.
        let s = data_check_string([("a", "1"), ("_", "2"), ("B", "3")]);
        assert_eq!(s, "B=3\n_=2\na=1");
    }

    #[test]
    fn empty_input_yields_empty_string() {
        assert_eq!(data_check_string(std::iter::empty()), "");
    }

    #[test]
    fn embedded_separators_are_ambiguous() {
        // Known weakness of the format: these two field sets sign identically.
        let joined = data_check_string([("a", "1\nb=2")]);
        let split = data_check_string([("a", "1"), ("b", "2")]);
        assert_eq!(joined, split);
    }
}
