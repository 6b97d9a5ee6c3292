//! Text normalization shared by extraction, ledgers and matchers.

/// Format a number the way spreadsheet users expect: integers without a
/// decimal part, everything else in shortest form.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Trim, collapse internal whitespace runs to one space, upper-case.
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Replace accented Latin letters with their base letter. Keyword matching
/// runs on folded text so "EXCAVACIÓN" and "EXCAVACION" compare equal.
pub fn fold_accents(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'Á' | 'À' | 'Ä' | 'Â' => 'A',
            'É' | 'È' | 'Ë' | 'Ê' => 'E',
            'Í' | 'Ì' | 'Ï' | 'Î' => 'I',
            'Ó' | 'Ò' | 'Ö' | 'Ô' => 'O',
            'Ú' | 'Ù' | 'Ü' | 'Û' => 'U',
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            other => other,
        })
        .collect()
}

/// Upper-cased, accent-folded, whitespace-collapsed form used for matching.
pub fn match_form(s: &str) -> String {
    fold_accents(&normalize_name(s))
}

/// True when `text` (already in match form) contains `keyword` after the
/// keyword is brought to match form too.
pub fn has_keyword(text: &str, keyword: &str) -> bool {
    text.contains(&match_form(keyword))
}

/// True when `value` equals one of `markers` after normalization.
pub fn is_marker(value: &str, markers: &[String]) -> bool {
    let value = match_form(value);
    value.is_empty() || markers.iter().any(|m| match_form(m) == value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed_and_uppercased() {
        assert_eq!(normalize_name("  brazo   3m  "), "BRAZO 3M");
        assert_eq!(normalize_name("Cable\tduplex"), "CABLE DUPLEX");
    }

    #[test]
    fn accents_fold_for_matching() {
        assert_eq!(match_form("Excavación"), "EXCAVACION");
        assert!(has_keyword(&match_form("APERTURA DE HUECO PARA POSTE"), "hueco"));
    }

    #[test]
    fn marker_comparison_is_normalized() {
        let markers = vec!["NINGUNO".to_string(), "N/A".to_string()];
        assert!(is_marker(" ninguno ", &markers));
        assert!(is_marker("n/a", &markers));
        assert!(is_marker("   ", &markers));
        assert!(!is_marker("BRAZO", &markers));
    }

    #[test]
    fn numbers_format_like_cells() {
        assert_eq!(format_number(100.0), "100");
        assert_eq!(format_number(70.5), "70.5");
        assert_eq!(format_number(-3.0), "-3");
    }
}
