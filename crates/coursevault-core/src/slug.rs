/// Convert a display name into a lowercase, URL-safe slug.
///
/// Accents are folded to their ASCII base letter first, then anything
/// outside `[a-z0-9 -]` is dropped and runs of whitespace/hyphens collapse
/// to a single hyphen. Slugs are the uniqueness key for topics, instructors
/// and courses, so two names that fold to the same slug map to one row.
pub fn slugify(text: &str) -> String {
    let folded: String = text.chars().map(fold_accent).collect();

    let mut slug = String::with_capacity(folded.len());
    let mut pending_hyphen = false;
    for ch in folded.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch);
        } else if ch.is_whitespace() || ch == '-' {
            pending_hyphen = true;
        }
    }
    slug
}

fn fold_accent(ch: char) -> char {
    match ch {
        'á' | 'Á' => 'a',
        'é' | 'É' => 'e',
        'í' | 'Í' => 'i',
        'ó' | 'Ó' => 'o',
        'ú' | 'Ú' | 'ü' | 'Ü' => 'u',
        'ñ' | 'Ñ' => 'n',
        'ç' | 'Ç' => 'c',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_slug() {
        assert_eq!(slugify("Machine Learning"), "machine-learning");
    }

    #[test]
    fn test_accents_fold() {
        assert_eq!(slugify("Programación Básica"), "programacion-basica");
        assert_eq!(slugify("Señales y Sistemas"), "senales-y-sistemas");
    }

    #[test]
    fn test_punctuation_and_runs() {
        assert_eq!(slugify("C++ (Advanced)  --  Part 2"), "c-advanced-part-2");
        assert_eq!(slugify("--hello--"), "hello");
    }

    #[test]
    fn test_same_name_same_slug() {
        assert_eq!(slugify("Rust Básico"), slugify("rust basico"));
    }
}
