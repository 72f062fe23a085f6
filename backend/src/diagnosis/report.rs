use regex::Regex;

lazy_static::lazy_static! {
    static ref BOLD_MARKERS: Regex = Regex::new(r"\*\*").unwrap();
    static ref HYPHEN_BULLETS: Regex = Regex::new(r"(?m)^([ \t]*)- ").unwrap();
}

/// Strips markdown bold and turns `- ` bullets into `* ` bullets.
pub fn normalize_report(text: &str) -> String {
    let without_bold = BOLD_MARKERS.replace_all(text, "");
    HYPHEN_BULLETS
        .replace_all(&without_bold, "${1}* ")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_bold_markers() {
        assert_eq!(
            normalize_report("**Disease:** Early blight"),
            "Disease: Early blight"
        );
    }

    #[test]
    fn rewrites_hyphen_bullets_keeping_indent() {
        let text = "Treatment:\n- Remove leaves\n  - Burn them\nNot-a-bullet - here";
        assert_eq!(
            normalize_report(text),
            "Treatment:\n* Remove leaves\n  * Burn them\nNot-a-bullet - here"
        );
    }

    #[test]
    fn hyphen_without_space_is_left_alone() {
        assert_eq!(normalize_report("-5 degrees"), "-5 degrees");
    }

    #[test]
    fn normalization_is_idempotent() {
        let samples = [
            "**Severity:** High\n- spray neem\n\t- twice a week",
            "****\n- **- nested**",
            "* already normalized\n* list",
            "- *italic* stays\n",
        ];
        for sample in samples {
            let once = normalize_report(sample);
            assert_eq!(normalize_report(&once), once, "not idempotent for {:?}", sample);
        }
    }
}
