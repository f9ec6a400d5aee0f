//! Typo-tolerant grading of typed recall answers

#[cfg(feature = "python")]
use pyo3::prelude::*;
use strsim::{jaro_winkler, normalized_levenshtein};

/// Outcome of grading one typed answer
#[cfg_attr(feature = "python", pyclass)]
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerGrade {
    #[cfg_attr(feature = "python", pyo3(get))]
    pub is_correct: bool,
    #[cfg_attr(feature = "python", pyo3(get))]
    pub similarity: f64,
    #[cfg_attr(feature = "python", pyo3(get))]
    pub feedback: String,
}

#[cfg(feature = "python")]
#[pymethods]
impl AnswerGrade {
    fn __repr__(&self) -> String {
        format!(
            "AnswerGrade(is_correct={}, similarity={:.2})",
            self.is_correct, self.similarity
        )
    }
}

/// Lowercase and collapse runs of whitespace
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn similarity(typed: &str, expected: &str) -> f64 {
    if typed == expected {
        return 1.0;
    }
    // Jaro-Winkler is kinder to transposed letters, Levenshtein to dropped ones
    jaro_winkler(typed, expected) * 0.6 + normalized_levenshtein(typed, expected) * 0.4
}

/// Grade `typed` against `expected`, which may list alternatives
/// separated by `/` or `,` ("colour/color"). The best alternative counts.
pub fn grade_answer(typed: &str, expected: &str, threshold: f64) -> AnswerGrade {
    let typed = normalize(typed);

    let best = expected
        .split(['/', ','])
        .map(normalize)
        .filter(|alt| !alt.is_empty())
        .map(|alt| (similarity(&typed, &alt), alt))
        .max_by(|a, b| a.0.total_cmp(&b.0));

    let Some((score, alternative)) = best else {
        return AnswerGrade {
            is_correct: false,
            similarity: 0.0,
            feedback: "Nothing to compare against".to_string(),
        };
    };

    if typed.is_empty() {
        return AnswerGrade {
            is_correct: false,
            similarity: 0.0,
            feedback: format!("No answer, the word is '{}'", alternative),
        };
    }

    let (is_correct, feedback) = if score >= 1.0 {
        (true, "Correct".to_string())
    } else if score >= threshold {
        (true, format!("Accepted with a typo, the word is '{}'", alternative))
    } else {
        (false, format!("Not quite, the word is '{}'", alternative))
    };

    AnswerGrade { is_correct, similarity: score, feedback }
}

// ============= Python Binding =============

#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(name = "grade_answer")]
pub fn py_grade_answer(typed: &str, expected: &str, threshold: Option<f64>) -> AnswerGrade {
    grade_answer(typed, expected, threshold.unwrap_or(0.85))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_ignores_case_and_spacing() {
        let grade = grade_answer("  Remote ", "remote", 0.85);
        assert!(grade.is_correct);
        assert_eq!(grade.similarity, 1.0);

        assert!(grade_answer("look  after", "Look after", 0.85).is_correct);
    }

    #[test]
    fn test_small_typo_accepted() {
        let grade = grade_answer("abandom", "abandon", 0.85);
        assert!(grade.is_correct);
        assert!(grade.similarity < 1.0);
    }

    #[test]
    fn test_wrong_word_rejected() {
        let grade = grade_answer("island", "remote", 0.85);
        assert!(!grade.is_correct);
        assert!(grade.feedback.contains("remote"));
    }

    #[test]
    fn test_alternatives() {
        assert!(grade_answer("color", "colour/color", 0.85).is_correct);
        assert_eq!(grade_answer("colour", "colour, color", 0.85).similarity, 1.0);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(!grade_answer("", "remote", 0.0).is_correct);
        assert!(!grade_answer("", "remote", 0.85).is_correct);
        assert!(!grade_answer("remote", "", 0.85).is_correct);
    }
}
