use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::chapter::ModelError;
use super::node::LocalizedText;

/// Reserved unlock target marking a case as solvable.
pub const SOLUTION: &str = "SOLUTION";

/// How hard a puzzle case is declared to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn parse(name: &str) -> Option<Difficulty> {
        match name {
            "easy" => Some(Self::Easy),
            "medium" => Some(Self::Medium),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

/// The game master's reply to a yes/no question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Answer {
    Yes,
    No,
    Irrelevant,
}

impl Answer {
    pub fn parse(name: &str) -> Option<Answer> {
        match name {
            "yes" => Some(Self::Yes),
            "no" => Some(Self::No),
            "irrelevant" => Some(Self::Irrelevant),
            _ => None,
        }
    }
}

/// What answering a question makes available.
///
/// Serialized as the bare question id, or `"SOLUTION"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Unlock {
    Question(String),
    Solution,
}

impl From<String> for Unlock {
    fn from(value: String) -> Self {
        if value == SOLUTION {
            Unlock::Solution
        } else {
            Unlock::Question(value)
        }
    }
}

impl From<Unlock> for String {
    fn from(value: Unlock) -> Self {
        match value {
            Unlock::Question(id) => id,
            Unlock::Solution => SOLUTION.to_string(),
        }
    }
}

impl Unlock {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Question(id) => id,
            Self::Solution => SOLUTION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: LocalizedText,
    pub answer: Answer,
    pub unlocks: Vec<Unlock>,
}

/// A self-contained lateral-thinking puzzle, independent of the chapter graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleCase {
    pub number: u32,
    pub case_id: String,
    pub title: LocalizedText,
    pub difficulty: Difficulty,
    pub scenario: LocalizedText,
    pub questions: Vec<Question>,
    pub solution: LocalizedText,
    #[serde(default)]
    pub hints: Vec<LocalizedText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<String>,
}

impl PuzzleCase {
    /// Reject duplicate question ids. Unlock integrity is checked by the
    /// validator.
    pub fn check_questions(&self) -> Result<(), ModelError> {
        let mut seen = FxHashSet::default();
        for question in &self.questions {
            if !seen.insert(question.id.as_str()) {
                return Err(ModelError::DuplicateQuestion(question.id.clone()));
            }
        }
        Ok(())
    }

    /// Questions available from the start: those no other question unlocks.
    pub fn root_questions(&self) -> Vec<&Question> {
        let unlocked: FxHashSet<&str> = self
            .questions
            .iter()
            .flat_map(|q| q.unlocks.iter())
            .filter_map(|u| match u {
                Unlock::Question(id) => Some(id.as_str()),
                Unlock::Solution => None,
            })
            .collect();
        self.questions
            .iter()
            .filter(|q| !unlocked.contains(q.id.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str, unlocks: &[&str]) -> Question {
        Question {
            id: id.to_string(),
            text: LocalizedText::from([("english".to_string(), format!("{id}?"))]),
            answer: Answer::Yes,
            unlocks: unlocks.iter().map(|u| Unlock::from(u.to_string())).collect(),
        }
    }

    fn make_case(questions: Vec<Question>) -> PuzzleCase {
        PuzzleCase {
            number: 1,
            case_id: "CASE_001".to_string(),
            title: LocalizedText::new(),
            difficulty: Difficulty::default(),
            scenario: LocalizedText::new(),
            questions,
            solution: LocalizedText::new(),
            hints: Vec::new(),
            estimated_time: None,
        }
    }

    #[test]
    fn unlock_string_conversion() {
        assert_eq!(Unlock::from("SOLUTION".to_string()), Unlock::Solution);
        assert_eq!(
            Unlock::from("Q002".to_string()),
            Unlock::Question("Q002".to_string())
        );
        assert_eq!(String::from(Unlock::Solution), "SOLUTION");
    }

    #[test]
    fn unlock_serializes_as_plain_string() {
        let json = serde_json::to_string(&vec![
            Unlock::Question("Q002".to_string()),
            Unlock::Solution,
        ])
        .unwrap();
        assert_eq!(json, r#"["Q002","SOLUTION"]"#);
    }

    #[test]
    fn difficulty_parse_and_default() {
        assert_eq!(Difficulty::parse("hard"), Some(Difficulty::Hard));
        assert_eq!(Difficulty::parse("nightmare"), None);
        assert_eq!(Difficulty::default(), Difficulty::Medium);
        assert_eq!(Difficulty::Easy.name(), "easy");
    }

    #[test]
    fn answer_parse() {
        assert_eq!(Answer::parse("irrelevant"), Some(Answer::Irrelevant));
        assert_eq!(Answer::parse("maybe"), None);
    }

    #[test]
    fn root_questions_have_no_incoming_unlock() {
        let case = make_case(vec![
            question("Q001", &["Q002", "Q003"]),
            question("Q002", &["SOLUTION"]),
            question("Q003", &["SOLUTION"]),
            question("Q004", &["SOLUTION"]),
        ]);
        let roots: Vec<&str> = case.root_questions().iter().map(|q| q.id.as_str()).collect();
        assert_eq!(roots, vec!["Q001", "Q004"]);
    }

    #[test]
    fn duplicate_question_rejected() {
        let case = make_case(vec![question("Q001", &[]), question("Q001", &[])]);
        assert_eq!(
            case.check_questions().unwrap_err(),
            ModelError::DuplicateQuestion("Q001".to_string())
        );
    }
}
