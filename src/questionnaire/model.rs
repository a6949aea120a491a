//! Questionnaire answers and the draft they are collected into.

use serde::{Deserialize, Serialize};

/// Answer to "are you in a relationship now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationshipStatus {
    Yes,
    No,
}

impl RelationshipStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Yes => "Да",
            Self::No => "Нет",
        }
    }

    /// Accept the typed button labels, ignoring case and surrounding space.
    pub fn parse_text(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "да" => Some(Self::Yes),
            "нет" => Some(Self::No),
            _ => None,
        }
    }
}

impl std::fmt::Display for RelationshipStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A single submitted answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Typed message text.
    Text(String),
    /// A pressed yes/no button.
    Relationship(RelationshipStatus),
}

/// Answers collected so far. Exists only while the user is mid-flow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionnaireDraft {
    pub age: Option<String>,
    pub relationship_status: Option<RelationshipStatus>,
    pub time_since_last_relationship: Option<String>,
    pub perceived_obstacles: Option<String>,
    pub self_change: Option<String>,
    pub readiness_score_and_comment: Option<String>,
}

impl QuestionnaireDraft {
    /// All six answers, if every step has been filled.
    pub fn finish(self) -> Option<QuestionnaireAnswers> {
        Some(QuestionnaireAnswers {
            age: self.age?,
            relationship_status: self.relationship_status?,
            time_since_last_relationship: self.time_since_last_relationship?,
            perceived_obstacles: self.perceived_obstacles?,
            self_change: self.self_change?,
            readiness_score_and_comment: self.readiness_score_and_comment?,
        })
    }
}

/// A completed questionnaire. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionnaireAnswers {
    pub age: String,
    pub relationship_status: RelationshipStatus,
    pub time_since_last_relationship: String,
    pub perceived_obstacles: String,
    pub self_change: String,
    pub readiness_score_and_comment: String,
}

impl QuestionnaireAnswers {
    /// Fixed-order summary stored as the user's last context.
    pub fn summary(&self, user_id: &str) -> String {
        format!(
            "Ответы пользователя {user_id}:\n\
             1. Сколько вам лет? {}\n\
             2. Вы состоите сейчас в отношениях? {}\n\
             3. Как давно завершили последние отношения? {}\n\
             4. Что мешает встретить вторую половинку? {}\n\
             5. Что изменили в себе за последние 2 года? {}\n\
             6. Готовность к серьезным отношениям (по 10-бальной шкале): {}\n",
            self.age,
            self.relationship_status,
            self.time_since_last_relationship,
            self.perceived_obstacles,
            self.self_change,
            self.readiness_score_and_comment,
        )
    }
}
