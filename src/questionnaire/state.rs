//! Questionnaire state machine: which question the user is on.

use serde::{Deserialize, Serialize};

/// Steps of the intake questionnaire.
///
/// Progresses linearly: Idle → Q1 → … → Q6 → Complete, and Complete returns
/// the user to Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuestionnaireState {
    #[default]
    Idle,
    /// Age.
    Q1,
    /// Relationship status (yes / no).
    Q2,
    /// Time since the last relationship.
    Q3,
    /// Perceived obstacles.
    Q4,
    /// Self change over the last two years.
    Q5,
    /// Readiness score and comment.
    Q6,
    Complete,
}

impl QuestionnaireState {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: QuestionnaireState) -> bool {
        use QuestionnaireState::*;
        matches!(
            (self, target),
            (Idle, Q1)
                | (Q1, Q2)
                | (Q2, Q3)
                | (Q3, Q4)
                | (Q4, Q5)
                | (Q5, Q6)
                | (Q6, Complete)
                | (Complete, Idle)
        )
    }

    /// Get the next state in the linear progression.
    pub fn next(&self) -> QuestionnaireState {
        use QuestionnaireState::*;
        match self {
            Idle => Q1,
            Q1 => Q2,
            Q2 => Q3,
            Q3 => Q4,
            Q4 => Q5,
            Q5 => Q6,
            Q6 => Complete,
            Complete => Idle,
        }
    }

    /// Whether the user is mid-flow and free text belongs to the questionnaire.
    pub fn is_asking(&self) -> bool {
        !matches!(self, Self::Idle | Self::Complete)
    }

    /// Whether this step takes one of two fixed choices instead of free text.
    pub fn expects_choice(&self) -> bool {
        matches!(self, Self::Q2)
    }

    /// The question asked on entering this state.
    pub fn prompt(&self) -> Option<&'static str> {
        match self {
            Self::Q1 => Some("1. Сколько вам лет?"),
            Self::Q2 => {
                Some("2. Вы состоите сейчас в каких-либо отношениях? (Выберите вариант)")
            }
            Self::Q3 => Some("3. Как давно завершили последние отношения?"),
            Self::Q4 => Some("4. Что, на ваш взгляд, мешает встретить свою вторую половинку?"),
            Self::Q5 => Some("5. Подскажите, а как вы сами изменились за последние 2 года?"),
            Self::Q6 => Some(
                "6. Насколько по 10-бальной шкале вы готовы к серьезным отношениям? \
                 Можете прокомментировать, почему.",
            ),
            Self::Idle | Self::Complete => None,
        }
    }
}

impl std::fmt::Display for QuestionnaireState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Q1 => "q1",
            Self::Q2 => "q2",
            Self::Q3 => "q3",
            Self::Q4 => "q4",
            Self::Q5 => "q5",
            Self::Q6 => "q6",
            Self::Complete => "complete",
        };
        write!(f, "{s}")
    }
}
