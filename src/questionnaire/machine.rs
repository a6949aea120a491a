//! Per-user questionnaire sessions.

use dashmap::DashMap;
use tracing::debug;

use crate::error::QuestionnaireError;
use crate::questionnaire::model::{Answer, QuestionnaireAnswers, QuestionnaireDraft, RelationshipStatus};
use crate::questionnaire::state::QuestionnaireState;

/// Result of submitting one answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Answer stored; ask the question for this state next.
    Next(QuestionnaireState),
    /// Last answer stored; the user is back to idle.
    Completed(QuestionnaireAnswers),
}

#[derive(Debug, Default)]
struct Session {
    state: QuestionnaireState,
    draft: QuestionnaireDraft,
}

/// Drives every user's questionnaire.
///
/// Each submission is applied under the map's per-entry write lock, so two
/// events for the same user cannot both read the same step.
#[derive(Default)]
pub struct QuestionnaireMachine {
    sessions: DashMap<String, Session>,
}

impl QuestionnaireMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter Q1 with an empty draft, discarding any earlier progress.
    pub fn start(&self, user_id: &str) -> QuestionnaireState {
        let state = QuestionnaireState::Idle.next();
        self.sessions.insert(
            user_id.to_string(),
            Session {
                state,
                draft: QuestionnaireDraft::default(),
            },
        );
        debug!(user_id, "Questionnaire started");
        state
    }

    pub fn state(&self, user_id: &str) -> QuestionnaireState {
        self.sessions
            .get(user_id)
            .map(|s| s.state)
            .unwrap_or_default()
    }

    /// Whether free text from this user belongs to the questionnaire.
    pub fn is_active(&self, user_id: &str) -> bool {
        self.state(user_id).is_asking()
    }

    /// Drop any half-filled draft. Returns whether one existed.
    pub fn abandon(&self, user_id: &str) -> bool {
        self.sessions.remove(user_id).is_some()
    }

    /// Store an answer for the current step and advance.
    ///
    /// A rejected answer leaves the state unchanged so the question can be
    /// asked again.
    pub fn submit(&self, user_id: &str, answer: Answer) -> Result<Step, QuestionnaireError> {
        let finished = {
            let mut session = self
                .sessions
                .get_mut(user_id)
                .filter(|s| s.state.is_asking())
                .ok_or_else(|| QuestionnaireError::NotActive {
                    user_id: user_id.to_string(),
                })?;

            let step = session.state;
            record(&mut session.draft, step, answer)?;

            let next = step.next();
            debug_assert!(step.can_transition_to(next));
            session.state = next;
            debug!(user_id, from = %step, to = %next, "Questionnaire advanced");

            if next != QuestionnaireState::Complete {
                return Ok(Step::Next(next));
            }
            std::mem::take(&mut session.draft)
        };

        self.sessions
            .remove_if(user_id, |_, s| s.state == QuestionnaireState::Complete);

        finished
            .finish()
            .map(Step::Completed)
            .ok_or_else(|| QuestionnaireError::InvalidAnswer {
                step: QuestionnaireState::Q6.to_string(),
                reason: "draft is missing earlier answers".into(),
            })
    }
}

fn record(
    draft: &mut QuestionnaireDraft,
    step: QuestionnaireState,
    answer: Answer,
) -> Result<(), QuestionnaireError> {
    let invalid = |reason: &str| QuestionnaireError::InvalidAnswer {
        step: step.to_string(),
        reason: reason.to_string(),
    };

    if step.expects_choice() {
        let status = match answer {
            Answer::Relationship(status) => status,
            Answer::Text(text) => RelationshipStatus::parse_text(&text)
                .ok_or_else(|| invalid("expected Да or Нет"))?,
        };
        draft.relationship_status = Some(status);
        return Ok(());
    }

    let text = match answer {
        Answer::Text(text) => text,
        Answer::Relationship(_) => return Err(invalid("expected a text answer")),
    };
    let slot = match step {
        QuestionnaireState::Q1 => &mut draft.age,
        QuestionnaireState::Q3 => &mut draft.time_since_last_relationship,
        QuestionnaireState::Q4 => &mut draft.perceived_obstacles,
        QuestionnaireState::Q5 => &mut draft.self_change,
        QuestionnaireState::Q6 => &mut draft.readiness_score_and_comment,
        _ => return Err(invalid("no question at this step")),
    };
    *slot = Some(text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Answer {
        Answer::Text(s.to_string())
    }

    #[test]
    fn full_flow_produces_ordered_summary() {
        let machine = QuestionnaireMachine::new();
        assert_eq!(machine.start("u"), QuestionnaireState::Q1);

        let answers = ["25", "Да", "2 года", "работа", "стал увереннее"];
        let mut expected = QuestionnaireState::Q1;
        for answer in answers {
            expected = expected.next();
            assert_eq!(machine.submit("u", text(answer)).unwrap(), Step::Next(expected));
        }

        let Step::Completed(done) = machine.submit("u", text("8, потому что готов")).unwrap()
        else {
            panic!("expected completion");
        };
        assert_eq!(machine.state("u"), QuestionnaireState::Idle);
        assert!(!machine.is_active("u"));

        let summary = done.summary("u");
        let positions: Vec<usize> = ["25", "Да", "2 года", "работа", "стал увереннее", "8, потому что готов"]
            .iter()
            .map(|a| summary.find(a).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn q2_rejects_free_text() {
        let machine = QuestionnaireMachine::new();
        machine.start("u");
        machine.submit("u", text("30")).unwrap();

        let err = machine.submit("u", text("сложно сказать")).unwrap_err();
        assert!(matches!(err, QuestionnaireError::InvalidAnswer { .. }));
        assert_eq!(machine.state("u"), QuestionnaireState::Q2);

        let step = machine
            .submit("u", Answer::Relationship(RelationshipStatus::No))
            .unwrap();
        assert_eq!(step, Step::Next(QuestionnaireState::Q3));
    }

    #[test]
    fn button_outside_q2_is_rejected() {
        let machine = QuestionnaireMachine::new();
        machine.start("u");
        let err = machine
            .submit("u", Answer::Relationship(RelationshipStatus::Yes))
            .unwrap_err();
        assert!(matches!(err, QuestionnaireError::InvalidAnswer { .. }));
        assert_eq!(machine.state("u"), QuestionnaireState::Q1);
    }

    #[test]
    fn submit_without_start_is_not_active() {
        let machine = QuestionnaireMachine::new();
        assert!(matches!(
            machine.submit("u", text("25")),
            Err(QuestionnaireError::NotActive { .. })
        ));
    }

    #[test]
    fn restart_and_abandon() {
        let machine = QuestionnaireMachine::new();
        machine.start("u");
        machine.submit("u", text("25")).unwrap();
        assert_eq!(machine.start("u"), QuestionnaireState::Q1);

        assert!(machine.abandon("u"));
        assert!(!machine.abandon("u"));
        assert_eq!(machine.state("u"), QuestionnaireState::Idle);
    }

    #[test]
    fn users_are_independent() {
        let machine = QuestionnaireMachine::new();
        machine.start("a");
        machine.submit("a", text("25")).unwrap();
        machine.start("b");
        assert_eq!(machine.state("a"), QuestionnaireState::Q2);
        assert_eq!(machine.state("b"), QuestionnaireState::Q1);
    }
}
