//! Six-step intake questionnaire.

pub mod machine;
pub mod model;
pub mod state;

pub use machine::{QuestionnaireMachine, Step};
pub use model::{Answer, QuestionnaireAnswers, QuestionnaireDraft, RelationshipStatus};
pub use state::QuestionnaireState;
