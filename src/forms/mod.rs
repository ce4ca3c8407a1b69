//! Story form configuration: question types, public form identifiers,
//! resolution of the current configuration and saving it.

pub mod identifier;
pub mod questions;
pub mod resolver;
pub mod save;

pub use identifier::{submission_url, FormIdentifierService};
pub use questions::{
    ParticipantChoice, ParticipantQuestion, QuestionKind, QuestionState, SliderQuestion,
};
pub use resolver::{FetchStrategy, FormData, FormDataResolver, LegacyFetch, UnifiedFetch};
pub use save::{FormConfig, FormConfigService};
