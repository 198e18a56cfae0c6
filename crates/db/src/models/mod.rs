pub mod custom_field;
pub mod form_section;
pub mod lost_reason;
pub mod pipeline;
pub mod pipeline_lost_reason;
pub mod stage;
