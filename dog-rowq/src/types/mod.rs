pub mod ids;
pub mod record;
pub mod event;

pub use ids::JobId;
pub use record::JobRecord;
pub use event::Event;
