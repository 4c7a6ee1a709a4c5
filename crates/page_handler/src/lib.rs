//! Page handler for the reveal coordinator.
//!
//! Hosts a single page: the DOM, the startup gate that fires once the
//! document structure is parsed, media and font readiness signalling, layout
//! boxes with viewport intersection observers, and the frame scheduler that
//! provides the next rendering opportunity. Everything runs on one thread;
//! the page is shared as `Rc<HtmlPage>` between local tasks.

pub mod config;
pub mod fonts;
pub mod layout;
pub mod resources;
pub mod scheduler;
pub mod startup;
pub mod state;
pub mod viewport;

pub use config::RevealConfig;
pub use state::{HtmlPage, TurnOutcome, settle};
