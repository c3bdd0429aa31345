pub mod browser;
pub mod coordinator;
pub mod extract;
pub mod normalize;
pub mod traits;
pub mod traversal;

pub use browser::ChromeSession;
pub use coordinator::RunCoordinator;
pub use traits::{AutomationSession, ElementHandle};
pub use traversal::{PageTraverser, TraversalOutcome};
