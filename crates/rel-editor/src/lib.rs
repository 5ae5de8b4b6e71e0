pub mod editor;
pub mod error;
pub mod history;
pub mod input;
pub mod interaction;
pub mod selection;
pub mod shortcuts;
pub mod sync;

pub use editor::{EdgeForm, Editor, Message, NodeForm, Outcome};
pub use error::{ApiError, EditorError};
pub use history::{History, Phase};
pub use input::{InputEvent, Modifiers};
pub use interaction::{Interaction, InteractionState};
pub use selection::Selection;
pub use shortcuts::{ShortcutAction, ShortcutMap};
pub use sync::{ApiRequest, Completion, Method, PersistOp, PersistQueue, Route};
