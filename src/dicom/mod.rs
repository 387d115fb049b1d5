//! C8 — DICOM service dispatcher: C-FIND/C-MOVE/C-STORE/C-GET handlers
//! built atop the hierarchical matcher and the sub-operation pump, with
//! the wire protocol itself left to the kept `dimse` toolkit crate, an
//! out-of-scope collaborator.

pub mod find;
pub mod get;
pub mod matcher;
pub mod move_;
pub mod status;
pub mod store;

pub use find::{handle_find, FindAnswer, FindRequest};
pub use get::{handle_get, GetReport, GetRequest, InstanceSource};
pub use matcher::Matcher;
pub use move_::{handle_move, MoveDispatch, MoveRequest, OutboundAssociation};
pub use store::{handle_store, StoreOutcome, StoreRequest};
