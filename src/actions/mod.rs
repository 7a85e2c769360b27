//! Actions module for handling AI model outputs.

mod handler;

pub use handler::{
    do_action, finish_action, parse_action, ActionError, ActionHandler, ActionResult,
    ConfirmationCallback, TakeoverCallback, RELATIVE_COORDINATE_MAX,
};
