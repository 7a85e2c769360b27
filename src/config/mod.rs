//! Static configuration for the phone agent: app table, prompts and labels.

mod apps;
mod i18n;
mod prompts;

pub use apps::{app_for_window_line, get_package};
pub use i18n::{get_messages, Lang, Messages};
pub use prompts::{get_system_prompt, SYSTEM_PROMPT_EN, SYSTEM_PROMPT_ZH};
