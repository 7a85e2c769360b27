//! Prompt language and localized labels for agent log output.

use serde::{Deserialize, Serialize};

/// Language of the system prompt and of the agent's log labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    Cn,
    En,
}

impl Lang {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lang::Cn => "cn",
            Lang::En => "en",
        }
    }
}

/// Labels used when the agent logs its progress.
#[derive(Debug, Clone)]
pub struct Messages {
    pub thinking: &'static str,
    pub action: &'static str,
    pub task_completed: &'static str,
    pub done: &'static str,
    pub step: &'static str,
}

pub static MESSAGES_ZH: Messages = Messages {
    thinking: "思考过程",
    action: "执行动作",
    task_completed: "任务完成",
    done: "完成",
    step: "步骤",
};

pub static MESSAGES_EN: Messages = Messages {
    thinking: "Thinking",
    action: "Action",
    task_completed: "Task Completed",
    done: "Done",
    step: "Step",
};

/// Get labels for a language.
pub fn get_messages(lang: Lang) -> &'static Messages {
    match lang {
        Lang::En => &MESSAGES_EN,
        Lang::Cn => &MESSAGES_ZH,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_messages() {
        assert_eq!(get_messages(Lang::Cn).thinking, "思考过程");
        assert_eq!(get_messages(Lang::En).thinking, "Thinking");
        assert_eq!(Lang::default(), Lang::Cn);
        assert_eq!(serde_json::to_string(&Lang::En).unwrap(), "\"en\"");
    }
}
