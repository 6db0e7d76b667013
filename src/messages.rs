//! User-facing notices for pipeline states and a best-effort message translation table.

use crate::error::{ProjectError, ValidationError};
use crate::pipeline::PipelineState;
use regex::{Captures, Regex};
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Advisory: the user still has to finish the mapping.
    Secondary,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

type Formatter = fn(&Captures) -> String;

const RULES: &[(&str, Formatter)] = &[
    (r"Paddings are too high", |_: &Captures| {
        "The margins leave no room for the chart, decrease them in the \"chart\" options panel".to_string()
    }),
    (r"Selected project is not valid: (.+)", |c: &Captures| {
        format!("The selected project is not valid ({})", &c[1])
    }),
    (r"Invalid version number", |_: &Captures| {
        "The project has no valid version number".to_string()
    }),
    (r"Unknown chart! \((.+)\)", |c: &Captures| {
        format!("The project uses a chart that is not available: {}", &c[1])
    }),
    (r"No serializer found for version (.+)", |c: &Captures| {
        format!("Projects saved with version {} cannot be opened", &c[1])
    }),
    (r"Can't open your project\. Invalid file", |_: &Captures| {
        "Can't open your project: the file is not a valid project".to_string()
    }),
    (r"Can't open your project\. (.+)", |c: &Captures| {
        format!("Can't open your project: {}", &c[1])
    }),
];

fn table() -> &'static [(Regex, Formatter)] {
    static TABLE: OnceLock<Vec<(Regex, Formatter)>> = OnceLock::new();
    TABLE.get_or_init(|| {
        RULES
            .iter()
            .filter_map(|(pattern, format)| Regex::new(pattern).ok().map(|re| (re, *format)))
            .collect()
    })
}

/// Rewrite a known failure message into friendlier text. First match wins; unknown
/// messages are returned verbatim.
pub fn translate(message: &str) -> String {
    for (re, format) in table() {
        if let Some(caps) = re.captures(message) {
            return format(&caps);
        }
    }
    message.to_string()
}

/// Inline notice for the current pipeline state, if it has one
pub fn notice(state: &PipelineState) -> Option<Notice> {
    match state {
        PipelineState::Invalid(err) => Some(validation_notice(err)),
        PipelineState::RenderFailed(msg) => Some(Notice {
            level: NoticeLevel::Danger,
            text: format!("Chart error: {}", translate(msg)),
        }),
        _ => None,
    }
}

fn validation_notice(err: &ValidationError) -> Notice {
    let level = match err {
        ValidationError::MissingRequiredDimension(_) | ValidationError::InsufficientMultiValueMapping { .. } => {
            NoticeLevel::Secondary
        }
        ValidationError::TypeMismatch { .. } => NoticeLevel::Danger,
    };
    Notice {
        level,
        text: err.to_string(),
    }
}

pub fn project_notice(err: &ProjectError) -> Notice {
    Notice {
        level: NoticeLevel::Danger,
        text: translate(&err.to_string()),
    }
}
