//! Rendition selection mode definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How renditions of a master playlist are selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Mirror every rendition (default).
    #[default]
    All,
    /// Mirror only the variant stream with the highest bandwidth.
    Better,
    /// Mirror the renditions whose keys were listed explicitly.
    List,
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionMode::All => write!(f, "all"),
            SelectionMode::Better => write!(f, "better"),
            SelectionMode::List => write!(f, "list"),
        }
    }
}

impl FromStr for SelectionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(SelectionMode::All),
            "better" => Ok(SelectionMode::Better),
            "list" => Ok(SelectionMode::List),
            _ => Err(format!("Unknown selection mode: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_mode_parse() {
        assert_eq!("better".parse::<SelectionMode>().unwrap(), SelectionMode::Better);
        assert_eq!("LIST".parse::<SelectionMode>().unwrap(), SelectionMode::List);
        assert!("best".parse::<SelectionMode>().is_err());
        assert_eq!(SelectionMode::All.to_string(), "all");
    }
}
