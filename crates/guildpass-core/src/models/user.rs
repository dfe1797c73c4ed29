use serde::{Deserialize, Serialize};

#[cfg(feature = "ts")]
use ts_rs::TS;

/// Profile of the signed-in player, cached under the `user` storage key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub gold: Option<i64>,
    #[serde(default)]
    pub level: Option<i64>,
    #[serde(default)]
    pub guild: Option<String>,
}

impl UserProfile {
    /// One-line summary for status displays
    pub fn display_line(&self) -> String {
        let mut line = self.username.clone();
        if let Some(ref guild) = self.guild {
            line.push_str(&format!(" [{}]", guild));
        }
        if let Some(level) = self.level {
            line.push_str(&format!(" lvl {}", level));
        }
        if let Some(gold) = self.gold {
            line.push_str(&format!(" - {} gold", gold));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_profile() {
        let json = r#"{"id": 7, "username": "aria"}"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.id, 7);
        assert_eq!(profile.email, None);
        assert_eq!(profile.display_line(), "aria");
    }

    #[test]
    fn test_display_line_full() {
        let profile = UserProfile {
            id: 1,
            username: "aria".to_string(),
            email: Some("aria@example.com".to_string()),
            gold: Some(250),
            level: Some(4),
            guild: Some("Lanterns".to_string()),
        };
        assert_eq!(profile.display_line(), "aria [Lanterns] lvl 4 - 250 gold");
    }
}
